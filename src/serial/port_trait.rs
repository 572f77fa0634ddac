//! Trait abstraction for the controller link to enable testing
//!
//! The link is split into a read half ([`LineSource`], owned by the link
//! reader) and a write half ([`LineSink`], owned by the command sender), so
//! reads and writes never contend for the same handle.

use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

/// Longest line accepted before the buffered bytes are discarded as noise
pub const MAX_LINE_LEN: usize = 1024;

/// Bytes reserved ahead of each read
const READ_CHUNK: usize = 256;

/// Read half of the controller link
#[async_trait]
pub trait LineSource: Send {
    /// Wait at most one poll period for a complete line
    ///
    /// Returns `Ok(None)` when no full line arrived in time. Returns an error
    /// once the link is gone; the reader treats that as link loss.
    async fn read_line_if_available(&mut self) -> io::Result<Option<String>>;

    /// Release the underlying device
    async fn close(&mut self) -> io::Result<()>;
}

/// Write half of the controller link
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LineSink: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Release the underlying device
    async fn close(&mut self) -> io::Result<()>;
}

/// Newline framer over any async byte stream (serial read half in production)
pub struct SerialLineSource<R> {
    reader: R,
    buf: BytesMut,
    poll_timeout: Duration,
}

impl<R> SerialLineSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, poll_timeout: Duration) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
            poll_timeout,
        }
    }

    /// Split one complete line off the front of the buffer
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line = self.buf.split_to(pos + 1);
        Some(String::from_utf8_lossy(&line[..pos]).into_owned())
    }
}

#[async_trait]
impl<R> LineSource for SerialLineSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_line_if_available(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        self.buf.reserve(READ_CHUNK);
        // read_buf is cancel safe: bytes read before the timeout stay in buf
        match tokio::time::timeout(self.poll_timeout, self.reader.read_buf(&mut self.buf)).await {
            Err(_elapsed) => Ok(None),
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "serial link closed by peer",
            )),
            Ok(Ok(_)) => {
                let line = self.take_line();
                if line.is_none() && self.buf.len() > MAX_LINE_LEN {
                    warn!("Discarding {} bytes without line terminator", self.buf.len());
                    self.buf.clear();
                }
                Ok(line)
            }
            Ok(Err(e)) => Err(e),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.buf.clear();
        Ok(())
    }
}

/// Command writer over any async byte stream (serial write half in production)
pub struct SerialLineSink<W> {
    writer: W,
}

impl<W> SerialLineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> LineSink for SerialLineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// One scripted outcome of a poll
    #[derive(Debug, Clone)]
    pub enum ScriptedRead {
        Line(String),
        Fail(io::ErrorKind),
    }

    /// Line source that replays a script, then reports "nothing available"
    #[derive(Clone)]
    pub struct ScriptedSource {
        pub script: Arc<Mutex<VecDeque<ScriptedRead>>>,
        pub closed: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self {
                script: Arc::new(Mutex::new(VecDeque::new())),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn with_lines(lines: &[&str]) -> Self {
            let source = Self::new();
            for line in lines {
                source.push_line(line);
            }
            source
        }

        pub fn push_line(&self, line: &str) {
            self.script
                .lock()
                .unwrap()
                .push_back(ScriptedRead::Line(line.to_string()));
        }

        pub fn push_failure(&self, kind: io::ErrorKind) {
            self.script.lock().unwrap().push_back(ScriptedRead::Fail(kind));
        }

        pub fn remaining(&self) -> usize {
            self.script.lock().unwrap().len()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LineSource for ScriptedSource {
        async fn read_line_if_available(&mut self) -> io::Result<Option<String>> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(ScriptedRead::Line(line)) => Ok(Some(line)),
                Some(ScriptedRead::Fail(kind)) => Err(io::Error::new(kind, "Mock read error")),
                None => {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Ok(None)
                }
            }
        }

        async fn close(&mut self) -> io::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Line sink that records every write
    #[derive(Clone)]
    pub struct RecordingSink {
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self {
                written_data: Arc::new(Mutex::new(Vec::new())),
                write_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        pub fn written_lines(&self) -> Vec<String> {
            self.get_written_data()
                .into_iter()
                .map(|bytes| String::from_utf8(bytes).unwrap())
                .collect()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        pub fn clear_write_error(&self) {
            *self.write_error.lock().unwrap() = None;
        }
    }

    #[async_trait]
    impl LineSink for RecordingSink {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
