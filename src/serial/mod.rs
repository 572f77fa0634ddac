//! # Serial Communication Module
//!
//! Handles the serial link to the test-stand controller.
//!
//! This module handles:
//! - Opening the controller port (8N1, no flow control)
//! - Splitting the port into a line-framed read half and a command write half
//! - Refusing to hand out a link when the port cannot be opened

pub mod port_trait;

use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::error::{GcuError, Result};
use port_trait::{LineSink, LineSource, SerialLineSink, SerialLineSource};

/// Default controller baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read poll bound
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Open serial link to the test-stand controller
///
/// Holds both halves until the core takes ownership of them.
pub struct ControllerSerial {
    source: SerialLineSource<ReadHalf<SerialStream>>,
    sink: SerialLineSink<WriteHalf<SerialStream>>,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
}

impl std::fmt::Debug for ControllerSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl ControllerSerial {
    /// Open connection to the controller
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `address` - Device path (e.g., "/dev/ttyACM0" or "COM3")
    /// * `baud_rate` - Line speed, matching the controller firmware
    /// * `timeout` - Upper bound on a single read poll
    ///
    /// # Returns
    ///
    /// * `Result<ControllerSerial>` - Connected link or error
    ///
    /// # Errors
    ///
    /// Returns [`GcuError::Connection`] if the port cannot be opened. The core
    /// cannot run without a link, so callers treat this as fatal.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use endurance_gcu::serial::ControllerSerial;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let serial = ControllerSerial::open("/dev/ttyACM0", 9600, Duration::from_millis(100))?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(address: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        debug!("Opening controller port {} at {} baud", address, baud_rate);

        let port = Self::open_port(address, baud_rate, timeout)?;
        let (reader, writer) = tokio::io::split(port);

        info!("Successfully opened controller link at {}", address);
        Ok(Self {
            source: SerialLineSource::new(reader, timeout),
            sink: SerialLineSink::new(writer),
            device_path: address.to_string(),
        })
    }

    /// Open a specific serial port with the controller's settings
    fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open_native_async()
            .map_err(|e| GcuError::Connection(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Hand the halves over: the read half to the link reader, the write
    /// half to the command sender
    pub fn into_halves(self) -> (Box<dyn LineSource>, Box<dyn LineSink>) {
        (Box::new(self.source), Box::new(self.sink))
    }
}
