//! # Wire Protocol Module
//!
//! Line-oriented text protocol exchanged with the test-stand controller.
//!
//! This module handles:
//! - Decoding inbound `KEY:value` lines into typed telemetry events
//! - Encoding actuator commands into outbound lines
//! - The channel dispatch table and per-actuator value bands

pub mod protocol;
pub mod encoder;
pub mod decoder;
