//! # Endurance GCU Library
//!
//! Ground-control protocol core for a liquid-propellant engine test stand.
//!
//! This library exchanges a line-oriented text protocol with the stand's
//! embedded controller over a serial link: it decodes telemetry into live
//! state and a time-series log, and validates and forwards actuator commands.
//! Presentation (GUI, plots, dialogs) sits outside and talks to a
//! [`session::ProtocolCore`].

pub mod config;
pub mod error;
pub mod wire;
pub mod serial;
pub mod telemetry;
pub mod link;
pub mod command;
pub mod session;
