//! serverlog - leveled logging for long-running server processes
//!
//! Producers on any task or thread queue log items; a single background writer
//! prints them to the console with colored labels and appends them to a logfile
//! that rotates at local midnight.

pub mod config;
pub mod error;
pub mod logger;
pub mod logging;

pub use config::{Destination, LoggerConfig};
pub use error::{Error, Result};
pub use logger::{Logger, LoggerHandle};
pub use logging::{Category, WriterExit};
