pub mod channels;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod eventlog;
pub mod hooks;
pub mod infra;
pub mod logging;
pub mod media;
pub mod routing;
pub mod runner;
pub mod template;
pub mod trigger;
pub mod voice;

pub use error::{NotifyError, Result};
