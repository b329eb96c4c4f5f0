//! Logger initialization.
//!
//! Everything in the crate logs through the `log` facade; `env_logger` is the
//! only backend, installed once from `main`.

mod init;

pub use init::{LoggingConfig, default_filter, init_logging};
