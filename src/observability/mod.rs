//! # Observability Infrastructure
//!
//! Structured logging with a hot-reloadable filter.

pub mod logging;

pub use logging::{
    init_logging, load_or_default, LogConfig, LogConfigWatcher, LogFormat, LogReloadHandle,
};
