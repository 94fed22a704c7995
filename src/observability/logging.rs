//! # Structured Logging
//!
//! Installs the global `tracing` subscriber from the logging document and
//! keeps its filter reloadable. The document is TOML:
//!
//! ```toml
//! level = "info"
//! format = "pretty"   # or "json"
//!
//! [modules]
//! "flowgate::xds" = "debug"
//! ```
//!
//! [`LogConfigWatcher`] re-reads the document when it changes and swaps the
//! filter in place. The output format is fixed at startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::{Error, Result};

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Parsed logging document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    /// Per-target level directives, e.g. `"flowgate::xds" = "debug"`
    pub modules: BTreeMap<String, String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty, modules: BTreeMap::new() }
    }
}

impl LogConfig {
    /// Read and parse the logging document
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read logging config '{}': {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| Error::config(format!("invalid logging config: {}", e)))?;
        config.filter()?;
        Ok(config)
    }

    /// Filter directive string, global level first
    pub fn directives(&self) -> String {
        std::iter::once(self.level.trim().to_string())
            .chain(self.modules.iter().map(|(target, level)| format!("{}={}", target, level.trim())))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(self.directives())
            .map_err(|e| Error::config(format!("invalid log filter '{}': {}", self.directives(), e)))
    }
}

/// Handle for swapping the active log filter
#[derive(Clone)]
pub struct LogReloadHandle {
    inner: reload::Handle<EnvFilter, Registry>,
}

impl std::fmt::Debug for LogReloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogReloadHandle").finish_non_exhaustive()
    }
}

impl LogReloadHandle {
    /// Build a reloadable filter layer and its handle without installing it
    pub fn layer(config: &LogConfig) -> Result<(reload::Layer<EnvFilter, Registry>, Self)> {
        let (layer, inner) = reload::Layer::new(config.filter()?);
        Ok((layer, Self { inner }))
    }

    pub fn reload(&self, config: &LogConfig) -> Result<()> {
        let filter = config.filter()?;
        self.inner
            .reload(filter)
            .map_err(|e| Error::internal(format!("failed to reload log filter: {}", e)))
    }

    /// Directives of the active filter
    pub fn current(&self) -> Option<String> {
        self.inner.with_current(|filter| filter.to_string()).ok()
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LogConfig) -> Result<LogReloadHandle> {
    let (filter_layer, handle) = LogReloadHandle::layer(config)?;
    let registry = tracing_subscriber::registry().with(filter_layer);

    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    }
    .map_err(|e| Error::config(format!("failed to install log subscriber: {}", e)))?;

    Ok(handle)
}

/// Load the logging document, falling back to defaults when it is unusable.
///
/// Returns the reason for the fallback so it can be logged once the
/// subscriber exists.
pub fn load_or_default(path: &Path) -> (LogConfig, Option<Error>) {
    match LogConfig::load(path) {
        Ok(config) => (config, None),
        Err(err) => (LogConfig::default(), Some(err)),
    }
}

/// Watches the logging document and reloads the filter on change
#[derive(Debug)]
pub struct LogConfigWatcher {
    path: PathBuf,
    handle: LogReloadHandle,
}

impl LogConfigWatcher {
    pub fn new<P: Into<PathBuf>>(path: P, handle: LogReloadHandle) -> Self {
        Self { path: path.into(), handle }
    }

    /// Start watching; the task ends when `shutdown` is cancelled
    pub fn spawn(self, shutdown: CancellationToken) -> Result<JoinHandle<()>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        info!(path = %self.path.display(), "Logging config watcher started");

        Ok(tokio::spawn(async move {
            let _watcher = watcher;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(Ok(event)) => {
                            if (event.kind.is_modify() || event.kind.is_create())
                                && self.concerns(&event)
                            {
                                self.apply();
                            }
                        }
                        Some(Err(err)) => warn!(error = %err, "Logging config watch error"),
                        None => break,
                    },
                }
            }
            debug!("Logging config watcher stopped");
        }))
    }

    fn concerns(&self, event: &Event) -> bool {
        let target = self.path.file_name();
        event.paths.iter().any(|path| path.file_name() == target)
    }

    /// Re-read the document and swap the filter; a bad document keeps the current one
    pub fn apply(&self) {
        match LogConfig::load(&self.path).and_then(|config| {
            self.handle.reload(&config)?;
            Ok(config)
        }) {
            Ok(config) => info!(filter = %config.directives(), "Log filter reloaded"),
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "Failed to reload logging config; keeping current filter"
            ),
        }
    }
}
