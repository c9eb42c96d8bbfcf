//! Log collector client
//!
//! Pipelines report INFO/CRITICAL entries to an append-only collector. One
//! process-wide [`CollectorHandle`] is created at startup ([`init_global`]),
//! injected into request handlers, and flushed at shutdown. Every entry is also
//! mirrored to `tracing`. A collector that fails to append never aborts the
//! caller; the failure is downgraded to a `warn!`.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

/// Collector severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Critical,
}

/// One collected log entry
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Append-only log sink
pub trait LogCollector: Send + Sync {
    fn append(&self, entry: &LogEntry) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Collector that relies on the `tracing` mirror only
#[derive(Debug, Default)]
pub struct TracingCollector;

impl LogCollector for TracingCollector {
    fn append(&self, _entry: &LogEntry) -> io::Result<()> {
        Ok(())
    }
}

/// Collector appending one JSON object per line to a file
pub struct JsonLinesCollector {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesCollector {
    /// Open (or create) the collector file in append mode
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogCollector for JsonLinesCollector {
    fn append(&self, entry: &LogEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry)?;
        writeln!(self.file(), "{}", line)
    }

    fn flush(&self) -> io::Result<()> {
        let mut file = self.file();
        file.flush()?;
        file.sync_data()
    }
}

/// In-process collector keeping every entry in memory
#[derive(Debug, Default)]
pub struct MemoryCollector {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages recorded at `level`, oldest first
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }
}

impl LogCollector for MemoryCollector {
    fn append(&self, entry: &LogEntry) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry.clone());
        Ok(())
    }
}

/// Cloneable handle to the collector in use
#[derive(Clone)]
pub struct CollectorHandle {
    inner: Arc<dyn LogCollector>,
}

impl CollectorHandle {
    pub fn new(collector: impl LogCollector + 'static) -> Self {
        Self {
            inner: Arc::new(collector),
        }
    }

    pub fn from_arc(collector: Arc<dyn LogCollector>) -> Self {
        Self { inner: collector }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(LogLevel::Critical, message.into());
    }

    pub fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!(target: "collector", "{}", message),
            LogLevel::Critical => error!(target: "collector", "{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        };
        if let Err(e) = self.inner.append(&entry) {
            warn!("Log collector append failed: {}", e);
        }
    }

    pub fn flush(&self) {
        if let Err(e) = self.inner.flush() {
            warn!("Log collector flush failed: {}", e);
        }
    }
}

static GLOBAL_COLLECTOR: OnceCell<CollectorHandle> = OnceCell::new();

/// Install the process-wide collector
///
/// The first installed handle wins; later calls return it unchanged.
pub fn init_global(handle: CollectorHandle) -> &'static CollectorHandle {
    let mut installed = false;
    let global = GLOBAL_COLLECTOR.get_or_init(|| {
        installed = true;
        handle
    });
    if !installed {
        warn!("Global log collector already initialized; keeping existing collector");
    }
    global
}

/// Process-wide collector, lazily falling back to [`TracingCollector`]
pub fn global() -> &'static CollectorHandle {
    GLOBAL_COLLECTOR.get_or_init(|| CollectorHandle::new(TracingCollector))
}
