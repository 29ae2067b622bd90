//! Log text retrieval for the investigator

use crate::error::LogSourceError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

/// Log file read when the caller names none
pub const DEFAULT_LOG_PATH: &str = "app.log";

/// Source of application log text
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Read the whole log as text
    async fn read_log_text(&self) -> Result<String, LogSourceError>;

    /// Human-readable location, used in reports and logs
    fn location(&self) -> String;
}

/// Reads a log file from the local filesystem
///
/// Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Clone)]
pub struct FileLogSource {
    path: PathBuf,
    timeout: Duration,
}

impl FileLogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn read_log_text(&self) -> Result<String, LogSourceError> {
        let location = self.location();

        let bytes = match tokio::time::timeout(self.timeout, tokio::fs::read(&self.path)).await {
            Err(_) => {
                return Err(LogSourceError::Timeout {
                    path: location,
                    timeout: self.timeout,
                })
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(LogSourceError::NotFound(location))
            }
            Ok(Err(e)) => {
                return Err(LogSourceError::Io {
                    path: location,
                    source: e,
                })
            }
            Ok(Ok(bytes)) => bytes,
        };

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory log text, used by callers that already hold the log
#[derive(Debug, Clone)]
pub struct StaticLogSource {
    text: String,
}

impl StaticLogSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl LogSource for StaticLogSource {
    async fn read_log_text(&self) -> Result<String, LogSourceError> {
        Ok(self.text.clone())
    }

    fn location(&self) -> String {
        "<inline>".to_string()
    }
}
