use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only record of every command the gateway ran or rejected
#[derive(Debug)]
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create an AuditLogger writing to `path`, creating parent directories
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Log a command that reached the executor
    ///
    /// `outcome` is `exit:N` for completed processes or an error code.
    pub fn log_command(&self, tool: &str, command: &str, outcome: &str) -> std::io::Result<()> {
        let entry = format!(
            "[{}] [{}] [{}] [{}] {}\n",
            Utc::now().to_rfc3339(),
            current_user(),
            tool,
            outcome,
            single_line(command)
        );
        self.append(&entry)
    }

    /// Log a command the validator rejected
    pub fn log_validation_failure(
        &self,
        tool: &str,
        command: &str,
        reason: &str,
    ) -> std::io::Result<()> {
        let entry = format!(
            "[{}] [{}] [{}] [VALIDATION-REJECTED] command=\"{}\" reason=\"{}\"\n",
            Utc::now().to_rfc3339(),
            current_user(),
            tool,
            single_line(command),
            single_line(reason)
        );
        self.append(&entry)
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(entry.as_bytes())?;
        file.flush()
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            // audit.log -> audit.log.1
            let backup_path = self.log_path.with_extension("log.1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn current_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

// One entry per line, even for multi-line commands or messages
fn single_line(text: &str) -> String {
    text.replace('\n', "\\n")
}
