//! Plain-text log files
//!
//! Human-readable companions of the record log. Each [`TextLog`] appends
//! pre-formatted lines and rotates itself to `<name>.1` once it grows past
//! its size limit. A [`TextLogSet`] owns the standard set of files kept
//! for an error-log directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use errorlog_core::{StatusCode, UserInfo};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;

/// Default rotation threshold, 100 MiB
pub const DEFAULT_TEXT_LOG_MAX_BYTES: u64 = 100 * 1024 * 1024;

struct TextLogState {
    file: File,
    len: u64,
}

/// A size-rotated plain-text log file
pub struct TextLog {
    path: PathBuf,
    max_bytes: u64,
    state: Mutex<TextLogState>,
}

impl TextLog {
    /// Open or create a text log, creating parent directories as needed
    pub async fn open(path: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let (file, len) = open_append(&path).await?;
        debug!(path = %path.display(), len, "Opened text log");
        Ok(Self {
            path,
            max_bytes,
            state: Mutex::new(TextLogState { file, len }),
        })
    }

    /// Append a pre-formatted line (or several)
    pub async fn write_str(&self, text: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        if state.len >= self.max_bytes {
            self.rotate(&mut state).await?;
        }
        state.file.write_all(text.as_bytes()).await?;
        state.file.flush().await?;
        state.len += text.len() as u64;
        Ok(())
    }

    async fn rotate(&self, state: &mut TextLogState) -> Result<(), StorageError> {
        let rotated = rotated_path(&self.path);
        info!(
            path = %self.path.display(),
            len = state.len,
            max = self.max_bytes,
            "Rotating text log"
        );
        state.file.flush().await?;
        // rename replaces an existing `.1`
        tokio::fs::rename(&self.path, &rotated).await?;
        let (file, len) = open_append(&self.path).await?;
        state.file = file;
        state.len = len;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the active file
    pub async fn len(&self) -> u64 {
        self.state.lock().await.len
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn open_append(path: &Path) -> Result<(File, u64), StorageError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let len = file.metadata().await?.len();
    Ok((file, len))
}

/// Path a text log is rotated to
pub fn rotated_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

/// Reduce a user-supplied name to a safe file stem
fn sanitize_file_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// The text logs of one error-log directory
///
/// - `all.log`: every record
/// - `small.log`: every record except routine status codes
/// - `users.log`: records submitted on behalf of a user
/// - `<abbrev or id>.log`: records of one resolved user, opened lazily
pub struct TextLogSet {
    dir: PathBuf,
    max_bytes: u64,
    all: TextLog,
    small: TextLog,
    users: TextLog,
    per_user: DashMap<String, Arc<TextLog>>,
}

impl TextLogSet {
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>, max_bytes: u64) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            all: TextLog::open(dir.join("all.log"), max_bytes).await?,
            small: TextLog::open(dir.join("small.log"), max_bytes).await?,
            users: TextLog::open(dir.join("users.log"), max_bytes).await?,
            per_user: DashMap::new(),
            dir,
            max_bytes,
        })
    }

    /// Write a formatted entry to every log it belongs in
    ///
    /// All applicable logs are attempted; the first failure is returned.
    pub async fn write(
        &self,
        text: &str,
        status: StatusCode,
        user_id: &str,
        user: Option<&UserInfo>,
    ) -> Result<(), StorageError> {
        let mut first_err = None;
        let mut note = |res: Result<(), StorageError>, log: &str| {
            if let Err(e) = res {
                warn!(log, error = %e, "Failed to write text log");
                first_err.get_or_insert(e);
            }
        };

        note(self.all.write_str(text).await, "all");
        if !user_id.is_empty() {
            note(self.users.write_str(text).await, "users");
        }
        if let Some(user) = user {
            match self.user_log(user).await {
                Ok(log) => note(log.write_str(text).await, "user"),
                Err(e) => note(Err(e), "user"),
            }
        }
        if !status.is_routine() {
            note(self.small.write_str(text).await, "small");
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// The per-user log of `user`, opening it on first use
    pub async fn user_log(&self, user: &UserInfo) -> Result<Arc<TextLog>, StorageError> {
        if let Some(log) = self.per_user.get(&user.id) {
            return Ok(Arc::clone(log.value()));
        }
        let path = self
            .dir
            .join(format!("{}.log", sanitize_file_stem(user.file_stem())));
        let log = Arc::new(TextLog::open(path, self.max_bytes).await?);
        // A concurrent opener may have won; keep whichever was inserted first
        let entry = self.per_user.entry(user.id.clone()).or_insert(log);
        Ok(Arc::clone(entry.value()))
    }

    /// Number of per-user logs currently open
    pub fn user_log_count(&self) -> usize {
        self.per_user.len()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
