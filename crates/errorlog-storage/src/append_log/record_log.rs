//! Framed record log implementation
//!
//! A single append-only file of [`StoredRecord`]s, one per framed block.
//! There is no index: recent records are found by reading backward from
//! the end of the file.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use errorlog_core::{ServiceFilter, StoredRecord};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{StorageError, StreamBlockError};
use crate::streamblock::{BlockReader, BlockWriter, END_BYTE};

/// Default file name of the record log inside its directory
pub const DEFAULT_RECORD_LOG_FILE: &str = "proto.log";

/// Configuration for a record log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLogConfig {
    /// Directory holding the log file
    pub base_dir: PathBuf,
    /// File name inside `base_dir`
    pub file_name: String,
    /// Whether to sync writes to disk immediately
    pub sync_on_write: bool,
}

impl Default for RecordLogConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/errorlog"),
            file_name: DEFAULT_RECORD_LOG_FILE.to_string(),
            sync_on_write: true,
        }
    }
}

impl RecordLogConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Full path of the log file
    pub fn path(&self) -> PathBuf {
        self.base_dir.join(&self.file_name)
    }
}

struct AppendState {
    writer: BlockWriter<File>,
    /// Current file length
    len: u64,
}

impl AppendState {
    /// Take the length from the file itself and seal a trailing block
    /// that has no `END` byte
    async fn resync(&mut self, path: &Path) -> Result<(), StorageError> {
        let mut len = self.writer.get_ref().metadata().await?.len();
        if len > 0 && last_byte(path).await? != END_BYTE {
            warn!(
                path = %path.display(),
                offset = len,
                "Record log ends inside a block, sealing it"
            );
            len += self.writer.seal().await? as u64;
            self.writer.flush().await?;
        }
        self.len = len;
        Ok(())
    }

    async fn write_frame(&mut self, payload: &[u8], sync: bool) -> Result<usize, StorageError> {
        let written = self.writer.write_block(payload).await?;
        self.writer.flush().await?;
        if sync {
            self.writer.get_ref().sync_data().await?;
        }
        Ok(written)
    }
}

/// Append-only log of framed error records
///
/// Appends are serialized by a single lock. Readers open their own file
/// handle and only address bytes that were already written, so they never
/// contend with the writer.
pub struct RecordLog {
    config: RecordLogConfig,
    path: PathBuf,
    state: Mutex<Option<AppendState>>,
}

impl RecordLog {
    /// Open or create the record log
    ///
    /// A trailing block left incomplete by an interrupted write is sealed
    /// with an `END` byte so it cannot swallow the next appended block.
    #[instrument(skip_all, fields(dir = %config.base_dir.display()))]
    pub async fn open(config: RecordLogConfig) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&config.base_dir).await?;
        let path = config.path();

        info!(path = %path.display(), "Opening record log");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut state = AppendState {
            writer: BlockWriter::new(file),
            len: 0,
        };
        state.resync(&path).await?;

        debug!(offset = state.len, "Record log opened");

        Ok(Self {
            config,
            path,
            state: Mutex::new(Some(state)),
        })
    }

    /// Append a record, returning the offset of its block
    #[instrument(skip_all, fields(service = %record.request.service_name))]
    pub async fn append(&self, record: &StoredRecord) -> Result<u64, StorageError> {
        let bytes = record.to_bytes()?;
        self.append_block(&bytes).await
    }

    /// Append a raw payload as one block, returning the offset of the block
    ///
    /// If the write fails part way, the tracked length is re-read from the
    /// file and a partial frame is sealed, so later offsets stay exact.
    pub async fn append_block(&self, payload: &[u8]) -> Result<u64, StorageError> {
        let mut guard = self.state.lock().await;
        let state = guard
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.path.display().to_string()))?;

        let offset = state.len;
        match state.write_frame(payload, self.config.sync_on_write).await {
            Ok(written) => {
                state.len += written as u64;
                debug!(offset, bytes = written, "Appended block");
                Ok(offset)
            }
            Err(e) => {
                warn!(offset, error = %e, "Append failed, resyncing with the file");
                if let Err(resync_err) = state.resync(&self.path).await {
                    warn!(error = %resync_err, "Failed to resync record log");
                }
                Err(e)
            }
        }
    }

    /// Open an independent seekable reader over the log
    pub async fn open_reader(&self) -> Result<BlockReader<File>, StorageError> {
        Self::open_reader_at(&self.path).await
    }

    /// Open a seekable reader over any record log file
    pub async fn open_reader_at(path: impl AsRef<Path>) -> Result<BlockReader<File>, StorageError> {
        let file = File::open(path.as_ref()).await?;
        Ok(BlockReader::seekable(file))
    }

    /// Start a newest-first scan for records matching `filter`
    pub async fn history_scan(&self, filter: ServiceFilter) -> Result<HistoryScan, StorageError> {
        Ok(HistoryScan::new(self.open_reader().await?, filter))
    }

    /// Like [`history_scan`](Self::history_scan), ignoring blocks at or
    /// after offset `end`
    pub async fn history_scan_before(
        &self,
        filter: ServiceFilter,
        end: u64,
    ) -> Result<HistoryScan, StorageError> {
        Ok(HistoryScan::new(self.open_reader().await?, filter).ending_at(end))
    }

    /// Collect up to `max` matching records, newest first
    #[instrument(skip(self, filter), fields(services = ?filter.services()))]
    pub async fn history(
        &self,
        filter: &ServiceFilter,
        max: usize,
    ) -> Result<Vec<StoredRecord>, StorageError> {
        history_from(self.open_reader().await?, filter.clone(), max).await
    }

    /// Current length of the log file in bytes
    pub async fn len(&self) -> u64 {
        self.state.lock().await.as_ref().map_or(0, |s| s.len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &RecordLogConfig {
        &self.config
    }

    /// Close the log file
    pub async fn close(&self) -> Result<(), StorageError> {
        let mut guard = self.state.lock().await;
        if let Some(mut state) = guard.take() {
            state.writer.flush().await?;
            state.writer.get_ref().sync_all().await?;
        }
        Ok(())
    }
}

async fn last_byte(path: &Path) -> Result<u8, StorageError> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::End(-1)).await?;
    let mut b = [0u8; 1];
    file.read_exact(&mut b).await?;
    Ok(b[0])
}

/// Newest-first iterator over the records matching a filter
///
/// Blocks that do not decode as records are skipped.
pub struct HistoryScan {
    reader: BlockReader<File>,
    filter: ServiceFilter,
    /// Offset the scan starts from, end of file if `None`
    end: Option<u64>,
    started: bool,
    exhausted: bool,
    scanned: usize,
}

impl HistoryScan {
    pub fn new(reader: BlockReader<File>, filter: ServiceFilter) -> Self {
        Self {
            reader,
            filter,
            end: None,
            started: false,
            exhausted: false,
            scanned: 0,
        }
    }

    /// Start scanning backward from offset `end` instead of end of file
    pub fn ending_at(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }

    /// The next older matching record, or `None` at the beginning of the log
    pub async fn next_match(&mut self) -> Result<Option<StoredRecord>, StorageError> {
        while !self.exhausted {
            let block = if self.started {
                self.reader.read_previous_block().await
            } else {
                self.started = true;
                match self.end {
                    Some(end) => {
                        self.reader.seek_to(end).await?;
                        self.reader.read_previous_block().await
                    }
                    None => self.reader.read_last_block().await,
                }
            };

            let block = match block {
                Ok(block) => block,
                Err(e) if e.is_end_of_stream() => {
                    self.exhausted = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            self.scanned += 1;

            match StoredRecord::from_bytes(&block) {
                Ok(record) if self.filter.matches(&record) => return Ok(Some(record)),
                Ok(_) => {}
                Err(e) => {
                    debug!(offset = self.reader.position(), error = %e, "Skipping undecodable block");
                }
            }
        }
        Ok(None)
    }

    /// Number of blocks read so far
    pub fn blocks_scanned(&self) -> usize {
        self.scanned
    }
}

/// Collect up to `max` records matching `filter` from the end of the log
/// behind `reader`, newest first
pub async fn history_from(
    reader: BlockReader<File>,
    filter: ServiceFilter,
    max: usize,
) -> Result<Vec<StoredRecord>, StorageError> {
    let mut scan = HistoryScan::new(reader, filter);
    let mut records = Vec::new();
    while records.len() < max {
        match scan.next_match().await? {
            Some(record) => records.push(record),
            None => break,
        }
    }
    debug!(
        scanned = scan.blocks_scanned(),
        matched = records.len(),
        "History collected"
    );
    Ok(records)
}

/// Count blocks in a record log from the start, returning
/// `(total, matching)`
pub async fn count_blocks(
    reader: &mut BlockReader<File>,
    filter: &ServiceFilter,
) -> Result<(usize, usize), StorageError> {
    let mut total = 0;
    let mut matching = 0;
    loop {
        match reader.read_block().await {
            Ok(block) => {
                total += 1;
                if filter.matches_block(&block).is_some() {
                    matching += 1;
                }
            }
            Err(StreamBlockError::EndOfStream) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok((total, matching))
}
