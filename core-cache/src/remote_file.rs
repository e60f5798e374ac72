//! # Remote Random-Access File
//!
//! A random-access view of a remote file backed by a sparse local cache
//! file. Reads are served from disk; bytes that are not local yet are pulled
//! by a single background fetch job and the reader blocks until they are
//! committed.
//!
//! ## Fetch state
//!
//! ```text
//!             request_fetch                      end of stream, all covered
//!   Idle ────────────────────► Fetching ───────────────────────────► Completed
//!    ▲                            │  │
//!    │  end of stream, gaps left  │  │ retries exhausted
//!    └────────────────────────────┘  ▼
//!    ▲                             Failed
//!    └──────── request_fetch ────────┘
//! ```
//!
//! A request for an offset the running job will reach anyway is ignored.
//! Any other request supersedes the running job.
//!
//! ## Blocking
//!
//! [`RemoteRandomAccessFile::read`] and [`RemoteRandomAccessFile::close`]
//! block the calling thread. From async code, call them through
//! `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{file_name_for_key, CacheRecordStore};
use core_async::runtime::Handle;
use core_runtime::logging::{short_key, strip_path};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, instrument, trace, warn};

use crate::cache_file::CacheFile;
use crate::chunk_set::{ByteRange, ChunkSet};
use crate::config::FetchConfig;
use crate::error::{CacheError, Result};
use crate::fetch::{CancelCause, FetchJob, FetchOutcome, PendingSpan};
use crate::record::CacheRecord;
use crate::source::{estimate_length, FileSource};
use crate::stats::{FetchStats, FetchStatsSnapshot};

/// Length reported while nothing better is known.
pub const UNBOUNDED_LENGTH: u64 = i64::MAX as u64;

/// Subdirectory of the cache directory that holds cache files, apart from
/// anything else a host keeps there (such as `records/`).
pub const CACHE_FILES_DIR: &str = "files";

/// Location of the cache file for `key` under `cache_dir`.
pub fn cache_file_path(cache_dir: &Path, key: &str) -> PathBuf {
    cache_dir.join(CACHE_FILES_DIR).join(file_name_for_key(key))
}

/// Fetch-side state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Fetching,
    Completed,
    /// The last job gave up; the next request launches a fresh one
    Failed,
}

pub(crate) struct State {
    pub(crate) record: CacheRecord,
    pub(crate) total_length: Option<u64>,
    pub(crate) phase: FetchPhase,
    /// Absolute write cursor of the current job
    pub(crate) current_position: u64,
    pub(crate) last_launched_from: Option<u64>,
    pub(crate) job: Option<FetchJob>,
    /// Bumped each time the current job fails
    pub(crate) failure_generation: u64,
    pub(crate) next_job_id: u64,
    pub(crate) closed: bool,
}

impl State {
    fn is_completed(&self) -> bool {
        self.phase == FetchPhase::Completed
    }

    fn is_current(&self, id: u64) -> bool {
        self.job.as_ref().is_some_and(|job| job.id == id)
    }
}

pub(crate) struct Shared {
    pub(crate) key: String,
    pub(crate) source: FileSource,
    pub(crate) config: FetchConfig,
    pub(crate) file: CacheFile,
    pub(crate) stats: FetchStats,
    store: Arc<dyn CacheRecordStore>,
    runtime: Handle,
    state: Mutex<State>,
    progress: Condvar,
    persist_lock: Mutex<()>,
}

impl Shared {
    pub(crate) fn log_key(&self) -> String {
        short_key(&self.key)
    }

    pub(crate) fn total_length(&self) -> Option<u64> {
        self.state.lock().total_length
    }

    /// Moves the current job's cursor. Stale jobs are ignored.
    pub(crate) fn advance(&self, id: u64, position: u64) {
        let mut state = self.state.lock();
        if state.is_current(id) {
            state.current_position = position;
        }
    }

    /// Adds the pending span to the record and wakes readers.
    ///
    /// Spans from superseded jobs are committed too: the bytes are on disk.
    pub(crate) fn commit(&self, id: u64, span: &mut PendingSpan) {
        if span.pending() == 0 {
            return;
        }
        let Some(range) = ByteRange::new(span.committed, span.position - 1) else {
            return;
        };

        let ranges = {
            let mut state = self.state.lock();
            state.record.chunks.add(range);
            state.record.chunks.len()
        };
        span.committed = span.position;

        self.stats.record_commit(range.len());
        self.progress.notify_all();
        trace!(key = %self.log_key(), job = id, range = %range, ranges, "Committed span");
    }

    pub(crate) fn set_total_length(&self, total: u64) {
        let mut state = self.state.lock();
        if let Some(previous) = state.total_length {
            if previous != total {
                warn!(
                    key = %self.log_key(),
                    previous,
                    reported = total,
                    "Remote length changed, trusting the stream"
                );
                state.record.chunks.truncate_to(total);
            }
        }
        state.total_length = Some(total);
        state.record.local_length = Some(total);
    }

    /// Records that the stream of job `id` ended at `position`.
    pub(crate) fn mark_exhausted(&self, id: u64, position: u64) {
        let mut state = self.state.lock();
        if state.total_length.is_none() {
            debug!(key = %self.log_key(), job = id, length = position, "Length learned from end of stream");
        }
        state.total_length = Some(position);
        state.record.local_length = Some(position);
    }

    pub(crate) fn finish_job(&self, id: u64, outcome: &FetchOutcome) {
        {
            let mut state = self.state.lock();
            let current = state.is_current(id);
            if current {
                state.job = None;
            }

            match outcome {
                FetchOutcome::Completed => {
                    debug!(key = %self.log_key(), job = id, length = ?state.total_length, "Fetch reached end of stream");
                }
                FetchOutcome::Superseded => debug!(key = %self.log_key(), job = id, "Fetch superseded"),
                FetchOutcome::Closed => debug!(key = %self.log_key(), job = id, "Fetch stopped by close"),
                FetchOutcome::Failed(_) => {
                    self.stats.record_failure();
                    if current {
                        state.failure_generation += 1;
                    }
                }
            }

            if state.record.is_complete() {
                if !state.is_completed() {
                    info!(
                        key = %self.log_key(),
                        length = ?state.record.local_length,
                        "File fully cached"
                    );
                }
                state.record.completed = true;
                state.phase = FetchPhase::Completed;
                if let Some(len) = state.record.local_length {
                    state.current_position = len;
                }
            } else if current {
                state.phase = match outcome {
                    FetchOutcome::Failed(_) => FetchPhase::Failed,
                    _ => FetchPhase::Idle,
                };
            }
        }

        self.progress.notify_all();
        if let Err(e) = self.file.sync() {
            warn!(key = %self.log_key(), error = %e, "Failed to sync cache file");
        }
        self.persist();
    }

    /// Saves a snapshot of the record. Saves are serialized so an older
    /// snapshot never overwrites a newer one.
    pub(crate) fn persist(&self) {
        let _guard = self.persist_lock.lock();
        let stored = self.state.lock().record.to_stored();

        match self.store.save(&self.key, &stored) {
            Ok(()) => trace!(key = %self.log_key(), chunks = %stored.chunks, "Persisted cache record"),
            Err(e) => warn!(key = %self.log_key(), error = %e, "Failed to persist cache record"),
        }
    }

    /// Launches a job at `from` unless one is running or nothing is missing.
    /// Returns true if a job was launched.
    pub(crate) fn request_fetch_locked(self: &Arc<Self>, state: &mut State, from: u64) -> bool {
        if state.closed || state.is_completed() {
            return false;
        }

        let active = state.job.is_some();

        if active && state.total_length.is_none() {
            trace!(key = %self.log_key(), from, "Length unknown and a fetch is running");
            return false;
        }

        if active {
            let reach = state
                .current_position
                .saturating_add(self.config.overlap_window);
            let ahead_of_cursor = from > 0 && from <= reach;
            let behind_launch = state.last_launched_from.is_some_and(|last| from <= last);

            if ahead_of_cursor || behind_launch {
                trace!(
                    key = %self.log_key(),
                    from,
                    position = state.current_position,
                    last_launch = ?state.last_launched_from,
                    "Request overlaps running fetch"
                );
                state.last_launched_from = Some(from);
                return false;
            }
        }

        if let Some(len) = state.total_length {
            if from >= len {
                trace!(key = %self.log_key(), from, len, "Request past end of file");
                return false;
            }
            let rest = ByteRange::new(from, len - 1);
            if rest.is_some_and(|rest| state.record.chunks.covers_gap_free(rest)) {
                trace!(key = %self.log_key(), from, len, "Remainder already cached");
                return false;
            }
        }

        let previous = state.job.take().map(|job| {
            job.signal.cancel(CancelCause::Superseded);
            self.stats.record_superseded();
            debug!(key = %self.log_key(), job = job.id, from = job.from, "Superseding fetch");
            job.handle
        });

        let id = state.next_job_id;
        state.next_job_id += 1;
        state.job = Some(FetchJob::spawn(&self.runtime, Arc::clone(self), id, from, previous));
        state.last_launched_from = Some(from);
        state.current_position = from;
        state.phase = FetchPhase::Fetching;
        self.stats.record_launch();

        debug!(key = %self.log_key(), job = id, from, "Fetch launched");
        true
    }
}

/// Cloneable handle to one cached remote file.
#[derive(Clone)]
pub struct RemoteRandomAccessFile {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RemoteRandomAccessFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("RemoteRandomAccessFile")
            .field("key", &self.shared.key)
            .field("path", &self.shared.file.path())
            .field("phase", &state.phase)
            .field("total_length", &state.total_length)
            .field("chunks", &state.record.chunks.to_string())
            .finish()
    }
}

impl RemoteRandomAccessFile {
    /// Opens the cache file for `key` under `cache_dir`, restoring any
    /// persisted record, and starts fetching the first missing span when
    /// `prefetch_on_open` is set.
    ///
    /// # Errors
    ///
    /// - `CacheError::InvalidConfig` if `config` fails validation
    /// - `CacheError::Io` if the cache directory or file cannot be opened
    #[instrument(skip(source, config, store, cache_dir, runtime), fields(key = %short_key(key)))]
    pub fn open(
        key: &str,
        source: FileSource,
        config: FetchConfig,
        store: Arc<dyn CacheRecordStore>,
        cache_dir: &Path,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate().map_err(CacheError::InvalidConfig)?;
        std::fs::create_dir_all(cache_dir.join(CACHE_FILES_DIR))?;

        let path = cache_file_path(cache_dir, key);
        let file = CacheFile::open(&path)?;
        let record = restore_record(key, &path, store.as_ref(), &file, &source)?;

        let completed = record.is_complete();
        let total_length = record.local_length;
        let mut record = record;
        record.completed = completed;

        let state = State {
            current_position: if completed { total_length.unwrap_or(0) } else { 0 },
            phase: if completed {
                FetchPhase::Completed
            } else {
                FetchPhase::Idle
            },
            record,
            total_length,
            last_launched_from: None,
            job: None,
            failure_generation: 0,
            next_job_id: 1,
            closed: false,
        };

        let shared = Arc::new(Shared {
            key: key.to_string(),
            source,
            config,
            file,
            stats: FetchStats::default(),
            store,
            runtime,
            state: Mutex::new(state),
            progress: Condvar::new(),
            persist_lock: Mutex::new(()),
        });

        {
            let mut state = shared.state.lock();
            info!(
                file = %strip_path(&path.to_string_lossy()),
                length = ?state.total_length,
                chunks = %state.record.chunks,
                completed,
                "Opened remote file"
            );

            if !completed && shared.config.prefetch_on_open {
                let from = state.record.chunks.first_gap_from(0);
                shared.request_fetch_locked(&mut state, from);
            }
        }

        Ok(Self { shared })
    }

    /// Reads up to `buf.len()` bytes at `offset`.
    ///
    /// Blocks until the requested span is cached, the file is complete, or
    /// the current fetch fails. Returns the number of bytes read, `0` at or
    /// past the end of the file. After a failure only bytes already in the
    /// cache are returned.
    #[instrument(level = "trace", skip(self, buf), fields(key = %self.shared.log_key(), size = buf.len()))]
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let size = buf.len();
        let end = offset
            .checked_add(size as u64)
            .filter(|end| *end <= UNBOUNDED_LENGTH)
            .ok_or(CacheError::InvalidRange { offset, size })?;
        if size == 0 {
            return Ok(0);
        }

        let shared = &self.shared;
        let mut state = shared.state.lock();
        let failure_generation = state.failure_generation;
        let mut requested = false;
        let mut waited = false;

        loop {
            if state.closed {
                return Err(CacheError::Closed(shared.key.clone()));
            }
            if state.is_completed() {
                break;
            }
            if state.total_length.is_some_and(|len| offset >= len) {
                break;
            }

            let wanted_end = state.total_length.map_or(end, |len| end.min(len));
            let wanted = ByteRange::new(offset, wanted_end - 1);
            if wanted.is_some_and(|wanted| state.record.chunks.covers_gap_free(wanted)) {
                break;
            }

            if state.failure_generation != failure_generation {
                warn!(key = %shared.log_key(), offset, size, "Fetch failed, serving cached bytes only");
                break;
            }

            if !requested || state.job.is_none() {
                shared.request_fetch_locked(&mut state, offset);
                requested = true;
                if state.job.is_none() {
                    break;
                }
            }

            waited = true;
            shared.progress.wait_for(&mut state, shared.config.poll_interval);
        }

        let available = if state.is_completed() {
            let len = state.record.local_length.unwrap_or(end);
            end.min(len).saturating_sub(offset)
        } else {
            state
                .record
                .chunks
                .contains(offset)
                .map_or(0, |range| (range.last() + 1).min(end) - offset)
        };
        drop(state);

        let read = if available == 0 {
            0
        } else {
            shared.file.read_at(offset, &mut buf[..available as usize])?
        };

        shared.stats.record_read(waited);
        trace!(key = %shared.log_key(), offset, size, read, waited, "Read served");
        Ok(read)
    }

    /// Best known length of the remote file.
    ///
    /// The recorded length once known, else a bitrate estimate, else
    /// [`UNBOUNDED_LENGTH`].
    pub fn length(&self) -> u64 {
        let state = self.shared.state.lock();
        if let Some(len) = state.total_length.or(state.record.local_length) {
            return len;
        }

        let source = &self.shared.source;
        source
            .bitrate
            .or(state.record.bitrate)
            .zip(source.duration_ms)
            .and_then(|(bitrate, duration_ms)| estimate_length(bitrate, duration_ms))
            .unwrap_or(UNBOUNDED_LENGTH)
    }

    /// Starts fetching from `from` unless a running job, the cache, or the
    /// end of the file already accounts for it. Returns true if a new job
    /// was launched.
    ///
    /// While a job runs, a request with `0 < from <= current_position +
    /// overlap_window` is left to it, as is any request at or before the
    /// last requested offset. [`FetchConfig::overlap_window`] therefore
    /// widens the `(0, current_position]` band; with a window of 0 only
    /// offsets the job has already passed are ignored.
    #[instrument(level = "debug", skip(self), fields(key = %self.shared.log_key()))]
    pub fn request_fetch(&self, from: u64) -> bool {
        let mut state = self.shared.state.lock();
        self.shared.request_fetch_locked(&mut state, from)
    }

    /// Cancels any job, persists the record and releases the cache file.
    /// Idempotent.
    #[instrument(level = "debug", skip(self), fields(key = %self.shared.log_key()))]
    pub fn close(&self) {
        let shared = &self.shared;
        let job = {
            let mut state = shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            if !state.is_completed() {
                state.phase = FetchPhase::Idle;
            }
            state.job.take()
        };

        if let Some(job) = job {
            job.signal.cancel(CancelCause::Closing);
            debug!(key = %shared.log_key(), job = job.id, "Cancelled fetch on close");
        }

        shared.progress.notify_all();
        shared.persist();
        shared.file.close();

        let stats = shared.stats.snapshot();
        info!(
            key = %shared.log_key(),
            launches = stats.fetch_launches,
            bytes_fetched = stats.bytes_fetched,
            reads = stats.reads_served,
            "Closed remote file"
        );
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    pub fn path(&self) -> PathBuf {
        self.shared.file.path().to_path_buf()
    }

    pub fn phase(&self) -> FetchPhase {
        self.shared.state.lock().phase
    }

    pub fn is_completed(&self) -> bool {
        self.shared.state.lock().is_completed()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Remote length as reported by a stream, if any has been opened.
    pub fn total_length(&self) -> Option<u64> {
        self.shared.total_length()
    }

    /// Write cursor of the running job, or of the last one.
    pub fn current_position(&self) -> u64 {
        self.shared.state.lock().current_position
    }

    /// Start offset of the running job.
    pub fn active_fetch_from(&self) -> Option<u64> {
        self.shared.state.lock().job.as_ref().map(|job| job.from)
    }

    pub fn cached_ranges(&self) -> ChunkSet {
        self.shared.state.lock().record.chunks.clone()
    }

    pub fn record(&self) -> CacheRecord {
        self.shared.state.lock().record.clone()
    }

    pub fn stats(&self) -> FetchStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// True if both values refer to the same underlying handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

fn restore_record(
    key: &str,
    path: &Path,
    store: &dyn CacheRecordStore,
    file: &CacheFile,
    source: &FileSource,
) -> Result<CacheRecord> {
    let mut record = match store.load(key) {
        Ok(Some(stored)) => {
            let record = CacheRecord::from_stored(key, stored);
            if record.local_path == path {
                record
            } else {
                debug!(
                    stored = %strip_path(&record.local_path.to_string_lossy()),
                    "Record points at another cache file, starting empty"
                );
                CacheRecord::new(key, path)
            }
        }
        Ok(None) => CacheRecord::new(key, path),
        Err(e) => {
            warn!(error = %e, "Failed to load cache record, starting empty");
            CacheRecord::new(key, path)
        }
    };

    record.reconcile_with_disk(file.len()?);
    if source.bitrate.is_some() {
        record.bitrate = source.bitrate;
    }
    Ok(record)
}
