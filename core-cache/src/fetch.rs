//! Background fetch jobs.
//!
//! A job streams the remote file from a start offset to the end, writing
//! into the cache file and committing spans to the record every
//! `flush_threshold` bytes. Only one job per handle is current at a time:
//! launching a new job cancels the previous one and the new task waits for
//! its predecessor to wind down before opening a stream, so two jobs never
//! write to the file concurrently.
//!
//! ```text
//!   open(start) ──► write ──► write ──► commit ──► ... ──► end of stream
//!        │            │                  notify readers        │
//!        ▼            ▼                                       ▼
//!   transient error ─► commit partial ─► sleep(retry_delay) ─► open(resume)
//!   cancelled       ─► commit partial ─► Superseded / Closed
//! ```

use std::sync::Arc;

use bytes::Bytes;
use core_async::runtime::Handle;
use core_async::sync::{CancellationToken, WaitForCancellationFuture};
use core_async::task::{join_settled, spawn_on, JoinHandle};
use core_async::{select, sleep, StreamExt};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::CacheError;
use crate::remote_file::Shared;

/// Why a job was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// A request outside the running job's reach started a replacement
    Superseded,
    /// The handle is closing
    Closing,
}

/// How a fetch job ended.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Stream read to the end of the remote file
    Completed,
    Superseded,
    Closed,
    /// Retries exhausted or a permanent error
    Failed(CacheError),
}

/// Cancellation handle shared between the owner of a job and its task.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelSignal {
    token: CancellationToken,
    cause: Arc<Mutex<Option<CancelCause>>>,
}

impl CancelSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// First cause wins.
    pub(crate) fn cancel(&self, cause: CancelCause) {
        {
            let mut slot = self.cause.lock();
            if slot.is_none() {
                *slot = Some(cause);
            }
        }
        self.token.cancel();
    }

    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn outcome(&self) -> FetchOutcome {
        match *self.cause.lock() {
            Some(CancelCause::Closing) => FetchOutcome::Closed,
            _ => FetchOutcome::Superseded,
        }
    }
}

/// The job currently owning the fetch side of a handle.
pub(crate) struct FetchJob {
    pub(crate) id: u64,
    pub(crate) from: u64,
    pub(crate) signal: CancelSignal,
    pub(crate) handle: JoinHandle<FetchOutcome>,
}

impl FetchJob {
    pub(crate) fn spawn(
        runtime: &Handle,
        shared: Arc<Shared>,
        id: u64,
        from: u64,
        previous: Option<JoinHandle<FetchOutcome>>,
    ) -> Self {
        let signal = CancelSignal::new();
        let handle = spawn_on(runtime, run_fetch(shared, id, from, signal.clone(), previous));
        Self {
            id,
            from,
            signal,
            handle,
        }
    }
}

/// Bytes written by the current attempt that are not yet in the record.
pub(crate) struct PendingSpan {
    pub(crate) committed: u64,
    pub(crate) position: u64,
}

impl PendingSpan {
    fn starting_at(offset: u64) -> Self {
        Self {
            committed: offset,
            position: offset,
        }
    }

    pub(crate) fn pending(&self) -> u64 {
        self.position - self.committed
    }
}

enum Attempt {
    Finished(FetchOutcome),
    Interrupted { error: CacheError, position: u64 },
}

async fn run_fetch(
    shared: Arc<Shared>,
    id: u64,
    from: u64,
    signal: CancelSignal,
    previous: Option<JoinHandle<FetchOutcome>>,
) -> FetchOutcome {
    if let Some(previous) = previous {
        if let Err(e) = join_settled(previous).await {
            warn!(key = %shared.log_key(), job = id, error = %e, "Previous fetch task ended abnormally");
        }
    }

    let outcome = if signal.is_cancelled() {
        signal.outcome()
    } else {
        info!(key = %shared.log_key(), job = id, from, "Fetch started");
        fetch_with_retry(&shared, id, from, &signal).await
    };

    shared.finish_job(id, &outcome);
    outcome
}

async fn fetch_with_retry(
    shared: &Arc<Shared>,
    id: u64,
    from: u64,
    signal: &CancelSignal,
) -> FetchOutcome {
    let max_retries = shared.config.max_retries;
    let mut start = from;
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            shared.stats.record_retry();
            warn!(
                key = %shared.log_key(),
                job = id,
                attempt,
                max_retries,
                start,
                "Retrying fetch"
            );

            select! {
                biased;
                _ = signal.cancelled() => return signal.outcome(),
                _ = sleep(shared.config.retry_delay) => {}
            }
        }

        match stream_once(shared, id, start, signal).await {
            Attempt::Finished(outcome) => return outcome,
            Attempt::Interrupted { error, position } => {
                if !error.is_transient() || attempt >= max_retries {
                    error!(
                        key = %shared.log_key(),
                        job = id,
                        position,
                        attempts = attempt + 1,
                        error = %error,
                        "Fetch failed"
                    );
                    return FetchOutcome::Failed(error);
                }

                warn!(key = %shared.log_key(), job = id, position, error = %error, "Fetch interrupted");

                // Without a known length the stream cannot be resumed mid-way.
                start = if shared.total_length().is_some() {
                    position
                } else {
                    from
                };
                attempt += 1;
            }
        }
    }
}

async fn stream_once(shared: &Arc<Shared>, id: u64, start: u64, signal: &CancelSignal) -> Attempt {
    if let Some(total) = shared.total_length() {
        if start >= total {
            shared.mark_exhausted(id, total);
            return Attempt::Finished(FetchOutcome::Completed);
        }
    }

    let opened = select! {
        biased;
        _ = signal.cancelled() => return Attempt::Finished(signal.outcome()),
        opened = shared.source.factory.open(start, None) => opened,
    };

    let remote = match opened {
        Ok(remote) => remote,
        Err(e) => {
            return Attempt::Interrupted {
                error: e.into(),
                position: start,
            }
        }
    };

    let expected = remote.total_length;
    if let Some(total) = expected {
        shared.set_total_length(total);
    }
    debug!(key = %shared.log_key(), job = id, start, total = ?expected, "Remote stream opened");

    let mut span = PendingSpan::starting_at(start);
    let mut data = remote.data;

    loop {
        if expected.is_some_and(|total| span.position >= total) {
            shared.commit(id, &mut span);
            shared.mark_exhausted(id, span.position);
            return Attempt::Finished(FetchOutcome::Completed);
        }

        let item = select! {
            biased;
            _ = signal.cancelled() => {
                shared.commit(id, &mut span);
                return Attempt::Finished(signal.outcome());
            }
            item = data.next() => item,
        };

        match item {
            None => {
                shared.commit(id, &mut span);
                if let Some(total) = expected {
                    if span.position < total {
                        return Attempt::Interrupted {
                            error: CacheError::UnexpectedEof {
                                position: span.position,
                                expected: total,
                            },
                            position: span.position,
                        };
                    }
                }
                shared.mark_exhausted(id, span.position);
                return Attempt::Finished(FetchOutcome::Completed);
            }
            Some(Err(e)) => {
                shared.commit(id, &mut span);
                return Attempt::Interrupted {
                    error: e.into(),
                    position: span.position,
                };
            }
            Some(Ok(bytes)) => {
                if let Err(error) = write_received(shared, id, &mut span, bytes, expected) {
                    shared.commit(id, &mut span);
                    return Attempt::Interrupted {
                        error,
                        position: span.position,
                    };
                }
            }
        }
    }
}

/// Writes one received buffer in `transfer_buffer_size` slices.
fn write_received(
    shared: &Shared,
    id: u64,
    span: &mut PendingSpan,
    mut bytes: Bytes,
    expected: Option<u64>,
) -> Result<(), CacheError> {
    if let Some(total) = expected {
        let room = total.saturating_sub(span.position);
        if bytes.len() as u64 > room {
            bytes.truncate(room as usize);
        }
    }

    for piece in bytes.chunks(shared.config.transfer_buffer_size) {
        shared.file.write_at(span.position, piece)?;
        span.position += piece.len() as u64;
        shared.advance(id, span.position);

        if span.pending() >= shared.config.flush_threshold {
            shared.commit(id, span);
        }
    }
    Ok(())
}
