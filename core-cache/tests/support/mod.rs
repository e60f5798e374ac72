//! Shared fixtures for the cache integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, RemoteStream, RemoteStreamFactory};
use bytes::Bytes;
use core_cache::{FetchConfig, RemoteRandomAccessFile};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;

/// Content of the fake remote file at `offset`.
pub fn byte_at(offset: u64) -> u8 {
    (offset % 251) as u8
}

pub fn expected_bytes(offset: u64, len: usize) -> Vec<u8> {
    (offset..offset + len as u64).map(byte_at).collect()
}

pub fn temp_cache_dir() -> PathBuf {
    std::env::temp_dir().join(format!("core-cache-test-{}", Uuid::new_v4()))
}

/// Short delays so failure paths finish quickly.
pub fn fast_config() -> FetchConfig {
    FetchConfig::default()
        .with_retry_delay(Duration::from_millis(10))
        .with_poll_interval(Duration::from_millis(20))
}

// ============================================================================
// Scripted remote
// ============================================================================

/// What a single `open` call does. Consumed in order, one per call; once
/// the script is empty every call streams to the end.
#[derive(Debug, Clone, Copy)]
pub enum Attempt {
    /// Stream to the end
    Full,
    /// Yield `after` bytes, then a transient error
    Reset { after: u64 },
    /// Yield `after` bytes, then end the stream early
    Eof { after: u64 },
    /// Fail the open itself
    Refuse { transient: bool },
}

/// A fake remote file of `len` bytes with contents from [`byte_at`].
pub struct ScriptedRemote {
    len: u64,
    report_length: bool,
    chunk_size: usize,
    script: Mutex<VecDeque<Attempt>>,
    opens: Mutex<Vec<u64>>,
    hold_at: Option<u64>,
    gate: watch::Sender<bool>,
    fill: Option<u8>,
}

impl ScriptedRemote {
    pub fn new(len: u64) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            len,
            report_length: true,
            chunk_size: 8 * 1024,
            script: Mutex::new(VecDeque::new()),
            opens: Mutex::new(Vec::new()),
            hold_at: None,
            gate,
            fill: None,
        }
    }

    /// Do not report the total length when a stream is opened.
    pub fn without_length(mut self) -> Self {
        self.report_length = false;
        self
    }

    /// Every byte of the file is `byte` instead of the [`byte_at`] pattern.
    pub fn with_fill(mut self, byte: u8) -> Self {
        self.fill = Some(byte);
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_script(self, attempts: impl IntoIterator<Item = Attempt>) -> Self {
        self.script.lock().extend(attempts);
        self
    }

    /// Streams stop before absolute offset `offset` until [`Self::release`].
    pub fn hold_at(mut self, offset: u64) -> Self {
        self.hold_at = Some(offset);
        self.gate.send_replace(false);
        self
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Start offsets of every `open` call so far.
    pub fn opens(&self) -> Vec<u64> {
        self.opens.lock().clone()
    }

    pub fn len(&self) -> u64 {
        self.len
    }
}

struct Cursor {
    position: u64,
    stop: u64,
    ending: Option<Attempt>,
    chunk_size: usize,
    hold: Option<(u64, watch::Receiver<bool>)>,
    fill: Option<u8>,
}

#[async_trait]
impl RemoteStreamFactory for ScriptedRemote {
    async fn open(&self, start: u64, _end: Option<u64>) -> BridgeResult<RemoteStream> {
        self.opens.lock().push(start);
        let attempt = self.script.lock().pop_front().unwrap_or(Attempt::Full);

        let stop = match attempt {
            Attempt::Refuse { transient: true } => {
                return Err(BridgeError::OperationFailed("connection refused".to_string()))
            }
            Attempt::Refuse { transient: false } => {
                return Err(BridgeError::Http {
                    status: 404,
                    message: "Not Found".to_string(),
                })
            }
            Attempt::Full => self.len,
            Attempt::Reset { after } | Attempt::Eof { after } => (start + after).min(self.len),
        };

        let cursor = Cursor {
            position: start.min(self.len),
            stop,
            ending: match attempt {
                Attempt::Full => None,
                other => Some(other),
            },
            chunk_size: self.chunk_size,
            hold: self.hold_at.map(|at| (at, self.gate.subscribe())),
            fill: self.fill,
        };

        let data = futures::stream::unfold(Some(cursor), |cursor| async move {
            let mut cursor = cursor?;

            if cursor.position >= cursor.stop {
                return match cursor.ending {
                    Some(Attempt::Reset { .. }) => Some((
                        Err(BridgeError::OperationFailed("connection reset".to_string())),
                        None,
                    )),
                    _ => None,
                };
            }

            if let Some((at, gate)) = cursor.hold.as_mut() {
                if cursor.position >= *at {
                    loop {
                        let open = *gate.borrow();
                        if open || gate.changed().await.is_err() {
                            break;
                        }
                    }
                }
            }

            let n = (cursor.chunk_size as u64).min(cursor.stop - cursor.position);
            let bytes = match cursor.fill {
                Some(byte) => Bytes::from(vec![byte; n as usize]),
                None => Bytes::from(expected_bytes(cursor.position, n as usize)),
            };
            cursor.position += n;
            Some((Ok(bytes), Some(cursor)))
        })
        .boxed();

        let total_length = self.report_length.then_some(self.len);
        Ok(RemoteStream::new(total_length, data))
    }
}

// ============================================================================
// Waiting helpers
// ============================================================================

/// Polls `condition` until it holds, panicking after five seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Blocking read on the blocking pool.
pub async fn read_blocking(file: &RemoteRandomAccessFile, offset: u64, len: usize) -> Vec<u8> {
    let file = file.clone();
    tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; len];
        let read = file.read(offset, &mut buf).unwrap();
        buf.truncate(read);
        buf
    })
    .await
    .unwrap()
}

/// Reads the whole file through the handle.
pub async fn read_to_end(file: &RemoteRandomAccessFile) -> Vec<u8> {
    let file = file.clone();
    tokio::task::spawn_blocking(move || {
        let mut content = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let read = file.read(content.len() as u64, &mut buf).unwrap();
            if read == 0 {
                return content;
            }
            content.extend_from_slice(&buf[..read]);
        }
    })
    .await
    .unwrap()
}
