// src/log/buffer.rs

//! Append-only text buffer with offset-based reads.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::errors::{Result, RunwireError};

/// How many appended chunks a slow push subscriber may fall behind before it
/// starts missing them. Missed chunks are recovered through polling.
const CHUNK_CHANNEL_CAPACITY: usize = 1024;

/// A single append, as seen by push subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    /// Byte offset at which `content` starts in the buffer.
    pub offset: usize,
    pub content: String,
}

impl LogChunk {
    /// Offset just past this chunk.
    pub fn end(&self) -> usize {
        self.offset + self.content.len()
    }
}

/// Append-only run output.
///
/// Cloning is cheap and yields another handle to the same buffer. Appends
/// are atomic: a reader either sees a whole append or none of it, and the
/// chunk broadcast is emitted under the same lock, so subscribers receive
/// chunks in buffer order.
///
/// Offsets are byte offsets into the UTF-8 text. Style codes embedded in the
/// text are stored verbatim.
#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    text: RwLock<String>,
    chunks: broadcast::Sender<LogChunk>,
}

impl LogBuffer {
    pub fn new() -> Self {
        let (chunks, _) = broadcast::channel(CHUNK_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                text: RwLock::new(String::new()),
                chunks,
            }),
        }
    }

    /// Append `text` and return the new total length.
    ///
    /// Empty appends are ignored and do not notify subscribers.
    pub fn append(&self, text: &str) -> usize {
        let mut guard = self
            .inner
            .text
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if text.is_empty() {
            return guard.len();
        }

        let offset = guard.len();
        guard.push_str(text);

        // No subscribers is fine; pushes are best effort.
        let _ = self.inner.chunks.send(LogChunk {
            offset,
            content: text.to_string(),
        });

        guard.len()
    }

    /// Append `line` followed by a newline as one atomic append.
    pub fn append_line(&self, line: &str) -> usize {
        let mut text = String::with_capacity(line.len() + 1);
        text.push_str(line);
        text.push('\n');
        self.append(&text)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Everything from `from` to the current end.
    ///
    /// Offsets at or past the end yield an empty string. An offset that falls
    /// inside a multi-byte character cannot have been produced by this buffer
    /// and is rejected.
    pub fn slice(&self, from: usize) -> Result<String> {
        let guard = self.read();
        if from >= guard.len() {
            return Ok(String::new());
        }
        if !guard.is_char_boundary(from) {
            return Err(RunwireError::InvalidOffset {
                offset: from,
                len: guard.len(),
            });
        }
        Ok(guard[from..].to_string())
    }

    /// Full contents as a single string.
    pub fn contents(&self) -> String {
        self.read().clone()
    }

    /// Subscribe to future appends.
    pub fn subscribe(&self) -> broadcast::Receiver<LogChunk> {
        self.inner.chunks.subscribe()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, String> {
        self.inner
            .text
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBuffer")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
