//! Per-conversation message buffers
//!
//! Each conversation keeps a bounded FIFO of formatted lines
//! (`"<name>: <text>"`). Buffers are created lazily, live only in memory and
//! are emptied on `/clear` or after a successful summary.
//!
//! Every buffer sits behind its own mutex. All operations here are
//! synchronous, so no lock can be held across an `.await`: the summarizer
//! copies a [`Window`] out and releases the lock before calling the backend.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, trace};

use crate::config::DEFAULT_BUFFER_CAPACITY;
use crate::error::{Error, Result};
use crate::ids::ConversationId;
use crate::nickname::DisplayName;

/// Lines starting with this character are never summarized
pub const COMMAND_PREFIX: char = '/';

/// One buffered message, bound to its author's name at ingestion time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLine(String);

impl FormattedLine {
    /// Format a message as `"<name>: <trimmed text>"`
    ///
    /// Returns `None` when the text is blank.
    pub fn new(author: &DisplayName, raw_text: &str) -> Option<Self> {
        let text = raw_text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self(format!("{}: {}", author, text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the line may be sent to the backend
    pub fn is_eligible(&self) -> bool {
        let trimmed = self.0.trim();
        !trimmed.is_empty() && !trimmed.starts_with(COMMAND_PREFIX)
    }
}

impl From<String> for FormattedLine {
    fn from(line: String) -> Self {
        Self(line)
    }
}

impl From<&str> for FormattedLine {
    fn from(line: &str) -> Self {
        Self(line.to_string())
    }
}

impl fmt::Display for FormattedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-empty, ordered selection of lines copied out of a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    lines: Vec<FormattedLine>,
}

impl Window {
    fn new(lines: Vec<FormattedLine>) -> Option<Self> {
        if lines.is_empty() {
            None
        } else {
            Some(Self { lines })
        }
    }

    pub fn lines(&self) -> &[FormattedLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false for a selected window
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines joined with newlines, oldest first
    pub fn joined(&self) -> String {
        self.lines
            .iter()
            .map(FormattedLine::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single conversation's bounded line buffer
#[derive(Debug)]
pub struct ConversationBuffer {
    lines: VecDeque<FormattedLine>,
    capacity: usize,
}

impl ConversationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a line, evicting the oldest one if the buffer overflows
    pub fn push(&mut self, line: FormattedLine) -> Option<FormattedLine> {
        self.lines.push_back(line);
        if self.lines.len() > self.capacity {
            self.lines.pop_front()
        } else {
            None
        }
    }

    /// Eligible lines among the last `count` entries
    pub fn window(&self, count: usize) -> Option<Window> {
        let start = self.lines.len().saturating_sub(count);
        let lines = self
            .lines
            .range(start..)
            .filter(|line| line.is_eligible())
            .cloned()
            .collect();
        Window::new(lines)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lines(&self) -> impl Iterator<Item = &FormattedLine> {
        self.lines.iter()
    }
}

/// Buffer state never breaks mid-operation, so a poisoned lock is still usable
fn lock(buffer: &Mutex<ConversationBuffer>) -> MutexGuard<'_, ConversationBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns every conversation's buffer
#[derive(Debug)]
pub struct BufferManager {
    capacity: usize,
    buffers: RwLock<HashMap<ConversationId, Arc<Mutex<ConversationBuffer>>>>,
}

impl Default for BufferManager {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl BufferManager {
    /// Create a manager whose buffers hold at most `capacity` lines
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn existing(&self, id: ConversationId) -> Option<Arc<Mutex<ConversationBuffer>>> {
        self.buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn get_or_create(&self, id: ConversationId) -> Arc<Mutex<ConversationBuffer>> {
        if let Some(buffer) = self.existing(id) {
            return buffer;
        }
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(ConversationBuffer::new(self.capacity))))
            .clone()
    }

    /// Record a message from `author`
    ///
    /// Blank messages are ignored. Returns whether a line was added.
    pub fn append(&self, id: ConversationId, author: &DisplayName, raw_text: &str) -> bool {
        match FormattedLine::new(author, raw_text) {
            Some(line) => {
                self.push(id, line);
                true
            }
            None => false,
        }
    }

    /// Append an already formatted line
    pub fn push(&self, id: ConversationId, line: FormattedLine) {
        let buffer = self.get_or_create(id);
        let mut buffer = lock(&buffer);
        if buffer.push(line).is_some() {
            trace!(conversation_id = %id, "Evicted oldest buffered line");
        }
    }

    /// Copy out the eligible lines among the last `count` entries
    ///
    /// `None` means nothing is left to summarize. The buffer is not modified.
    pub fn select_window(&self, id: ConversationId, count: usize) -> Option<Window> {
        if count == 0 {
            return None;
        }
        let buffer = self.existing(id)?;
        let window = lock(&buffer).window(count);
        debug!(
            conversation_id = %id,
            requested = count,
            selected = window.as_ref().map_or(0, Window::len),
            "Selected summary window"
        );
        window
    }

    /// Empty a conversation's buffer; unknown conversations are fine
    pub fn clear(&self, id: ConversationId) {
        if let Some(buffer) = self.existing(id) {
            lock(&buffer).clear();
            debug!(conversation_id = %id, "Buffer cleared");
        }
    }

    /// Number of buffered lines (0 for unseen conversations)
    pub fn count(&self, id: ConversationId) -> usize {
        self.existing(id).map_or(0, |buffer| lock(&buffer).len())
    }

    /// Copy of every buffered line, oldest first
    pub fn snapshot(&self, id: ConversationId) -> Vec<FormattedLine> {
        self.existing(id)
            .map(|buffer| lock(&buffer).lines().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of conversations that have received at least one message
    pub fn conversation_count(&self) -> usize {
        self.buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Parse the optional count argument of `/sum`
///
/// Absent means `default`; anything that is not a positive integer is an
/// [`Error::InvalidCount`].
pub fn parse_count(arg: Option<&str>, default: usize) -> Result<usize> {
    let Some(raw) = arg.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(default);
    };

    match raw.trim_start_matches('+').parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(Error::InvalidCount(raw.to_string())),
    }
}
