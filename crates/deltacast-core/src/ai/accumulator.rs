//! Fragment accumulation and threshold flushing
//!
//! Fragments are appended to a buffer. Once the buffer grows past the flush
//! threshold, the whole buffer is run through the [`Transform`] and emitted as
//! one newline-terminated output unit, then cleared.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::transform::Transform;
use crate::error::{PipelineError, PipelineResult};

/// Buffer length (in characters) that must be exceeded to trigger a flush
pub const DEFAULT_FLUSH_THRESHOLD: usize = 20;

/// What happens to a buffered tail below the threshold when the stream ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemainderPolicy {
    /// Drop the tail silently
    #[default]
    Discard,
    /// Transform and emit the tail as a final unit
    Flush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorOptions {
    pub flush_threshold: usize,
    pub remainder: RemainderPolicy,
}

impl Default for AccumulatorOptions {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            remainder: RemainderPolicy::default(),
        }
    }
}

/// Owns the accumulation buffer for one pipeline invocation
pub struct Accumulator {
    transform: Arc<dyn Transform>,
    options: AccumulatorOptions,
    buffer: String,
    /// Character count of `buffer`, kept alongside to avoid rescanning
    buffer_chars: usize,
    flush_count: usize,
}

impl Accumulator {
    pub fn new(transform: Arc<dyn Transform>, options: AccumulatorOptions) -> Self {
        Self {
            transform,
            options,
            buffer: String::new(),
            buffer_chars: 0,
            flush_count: 0,
        }
    }

    /// Append a fragment, flushing if the buffer is now over the threshold.
    ///
    /// The transform is awaited before returning, so successive flushes
    /// never overlap.
    pub async fn push(&mut self, fragment: &str) -> PipelineResult<Option<Bytes>> {
        self.buffer.push_str(fragment);
        self.buffer_chars += fragment.chars().count();

        if self.buffer_chars <= self.options.flush_threshold {
            return Ok(None);
        }
        self.flush().await.map(Some)
    }

    /// Handle end of stream according to the remainder policy
    pub async fn finish(&mut self) -> PipelineResult<Option<Bytes>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.options.remainder {
            RemainderPolicy::Discard => {
                debug!(
                    "Discarding {} buffered chars below flush threshold",
                    self.buffer_chars
                );
                self.clear();
                Ok(None)
            }
            RemainderPolicy::Flush => self.flush().await.map(Some),
        }
    }

    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer_chars
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    async fn flush(&mut self) -> PipelineResult<Bytes> {
        debug!(
            "Flushing buffer #{}: {} chars",
            self.flush_count + 1,
            self.buffer_chars
        );
        let mut unit = self
            .transform
            .transform(&self.buffer)
            .await
            .map_err(PipelineError::Transform)?;
        unit.push('\n');

        self.clear();
        self.flush_count += 1;
        Ok(Bytes::from(unit))
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.buffer_chars = 0;
    }
}
