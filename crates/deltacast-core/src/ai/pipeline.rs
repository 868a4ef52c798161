//! Streaming transform pipeline
//!
//! Wires an inbound SSE byte stream through UTF-8 decoding, event parsing,
//! delta extraction and accumulation, and exposes the transformed units as a
//! single outbound byte stream.
//!
//! The outbound stream is pull-based: the inbound stream is polled only when
//! the consumer asks for the next unit and every event from the previous
//! chunk (including any pending transform) has been handled. Dropping the
//! outbound stream drops the in-flight transform with it.

use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::accumulator::{Accumulator, AccumulatorOptions};
use super::delta::{extract, Extracted};
use super::sse::{EventParser, ParsedEvent, Utf8ChunkDecoder};
use super::transform::Transform;
use crate::error::{PipelineError, PipelineResult};

/// Transformed output units; an `Err` item is always the last item
pub type OutboundStream = BoxStream<'static, PipelineResult<Bytes>>;

/// Run `inbound` through the pipeline
pub fn transform_stream<S, E>(
    inbound: S,
    transform: Arc<dyn Transform>,
    options: AccumulatorOptions,
) -> OutboundStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    info!(
        "Stream pipeline created (flush threshold {}, remainder {:?})",
        options.flush_threshold, options.remainder
    );
    let state = PipelineState {
        inbound: inbound.boxed(),
        decoder: Utf8ChunkDecoder::new(),
        parser: EventParser::new(),
        accumulator: Accumulator::new(transform, options),
        pending: VecDeque::new(),
        input_closed: false,
        finished: false,
        stream_start: Instant::now(),
        bytes_received: 0,
    };

    stream::unfold(state, |mut state| async move {
        let item = state.next_unit().await?;
        Some((item, state))
    })
    .boxed()
}

struct PipelineState<E> {
    inbound: BoxStream<'static, Result<Bytes, E>>,
    decoder: Utf8ChunkDecoder,
    parser: EventParser,
    accumulator: Accumulator,
    /// Parsed events not yet handed to the extractor
    pending: VecDeque<ParsedEvent>,
    input_closed: bool,
    finished: bool,
    stream_start: Instant,
    bytes_received: usize,
}

impl<E: Display> PipelineState<E> {
    async fn next_unit(&mut self) -> Option<PipelineResult<Bytes>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(event) = self.pending.pop_front() {
                match self.handle_event(event).await {
                    Ok(Some(unit)) => return Some(Ok(unit)),
                    Ok(None) => continue,
                    Err(err) => return Some(Err(self.fail(err))),
                }
            }

            if self.input_closed {
                self.finished = true;
                self.log_finish("end of input");
                return match self.accumulator.finish().await {
                    Ok(unit) => unit.map(Ok),
                    Err(err) => Some(Err(self.fail(err))),
                };
            }

            match self.inbound.next().await {
                Some(Ok(chunk)) => {
                    self.bytes_received += chunk.len();
                    debug!(
                        "SSE chunk received: {} bytes (total: {} bytes)",
                        chunk.len(),
                        self.bytes_received
                    );
                    let text = self.decoder.decode(&chunk);
                    self.feed(&text);
                }
                Some(Err(err)) => {
                    let err = PipelineError::Transport(err.to_string());
                    return Some(Err(self.fail(err)));
                }
                None => {
                    self.input_closed = true;
                    let tail = self.decoder.finish();
                    self.feed(&tail);
                    if self.parser.has_pending() {
                        debug!("Discarding unterminated SSE event at end of input");
                    }
                }
            }
        }
    }

    fn feed(&mut self, text: &str) {
        let pending = &mut self.pending;
        self.parser.feed_with(text, |event| pending.push_back(event));
    }

    async fn handle_event(&mut self, event: ParsedEvent) -> PipelineResult<Option<Bytes>> {
        let data = match event {
            ParsedEvent::Event { data, .. } => data,
            ParsedEvent::ReconnectInterval { retry_ms } => {
                debug!("Ignoring reconnect interval of {}ms", retry_ms);
                return Ok(None);
            }
        };

        match extract(&data)? {
            Extracted::Done => {
                self.log_finish("[DONE] marker");
                let dropped = self.pending.len();
                if dropped > 0 {
                    debug!("Dropping {} events received after [DONE]", dropped);
                }
                self.pending.clear();
                self.finished = true;
                self.accumulator.finish().await
            }
            Extracted::Fragment(fragment) => {
                debug!("  -> TextDelta: {} chars", fragment.len());
                self.accumulator.push(&fragment).await
            }
        }
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        warn!(
            "Stream pipeline failed after {:?} ({} events, {} bytes): {}",
            self.stream_start.elapsed(),
            self.parser.event_count(),
            self.bytes_received,
            err
        );
        self.finished = true;
        self.pending.clear();
        err
    }

    fn log_finish(&self, reason: &str) {
        info!(
            "Stream pipeline finishing on {} after {:?}: {} events, {} bytes, {} units emitted",
            reason,
            self.stream_start.elapsed(),
            self.parser.event_count(),
            self.bytes_received,
            self.accumulator.flush_count()
        );
    }
}
