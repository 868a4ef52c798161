//! Streaming chat completion pipeline
//!
//! - `sse` - incremental SSE event parsing
//! - `delta` - fragment extraction from chunk payloads
//! - `accumulator` - buffering and threshold flushes
//! - `transform` - the async step applied to each flush
//! - `pipeline` - byte stream in, transformed byte stream out
//! - `client` - HTTP client for the upstream endpoint

pub mod accumulator;
pub mod client;
pub mod delta;
pub mod pipeline;
pub mod sse;
pub mod transform;
pub mod types;

pub use accumulator::{
    Accumulator, AccumulatorOptions, RemainderPolicy, DEFAULT_FLUSH_THRESHOLD,
};
pub use client::{ClientConfig, CompletionClient, DEFAULT_API_URL};
pub use delta::{extract, DeltaPayload, Extracted, DONE_SENTINEL};
pub use pipeline::{transform_stream, OutboundStream};
pub use sse::{EventParser, ParsedEvent, Utf8ChunkDecoder};
pub use transform::{Transform, UppercaseTransform};
pub use types::{ChatMessage, ChatRequest, Role};
