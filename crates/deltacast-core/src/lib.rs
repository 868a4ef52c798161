//! Core library for deltacast
//!
//! Parses a chat completion SSE stream, accumulates the text deltas, runs an
//! async transform over each buffered unit and streams the results onward.

pub mod ai;
pub mod config;
pub mod error;

pub use config::Config;
pub use error::{PipelineError, PipelineResult};
