//! Session module: the caller-facing query service.
//!
//! This module contains:
//! - `chunk`: Typed output chunks consumed by the presentation layer
//! - `transform`: Backend event → chunk mapping and session capture
//! - `service`: Session lifecycle, cancellation, and the query stream

pub mod chunk;
pub mod service;
pub mod transform;

pub use chunk::Chunk;
pub use service::{AgentSession, ChunkStream, SessionOptions};
