//! Inference layer: the backend contract and SSE streaming.
//!
//! - [`backend`]: [`InferenceBackend`] trait (`detect` / `respond`) and the
//!   [`Detection`] outcome, implemented by
//!   [`InferenceClient`](crate::InferenceClient).
//! - [`streaming`]: SSE decoder producing [`TextStream`]s of answer chunks.

pub mod backend;
pub mod streaming;

pub use backend::{BackendFuture, Detection, InferenceBackend};
pub use streaming::{StreamEvent, TextStream};
