//! Image synthesis stage for AIMint.
//!
//! Turns a text prompt into raw image bytes by calling a remote inference
//! endpoint. Exactly one request is made per call; retry policy belongs to
//! the caller.
//!
//! # Backends
//!
//! All backends implement the [`ImageSynthesisClient`] trait:
//!
//! - [`HuggingFaceClient`] -- Hugging Face hosted inference API

pub mod client;
pub mod error;
pub mod huggingface;

pub use client::ImageSynthesisClient;
pub use error::{SynthError, SynthResult};
pub use huggingface::{HuggingFaceClient, SynthConfig, DEFAULT_ENDPOINT};
