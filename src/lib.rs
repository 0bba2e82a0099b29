//! Image-to-text client for the Gemini generative AI API
//!
//! Sends images inline or through the provider's file service, optionally with
//! a speech-friendly system instruction, and returns the extracted text.

pub mod ai;
pub mod app;
pub mod error;
pub mod models;
pub mod prompts;

pub use error::{ApiError, Error, ErrorKind, Result};
