//! HTTP client for the chapter store.

pub mod client;
pub mod error;

pub use client::ChapterClient;
pub use error::{ChaptersHttpError, Result};
