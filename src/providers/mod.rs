//! Image generation providers.
//!
//! The orchestrator only sees [`ImageGenerator`]: one opaque async call that
//! either returns image bytes or fails. Everything about prompts, reference
//! assets, and the upstream API lives behind it.

pub mod gemini;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

/// A completed user selection, ready to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryOnJob {
    pub user: u64,
    /// Local path of the user's uploaded photo.
    pub photo_path: PathBuf,
    /// Catalog keys.
    pub product: String,
    pub color: String,
    pub print: String,
}

impl TryOnJob {
    /// Short human-readable selection summary for captions and audit records.
    pub fn summary(&self) -> String {
        format!("{} / {} / {}", self.product, self.color, self.print)
    }
}

/// Output of a successful generation. The bot treats the bytes as opaque
/// success data and forwards them as-is.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
}

/// The expensive downstream call the quota/lock layer gates.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, job: &TryOnJob) -> Result<GeneratedImage>;
}
