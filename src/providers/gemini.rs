//! Gemini image-edit provider.
//!
//! Speaks the Gemini `generateContent` REST API directly: one request with
//! the composed try-on prompt plus three inline images (person photo, garment
//! reference, brand logo), one response with the edited image as inline data.
//!
//! Image models may answer with a text-only refusal; that is surfaced as a
//! generation error so the caller refunds the charged quota unit.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{FitroomError, Result};
use crate::prompts;

use super::{GeneratedImage, ImageGenerator, TryOnJob};

/// Gemini v1beta REST API base.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Generation can take tens of seconds for 2K output.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// [`ImageGenerator`] backed by the Gemini image-edit API.
pub struct GeminiImageProvider {
    api_key: String,
    model: String,
    client: Client,
    catalog: Catalog,
    logo_path: PathBuf,
}

impl std::fmt::Debug for GeminiImageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiImageProvider")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiImageProvider {
    pub fn new(api_key: &str, model: &str, catalog: Catalog, logo_path: PathBuf) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            catalog,
            logo_path,
        }
    }

    /// Build the `generateContent` body: prompt text followed by the person,
    /// garment-reference, and logo images as inline parts, in that order (the
    /// prompt refers to them as FIRST/SECOND/THIRD image).
    fn build_request_body(
        prompt: &str,
        person: (&[u8], &str),
        garment: (&[u8], &str),
        logo: (&[u8], &str),
    ) -> Value {
        let parts: Vec<Value> = std::iter::once(json!({ "text": prompt }))
            .chain([person, garment, logo].into_iter().map(|(bytes, mime)| {
                json!({
                    "inline_data": {
                        "mime_type": mime,
                        "data": BASE64.encode(bytes),
                    }
                })
            }))
            .collect();

        json!({
            "contents": [{
                "role": "user",
                "parts": parts
            }]
        })
    }

    /// Pull the first inline image out of a response, decoding its base64
    /// payload. Accepts both JSON casings the API emits.
    fn extract_image_bytes(response: &Value) -> Option<Vec<u8>> {
        let parts = response["candidates"][0]["content"]["parts"].as_array()?;
        parts
            .iter()
            .filter_map(|p| p.get("inlineData").or_else(|| p.get("inline_data")))
            .filter_map(|inline| inline["data"].as_str())
            .find_map(|data| BASE64.decode(data).ok())
    }

    /// Extract a readable message from a Gemini error body, falling back to
    /// the raw body when it is not the usual `{"error": {"message": ...}}`.
    fn parse_api_error(status: reqwest::StatusCode, body: &str) -> FitroomError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or_else(|| body.chars().take(200).collect());
        FitroomError::Generation(format!("Gemini API error {}: {}", status, message))
    }

    async fn read_image(path: &Path) -> Result<(Vec<u8>, &'static str)> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            FitroomError::Generation(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok((bytes, mime_for_path(path)))
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageProvider {
    async fn generate(&self, job: &TryOnJob) -> Result<GeneratedImage> {
        let asset_path = self.catalog.asset_path(&job.product, &job.color, &job.print)?;

        let (person, person_mime) = Self::read_image(&job.photo_path).await?;
        let (garment, garment_mime) = Self::read_image(&asset_path).await?;
        let (logo, logo_mime) = Self::read_image(&self.logo_path).await?;

        let prompt = prompts::build_tryon_prompt(&job.product, &job.color, &job.print);
        let body = Self::build_request_body(
            &prompt,
            (&person, person_mime),
            (&garment, garment_mime),
            (&logo, logo_mime),
        );

        let url = format!(
            "{}/models/{}:generateContent",
            GEMINI_API_BASE, self.model
        );
        debug!(model = %self.model, selection = %job.summary(), "calling Gemini");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Gemini request failed");
            return Err(Self::parse_api_error(status, &body));
        }

        let response: Value = response.json().await?;
        Self::extract_image_bytes(&response)
            .map(|bytes| GeneratedImage { bytes })
            .ok_or_else(|| {
                FitroomError::Generation(
                    "Gemini returned no image bytes (text-only response); \
                     check the configured image model"
                        .into(),
                )
            })
    }
}

/// MIME type by extension; everything that is not PNG is treated as JPEG,
/// matching what Telegram hands us for photos.
fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}
