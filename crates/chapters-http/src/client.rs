use std::time::Duration;

use chapter_engine::{ChapterPayload, SaveReceipt, SaveResponse};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ChaptersHttpError, Result};

const MAX_ERROR_BODY_CHARS: usize = 256;

/// Client for the chapter store's save endpoint.
///
/// Saves are whole-list replacements, so repeating one is harmless.
#[derive(Debug, Clone)]
pub struct ChapterClient {
    client: Client,
    base_url: Url,
}

impl ChapterClient {
    /// Builds a client for the store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when `base_url` is not an absolute http(s) url or the
    /// http client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let invalid = |source| ChaptersHttpError::InvalidBaseUrl {
            base_url: base_url.to_string(),
            source,
        };
        let parsed = Url::parse(base_url).map_err(invalid)?;
        if parsed.cannot_be_a_base() {
            return Err(invalid(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ChaptersHttpError::BuildClient { source })?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/media/{media_id}/save_chapters`, with `media_id` percent-encoded.
    pub fn save_url(&self, media_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ChaptersHttpError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .extend(["media", media_id, "save_chapters"]);
        Ok(url)
    }

    /// Replaces the stored chapter list of `media_id` with `payload`.
    ///
    /// A 404 means the store does not offer chapter saving yet; the save then
    /// counts as a local success with `remote: false`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures, other non-2xx answers, an
    /// unreadable body, or a body whose status is not `"success"`.
    pub async fn save_chapters(
        &self,
        media_id: &str,
        payload: &ChapterPayload,
    ) -> Result<SaveReceipt> {
        let url = self.save_url(media_id)?;
        debug!(%url, chapter_count = payload.chapters.len(), "posting chapters");

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|source| ChaptersHttpError::Request { source })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!(media_id, "chapter store has no save endpoint, keeping chapters locally");
            return Ok(SaveReceipt {
                updated_at: Utc::now(),
                remote: false,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChaptersHttpError::Status {
                code: status.as_u16(),
                body: body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body: SaveResponse = response
            .json()
            .await
            .map_err(|source| ChaptersHttpError::Decode { source })?;
        if !body.is_success() {
            return Err(ChaptersHttpError::Rejected {
                status: body.status,
            });
        }

        let updated_at = body.updated_at_utc().unwrap_or_else(Utc::now);
        info!(media_id, %updated_at, "chapters stored remotely");
        Ok(SaveReceipt {
            updated_at,
            remote: true,
        })
    }
}
