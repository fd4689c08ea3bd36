//! services/api/src/adapters/http_source.rs
//!
//! This module contains the HTTP adapter for fetching the summary document.
//! It implements the `SummarySource` port from the `core` crate.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use summary_player_core::domain::{Author, Chapter, Document};
use summary_player_core::ports::{PortError, PortResult, SummarySource};
use tracing::{debug, info};
use url::Url;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SummarySource` port with a single HTTP GET.
#[derive(Clone)]
pub struct HttpSummarySource {
    client: Client,
    url: String,
}

impl HttpSummarySource {
    /// Creates a new `HttpSummarySource`. The URL is validated on every fetch.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

//=========================================================================================
// "Impure" Wire Records
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorRecord {
    first_name: String,
    last_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyPointRecord {
    title: String,
    text: String,
    audio_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRecord {
    author: AuthorRecord,
    title: String,
    image_path: String,
    key_points: Vec<KeyPointRecord>,
}

impl SummaryRecord {
    fn to_domain(self) -> Document {
        Document {
            author: Author {
                first_name: self.author.first_name,
                last_name: self.author.last_name,
            },
            title: self.title,
            cover_ref: self.image_path,
            chapters: self
                .key_points
                .into_iter()
                .map(|point| Chapter {
                    title: point.title,
                    body_text: point.text,
                    audio_ref: point.audio_path,
                })
                .collect(),
        }
    }
}

/// Decodes a summary payload into the domain document.
pub fn decode_summary(body: &[u8]) -> PortResult<Document> {
    serde_json::from_slice::<SummaryRecord>(body)
        .map(SummaryRecord::to_domain)
        .map_err(|e| PortError::DecodeFailure(e.to_string()))
}

//=========================================================================================
// `SummarySource` Trait Implementation
//=========================================================================================

#[async_trait]
impl SummarySource for HttpSummarySource {
    async fn fetch_summary(&self) -> PortResult<Document> {
        let url = Url::parse(self.url.trim()).map_err(|_| PortError::InvalidUrl)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PortError::InvalidUrl);
        }
        info!("Fetching summary from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::from_status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|_| PortError::InvalidResponse)?;
        debug!(bytes = body.len(), "Summary payload received.");

        decode_summary(&body)
    }
}
