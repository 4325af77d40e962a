use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{config::Config, intake::VideoId};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },

    #[error("Request aborted before settling: {reason}")]
    Aborted { reason: String },
}

#[derive(Debug, Serialize)]
struct LoadVideoRequest<'a> {
    video_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
}

/// Body of a successful query call. `answer` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReply {
    #[serde(default)]
    pub answer: Option<String>,
}

impl QueryReply {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            answer: Some(text.into()),
        }
    }

    /// The answer text, if the server gave a non-empty one.
    pub fn text(&self) -> Option<&str> {
        self.answer.as_deref().filter(|a| !a.is_empty())
    }
}

/// Remote service that ingests transcripts and answers questions about them.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn load_video(&self, video_id: &VideoId) -> Result<(), BackendError>;
    async fn ask(&self, query: &str) -> Result<QueryReply, BackendError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    load_video_url: Url,
    chat_url: Url,
}

impl HttpBackend {
    pub const LOAD_VIDEO: &'static str = "load_video";
    pub const CHAT: &'static str = "chat";

    pub fn new(config: &Config) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            load_video_url: config.endpoint(Self::LOAD_VIDEO),
            chat_url: config.endpoint(Self::CHAT),
        }
    }
}

#[async_trait]
impl AssistantBackend for HttpBackend {
    async fn load_video(&self, video_id: &VideoId) -> Result<(), BackendError> {
        tracing::info!(%video_id, url = %self.load_video_url, "requesting transcript ingestion");
        let response = self
            .client
            .post(self.load_video_url.clone())
            .json(&LoadVideoRequest {
                video_id: video_id.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: Self::LOAD_VIDEO,
                status,
            });
        }

        // Only success matters; the body is read to completion and dropped.
        let body = response.text().await?;
        tracing::debug!(%video_id, body_len = body.len(), "transcript ingested");
        Ok(())
    }

    async fn ask(&self, query: &str) -> Result<QueryReply, BackendError> {
        tracing::info!(url = %self.chat_url, query_len = query.len(), "sending query");
        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&ChatRequest { query })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: Self::CHAT,
                status,
            });
        }

        // A 2xx body without a readable answer is still a settled reply.
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice::<QueryReply>(&bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "chat response carried no readable answer");
            QueryReply::default()
        }))
    }
}
