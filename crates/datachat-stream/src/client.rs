use crate::error::StreamError;
use async_trait::async_trait;
use bytes::Bytes;
use datachat_types::ChatRequest;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Opens the server-pushed event stream for one turn.
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError>;
}

/// POSTs the turn to the chat endpoint and returns its NDJSON body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError> {
        tracing::debug!(url = %self.url, session_id = %request.session_id, "opening chat stream");
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(StreamError::from)),
        ))
    }
}
