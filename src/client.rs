//! HTTP client for the object store proxy, used by the admin tooling.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

use crate::api::response::{ErrorBody, UploadReceipt};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Proxy rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Talks to one proxy endpoint. Every call is a single attempt.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: Client,
    endpoint: String,
}

impl ProxyClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Store `data` at `key`, overwriting whatever is there.
    pub async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<UploadReceipt, ClientError> {
        let file_name = key.rsplit('/').next().unwrap_or(key).to_string();
        let part = Part::bytes(data.to_vec())
            .file_name(file_name)
            .mime_str(content_type)?;
        let form = Form::new()
            .part("image", part)
            .text("key", key.to_string())
            .text("contentType", content_type.to_string());

        let resp = self
            .http
            .post(format!("{}/", self.endpoint))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }

        let receipt: UploadReceipt = resp.json().await?;
        if !receipt.success {
            return Err(ClientError::Rejected {
                status: StatusCode::OK.as_u16(),
                message: format!("upload of {key} was not acknowledged"),
            });
        }

        tracing::debug!(key = %key, url = %receipt.url, "Uploaded through proxy");
        Ok(receipt)
    }

    /// Read the object at `key` through the proxy.
    pub async fn fetch(&self, key: &str) -> Result<Bytes, ClientError> {
        let resp = self
            .http
            .get(format!("{}/", self.endpoint))
            .query(&[("path", key)])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(key.to_string()));
        }
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }

        Ok(resp.bytes().await?)
    }

    /// URL that serves `key` through the proxy, e.g. admin thumbnails.
    pub fn object_url(&self, key: &str) -> String {
        let base = format!("{}/", self.endpoint);
        match Url::parse_with_params(&base, &[("path", key)]) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Unparseable proxy endpoint");
                base
            }
        }
    }
}

async fn rejection(resp: reqwest::Response) -> ClientError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text
            }
        });

    ClientError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_encodes_the_key() {
        let client = ProxyClient::new("http://proxy.test/");
        assert_eq!(
            client.object_url("full/golden hour&more.webp"),
            "http://proxy.test/?path=full%2Fgolden+hour%26more.webp"
        );
    }

    #[tokio::test]
    async fn encoded_url_reads_back_through_the_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let (endpoint, _state) = crate::testutil::spawn_proxy(&dir).await;
        let client = ProxyClient::new(&endpoint);
        client
            .upload("full/a&b.webp", Bytes::from_static(b"img"), "image/webp")
            .await
            .unwrap();

        let body = reqwest::get(client.object_url("full/a&b.webp"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&body[..], b"img");
    }
}
