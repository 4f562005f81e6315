use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{validate_key, ObjectStore, ObjectStoreError, StoredObject};

const API_BASE: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are renewed this long before Google says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Google Cloud Storage object store backend (JSON API).
pub struct GcsStore {
    bucket: String,
    client: Client,
    source: TokenSource,
    token: RwLock<Option<CachedToken>>,
}

/// Where access tokens come from.
enum TokenSource {
    ServiceAccount(String),
    MetadataServer,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    #[serde(default)]
    content_type: Option<String>,
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;
        let source = match credentials_file {
            Some(path) => TokenSource::ServiceAccount(path.to_string()),
            None => TokenSource::MetadataServer,
        };

        let store = Self {
            bucket: bucket.to_string(),
            client,
            source,
            token: RwLock::new(None),
        };

        // Fail at startup rather than on the first request
        store.access_token().await?;
        Ok(store)
    }

    /// Current access token, fetching a fresh one when the cached token is stale.
    async fn access_token(&self) -> Result<String, anyhow::Error> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let resp = match &self.source {
            TokenSource::ServiceAccount(path) => self.token_from_service_account(path).await?,
            TokenSource::MetadataServer => self.token_from_metadata_server().await?,
        };
        tracing::debug!(expires_in = resp.expires_in, "Refreshed GCS access token");

        let lifetime = Duration::from_secs(resp.expires_in).saturating_sub(EXPIRY_MARGIN);
        *slot = Some(CachedToken {
            value: resp.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(resp.access_token)
    }

    async fn token_from_service_account(&self, path: &str) -> Result<TokenResponse, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = chrono::Utc::now().timestamp();
        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let claims = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        }))?);
        let unsigned = format!("{header}.{claims}");
        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    async fn token_from_metadata_server(&self) -> Result<TokenResponse, anyhow::Error> {
        let resp = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    async fn bearer(&self) -> Result<String, ObjectStoreError> {
        self.access_token()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("GCS auth failed: {e}")))
    }

    fn upload_url(&self, key: &str) -> Result<Url, ObjectStoreError> {
        let mut url = self.api_url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }

    /// Object resource URL; the key is a single percent-encoded path segment.
    fn object_url(&self, key: &str) -> Result<Url, ObjectStoreError> {
        self.api_url(&["storage", "v1", "b", &self.bucket, "o", key])
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url, ObjectStoreError> {
        let mut url =
            Url::parse(API_BASE).map_err(|e| ObjectStoreError::Backend(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ObjectStoreError::Backend("invalid GCS base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_resource(
        &self,
        key: &str,
        token: &str,
    ) -> Result<ObjectResource, ObjectStoreError> {
        let resp = self
            .client
            .get(self.object_url(key)?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        let resp = check_status(resp, "metadata lookup").await?;

        resp.json()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer().await?;

        let resp = self
            .client
            .post(self.upload_url(key)?)
            .bearer_auth(&token)
            .header(
                "Content-Type",
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        check_status(resp, "upload").await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer().await?;

        let resource = self.fetch_resource(key, &token).await?;

        let mut url = self.object_url(key)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let resp = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        let resp = check_status(resp, "download").await?;

        let data = resp
            .bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(StoredObject {
            data,
            content_type: resource.content_type,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        validate_key(key)?;
        let token = self.bearer().await?;

        match self.fetch_resource(key, &token).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

async fn check_status(
    resp: reqwest::Response,
    action: &str,
) -> Result<reqwest::Response, ObjectStoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ObjectStoreError::Backend(format!(
        "GCS {action} failed ({status}): {body}"
    )))
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    use base64::Engine;

    // PEM body without the BEGIN/END armour
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::engine::general_purpose::STANDARD.decode(der_b64.trim())?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GcsStore {
        GcsStore {
            bucket: "portfolio".to_string(),
            client: Client::new(),
            source: TokenSource::MetadataServer,
            token: RwLock::new(None),
        }
    }

    #[test]
    fn object_url_encodes_key_as_one_segment() {
        let url = store().object_url("thumbnails/family.webp").unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/portfolio/o/thumbnails%2Ffamily.webp"
        );
    }

    #[test]
    fn upload_url_carries_name_query() {
        let url = store().upload_url("data/gallery.json").unwrap();
        assert_eq!(url.path(), "/upload/storage/v1/b/portfolio/o");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("uploadType".to_string(), "media".to_string())));
        assert!(pairs.contains(&("name".to_string(), "data/gallery.json".to_string())));
    }

    #[tokio::test]
    async fn cached_token_is_reused_until_expiry() {
        let store = store();
        *store.token.write().await = Some(CachedToken {
            value: "cached".to_string(),
            expires_at: Instant::now() + Duration::from_secs(600),
        });
        assert_eq!(store.access_token().await.unwrap(), "cached");
    }
}
