//! StarDots API connector implementation
//!
//! Implements `RemoteMediaStore` for the StarDots image host.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartPart, RetryPolicy};
use bridge_traits::media::{is_supported_image, CategorySnapshot, MediaKey};
use bridge_traits::remote::RemoteMediaStore;
use bytes::Bytes;
use md5::{Digest, Md5};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::StarDotsConfig;
use crate::error::StarDotsError;
use crate::naming::{decode_remote_name, encode_remote_name, mime_type_for};
use crate::types::{
    ApiEnvelope, DeleteRequest, FileEntry, FileListData, TicketData, TicketRequest, UploadData,
};

/// Objects requested per list page
pub const PAGE_SIZE: usize = 100;

/// Length of the random nonce sent with each signed request
const NONCE_LENGTH: usize = 10;

/// Compute the request signature: uppercase hex MD5 of `"{timestamp}|{secret}|{nonce}"`.
pub fn sign(timestamp: &str, secret: &str, nonce: &str) -> String {
    let digest = Md5::digest(format!("{}|{}|{}", timestamp, secret, nonce).as_bytes());
    format!("{:X}", digest)
}

fn generate_nonce() -> String {
    Uuid::new_v4().simple().to_string()[..NONCE_LENGTH].to_string()
}

/// StarDots API connector
///
/// # Features
///
/// - Signed requests (`x-stardots-*` headers), timestamped with the server clock
/// - Paged listing, decoding categories out of object names
/// - Multipart uploads and ticket-based downloads
/// - Retry of transient HTTP failures through the injected `HttpClient`
///
/// The connector remembers the exact object name behind each key seen in the
/// last scan, so objects written by other tools under a non-canonical name can
/// still be downloaded and deleted.
///
/// The offset between the local and the server clock is measured before the
/// first signed request (unsigned `GET /openapi/space/list`, whose envelope
/// carries the server time `ts` in milliseconds) and measured again after an
/// authentication failure.
///
/// # Example
///
/// ```ignore
/// use provider_stardots::{StarDotsConfig, StarDotsConnector};
///
/// let config = StarDotsConfig::builder().key(key).secret(secret).space("memes").build()?;
/// let connector = StarDotsConnector::new(http_client, config);
/// let snapshot = connector.scan_remote().await?;
/// ```
pub struct StarDotsConnector {
    http_client: Arc<dyn HttpClient>,
    config: StarDotsConfig,
    retry_policy: RetryPolicy,
    object_names: RwLock<HashMap<MediaKey, String>>,
    clock_offset: Mutex<Option<i64>>,
}

impl StarDotsConnector {
    /// Create a new connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `config` - Validated credentials and endpoints
    pub fn new(http_client: Arc<dyn HttpClient>, config: StarDotsConfig) -> Self {
        Self {
            http_client,
            config,
            retry_policy: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(1),
                use_exponential_backoff: false,
            },
            object_names: RwLock::new(HashMap::new()),
            clock_offset: Mutex::new(None),
        }
    }

    /// Use a known server clock offset (seconds) instead of measuring it.
    pub fn with_clock_offset(mut self, offset_secs: i64) -> Self {
        *self.clock_offset.get_mut() = Some(offset_secs);
        self
    }

    /// Override the HTTP retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn config(&self) -> &StarDotsConfig {
        &self.config
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    /// Seconds to add to the local clock to get the server clock.
    ///
    /// Measured once and cached. A failed measurement signs with the local
    /// clock and is retried on the next request.
    async fn clock_offset(&self) -> i64 {
        let mut cached = self.clock_offset.lock().await;
        if let Some(offset) = *cached {
            return offset;
        }

        match self.server_time().await {
            Ok(server_secs) => {
                let offset = server_secs - chrono::Utc::now().timestamp();
                debug!(offset, "Synced server clock");
                *cached = Some(offset);
                offset
            }
            Err(e) => {
                warn!(error = %e, "Server time unavailable, signing with local clock");
                0
            }
        }
    }

    async fn server_time(&self) -> std::result::Result<i64, StarDotsError> {
        let request = HttpRequest::new(HttpMethod::Get, self.api_url("/openapi/space/list"))
            .timeout(self.config.request_timeout);
        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(StarDotsError::ApiError {
                status_code: response.status,
                message: "server time request failed".to_string(),
            });
        }

        Self::parse::<serde_json::Value>(&response)?
            .ts
            .map(|millis| millis / 1000)
            .ok_or_else(|| StarDotsError::ParseError("response has no ts".to_string()))
    }

    /// Attach the signature headers and send.
    async fn send_signed(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, StarDotsError> {
        let timestamp = (chrono::Utc::now().timestamp() + self.clock_offset().await).to_string();
        let nonce = generate_nonce();
        let signature = sign(&timestamp, &self.config.secret, &nonce);

        let request = request
            .header("x-stardots-timestamp", timestamp)
            .header("x-stardots-nonce", nonce)
            .header("x-stardots-key", self.config.key.clone())
            .header("x-stardots-sign", signature);
        self.send(request).await
    }

    /// Send a request and reject non-2xx statuses.
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, StarDotsError> {
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if response.is_success() {
            debug!(status = response.status, "API request succeeded");
            return Ok(response);
        }

        let body = String::from_utf8_lossy(&response.body);
        let message: String = body.chars().take(200).collect();
        warn!(status = response.status, "API request failed");

        if response.status == 401 || response.status == 403 {
            // A rejected signature may be clock drift; measure again next time.
            *self.clock_offset.lock().await = None;
            return Err(StarDotsError::AuthenticationFailed(message));
        }
        Err(StarDotsError::ApiError {
            status_code: response.status,
            message,
        })
    }

    fn parse<T: DeserializeOwned>(
        response: &HttpResponse,
    ) -> std::result::Result<ApiEnvelope<T>, StarDotsError> {
        serde_json::from_slice(&response.body).map_err(|e| {
            let preview: String = String::from_utf8_lossy(&response.body)
                .chars()
                .take(200)
                .collect();
            StarDotsError::ParseError(format!("{} (body: {})", e, preview))
        })
    }

    async fn list_page(&self, page: usize) -> std::result::Result<Vec<FileEntry>, StarDotsError> {
        let request = HttpRequest::new(HttpMethod::Get, self.api_url("/openapi/file/list"))
            .query("space", self.config.space.clone())
            .query("page", page.to_string())
            .query("pageSize", PAGE_SIZE.to_string())
            .timeout(self.config.request_timeout);

        let response = self.send_signed(request).await?;
        let data: FileListData = Self::parse(&response)?.into_data()?;
        Ok(data.list)
    }

    /// Fetch every object in the space.
    ///
    /// Stops on an empty page or one shorter than [`PAGE_SIZE`].
    async fn list_all(&self) -> std::result::Result<Vec<FileEntry>, StarDotsError> {
        let mut entries = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.list_page(page).await?;
            let batch_len = batch.len();
            debug!(page, objects = batch_len, "Fetched list page");
            entries.extend(batch);

            if batch_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(entries)
    }

    async fn object_name(&self, key: &MediaKey) -> String {
        self.object_names
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_else(|| encode_remote_name(key))
    }

    async fn request_ticket(&self, object_name: &str) -> std::result::Result<String, StarDotsError> {
        let body = TicketRequest {
            space: &self.config.space,
            filename: object_name,
        };
        let request = HttpRequest::new(HttpMethod::Post, self.api_url("/openapi/file/ticket"))
            .json(&body)?
            .timeout(self.config.request_timeout);

        let response = self.send_signed(request).await?;
        let data: TicketData = Self::parse(&response)?.into_data()?;
        Ok(data.ticket)
    }
}

#[async_trait]
impl RemoteMediaStore for StarDotsConnector {
    #[instrument(skip(self), fields(space = %self.config.space))]
    async fn scan_remote(&self) -> Result<CategorySnapshot> {
        let entries = self.list_all().await?;

        let mut snapshot = CategorySnapshot::new();
        let mut names = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = decode_remote_name(&entry.name);
            if !is_supported_image(&key.filename) {
                debug!(name = %entry.name, "Skipping unsupported object");
                continue;
            }
            snapshot.insert_file(key.category.clone(), key.filename.clone());
            names.insert(key, entry.name);
        }

        *self.object_names.write().await = names;

        info!(
            categories = snapshot.len(),
            files = snapshot.file_count(),
            "Scanned remote mirror"
        );
        Ok(snapshot)
    }

    async fn list_category_files(&self, category: &str) -> Result<Vec<String>> {
        let snapshot = self.scan_remote().await?;
        Ok(snapshot
            .files(category)
            .map(|files| files.to_vec())
            .unwrap_or_default())
    }

    #[instrument(skip(self, data), fields(file = %key, size = data.len()))]
    async fn upload(&self, key: &MediaKey, data: Bytes) -> Result<()> {
        let object_name = encode_remote_name(key);
        let request = HttpRequest::new(HttpMethod::Put, self.api_url("/openapi/file/upload"))
            .multipart(vec![
                MultipartPart::file(
                    "file",
                    object_name.clone(),
                    mime_type_for(&key.filename),
                    data,
                ),
                MultipartPart::text("space", self.config.space.clone()),
            ])
            .timeout(self.config.transfer_timeout);

        let response = self.send_signed(request).await?;
        let uploaded: UploadData = Self::parse(&response)?.into_data()?;
        debug!(object = %object_name, url = ?uploaded.url, "Uploaded object");

        self.object_names
            .write()
            .await
            .insert(key.clone(), object_name);
        Ok(())
    }

    #[instrument(skip(self), fields(file = %key))]
    async fn download(&self, key: &MediaKey) -> Result<Bytes> {
        let object_name = self.object_name(key).await;
        let ticket = self.request_ticket(&object_name).await?;

        let url = format!(
            "{}/{}/{}",
            self.config.download_base,
            urlencoding::encode(&self.config.space),
            urlencoding::encode(&object_name)
        );
        let request = HttpRequest::new(HttpMethod::Get, url)
            .query("ticket", ticket)
            .timeout(self.config.transfer_timeout);

        let response = self.send(request).await?;
        if let Some(content_type) = response
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value)
        {
            if !content_type.starts_with("image/") {
                return Err(StarDotsError::ParseError(format!(
                    "Expected an image for {}, got content type '{}'",
                    object_name, content_type
                ))
                .into());
            }
        }
        if response.body.is_empty() {
            return Err(
                StarDotsError::ParseError(format!("Empty body for {}", object_name)).into(),
            );
        }

        debug!(object = %object_name, size = response.body.len(), "Downloaded object");
        Ok(response.body)
    }

    #[instrument(skip(self), fields(file = %key))]
    async fn delete(&self, key: &MediaKey) -> Result<()> {
        let object_name = self.object_name(key).await;
        let body = DeleteRequest {
            space: &self.config.space,
            filename_list: vec![object_name.as_str()],
        };
        let request = HttpRequest::new(HttpMethod::Delete, self.api_url("/openapi/file/delete"))
            .json(&body)?
            .timeout(self.config.request_timeout);

        let response = self.send_signed(request).await?;
        Self::parse::<serde_json::Value>(&response)?.ensure_success()?;

        self.object_names.write().await.remove(key);
        info!(object = %object_name, "Deleted remote object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use mockall::mock;
    use mockall::Sequence;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn config() -> StarDotsConfig {
        StarDotsConfig::builder()
            .key("test-key")
            .secret("test-secret")
            .space("memes")
            .build()
            .unwrap()
    }

    fn connector(mock_http: MockHttpClient) -> StarDotsConnector {
        StarDotsConnector::new(Arc::new(mock_http), config()).with_clock_offset(0)
    }

    fn json_response(body: serde_json::Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn list_response(names: Vec<String>) -> HttpResponse {
        let list: Vec<_> = names
            .into_iter()
            .map(|name| serde_json::json!({"name": name, "url": "https://i.stardots.io/x"}))
            .collect();
        json_response(serde_json::json!({"success": true, "message": "ok", "data": {"list": list}}))
    }

    fn json_body(request: &HttpRequest) -> Option<serde_json::Value> {
        request
            .body
            .as_ref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }

    fn query_value<'a>(request: &'a HttpRequest, key: &str) -> Option<&'a str> {
        request
            .query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_sign() {
        assert_eq!(
            sign("1700000000", "secret", "abcdefghij"),
            "C84E5636A1B04E3E9A4E98A5391974C5"
        );
    }

    #[test]
    fn test_nonce_length() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_LENGTH);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_requests_are_signed() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                let timestamp = &request.headers["x-stardots-timestamp"];
                let nonce = &request.headers["x-stardots-nonce"];
                request.headers["x-stardots-key"] == "test-key"
                    && request.headers["x-stardots-sign"] == sign(timestamp, "test-secret", nonce)
            })
            .times(1)
            .returning(|_| Ok(list_response(vec![])));

        let connector = connector(mock_http);
        let snapshot = connector.scan_remote().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_scan_remote_pages_until_short_page() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock_http
            .expect_execute()
            .withf(|request| query_value(request, "page") == Some("1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| {
                assert_eq!(query_value(&request, "pageSize"), Some("100"));
                assert_eq!(query_value(&request, "space"), Some("memes"));
                let names = (0..PAGE_SIZE)
                    .map(|i| format!("cats@@CAT@@{}.png", i))
                    .collect();
                Ok(list_response(names))
            });
        mock_http
            .expect_execute()
            .withf(|request| query_value(request, "page") == Some("2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(list_response(vec![
                    "animals@@DIR@@dogs@@CAT@@d.gif".to_string(),
                    "loose.jpg".to_string(),
                    "cats@@CAT@@readme.txt".to_string(),
                ]))
            });

        let connector = connector(mock_http);
        let snapshot = connector.scan_remote().await.unwrap();

        assert_eq!(
            snapshot.categories().collect::<Vec<_>>(),
            vec!["cats", "animals/dogs", "default"]
        );
        assert_eq!(snapshot.files("cats").unwrap().len(), PAGE_SIZE);
        assert!(snapshot.contains_file("default", "loose.jpg"));
        assert!(!snapshot.contains_file("cats", "readme.txt"));
    }

    #[tokio::test]
    async fn test_scan_remote_rejected_is_operation_failure() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(json_response(
                serde_json::json!({"success": false, "message": "invalid timestamp"}),
            ))
        });

        let connector = connector(mock_http);
        let error = connector.scan_remote().await.unwrap_err();
        assert!(matches!(error, BridgeError::OperationFailed(msg) if msg.contains("invalid timestamp")));
    }

    #[tokio::test]
    async fn test_scan_remote_garbage_is_invalid_response() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(b"<html>maintenance</html>"),
            })
        });

        let connector = connector(mock_http);
        let error = connector.scan_remote().await.unwrap_err();
        assert!(matches!(error, BridgeError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_status() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse {
                status: 401,
                headers: HashMap::new(),
                body: Bytes::from_static(b"bad signature"),
            })
        });

        let connector = connector(mock_http);
        let error = connector.scan_remote().await.unwrap_err();
        assert!(matches!(error, BridgeError::OperationFailed(msg) if msg.contains("Authentication failed")));
    }

    fn is_path(request: &HttpRequest, path: &str) -> bool {
        request.url.ends_with(path)
    }

    fn time_response(offset_secs: i64) -> HttpResponse {
        let server_ms = (chrono::Utc::now().timestamp() + offset_secs) * 1000;
        json_response(serde_json::json!({"success": true, "data": [], "ts": server_ms}))
    }

    fn timestamp_skew(request: &HttpRequest, offset_secs: i64) -> i64 {
        let timestamp: i64 = request.headers["x-stardots-timestamp"].parse().unwrap();
        (timestamp - (chrono::Utc::now().timestamp() + offset_secs)).abs()
    }

    #[tokio::test]
    async fn test_timestamp_follows_server_clock() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock_http
            .expect_execute()
            .withf(|request| is_path(request, "/openapi/space/list"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| {
                assert!(!request.headers.contains_key("x-stardots-sign"));
                Ok(time_response(3600))
            });
        mock_http
            .expect_execute()
            .withf(|request| is_path(request, "/openapi/file/list"))
            .times(2)
            .in_sequence(&mut seq)
            .returning(|request| {
                assert!(timestamp_skew(&request, 3600) <= 5);
                Ok(list_response(vec![]))
            });

        let connector = StarDotsConnector::new(Arc::new(mock_http), config());
        connector.scan_remote().await.unwrap();
        connector.scan_remote().await.unwrap();
    }

    #[tokio::test]
    async fn test_authentication_failure_resyncs_clock() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock_http
            .expect_execute()
            .withf(|request| is_path(request, "/openapi/space/list"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(time_response(0)));
        mock_http
            .expect_execute()
            .withf(|request| is_path(request, "/openapi/file/list"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 403,
                    headers: HashMap::new(),
                    body: Bytes::from_static(b"timestamp expired"),
                })
            });
        mock_http
            .expect_execute()
            .withf(|request| is_path(request, "/openapi/space/list"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(time_response(-7200)));
        mock_http
            .expect_execute()
            .withf(|request| is_path(request, "/openapi/file/list"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| {
                assert!(timestamp_skew(&request, -7200) <= 5);
                Ok(list_response(vec![]))
            });

        let connector = StarDotsConnector::new(Arc::new(mock_http), config());
        assert!(connector.scan_remote().await.is_err());
        connector.scan_remote().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_server_clock_signs_with_local_time() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| is_path(request, "/openapi/space/list"))
            .times(2)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 502,
                    headers: HashMap::new(),
                    body: Bytes::new(),
                })
            });
        mock_http
            .expect_execute()
            .withf(|request| is_path(request, "/openapi/file/list"))
            .times(2)
            .returning(|request| {
                assert!(timestamp_skew(&request, 0) <= 5);
                Ok(list_response(vec![]))
            });

        let connector = StarDotsConnector::new(Arc::new(mock_http), config());
        connector.scan_remote().await.unwrap();
        connector.scan_remote().await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_sends_encoded_name() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                let Some(parts) = request.multipart.as_ref() else {
                    return false;
                };
                request.method == HttpMethod::Put
                    && request.url == "https://api.stardots.io/openapi/file/upload"
                    && parts[0].name == "file"
                    && parts[0].filename.as_deref() == Some("animals@@DIR@@cats@@CAT@@a.png")
                    && parts[0].content_type.as_deref() == Some("image/png")
                    && parts[1].name == "space"
                    && parts[1].data == Bytes::from_static(b"memes")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(serde_json::json!({
                    "success": true,
                    "data": {"url": "https://i.stardots.io/memes/animals@@DIR@@cats@@CAT@@a.png"}
                })))
            });

        let connector = connector(mock_http);
        connector
            .upload(
                &MediaKey::new("animals/cats", "a.png"),
                Bytes::from_static(b"png"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_download_uses_ticket() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock_http
            .expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Post
                    && request.url.ends_with("/openapi/file/ticket")
                    && json_body(request)
                        == Some(serde_json::json!({"space": "memes", "filename": "cats@@CAT@@a.png"}))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json_response(
                    serde_json::json!({"success": true, "data": {"ticket": "t-123"}}),
                ))
            });
        mock_http
            .expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Get
                    && request.url == "https://i.stardots.io/memes/cats%40%40CAT%40%40a.png"
                    && query_value(request, "ticket") == Some("t-123")
                    && !request.headers.contains_key("x-stardots-sign")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                let mut headers = HashMap::new();
                headers.insert("content-type".to_string(), "image/png".to_string());
                Ok(HttpResponse {
                    status: 200,
                    headers,
                    body: Bytes::from_static(b"png-bytes"),
                })
            });

        let connector = connector(mock_http);
        let data = connector
            .download(&MediaKey::new("cats", "a.png"))
            .await
            .unwrap();
        assert_eq!(data, Bytes::from_static(b"png-bytes"));
    }

    #[tokio::test]
    async fn test_download_rejects_non_image() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock_http
            .expect_execute()
            .withf(|request| request.method == HttpMethod::Post)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(json_response(
                    serde_json::json!({"success": true, "data": {"ticket": "t"}}),
                ))
            });
        mock_http
            .expect_execute()
            .withf(|request| request.method == HttpMethod::Get)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                let mut headers = HashMap::new();
                headers.insert("Content-Type".to_string(), "text/html".to_string());
                Ok(HttpResponse {
                    status: 200,
                    headers,
                    body: Bytes::from_static(b"<html></html>"),
                })
            });

        let connector = connector(mock_http);
        let error = connector
            .download(&MediaKey::new("cats", "a.png"))
            .await
            .unwrap_err();
        assert!(matches!(error, BridgeError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_delete_uses_scanned_object_name() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock_http
            .expect_execute()
            .withf(|request| request.method == HttpMethod::Get)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(list_response(vec!["default@@CAT@@a.png".to_string()])));
        mock_http
            .expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Delete
                    && json_body(request)
                        == Some(serde_json::json!({"space": "memes", "filenameList": ["default@@CAT@@a.png"]}))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(serde_json::json!({"success": true}))));

        let connector = connector(mock_http);
        let snapshot = connector.scan_remote().await.unwrap();
        assert!(snapshot.contains_file("default", "a.png"));

        connector
            .delete(&MediaKey::new("default", "a.png"))
            .await
            .unwrap();
    }
}
