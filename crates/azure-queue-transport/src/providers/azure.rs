//! Azure Queue Storage client using the HTTP REST API.
//!
//! Requests are authorised with the storage account's Shared Key: each
//! request is signed with HMAC-SHA256 over a canonical form of its verb,
//! standard headers, `x-ms-*` headers and resource path. Responses are XML
//! and are parsed with `quick-xml`.
//!
//! ## Operations
//!
//! | operation | request |
//! |---|---|
//! | create queue | `PUT /{queue}` |
//! | get messages | `GET /{queue}/messages?numofmessages=N&visibilitytimeout=S` |
//! | put message | `POST /{queue}/messages?messagettl=S` |
//! | delete message | `DELETE /{queue}/messages/{id}?popreceipt=R` |
//!
//! ## Example
//!
//! ```no_run
//! use azure_queue_transport::providers::AzureQueueClient;
//! use azure_queue_transport::{QueueName, QueueService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AzureQueueClient::from_connection_string(
//!     "DefaultEndpointsProtocol=https;AccountName=myaccount;AccountKey=a2V5",
//! )?;
//! client.create_queue(&"orders".parse::<QueueName>()?).await?;
//! # Ok(())
//! # }
//! ```

use crate::connection::StorageConnectionString;
use crate::error::{ConfigurationError, ServiceError};
use crate::message::{MessageId, PopReceipt, QueueName};
use crate::service::{EnqueuedMessage, QueueMessageItem, QueueService};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client as HttpClient, Method};
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "azure_tests.rs"]
mod tests;

/// Storage REST API version sent with every request
pub const API_VERSION: &str = "2019-12-12";

// ============================================================================
// Shared Key Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// Shared Key signer for storage requests
///
/// ## References
///
/// - [Authorize with Shared Key](https://learn.microsoft.com/rest/api/storageservices/authorize-with-shared-key)
#[derive(Clone)]
struct SharedKeySigner {
    account: String,
    key: Vec<u8>,
}

impl SharedKeySigner {
    fn new(account: String, account_key: &str) -> Result<Self, ConfigurationError> {
        let key = STANDARD.decode(account_key.trim()).map_err(|e| {
            ConfigurationError::InvalidConnectionString {
                message: format!("AccountKey is not valid base64: {}", e),
            }
        })?;

        Ok(Self { account, key })
    }

    /// Value for the `Authorization` header
    fn authorization(
        &self,
        method: &Method,
        url: &Url,
        content_length: usize,
        content_type: &str,
        ms_headers: &[(&str, &str)],
    ) -> String {
        let string_to_sign =
            self.string_to_sign(method, url, content_length, content_type, ms_headers);

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        format!("SharedKey {}:{}", self.account, signature)
    }

    fn string_to_sign(
        &self,
        method: &Method,
        url: &Url,
        content_length: usize,
        content_type: &str,
        ms_headers: &[(&str, &str)],
    ) -> String {
        // Zero-length bodies sign an empty Content-Length
        let content_length = if content_length == 0 {
            String::new()
        } else {
            content_length.to_string()
        };

        let mut headers: Vec<(String, &str)> = ms_headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
            .collect();
        headers.sort();
        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();

        // VERB, Content-Encoding, Content-Language, Content-Length,
        // Content-MD5, Content-Type, Date, If-Modified-Since, If-Match,
        // If-None-Match, If-Unmodified-Since, Range
        format!(
            "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
            method.as_str(),
            content_length,
            content_type,
            canonical_headers,
            self.canonical_resource(url)
        )
    }

    fn canonical_resource(&self, url: &Url) -> String {
        let mut resource = format!("/{}{}", self.account, url.path());

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            params
                .entry(name.to_ascii_lowercase())
                .or_default()
                .push(value.into_owned());
        }
        for (name, mut values) in params {
            values.sort();
            resource.push_str(&format!("\n{}:{}", name, values.join(",")));
        }

        resource
    }
}

// ============================================================================
// Azure Queue Client
// ============================================================================

/// Azure Queue Storage client
///
/// Cheap to clone; the underlying HTTP connection pool is shared.
#[derive(Clone)]
pub struct AzureQueueClient {
    http_client: HttpClient,
    signer: SharedKeySigner,
    endpoint: Url,
}

impl AzureQueueClient {
    /// Create client from parsed connection settings
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The account key is not base64
    /// - The queue endpoint is not an HTTP(S) URL
    /// - The HTTP client cannot be built
    pub fn new(connection: &StorageConnectionString) -> Result<Self, ConfigurationError> {
        let endpoint = connection.queue_endpoint()?;
        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigurationError::InvalidConnectionString {
                message: format!("queue endpoint '{}' must be an http(s) URL", endpoint),
            });
        }

        let signer = SharedKeySigner::new(connection.account_name.clone(), &connection.account_key)?;

        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                key: "http_client".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            signer,
            endpoint,
        })
    }

    /// Create client from a raw connection string
    pub fn from_connection_string(raw: &str) -> Result<Self, ConfigurationError> {
        Self::new(&StorageConnectionString::parse(raw)?)
    }

    /// Base URL requests are sent to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Url {
        let mut url = self.endpoint.clone();
        // The constructor rejects endpoints that cannot be a base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    /// Sign and send a request, returning the body of a successful response
    async fn make_request(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<String, ServiceError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let content_length = body.as_ref().map_or(0, String::len);
        let content_type = if content_length > 0 {
            "application/xml"
        } else {
            ""
        };

        let authorization = self.signer.authorization(
            &method,
            &url,
            content_length,
            content_type,
            &[("x-ms-date", &date), ("x-ms-version", API_VERSION)],
        );

        debug!(method = %method, path = %url.path(), "Sending queue service request");

        let mut request = self
            .http_client
            .request(method.clone(), url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("Authorization", authorization);

        if let Some(body) = body {
            if content_length > 0 {
                request = request.header("Content-Type", content_type);
            }
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Network(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                ServiceError::Network(format!("Connection failed: {}", e))
            } else {
                ServiceError::Network(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let error_code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let response_body = response
            .text()
            .await
            .map_err(|e| ServiceError::Network(format!("Failed to read response body: {}", e)))?;

        debug!(method = %method, path = %url.path(), status = status.as_u16(), "Queue service responded");

        if !status.is_success() {
            return Err(parse_error_response(
                &response_body,
                status.as_u16(),
                error_code,
            ));
        }

        Ok(response_body)
    }
}

impl fmt::Debug for AzureQueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureQueueClient")
            .field("account", &self.signer.account)
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[async_trait]
impl QueueService for AzureQueueClient {
    async fn create_queue(&self, queue: &QueueName) -> Result<(), ServiceError> {
        let url = self.url(&[queue.as_str()], &[]);

        // 201 when created, 204 when it already exists
        self.make_request(Method::PUT, url, Some(String::new()))
            .await?;

        Ok(())
    }

    async fn get_messages(
        &self,
        queue: &QueueName,
        visibility_timeout: Option<u32>,
        max_messages: u32,
    ) -> Result<Vec<QueueMessageItem>, ServiceError> {
        let mut query = vec![("numofmessages", max_messages.to_string())];
        if let Some(timeout) = visibility_timeout {
            query.push(("visibilitytimeout", timeout.to_string()));
        }
        let url = self.url(&[queue.as_str(), "messages"], &query);

        let response = self.make_request(Method::GET, url, None).await?;

        parse_queue_messages(&response)?
            .iter()
            .map(queue_message_item)
            .collect()
    }

    async fn put_message(
        &self,
        queue: &QueueName,
        message_text: &str,
        time_to_live: Option<i64>,
    ) -> Result<EnqueuedMessage, ServiceError> {
        let query: Vec<(&str, String)> = time_to_live
            .map(|ttl| vec![("messagettl", ttl.to_string())])
            .unwrap_or_default();
        let url = self.url(&[queue.as_str(), "messages"], &query);

        let body = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            quick_xml::escape::escape(message_text)
        );

        let response = self.make_request(Method::POST, url, Some(body)).await?;

        let fields = parse_queue_messages(&response)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ServiceError::InvalidResponse("QueueMessage not found in response".to_string())
            })?;

        Ok(EnqueuedMessage {
            message_id: parse_field(&fields, "MessageId")?,
            pop_receipt: parse_field(&fields, "PopReceipt")?,
            expiration_time: parse_time(&fields, "ExpirationTime"),
            time_next_visible: parse_time(&fields, "TimeNextVisible"),
        })
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), ServiceError> {
        let url = self.url(
            &[queue.as_str(), "messages", message_id.as_str()],
            &[("popreceipt", pop_receipt.as_str().to_string())],
        );

        self.make_request(Method::DELETE, url, None).await?;

        Ok(())
    }
}

// ============================================================================
// XML Response Parsing
// ============================================================================

type XmlFields = HashMap<String, String>;

/// Collect the child elements of every `QueueMessage` in a
/// `QueueMessagesList` response
fn parse_queue_messages(xml: &str) -> Result<Vec<XmlFields>, ServiceError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut messages = Vec::new();
    let mut current: Option<XmlFields> = None;
    let mut field: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                if name.as_ref() == b"QueueMessage" {
                    current = Some(XmlFields::new());
                } else if current.is_some() {
                    field = Some(String::from_utf8_lossy(name.as_ref()).into_owned());
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(fields), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = e.unescape().map_err(|e| {
                        ServiceError::InvalidResponse(format!("Failed to parse XML: {}", e))
                    })?;
                    fields.insert(name.clone(), text.into_owned());
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"QueueMessage" {
                    if let Some(fields) = current.take() {
                        messages.push(fields);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ServiceError::InvalidResponse(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(messages)
}

fn queue_message_item(fields: &XmlFields) -> Result<QueueMessageItem, ServiceError> {
    Ok(QueueMessageItem {
        message_id: parse_field(fields, "MessageId")?,
        pop_receipt: parse_field(fields, "PopReceipt")?,
        // An empty <MessageText/> produces no text event
        message_text: fields.get("MessageText").cloned().unwrap_or_default(),
        dequeue_count: fields
            .get("DequeueCount")
            .and_then(|count| count.parse().ok())
            .unwrap_or(1),
        expiration_time: parse_time(fields, "ExpirationTime"),
        time_next_visible: parse_time(fields, "TimeNextVisible"),
    })
}

fn parse_field<T>(fields: &XmlFields, name: &str) -> Result<T, ServiceError>
where
    T: std::str::FromStr,
{
    fields
        .get(name)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| ServiceError::InvalidResponse(format!("{} not found in response", name)))
}

fn parse_time(fields: &XmlFields, name: &str) -> Option<DateTime<Utc>> {
    fields
        .get(name)
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        .map(|time| time.with_timezone(&Utc))
}

/// Build a [`ServiceError`] from an `<Error>` response body
fn parse_error_response(xml: &str, status: u16, header_code: Option<String>) -> ServiceError {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut error_code = None;
    let mut error_message = None;
    let mut in_error = false;
    let mut in_code = false;
    let mut in_message = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Error" => in_error = true,
                b"Code" if in_error => in_code = true,
                b"Message" if in_error => in_message = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_code {
                    error_code = e.unescape().ok().map(|s| s.into_owned());
                    in_code = false;
                } else if in_message {
                    error_message = e.unescape().ok().map(|s| s.into_owned());
                    in_message = false;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Error" => {
                in_error = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    ServiceError::Status {
        status,
        code: error_code
            .or(header_code)
            .unwrap_or_else(|| "Unknown".to_string()),
        message: error_message.unwrap_or_else(|| "Unknown error".to_string()),
    }
}
