//! Inbound webhook envelope and body parsing.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Open, order-preserving JSON object used for inbound and outbound payloads.
pub type Payload = serde_json::Map<String, Value>;

/// Base path of the webhook routes.
pub const WEBHOOK_BASE_PATH: &str = "/webhook";

/// Endpoint identifier used when no path segment follows the base path.
pub const DEFAULT_ENDPOINT: &str = "default";

/// Key of the fallback mapping holding an unparseable body.
pub const RAW_BODY_KEY: &str = "raw";

/// Request headers with case-insensitive lookup.
///
/// Keys are stored lower-cased. Values are kept as received; repeated
/// headers are joined with `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebhookHeaders(BTreeMap<String, String>);

impl WebhookHeaders {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a header map from name/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.insert(name.as_ref(), value);
        }
        headers
    }

    /// Adds a header value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.0
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    /// Looks up a header, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns true if the header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over lower-cased names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of distinct headers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Normalized representation of one inbound webhook call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Identifier used to correlate log lines for this request.
    pub id: Uuid,
    /// Endpoint identifier taken from the URL path.
    pub endpoint: String,
    /// When the request was received.
    pub timestamp: DateTime<Utc>,
    /// HTTP method.
    pub method: String,
    /// Request headers.
    pub headers: WebhookHeaders,
    /// Parsed body. Always a mapping.
    pub data: Payload,
    /// Caller address, when known.
    pub remote_address: Option<String>,
}

impl WebhookEnvelope {
    /// Creates an envelope stamped with the current time.
    pub fn new(endpoint: impl Into<String>, method: impl Into<String>, data: Payload) -> Self {
        let endpoint = endpoint.into();
        Self {
            id: Uuid::new_v4(),
            endpoint: if endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint
            },
            timestamp: Utc::now(),
            method: method.into(),
            headers: WebhookHeaders::new(),
            data,
            remote_address: None,
        }
    }

    /// Sets the headers.
    pub fn with_headers(mut self, headers: WebhookHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the remote address.
    pub fn with_remote_address(mut self, addr: Option<String>) -> Self {
        self.remote_address = addr;
        self
    }
}

/// Extracts the endpoint identifier from a request path.
///
/// `/webhook` and `/webhook/` map to [`DEFAULT_ENDPOINT`]; everything after
/// `/webhook/` is the identifier, nested segments included. The identifier
/// is percent-decoded; invalid UTF-8 is replaced lossily.
pub fn endpoint_from_path(path: &str) -> String {
    let rest = match path.strip_prefix(WEBHOOK_BASE_PATH) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };

    let rest = rest.trim_matches('/');
    if rest.is_empty() {
        DEFAULT_ENDPOINT.to_string()
    } else {
        String::from_utf8_lossy(&urlencoding::decode_binary(rest.as_bytes())).into_owned()
    }
}

/// Body encodings the receiver understands.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BodyKind {
    Json,
    UrlEncoded,
    Multipart,
    Other,
}

fn body_kind(content_type: Option<&str>) -> BodyKind {
    let Some(content_type) = content_type else {
        return BodyKind::Other;
    };

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == "application/json" || mime.ends_with("+json") {
        BodyKind::Json
    } else if mime == "application/x-www-form-urlencoded" {
        BodyKind::UrlEncoded
    } else if mime == "multipart/form-data" {
        BodyKind::Multipart
    } else {
        BodyKind::Other
    }
}

/// Wraps undecodable body text in the single-key fallback mapping.
pub fn raw_payload(body: &[u8]) -> Payload {
    let mut payload = Payload::new();
    payload.insert(
        RAW_BODY_KEY.to_string(),
        Value::String(String::from_utf8_lossy(body).into_owned()),
    );
    payload
}

/// Parses a request body according to its `Content-Type`.
///
/// Never fails: anything that cannot be read as a mapping degrades to
/// `{"raw": <text>}`.
pub async fn parse_body(content_type: Option<&str>, body: Bytes) -> Payload {
    match body_kind(content_type) {
        BodyKind::Json => parse_json(&body),
        BodyKind::UrlEncoded => parse_urlencoded(&body),
        BodyKind::Multipart => {
            let content_type = content_type.unwrap_or_default();
            match parse_multipart(content_type, body.clone()).await {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::debug!(error = %err, "Malformed multipart body, keeping raw text");
                    raw_payload(&body)
                }
            }
        }
        BodyKind::Other => raw_payload(&body),
    }
}

fn parse_json(body: &[u8]) -> Payload {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Payload::new();
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Payload::new(),
        Ok(_) => raw_payload(body),
        Err(err) => {
            tracing::debug!(error = %err, "Malformed JSON body, keeping raw text");
            raw_payload(body)
        }
    }
}

fn parse_urlencoded(body: &[u8]) -> Payload {
    let mut payload = Payload::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        payload
            .entry(key.into_owned())
            .or_insert_with(|| Value::String(value.into_owned()));
    }
    payload
}

async fn parse_multipart(content_type: &str, body: Bytes) -> Result<Payload, multer::Error> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut payload = Payload::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let value = match field.file_name().map(str::to_string) {
            Some(file_name) => {
                // File contents are not kept, only the name.
                field.bytes().await?;
                file_name
            }
            None => field.text().await?,
        };

        payload.entry(name).or_insert(Value::String(value));
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_from_path() {
        assert_eq!(endpoint_from_path("/webhook"), "default");
        assert_eq!(endpoint_from_path("/webhook/"), "default");
        assert_eq!(endpoint_from_path("/webhook/payment"), "payment");
        assert_eq!(endpoint_from_path("/webhook/payment/"), "payment");
        assert_eq!(endpoint_from_path("/webhook/github/push"), "github/push");
        assert_eq!(endpoint_from_path("/webhook/my%20hook"), "my hook");
        assert_eq!(endpoint_from_path("/webhook/%E6%94%AF%E4%BB%98"), "支付");
        assert_eq!(endpoint_from_path("/webhook/bad%FF"), "bad\u{FFFD}");
        assert_eq!(endpoint_from_path("/"), "default");
    }

    #[test]
    fn test_headers_case_insensitive() {
        let headers = WebhookHeaders::from_pairs([
            ("X-Webhook-Secret", "abc"),
            ("Content-Type", "application/json"),
        ]);

        assert_eq!(headers.get("x-webhook-secret"), Some("abc"));
        assert_eq!(headers.get("X-WEBHOOK-SECRET"), Some("abc"));
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert!(!headers.contains("authorization"));
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = WebhookHeaders::new();
        headers.insert("Accept", "text/plain");
        headers.insert("accept", "application/json");
        assert_eq!(headers.get("Accept"), Some("text/plain, application/json"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_envelope_never_has_empty_endpoint() {
        let envelope = WebhookEnvelope::new("", "POST", Payload::new());
        assert_eq!(envelope.endpoint, DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn test_parse_json_object_preserves_types() {
        let body = Bytes::from_static(br#"{"order_id": "ORD-1", "amount": 199.99, "count": 3}"#);
        let payload = parse_body(Some("application/json; charset=utf-8"), body).await;

        assert_eq!(payload["order_id"], json!("ORD-1"));
        assert!(payload["amount"].is_f64());
        assert!(payload["count"].is_i64());
        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["order_id", "amount", "count"]);
    }

    #[tokio::test]
    async fn test_parse_json_fallbacks() {
        let payload = parse_body(Some("application/json"), Bytes::from_static(b"{not json")).await;
        assert_eq!(payload[RAW_BODY_KEY], json!("{not json"));

        let payload = parse_body(Some("application/json"), Bytes::from_static(b"[1, 2]")).await;
        assert_eq!(payload[RAW_BODY_KEY], json!("[1, 2]"));

        let payload = parse_body(Some("application/json"), Bytes::new()).await;
        assert!(payload.is_empty());

        let payload = parse_body(Some("application/json"), Bytes::from_static(b"null")).await;
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_parse_urlencoded() {
        let body = Bytes::from_static(b"field1=value1&field2=hello+world&field1=ignored");
        let payload = parse_body(Some("application/x-www-form-urlencoded"), body).await;

        assert_eq!(payload["field1"], json!("value1"));
        assert_eq!(payload["field2"], json!("hello world"));
        assert_eq!(payload.len(), 2);
    }

    #[tokio::test]
    async fn test_parse_multipart() {
        let body = concat!(
            "--XYZ\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n",
            "\r\n",
            "Disk alert\r\n",
            "--XYZ\r\n",
            "Content-Disposition: form-data; name=\"report\"; filename=\"report.txt\"\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "contents\r\n",
            "--XYZ--\r\n",
        );
        let payload = parse_body(
            Some("multipart/form-data; boundary=XYZ"),
            Bytes::from_static(body.as_bytes()),
        )
        .await;

        assert_eq!(payload["title"], json!("Disk alert"));
        assert_eq!(payload["report"], json!("report.txt"));
    }

    #[tokio::test]
    async fn test_parse_multipart_without_boundary_is_raw() {
        let payload = parse_body(Some("multipart/form-data"), Bytes::from_static(b"abc")).await;
        assert_eq!(payload[RAW_BODY_KEY], json!("abc"));
    }

    #[tokio::test]
    async fn test_parse_other_content_types_as_raw() {
        let payload = parse_body(Some("text/plain"), Bytes::from_static(b"ping")).await;
        assert_eq!(payload[RAW_BODY_KEY], json!("ping"));

        let payload = parse_body(None, Bytes::from_static(br#"{"a": 1}"#)).await;
        assert_eq!(payload[RAW_BODY_KEY], json!(r#"{"a": 1}"#));
    }
}
