use super::TransportError;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;

/// Provider error bodies are truncated to this many characters in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Thin reqwest wrapper bound to one provider base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn header_map(headers: &[(&str, String)]) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (k, v) in headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
            let value = HeaderValue::from_str(v)
                .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    async fn send(&self, path: &str, headers: &[(&str, String)], body: &Value) -> Result<Response> {
        let resp = self
            .client
            .post(self.url(path))
            .headers(Self::header_map(headers)?)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::from_reqwest(e)))?;
        Self::check_status(resp).await
    }

    /// Turn a non-2xx response into a classified [`Error::Remote`].
    async fn check_status(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let retry_after_ms = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after_ms);
        let body = resp.text().await.unwrap_or_default();
        let message: String = body.chars().take(MAX_ERROR_BODY).collect();
        Err(Error::remote(status.as_u16(), message, retry_after_ms))
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json(
        &self,
        path: &str,
        headers: &[(&str, String)],
        body: &Value,
    ) -> Result<Value> {
        let resp = self.send(path, headers, body).await?;
        resp.json()
            .await
            .map_err(|e| Error::Transport(TransportError::from_reqwest(e)))
    }

    /// POST a JSON body and return the raw response body as a byte stream.
    pub async fn post_stream(
        &self,
        path: &str,
        headers: &[(&str, String)],
        body: &Value,
    ) -> Result<BoxStream<'static, Bytes>> {
        let resp = self.send(path, headers, body).await?;
        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::from_reqwest(e)));
        Ok(Box::pin(byte_stream))
    }

    /// GET `path` with its own short timeout; succeeds on any 2xx.
    pub async fn ping(&self, path: &str, timeout: Duration) -> Result<()> {
        let resp = self
            .client
            .get(self.url(path))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::from_reqwest(e)))?;
        Self::check_status(resp).await.map(|_| ())
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after_ms(value: &str) -> Option<u32> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).min(u32::MAX as f64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after_ms("30"), Some(30_000));
        assert_eq!(parse_retry_after_ms(" 1.5 "), Some(1_500));
        assert_eq!(parse_retry_after_ms("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after_ms("-1"), None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let t = HttpTransport::new("http://localhost:11434/", Duration::from_secs(5)).unwrap();
        assert_eq!(t.url("/api/generate"), "http://localhost:11434/api/generate");
    }
}
