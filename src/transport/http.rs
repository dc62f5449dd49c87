use super::{sse::decode_sse, GenerativeService, TransportError};
use crate::{BoxStream, Error, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Proxy;
use serde_json::{json, Value};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
const MAX_ERROR_BODY_CHARS: usize = 500;

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

/// Lazily builds the HTTP client for a credential and rebuilds it when the
/// credential changes.
///
/// The client carries the bearer header as a default header, so a credential
/// change (key rotation, account switch) must go through a rebuild or an explicit
/// [`invalidate`](Self::invalidate).
pub struct ClientFactory {
    cached: Mutex<Option<(String, reqwest::Client)>>,
    builds: AtomicUsize,
    connect_timeout: Duration,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self {
            cached: Mutex::new(None),
            builds: AtomicUsize::new(0),
            connect_timeout: Duration::from_secs(
                env_parse::<u64>("REFINE_HTTP_CONNECT_TIMEOUT_SECS").unwrap_or(10),
            ),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Client for `credential`, reusing the previous one when the credential is unchanged.
    pub fn client_for(&self, credential: &str) -> Result<reqwest::Client> {
        let mut cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((key, client)) = cached.as_ref() {
            if key == credential {
                return Ok(client.clone());
            }
        }
        let client = self.build(credential)?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        debug!(builds = self.build_count(), "http client built");
        *cached = Some((credential.to_string(), client.clone()));
        Ok(client)
    }

    /// Drops the cached client; the next call builds a fresh one.
    pub fn invalidate(&self) {
        let mut cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
        *cached = None;
    }

    /// Number of clients built so far.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    fn build(&self, credential: &str) -> Result<reqwest::Client> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential))
            .map_err(|_| Error::runtime("invalid credential: not a valid header value"))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        // No total timeout here: streams legitimately stay open for a long time.
        // The per-call deadline is enforced by the streaming layer.
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(env_parse("REFINE_HTTP_POOL_MAX_IDLE_PER_HOST").unwrap_or(8))
            .pool_idle_timeout(Some(Duration::from_secs(
                env_parse("REFINE_HTTP_POOL_IDLE_TIMEOUT_SECS").unwrap_or(90),
            )))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Ok(proxy_url) = env::var("REFINE_PROXY_URL") {
            match Proxy::all(&proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => warn!(error = %e, "ignoring invalid REFINE_PROXY_URL"),
            }
        }

        builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))
    }
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON-over-HTTP plumbing shared by the request/response and streaming calls.
pub struct HttpTransport {
    factory: Arc<ClientFactory>,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, factory: Arc<ClientFactory>) -> Self {
        Self {
            factory,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    /// POST `body` to `path`. Non-2xx responses become [`Error::Remote`].
    pub async fn post(
        &self,
        path: &str,
        body: &Value,
        credential: &str,
        streaming: bool,
    ) -> Result<reqwest::Response> {
        let client = self.factory.client_for(credential)?;
        let url = format!("{}{}", self.base_url, path);
        let mut req = client.post(&url).json(body);
        if streaming {
            req = req.header("accept", "text/event-stream");
        }
        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let raw = resp.text().await.unwrap_or_default();
        Err(Error::Remote {
            status: status.as_u16(),
            message: remote_message(&raw),
        })
    }

    pub async fn post_json(&self, path: &str, body: &Value, credential: &str) -> Result<Value> {
        let resp = self.post(path, body, credential, false).await?;
        let raw = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        // a body that arrived but does not parse is a provider fault, not a network one
        Ok(serde_json::from_slice(&raw)?)
    }

    pub async fn post_stream(
        &self,
        path: &str,
        body: &Value,
        credential: &str,
    ) -> Result<BoxStream<'static, bytes::Bytes>> {
        let resp = self.post(path, body, credential, true).await?;
        let bytes = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Ok(Box::pin(bytes))
    }
}

/// Prefers the provider's `error.message`, falling back to the (bounded) raw body.
fn remote_message(raw: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        let msg = v
            .pointer("/error/message")
            .or_else(|| v.get("message"))
            .or_else(|| v.get("error"))
            .and_then(|m| m.as_str());
        if let Some(msg) = msg {
            return msg.to_string();
        }
    }
    raw.trim().chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// OpenAI-compatible chat completions service.
pub struct HttpGenerativeService {
    transport: HttpTransport,
    model: String,
    temperature: Option<f32>,
}

impl HttpGenerativeService {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_factory(base_url, model, Arc::new(ClientFactory::new()))
    }

    pub fn with_factory(
        base_url: impl Into<String>,
        model: impl Into<String>,
        factory: Arc<ClientFactory>,
    ) -> Self {
        Self {
            transport: HttpTransport::new(base_url, factory),
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        self.transport.factory()
    }

    fn request_body(&self, prompt: &str, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": stream,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

/// Surfaces an in-band `{"error": ...}` frame as a crate error.
fn frame_error(frame: &Value) -> Option<Error> {
    let err = frame.get("error")?;
    let msg = err
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    Some(Error::runtime(msg))
}

#[async_trait]
impl GenerativeService for HttpGenerativeService {
    async fn send(&self, prompt: &str, credential: &str) -> Result<String> {
        let body = self.request_body(prompt, false);
        let resp = self
            .transport
            .post_json(CHAT_COMPLETIONS_PATH, &body, credential)
            .await?;
        if let Some(e) = frame_error(&resp) {
            return Err(e);
        }
        resp.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::runtime("api error: response carried no message content"))
    }

    async fn stream(&self, prompt: &str, credential: &str) -> Result<BoxStream<'static, String>> {
        let body = self.request_body(prompt, true);
        let bytes = self
            .transport
            .post_stream(CHAT_COMPLETIONS_PATH, &body, credential)
            .await?;

        let fragments = decode_sse(bytes).filter_map(|frame| async move {
            match frame {
                Err(e) => Some(Err(e)),
                Ok(v) => {
                    if let Some(e) = frame_error(&v) {
                        return Some(Err(e));
                    }
                    v.pointer("/choices/0/delta/content")
                        .and_then(|c| c.as_str())
                        .filter(|s| !s.is_empty())
                        .map(|s| Ok(s.to_string()))
                }
            }
        });
        Ok(Box::pin(fragments))
    }

    fn name(&self) -> &'static str {
        "openai-chat"
    }
}
