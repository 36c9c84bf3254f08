//! Blocking HTTP plumbing shared by the REST collaborators.
//!
//! One [`HttpClient`] per run; every request goes through the same agent and
//! inherits its global timeout. HTTP error statuses are turned into
//! [`ApiError::Status`] carrying the remote's own message when it sent one.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use ureq::Agent;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body echoed back to the user.
const MAX_ERROR_BODY: usize = 512;

/// Errors from REST calls.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, TLS).
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: Box<ureq::Error>,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}: {message}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Remote error message, or the start of the body.
        message: String,
    },

    /// The body could not be read or decoded.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder diagnostic.
        message: String,
    },
}

/// Result alias for REST calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// How a request authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// No `Authorization` header.
    None,
    /// HTTP basic auth.
    Basic {
        /// User name.
        username: String,
        /// Password or token.
        password: String,
    },
    /// OAuth bearer token.
    Bearer(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => write!(f, "Basic({username})"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

impl Auth {
    /// Basic auth from a user/password pair.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    fn header_value(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                Some(format!("Basic {encoded}"))
            }
            Self::Bearer(token) => Some(format!("Bearer {token}")),
        }
    }

    /// Whether any credentials are attached.
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Thin wrapper over a `ureq` agent with a bounded timeout.
#[derive(Clone)]
pub struct HttpClient {
    agent: Agent,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }

    /// GET a URL and return the body as text.
    #[instrument(skip(self, auth, query), fields(auth = ?auth))]
    pub fn get_text(&self, url: &str, query: &[(&str, &str)], auth: &Auth) -> ApiResult<String> {
        let mut request = self
            .agent
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        if let Some(value) = auth.header_value() {
            request = request.header("Authorization", value);
        }

        let response = request.call().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source: Box::new(source),
        })?;
        read_success(url, response)
    }

    /// GET a URL and decode the JSON body.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        auth: &Auth,
    ) -> ApiResult<T> {
        let text = self.get_text(url, query, auth)?;
        decode_json(url, &text)
    }

    /// Send a body with the given method (`POST`, `PATCH`) and return the
    /// response text.
    #[instrument(skip(self, auth, query, body), fields(auth = ?auth, bytes = body.len()))]
    pub fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        auth: &Auth,
        content_type: &str,
        body: &[u8],
    ) -> ApiResult<String> {
        let mut request = match method {
            Method::Post => self.agent.post(url),
            Method::Patch => self.agent.patch(url),
        }
        .header("Accept", "application/json")
        .header("User-Agent", USER_AGENT)
        .header("Content-Type", content_type);
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        if let Some(value) = auth.header_value() {
            request = request.header("Authorization", value);
        }

        let response = request.send(body).map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source: Box::new(source),
        })?;
        read_success(url, response)
    }
}

/// Methods that carry a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `POST`
    Post,
    /// `PATCH`
    Patch,
}

fn read_success(url: &str, mut response: ureq::http::Response<ureq::Body>) -> ApiResult<String> {
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ApiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    debug!(%url, status, bytes = body.len(), "response received");

    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(ApiError::Status {
            url: url.to_string(),
            status,
            message: error_message(&body),
        })
    }
}

/// Decode JSON, reporting the URL on failure.
pub fn decode_json<T: DeserializeOwned>(url: &str, text: &str) -> ApiResult<T> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Pull a human message out of an error body.
///
/// GitHub-style APIs send `{"message": ...}`; Google sends
/// `{"error": {"message": ...}}`; Gerrit sends plain text.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .get("message")
            .or_else(|| value.get("error").and_then(|e| e.get("message")))
            .and_then(serde_json::Value::as_str);
        if let Some(message) = message {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty response body)".to_string();
    }
    let mut end = trimmed.len().min(MAX_ERROR_BODY);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Throwaway HTTP server for client tests.
#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve one canned `(status, body)` per incoming connection, in order.
    ///
    /// Returns the base URL and a handle yielding every raw request seen.
    pub(crate) fn serve(replies: Vec<(u16, &str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let replies: Vec<(u16, String)> = replies
            .into_iter()
            .map(|(status, body)| (status, body.to_string()))
            .collect();

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in replies {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request = String::new();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap() == 0 {
                        break;
                    }
                    if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                    let done = line == "\r\n";
                    request.push_str(&line);
                    if done {
                        break;
                    }
                }
                let mut payload = vec![0; content_length];
                reader.read_exact(&mut payload).unwrap();
                request.push_str(&String::from_utf8_lossy(&payload));

                write!(
                    stream,
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
                stream.flush().unwrap();
                seen.push(request);
            }
            seen
        });

        (format!("http://{addr}"), handle)
    }
}
