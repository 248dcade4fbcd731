//! HTTP JSON-RPC Client
//!
//! Blocking reqwest client used for every node interaction. Requests are
//! sent once; retry decisions belong to the caller.

use crate::error::{RelayError, RelayResult};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const USER_AGENT: &str = concat!("delegate-relay/", env!("CARGO_PKG_VERSION"));

/// Build the shared blocking client
pub fn build_client(timeout: Duration) -> RelayResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| RelayError::config(format!("Failed to create HTTP client: {}", e)))
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Why a JSON-RPC call did not produce a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcFailure {
    /// Connection or timeout
    Transport(String),
    /// The node answered with an error object
    Node { code: i64, message: String },
    /// Non-2xx status whose body is not a JSON-RPC error
    Http { status: u16, body: String },
    /// The answer could not be interpreted
    Malformed(String),
}

impl RpcFailure {
    /// Map onto a relay error, keeping node messages verbatim
    pub fn into_error(self, kind: fn(String) -> RelayError) -> RelayError {
        match self {
            RpcFailure::Node { message, .. } => kind(message),
            RpcFailure::Http { body, .. } => kind(body),
            other => kind(other.to_string()),
        }
    }
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcFailure::Transport(msg) => write!(f, "RPC request failed: {}", msg),
            RpcFailure::Node { code, message } => write!(f, "RPC error {}: {}", code, message),
            RpcFailure::Http { status, body } => write!(f, "HTTP {}: {}", status, body),
            RpcFailure::Malformed(msg) => write!(f, "Failed to parse RPC response: {}", msg),
        }
    }
}

/// JSON-RPC 2.0 client bound to one endpoint
pub struct JsonRpcClient {
    client: Client,
    url: url::Url,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: url::Url, timeout: Duration) -> RelayResult<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Call `method` and decode a non-null `result`
    pub fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcFailure> {
        match self.call_raw(method, params)? {
            Value::Null => Err(RpcFailure::Malformed(format!("{} returned no result", method))),
            value => decode_result(value),
        }
    }

    /// Call `method` where a null `result` is a valid answer
    pub fn call_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, RpcFailure> {
        match self.call_raw(method, params)? {
            Value::Null => Ok(None),
            value => decode_result(value).map(Some),
        }
    }

    fn call_raw(&self, method: &str, params: Value) -> Result<Value, RpcFailure> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .map_err(|e| RpcFailure::Transport(e.to_string()))?;
            return Err(non_success_failure(status, body));
        }

        let body: RpcResponse = response
            .json()
            .map_err(|e| RpcFailure::Malformed(e.to_string()))?;

        parse_response(body)
    }
}

fn parse_response(body: RpcResponse) -> Result<Value, RpcFailure> {
    if let Some(error) = body.error {
        return Err(RpcFailure::Node {
            code: error.code,
            message: error.message,
        });
    }
    Ok(body.result.unwrap_or(Value::Null))
}

/// Classify a non-2xx answer, preferring a JSON-RPC error object in the body
fn non_success_failure(status: StatusCode, body: String) -> RpcFailure {
    if let Ok(RpcResponse {
        error: Some(error), ..
    }) = serde_json::from_str::<RpcResponse>(&body)
    {
        return RpcFailure::Node {
            code: error.code,
            message: error.message,
        };
    }

    if body.trim().is_empty() {
        return RpcFailure::Transport(format!("endpoint returned HTTP {}", status));
    }

    RpcFailure::Http {
        status: status.as_u16(),
        body,
    }
}

fn decode_result<T: DeserializeOwned>(value: Value) -> Result<T, RpcFailure> {
    serde_json::from_value(value).map_err(|e| RpcFailure::Malformed(e.to_string()))
}

/// Local JSON-RPC stand-in answering one canned response per connection
#[cfg(test)]
pub(crate) mod mock_node {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    pub(crate) struct MockNode {
        pub url: String,
        handle: JoinHandle<Vec<String>>,
    }

    impl MockNode {
        /// Serve `(status line, body)` pairs in order
        pub(crate) fn serve(answers: Vec<(&'static str, String)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock node");
            let url = format!("http://{}", listener.local_addr().expect("local addr"));

            let handle = thread::spawn(move || {
                let mut requests = Vec::new();
                for (status, body) in answers {
                    let (mut stream, _) = listener.accept().expect("accept");
                    requests.push(read_request(&mut stream));
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    stream.write_all(response.as_bytes()).expect("write response");
                }
                requests
            });

            Self { url, handle }
        }

        /// Request bodies received, in order
        pub(crate) fn requests(self) -> Vec<String> {
            self.handle.join().expect("mock node thread")
        }
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut reader = BufReader::new(stream);
        let mut content_length = 0usize;

        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("header line");
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().expect("content length");
                }
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).expect("request body");
        String::from_utf8(body).expect("utf8 body")
    }
}
