//! HttpGenerationBackend -- concrete [`GenerationBackend`] that POSTs the
//! chat request to an HTTP endpoint and streams the raw response body.
//!
//! Request body: `{"inputCode": <text>, "model": <model id>, "apiKey": <key>}`.
//! A non-success status is reported from `open` as `Rejected`, so no
//! placeholder is created for it. The credential is only exposed while the
//! request body is serialized and never logged.

use std::time::Duration;

use futures_util::StreamExt;
use secrecy::ExposeSecret;
use serde::Serialize;

use threadline_core::generation::{ByteStream, GenerationBackend, GenerationRequest};
use threadline_types::config::GenerationConfig;
use threadline_types::error::GenerationError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatApiRequest<'a> {
    input_code: &'a str,
    model: &'a str,
    api_key: &'a str,
}

/// Streaming HTTP generation backend.
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGenerationBackend {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl GenerationBackend for HttpGenerationBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, GenerationError> {
        let body = ChatApiRequest {
            input_code: &request.text,
            model: &request.model_id,
            api_key: request.credential.expose_secret(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %error_body, "generation endpoint rejected request");
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                body: error_body,
            });
        }

        tracing::debug!(endpoint = %self.endpoint, model = %request.model_id, "generation stream opened");
        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| GenerationError::Stream(format!("response body read: {e}")))
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Read one HTTP/1.1 request (headers plus Content-Length body).
    async fn read_request(socket: &mut tokio::net::TcpStream) -> (String, String) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[header_end..header_end + length]).to_string();
        (head, body)
    }

    /// Serve exactly one request with a canned raw response.
    async fn serve_once(response: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let (_head, body) = read_request(&mut socket).await;
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
            body
        });
        (format!("http://{addr}/api/chatAPI"), server)
    }

    fn backend(endpoint: String) -> HttpGenerationBackend {
        HttpGenerationBackend::new(&GenerationConfig {
            endpoint,
            timeout_secs: 10,
        })
        .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            text: "2+2?".to_string(),
            model_id: "gpt-3.5-turbo".to_string(),
            credential: SecretString::from("sk-test".to_string()),
        }
    }

    #[tokio::test]
    async fn streams_chunked_body_and_sends_expected_json() {
        let (endpoint, server) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n1\r\n4\r\n1\r\n!\r\n0\r\n\r\n",
        )
        .await;

        let mut body = backend(endpoint).open(&request()).await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = body.next().await {
            collected.extend(chunk.unwrap());
        }
        assert_eq!(collected, b"4!");

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["inputCode"], "2+2?");
        assert_eq!(sent["model"], "gpt-3.5-turbo");
        assert_eq!(sent["apiKey"], "sk-test");
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let (endpoint, server) = serve_once(
            b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 11\r\nConnection: close\r\n\r\ninvalid key",
        )
        .await;

        match backend(endpoint).open(&request()).await {
            Err(GenerationError::Rejected { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid key");
            }
            Err(other) => panic!("expected Rejected, got {other:?}"),
            Ok(_) => panic!("expected Rejected, got a stream"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = backend(format!("http://{addr}/api/chatAPI"))
            .open(&request())
            .await;

        assert!(matches!(result, Err(GenerationError::Request(_))));
    }
}
