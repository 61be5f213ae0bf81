use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingProvider;
use crate::error::EmbeddingError;

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL_ID: &str = "text-embedding-3-large";
pub const OPENAI_DEFAULT_DIMENSIONS: usize = 3072;

const OPENAI_MODEL_DIMENSIONS: &[(&str, usize)] = &[
    ("text-embedding-3-large", 3072),
    ("text-embedding-3-small", 1536),
    ("text-embedding-ada-002", 1536),
];

pub fn openai_model_dimensions(model_id: &str) -> Option<usize> {
    OPENAI_MODEL_DIMENSIONS
        .iter()
        .find(|(known, _)| *known == model_id)
        .map(|(_, dimensions)| *dimensions)
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
    pub dimensions: usize,
    /// Sent as the request `dimensions` field; ada-002 rejects it.
    pub requested_dimensions: Option<usize>,
    pub timeout: Duration,
    pub batch_size: usize,
}

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
    endpoint: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&EmbedRequest {
                model: &self.config.model_id,
                input: texts,
                dimensions: self.config.requested_dimensions,
            })
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        parse_response(status, &body, texts.len())
    }
}

pub(crate) fn parse_response(
    status: u16,
    body: &str,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if !(200..300).contains(&status) {
        return Err(EmbeddingError::Status {
            status,
            body: body.to_string(),
        });
    }

    let parsed = serde_json::from_str::<EmbedResponse>(body)
        .map_err(|err| EmbeddingError::Decode(err.to_string()))?;
    order_by_index(parsed, expected)
}

pub(crate) fn order_by_index(
    response: EmbedResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if response.data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: response.data.len(),
        });
    }

    let mut slots = vec![None::<Vec<f32>>; expected];
    for item in response.data {
        let slot = slots
            .get_mut(item.index)
            .ok_or(EmbeddingError::IndexMismatch { expected })?;
        if slot.replace(item.embedding).is_some() {
            return Err(EmbeddingError::IndexMismatch { expected });
        }
    }

    slots
        .into_iter()
        .collect::<Option<Vec<Vec<f32>>>>()
        .ok_or(EmbeddingError::IndexMismatch { expected })
}

impl EmbeddingProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let batch_size = self.config.batch_size.max(1);
        let mut out = Vec::with_capacity(texts.len());

        for (batch_idx, batch) in texts.chunks(batch_size).enumerate() {
            debug!(
                batch_idx,
                batch_len = batch.len(),
                model_id = %self.config.model_id,
                "requesting embeddings"
            );
            out.extend(self.request_batch(batch)?);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: &str) -> EmbedResponse {
        serde_json::from_str(raw).expect("response should deserialize")
    }

    #[test]
    fn order_by_index_restores_request_order() {
        let parsed = response(
            r#"{"object":"list","model":"m","data":[
                {"object":"embedding","index":1,"embedding":[2.0,2.0]},
                {"object":"embedding","index":0,"embedding":[1.0,1.0]}
            ]}"#,
        );
        let ordered = order_by_index(parsed, 2).expect("indices are complete");
        assert_eq!(ordered, vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
    }

    #[test]
    fn order_by_index_rejects_duplicates_and_gaps() {
        let duplicate = response(
            r#"{"data":[{"index":0,"embedding":[1.0]},{"index":0,"embedding":[2.0]}]}"#,
        );
        assert!(matches!(
            order_by_index(duplicate, 2),
            Err(EmbeddingError::IndexMismatch { expected: 2 })
        ));

        let out_of_range = response(r#"{"data":[{"index":5,"embedding":[1.0]}]}"#);
        assert!(matches!(
            order_by_index(out_of_range, 1),
            Err(EmbeddingError::IndexMismatch { expected: 1 })
        ));
    }

    #[test]
    fn order_by_index_rejects_short_responses() {
        let short = response(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#);
        assert!(matches!(
            order_by_index(short, 3),
            Err(EmbeddingError::CountMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn error_statuses_keep_the_body() {
        match parse_response(429, r#"{"error":{"message":"slow down"}}"#, 1) {
            Err(EmbeddingError::Status { status, body }) => {
                assert_eq!(status, 429);
                assert!(body.contains("slow down"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_bodies_are_decode_errors() {
        assert!(matches!(
            parse_response(200, "<html>gateway</html>", 1),
            Err(EmbeddingError::Decode(_))
        ));
        assert!(matches!(
            parse_response(200, r#"{"data":[{"index":0}]}"#, 1),
            Err(EmbeddingError::Decode(_))
        ));
    }

    #[test]
    fn success_bodies_are_ordered() {
        let body = r#"{"data":[{"index":1,"embedding":[1.0]},{"index":0,"embedding":[0.0]}]}"#;
        assert_eq!(
            parse_response(200, body, 2).expect("parsed"),
            vec![vec![0.0], vec![1.0]]
        );
    }

    #[test]
    fn stub_server_error_maps_to_status() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf).expect("read request");
            let body = "upstream unavailable";
            write!(
                stream,
                "HTTP/1.1 503 Service Unavailable\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("write response");
        });

        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: format!("http://{addr}/v1"),
            model_id: OPENAI_DEFAULT_MODEL_ID.to_string(),
            dimensions: OPENAI_DEFAULT_DIMENSIONS,
            requested_dimensions: None,
            timeout: Duration::from_secs(5),
            batch_size: 10,
        })
        .expect("client builds");

        match provider.embed_batch(&["q".to_string()]) {
            Err(EmbeddingError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream unavailable");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        server.join().expect("server thread");
    }

    #[test]
    fn known_models_have_native_widths() {
        assert_eq!(openai_model_dimensions("text-embedding-3-large"), Some(3072));
        assert_eq!(openai_model_dimensions("text-embedding-3-small"), Some(1536));
        assert_eq!(openai_model_dimensions("text-embedding-ada-002"), Some(1536));
        assert_eq!(openai_model_dimensions("custom-model"), None);
    }

    #[test]
    fn request_omits_dimensions_unless_set() {
        let input = vec!["q".to_string()];
        let without = serde_json::to_value(EmbedRequest {
            model: "m",
            input: &input,
            dimensions: None,
        })
        .expect("serialize");
        assert!(without.get("dimensions").is_none());

        let with = serde_json::to_value(EmbedRequest {
            model: "m",
            input: &input,
            dimensions: Some(256),
        })
        .expect("serialize");
        assert_eq!(with["dimensions"], 256);
    }

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: "http://localhost:9/v1/".to_string(),
            model_id: OPENAI_DEFAULT_MODEL_ID.to_string(),
            dimensions: OPENAI_DEFAULT_DIMENSIONS,
            requested_dimensions: None,
            timeout: Duration::from_secs(1),
            batch_size: 10,
        })
        .expect("client builds");
        assert_eq!(provider.endpoint, "http://localhost:9/v1/embeddings");
        assert_eq!(provider.dimensions(), OPENAI_DEFAULT_DIMENSIONS);
    }
}
