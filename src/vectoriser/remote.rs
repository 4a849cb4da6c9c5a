use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::{Vectoriser, VectoriserError};
use crate::errors::ContractViolation;
use crate::model::EmbeddingVector;

/// Client for an OpenAI-compatible `POST /embeddings` endpoint.
pub struct RemoteApi {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    /// Texts per request; the whole input goes in one request when `None`.
    batch_size: Option<usize>,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize, Debug)]
struct EmbeddingDatum {
    embedding: EmbeddingVector,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ApiResponse {
    Error { error: ApiErrorBody },
    Data { data: Vec<EmbeddingDatum> },
}

impl RemoteApi {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, VectoriserError> {
        validate_endpoint(endpoint)?;
        let endpoint = endpoint.strip_suffix('/').unwrap_or(endpoint).to_string();

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(RemoteApi {
            endpoint,
            model: model.to_string(),
            api_key,
            batch_size: None,
            client,
        })
    }

    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size.filter(|&n| n > 0);
        self
    }

    fn post(&self, path: &str) -> reqwest::blocking::RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        log::debug!("POST {url}");

        match &self.api_key {
            Some(key) => self.client.post(&url).bearer_auth(key),
            None => self.client.post(&url),
        }
    }

    fn request(&self, batch: &[String]) -> Result<Vec<EmbeddingVector>, VectoriserError> {
        let resp = self
            .post("/embeddings")
            .json(&EmbeddingRequest {
                model: &self.model,
                input: batch,
            })
            .send()?;

        let status = resp.status();
        let text = resp.text()?;

        parse_response(&text, batch.len()).map_err(|err| {
            log::error!("embedding request failed: status={status} err={err}");
            err
        })
    }
}

impl Vectoriser for RemoteApi {
    fn framework(&self) -> &str {
        "remote"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn vectorise(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, VectoriserError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = self.batch_size.unwrap_or(texts.len());
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(self.request(batch)?);
        }
        Ok(vectors)
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), VectoriserError> {
    let invalid = |message: &str| VectoriserError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: message.to_string(),
    };

    let parsed = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(invalid("scheme must be http or https")),
    }
}

/// Decode a response body for `expected` inputs, restoring input order from
/// the `index` fields.
fn parse_response(text: &str, expected: usize) -> Result<Vec<EmbeddingVector>, VectoriserError> {
    let data = match serde_json::from_str::<ApiResponse>(text)? {
        ApiResponse::Error { error } => return Err(VectoriserError::Api(error.message)),
        ApiResponse::Data { data } => data,
    };

    if data.len() != expected {
        return Err(VectoriserError::Contract(ContractViolation::Count {
            expected,
            got: data.len(),
        }));
    }

    if data.iter().any(|d| d.index.is_none()) {
        return Ok(data.into_iter().map(|d| d.embedding).collect());
    }

    // indices must be a permutation of 0..expected
    let mut slots: Vec<Option<EmbeddingVector>> = vec![None; expected];
    for (position, datum) in data.into_iter().enumerate() {
        let index = datum.index.unwrap_or(position);
        match slots.get_mut(index) {
            Some(slot) if slot.is_none() => *slot = Some(datum.embedding),
            _ => {
                return Err(VectoriserError::Contract(ContractViolation::Index {
                    position,
                    index,
                }))
            }
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use serde_json::json;

    use super::*;

    /// Answer `requests` embedding calls, one per connection. Each input `i`
    /// of a batch gets `[i, 1.0]`, returned in reverse order. Yields the batch
    /// sizes seen.
    fn serve(listener: TcpListener, requests: usize) -> thread::JoinHandle<Vec<usize>> {
        thread::spawn(move || {
            let mut sizes = Vec::new();
            for stream in listener.incoming().take(requests) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut body = vec![0; content_length];
                reader.read_exact(&mut body).unwrap();

                let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
                let inputs = request["input"].as_array().unwrap().len();
                sizes.push(inputs);

                let data: Vec<_> = (0..inputs)
                    .rev()
                    .map(|i| json!({"index": i, "embedding": [i as f32, 1.0]}))
                    .collect();
                let body = json!({ "data": data }).to_string();
                write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                )
                .unwrap();
            }
            sizes
        })
    }

    fn local_api(listener: &TcpListener, batch_size: Option<usize>) -> RemoteApi {
        let endpoint = format!("http://{}/v1", listener.local_addr().unwrap());
        let mut api = RemoteApi::new(&endpoint, "m", Some("key".into()), Duration::from_secs(5))
            .unwrap()
            .with_batch_size(batch_size);
        api.client = reqwest::blocking::Client::builder().no_proxy().build().unwrap();
        api
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {i}")).collect()
    }

    #[test]
    fn test_requests_are_split_by_batch_size() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let api = local_api(&listener, Some(2));
        let server = serve(listener, 3);

        let vectors = api.vectorise(&texts(5)).unwrap();

        assert_eq!(server.join().unwrap(), vec![2, 2, 1]);
        assert_eq!(
            vectors,
            vec![
                vec![0.0, 1.0],
                vec![1.0, 1.0],
                vec![0.0, 1.0],
                vec![1.0, 1.0],
                vec![0.0, 1.0],
            ]
        );
    }

    #[test]
    fn test_single_request_without_batch_size() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let api = local_api(&listener, None);
        let server = serve(listener, 1);

        let vectors = api.vectorise(&texts(3)).unwrap();

        assert_eq!(server.join().unwrap(), vec![3]);
        assert_eq!(vectors[2], vec![2.0, 1.0]);
    }

    #[test]
    fn test_zero_batch_size_ignored() {
        let api = RemoteApi::new("http://localhost/v1", "m", None, Duration::from_secs(1))
            .unwrap()
            .with_batch_size(Some(0));
        assert_eq!(api.batch_size, None);
    }

    #[test]
    fn test_parse_rejects_repeated_index() {
        let body =
            r#"{"data": [{"index": 0, "embedding": [1.0]}, {"index": 0, "embedding": [2.0]}]}"#;
        assert!(matches!(
            parse_response(body, 2),
            Err(VectoriserError::Contract(ContractViolation::Index { position: 1, index: 0 }))
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_range_index() {
        let body =
            r#"{"data": [{"index": 2, "embedding": [1.0]}, {"index": 0, "embedding": [2.0]}]}"#;
        assert!(matches!(
            parse_response(body, 2),
            Err(VectoriserError::Contract(ContractViolation::Index { position: 0, index: 2 }))
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_count() {
        let body = r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#;
        assert!(matches!(
            parse_response(body, 2),
            Err(VectoriserError::Contract(ContractViolation::Count { expected: 2, got: 1 }))
        ));
    }

    #[test]
    fn test_parse_restores_order() {
        let body = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ],
            "model": "text-embedding-3-small"
        }"#;

        let vectors = parse_response(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_without_index_keeps_order() {
        let body = r#"{"data": [{"embedding": [0.5]}, {"embedding": [0.25]}]}"#;
        let vectors = parse_response(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.5], vec![0.25]]);
    }

    #[test]
    fn test_parse_api_error() {
        let body =
            r#"{"error": {"message": "Incorrect API key", "type": "invalid_request_error"}}"#;
        let result = parse_response(body, 1);
        assert!(matches!(result, Err(VectoriserError::Api(msg)) if msg.contains("API key")));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_response("<html>", 1), Err(VectoriserError::Json(_))));
    }

    #[test]
    fn test_endpoint_validation() {
        let timeout = Duration::from_secs(5);
        assert!(RemoteApi::new("https://api.openai.com/v1/", "m", None, timeout).is_ok());
        assert!(matches!(
            RemoteApi::new("not a url", "m", None, timeout),
            Err(VectoriserError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            RemoteApi::new("ftp://example.com", "m", None, timeout),
            Err(VectoriserError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let api =
            RemoteApi::new("http://localhost:8080/v1/", "m", None, Duration::from_secs(1)).unwrap();
        assert_eq!(api.endpoint, "http://localhost:8080/v1");
        assert_eq!(api.model(), "m");
    }
}
