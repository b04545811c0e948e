//! HTTP clients for remote model services.
//!
//! Each service is a single `POST` endpoint taking `{"inputs": ..., "parameters": ...}`
//! and answering with JSON, the shape used by Hugging Face inference servers.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use deckgen_shared::{AnswerResult, DeckgenError, GeneratedSequence, Result};

use crate::{AnswerExtractor, BeamParams, QuestionGenerator, SamplingParams, TitleGenerator};

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("deckgen/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body kept in error messages.
const MAX_ERROR_BODY: usize = 200;

/// Transport settings shared by all three clients.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// Per-call timeout. `None` leaves calls unbounded.
    pub timeout_secs: Option<u64>,
    /// Bearer token sent as `Authorization`, if any.
    pub api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerationRequest<'a, P> {
    inputs: &'a str,
    parameters: P,
}

#[derive(Debug, Serialize)]
struct SamplingParameters {
    max_length: u32,
    num_return_sequences: u32,
    do_sample: bool,
    top_k: u32,
    top_p: f64,
}

#[derive(Debug, Serialize)]
struct BeamParameters {
    max_length: u32,
    num_beams: u32,
    early_stopping: bool,
    num_return_sequences: u32,
}

#[derive(Debug, Serialize)]
struct ExtractionRequest<'a> {
    inputs: ExtractionInputs<'a>,
}

#[derive(Debug, Serialize)]
struct ExtractionInputs<'a> {
    question: &'a str,
    context: &'a str,
}

/// Some servers wrap a single QA result in a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &HttpOptions) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(secs) = opts.timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| DeckgenError::Network(format!("failed to build HTTP client: {e}")))
}

/// A POST endpoint for one model service.
#[derive(Debug, Clone)]
struct Endpoint {
    service: &'static str,
    client: Client,
    url: Url,
    api_key: Option<String>,
}

impl Endpoint {
    fn new(service: &'static str, url: Url, opts: &HttpOptions) -> Result<Self> {
        Ok(Self {
            service,
            client: build_client(opts)?,
            url,
            api_key: opts.api_key.clone(),
        })
    }

    /// POST `body` as JSON and decode the JSON response.
    async fn post<B, R>(&self, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.client.post(self.url.clone()).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeckgenError::Network(format!("{}: {e}", self.url)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            DeckgenError::Network(format!("{}: failed to read body: {e}", self.url))
        })?;

        if !status.is_success() {
            return Err(DeckgenError::model(
                self.service,
                format!("HTTP {status}: {}", snippet(&text)),
            ));
        }

        serde_json::from_str(&text).map_err(|e| {
            DeckgenError::model(
                self.service,
                format!("invalid response: {e} (got: {})", snippet(&text)),
            )
        })
    }
}

/// First few hundred bytes of a body, cut on a char boundary.
fn snippet(text: &str) -> &str {
    if text.len() <= MAX_ERROR_BODY {
        return text;
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ---------------------------------------------------------------------------
// Question generator
// ---------------------------------------------------------------------------

/// Remote text-to-text model used with sampling to produce candidate questions.
#[derive(Debug, Clone)]
pub struct HttpQuestionGenerator {
    endpoint: Endpoint,
}

impl HttpQuestionGenerator {
    pub fn new(url: Url, opts: &HttpOptions) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new("question_generator", url, opts)?,
        })
    }
}

#[async_trait]
impl QuestionGenerator for HttpQuestionGenerator {
    #[instrument(skip_all, fields(num_sequences = num_sequences, max_length = max_length))]
    async fn generate(
        &self,
        prompt: &str,
        max_length: u32,
        num_sequences: u32,
        sampling: SamplingParams,
    ) -> Result<Vec<GeneratedSequence>> {
        let body = GenerationRequest {
            inputs: prompt,
            parameters: SamplingParameters {
                max_length,
                num_return_sequences: num_sequences,
                do_sample: sampling.do_sample,
                top_k: sampling.top_k,
                top_p: sampling.top_p,
            },
        };

        let sequences: Vec<GeneratedSequence> = self.endpoint.post(&body).await?;
        if sequences.len() != num_sequences as usize {
            warn!(
                requested = num_sequences,
                returned = sequences.len(),
                "question generator returned a different number of sequences"
            );
        }
        Ok(sequences)
    }
}

// ---------------------------------------------------------------------------
// Answer extractor
// ---------------------------------------------------------------------------

/// Remote extractive question-answering model.
#[derive(Debug, Clone)]
pub struct HttpAnswerExtractor {
    endpoint: Endpoint,
}

impl HttpAnswerExtractor {
    pub fn new(url: Url, opts: &HttpOptions) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new("answer_extractor", url, opts)?,
        })
    }
}

#[async_trait]
impl AnswerExtractor for HttpAnswerExtractor {
    async fn extract(&self, question: &str, context: &str) -> Result<AnswerResult> {
        let body = ExtractionRequest {
            inputs: ExtractionInputs { question, context },
        };

        let result = match self.endpoint.post::<_, OneOrMany<AnswerResult>>(&body).await? {
            OneOrMany::One(result) => result,
            OneOrMany::Many(results) => results.into_iter().next().ok_or_else(|| {
                DeckgenError::model("answer_extractor", "empty result list")
            })?,
        };

        debug!(score = result.score, "answer extracted");
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Title generator
// ---------------------------------------------------------------------------

/// Remote headline model decoded with beam search.
#[derive(Debug, Clone)]
pub struct HttpTitleGenerator {
    endpoint: Endpoint,
}

impl HttpTitleGenerator {
    pub fn new(url: Url, opts: &HttpOptions) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new("title_generator", url, opts)?,
        })
    }
}

#[async_trait]
impl TitleGenerator for HttpTitleGenerator {
    async fn generate(&self, prompt: &str, params: BeamParams) -> Result<Vec<GeneratedSequence>> {
        let body = GenerationRequest {
            inputs: prompt,
            parameters: BeamParameters {
                max_length: params.max_length,
                num_beams: params.num_beams,
                early_stopping: params.early_stopping,
                num_return_sequences: params.num_sequences,
            },
        };

        self.endpoint.post(&body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sampling() -> SamplingParams {
        SamplingParams {
            do_sample: true,
            top_k: 30,
            top_p: 0.95,
        }
    }

    fn url(server: &MockServer, route: &str) -> Url {
        Url::parse(&format!("{}{route}", server.uri())).unwrap()
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "é".repeat(150);
        let cut = snippet(&text);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
        assert_eq!(snippet("short"), "short");
    }

    #[tokio::test]
    async fn question_generator_sends_sampling_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/qg"))
            .and(body_json(serde_json::json!({
                "inputs": "generate questions: Tigers are cats.",
                "parameters": {
                    "max_length": 40,
                    "num_return_sequences": 3,
                    "do_sample": true,
                    "top_k": 30,
                    "top_p": 0.95
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"generated_text": "What are tigers?"},
                {"generated_text": "What kind of animal is a tiger?"},
                {"generated_text": "Are tigers cats?"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let generator =
            HttpQuestionGenerator::new(url(&server, "/qg"), &HttpOptions::default()).unwrap();
        let sequences = generator
            .generate("generate questions: Tigers are cats.", 40, 3, sampling())
            .await
            .unwrap();

        assert_eq!(sequences.len(), 3);
        assert_eq!(sequences[0].generated_text, "What are tigers?");
    }

    #[tokio::test]
    async fn bearer_token_is_sent_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/qa"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"answer": "cats", "score": 0.7})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let opts = HttpOptions {
            timeout_secs: Some(5),
            api_key: Some("secret-token".into()),
        };
        let extractor = HttpAnswerExtractor::new(url(&server, "/qa"), &opts).unwrap();
        let result = extractor.extract("What are tigers?", "Tigers are cats.").await.unwrap();

        assert_eq!(result.answer, "cats");
    }

    #[tokio::test]
    async fn answer_extractor_accepts_object_and_array() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/object"))
            .and(body_json(serde_json::json!({
                "inputs": {"question": "Q?", "context": "C."}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "answer": "apex predators", "score": 0.91, "start": 3, "end": 17
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/array"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"answer": "the tiger", "score": 0.4}
            ])))
            .mount(&server)
            .await;

        let opts = HttpOptions::default();
        let object = HttpAnswerExtractor::new(url(&server, "/object"), &opts).unwrap();
        let array = HttpAnswerExtractor::new(url(&server, "/array"), &opts).unwrap();

        let a = object.extract("Q?", "C.").await.unwrap();
        assert_eq!(a.answer, "apex predators");
        assert!((a.score - 0.91).abs() < 1e-9);

        let b = array.extract("Q?", "C.").await.unwrap();
        assert_eq!(b.answer, "the tiger");
    }

    #[tokio::test]
    async fn non_success_status_is_model_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/qa"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model is loading"))
            .mount(&server)
            .await;

        let extractor =
            HttpAnswerExtractor::new(url(&server, "/qa"), &HttpOptions::default()).unwrap();
        let err = extractor.extract("Q?", "C.").await.unwrap_err();

        match err {
            DeckgenError::Model { service, message } => {
                assert_eq!(service, "answer_extractor");
                assert!(message.contains("503"));
                assert!(message.contains("model is loading"));
            }
            other => panic!("expected Model error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_model_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/title"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let generator =
            HttpTitleGenerator::new(url(&server, "/title"), &HttpOptions::default()).unwrap();
        let params = BeamParams {
            max_length: 20,
            num_beams: 3,
            early_stopping: true,
            num_sequences: 1,
        };
        let err = generator.generate("headline: x", params).await.unwrap_err();
        assert!(matches!(err, DeckgenError::Model { service: "title_generator", .. }));
    }

    #[tokio::test]
    async fn title_generator_sends_beam_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/title"))
            .and(body_json(serde_json::json!({
                "inputs": "headline: AI in healthcare",
                "parameters": {
                    "max_length": 20,
                    "num_beams": 3,
                    "early_stopping": true,
                    "num_return_sequences": 1
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"generated_text": "<pad> AI Transforms Healthcare"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let generator =
            HttpTitleGenerator::new(url(&server, "/title"), &HttpOptions::default()).unwrap();
        let params = BeamParams {
            max_length: 20,
            num_beams: 3,
            early_stopping: true,
            num_sequences: 1,
        };
        let sequences = generator
            .generate("headline: AI in healthcare", params)
            .await
            .unwrap();
        assert_eq!(sequences[0].generated_text, "<pad> AI Transforms Healthcare");
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        // Bind then drop a listener to get a port nothing is serving on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{port}/qg")).unwrap();
        let generator = HttpQuestionGenerator::new(url, &HttpOptions::default()).unwrap();

        let err = generator.generate("p", 40, 3, sampling()).await.unwrap_err();
        assert!(matches!(err, DeckgenError::Network(_)));
    }
}
