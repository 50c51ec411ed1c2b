//! Asynchronous Stability API client implementation.

use crate::models::{
    Artifact, EngineInfo, GenerationResponse, ImageToImageRequest, MaskImageRequest,
    TextToImageRequest, UpscaleRequest, UserAccount, UserBalance,
};
use crate::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use stability_core::client::ClientConfig;
use stability_core::form::FormFields;
use stability_core::{Error, StabilityConfig};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use validator::Validate;

const USER_AGENT: &str = concat!("stability-api/", env!("CARGO_PKG_VERSION"));

/// Builder for [`StabilityClient`].
#[derive(Debug)]
pub struct StabilityClientBuilder {
    config: StabilityConfig,
    http_config: ClientConfig,
}

impl StabilityClientBuilder {
    /// Create a builder from connection settings.
    #[must_use]
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            http_config: ClientConfig::default().with_user_agent(USER_AGENT),
        }
    }

    /// Override the HTTP client configuration.
    ///
    /// Timeouts set on the [`StabilityConfig`] take precedence.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid, the API key cannot be sent as a
    /// header, or the transport cannot be initialised.
    pub fn build(self) -> Result<StabilityClient> {
        let base_url = self.config.parse_base_url()?;

        let mut http_config = self.http_config;
        if http_config.user_agent.is_none() {
            http_config = http_config.with_user_agent(USER_AGENT);
        }
        if let Some(timeout) = self.config.timeout() {
            http_config = http_config.with_timeout(timeout);
        }
        if let Some(timeout) = self.config.connect_timeout() {
            http_config = http_config.with_connect_timeout(timeout);
        }

        let mut authorization = HeaderValue::from_str(&self.config.bearer_token()).map_err(|_| {
            Error::InvalidArgument("API key contains characters not allowed in a header".to_string())
        })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = http_config.build_http_client(headers)?;
        debug!(base_url = %base_url, "Stability client initialised");

        Ok(StabilityClient {
            inner: Arc::new(ClientInner {
                http: RwLock::new(Some(http)),
                base_url,
            }),
            cancel: None,
        })
    }
}

struct ClientInner {
    http: RwLock<Option<reqwest::Client>>,
    base_url: Url,
}

/// Request payload.
enum Body {
    Empty,
    Json(Value),
    Form(FormFields),
}

/// Asynchronous Stability API client.
///
/// Clones share one transport. [`StabilityClient::close`] releases it for every
/// clone; dropping the last clone does the same.
#[derive(Clone)]
pub struct StabilityClient {
    inner: Arc<ClientInner>,
    cancel: Option<CancellationToken>,
}

impl fmt::Debug for StabilityClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StabilityClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("closed", &self.is_closed())
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl StabilityClient {
    /// Construct a client for the public API origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the API key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        StabilityClientBuilder::new(StabilityConfig::new(api_key)?).build()
    }

    /// Construct a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid.
    pub fn from_config(config: StabilityConfig) -> Result<Self> {
        StabilityClientBuilder::new(config).build()
    }

    /// Start building a client.
    #[must_use]
    pub fn builder(config: StabilityConfig) -> StabilityClientBuilder {
        StabilityClientBuilder::new(config)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Handle sharing this transport whose calls are abandoned once `token` fires.
    ///
    /// Cancelled calls return [`Error::Cancelled`].
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cancel: Some(token),
        }
    }

    /// Release the transport. Calls made afterwards through any clone fail with
    /// [`Error::Disposed`]. Closing twice is a no-op.
    pub fn close(&self) {
        let mut http = self
            .inner
            .http
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if http.take().is_some() {
            info!(base_url = %self.inner.base_url, "Stability client closed");
        }
    }

    /// Returns true once [`StabilityClient::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner
            .http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Fetch the account behind the API key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteApiError`] on a non-success response.
    pub async fn get_user_account(&self) -> Result<UserAccount> {
        self.send(Method::GET, self.build_url("v1/user/account")?, Body::Empty)
            .await
    }

    /// Fetch the credit balance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteApiError`] on a non-success response.
    pub async fn get_user_balance(&self) -> Result<UserBalance> {
        self.send(Method::GET, self.build_url("v1/user/balance")?, Body::Empty)
            .await
    }

    /// List engines available to the API key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteApiError`] on a non-success response.
    pub async fn list_engines(&self) -> Result<Vec<EngineInfo>> {
        self.send(Method::GET, self.build_url("v1/engines/list")?, Body::Empty)
            .await
    }

    /// Generate images from text prompts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an invalid engine id or request, before
    /// anything is sent.
    pub async fn text_to_image(
        &self,
        engine_id: &str,
        request: &TextToImageRequest,
    ) -> Result<Vec<Artifact>> {
        let url = self.generation_url(engine_id, &["text-to-image"])?;
        request.validate()?;
        let body = serde_json::to_value(request)?;
        self.generate(engine_id, url, Body::Json(body)).await
    }

    /// Generate images starting from an initial image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an invalid engine id or request, before
    /// anything is sent.
    pub async fn image_to_image(
        &self,
        engine_id: &str,
        request: &ImageToImageRequest,
    ) -> Result<Vec<Artifact>> {
        let url = self.generation_url(engine_id, &["image-to-image"])?;
        request.validate()?;
        self.generate(engine_id, url, Body::Form(request.to_form_fields()))
            .await
    }

    /// Upscale an image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an invalid engine id, or unless exactly
    /// one of width or height is set.
    pub async fn upscale(
        &self,
        engine_id: &str,
        request: &UpscaleRequest,
    ) -> Result<Vec<Artifact>> {
        let url = self.generation_url(engine_id, &["image-to-image", "upscale"])?;
        let fields = request.to_form_fields()?;
        self.generate(engine_id, url, Body::Form(fields)).await
    }

    /// Inpaint the masked region of an image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an invalid engine id or request, before
    /// anything is sent.
    pub async fn mask(
        &self,
        engine_id: &str,
        request: &MaskImageRequest,
    ) -> Result<Vec<Artifact>> {
        let url = self.generation_url(engine_id, &["image-to-image", "masking"])?;
        request.validate()?;
        self.generate(engine_id, url, Body::Form(request.to_form_fields()))
            .await
    }

    async fn generate(&self, engine_id: &str, url: Url, body: Body) -> Result<Vec<Artifact>> {
        let response: GenerationResponse = self.send(Method::POST, url, body).await?;
        debug!(
            engine_id = %engine_id,
            artifacts = response.artifacts.len(),
            "Generation finished"
        );
        Ok(response.artifacts)
    }

    fn http(&self) -> Result<reqwest::Client> {
        self.inner
            .http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Disposed)
    }

    fn build_url(&self, path: &str) -> Result<Url> {
        self.inner
            .base_url
            .join(path)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid path `{path}`: {err}")))
    }

    /// `{base}/v1/generation/{engine_id}/{operation...}`, with the engine id kept as a
    /// single percent-encoded segment.
    fn generation_url(&self, engine_id: &str, operation: &[&str]) -> Result<Url> {
        validate_engine_id(engine_id)?;

        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::InvalidEndpoint(format!(
                    "Base URL `{}` cannot carry a path",
                    self.inner.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["v1", "generation", engine_id])
            .extend(operation);

        Ok(url)
    }

    async fn send<T>(&self, method: Method, url: Url, body: Body) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }

        let http = self.http()?;
        let path = url.path().to_string();

        let mut request = http.request(method.clone(), url);
        request = match body {
            Body::Empty => request,
            Body::Json(payload) => request.json(&payload),
            Body::Form(fields) => request.multipart(fields.into_multipart()),
        };

        info!(method = %method, path = %path, "Sending Stability API request");

        let result = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(Error::Cancelled),
                    result = execute(request) => result,
                }
            }
            None => execute(request).await,
        };

        match &result {
            Err(Error::Cancelled) => debug!(path = %path, "Stability API request cancelled"),
            Err(err) if err.should_log() => {
                warn!(path = %path, error = %err, code = err.error_code(), "Stability API request failed");
            }
            _ => {}
        }

        result
    }
}

async fn execute<T>(request: RequestBuilder) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = request.send().await?;
    decode_response(response).await
}

/// Decode a response: JSON `T` on success, [`Error::RemoteApiError`] otherwise.
///
/// # Errors
///
/// Returns [`Error::ProtocolError`] when a success body is empty or does not match
/// `T`, and [`Error::RemoteApiError`] for any non-success status.
pub async fn decode_response<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let err = Error::from_error_response(status, &body);
        debug!(status = status.as_u16(), error = %err, "Stability API returned an error");
        return Err(err);
    }

    if body.is_empty() {
        return Err(Error::ProtocolError(format!(
            "Empty response body with status {status}"
        )));
    }

    serde_json::from_slice(&body)
        .map_err(|err| Error::ProtocolError(format!("Unexpected response body: {err}")))
}

fn validate_engine_id(engine_id: &str) -> Result<()> {
    if engine_id.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "engine id must not be empty".to_string(),
        ));
    }

    if engine_id.contains(['/', '\\', '?', '#', '%']) || engine_id == "." || engine_id == ".." {
        return Err(Error::InvalidArgument(format!(
            "engine id `{engine_id}` is not a single path segment"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::KnownEngine;
    use crate::models::{
        FinishReason, GenerationParams, InitImageMode, MaskSource, TextPrompt,
    };
    use bytes::Bytes;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = "sk-test-key";

    fn test_client(server: &MockServer) -> StabilityClient {
        let config = StabilityConfig::new(TEST_KEY)
            .unwrap()
            .with_base_url(server.uri());
        StabilityClient::from_config(config).unwrap()
    }

    fn generation_body() -> Value {
        json!({
            "artifacts": [
                {"base64": "aGVsbG8=", "seed": 1, "finishReason": "SUCCESS"},
                {"base64": "d29ybGQ=", "seed": 2, "finishReason": "CONTENT_FILTERED"}
            ]
        })
    }

    fn unauthorized() -> ResponseTemplate {
        ResponseTemplate::new(401).set_body_json(json!({
            "id": "9160aa70-222f-4a36-9eb7-475e2668362a",
            "name": "unauthorized",
            "message": "Incorrect API key provided: bad-key."
        }))
    }

    async fn received_body(server: &MockServer) -> String {
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        String::from_utf8_lossy(&requests[0].body).into_owned()
    }

    #[tokio::test]
    async fn get_user_account_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/account"))
            .and(header("authorization", "Bearer sk-test-key"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-1234",
                "email": "artist@example.com",
                "profile_picture": "https://example.com/me.png",
                "organizations": [
                    {"id": "org-1", "name": "Studio", "role": "OWNER", "is_default": true}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let account = test_client(&server).get_user_account().await.unwrap();
        assert_eq!(account.id, "user-1234");
        assert_eq!(account.organizations.len(), 1);
        assert!(account.organizations[0].is_default);
    }

    #[tokio::test]
    async fn get_user_balance_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"credits": 42.5})))
            .mount(&server)
            .await;

        let balance = test_client(&server).get_user_balance().await.unwrap();
        assert!((balance.credits - 42.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn list_engines_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/engines/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "stable-diffusion-v1-5",
                    "name": "Stable Diffusion v1.5",
                    "description": "Stability-AI Stable Diffusion v1.5",
                    "type": "PICTURE"
                },
                {
                    "id": "esrgan-v1-x2plus",
                    "name": "Real-ESRGAN x2",
                    "description": "Real-ESRGAN_x2plus upscaler model",
                    "type": "PICTURE"
                }
            ])))
            .mount(&server)
            .await;

        let engines = test_client(&server).list_engines().await.unwrap();
        assert_eq!(engines.len(), 2);
        assert_eq!(engines[0].id, KnownEngine::StableDiffusionV1_5.as_str());
    }

    #[tokio::test]
    async fn unauthorized_is_remote_api_error_for_every_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(unauthorized())
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let errors = [
            client.get_user_account().await.unwrap_err(),
            client.get_user_balance().await.unwrap_err(),
            client.list_engines().await.unwrap_err(),
        ];

        for err in errors {
            match err {
                Error::RemoteApiError { status, message } => {
                    assert_eq!(status, 401);
                    assert!(message.contains("Incorrect API key provided"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn error_without_message_uses_reason_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/balance"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let err = test_client(&server).get_user_balance().await.unwrap_err();
        assert_eq!(
            err,
            Error::RemoteApiError {
                status: 500,
                message: "Internal Server Error".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn malformed_success_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/balance"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"credits\":"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/user/account"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = test_client(&server);
        assert!(matches!(
            client.get_user_balance().await,
            Err(Error::ProtocolError(_))
        ));
        assert!(matches!(
            client.get_user_account().await,
            Err(Error::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn text_to_image_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/generation/stable-diffusion-xl-beta-v2-2-2/text-to-image",
            ))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "height": 256,
                "width": 128,
                "text_prompts": [{"text": "A beautiful sunset over the ocean."}],
                "cfg_scale": 7,
                "clip_guidance_preset": "NONE",
                "samples": 2,
                "seed": 1,
                "steps": 20
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(generation_body()))
            .expect(1)
            .mount(&server)
            .await;

        let request = TextToImageRequest::new(vec![TextPrompt::new(
            "A beautiful sunset over the ocean.",
        )])
        .with_size(128, 256)
        .with_params(
            GenerationParams::default()
                .with_samples(2)
                .with_seed(1)
                .with_steps(20),
        );

        let artifacts = test_client(&server)
            .text_to_image(KnownEngine::DEFAULT_TEXT_TO_IMAGE.as_str(), &request)
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts.iter().map(|a| a.seed).min(), Some(1));
        assert_eq!(artifacts[1].finish_reason, FinishReason::ContentFiltered);
        for artifact in &artifacts {
            assert!(!artifact.decode_image().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn unknown_finish_reason_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artifacts": [{"base64": "", "seed": 1, "finishReason": "MAYBE"}]
            })))
            .mount(&server)
            .await;

        let request = TextToImageRequest::new(vec![TextPrompt::new("x")]);
        let err = test_client(&server)
            .text_to_image("stable-diffusion-v1-5", &request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[tokio::test]
    async fn invalid_engine_id_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(generation_body()))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let request = TextToImageRequest::new(vec![TextPrompt::new("x")]);
        for engine_id in [
            "",
            "   ",
            "a/b",
            "engine?x=1",
            "engine#frag",
            ".",
            "..",
            "%2e%2e",
            "%2E%2E",
            "a\\..\\..\\..\\user",
            "stable%2Fdiffusion",
        ] {
            let err = client.text_to_image(engine_id, &request).await.unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{engine_id:?}");
        }
    }

    #[tokio::test]
    async fn invalid_request_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(generation_body()))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let request = TextToImageRequest::new(vec![TextPrompt::new("x")])
            .with_params(GenerationParams::default().with_steps(5));
        assert!(matches!(
            client.text_to_image("stable-diffusion-v1-5", &request).await,
            Err(Error::InvalidArgument(_))
        ));

        let upscale = UpscaleRequest {
            image: Bytes::from_static(b"png"),
            width: Some(1024),
            height: Some(1024),
        };
        assert!(matches!(
            client.upscale("esrgan-v1-x2plus", &upscale).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn image_to_image_sends_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generation/stable-diffusion-v1-5/image-to-image"))
            .and(body_string_contains("name=\"text_prompts[0][text]\""))
            .and(body_string_contains("name=\"init_image\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(generation_body()))
            .expect(1)
            .mount(&server)
            .await;

        let request = ImageToImageRequest::new(
            vec![TextPrompt::new("a crystal ball")],
            Bytes::from_static(b"init-png"),
        )
        .with_init_image_mode(InitImageMode::StepSchedule {
            start: 0.6,
            end: None,
        });

        let artifacts = test_client(&server)
            .image_to_image("stable-diffusion-v1-5", &request)
            .await
            .unwrap();
        assert_eq!(artifacts.len(), 2);

        let body = received_body(&server).await;
        assert!(body.contains("multipart") || body.contains("form-data"));
        assert!(body.contains("name=\"init_image_mode\""));
        assert!(body.contains("STEP_SCHEDULE"));
        assert!(body.contains("name=\"step_schedule_start\""));
        assert!(!body.contains("name=\"image_strength\""));
        assert!(!body.contains("name=\"sampler\""));
        assert!(!body.contains("name=\"style_preset\""));
    }

    #[tokio::test]
    async fn upscale_sends_single_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generation/esrgan-v1-x2plus/image-to-image/upscale"))
            .and(body_string_contains("name=\"image\""))
            .and(body_string_contains("name=\"width\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(generation_body()))
            .expect(1)
            .mount(&server)
            .await;

        let request = UpscaleRequest::by_width(Bytes::from_static(b"png"), 2048);
        test_client(&server)
            .upscale(KnownEngine::EsrganV1X2Plus.as_str(), &request)
            .await
            .unwrap();

        let body = received_body(&server).await;
        assert!(!body.contains("name=\"height\""));
    }

    #[tokio::test]
    async fn mask_sends_mask_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/generation/stable-inpainting-512-v2-0/image-to-image/masking",
            ))
            .and(body_string_contains("name=\"mask_source\""))
            .and(body_string_contains("INIT_IMAGE_ALPHA"))
            .and(body_string_contains("name=\"mask_image\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(generation_body()))
            .expect(1)
            .mount(&server)
            .await;

        let request = MaskImageRequest::new(
            vec![TextPrompt::new("a red door")],
            Bytes::from_static(b"init"),
            Bytes::from_static(b"mask"),
        )
        .with_mask_source(MaskSource::InitImageAlpha);

        let artifacts = test_client(&server)
            .mask(KnownEngine::StableInpainting512V2_0.as_str(), &request)
            .await
            .unwrap();
        assert_eq!(artifacts.len(), 2);
    }

    #[tokio::test]
    async fn remote_error_on_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "id": "abc",
                "name": "invalid_prompts",
                "message": "Prompt contains blocked words"
            })))
            .mount(&server)
            .await;

        let request = TextToImageRequest::new(vec![TextPrompt::new("x")]);
        let err = test_client(&server)
            .text_to_image("stable-diffusion-v1-5", &request)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("Prompt contains blocked words"));
    }

    #[tokio::test]
    async fn close_disposes_every_clone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"credits": 1.0})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let clone = client.clone();
        client.get_user_balance().await.unwrap();

        client.close();
        client.close();
        assert!(client.is_closed());
        assert!(clone.is_closed());
        assert_eq!(clone.get_user_balance().await.unwrap_err(), Error::Disposed);
        assert_eq!(client.list_engines().await.unwrap_err(), Error::Disposed);
    }

    #[tokio::test]
    async fn fired_token_fails_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"credits": 1.0})))
            .expect(0)
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let client = test_client(&server).with_cancellation(token);
        assert_eq!(client.get_user_balance().await.unwrap_err(), Error::Cancelled);
    }

    #[tokio::test]
    async fn cancelling_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/user/account"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "u", "email": "e"}))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        let client = test_client(&server).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let err = client.get_user_account().await.unwrap_err();
        assert_eq!(err, Error::Cancelled);
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn base_url_prefix_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy/v1/user/balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"credits": 3.0})))
            .expect(1)
            .mount(&server)
            .await;

        let config = StabilityConfig::new(TEST_KEY)
            .unwrap()
            .with_base_url(format!("{}/proxy", server.uri()));
        let client = StabilityClient::from_config(config).unwrap();
        assert!(client.base_url().as_str().ends_with("/proxy/"));
        client.get_user_balance().await.unwrap();
    }

    #[test]
    fn new_rejects_empty_key() {
        assert!(matches!(
            StabilityClient::new(""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn debug_hides_api_key() {
        let client = StabilityClient::new("sk-super-secret").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("api.stability.ai"));
    }

    #[test]
    fn engine_id_validation() {
        assert!(validate_engine_id("stable-diffusion-v1-5").is_ok());
        assert!(validate_engine_id("").is_err());
        assert!(validate_engine_id("a/b").is_err());
        assert!(validate_engine_id("a\\b").is_err());
        assert!(validate_engine_id("%2e%2e").is_err());
    }

    #[test]
    fn generation_url_keeps_prefix_and_single_segment() {
        let config = StabilityConfig::new(TEST_KEY)
            .unwrap()
            .with_base_url("https://proxy.example.com/stability");
        let client = StabilityClient::from_config(config).unwrap();

        let url = client
            .generation_url("esrgan-v1-x2plus", &["image-to-image", "upscale"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://proxy.example.com/stability/v1/generation/esrgan-v1-x2plus/image-to-image/upscale"
        );

        let url = client
            .generation_url("engine with space", &["text-to-image"])
            .unwrap();
        assert_eq!(
            url.path(),
            "/stability/v1/generation/engine%20with%20space/text-to-image"
        );
    }
}
