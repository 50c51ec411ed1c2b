//! Request and response models for the Stability REST API.
//!
//! Responses deserialize straight from the API's JSON. Requests either serialize
//! to JSON (`text-to-image`) or encode into ordered [`FormFields`] for the
//! multipart endpoints; numeric ranges are checked through [`Validate`] before a
//! request leaves the client.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stability_core::form::FormFields;
use stability_core::Error;
use std::fmt;
use validator::{Validate, ValidationError};

use crate::Result;

/// An organization the account belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    /// Organization identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role of the user within the organization.
    pub role: String,
    /// Whether this is the user's default organization.
    #[serde(default)]
    pub is_default: bool,
}

/// Account associated with the API key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    /// User identifier.
    pub id: String,
    /// Account e-mail address.
    pub email: String,
    /// Profile picture URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    /// Organizations the user belongs to.
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

impl UserAccount {
    /// The organization flagged as default, if any.
    #[must_use]
    pub fn default_organization(&self) -> Option<&Organization> {
        self.organizations.iter().find(|org| org.is_default)
    }
}

/// Credit balance of the account or organization behind the API key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UserBalance {
    /// Remaining credits.
    pub credits: f64,
}

/// Kind of content an engine produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineType {
    /// Audio generation
    Audio,
    /// Classification
    Classification,
    /// Image generation
    Picture,
    /// Storage
    Storage,
    /// Text generation
    Text,
    /// Video generation
    Video,
}

/// An engine available to the API key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineInfo {
    /// Engine identifier, used in generation paths.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Kind of content produced.
    #[serde(rename = "type")]
    pub engine_type: EngineType,
}

/// Outcome of a single generated artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// Generation succeeded.
    Success,
    /// Generation failed.
    Error,
    /// The content filter affected the result; the image may be blurred.
    ContentFiltered,
}

impl FinishReason {
    /// Wire representation of the finish reason.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::ContentFiltered => "CONTENT_FILTERED",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    /// Standard base64 encoding of the image bytes.
    pub base64: String,
    /// Seed that produced this image.
    pub seed: u32,
    /// Outcome of the generation.
    #[serde(rename = "finishReason")]
    pub finish_reason: FinishReason,
}

impl Artifact {
    /// Decode the base64 payload into raw image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolError`] if the payload is not valid base64.
    pub fn decode_image(&self) -> Result<Vec<u8>> {
        BASE64.decode(self.base64.as_bytes()).map_err(|err| {
            Error::ProtocolError(format!(
                "Artifact with seed {} is not valid base64: {err}",
                self.seed
            ))
        })
    }
}

/// Response body of every generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationResponse {
    /// Generated artifacts.
    pub artifacts: Vec<Artifact>,
}

/// A weighted text prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPrompt {
    /// Prompt text.
    pub text: String,
    /// Optional weight; negative values act as negative prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl TextPrompt {
    /// Create an unweighted prompt.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            weight: None,
        }
    }

    /// Create a weighted prompt.
    #[must_use]
    pub fn weighted(text: impl Into<String>, weight: f64) -> Self {
        Self {
            text: text.into(),
            weight: Some(weight),
        }
    }
}

/// Append `text_prompts[i][text]` and, when weighted, `text_prompts[i][weight]`.
fn push_text_prompts(fields: &mut FormFields, prompts: &[TextPrompt]) {
    for (i, prompt) in prompts.iter().enumerate() {
        fields.push(format!("text_prompts[{i}][text]"), &prompt.text);
        fields.push_opt(format!("text_prompts[{i}][weight]"), prompt.weight);
    }
}

/// CLIP guidance preset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClipGuidancePreset {
    /// `FAST_BLUE`
    FastBlue,
    /// `FAST_GREEN`
    FastGreen,
    /// `NONE`
    #[default]
    None,
    /// `SIMPLE`
    Simple,
    /// `SLOW`
    Slow,
    /// `SLOWER`
    Slower,
    /// `SLOWEST`
    Slowest,
}

impl ClipGuidancePreset {
    /// Wire representation of the preset.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FastBlue => "FAST_BLUE",
            Self::FastGreen => "FAST_GREEN",
            Self::None => "NONE",
            Self::Simple => "SIMPLE",
            Self::Slow => "SLOW",
            Self::Slower => "SLOWER",
            Self::Slowest => "SLOWEST",
        }
    }
}

impl fmt::Display for ClipGuidancePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampler used for the diffusion process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Sampler {
    /// `DDIM`
    #[serde(rename = "DDIM")]
    Ddim,
    /// `DDPM`
    #[serde(rename = "DDPM")]
    Ddpm,
    /// `K_DPMPP_2M`
    #[serde(rename = "K_DPMPP_2M")]
    KDpmpp2m,
    /// `K_DPMPP_2S_ANCESTRAL`
    #[serde(rename = "K_DPMPP_2S_ANCESTRAL")]
    KDpmpp2sAncestral,
    /// `K_DPM_2`
    #[serde(rename = "K_DPM_2")]
    KDpm2,
    /// `K_DPM_2_ANCESTRAL`
    #[serde(rename = "K_DPM_2_ANCESTRAL")]
    KDpm2Ancestral,
    /// `K_EULER`
    #[serde(rename = "K_EULER")]
    KEuler,
    /// `K_EULER_ANCESTRAL`
    #[serde(rename = "K_EULER_ANCESTRAL")]
    KEulerAncestral,
    /// `K_HEUN`
    #[serde(rename = "K_HEUN")]
    KHeun,
    /// `K_LMS`
    #[serde(rename = "K_LMS")]
    KLms,
}

impl Sampler {
    /// Wire representation of the sampler.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ddim => "DDIM",
            Self::Ddpm => "DDPM",
            Self::KDpmpp2m => "K_DPMPP_2M",
            Self::KDpmpp2sAncestral => "K_DPMPP_2S_ANCESTRAL",
            Self::KDpm2 => "K_DPM_2",
            Self::KDpm2Ancestral => "K_DPM_2_ANCESTRAL",
            Self::KEuler => "K_EULER",
            Self::KEulerAncestral => "K_EULER_ANCESTRAL",
            Self::KHeun => "K_HEUN",
            Self::KLms => "K_LMS",
        }
    }
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the mask for a masking request comes from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaskSource {
    /// White pixels of `mask_image` are diffused.
    #[default]
    MaskImageWhite,
    /// Black pixels of `mask_image` are diffused.
    MaskImageBlack,
    /// The alpha channel of `init_image` is the mask.
    InitImageAlpha,
}

impl MaskSource {
    /// Wire representation of the mask source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MaskImageWhite => "MASK_IMAGE_WHITE",
            Self::MaskImageBlack => "MASK_IMAGE_BLACK",
            Self::InitImageAlpha => "INIT_IMAGE_ALPHA",
        }
    }
}

impl fmt::Display for MaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the initial image influences an image-to-image generation.
///
/// Each variant has its own wire shape: `image_strength` alone, or
/// `step_schedule_start` with an optional `step_schedule_end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitImageMode {
    /// Influence controlled by a single strength in `[0, 1]`.
    ImageStrength(f32),
    /// Influence controlled by skipping a proportion of the diffusion steps.
    StepSchedule {
        /// Proportion of steps skipped at the start, in `[0, 1]`.
        start: f64,
        /// Proportion of steps skipped at the end, in `[0, 1]`.
        end: Option<f64>,
    },
}

/// Default `image_strength`.
pub const DEFAULT_IMAGE_STRENGTH: f32 = 0.35;

/// Default `step_schedule_start`.
pub const DEFAULT_STEP_SCHEDULE_START: f64 = 0.65;

impl InitImageMode {
    /// Step schedule with the default start and no end.
    #[must_use]
    pub const fn step_schedule() -> Self {
        Self::StepSchedule {
            start: DEFAULT_STEP_SCHEDULE_START,
            end: None,
        }
    }

    /// Wire value of `init_image_mode`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ImageStrength(_) => "IMAGE_STRENGTH",
            Self::StepSchedule { .. } => "STEP_SCHEDULE",
        }
    }

    fn write_form(&self, fields: &mut FormFields) {
        fields.push("init_image_mode", self.as_str());
        match *self {
            Self::ImageStrength(strength) => fields.push("image_strength", strength),
            Self::StepSchedule { start, end } => {
                fields.push("step_schedule_start", start);
                fields.push_opt("step_schedule_end", end);
            }
        }
    }
}

impl Default for InitImageMode {
    fn default() -> Self {
        Self::ImageStrength(DEFAULT_IMAGE_STRENGTH)
    }
}

fn unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

fn validate_init_image_mode(
    request: &ImageToImageRequest,
) -> std::result::Result<(), ValidationError> {
    let valid = match request.init_image_mode {
        InitImageMode::ImageStrength(strength) => unit_interval(f64::from(strength)),
        InitImageMode::StepSchedule { start, end } => {
            unit_interval(start) && end.map_or(true, unit_interval)
        }
    };

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("init_image_mode_out_of_range"))
    }
}

fn validate_dimension(value: u32) -> std::result::Result<(), ValidationError> {
    if value > 0 && value % 64 == 0 {
        Ok(())
    } else {
        Err(ValidationError::new("dimension_not_multiple_of_64"))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Tuning options shared by every diffusion request.
#[derive(Debug, Clone, Serialize, Validate, PartialEq)]
pub struct GenerationParams {
    /// How strictly the diffusion follows the prompt, in `[0, 35]`.
    #[validate(range(max = 35))]
    pub cfg_scale: u32,

    /// CLIP guidance preset.
    pub clip_guidance_preset: ClipGuidancePreset,

    /// Sampler; selected by the API when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<Sampler>,

    /// Number of images to generate, in `[1, 10]`.
    #[validate(range(min = 1, max = 10))]
    pub samples: u32,

    /// Random noise seed; `0` lets the API pick one.
    pub seed: u32,

    /// Number of diffusion steps, in `[10, 150]`.
    #[validate(range(min = 10, max = 150))]
    pub steps: u32,

    /// Style preset, e.g. `photographic` or `anime`. Omitted when empty.
    #[serde(skip_serializing_if = "is_blank")]
    pub style_preset: Option<String>,

    /// Experimental engine parameters passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            cfg_scale: 7,
            clip_guidance_preset: ClipGuidancePreset::None,
            sampler: None,
            samples: 1,
            seed: 0,
            steps: 50,
            style_preset: None,
            extras: None,
        }
    }
}

impl GenerationParams {
    /// Set the CFG scale.
    #[must_use]
    pub fn with_cfg_scale(mut self, cfg_scale: u32) -> Self {
        self.cfg_scale = cfg_scale;
        self
    }

    /// Set the CLIP guidance preset.
    #[must_use]
    pub fn with_clip_guidance_preset(mut self, preset: ClipGuidancePreset) -> Self {
        self.clip_guidance_preset = preset;
        self
    }

    /// Set the sampler.
    #[must_use]
    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Set the number of samples.
    #[must_use]
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of diffusion steps.
    #[must_use]
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Set the style preset.
    #[must_use]
    pub fn with_style_preset(mut self, preset: impl Into<String>) -> Self {
        self.style_preset = Some(preset.into());
        self
    }

    /// Set experimental engine parameters.
    #[must_use]
    pub fn with_extras(mut self, extras: Value) -> Self {
        self.extras = Some(extras);
        self
    }

    fn write_form(&self, fields: &mut FormFields) {
        fields.push("cfg_scale", self.cfg_scale);
        fields.push("clip_guidance_preset", self.clip_guidance_preset);
        fields.push_opt("sampler", self.sampler);
        fields.push("samples", self.samples);
        fields.push("seed", self.seed);
        fields.push("steps", self.steps);
        fields.push_opt_str("style_preset", self.style_preset.as_deref());
        match &self.extras {
            None | Some(Value::Null) => {}
            Some(Value::String(raw)) => fields.push_opt_str("extras", Some(raw.as_str())),
            Some(extras) => fields.push("extras", extras),
        }
    }
}

/// Body of `POST /v1/generation/{engine_id}/text-to-image`.
#[derive(Debug, Clone, Serialize, Validate, PartialEq)]
pub struct TextToImageRequest {
    /// Image height in pixels, a multiple of 64.
    #[validate(custom(function = "validate_dimension"))]
    pub height: u32,

    /// Image width in pixels, a multiple of 64.
    #[validate(custom(function = "validate_dimension"))]
    pub width: u32,

    /// Prompts, at least one.
    #[validate(length(min = 1))]
    pub text_prompts: Vec<TextPrompt>,

    /// Shared tuning options.
    #[serde(flatten)]
    #[validate(nested)]
    pub params: GenerationParams,
}

impl TextToImageRequest {
    /// Create a 512x512 request with default tuning.
    #[must_use]
    pub fn new(text_prompts: Vec<TextPrompt>) -> Self {
        Self {
            height: 512,
            width: 512,
            text_prompts,
            params: GenerationParams::default(),
        }
    }

    /// Set the output size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Replace the tuning options.
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

/// Body of `POST /v1/generation/{engine_id}/image-to-image`.
#[derive(Debug, Clone, Validate, PartialEq)]
#[validate(schema(function = "validate_init_image_mode"))]
pub struct ImageToImageRequest {
    /// Prompts, at least one.
    #[validate(length(min = 1))]
    pub text_prompts: Vec<TextPrompt>,

    /// Image used instead of random noise to start the diffusion.
    pub init_image: Bytes,

    /// How the initial image influences the result.
    pub init_image_mode: InitImageMode,

    /// Shared tuning options.
    #[validate(nested)]
    pub params: GenerationParams,
}

impl ImageToImageRequest {
    /// Create a request using image strength `0.35` and default tuning.
    #[must_use]
    pub fn new(text_prompts: Vec<TextPrompt>, init_image: impl Into<Bytes>) -> Self {
        Self {
            text_prompts,
            init_image: init_image.into(),
            init_image_mode: InitImageMode::default(),
            params: GenerationParams::default(),
        }
    }

    /// Set how the initial image influences the result.
    #[must_use]
    pub fn with_init_image_mode(mut self, mode: InitImageMode) -> Self {
        self.init_image_mode = mode;
        self
    }

    /// Replace the tuning options.
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Encode the request as multipart form fields.
    #[must_use]
    pub fn to_form_fields(&self) -> FormFields {
        let mut fields = FormFields::new();
        push_text_prompts(&mut fields, &self.text_prompts);
        fields.push_bytes("init_image", self.init_image.clone());
        self.init_image_mode.write_form(&mut fields);
        self.params.write_form(&mut fields);
        fields
    }
}

/// Body of `POST /v1/generation/{engine_id}/image-to-image/masking`.
#[derive(Debug, Clone, Validate, PartialEq)]
pub struct MaskImageRequest {
    /// Prompts, at least one.
    #[validate(length(min = 1))]
    pub text_prompts: Vec<TextPrompt>,

    /// Image to inpaint.
    pub init_image: Bytes,

    /// Where the mask comes from.
    pub mask_source: MaskSource,

    /// Grayscale mask with the same dimensions as `init_image`.
    pub mask_image: Bytes,

    /// Shared tuning options.
    #[validate(nested)]
    pub params: GenerationParams,
}

impl MaskImageRequest {
    /// Create a request masking the white pixels of `mask_image`.
    #[must_use]
    pub fn new(
        text_prompts: Vec<TextPrompt>,
        init_image: impl Into<Bytes>,
        mask_image: impl Into<Bytes>,
    ) -> Self {
        Self {
            text_prompts,
            init_image: init_image.into(),
            mask_source: MaskSource::default(),
            mask_image: mask_image.into(),
            params: GenerationParams::default(),
        }
    }

    /// Set the mask source.
    #[must_use]
    pub fn with_mask_source(mut self, source: MaskSource) -> Self {
        self.mask_source = source;
        self
    }

    /// Replace the tuning options.
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Encode the request as multipart form fields.
    #[must_use]
    pub fn to_form_fields(&self) -> FormFields {
        let mut fields = FormFields::new();
        push_text_prompts(&mut fields, &self.text_prompts);
        fields.push_bytes("init_image", self.init_image.clone());
        fields.push("mask_source", self.mask_source);
        fields.push_bytes("mask_image", self.mask_image.clone());
        self.params.write_form(&mut fields);
        fields
    }
}

/// Body of `POST /v1/generation/{engine_id}/image-to-image/upscale`.
///
/// Exactly one of `width` and `height` must be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscaleRequest {
    /// Image to upscale.
    pub image: Bytes,
    /// Desired output width.
    pub width: Option<u32>,
    /// Desired output height.
    pub height: Option<u32>,
}

impl UpscaleRequest {
    /// Upscale to the given width, keeping the aspect ratio.
    #[must_use]
    pub fn by_width(image: impl Into<Bytes>, width: u32) -> Self {
        Self {
            image: image.into(),
            width: Some(width),
            height: None,
        }
    }

    /// Upscale to the given height, keeping the aspect ratio.
    #[must_use]
    pub fn by_height(image: impl Into<Bytes>, height: u32) -> Self {
        Self {
            image: image.into(),
            width: None,
            height: Some(height),
        }
    }

    /// Encode the request as multipart form fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless exactly one of width or height is set.
    pub fn to_form_fields(&self) -> Result<FormFields> {
        let mut fields = FormFields::new();
        fields.push_bytes("image", self.image.clone());

        match (self.width, self.height) {
            (Some(width), None) => fields.push("width", width),
            (None, Some(height)) => fields.push("height", height),
            _ => {
                return Err(Error::InvalidArgument(
                    "exactly one of width or height must be specified".to_string(),
                ))
            }
        }

        Ok(fields)
    }
}
