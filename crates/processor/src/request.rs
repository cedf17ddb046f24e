use bytes::Bytes;
use mime::Mime;
use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing into the playground.
    User,
    /// The model.
    Assistant,
}

/// One prior conversation turn, as seen by a processor.
///
/// This is a flattened view of the session's log entry: the text, and the
/// image data URI if the turn carried an image attachment. Audio
/// attachments are not forwarded through the history, the staged file of
/// the current request travels separately in [`ProcessRequest::file`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatTurn {
    /// Who produced the turn.
    pub role: Role,
    /// The text of the turn.
    pub content: String,
    /// Data URI of an attached image, if any.
    pub image: Option<String>,
}

/// A binary input staged for processing, with its media type.
#[derive(Clone, Debug)]
pub struct MediaFile {
    /// A file name for providers that need one (e.g. multipart uploads).
    pub name: String,
    /// The media type of `data`.
    pub media_type: Mime,
    /// The raw bytes.
    pub data: Bytes,
}

impl MediaFile {
    /// Creates a new `MediaFile`.
    #[inline]
    pub fn new<S: Into<String>>(name: S, media_type: Mime, data: Bytes) -> Self {
        Self {
            name: name.into(),
            media_type,
            data,
        }
    }
}

const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);
const MAX_OUTPUT_TOKENS_RANGE: (u32, u32) = (1, 4000);

/// Model parameters for one request.
///
/// The values are owned by the session and passed through to the
/// processor opaquely. Out-of-range values are clamped on the way in, so
/// a processor never sees a temperature outside `[0, 2]` or a token limit
/// outside `[1, 4000]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelParams {
    model: String,
    temperature: f64,
    max_output_tokens: u32,
}

impl Default for ModelParams {
    #[inline]
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_owned(),
            temperature: 0.7,
            max_output_tokens: 1000,
        }
    }
}

impl ModelParams {
    /// Replaces the model identifier.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    /// Replaces the sampling temperature, clamped to `[0, 2]`.
    #[inline]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);
        self
    }

    /// Replaces the output token limit, clamped to `[1, 4000]`.
    #[inline]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens =
            max_output_tokens.clamp(MAX_OUTPUT_TOKENS_RANGE.0, MAX_OUTPUT_TOKENS_RANGE.1);
        self
    }

    /// The model identifier.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The sampling temperature.
    #[inline]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// The output token limit.
    #[inline]
    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }
}

/// A request to be handled by a processor.
#[derive(Clone, Debug)]
pub struct ProcessRequest {
    /// The text the user entered, possibly empty.
    pub text: String,
    /// The staged file, if any.
    pub file: Option<MediaFile>,
    /// All prior turns in insertion order, including the turn that
    /// triggered this request.
    pub prior: Vec<ChatTurn>,
    /// Model parameters for this request.
    pub params: ModelParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_clamping() {
        let params = ModelParams::default()
            .with_temperature(3.5)
            .with_max_output_tokens(100_000);
        assert_eq!(params.temperature(), 2.0);
        assert_eq!(params.max_output_tokens(), 4000);

        let params = ModelParams::default()
            .with_temperature(-1.0)
            .with_max_output_tokens(0);
        assert_eq!(params.temperature(), 0.0);
        assert_eq!(params.max_output_tokens(), 1);
    }

    #[test]
    fn test_params_defaults() {
        let params = ModelParams::default();
        assert_eq!(params.model(), "gpt-4o");
        assert_eq!(params.temperature(), 0.7);
        assert_eq!(params.max_output_tokens(), 1000);
    }
}
