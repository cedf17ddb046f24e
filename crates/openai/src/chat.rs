use std::sync::Arc;

use mime::Mime;
use playground_processor::{
    ChatTurn, ErrorKind, ProcessRequest, Processor, ProcessorOutput, Role,
};
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};

use crate::config::OpenAIConfig;
use crate::sse::{ByteSource, Sse};
use crate::stream::ChatStream;
use crate::{Error, request_error};

/// Stands in when an image is sent without any accompanying text.
const DEFAULT_IMAGE_PROMPT: &str = "Describe this image in detail.";

/// Streaming chat completions processor.
///
/// [`ChatProcessor::new`] yields plain text chat; [`ChatProcessor::vision`]
/// additionally forwards image attachments as data URI content blocks.
#[derive(Clone, Debug)]
pub struct ChatProcessor {
    client: Client,
    config: Arc<OpenAIConfig>,
    images: bool,
}

impl ChatProcessor {
    /// Creates a chat processor that ignores image attachments.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
            images: false,
        }
    }

    /// Creates a chat processor for image-capable models.
    #[inline]
    pub fn vision(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
            images: true,
        }
    }
}

impl Processor for ChatProcessor {
    type Error = Error;
    type Stream = ChatStream;

    fn process(
        &self,
        req: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessorOutput<Self::Stream>, Self::Error>> + Send + 'static
    {
        let chat_req = create_request(req, self.images);
        let resp_fut = self
            .client
            .post(format!("{}{}", self.config.base_url, "/chat/completions"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&chat_req)
            .send();

        async move {
            let resp = resp_fut
                .await
                .and_then(Response::error_for_status)
                .map_err(request_error)?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse::<Mime>().ok())
                .map(|m| m.essence_str() == "text/event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            let sse = Sse::new(ByteSource::from_response(resp));
            Ok(ProcessorOutput::Stream(ChatStream::from_sse(sse)))
        }
    }
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub(crate) struct ChatCompletionChunk {
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub(crate) struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub(crate) struct Delta {
    pub content: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage {
    User { content: Content },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
fn create_request(req: &ProcessRequest, images: bool) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: req.params.model().to_owned(),
        messages: req
            .prior
            .iter()
            .map(|turn| encode_turn(turn, images))
            .collect(),
        temperature: req.params.temperature(),
        max_tokens: req.params.max_output_tokens(),
        stream: true,
    }
}

#[inline]
fn encode_turn(turn: &ChatTurn, images: bool) -> WireMessage {
    match turn.role {
        Role::Assistant => WireMessage::Assistant {
            content: turn.content.clone(),
        },
        Role::User => {
            let Some(image) = turn.image.as_ref().filter(|_| images) else {
                return WireMessage::User {
                    content: Content::Text(turn.content.clone()),
                };
            };
            let text = if turn.content.trim().is_empty() {
                DEFAULT_IMAGE_PROMPT.to_owned()
            } else {
                turn.content.clone()
            };
            WireMessage::User {
                content: Content::Blocks(vec![
                    ContentBlock::Text { text },
                    ContentBlock::ImageUrl {
                        image_url: ImageUrl {
                            url: image.clone(),
                        },
                    },
                ]),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use playground_processor::ModelParams;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_request() {
        let req = ProcessRequest {
            text: "And now?".to_owned(),
            file: None,
            prior: vec![
                ChatTurn {
                    role: Role::User,
                    content: "Hello".to_owned(),
                    image: None,
                },
                ChatTurn {
                    role: Role::Assistant,
                    content: "Hi there".to_owned(),
                    image: None,
                },
                ChatTurn {
                    role: Role::User,
                    content: "And now?".to_owned(),
                    image: None,
                },
            ],
            params: ModelParams::default()
                .with_model("custom")
                .with_temperature(0.5)
                .with_max_output_tokens(256),
        };
        let encoded = serde_json::to_value(create_request(&req, false)).unwrap();
        assert_eq!(
            encoded,
            json!({
                "model": "custom",
                "messages": [
                    { "role": "user", "content": "Hello" },
                    { "role": "assistant", "content": "Hi there" },
                    { "role": "user", "content": "And now?" },
                ],
                "temperature": 0.5,
                "max_tokens": 256,
                "stream": true,
            })
        );
    }

    #[test]
    fn test_image_turns_encode_as_blocks() {
        let turn = ChatTurn {
            role: Role::User,
            content: String::new(),
            image: Some("data:image/png;base64,AAAA".to_owned()),
        };
        let encoded = serde_json::to_value(encode_turn(&turn, true)).unwrap();
        assert_eq!(
            encoded,
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": DEFAULT_IMAGE_PROMPT },
                    {
                        "type": "image_url",
                        "image_url": { "url": "data:image/png;base64,AAAA" },
                    },
                ],
            })
        );
    }

    #[test]
    fn test_images_are_dropped_without_vision() {
        let turn = ChatTurn {
            role: Role::User,
            content: "look".to_owned(),
            image: Some("data:image/png;base64,AAAA".to_owned()),
        };
        let encoded = serde_json::to_value(encode_turn(&turn, false)).unwrap();
        assert_eq!(encoded, json!({ "role": "user", "content": "look" }));
    }
}
