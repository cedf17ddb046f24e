use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use playground_processor::{
    ErrorKind, NeverStream, ProcessRequest, Processor, ProcessorOutput,
};
use reqwest::{Client, Response, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::time::sleep;

use crate::config::OpenAIConfig;
use crate::{Error, request_error};

const RUN_POLL_INTERVAL: Duration = Duration::from_secs(1);
const RUN_POLL_LIMIT: u32 = 120;

/// Persistent-assistant processor.
///
/// The provider keeps the conversation server-side: the first request
/// creates an assistant and a thread, later requests reuse both. Each
/// request posts the typed text to the thread, starts a run, polls it to
/// completion and resolves to the newest assistant reply in one shot.
/// Prior turns are not re-sent, the thread already holds them.
#[derive(Clone, Debug)]
pub struct AssistantProcessor {
    client: Client,
    config: Arc<OpenAIConfig>,
    ids: Arc<Mutex<ThreadIds>>,
}

#[derive(Debug, Default)]
struct ThreadIds {
    assistant: Option<String>,
    thread: Option<String>,
}

impl AssistantProcessor {
    /// Creates a new `AssistantProcessor`.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
            ids: Arc::new(Mutex::new(ThreadIds::default())),
        }
    }
}

impl Processor for AssistantProcessor {
    type Error = Error;
    type Stream = NeverStream<Error>;

    fn process(
        &self,
        req: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessorOutput<Self::Stream>, Self::Error>> + Send + 'static
    {
        let text = req.text.trim().to_owned();
        let model = req.params.model().to_owned();
        let client = self.client.clone();
        let config = Arc::clone(&self.config);
        let ids = Arc::clone(&self.ids);

        async move {
            // Rejected locally, a run without input would never finish
            // usefully.
            if text.is_empty() {
                return Err(Error::new(
                    "a text message is required",
                    ErrorKind::InvalidInput,
                ));
            }

            let (assistant, thread) = {
                let ids = lock(&ids);
                (ids.assistant.clone(), ids.thread.clone())
            };
            let assistant = match assistant {
                Some(id) => id,
                None => {
                    let created: CreatedObject =
                        post_json(&client, &config, "/assistants", &json!({ "model": model }))
                            .await?;
                    debug!("created assistant {}", created.id);
                    lock(&ids).assistant = Some(created.id.clone());
                    created.id
                }
            };
            let thread = match thread {
                Some(id) => id,
                None => {
                    let created: CreatedObject =
                        post_json(&client, &config, "/threads", &json!({})).await?;
                    debug!("created thread {}", created.id);
                    lock(&ids).thread = Some(created.id.clone());
                    created.id
                }
            };

            let _: Value = post_json(
                &client,
                &config,
                &format!("/threads/{thread}/messages"),
                &json!({ "role": "user", "content": text }),
            )
            .await?;
            let run: CreatedObject = post_json(
                &client,
                &config,
                &format!("/threads/{thread}/runs"),
                &json!({ "assistant_id": assistant }),
            )
            .await?;
            await_run(&client, &config, &thread, &run.id).await?;

            let list: MessageList =
                get_json(&client, &config, &format!("/threads/{thread}/messages")).await?;
            let Some(reply) = extract_reply(&list) else {
                return Err(Error::new("the run produced no reply", ErrorKind::Other));
            };
            Ok(ProcessorOutput::Scalar(reply))
        }
    }
}

async fn await_run(
    client: &Client,
    config: &OpenAIConfig,
    thread: &str,
    run: &str,
) -> Result<(), Error> {
    for _ in 0..RUN_POLL_LIMIT {
        let status: RunObject =
            get_json(client, config, &format!("/threads/{thread}/runs/{run}")).await?;
        trace!("run {run} is {}", status.status);
        match status.status.as_str() {
            "completed" => return Ok(()),
            "queued" | "in_progress" => {}
            other => {
                return Err(Error::new(
                    format!("the run ended as {other}"),
                    ErrorKind::Other,
                ));
            }
        }
        sleep(RUN_POLL_INTERVAL).await;
    }
    Err(Error::new(
        "the run did not complete in time",
        ErrorKind::Other,
    ))
}

async fn post_json<T: DeserializeOwned>(
    client: &Client,
    config: &OpenAIConfig,
    path: &str,
    body: &Value,
) -> Result<T, Error> {
    let resp = client
        .post(format!("{}{}", config.base_url, path))
        .header(header::AUTHORIZATION, format!("Bearer {}", config.api_key))
        .header("OpenAI-Beta", "assistants=v2")
        .json(body)
        .send()
        .await
        .and_then(Response::error_for_status)
        .map_err(request_error)?;
    resp.json().await.map_err(request_error)
}

async fn get_json<T: DeserializeOwned>(
    client: &Client,
    config: &OpenAIConfig,
    path: &str,
) -> Result<T, Error> {
    let resp = client
        .get(format!("{}{}", config.base_url, path))
        .header(header::AUTHORIZATION, format!("Bearer {}", config.api_key))
        .header("OpenAI-Beta", "assistants=v2")
        .send()
        .await
        .and_then(Response::error_for_status)
        .map_err(request_error)?;
    resp.json().await.map_err(request_error)
}

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    status: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

// The list comes back newest-first; only text blocks carry a reply.
fn extract_reply(list: &MessageList) -> Option<String> {
    let message = list.data.iter().find(|msg| msg.role == "assistant")?;
    let mut reply = String::new();
    for block in &message.content {
        if let Some(text) = &block.text {
            reply.push_str(&text.value);
        }
    }
    (!reply.is_empty()).then_some(reply)
}

fn lock(ids: &Mutex<ThreadIds>) -> MutexGuard<'_, ThreadIds> {
    ids.lock().unwrap_or_else(PoisonError::into_inner)
}
