use std::sync::Arc;

use playground_processor::{
    ErrorKind, NeverStream, ProcessRequest, Processor, ProcessorOutput,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, header};
use serde::Deserialize;

use crate::config::OpenAIConfig;
use crate::{Error, request_error};

/// Audio transcription processor.
///
/// The staged audio file is uploaded as multipart form data and the
/// request resolves to the transcribed text in one shot; the typed text
/// and prior turns are ignored.
#[derive(Clone, Debug)]
pub struct TranscriptionProcessor {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl TranscriptionProcessor {
    /// Creates a new `TranscriptionProcessor`.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl Processor for TranscriptionProcessor {
    type Error = Error;
    type Stream = NeverStream<Error>;

    fn process(
        &self,
        req: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessorOutput<Self::Stream>, Self::Error>> + Send + 'static
    {
        let form = req.file.as_ref().map(|file| {
            Part::bytes(file.data.to_vec())
                .file_name(file.name.clone())
                .mime_str(file.media_type.as_ref())
                .map(|part| {
                    Form::new()
                        .part("file", part)
                        .text("model", self.config.transcription_model.clone())
                })
        });
        let client = self.client.clone();
        let url = format!("{}{}", self.config.base_url, "/audio/transcriptions");
        let api_key = self.config.api_key.clone();

        async move {
            // Rejected locally, nothing is worth uploading.
            let form = match form {
                None => {
                    return Err(Error::new(
                        "an audio file is required",
                        ErrorKind::InvalidInput,
                    ));
                }
                Some(Err(err)) => {
                    return Err(Error::new(format!("{err}"), ErrorKind::InvalidInput));
                }
                Some(Ok(form)) => form,
            };

            let resp = client
                .post(url)
                .header(header::AUTHORIZATION, format!("Bearer {api_key}"))
                .multipart(form)
                .send()
                .await
                .and_then(Response::error_for_status)
                .map_err(request_error)?;

            let parsed: TranscriptionResponse = resp.json().await.map_err(request_error)?;
            Ok(ProcessorOutput::Scalar(parsed.text))
        }
    }
}

#[cfg(test)]
mod tests {
    use playground_processor::{ModelParams, ProcessorError};

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[tokio::test]
    async fn test_missing_file_is_rejected_locally() {
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();
        let processor = TranscriptionProcessor::new(config);
        let req = ProcessRequest {
            text: String::new(),
            file: None,
            prior: vec![],
            params: ModelParams::default(),
        };
        let Err(err) = processor.process(&req).await else {
            panic!("expected an error");
        };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
