use playground_core::SessionBuilder;
use playground_openai::{AssistantProcessor, ChatProcessor, OpenAIConfig, TranscriptionProcessor};

/// The processing capability a session is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Plain text chat.
    Chat,
    /// Chat with image attachments forwarded to the model.
    Vision,
    /// One-shot audio transcription.
    Transcription,
    /// Server-side assistant threads; history lives with the provider.
    Assistant,
}

impl Capability {
    /// Parses a capability name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "chat" => Some(Self::Chat),
            "vision" => Some(Self::Vision),
            "transcription" => Some(Self::Transcription),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// The canonical name.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Vision => "vision",
            Self::Transcription => "transcription",
            Self::Assistant => "assistant",
        }
    }
}

/// Attaches the processor for the given capability to a session builder.
pub fn bind_capability(
    builder: SessionBuilder,
    capability: Capability,
    config: OpenAIConfig,
) -> SessionBuilder {
    match capability {
        Capability::Chat => builder.with_processor(ChatProcessor::new(config)),
        Capability::Vision => builder.with_processor(ChatProcessor::vision(config)),
        Capability::Transcription => {
            builder.with_processor(TranscriptionProcessor::new(config))
        }
        Capability::Assistant => builder.with_processor(AssistantProcessor::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for capability in [
            Capability::Chat,
            Capability::Vision,
            Capability::Transcription,
            Capability::Assistant,
        ] {
            assert_eq!(Capability::from_name(capability.name()), Some(capability));
        }
        assert_eq!(Capability::from_name("audio"), None);
    }
}
