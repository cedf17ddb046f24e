//! Message log types.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use mime::Mime;
use playground_processor::Role;

/// One turn in the conversation.
///
/// Assistant content is mutated in place while a response streams in and
/// becomes fixed once the request resolves. The log itself is
/// append-only apart from that mutation and the wholesale clear.
#[derive(Clone, Debug)]
pub struct Message {
    /// Who produced the turn.
    pub role: Role,
    /// The text of the turn.
    pub content: String,
    /// A previewable attachment carried by the turn, if any.
    pub attachment: Option<Attachment>,
    /// Whether this message stands in for a failed response.
    pub is_error: bool,
}

impl Message {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S, attachment: Option<Attachment>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment,
            is_error: false,
        }
    }

    /// Creates the empty assistant placeholder appended before a
    /// response arrives.
    #[inline]
    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            attachment: None,
            is_error: false,
        }
    }

    /// Creates an in-log error message.
    #[inline]
    pub fn error<S: Into<String>>(description: S) -> Self {
        Self {
            role: Role::Assistant,
            content: description.into(),
            attachment: None,
            is_error: true,
        }
    }
}

/// The media kind of an attachment, derived from its media type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// A still image.
    Image,
    /// An audio clip.
    Audio,
}

impl MediaKind {
    /// Derives the kind from a media type, `None` for anything that is
    /// neither image nor audio.
    pub fn from_media_type(media_type: &Mime) -> Option<Self> {
        match media_type.type_() {
            mime::IMAGE => Some(Self::Image),
            mime::AUDIO => Some(Self::Audio),
            _ => None,
        }
    }
}

/// A previewable attachment on a message.
#[derive(Clone, Debug)]
pub struct Attachment {
    /// The media kind.
    pub kind: MediaKind,
    /// The preview representation. Its variant always matches `kind`:
    /// images preview as data URIs, audio as revocable handles.
    pub preview: Preview,
}

/// The preview representation of an attachment.
#[derive(Clone, Debug)]
pub enum Preview {
    /// A `data:` URI, used for images.
    DataUri(String),
    /// A revocable reference to the raw bytes, used for audio.
    Handle(PreviewHandle),
}

impl Preview {
    /// Returns the data URI if this is an image preview.
    #[inline]
    pub fn as_data_uri(&self) -> Option<&str> {
        match self {
            Self::DataUri(uri) => Some(uri),
            Self::Handle(_) => None,
        }
    }
}

/// A revocable shared reference to preview bytes.
///
/// The analog of an object URL: clones resolve to the same bytes until
/// any of them revokes, after which every clone resolves to `None`. The
/// session revokes handles on teardown and clear so detached previews
/// cannot keep audio buffers alive.
#[derive(Clone, Debug)]
pub struct PreviewHandle {
    slot: Arc<Mutex<Option<Bytes>>>,
}

impl PreviewHandle {
    pub(crate) fn new(data: Bytes) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(data))),
        }
    }

    /// Resolves the handle to its bytes, `None` once revoked.
    pub fn resolve(&self) -> Option<Bytes> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Invalidates the handle for every clone.
    pub fn revoke(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_handle_revocation() {
        let handle = PreviewHandle::new(Bytes::from_static(b"pcm"));
        let clone = handle.clone();
        assert_eq!(clone.resolve(), Some(Bytes::from_static(b"pcm")));

        handle.revoke();
        assert_eq!(handle.resolve(), None);
        assert_eq!(clone.resolve(), None);
    }

    #[test]
    fn test_media_kind_derivation() {
        assert_eq!(
            MediaKind::from_media_type(&mime::IMAGE_PNG),
            Some(MediaKind::Image)
        );
        let audio: Mime = "audio/webm".parse().unwrap();
        assert_eq!(MediaKind::from_media_type(&audio), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_media_type(&mime::TEXT_PLAIN), None);
    }
}
