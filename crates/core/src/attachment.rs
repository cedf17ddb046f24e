//! The staged input: one pending file plus its preview.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use playground_processor::MediaFile;

use crate::log::{Attachment, MediaKind, Preview, PreviewHandle};

/// At most one of these is pending per session at any time: the file the
/// next send will carry, together with its preview representation.
///
/// Staging a new file (or finalizing a recording) replaces any prior
/// staged input wholesale; the session revokes the replaced preview.
#[derive(Clone, Debug)]
pub struct StagedInput {
    file: MediaFile,
    preview: Option<Preview>,
}

impl StagedInput {
    /// Stages a file, deriving its preview representation.
    ///
    /// Images are encoded into a base64 data URI, audio gets a revocable
    /// handle to the raw bytes. Files of any other media kind stage
    /// without a preview.
    pub fn new(file: MediaFile) -> Self {
        let preview = match MediaKind::from_media_type(&file.media_type) {
            Some(MediaKind::Image) => Some(Preview::DataUri(encode_data_uri(&file))),
            Some(MediaKind::Audio) => {
                Some(Preview::Handle(PreviewHandle::new(file.data.clone())))
            }
            None => None,
        };
        Self { file, preview }
    }

    /// The staged file.
    #[inline]
    pub fn file(&self) -> &MediaFile {
        &self.file
    }

    /// The preview representation, if one could be derived.
    #[inline]
    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// The media kind of the staged file.
    #[inline]
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_media_type(&self.file.media_type)
    }

    /// Builds the attachment that a message capturing this input should
    /// carry.
    pub(crate) fn attachment(&self) -> Option<Attachment> {
        let kind = self.kind()?;
        let preview = self.preview.clone()?;
        Some(Attachment { kind, preview })
    }

    /// Consumes the staged input, returning the file for processing.
    pub(crate) fn into_file(self) -> MediaFile {
        self.file
    }

    /// Revokes an audio preview handle, if this input carries one.
    pub(crate) fn revoke_preview(&self) {
        if let Some(Preview::Handle(handle)) = &self.preview {
            handle.revoke();
        }
    }
}

fn encode_data_uri(file: &MediaFile) -> String {
    format!(
        "data:{};base64,{}",
        file.media_type,
        BASE64.encode(&file.data)
    )
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_image_previews_as_data_uri() {
        let file = MediaFile::new("pic.png", mime::IMAGE_PNG, Bytes::from_static(b"\x89PNG"));
        let staged = StagedInput::new(file);
        assert_eq!(staged.kind(), Some(MediaKind::Image));
        let Some(Preview::DataUri(uri)) = staged.preview() else {
            panic!("expected a data URI preview");
        };
        assert!(uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_audio_previews_as_handle() {
        let media_type = "audio/webm".parse().unwrap();
        let data = Bytes::from_static(b"opus");
        let staged = StagedInput::new(MediaFile::new("clip.webm", media_type, data.clone()));
        assert_eq!(staged.kind(), Some(MediaKind::Audio));
        let Some(Preview::Handle(handle)) = staged.preview() else {
            panic!("expected a handle preview");
        };
        assert_eq!(handle.resolve(), Some(data));
    }

    #[test]
    fn test_other_kinds_have_no_preview() {
        let staged = StagedInput::new(MediaFile::new(
            "notes.txt",
            mime::TEXT_PLAIN,
            Bytes::from_static(b"hi"),
        ));
        assert_eq!(staged.kind(), None);
        assert!(staged.preview().is_none());
    }
}
