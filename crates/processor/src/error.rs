/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request carried input the capability cannot handle, e.g. a
    /// transcription request without an audio file.
    InvalidInput,
    /// The provider is rate limited.
    RateLimited,
    /// Any other errors.
    Other,
}
