//! Server-sent event framing over a chunked byte transport.

#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Error {
    Transport,
    InvalidPayload,
}

/// The byte stream feeding the parser.
pub(crate) enum ByteSource {
    Response(Response),
    #[cfg(test)]
    Chunks(VecDeque<Bytes>),
}

impl ByteSource {
    pub(crate) fn from_response(response: Response) -> Self {
        Self::Response(response)
    }

    #[cfg(test)]
    pub(crate) fn from_chunks(chunks: VecDeque<Bytes>) -> Self {
        Self::Chunks(chunks)
    }

    #[inline]
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Self::Response(response) => response.chunk().await.map_err(|_| Error::Transport),
            #[cfg(test)]
            Self::Chunks(chunks) => Ok(chunks.pop_front()),
        }
    }
}

/// A reader for `data:` events on a chunked byte stream.
pub(crate) struct Sse {
    buf: String,
    source: ByteSource,
}

impl Sse {
    #[inline]
    pub(crate) fn new(source: ByteSource) -> Self {
        Self {
            buf: String::new(),
            source,
        }
    }

    pub(crate) async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Pull more bytes before attempting a parse, an event may
            // span several transport chunks.
            let mut has_more_data = false;
            if let Some(bytes) = self.source.next_chunk().await? {
                let Ok(s) = str::from_utf8(&bytes) else {
                    return Err(Error::InvalidPayload);
                };
                self.buf.push_str(s);
                has_more_data = true;
            }

            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            // Abort if no more data available.
            if !has_more_data {
                return Ok(None);
            }
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        // Only `data` fields terminated by a line feed are handled.
        //
        // event         = *( comment / field ) end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        // end-of-line   = ( cr lf / cr / lf )
        let Some(eol_idx) = self.buf.find("\n\n") else {
            return Ok(None);
        };

        let field = &self.buf[0..eol_idx];
        // Split on the first separator only, the payload itself may
        // contain `": "` (JSON strings routinely do).
        let Some((header, data)) = field.split_once(": ") else {
            return Err(Error::InvalidPayload);
        };
        if header != "data" {
            return Err(Error::InvalidPayload);
        }
        let data = data.to_owned();

        self.buf.drain(0..eol_idx + 2);

        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_chunks(chunks: Vec<Bytes>) -> Sse {
        Sse::new(ByteSource::from_chunks(chunks.into()))
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = from_chunks(vec![
            Bytes::from_static(b"data: hello\n\n"),
            Bytes::from_static(b"data: bye\n\n"),
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_payload_containing_a_colon_space() {
        let mut sse = from_chunks(vec![Bytes::from_static(
            b"data: {\"content\":\"Note: this stays whole\"}\n\n",
        )]);
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            "{\"content\":\"Note: this stays whole\"}"
        );
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let mut sse = from_chunks(vec![
            Bytes::from_static(b"data:"),
            Bytes::from_static(b" hello\n"),
            Bytes::from_static(b"\n"),
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = from_chunks(vec![Bytes::from_static(b"xxxxxx\n\n")]);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        // A lone field line is an incomplete event, not an error.
        let mut sse = from_chunks(vec![Bytes::from_static(b"xxxxxx\n")]);
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
