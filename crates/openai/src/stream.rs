use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use playground_processor::{ErrorKind, ResponseStream};

use crate::Error;
use crate::chat::ChatCompletionChunk;
use crate::sse::Sse;

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextIncrement = Result<(Option<String>, Sse), Error>;

pin_project! {
    /// The streaming half of a chat completion response.
    pub struct ChatStream {
        next_fut: Option<PinnedFuture<NextIncrement>>,
    }
}

impl ChatStream {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        Self {
            next_fut: Some(Box::pin(next_increment(sse))),
        }
    }
}

impl ResponseStream for ChatStream {
    type Error = Error;

    fn poll_next_increment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.project();
        let Some(next_fut) = this.next_fut else {
            // The stream has terminated.
            return Poll::Ready(Ok(None));
        };
        match ready!(next_fut.as_mut().poll(cx)) {
            Ok((Some(increment), sse)) => {
                // More data may follow, re-arm for the next increment.
                *this.next_fut = Some(Box::pin(next_increment(sse)));
                Poll::Ready(Ok(Some(increment)))
            }
            Ok((None, _)) => {
                *this.next_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }
}

async fn next_increment(mut sse: Sse) -> NextIncrement {
    loop {
        let event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => return Ok((None, sse)),
            Err(err) => return Err(Error::new(format!("{err:?}"), ErrorKind::Other)),
        };
        trace!("got sse event: {event}");
        if event == "[DONE]" {
            return Ok((None, sse));
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };
        if choice.finish_reason.is_some() {
            return Ok((None, sse));
        }
        match choice.delta.content {
            Some(content) if !content.is_empty() => return Ok((Some(content), sse)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::sse::ByteSource;

    fn stream(chunks: Vec<Bytes>) -> ChatStream {
        ChatStream::from_sse(Sse::new(ByteSource::from_chunks(chunks.into())))
    }

    async fn collect(stream: ChatStream) -> Result<Vec<String>, Error> {
        let mut stream = pin!(stream);
        let mut increments = Vec::new();
        loop {
            match poll_fn(|cx| stream.as_mut().poll_next_increment(cx)).await? {
                Some(increment) => increments.push(increment),
                None => return Ok(increments),
            }
        }
    }

    #[tokio::test]
    async fn test_deltas_become_increments() {
        let stream = stream(vec![
            Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            ),
            Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            ),
            Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            ),
            Bytes::from_static(b"data: [DONE]\n\n"),
        ]);
        assert_eq!(collect(stream).await.unwrap(), ["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_empty_deltas_are_skipped() {
        let stream = stream(vec![
            Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"\"},\"finish_reason\":null}]}\n\n",
            ),
            Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"},\"finish_reason\":null}]}\n\n",
            ),
            Bytes::from_static(b"data: [DONE]\n\n"),
        ]);
        assert_eq!(collect(stream).await.unwrap(), ["hi"]);
    }

    #[tokio::test]
    async fn test_malformed_chunk_fails_the_stream() {
        let stream = stream(vec![Bytes::from_static(b"data: not json\n\n")]);
        assert!(collect(stream).await.is_err());
    }
}
