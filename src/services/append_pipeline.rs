//! Bounded append pipeline.
//!
//! Wraps an inbound byte stream in a limiting filter that refuses to yield
//! more than the remaining byte budget of an upload, and drains the filtered
//! stream into a buffer that is committed to the session even when the
//! stream fails partway through.

use crate::errors::{StoreError, StoreResult};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, ready};
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

/// Inbound byte stream accepted by `append`.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Limiting filter over an inbound stream.
///
/// Without a limit every chunk passes through. With one, the chunk that
/// would cross the limit is cut down to what still fits, and the next poll
/// yields `LengthExceeded` and ends the stream.
pub struct BoundedStream {
    inner: ByteStream,
    limit: Option<u64>,
    remaining: u64,
    exceeded: bool,
    done: bool,
}

impl BoundedStream {
    pub fn new(inner: ByteStream, limit: Option<u64>) -> Self {
        Self {
            inner,
            limit,
            remaining: limit.unwrap_or(u64::MAX),
            exceeded: false,
            done: false,
        }
    }

    fn overflow(&mut self) -> StoreError {
        self.done = true;
        StoreError::LengthExceeded {
            limit: self.limit.unwrap_or_default(),
        }
    }
}

impl Stream for BoundedStream {
    type Item = StoreResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.exceeded {
            return Poll::Ready(Some(Err(this.overflow())));
        }

        match ready!(this.inner.as_mut().poll_next(cx)) {
            None => {
                this.done = true;
                Poll::Ready(None)
            }
            Some(Err(err)) => {
                this.done = true;
                Poll::Ready(Some(Err(StoreError::Io(err))))
            }
            Some(Ok(chunk)) if this.limit.is_none() => Poll::Ready(Some(Ok(chunk))),
            Some(Ok(mut chunk)) => {
                let len = chunk.len() as u64;
                if len <= this.remaining {
                    this.remaining -= len;
                    return Poll::Ready(Some(Ok(chunk)));
                }

                chunk.truncate(this.remaining as usize);
                this.remaining = 0;
                if chunk.is_empty() {
                    return Poll::Ready(Some(Err(this.overflow())));
                }
                this.exceeded = true;
                Poll::Ready(Some(Ok(chunk)))
            }
        }
    }
}

/// Bytes pulled out of a bounded stream, plus the error that stopped it.
#[derive(Debug)]
pub struct Drained {
    pub bytes: BytesMut,
    pub error: Option<StoreError>,
}

/// Consume `stream` to its end or its first error.
///
/// Bytes received before the error are kept so the caller can commit them
/// before re-raising it.
pub async fn drain(mut stream: BoundedStream) -> Drained {
    let mut bytes = BytesMut::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(err) => {
                return Drained {
                    bytes,
                    error: Some(err),
                };
            }
        }
    }
    Drained { bytes, error: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn unbounded_passes_everything() {
        let drained = drain(BoundedStream::new(chunks(&[b"abc", b"def"]), None)).await;
        assert_eq!(&drained.bytes[..], b"abcdef");
        assert!(drained.error.is_none());
    }

    #[tokio::test]
    async fn exact_budget_is_accepted() {
        let drained = drain(BoundedStream::new(chunks(&[b"abc", b"de"]), Some(5))).await;
        assert_eq!(&drained.bytes[..], b"abcde");
        assert!(drained.error.is_none());
    }

    #[tokio::test]
    async fn overflowing_chunk_is_cut_at_the_limit() {
        let drained = drain(BoundedStream::new(chunks(&[b"abc", b"defgh"]), Some(5))).await;
        assert_eq!(&drained.bytes[..], b"abcde");
        assert!(matches!(
            drained.error,
            Some(StoreError::LengthExceeded { limit: 5 })
        ));
    }

    #[tokio::test]
    async fn zero_budget_rejects_first_byte() {
        let drained = drain(BoundedStream::new(chunks(&[b"x"]), Some(0))).await;
        assert!(drained.bytes.is_empty());
        assert!(matches!(
            drained.error,
            Some(StoreError::LengthExceeded { limit: 0 })
        ));
    }

    #[tokio::test]
    async fn inbound_failure_keeps_earlier_bytes() {
        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer gone")),
            Ok(Bytes::from_static(b"cd")),
        ];
        let drained = drain(BoundedStream::new(Box::pin(stream::iter(items)), Some(10))).await;
        assert_eq!(&drained.bytes[..], b"ab");
        assert!(matches!(drained.error, Some(StoreError::Io(_))));
    }
}
