//! Streaming response body
//!
//! Adapts a streaming subscription to hyper's body trait. Each payload
//! the broadcast engine enqueues becomes one data frame of the open
//! chunked response; the shared queued-bytes counter is decremented as
//! frames are pulled, which is what the engine's backpressure check
//! reads. Dropping the body (the client disconnected or the connection
//! failed) detaches the subscriber from its channel.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

use crate::channel::StreamingSubscription;

/// Chunked body fed by the broadcast engine, open until the channel is
/// torn down or the client goes away
pub struct StreamingBody {
    sub: StreamingSubscription,
}

impl StreamingBody {
    pub(crate) fn new(sub: StreamingSubscription) -> Self {
        Self { sub }
    }
}

impl Body for StreamingBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this.sub.rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => {
                this.sub.queued.fetch_sub(chunk.len(), Ordering::AcqRel);
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            // sender gone: the channel was torn down, end the response
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        false
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelOptions};
    use std::sync::Arc;

    fn channel() -> Arc<Channel> {
        Arc::new(Channel::new(
            "test:0".to_string(),
            "/channel/t".to_string(),
            ChannelOptions::new("t"),
        ))
    }

    #[tokio::test]
    async fn test_frames_decrement_queued_counter() {
        let ch = channel();
        let peer = "127.0.0.1:40000".parse().unwrap();
        let sub = ch.subscribe_streaming(peer).unwrap();
        let queued = Arc::clone(&sub.queued);
        let mut body = StreamingBody::new(sub);

        ch.publish(&Bytes::from_static(b"hi"), "tester");
        let before = queued.load(Ordering::Acquire);
        assert!(before >= 2 * crate::http::padding::CHUNK_ALIGN); // preamble + message

        // pull the preamble frame
        let frame = std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx))
            .await
            .unwrap()
            .unwrap();
        let data = frame.into_data().ok().unwrap();
        assert!(data.starts_with(b"<!DOCTYPE html"));
        assert_eq!(
            queued.load(Ordering::Acquire),
            before - crate::http::padding::CHUNK_ALIGN
        );
    }

    #[tokio::test]
    async fn test_body_ends_on_teardown() {
        let ch = channel();
        let peer = "127.0.0.1:40000".parse().unwrap();
        let mut body = StreamingBody::new(ch.subscribe_streaming(peer).unwrap());

        ch.close_all();

        // preamble, then end-of-stream
        let frame = std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await;
        assert!(frame.is_some());
        let frame = std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await;
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_dropping_body_unsubscribes() {
        let ch = channel();
        let peer = "127.0.0.1:40000".parse().unwrap();
        let body = StreamingBody::new(ch.subscribe_streaming(peer).unwrap());
        assert_eq!(ch.subscriber_count(), 1);
        drop(body);
        assert_eq!(ch.subscriber_count(), 0);
    }
}
