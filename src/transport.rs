//! # Client transport seam.
//!
//! A [`StreamSink`] is the server side of a server-streaming RPC: the controllers push
//! items into it and learn about client-side closure through it. Any transport with
//! server-to-client streaming and client-visible cancellation fits; an implementation
//! for [`tokio::sync::mpsc::Sender`] is provided, which is how streaming RPC frameworks
//! usually hand a response stream to a handler.

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SinkError;
use crate::subscribers::panic_message;

/// Server side of a streaming response.
#[async_trait]
pub trait StreamSink<T: Send + 'static>: Send + Sync {
    /// Delivers one item to the client.
    async fn send(&mut self, item: T) -> Result<(), SinkError>;

    /// Completes when the client closed its side of the stream.
    ///
    /// Transports that cannot observe closure keep the default, which never completes.
    async fn closed(&self) {
        futures::future::pending::<()>().await
    }
}

#[async_trait]
impl<T: Send + 'static> StreamSink<T> for mpsc::Sender<T> {
    async fn send(&mut self, item: T) -> Result<(), SinkError> {
        mpsc::Sender::send(self, item)
            .await
            .map_err(|_| SinkError::Closed)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

/// Result of one guarded send.
#[derive(Debug)]
pub(crate) enum SendOutcome {
    Sent,
    /// The session context was cancelled while the send was pending.
    Canceled,
    Failed(SinkError),
}

/// Sends `item`, giving up when `ctx` is cancelled and converting a panic inside the
/// transport into [`SinkError::Panicked`].
pub(crate) async fn send_guarded<T, S>(sink: &mut S, item: T, ctx: &CancellationToken) -> SendOutcome
where
    T: Send + 'static,
    S: StreamSink<T> + ?Sized,
{
    let send = std::panic::AssertUnwindSafe(sink.send(item)).catch_unwind();
    tokio::select! {
        biased;
        _ = ctx.cancelled() => SendOutcome::Canceled,
        res = send => match res {
            Ok(Ok(())) => SendOutcome::Sent,
            Ok(Err(e)) => SendOutcome::Failed(e),
            Err(panic) => SendOutcome::Failed(SinkError::Panicked {
                info: panic_message(panic.as_ref()),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exploding;

    #[async_trait]
    impl StreamSink<u32> for Exploding {
        async fn send(&mut self, _item: u32) -> Result<(), SinkError> {
            panic!("transport bug");
        }
    }

    #[tokio::test]
    async fn mpsc_sender_reports_closed_client() {
        let (mut tx, rx) = mpsc::channel::<u32>(1);
        drop(rx);
        tx.closed().await;
        let ctx = CancellationToken::new();
        assert!(matches!(
            send_guarded(&mut tx, 1, &ctx).await,
            SendOutcome::Failed(SinkError::Closed)
        ));
    }

    #[tokio::test]
    async fn panicking_transport_becomes_an_error() {
        let ctx = CancellationToken::new();
        match send_guarded(&mut Exploding, 7, &ctx).await {
            SendOutcome::Failed(SinkError::Panicked { info }) => assert_eq!(info, "transport bug"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_blocked_send() {
        let (mut tx, _rx) = mpsc::channel::<u32>(1);
        tx.try_send(0).expect("fill");
        let ctx = CancellationToken::new();
        ctx.cancel();
        assert!(matches!(
            send_guarded(&mut tx, 1, &ctx).await,
            SendOutcome::Canceled
        ));
    }
}
