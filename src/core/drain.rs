//! # Queue draining on teardown.
//!
//! After a forwarding loop stops reading, a producer blocked on a full queue would never
//! make progress. Draining closes the receiving side (every later `send` fails at once)
//! and discards whatever is still buffered.

use tokio::sync::mpsc;

/// Closes `rx` and discards all buffered items without waiting.
///
/// Returns the number of discarded items. Items sent concurrently with the close may
/// still be counted; nothing sent after it is accepted.
pub fn drain_queue<T>(rx: &mut mpsc::Receiver<T>) -> usize {
    rx.close();
    let mut discarded = 0;
    while rx.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discards_every_buffered_item() {
        let (tx, mut rx) = mpsc::channel(8);
        for i in 0..5 {
            tx.send(i).await.expect("send");
        }
        assert_eq!(drain_queue(&mut rx), 5);
        assert!(tx.send(99).await.is_err(), "sends after a drain must fail fast");
    }

    #[tokio::test]
    async fn unblocks_a_producer_waiting_on_a_full_queue() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(0).await.expect("send");

        let blocked = tokio::spawn(async move { tx.send(1).await.is_err() });
        tokio::task::yield_now().await;

        assert_eq!(drain_queue(&mut rx), 1);
        assert!(blocked.await.expect("join"), "blocked send returns an error");
    }

    #[test]
    fn empty_queue_drains_to_zero() {
        let (_tx, mut rx) = mpsc::channel::<u8>(1);
        assert_eq!(drain_queue(&mut rx), 0);
    }
}
