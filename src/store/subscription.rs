use futures::{stream::BoxStream, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

/// Handle to a running subscription. The handler registered with [subscribe] is invoked once per
/// item of the stream until the stream ends or the subscription is cancelled.
///
/// After [Subscription::cancel] returns the handler is guaranteed not to run again. Dropping the
/// handle also cancels, but without waiting for a handler that's currently running.
pub struct Subscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

pub fn subscribe<T, F>(items: BoxStream<'static, T>, mut handler: F) -> Subscription
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let span = info_span!("subscription");
    let handle = tokio::spawn(
        async move {
            let mut items = items;
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    next = items.next() => next,
                };
                let Some(item) = next else {
                    debug!("Subscription stream ended");
                    break;
                };
                if cancelled.is_cancelled() {
                    break;
                }
                handler(item);
            }
        }
        .instrument(span),
    );

    Subscription {
        token,
        handle: Some(handle),
    }
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Waits until the underlying stream ends on its own, e.g. after delivering an error.
    pub async fn finished(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            let _ = handle.await;
            self.handle = None;
        }
    }

    pub async fn cancel(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use futures::{stream, StreamExt};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use super::subscribe;

    #[tokio::test]
    async fn delivers_until_stream_ends() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let mut subscription = subscribe(stream::iter(0..3).boxed(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.finished().await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(!subscription.is_active());
    }

    #[tokio::test]
    async fn no_callbacks_after_cancel() {
        let (sender, receiver) = mpsc::unbounded_channel::<u32>();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let subscription = subscribe(UnboundedReceiverStream::new(receiver).boxed(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sender.send(1).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        subscription.cancel().await;
        // the receiver is gone with the task, so further sends fail and nothing is delivered
        assert!(sender.send(2).is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
