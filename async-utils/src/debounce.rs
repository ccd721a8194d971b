use crate::cancel::OrCancelExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A value released by [`DebounceGate`] after the input went quiet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debounced<T> {
    pub generation: u64,
    pub value: T,
}

/// Delays values until input pauses for `delay`; only the most recently
/// scheduled value is ever released.
///
/// Every `schedule` cancels the previous timer. A cancelled timer never
/// sends. Because a release may already sit in the channel when a newer
/// value is scheduled, receivers pass what they read through
/// [`DebounceGate::accept`], which drops anything but the latest generation.
/// Dropping the gate cancels the pending timer.
pub struct DebounceGate<T> {
    delay: Duration,
    tx: mpsc::UnboundedSender<Debounced<T>>,
    pending: Option<(u64, CancellationToken)>,
    generation: u64,
}

impl<T> DebounceGate<T>
where
    T: Send + 'static,
{
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<Debounced<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = Self {
            delay,
            tx,
            pending: None,
            generation: 0,
        };
        (gate, rx)
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, value: T) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        self.pending = Some((generation, token.clone()));

        let tx = self.tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            if sleep(delay).or_cancel(&token).await.is_err() {
                trace!("debounce generation {generation} cancelled");
                return;
            }
            if token.is_cancelled() {
                return;
            }
            let _ = tx.send(Debounced { generation, value });
        });
        generation
    }

    pub fn cancel(&mut self) {
        if let Some((_, token)) = self.pending.take() {
            token.cancel();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        matches!(
            &self.pending,
            Some((pending, token)) if *pending == generation && !token.is_cancelled()
        )
    }

    /// Returns the released value if it belongs to the latest schedule and
    /// clears the pending slot; stale releases yield `None`.
    pub fn accept(&mut self, fired: Debounced<T>) -> Option<T> {
        if !self.is_current(fired.generation) {
            trace!("dropping stale debounce generation {}", fired.generation);
            return None;
        }
        self.pending = None;
        Some(fired.value)
    }
}

impl<T> Drop for DebounceGate<T> {
    fn drop(&mut self) {
        if let Some((_, token)) = self.pending.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DELAY: Duration = Duration::from_millis(200);

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_release_only_the_last_value() {
        let (mut gate, mut rx) = DebounceGate::new(DELAY);
        gate.schedule("a".to_string());
        sleep(Duration::from_millis(50)).await;
        gate.schedule("ab".to_string());
        sleep(Duration::from_millis(50)).await;
        gate.schedule("abc".to_string());

        sleep(Duration::from_millis(500)).await;

        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.value, "abc");
        assert_eq!(gate.accept(fired), Some("abc".to_string()));
        assert!(rx.try_recv().is_err());
        assert!(!gate.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_released_before_the_delay() {
        let (mut gate, mut rx) = DebounceGate::new(DELAY);
        gate.schedule(1u32);
        sleep(Duration::from_millis(199)).await;
        assert!(rx.try_recv().is_err());
        sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.try_recv().unwrap().value, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn release_already_queued_is_rejected_after_reschedule() {
        let (mut gate, mut rx) = DebounceGate::new(DELAY);
        gate.schedule("ab".to_string());
        sleep(Duration::from_millis(300)).await;
        let queued = rx.try_recv().unwrap();

        gate.schedule("abc".to_string());
        assert_eq!(gate.accept(queued), None);

        sleep(Duration::from_millis(300)).await;
        let fired = rx.try_recv().unwrap();
        assert_eq!(gate.accept(fired), Some("abc".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_gate_cancels_pending_release() {
        let (mut gate, mut rx) = DebounceGate::new(DELAY);
        gate.schedule("abc".to_string());
        drop(gate);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_cancel_has_no_side_effects() {
        let (mut gate, mut rx) = DebounceGate::new(DELAY);
        let generation = gate.schedule("abc".to_string());
        gate.cancel();
        assert!(!gate.is_current(generation));
        sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }
}
