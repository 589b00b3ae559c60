use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Hard deadline of one turn. The deadline task stops as soon as the timer
/// is disposed or dropped; disposing twice is harmless.
#[derive(Debug)]
pub struct TurnTimer {
    token: CancellationToken,
    guard: Option<DropGuard>,
}

impl TurnTimer {
    /// Spawns the deadline task. `on_fire` runs at most once, and never after
    /// [`TurnTimer::dispose`].
    pub fn arm<F>(timeout: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(timeout) => on_fire(),
            }
        });
        Self {
            guard: Some(token.clone().drop_guard()),
            token,
        }
    }

    pub fn dispose(&mut self) {
        self.guard.take();
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_timeout() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _timer = TurnTimer::arm(Duration::from_secs(120), move || {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let mut timer = TurnTimer::arm(Duration::from_secs(5), move || {
            flag.store(true, Ordering::SeqCst);
        });
        timer.dispose();
        timer.dispose();
        assert!(timer.is_disposed());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_cancels_it() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = TurnTimer::arm(Duration::from_secs(5), move || {
            flag.store(true, Ordering::SeqCst);
        });
        let token = timer.token();
        drop(timer);

        assert!(token.is_cancelled());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
