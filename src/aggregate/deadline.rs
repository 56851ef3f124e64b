// src/aggregate/deadline.rs
//! Per-request deadline: a child of the caller's token that also fires after a
//! fixed budget. Every fetch and the collector wait on the same token, so a
//! caller disconnect and a timeout look identical downstream.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why the deadline token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Pending,
    TimedOut,
    CallerGone,
}

pub struct Deadline {
    token: CancellationToken,
    caller: CancellationToken,
    timer: JoinHandle<()>,
}

impl Deadline {
    /// Start the clock now. Must be called inside a tokio runtime.
    pub fn start(caller: &CancellationToken, budget: Duration) -> Self {
        let token = caller.child_token();
        let timer = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(budget) => {
                        tracing::debug!(target: "aggregate", ?budget, "deadline fired");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        };
        Self {
            token,
            caller: caller.clone(),
            timer,
        }
    }

    /// Token to hand to followers. Cancelling it is idempotent.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn expiry(&self) -> Expiry {
        if !self.token.is_cancelled() {
            Expiry::Pending
        } else if self.caller.is_cancelled() {
            Expiry::CallerGone
        } else {
            Expiry::TimedOut
        }
    }
}

impl Drop for Deadline {
    // Leaving the request scope on any path releases every follower.
    fn drop(&mut self) {
        self.token.cancel();
        self.timer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_after_budget() {
        let caller = CancellationToken::new();
        let d = Deadline::start(&caller, Duration::from_millis(30));
        assert_eq!(d.expiry(), Expiry::Pending);
        tokio::time::timeout(Duration::from_secs(2), d.token().cancelled())
            .await
            .expect("deadline should fire");
        assert!(d.token().is_cancelled());
        assert_eq!(d.expiry(), Expiry::TimedOut);
        assert!(!caller.is_cancelled(), "cancellation never flows upward");
    }

    #[tokio::test]
    async fn caller_cancellation_propagates_down() {
        let caller = CancellationToken::new();
        let d = Deadline::start(&caller, Duration::from_secs(60));
        let follower = d.token().clone();
        caller.cancel();
        assert!(follower.is_cancelled());
        assert_eq!(d.expiry(), Expiry::CallerGone);
    }

    #[tokio::test]
    async fn dropping_the_scope_releases_followers() {
        let caller = CancellationToken::new();
        let follower = {
            let d = Deadline::start(&caller, Duration::from_secs(60));
            assert_eq!(d.expiry(), Expiry::Pending);
            d.token().clone()
        };
        assert!(follower.is_cancelled());
        assert!(!caller.is_cancelled());
    }

    #[tokio::test]
    async fn all_followers_observe_the_same_firing() {
        let caller = CancellationToken::new();
        let d = Deadline::start(&caller, Duration::from_millis(20));
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let t = d.token().clone();
                tokio::spawn(async move { t.cancelled().await })
            })
            .collect();
        for w in waiters {
            tokio::time::timeout(Duration::from_secs(2), w)
                .await
                .expect("every follower wakes")
                .unwrap();
        }
    }
}
