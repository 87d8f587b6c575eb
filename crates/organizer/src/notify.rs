//! Outbound notifications.
//!
//! Delivery is fire-and-forget: implementations swallow their own failures
//! and may drop messages when disabled or throttled.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use mediasort_core::config::NotificationSettings;
use parking_lot::Mutex;
use tracing::{debug, info};

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_success(&self, title: &str, source: &str, destination: &str);
    async fn notify_error(&self, title: &str, source: &str, message: &str);
    async fn notify_batch_completion(&self, total: usize, success: usize, error: usize);
}

/// Sliding-window limiter. Pruning, the threshold check and recording the
/// new send happen under one lock.
pub struct RateLimiter {
    max: usize,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn per_hour(max: u32) -> Self {
        Self::new(max as usize, Duration::from_secs(3600))
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut sent = self.sent.lock();
        while let Some(oldest) = sent.front() {
            if now.duration_since(*oldest) >= self.window {
                sent.pop_front();
            } else {
                break;
            }
        }
        if sent.len() >= self.max {
            return false;
        }
        sent.push_back(now);
        true
    }

    pub fn in_window(&self) -> usize {
        self.sent.lock().len()
    }
}

/// Delivers notifications as structured events on the `mediasort::notify`
/// target, honouring the enable switches and the hourly limit.
pub struct LogNotifier {
    settings: NotificationSettings,
    limiter: RateLimiter,
}

impl LogNotifier {
    pub fn new(settings: NotificationSettings) -> Self {
        let limiter = RateLimiter::per_hour(settings.max_per_hour);
        Self { settings, limiter }
    }

    fn admit(&self, wanted: bool, subject: &str) -> bool {
        if !self.settings.enabled || !wanted {
            return false;
        }
        if !self.limiter.try_acquire() {
            debug!(subject, max_per_hour = self.settings.max_per_hour, "notification rate limit reached");
            return false;
        }
        true
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify_success(&self, title: &str, source: &str, destination: &str) {
        if self.admit(self.settings.notify_on_success, "organized") {
            info!(target: "mediasort::notify", kind = "success", title, source, destination, "media organized");
        }
    }

    async fn notify_error(&self, title: &str, source: &str, message: &str) {
        if self.admit(self.settings.notify_on_error, "error") {
            info!(target: "mediasort::notify", kind = "error", title, source, message, "media processing failed");
        }
    }

    async fn notify_batch_completion(&self, total: usize, success: usize, error: usize) {
        if self.admit(self.settings.notify_on_completion, "batch") {
            info!(target: "mediasort::notify", kind = "batch", total, success, error, "batch processing complete");
        }
    }
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait::async_trait]
impl Notifier for NullNotifier {
    async fn notify_success(&self, _title: &str, _source: &str, _destination: &str) {}
    async fn notify_error(&self, _title: &str, _source: &str, _message: &str) {}
    async fn notify_batch_completion(&self, _total: usize, _success: usize, _error: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_blocks_after_max_until_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(1)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(2)));
        assert_eq!(limiter.in_window(), 2);

        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(60)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(60)));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(61)));
    }

    #[test]
    fn zero_limit_never_admits() {
        let limiter = RateLimiter::per_hour(0);
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn disabled_notifier_does_not_consume_quota() {
        let notifier = LogNotifier::new(NotificationSettings {
            enabled: false,
            ..Default::default()
        });
        notifier.notify_error("T", "/s", "boom").await;
        assert_eq!(notifier.limiter.in_window(), 0);
    }

    #[tokio::test]
    async fn switches_gate_each_kind() {
        let notifier = LogNotifier::new(NotificationSettings {
            enabled: true,
            notify_on_success: false,
            notify_on_error: true,
            notify_on_completion: true,
            max_per_hour: 10,
        });
        notifier.notify_success("T", "/s", "/d").await;
        assert_eq!(notifier.limiter.in_window(), 0);
        notifier.notify_error("T", "/s", "boom").await;
        notifier.notify_batch_completion(3, 2, 1).await;
        assert_eq!(notifier.limiter.in_window(), 2);
    }
}
