//! Short-lived status messages.
//!
//! Expiry is a deadline checked whenever the owner asks, so there are no
//! timers to cancel: dropping the center drops everything pending.

use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub text: String,
    pub kind: NotificationKind,
    pub expires_at: Instant,
}

impl Notification {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
pub struct NotificationCenter {
    ttl: Duration,
    next_id: u64,
    pending: Vec<Notification>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 1,
            pending: Vec::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Queue a message that expires `ttl` after `now`; returns its id.
    pub fn push(&mut self, text: impl Into<String>, kind: NotificationKind, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let notification = Notification {
            id,
            text: text.into(),
            kind,
            expires_at: now + self.ttl,
        };
        match kind {
            NotificationKind::Error => tracing::warn!(id, text = %notification.text, "Notification"),
            _ => tracing::debug!(id, text = %notification.text, "Notification"),
        }
        self.pending.push(notification);
        id
    }

    pub fn success(&mut self, text: impl Into<String>) -> u64 {
        self.push(text, NotificationKind::Success, Instant::now())
    }

    pub fn error(&mut self, text: impl Into<String>) -> u64 {
        self.push(text, NotificationKind::Error, Instant::now())
    }

    pub fn dismiss(&mut self, id: u64) {
        self.pending.retain(|notification| notification.id != id);
    }

    /// Drop expired messages and return the ones still showing, oldest first.
    pub fn active(&mut self, now: Instant) -> &[Notification] {
        self.prune(now);
        &self.pending
    }

    /// Remove expired messages; returns how many were dropped.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        self.pending.retain(|notification| !notification.is_expired(now));
        before - self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_expire_after_ttl() {
        let start = Instant::now();
        let mut center = NotificationCenter::default();
        center.push("Link copied", NotificationKind::Success, start);
        assert_eq!(center.active(start + Duration::from_millis(2_999)).len(), 1);
        assert!(center.active(start + DEFAULT_TTL).is_empty());
        assert!(center.is_empty());
    }

    #[test]
    fn each_message_keeps_its_own_deadline() {
        let start = Instant::now();
        let mut center = NotificationCenter::new(Duration::from_secs(1));
        let first = center.push("one", NotificationKind::Info, start);
        let second = center.push("two", NotificationKind::Error, start + Duration::from_millis(600));
        assert_ne!(first, second);
        let active = center.active(start + Duration::from_millis(1_100));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].text, "two");
        assert_eq!(active[0].kind, NotificationKind::Error);
    }

    #[test]
    fn dismiss_removes_early() {
        let start = Instant::now();
        let mut center = NotificationCenter::default();
        let id = center.push("Uploading", NotificationKind::Info, start);
        center.dismiss(id);
        assert_eq!(center.prune(start), 0);
        assert!(center.is_empty());
    }
}
