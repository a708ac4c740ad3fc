//! user-visible alerts
//!
//! the write path and the ip lookup tell the user when they fail. the
//! dashboard keeps alerts as notices until dismissed; the terminal prints them.

use serde::Serialize;
use std::sync::Mutex;

pub trait Alerter: Send + Sync {
    fn alert(&self, message: &str);
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub at: String,
}

/// pending notices shown by the dashboard
#[derive(Debug, Default)]
pub struct Notices {
    pending: Mutex<Vec<Notice>>,
}

/// older notices are dropped past this many
const MAX_NOTICES: usize = 20;

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<Notice> {
        self.pending.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn dismiss(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }
}

impl Alerter for Notices {
    fn alert(&self, message: &str) {
        tracing::warn!("alert: {message}");
        if let Ok(mut pending) = self.pending.lock() {
            if pending.len() >= MAX_NOTICES {
                pending.remove(0);
            }
            pending.push(Notice {
                message: message.to_string(),
                at: chrono::Local::now().format("%H:%M:%S").to_string(),
            });
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAlerter;

impl Alerter for StderrAlerter {
    fn alert(&self, message: &str) {
        tracing::warn!("alert: {message}");
        eprintln!("[ALERT] {message}");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// collects alerts for assertions
    #[derive(Default)]
    pub(crate) struct RecordingAlerter {
        pub messages: Mutex<Vec<String>>,
    }

    impl Alerter for RecordingAlerter {
        fn alert(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn notices_accumulate_until_dismissed() {
        let notices = Notices::new();
        notices.alert("first");
        notices.alert("second");
        let pending = notices.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].message, "second");

        notices.dismiss();
        assert!(notices.pending().is_empty());
    }

    #[test]
    fn notices_are_bounded() {
        let notices = Notices::new();
        for i in 0..(MAX_NOTICES + 5) {
            notices.alert(&format!("n{i}"));
        }
        let pending = notices.pending();
        assert_eq!(pending.len(), MAX_NOTICES);
        assert_eq!(pending[0].message, "n5");
    }
}
