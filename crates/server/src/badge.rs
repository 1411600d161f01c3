// Toolbar badge projection: new inventory entries win over alerts.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const NEW_EXTENSIONS_COLOR: &str = "#E76F51";
pub const ALERTS_COLOR: &str = "#D97706";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    pub color: String,
}

impl Badge {
    pub fn project(new_count: usize, alert_count: usize) -> Self {
        let (text, color) = if new_count > 0 {
            (new_count.to_string(), NEW_EXTENSIONS_COLOR)
        } else if alert_count > 0 {
            ("!".to_string(), ALERTS_COLOR)
        } else {
            (String::new(), NEW_EXTENSIONS_COLOR)
        };
        Self {
            text,
            color: color.to_string(),
        }
    }
}

/// Counters the badge is derived from, published after every write.
#[derive(Debug, Default)]
pub struct BadgeCounters {
    new_count: AtomicUsize,
    alert_count: AtomicUsize,
}

impl BadgeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_new_count(&self, count: usize) {
        self.new_count.store(count, Ordering::Relaxed);
    }

    pub fn set_alert_count(&self, count: usize) {
        self.alert_count.store(count, Ordering::Relaxed);
    }

    pub fn new_count(&self) -> usize {
        self.new_count.load(Ordering::Relaxed)
    }

    pub fn alert_count(&self) -> usize {
        self.alert_count.load(Ordering::Relaxed)
    }

    pub fn badge(&self) -> Badge {
        Badge::project(self.new_count(), self.alert_count())
    }
}
