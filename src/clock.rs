use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

use crate::models::{TrackedSession, TrackerStatus};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock { now: Mutex::new(start) }
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub status: TrackerStatus,
    pub total_seconds: u64,
    pub taken_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn zero(now: DateTime<Utc>) -> Self {
        Checkpoint {
            status: TrackerStatus::Paused,
            total_seconds: 0,
            taken_at: now,
        }
    }

    pub fn from_session(session: &TrackedSession, now: DateTime<Utc>) -> Self {
        Checkpoint {
            status: session.status,
            total_seconds: session.total_seconds,
            taken_at: now,
        }
    }

    pub fn seconds_at(&self, now: DateTime<Utc>) -> u64 {
        match self.status {
            TrackerStatus::Active => {
                let elapsed = now.signed_duration_since(self.taken_at).num_seconds().max(0);
                self.total_seconds.saturating_add(elapsed as u64)
            }
            TrackerStatus::Paused => self.total_seconds,
        }
    }
}
