//! Reporting window anchored to a caller-supplied instant.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub days: Option<u32>,
    pub as_of: DateTime<Utc>,
}

impl Period {
    /// `days` of `None` or `Some(0)` selects the whole history.
    pub fn new(days: Option<u32>, as_of: DateTime<Utc>) -> Self {
        Period {
            days: days.filter(|&d| d > 0),
            as_of,
        }
    }

    /// First instant inside the window, if the window is bounded.
    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.days.map(|d| self.as_of - Duration::days(i64::from(d)))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        match self.cutoff() {
            Some(cutoff) => at >= cutoff && at <= self.as_of,
            None => true,
        }
    }
}
