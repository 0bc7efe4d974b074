use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::customer::CustomerStatus;
use crate::domain::follow_up::ScheduledFollowUp;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub new: i64,
    pub contacted: i64,
    pub converted: i64,
    pub lost: i64,
}

impl StatusCounts {
    pub fn get(&self, status: CustomerStatus) -> i64 {
        match status {
            CustomerStatus::New => self.new,
            CustomerStatus::Contacted => self.contacted,
            CustomerStatus::Converted => self.converted,
            CustomerStatus::Lost => self.lost,
        }
    }

    pub fn set(&mut self, status: CustomerStatus, count: i64) {
        match status {
            CustomerStatus::New => self.new = count,
            CustomerStatus::Contacted => self.contacted = count,
            CustomerStatus::Converted => self.converted = count,
            CustomerStatus::Lost => self.lost = count,
        }
    }

    pub fn sum(&self) -> i64 {
        self.new + self.contacted + self.converted + self.lost
    }
}

/// Aggregate counts plus the follow-ups scheduled for the current local day.
///
/// Counts come from independent queries, so under concurrent writes
/// `status_counts.sum()` may differ from `total_customers`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_customers: i64,
    pub status_counts: StatusCounts,
    pub today_follow_ups: Vec<ScheduledFollowUp>,
    pub today_count: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}
