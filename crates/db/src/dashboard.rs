use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, info};

use crmlite_core::domain::customer::CustomerStatus;
use crmlite_core::domain::dashboard::{DashboardSummary, StatusCounts};
use crmlite_core::domain::timestamp::day_bounds;

use crate::repositories::{CustomerRepository, FollowUpRepository, RepositoryError};

/// Builds the landing-page summary from the customer and follow-up stores.
///
/// Each count is a separate read. No snapshot isolation is attempted, so a
/// status change racing with the summary can leave the per-status counts out
/// of step with the total.
pub struct DashboardAggregator<C: ?Sized, F: ?Sized> {
    customers: Arc<C>,
    follow_ups: Arc<F>,
}

impl<C, F> DashboardAggregator<C, F>
where
    C: CustomerRepository + ?Sized,
    F: FollowUpRepository + ?Sized,
{
    pub fn new(customers: Arc<C>, follow_ups: Arc<F>) -> Self {
        Self { customers, follow_ups }
    }

    pub async fn compute_summary(
        &self,
        now: DateTime<Local>,
    ) -> Result<DashboardSummary, RepositoryError> {
        self.compute_summary_at(now).await
    }

    /// Same as [`compute_summary`](Self::compute_summary) with "today" taken
    /// from `now`'s own time zone.
    pub async fn compute_summary_at<Tz: TimeZone>(
        &self,
        now: DateTime<Tz>,
    ) -> Result<DashboardSummary, RepositoryError> {
        let total_customers = self.customers.count(None).await?;

        let mut status_counts = StatusCounts::default();
        for status in CustomerStatus::ALL {
            status_counts.set(status, self.customers.count(Some(status)).await?);
        }

        let (window_start, window_end) = day_bounds(&now);
        let today_follow_ups =
            self.follow_ups.list_scheduled_between(window_start, window_end).await?;
        let today_count = today_follow_ups.len();

        if status_counts.sum() != total_customers {
            debug!(
                event_name = "crm.dashboard.counts_drifted",
                total_customers,
                status_sum = status_counts.sum(),
                "status counts changed while the summary was being computed"
            );
        }

        info!(
            event_name = "crm.dashboard.computed",
            total_customers,
            today_count,
            window_start = %window_start,
            window_end = %window_end,
            "dashboard summary computed"
        );

        Ok(DashboardSummary {
            total_customers,
            status_counts,
            today_follow_ups,
            today_count,
            window_start,
            window_end,
        })
    }
}
