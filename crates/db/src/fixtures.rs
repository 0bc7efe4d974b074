use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::Serialize;
use tracing::info;

use crmlite_core::domain::customer::{CustomerInput, CustomerStatus};
use crmlite_core::domain::follow_up::FollowUpInput;
use crmlite_core::domain::timestamp::day_bounds;

use crate::connection::DbPool;
use crate::repositories::{
    CustomerRepository, FollowUpRepository, RepositoryError, SqlCustomerRepository,
    SqlFollowUpRepository,
};

struct DemoCustomer {
    name: &'static str,
    phone: &'static str,
    email: &'static str,
    address: &'static str,
    status: CustomerStatus,
    /// Follow-ups as (note, hours after local midnight today).
    follow_ups: &'static [(&'static str, i64)],
}

const DEMO_CUSTOMERS: &[DemoCustomer] = &[
    DemoCustomer {
        name: "Acme Corp",
        phone: "555-0101",
        email: "buyer@acme.example",
        address: "100 Industrial Way",
        status: CustomerStatus::New,
        follow_ups: &[("Intro call about annual plan", 10)],
    },
    DemoCustomer {
        name: "Globex Industries",
        phone: "555-0102",
        email: "ops@globex.example",
        address: "42 Harbor Road",
        status: CustomerStatus::Contacted,
        follow_ups: &[("Sent pricing sheet", -20), ("Review pricing questions", 15)],
    },
    DemoCustomer {
        name: "Initech LLC",
        phone: "555-0103",
        email: "it@initech.example",
        address: "9 Office Park",
        status: CustomerStatus::Converted,
        follow_ups: &[("Onboarding kickoff", 30)],
    },
    DemoCustomer {
        name: "Umbrella Supply",
        phone: "",
        email: "contact@umbrella.example",
        address: "",
        status: CustomerStatus::Lost,
        follow_ups: &[],
    },
];

/// Small deterministic dataset for demos and manual testing. Follow-up dates
/// are placed relative to the local day the seed runs so the dashboard has
/// something to show.
pub struct DemoSeedDataset;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub customers_created: usize,
    pub follow_ups_created: usize,
    /// Set when the store already held customers and nothing was written.
    pub skipped: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl DemoSeedDataset {
    pub fn customer_names() -> impl Iterator<Item = &'static str> {
        DEMO_CUSTOMERS.iter().map(|customer| customer.name)
    }

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        Self::load_at(pool, Local::now()).await
    }

    /// Seeds relative to `now`'s local day. Does nothing when any customer
    /// already exists.
    pub async fn load_at<Tz: TimeZone>(
        pool: &DbPool,
        now: DateTime<Tz>,
    ) -> Result<SeedResult, RepositoryError> {
        let customers = SqlCustomerRepository::new(pool.clone());
        let follow_ups = SqlFollowUpRepository::new(pool.clone());

        if customers.count(None).await? > 0 {
            info!(event_name = "crm.seed.skipped", "customers already present, seed skipped");
            return Ok(SeedResult { customers_created: 0, follow_ups_created: 0, skipped: true });
        }

        let (midnight, _) = day_bounds(&now);
        let mut result = SeedResult { customers_created: 0, follow_ups_created: 0, skipped: false };

        for demo in DEMO_CUSTOMERS {
            let customer = customers
                .create(
                    CustomerInput::new(demo.name, demo.phone, demo.email, demo.address)
                        .with_status(demo.status),
                )
                .await?;
            result.customers_created += 1;

            for (note, hours) in demo.follow_ups {
                let when: DateTime<Utc> = midnight + Duration::hours(*hours);
                let mut input = FollowUpInput::new(customer.id, *note, when);
                if *hours < 24 {
                    input = input.with_next_follow_up(when + Duration::days(7));
                }
                follow_ups.create(input).await?;
                result.follow_ups_created += 1;
            }
        }

        info!(
            event_name = "crm.seed.loaded",
            customers = result.customers_created,
            follow_ups = result.follow_ups_created,
            "demo dataset loaded"
        );
        Ok(result)
    }

    /// Checks that every demo customer is present by name.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(DEMO_CUSTOMERS.len());
        for demo in DEMO_CUSTOMERS {
            let present: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customer WHERE name = ?)")
                    .bind(demo.name)
                    .fetch_one(pool)
                    .await?;
            checks.push((demo.name, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}
