use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};

use crmlite_db::migrations;
use crmlite_db::repositories::{
    CustomerRepository, FollowUpRepository, SqlCustomerRepository, SqlFollowUpRepository,
};
use crmlite_db::{connect_with_settings, DashboardAggregator, DemoSeedDataset};

#[tokio::test]
async fn seeded_store_drives_the_dashboard() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");

    let now = FixedOffset::west_opt(5 * 3600)
        .expect("offset")
        .with_ymd_and_hms(2024, 11, 3, 9, 0, 0)
        .single()
        .expect("now");
    let seeded = DemoSeedDataset::load_at(&pool, now).await.expect("seed");
    assert_eq!(seeded.customers_created, DemoSeedDataset::customer_names().count());

    let customers: Arc<dyn CustomerRepository> =
        Arc::new(SqlCustomerRepository::new(pool.clone()));
    let follow_ups: Arc<dyn FollowUpRepository> = Arc::new(SqlFollowUpRepository::new(pool));
    let aggregator = DashboardAggregator::new(customers, follow_ups);

    let summary = aggregator.compute_summary_at(now).await.expect("summary");

    assert_eq!(summary.total_customers, 4);
    assert_eq!(summary.status_counts.sum(), summary.total_customers);
    // Two seeded follow-ups fall on the seed day; the others are yesterday and tomorrow.
    assert_eq!(summary.today_count, 2);
    let names: Vec<_> =
        summary.today_follow_ups.iter().map(|item| item.customer_name.as_str()).collect();
    assert!(names.contains(&"Acme Corp"));
    assert!(names.contains(&"Globex Industries"));
}

#[tokio::test]
async fn deleting_a_seeded_customer_removes_its_follow_ups() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoSeedDataset::load(&pool).await.expect("seed");

    let customers = SqlCustomerRepository::new(pool.clone());
    let follow_ups = SqlFollowUpRepository::new(pool);

    let globex = customers
        .list(None)
        .await
        .expect("list")
        .into_iter()
        .find(|customer| customer.name == "Globex Industries")
        .expect("seeded customer");

    let removed = customers.delete(globex.id).await.expect("delete");
    assert_eq!(removed, 2);
    assert!(follow_ups.list_by_customer(globex.id).await.is_err());
    assert_eq!(FollowUpRepository::count(&follow_ups).await.expect("count"), 2);
}
