use crmlite_db::{DemoSeedDataset, SeedResult};

use crate::commands::{open_migrated, prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated(&config).await?;

        let seeded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 5u8))?;

        let outcome: Result<SeedResult, StepFailure> = if verification.all_present {
            Ok(seeded)
        } else {
            let failed: Vec<&str> = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect();
            Err(("seed_verification", verification_message(&failed), 5u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(seeded: &SeedResult) -> String {
    if seeded.skipped {
        return "customers already present; demo dataset not loaded".to_string();
    }
    format!(
        "demo dataset loaded: {} customers, {} follow-ups",
        seeded.customers_created, seeded.follow_ups_created
    )
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some demo customers failed to load".to_string()
    } else {
        format!("demo customers missing after seed: {}", failed.join(", "))
    }
}
