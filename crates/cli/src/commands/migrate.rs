use careline_core::config::{AppConfig, LoadOptions};
use careline_db::{connect_with_settings, migrations, PoolSettings};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("migrate", "config", error.to_string(), 2),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure("migrate", "runtime", error.to_string(), 2),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            PoolSettings::new(config.database.max_connections, config.database.timeout_secs),
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("migration failed: {error}"))?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "all pending migrations applied"),
        Err(message) => CommandResult::failure("migrate", "migration", message, 1),
    }
}
