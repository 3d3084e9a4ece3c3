use deskbook_db::DbPool;

use crate::commands::{build_runtime, load_config, open_store, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let pool = match open_store(&config).await {
            Ok(pool) => pool,
            Err(failure) => return failure.into_result("migrate"),
        };
        let applied = applied_migrations(&pool).await;
        pool.close().await;

        match applied {
            Ok(count) => CommandResult::success(
                "migrate",
                format!("schema up to date ({count} migrations applied)"),
            ),
            Err(error) => CommandResult::failure("migrate", "migration", error.to_string(), 5),
        }
    })
}

async fn applied_migrations(pool: &DbPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
}
