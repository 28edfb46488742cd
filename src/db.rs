use crate::error::AppError;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

pub async fn init_pool(database_url: &str, max_size: usize) -> Result<Pool, AppError> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e| AppError::Config(format!("DATABASE_URL: {e}")))?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );

    let pool = Pool::builder(manager)
        .max_size(max_size)
        .build()
        .map_err(|e| AppError::StartServer(format!("db pool: {e}")))?;

    crate::migrations::run_all(&pool).await?;
    tracing::info!(max_size, "database pool ready");
    Ok(pool)
}
