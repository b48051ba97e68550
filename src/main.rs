use std::{env, sync::Arc};

use colored::Colorize;
use hala_live::{Database, DatabaseError, Hala, MemoryDatabase, PgDatabase};
use log::{error, info, warn};
use thiserror::Error;

mod logging;

#[derive(Debug, Error)]
enum HalaError {
    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),
}

impl HalaError {
    fn hint(&self) -> String {
        match self {
            HalaError::Database(_) => "This is a database error. Make sure the Postgres instance is reachable at HALA_DATABASE_URL, then try again.".to_string(),
        }
    }
}

async fn start() -> Result<(), HalaError> {
    match env::var("HALA_DATABASE_URL") {
        Ok(url) => {
            info!("Connecting to database...");

            let database = PgDatabase::new(&url).await?;
            database.migrate().await?;

            boot(database).await
        }
        Err(_) => {
            warn!("HALA_DATABASE_URL is not set, state will not survive a restart");
            boot(MemoryDatabase::default()).await
        }
    }
}

async fn boot(database: impl Database) -> Result<(), HalaError> {
    let hala = Hala::new(database).await?;

    info!("Initialized successfully.");
    hala_server::run_server(Arc::new(hala)).await;

    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init_logger();

    if let Err(error) = start().await {
        error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Hala failed to start!".bold().red());
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint()).bright_black().italic()
        );
    }
}
