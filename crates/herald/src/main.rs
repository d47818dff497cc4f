use std::sync::Arc;

use herald_core::{config::Config, store::JsonFileStore};

#[tokio::main]
async fn main() -> Result<(), herald_core::Error> {
    herald_core::logging::init("herald")?;

    let cfg = Arc::new(Config::load()?);

    let store = Arc::new(JsonFileStore::open(cfg.store_path.clone()).await?);

    herald_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| herald_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
