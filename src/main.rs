use exam_engine::{app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    log::info!(
        "Starting exam engine against database '{}'",
        config.mongo_db_name
    );

    let state = AppState::new(config).await?;
    state.health_check().await?;

    let now = chrono::Utc::now();
    let open = state.exam_service.list_available(now).await?;
    log::info!("Storage ready; {} exams currently open", open.len());

    Ok(())
}
