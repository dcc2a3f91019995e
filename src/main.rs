use userstore::db::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "userstore=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;
    app_state.migrate().await?;

    tracing::info!(
        max_connections = app_state.config.db.max_connections,
        query_timeout_secs = app_state.config.db.query_timeout_secs,
        "user store schema up to date"
    );
    Ok(())
}
