use std::path::PathBuf;

// Entry point for `cargo run -p web-server`: serves the dashboard API using
// `config.toml` and `INDEX__*` overrides.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = configuration::load_config(&PathBuf::from("config.toml"))?;
    let _guard = configuration::init_tracing(&config.logging)?;
    web_server::run_server(&config.storage.database_path, config.server.bind_addr).await
}
