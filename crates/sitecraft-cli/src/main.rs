use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    if let Err(err) = sitecraft_cli::run_from_env().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
