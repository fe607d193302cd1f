use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

use xero_gateway::{
    adapter::XeroAdapter,
    auth::{TokenSet, TokenStore},
    config,
    routes::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Check if interactive setup is needed (no .env and missing required values)
    if config::needs_interactive_setup() {
        let interactive_config = config::run_interactive_setup()?;

        // Set environment variables from interactive config so Config::load() can use them
        std::env::set_var("PROXY_API_KEY", &interactive_config.proxy_api_key);
        std::env::set_var("XERO_CLIENT_ID", &interactive_config.client_id);
        std::env::set_var("XERO_CLIENT_SECRET", &interactive_config.client_secret);
        std::env::set_var("XERO_REDIRECT_URI", &interactive_config.redirect_uri);
        std::env::set_var("SERVER_PORT", &interactive_config.server_port);
    }

    // Load configuration first (for log level)
    let config = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Xero Gateway starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    // Open token store and load any previously granted token
    tracing::info!("Opening token store: {}", config.token_db_file.display());
    let token_store = Arc::new(TokenStore::open(&config.token_db_file)?);
    let stored_token = load_stored_token(&token_store);

    let mut adapter = XeroAdapter::with_options(
        config.credentials(),
        stored_token.clone(),
        config.client_options(),
    )?;

    // Initialize Xero client - fail fast if discovery is unreachable
    tracing::info!("Initializing Xero client...");
    if let Err(e) = adapter.init_client().await {
        tracing::error!("Failed to initialize Xero client: {}", e);
        tracing::error!("Troubleshooting steps:");
        tracing::error!("   1. Check your network connection");
        tracing::error!("   2. Verify XERO_IDENTITY_URL ({})", config.xero_identity_url);
        anyhow::bail!("Startup failed: Unable to reach Xero identity service");
    }

    match adapter.token_set() {
        Some(token) => {
            if stored_token.as_ref() != Some(token) {
                token_store.save(token)?;
            }
            tracing::info!(
                "Connected to Xero with {} tenant(s)",
                adapter.tenants().len()
            );
        }
        None => {
            tracing::warn!(
                "No Xero token stored - open http://{}:{}/connect to authorize",
                config.server_host,
                config.server_port
            );
        }
    }

    let app_state = AppState {
        proxy_api_key: config.proxy_api_key.clone(),
        adapter: Arc::new(Mutex::new(adapter)),
        token_store,
    };

    let app = routes::build_app(app_state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    print_startup_banner(&config);

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Load the persisted token; an invalid document is discarded
fn load_stored_token(store: &TokenStore) -> Option<TokenSet> {
    match store.load() {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!("Ignoring stored token: {:#}", e);
            if let Err(e) = store.clear() {
                tracing::error!("Failed to clear stored token: {:#}", e);
            }
            None
        }
    }
}

/// Print startup banner
fn print_startup_banner(config: &config::Config) {
    println!();
    println!("  Xero Gateway");
    println!("  Version:      {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:       http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Redirect URI: {}", config.xero_redirect_uri);
    println!("  Token store:  {}", config.token_db_file.display());
    println!("  Log Level:    {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
