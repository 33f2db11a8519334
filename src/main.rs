use std::sync::Arc;

use card_bot::cards::TemplateRegistry;
use card_bot::config::BotConfig;
use card_bot::dispatcher::{ActivityDispatcher, DispatcherDeps};
use card_bot::outbound::ConnectorClient;
use card_bot::search::NpmSearchClient;
use card_bot::server::bot_routes;
use card_bot::side_effect::{BrowserOpener, LoggingRunner, SideEffectRunner};
use card_bot::state::LikeStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🤖 Card Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Endpoint: http://0.0.0.0:{}/api/messages", config.port);
    eprintln!("   Search: {}", config.search_endpoint);
    eprintln!("   Like scope: {}", config.like_scope);

    // ── Templates ────────────────────────────────────────────────────────
    let mut templates = TemplateRegistry::builtin();
    if let Some(dir) = &config.template_dir {
        let loaded = templates.load_dir(dir)?;
        eprintln!("   Templates: {} loaded from {}", loaded, dir.display());
    }

    // ── Collaborators ────────────────────────────────────────────────────
    let side_effects: Arc<dyn SideEffectRunner> = if config.open_urls {
        eprintln!("   URLs: opened in browser");
        Arc::new(BrowserOpener)
    } else {
        eprintln!("   URLs: logged only");
        Arc::new(LoggingRunner)
    };

    let dispatcher = Arc::new(ActivityDispatcher::new(DispatcherDeps {
        templates: Arc::new(templates),
        likes: Arc::new(LikeStore::new(config.like_scope)),
        search: Arc::new(NpmSearchClient::new(
            config.search_endpoint.clone(),
            config.search_timeout,
        )),
        sink: Arc::new(ConnectorClient::new(config.connector_token.clone())),
        google_url: config.google_url.clone(),
        web_url: config.web_url.clone(),
    }));

    let app = bot_routes(dispatcher, side_effects);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Bot endpoint started");
    axum::serve(listener, app).await?;

    Ok(())
}
