use std::sync::Arc;

use clap::Parser;
use tracing::info;

use owlly_agent::CompletionClient;
use owlly_core::OwllyConfig;
use owlly_discord::{AppContext, DiscordAdapter};
use owlly_sessions::{ModelCatalog, PersonaRegistry, Tiktoken};

#[derive(Parser)]
#[command(name = "owlly")]
#[command(
    about = "Discord bot relaying thread conversations to a chat completion API",
    long_about = None
)]
struct Cli {
    /// Path to owlly.toml
    #[arg(long, env = "OWLLY_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "owlly=info,owlly_discord=info,owlly_agent=info,owlly_sessions=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = OwllyConfig::load(cli.config.as_deref())?;

    // Broken persona or model files are fatal at startup; later reloads only
    // fail the event that hit them.
    let personas = PersonaRegistry::load(&config.files, &config.completion)?;
    let models = ModelCatalog::load(&config.files.models, &config.completion)?;
    info!(
        personas = personas.choices().len(),
        models = models.models().len(),
        guilds = config.discord.allowed_servers.len(),
        "configuration loaded"
    );

    let completion = CompletionClient::from_config(&config.completion);
    let app = Arc::new(AppContext::new(
        Arc::new(config),
        Arc::new(completion),
        Arc::new(Tiktoken::new()),
    ));

    let adapter = DiscordAdapter::new(app)?;
    info!("Owlly starting");
    adapter.run().await;
    Ok(())
}
