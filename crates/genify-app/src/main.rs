//! Genify application binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Initialize tracing on stderr
//! 3. Build the provider gateway from the environment credential
//! 4. Run the interactive session

mod cli;
mod render;
mod repl;

use clap::Parser;

use genify_chat::{
    ChatOrchestrator, Credential, GeminiTransport, InsightRequestBuilder, ProviderGateway,
    UnsupportedSpeech, VoiceInterface,
};
use genify_core::GenifyConfig;

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = GenifyConfig::load_or_default(&config_file);
    if let Some(ref model) = args.model {
        config.provider.model = model.clone();
    }

    // Tracing. RUST_LOG wins over the flag and the config file.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Genify v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Provider.
    let credential = Credential::from_env(&config.provider.api_key_env);
    let transport = GeminiTransport::new(&config.provider)?;
    tracing::info!(
        model = transport.model(),
        key_env = %config.provider.api_key_env,
        "Provider gateway ready"
    );
    let gateway = ProviderGateway::new(transport, credential);

    // Session.
    let orchestrator = ChatOrchestrator::new(
        gateway,
        InsightRequestBuilder::new(config.provider.temperature),
    );
    let voice = VoiceInterface::new(UnsupportedSpeech);

    repl::run(&orchestrator, &voice).await?;

    tracing::info!("Genify stopped");
    Ok(())
}
