// Shopping Concierge
// Main entry point for the concierge binary

use clap::Parser;
use concierge_engine::cli::{Cli, Command, ConfigAction, PreferencesAction};
use concierge_engine::config::Config;
use concierge_engine::handlers::{
    handle_config_path, handle_config_show, handle_doctor, handle_preferences_forget,
    handle_preferences_show, handle_shop, OutputFormat,
};
use concierge_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };

    // `config path` must work even when the file is broken
    if let Command::Config {
        action: ConfigAction::Path,
    } = &cli.command
    {
        return handle_config_path(&config_path, format);
    }

    let config = if cli.config.is_some() {
        Config::load_from_path(&config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::debug!(
        "Concierge v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match cli.command {
        Command::Shop { topic, session } => {
            let topic = Command::topic(&topic);
            tracing::info!("Shopping for '{}' (session '{}')", topic, session);
            handle_shop(topic, session, &config, format).await
        }

        Command::Preferences { action } => match action {
            PreferencesAction::Show { session } => {
                handle_preferences_show(&session, &config, format).await
            }
            PreferencesAction::Forget { session } => {
                handle_preferences_forget(&session, &config, format).await
            }
        },

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(&config_path, format),
        },

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
