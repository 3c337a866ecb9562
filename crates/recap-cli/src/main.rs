//! Recap CLI - group chat summarization bot

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use recap_core::bot::Bot;
use recap_core::config::Config;
use recap_core::ids::ParticipantId;
use recap_core::llm::LlmClient;
use recap_core::nickname::NicknameRepository;
use recap_core::storage::Database;
use recap_core::transport::TelegramTransport;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "recap")]
#[command(author, version, about = "Group chat summarization bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot until interrupted
    Run,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect and edit stored nicknames
    Nickname {
        #[command(subcommand)]
        action: NicknameAction,
    },

    /// Check system health
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[derive(Subcommand)]
enum NicknameAction {
    /// Show a participant's nickname
    Get { participant: i64 },
    /// Set a participant's nickname
    Set { participant: i64, name: String },
    /// Remove a participant's nickname
    Clear { participant: i64 },
    /// List stored nicknames
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("recap=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => cmd_run().await,
        Commands::Config { action } => cmd_config(action, cli.quiet),
        Commands::Nickname { action } => cmd_nickname(action, cli.quiet).await,
        Commands::Doctor => cmd_doctor(cli.quiet).await,
    };

    if let Err(e) = &result
        && let Some(suggestion) = e.downcast_ref::<recap_core::Error>().and_then(|e| e.suggestion())
    {
        eprintln!("Hint: {}", suggestion);
    }
    result
}

async fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = config.database_path()?;
    Database::open(&path)
        .await
        .with_context(|| format!("Failed to open nickname database at {}", path.display()))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_run() -> anyhow::Result<()> {
    let config = Config::load()?;

    let api_key = config.llm.resolved_api_key()?.ok_or_else(|| {
        anyhow::anyhow!("API key not configured. Set RECAP_OPENAI_API_KEY or OPENAI_API_KEY.")
    })?;
    let token = config.bot.resolved_token()?.ok_or_else(|| {
        anyhow::anyhow!("Bot token not configured. Set RECAP_TELEGRAM_TOKEN or TELEGRAM_BOT_TOKEN.")
    })?;

    let db = open_database(&config).await?;
    let client = LlmClient::new(config.llm.clone(), api_key)?;

    let transport = TelegramTransport::new(token).with_polling_timeout(config.bot.polling_timeout_secs);
    transport
        .identify()
        .await
        .context("Failed to connect to Telegram")?;

    let bot = Bot::from_config(&config, db.clone(), Arc::new(client), Arc::new(transport));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                cancel.cancel();
            }
        });
    }

    info!(model = %config.llm.model, "Bot is running");
    bot.run(cancel).await;

    db.close().await;
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_nickname(action: NicknameAction, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let db = open_database(&config).await?;
    let repo = NicknameRepository::new(&db);

    match action {
        NicknameAction::Get { participant } => match repo.get(ParticipantId(participant)).await? {
            Some(name) => println!("{}", name),
            None => {
                if !quiet {
                    println!("No nickname set for {}", participant);
                }
            }
        },
        NicknameAction::Set { participant, name } => {
            let stored = repo.set(ParticipantId(participant), &name).await?;
            if !quiet {
                println!("Nickname for {} set to '{}'", participant, stored);
            }
        }
        NicknameAction::Clear { participant } => {
            repo.clear(ParticipantId(participant)).await?;
            if !quiet {
                println!("Nickname for {} cleared", participant);
            }
        }
        NicknameAction::List => {
            let records = repo.list().await?;
            if records.is_empty() {
                if !quiet {
                    println!("No nicknames stored.");
                }
            } else {
                for record in records {
                    println!(
                        "{}\t{}\t{}",
                        record.participant_id,
                        record.nickname.as_deref().unwrap_or("-"),
                        record.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
    }

    db.close().await;
    Ok(())
}

async fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Recap Health Check");
        println!("==================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            config
        }
        Err(e) => {
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
                println!();
                println!("Some checks failed. See above for details.");
            }
            return Ok(());
        }
    };

    // Check API key
    match config.llm.redacted_api_key() {
        Ok(Some(redacted)) => {
            if !quiet {
                println!("[OK] API Key: Configured ({})", redacted);
            }
        }
        Ok(None) => {
            all_ok = false;
            if !quiet {
                warn!("API Key: Not configured");
                println!("[!!] API Key: Not configured");
                println!("     Set RECAP_OPENAI_API_KEY or OPENAI_API_KEY environment variable");
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] API Key: Error - {}", e);
            }
        }
    }

    // Check bot token
    match config.bot.resolved_token() {
        Ok(Some(_)) => {
            if !quiet {
                println!("[OK] Bot Token: Configured");
            }
        }
        Ok(None) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Bot Token: Not configured");
                println!("     Set RECAP_TELEGRAM_TOKEN or TELEGRAM_BOT_TOKEN environment variable");
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Bot Token: Error - {}", e);
            }
        }
    }

    // Check config file location
    if !quiet {
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
    }

    // Check database
    match open_database(&config).await {
        Ok(db) => {
            match db.health_check().await {
                Ok(()) => {
                    if !quiet {
                        println!("[OK] Database: Connected");
                        println!("     Path: {}", db.path().display());
                    }
                    match db.migration_status().await {
                        Ok(status) if status.needs_migration => {
                            all_ok = false;
                            if !quiet {
                                println!(
                                    "[!!] Database: Migrations pending (v{} -> v{})",
                                    status.current_version, status.target_version
                                );
                            }
                        }
                        Ok(status) => {
                            if !quiet {
                                println!("[OK] Database: Schema v{}", status.current_version);
                            }
                        }
                        Err(e) => {
                            all_ok = false;
                            if !quiet {
                                println!("[!!] Database: Migration check failed - {}", e);
                            }
                        }
                    }
                    let stored = NicknameRepository::new(&db).list().await.map(|r| r.len());
                    if !quiet && let Ok(count) = stored {
                        println!("     Nicknames: {}", count);
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Database: Health check failed - {}", e);
                    }
                }
            }
            db.close().await;
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Database: Failed to initialize - {:#}", e);
            }
        }
    }

    // Summary
    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}
