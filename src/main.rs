use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voice_companion::voice::{Synthesizer, VoiceSettings};
use voice_companion::{CharacterRegistry, Config, Daemon};

/// Companion - talk with a character, out loud
#[derive(Parser)]
#[command(name = "companion", version, about)]
struct Cli {
    /// Port to listen on (overrides the config file)
    #[arg(long, env = "COMPANION_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// List the built-in characters
    Characters,
    /// Synthesize a line of text to an MP3 file
    Speak {
        /// Text to speak
        text: String,
        /// Voice to use instead of the configured default
        #[arg(long)]
        voice: Option<String>,
        /// Where to write the audio
        #[arg(short, long, default_value = "speech.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,voice_companion=info",
        1 => "info,voice_companion=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Characters => list_characters(&config),
        Command::Speak {
            text,
            voice,
            output,
        } => speak(&config, &text, voice.as_deref(), &output).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        default_character = %config.default_character,
        "starting companion"
    );
    tracing::debug!(?config, "loaded configuration");

    Daemon::new(config).run().await?;
    Ok(())
}

fn list_characters(config: &Config) -> anyhow::Result<()> {
    let registry = CharacterRegistry::builtin_with_default(&config.default_character)?;
    let default_key = &registry.default_character().key;

    for character in registry.iter() {
        let marker = if &character.key == default_key { "*" } else { " " };
        println!("{marker} {:<12} {}", character.key, character.display_name);
    }
    Ok(())
}

async fn speak(
    config: &Config,
    text: &str,
    voice: Option<&str>,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    let synthesizer = Daemon::synthesizer(config, Daemon::http_client()?)?;
    let voice_id = voice.unwrap_or(&config.voice.default_voice_id);

    println!("Synthesizing with {} (voice {voice_id})...", synthesizer.name());
    let audio = synthesizer
        .synthesize(text, voice_id, VoiceSettings::COMPANION)
        .await?;

    tokio::fs::write(output, &audio).await?;
    println!("Wrote {} bytes to {}", audio.len(), output.display());
    Ok(())
}
