#![deny(clippy::all)]

mod annotate;
mod audio;
mod config;
mod display;
mod languages;
mod llm;
mod pipeline;
mod preferences;
mod session;
mod transcription;
mod translate;

use annotate::{Annotate, LlmAnnotator};
use clap::Parser;
use languages::LanguagePair;
use llm::LlmClient;
use pipeline::Pipeline;
use session::SessionController;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};
use translate::{LlmTranslator, Translate};

/// Live microphone translation with cultural-context notes
#[derive(Debug, Parser)]
#[command(name = "lingolive", version, about)]
struct Cli {
    /// Source language code (defaults to the stored preference)
    #[arg(short = 'f', long = "from")]
    from: Option<String>,

    /// Target language code (defaults to the stored preference)
    #[arg(short = 't', long = "to")]
    to: Option<String>,

    /// List supported language codes and exit
    #[arg(long)]
    list_languages: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading secrets; missing file is fine
    dotenvy::dotenv().ok();

    // Initialize tracing for structured logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if cli.list_languages {
        for language in languages::SUPPORTED_LANGUAGES {
            println!("{:8} {}", language.code, language.name);
        }
        return Ok(());
    }

    let settings = config::load_settings()?;
    let secrets = config::Secrets::from_env()?;

    let source = cli
        .from
        .unwrap_or_else(preferences::default_source_language);
    let target = cli.to.unwrap_or_else(preferences::default_target_language);
    let languages = LanguagePair::new(&source, &target)?;
    if let Err(e) = preferences::remember_language_pair(&languages) {
        warn!("Failed to store language preference: {}", e);
    }

    // Construct service clients up front; the pipeline only sees the traits
    let llm = Arc::new(LlmClient::new(
        &settings.language_model,
        secrets.fireworks_api_key,
    )?);
    let translator: Arc<dyn Translate> = Arc::new(LlmTranslator::new(llm.clone()));
    let annotator: Arc<dyn Annotate> = Arc::new(LlmAnnotator::new(llm));

    let pipeline = Arc::new(Pipeline::new(languages.clone(), translator, annotator));
    let controller = Arc::new(SessionController::new(
        settings.recognition,
        secrets.deepgram_api_key,
        pipeline.clone(),
    ));

    display::print_header(&languages);
    let _display_task = display::spawn_display(&pipeline);

    run_control_loop(&controller).await?;

    controller.stop_listening();
    display::print_summary(&pipeline.state());
    info!("Session ended");
    Ok(())
}

/// Read control input: an empty line toggles listening, 'q' quits
async fn run_control_loop(controller: &Arc<SessionController>) -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "q" | "quit" => break,
            "" => {
                if controller.is_listening() {
                    controller.stop_listening();
                    display::print_listening(false);
                } else {
                    match controller.clone().start_listening() {
                        Ok(()) => display::print_listening(true),
                        Err(e) => eprintln!("Could not start listening: {e}"),
                    }
                }
            }
            other => {
                println!("Unrecognized input '{other}' (Enter toggles listening, 'q' quits)");
            }
        }
    }
    Ok(())
}
