//! Interactive session with a completion engine.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! colloquy
//!
//! # Start with a different model and a longer response limit
//! colloquy --model sonnet --lim 2048
//!
//! # Write logs and artifacts somewhere else, without colors
//! colloquy --log-dir /tmp/conv --artifact-dir /tmp/artifacts --no-color
//! ```
//!
//! # Commands
//!
//! Commands go at the start of a line and may be followed by a prompt:
//! - `import <path>[,<path>...]` - Attach files
//! - `model <key>` - Change the model
//! - `lim <n>` - Set the response limit
//! - `help` - Show available commands
//! - `exit`, `quit`, `thanks`, `thank you` - End the session

use arrrg::CommandLine;
use futures::StreamExt;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::UtcOffset;
use tracing_subscriber::EnvFilter;

use colloquy::{
    AnthropicEngine, ArtifactExtractor, ChatArgs, CompletionEngine, CommandInterpreter,
    ConversationSession, Interpretation, PlainTextRenderer, Renderer, SessionConfig,
    StreamingResponseCollector,
};

/// Main entry point for the colloquy application.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The local offset can only be read while this is the sole thread.
    let local_offset = UtcOffset::current_local_offset();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let utc_offset = local_offset.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "local offset unavailable; naming logs in UTC");
        UtcOffset::UTC
    });
    let (args, _) = ChatArgs::from_command_line_relaxed("colloquy [OPTIONS]");
    let config = SessionConfig::from(args).with_utc_offset(utc_offset);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

/// Run the read-interpret-respond loop until the user quits.
async fn run(config: SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = AnthropicEngine::new(None)?;
    let mut session = ConversationSession::new(&config, engine.models().clone())?;
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let interpreter = CommandInterpreter::new();
    let collector = StreamingResponseCollector::new(&engine);
    let extractor = ArtifactExtractor::new();
    let mut rl = DefaultEditor::new()?;

    println!("colloquy (model: {})", session.model_id());
    println!("Type help for commands, exit to quit\n");

    loop {
        match rl.readline("How can I help you today? ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                let prompt = match interpreter.interpret(&mut session, &line, &mut renderer) {
                    Interpretation::Quit => break,
                    Interpretation::Prompt(prompt) => prompt,
                };
                if prompt.is_empty() {
                    continue;
                }
                exchange(
                    &collector,
                    &mut session,
                    &prompt,
                    &extractor,
                    &config,
                    &mut renderer,
                )
                .await;
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    match session.flush_log() {
        Ok(path) => renderer.print_saved("Conversation log", &path),
        Err(err) => renderer.print_error(&err.to_string()),
    }
    println!("Goodbye!");
    Ok(())
}

/// Stream one response, then save any code artifacts it contains.
///
/// Engine failures are reported and the session continues.
async fn exchange(
    collector: &StreamingResponseCollector<'_>,
    session: &mut ConversationSession,
    prompt: &str,
    extractor: &ArtifactExtractor,
    config: &SessionConfig,
    renderer: &mut dyn Renderer,
) {
    let mut stream = collector.stream(session, prompt);
    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(text) => renderer.print_text(&text),
            Err(err) => {
                renderer.finish_response();
                renderer.print_error(&err.to_string());
            }
        }
    }
    if !stream.is_committed() {
        return;
    }
    renderer.finish_response();
    let text = stream.into_accumulated();
    match extractor.extract(&text, &config.artifact_dir) {
        Ok(artifacts) => {
            for artifact in artifacts {
                renderer.print_saved(&format!("{} artifact", artifact.tag), &artifact.path);
            }
        }
        Err(err) => renderer.print_error(&err.to_string()),
    }
}
