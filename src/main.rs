//! Escape Gate CLI
//!
//! Usage:
//!   escape_gate                                  # Interactive terminal game
//!   escape_gate --serve                          # HTTP + WebSocket server
//!   escape_gate --script demo.json --offline     # Replay scripted predictions
//!   escape_gate --config game.json --json        # Config file, JSON status lines

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use escape_gate::config::{GameConfig, Profile, VoiceConfig};
use escape_gate::core::{
    run_server, CaptureSource, ClassifierLoader, GameController, GameHandle, GameRunner, NoVoice,
    ReplayLoader, ReplayScript, SyntheticCapture, TerminalPresenter, VoiceAssistant, VoiceNotifier,
    Vocabulary,
};
use escape_gate::types::{GameError, GameOutput, GameState};
use escape_gate::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "escape_gate",
    version = VERSION,
    about = "Escape Gate - show the secret key pose to open the door",
    long_about = "Escape Gate is a secret-door escape room game.\n\n\
                  A camera feed is classified pose by pose; the \"correct key\"\n\
                  pose opens the gate and reveals the hallway behind it.\n\n\
                  Terminal commands:\n  \
                  start   Press the start button\n  \
                  k       Show the correct key (keyboard fallback)\n  \
                  x       Show a wrong key\n  \
                  open    Force the gate open\n  \
                  status  Print the current state\n  \
                  quit    Leave the game\n\n\
                  States:\n  \
                  IDLE                - Waiting for start\n  \
                  AWAITING_PERMISSION - Camera requested\n  \
                  ACTIVE              - Watching for the key\n  \
                  OPENING             - Gate animation playing\n  \
                  REVEALED            - Hallway visible, game over"
)]
struct Args {
    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// JSON config file
    #[arg(short, long)]
    config: Option<String>,

    /// Model base URL or local directory (model.json + metadata.json)
    #[arg(short, long)]
    model: Option<String>,

    /// Replay script of classifier results (JSON)
    #[arg(long)]
    script: Option<String>,

    /// Skip fetching the model; use the configured labels as vocabulary
    #[arg(long)]
    offline: bool,

    /// Lenient profile: 0.80 threshold for both outcomes
    #[arg(long)]
    lenient: bool,

    /// Simulate a refused camera permission
    #[arg(long)]
    deny_camera: bool,

    /// Voice assistant public key
    #[arg(long, requires = "voice_assistant")]
    voice_key: Option<String>,

    /// Voice assistant identifier
    #[arg(long, requires = "voice_key")]
    voice_assistant: Option<String>,

    /// Voice assistant webhook endpoint
    #[arg(long)]
    voice_endpoint: Option<String>,

    /// Output status as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Debug logging (per-tick candidates)
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    let loader = match build_loader(&args, &config) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("Script error: {}", e);
            std::process::exit(1);
        }
    };

    let source: Arc<dyn CaptureSource> = if args.deny_camera {
        Arc::new(SyntheticCapture::denying())
    } else {
        Arc::new(SyntheticCapture::granting())
    };
    let voice = build_voice(&config);

    if args.serve {
        run_serve(&args, config, source, loader, voice).await;
    } else {
        run_interactive(&args, config, source, loader, voice).await;
    }
}

/// Install the tracing subscriber; RUST_LOG wins over --verbose
fn init_logging(verbose: bool) {
    let default = if verbose { "escape_gate=debug" } else { "escape_gate=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file, then CLI overrides
fn build_config(args: &Args) -> Result<GameConfig, GameError> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if args.lenient {
        config.matcher.profile = Profile::Lenient;
    }
    if let (Some(public_key), Some(assistant_id)) = (&args.voice_key, &args.voice_assistant) {
        config.voice = Some(VoiceConfig {
            public_key: public_key.clone(),
            assistant_id: assistant_id.clone(),
            endpoint: args.voice_endpoint.clone(),
        });
    }
    config.validate()?;
    Ok(config)
}

fn build_loader(args: &Args, config: &GameConfig) -> Result<Arc<dyn ClassifierLoader>, GameError> {
    let script = match &args.script {
        Some(path) => ReplayScript::load(path)?,
        None => ReplayScript::default(),
    };
    let vocabulary = if args.offline {
        let labels = config
            .matcher
            .correct_labels
            .iter()
            .take(1)
            .chain(config.matcher.incorrect_labels.iter().take(1))
            .cloned()
            .collect();
        Vocabulary::Fixed(labels)
    } else {
        Vocabulary::FromModel
    };
    Ok(Arc::new(ReplayLoader::new(vocabulary, script)))
}

/// Voice assistant when configured; a bad voice config only disables voice
fn build_voice(config: &GameConfig) -> Arc<dyn VoiceNotifier> {
    match &config.voice {
        Some(voice) => match VoiceAssistant::new(voice.clone()) {
            Ok(assistant) => {
                let _ = assistant.spawn_event_log();
                Arc::new(assistant)
            }
            Err(e) => {
                warn!(error = %e, "voice assistant disabled");
                Arc::new(NoVoice)
            }
        },
        None => Arc::new(NoVoice),
    }
}

/// Interactive terminal game
async fn run_interactive(
    args: &Args,
    config: GameConfig,
    source: Arc<dyn CaptureSource>,
    loader: Arc<dyn ClassifierLoader>,
    voice: Arc<dyn VoiceNotifier>,
) {
    let presenter = Arc::new(TerminalPresenter::new(args.no_color));
    let controller = GameController::new(config, presenter, voice);
    let (runner, handle) = GameRunner::new(controller, source, loader);
    let runner_task = runner.spawn();

    print_header(args.no_color);
    println!("Commands: start | k (correct key) | x (wrong key) | open | status | quit");
    println!();

    let printer = tokio::spawn(print_outputs(handle.clone(), args.json, args.no_color));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sent = match line.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "start" | "s" => handle.start().await,
            "k" | "key" => handle.simulate_key(true).await,
            "x" | "wrong" => handle.simulate_key(false).await,
            "open" => handle.force_open().await,
            "status" => {
                print_output(&handle.status(), args.json, args.no_color);
                Ok(())
            }
            other => {
                println!("Unknown command '{}'", other);
                Ok(())
            }
        };
        if let Err(e) = sent {
            error!(error = %e, "command not delivered");
            break;
        }
    }

    handle.stop();
    let final_output = match runner_task.await {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "game runner panicked");
            handle.status()
        }
    };
    printer.abort();
    println!();
    println!(
        "Session ended. State: {} | correct keys: {} | wrong keys: {}",
        final_output.state, final_output.correct_attempts, final_output.incorrect_attempts
    );
}

/// Print every published output
async fn print_outputs(handle: GameHandle, json: bool, no_color: bool) {
    let mut rx = handle.subscribe();
    while rx.changed().await.is_ok() {
        let output = rx.borrow_and_update().clone();
        print_output(&output, json, no_color);
        if output.state == GameState::Revealed {
            println!("Type 'quit' to leave.");
        }
    }
}

fn print_output(output: &GameOutput, json: bool, no_color: bool) {
    if json {
        println!("{}", serde_json::to_string(output).unwrap_or_default());
    } else if no_color {
        println!("{}", output.to_parseable_string());
    } else {
        println!("{}", output.to_terminal_string());
    }
}

/// Print header
fn print_header(no_color: bool) {
    if no_color {
        println!("========================================");
        println!("  Escape Gate v{} - The Secret Door", VERSION);
        println!("========================================");
    } else {
        println!("\x1b[1m╔══════════════════════════════════════╗\x1b[0m");
        println!("\x1b[1m║  Escape Gate v{} - The Secret Door ║\x1b[0m", VERSION);
        println!("\x1b[1m╚══════════════════════════════════════╝\x1b[0m");
    }
    println!();
}

/// Run HTTP API server
async fn run_serve(
    args: &Args,
    config: GameConfig,
    source: Arc<dyn CaptureSource>,
    loader: Arc<dyn ClassifierLoader>,
    voice: Arc<dyn VoiceNotifier>,
) {
    println!();
    println!("╔══════════════════════════════════════╗");
    println!("║  🚪 Escape Gate API Server           ║");
    println!("║  Version: {}                      ║", VERSION);
    println!("╚══════════════════════════════════════╝");
    println!();

    if let Err(e) = run_server(&args.addr, config, source, loader, voice).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
