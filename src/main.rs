//! Face Landmarks Agent CLI
//!
//! Runs face analysis sessions against a recorded detection script.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use face_landmarks_agent::{
    capture::{SyntheticTrack, VideoTrack},
    config::{Config, DetectionTypes},
    detect::{FaceDetector, ReplayDetector, UnsupportedDetector},
    publish::{
        relay_remote_face_boxes, BroadcastPeerChannel, FaceLandmarksDetected, SharedStore,
        StateSink, WebhookConfig,
    },
    session::{LandmarksSession, SessionState},
    transparency::create_shared_log_with_persistence,
    PRIVACY_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "face-landmarks")]
#[command(version = VERSION)]
#[command(about = "Face landmark detection agent for video meetings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a detection session
    Start {
        /// Detection script, one JSON array of faces per line
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Stop after this many seconds (runs until Ctrl+C otherwise)
        #[arg(long)]
        duration: Option<u64>,

        /// Participants in the meeting, including this one
        #[arg(long, default_value = "1")]
        participants: usize,

        /// Webhook proxy URL receiving expression runs
        #[arg(long)]
        webhook_url: Option<String>,

        /// Bearer token for the webhook
        #[arg(long)]
        token: Option<String>,

        /// Detection types (age, gender, expressions, face-box, count, or all)
        #[arg(long)]
        detection_types: Option<String>,

        /// Capture interval in milliseconds
        #[arg(long)]
        interval: Option<u64>,

        /// Print every detection result, not only completed expression runs
        #[arg(long)]
        show_detections: bool,
    },

    /// Show cumulative statistics
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            replay,
            duration,
            participants,
            webhook_url,
            token,
            detection_types,
            interval,
            show_detections,
        } => {
            cmd_start(StartArgs {
                replay,
                duration: duration.map(Duration::from_secs),
                participants,
                webhook_url,
                token,
                detection_types,
                interval: interval.map(Duration::from_millis),
                show_detections,
            })
            .await
        }
        Commands::Status => cmd_status(),
        Commands::Privacy => {
            cmd_privacy();
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

struct StartArgs {
    replay: Option<PathBuf>,
    duration: Option<Duration>,
    participants: usize,
    webhook_url: Option<String>,
    token: Option<String>,
    detection_types: Option<String>,
    interval: Option<Duration>,
    show_detections: bool,
}

async fn cmd_start(args: StartArgs) -> anyhow::Result<()> {
    println!("Face Landmarks Agent v{VERSION}");
    println!();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    if let Some(ref csv) = args.detection_types {
        config.detection_types = DetectionTypes::from_csv(csv);
    }
    if !config.detection_types.any_enabled() {
        bail!("At least one detection type must be enabled");
    }
    if let Some(interval) = args.interval {
        config.capture_interval = interval;
    }
    if let Some(url) = args.webhook_url {
        config.webhook = Some(WebhookConfig::new(url, args.token));
    }

    let detector: Option<ReplayDetector> = match args.replay {
        Some(ref path) => Some(
            ReplayDetector::from_jsonl(path)
                .with_context(|| format!("Failed to load detection script {path:?}"))?,
        ),
        None => None,
    };

    println!("Starting detection...");
    println!("  Participant: {}", config.identity.participant_id);
    println!(
        "  Detection types: {}",
        config
            .detection_types
            .enabled()
            .iter()
            .map(|t| format!("{t:?}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Interval: {}ms", config.detection_interval().as_millis());
    match config.webhook {
        Some(ref webhook) if config.webhook_enabled() => println!(
            "  Webhook: {} (every {}s)",
            webhook.emotions_url(),
            config.webhook_send_interval.as_secs()
        ),
        _ => println!("  Webhook: disabled"),
    }
    println!();

    let stats = create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    let store = SharedStore::new();
    let sink: Arc<dyn StateSink> = Arc::new(store.clone());

    let peer = Arc::new(BroadcastPeerChannel::new(64, args.participants.max(1)));
    let relay = tokio::spawn(relay_remote_face_boxes(
        peer.subscribe(),
        config.identity.participant_id.clone(),
        sink.clone(),
    ));

    let mut session = LandmarksSession::new(config, sink, move || -> Box<dyn FaceDetector> {
        match detector {
            Some(ref detector) => Box::new(detector.clone()),
            None => Box::new(UnsupportedDetector::new(
                "no face model available (use --replay)",
            )),
        }
    })
    .with_peer(peer)
    .with_stats(stats.clone());

    let detections = if args.show_detections {
        let (tx, rx) = mpsc::unbounded_channel();
        session = session.with_observer(Arc::new(tx));
        Some(tokio::spawn(print_detections(rx)))
    } else {
        None
    };

    let track: Arc<dyn VideoTrack> = Arc::new(SyntheticTrack::new("synthetic-camera", 640, 480));
    if session.start(Some(track)).await != SessionState::Active {
        relay.abort();
        if let Some(ref task) = detections {
            task.abort();
        }
        match session.last_error() {
            Some(e) => bail!("Face landmarks detection unavailable: {e}"),
            None => bail!("Face landmarks detection unavailable"),
        }
    }

    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let deadline = args.duration.map(|d| tokio::time::Instant::now() + d);
    let mut printed = 0;
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        printed = print_new_events(&store, printed);
    }

    println!();
    println!("Stopping detection...");
    let summary = session.stop().await;
    print_new_events(&store, printed);
    relay.abort();
    if let Some(task) = detections {
        task.abort();
    }

    if let Some(summary) = summary {
        if let Some(outcome) = summary.final_flush {
            println!("Final webhook flush: {outcome:?}");
        }
        println!("Session {} finished", summary.session_id);
    }

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save statistics: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

/// Print detection results as they arrive.
async fn print_detections(mut rx: mpsc::UnboundedReceiver<FaceLandmarksDetected>) {
    while let Some(detection) = rx.recv().await {
        let expression = detection
            .face_expression
            .map(|e| e.to_string())
            .unwrap_or_else(|| "-".to_string());
        match detection.face_box {
            Some(face_box) => println!(
                "  detected {expression}, face {:.0}%..{:.0}%",
                face_box.left, face_box.right
            ),
            None => println!("  detected {expression}"),
        }
    }
}

/// Print expression runs added to the store since the last call.
fn print_new_events(store: &SharedStore, printed: usize) -> usize {
    let state = store.state();
    for event in state.face_landmarks.iter().skip(printed) {
        let mut line = format!(
            "[{}] {} for {:.1}s",
            event.timestamp.format("%H:%M:%S"),
            event.expression,
            event.duration_secs
        );
        if let Some(age) = event.age {
            line.push_str(&format!(", age ~{age:.0}"));
        }
        if let Some(ref gender) = event.gender {
            line.push_str(&format!(", {gender}"));
        }
        println!("{line}");
    }
    state.face_landmarks.len()
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("Face Landmarks Agent Status");
    println!("===========================");
    println!();

    println!("Configuration:");
    println!("  Interval: {}ms", config.detection_interval().as_millis());
    println!(
        "  Face centering threshold: {}%",
        config.face_centering_threshold
    );
    println!(
        "  Webhook: {}",
        if config.webhook_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    let stats_path = config.data_path.join("transparency.json");
    if stats_path.exists() {
        let content = std::fs::read_to_string(&stats_path)
            .with_context(|| format!("Failed to read {stats_path:?}"))?;
        let stats: serde_json::Value =
            serde_json::from_str(&content).context("Corrupt statistics file")?;

        println!("Cumulative Statistics:");
        for (key, label) in [
            ("frames_sampled", "Frames analyzed"),
            ("detections_completed", "Detections completed"),
            ("requests_dropped", "Frames dropped"),
            ("stale_responses", "Stale results discarded"),
            ("expression_events", "Expression runs"),
            ("face_boxes_published", "Face boxes published"),
            ("webhook_flushes", "Webhook deliveries"),
            ("webhook_failures", "Webhook failures"),
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {label}: {value}");
            }
        }
    } else {
        println!("No previous session data found.");
    }

    Ok(())
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
