//! Tutor Loop CLI
//!
//! Plays a learner transcript through a lesson, or serves lessons over HTTP.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tutor_orchestrator::{
    create_router, AppState, Config, Indicator, Lesson, LessonUnit, MindsetType, PersonaHandover,
    Session, TelemetryEmitter, TelemetryEvent, TurnReport, UtteranceRecord,
};
use tutor_report::{
    json::JsonGenerator, HandoverInput, IndicatorInput, MarkdownGenerator, MindsetKind,
    ReportGenerator, ReportInput, TurnInput,
};

/// Transcript directive that requests a persona switch.
const PERSONA_DIRECTIVE: &str = "/persona";

/// Default telemetry file name inside the output directory.
const TELEMETRY_FILE_NAME: &str = "tutor-telemetry.jsonl";

/// Tutor Loop - Lesson Orchestrator
///
/// Walks a learner through a fixed sequence of teach, check, and assess
/// phases, tagging each turn with mindset signals and recording telemetry.
#[derive(Parser, Debug)]
#[command(name = "tutor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Transcript file with one learner utterance per line
    #[arg(value_name = "TRANSCRIPT")]
    transcript: Option<PathBuf>,

    /// Path to the lesson unit JSON file
    #[arg(short, long, value_name = "FILE")]
    unit: Option<String>,

    /// Path to configuration file (default: tutor.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Persona the lesson starts with
    #[arg(long, value_name = "KEY")]
    persona: Option<String>,

    /// Persona catalog JSON file replacing the built-in personas
    #[arg(long, value_name = "FILE")]
    personas: Option<String>,

    /// Output directory for reports
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// File to write telemetry events to, one JSON object per line
    #[arg(long, value_name = "FILE")]
    telemetry_out: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Run the HTTP API server instead of a transcript
    #[arg(long)]
    serve: bool,

    /// Port for the HTTP API server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

/// One parsed transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScriptLine {
    /// Something the learner said.
    Utterance { line: usize, text: String },
    /// A persona switch request.
    SwitchPersona { line: usize, key: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!(config = ?args.config, "Config file");
    tracing::debug!(output_dir = ?args.output_dir, "Output directory");

    let result = if args.serve {
        run_server(args).await
    } else {
        run_transcript(&args)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Serves lessons over HTTP until Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(&args)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    let host = config.server.host.clone();
    let port = config.server.port;

    let catalog = config.persona_catalog()?;
    let router = create_router(AppState::with_catalog(config, catalog));

    let listener = TcpListener::bind((host.as_str(), port)).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {host}:{port}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("Tutor Loop API running on http://{host}:{port}");
    println!("Press Ctrl+C to stop");
    tracing::info!(host = %host, port, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
    }
}

/// Plays a transcript through one lesson and writes telemetry and reports.
fn run_transcript(args: &Args) -> anyhow::Result<()> {
    let Some(transcript_path) = args.transcript.as_deref() else {
        anyhow::bail!(
            "No transcript given\n\nSuggestion: Pass a transcript file, or use --serve to run the HTTP API"
        );
    };

    let config = load_config(args)?;
    print_config(&config);

    tracing::info!(unit = %config.unit, "Loading lesson unit");
    let unit = LessonUnit::load(&config.unit)?;
    println!();
    println!("Unit: {} ({})", unit.title, unit.id);

    let contents = std::fs::read_to_string(transcript_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read transcript '{}': {e}",
            transcript_path.display()
        )
    })?;
    let script = parse_transcript(&contents);
    tracing::info!(lines = script.len(), "Transcript loaded");

    let mut lesson = Lesson::start(
        unit,
        &config.default_persona,
        Arc::new(config.persona_catalog()?),
        Arc::new(TelemetryEmitter::new(config.telemetry.clone())),
    )?
    .with_turns_per_phase(config.turns_per_phase);

    println!();
    let (events, ignored) = play_script(&mut lesson, &script)?;

    let output_dir = PathBuf::from(&config.output_dir);
    std::fs::create_dir_all(&output_dir)?;

    let telemetry_path = args
        .telemetry_out
        .clone()
        .unwrap_or_else(|| output_dir.join(TELEMETRY_FILE_NAME));
    write_telemetry(&telemetry_path, &events)?;

    println!();
    print_summary(lesson.session(), events.len(), ignored);
    println!("  Telemetry: {}", telemetry_path.display());

    generate_reports(lesson.session(), &output_dir)
}

/// Loads configuration and applies CLI overrides.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match args.config.as_deref() {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path)?
        }
        None => Config::load()?,
    };

    if let Some(ref unit) = args.unit {
        config.unit.clone_from(unit);
    }
    if let Some(ref persona) = args.persona {
        config.default_persona.clone_from(persona);
    }
    if let Some(ref personas) = args.personas {
        config.personas = Some(personas.clone());
    }
    if let Some(ref output_dir) = args.output_dir {
        config.output_dir.clone_from(output_dir);
    }

    // Re-validate after overrides
    config.validate()?;
    Ok(config)
}

/// Splits a transcript into utterances and persona switches.
///
/// Blank lines and `#` comments are skipped. Line numbers are one-based.
fn parse_transcript(contents: &str) -> Vec<ScriptLine> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }

            let directive = trimmed
                .strip_prefix(PERSONA_DIRECTIVE)
                .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace));

            Some(directive.map_or_else(
                || ScriptLine::Utterance {
                    line,
                    text: trimmed.to_string(),
                },
                |rest| ScriptLine::SwitchPersona {
                    line,
                    key: rest.trim().to_string(),
                },
            ))
        })
        .collect()
}

/// Runs every script line through the lesson.
///
/// Returns the telemetry raised and how many lines arrived after completion.
fn play_script(
    lesson: &mut Lesson,
    script: &[ScriptLine],
) -> anyhow::Result<(Vec<TelemetryEvent>, usize)> {
    let mut events = Vec::new();
    let mut ignored = 0usize;

    for entry in script {
        if lesson.is_complete() {
            let line = match entry {
                ScriptLine::Utterance { line, .. } | ScriptLine::SwitchPersona { line, .. } => {
                    *line
                }
            };
            println!("  line {line}: ignored, lesson already complete");
            tracing::debug!(line, "Skipping line after completion");
            ignored += 1;
            continue;
        }

        match entry {
            ScriptLine::Utterance { text, .. } => {
                let report = lesson.take_turn(text)?;
                print_turn(&report);
                events.extend(report.events);
            }
            ScriptLine::SwitchPersona { line, key } => {
                let event = lesson
                    .switch_persona(key)
                    .map_err(|e| anyhow::anyhow!("line {line}: {e}"))?;
                match event {
                    Some(event) => {
                        println!("  -> persona switched to {key}");
                        events.push(event);
                    }
                    None => println!("  -> persona {key} already active"),
                }
            }
        }
    }

    Ok((events, ignored))
}

/// Writes telemetry as JSON Lines.
fn write_telemetry(path: &Path, events: &[TelemetryEvent]) -> anyhow::Result<()> {
    let mut contents = String::new();
    for event in events {
        contents.push_str(&serde_json::to_string(event)?);
        contents.push('\n');
    }
    std::fs::write(path, contents).map_err(|e| {
        anyhow::anyhow!("Failed to write telemetry to '{}': {e}", path.display())
    })?;
    tracing::info!(path = %path.display(), events = events.len(), "Telemetry written");
    Ok(())
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Unit: {}", config.unit);
    println!("  Starting persona: {}", config.default_persona);
    if let Some(ref personas) = config.personas {
        println!("  Persona catalog: {personas}");
    }
    println!("  Turns per phase: {}", config.turns_per_phase);
    println!("  Output directory: {}", config.output_dir);
}

/// Prints one processed turn.
fn print_turn(report: &TurnReport) {
    let labels: Vec<&str> = report.indicators.iter().map(|i| i.label.as_str()).collect();
    let signals = if labels.is_empty() {
        "-".to_string()
    } else {
        labels.join(", ")
    };
    println!(
        "#{:<3} {:<9} {:<12} {signals}",
        report.exchange,
        report.phase.as_str(),
        report.active_persona
    );
    if report.complete {
        println!("  Lesson complete!");
    }
}

/// Prints a summary of the lesson.
fn print_summary(session: &Session, event_count: usize, ignored: usize) {
    let tally = session.mindset_tally();
    println!("=== Tutor Loop Summary ===");
    println!("Unit: {}", session.unit().title);
    println!("Phase: {}", session.current_phase());
    println!("Exchanges: {}", session.exchange_count());
    println!("Persona switches: {}", session.persona_history().len());
    println!("Mindset signals: {} growth, {} fixed", tally.growth, tally.fixed);
    println!("Telemetry events: {event_count}");
    if ignored > 0 {
        println!("Ignored after completion: {ignored}");
    }

    let elapsed = session.elapsed();
    println!(
        "Duration: {}m {}s",
        elapsed.num_minutes(),
        elapsed.num_seconds() % 60
    );
}

/// Generates Markdown and JSON reports in the output directory.
fn generate_reports(session: &Session, output_dir: &Path) -> anyhow::Result<()> {
    println!();
    println!("Generating reports...");

    let input = create_report_input(session);
    let report = ReportGenerator::new(input).generate();

    let md_path = output_dir.join("tutor-report.md");
    std::fs::write(&md_path, MarkdownGenerator::new(&report).generate())?;
    println!("  Markdown report: {}", md_path.display());

    let json_path = output_dir.join("tutor-report.json");
    JsonGenerator::new(&report).write_to_file(&json_path, true)?;
    println!("  JSON report: {}", json_path.display());

    println!();
    if report.recommendations.is_empty() {
        println!("No coaching recommendations.");
    } else {
        println!("Recommendations: {}", report.recommendations.len());
    }

    Ok(())
}

/// Creates a `ReportInput` from the session.
fn create_report_input(session: &Session) -> ReportInput {
    ReportInput {
        unit_id: session.unit().id.clone(),
        unit_title: session.unit().title.clone(),
        final_phase: session.current_phase().as_str().to_string(),
        exchange_count: session.exchange_count(),
        started_at: session.started_at(),
        ended_at: session.updated_at(),
        turns: session.utterance_log().iter().map(convert_turn).collect(),
        handovers: session
            .persona_history()
            .iter()
            .map(convert_handover)
            .collect(),
    }
}

/// Converts `MindsetType` to `MindsetKind`.
const fn convert_kind(kind: MindsetType) -> MindsetKind {
    match kind {
        MindsetType::Growth => MindsetKind::Growth,
        MindsetType::Fixed => MindsetKind::Fixed,
    }
}

fn convert_indicator(indicator: &Indicator) -> IndicatorInput {
    IndicatorInput {
        label: indicator.label.as_str().to_string(),
        kind: convert_kind(indicator.kind),
    }
}

/// Converts an `UtteranceRecord` to `TurnInput`.
fn convert_turn(record: &UtteranceRecord) -> TurnInput {
    TurnInput {
        exchange: record.exchange,
        phase: record.phase.as_str().to_string(),
        text: record.text.clone(),
        indicators: record.indicators.iter().map(convert_indicator).collect(),
        recorded_at: record.recorded_at,
    }
}

/// Converts a `PersonaHandover` to `HandoverInput`.
fn convert_handover(handover: &PersonaHandover) -> HandoverInput {
    HandoverInput {
        from: handover.from.clone(),
        to: handover.to.clone(),
        phase: handover.phase.as_str().to_string(),
        exchange: handover.exchange,
        at: handover.at,
    }
}
