//! End-to-end lesson tests
//!
//! These tests drive a whole lesson from the fixture files through to the
//! generated reports, using only the public crate APIs.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};
use tutor_orchestrator::{
    Config, EventKind, IndicatorLabel, Lesson, LessonUnit, MindsetType, Phase, PersonaCatalog,
    Session, TelemetryEmitter, TelemetryEvent,
};
use tutor_report::{
    json::JsonGenerator, DominantMindset, HandoverInput, IndicatorInput, LessonStatus,
    MarkdownGenerator, MindsetKind, ReportGenerator, ReportInput, TimelineKind, TurnInput,
};

/// Path to the sales negotiation fixture.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/sales-negotiation")
}

fn load_fixture_config() -> Config {
    Config::load_from_file(&fixture_path().join("tutor.json")).expect("Failed to load config")
}

fn start_fixture_lesson() -> Lesson {
    let config = load_fixture_config();
    let unit = LessonUnit::load(fixture_path().join(&config.unit)).expect("Failed to load unit");
    Lesson::start(
        unit,
        &config.default_persona,
        Arc::new(PersonaCatalog::builtin()),
        Arc::new(TelemetryEmitter::new(config.telemetry)),
    )
    .expect("Failed to start lesson")
    .with_turns_per_phase(config.turns_per_phase)
}

/// Plays the fixture transcript, returning telemetry and the ignored count.
fn play_fixture_transcript(lesson: &mut Lesson) -> (Vec<TelemetryEvent>, usize) {
    let transcript = std::fs::read_to_string(fixture_path().join("transcript.txt"))
        .expect("Failed to read transcript");

    let mut events = Vec::new();
    let mut ignored = 0;
    for line in transcript.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if lesson.is_complete() {
            assert_err!(lesson.take_turn(line));
            ignored += 1;
            continue;
        }
        if let Some(key) = line.strip_prefix("/persona ") {
            events.extend(assert_ok!(lesson.switch_persona(key.trim())));
        } else {
            events.extend(assert_ok!(lesson.take_turn(line)).events);
        }
    }
    (events, ignored)
}

fn report_input(session: &Session) -> ReportInput {
    ReportInput {
        unit_id: session.unit().id.clone(),
        unit_title: session.unit().title.clone(),
        final_phase: session.current_phase().as_str().to_string(),
        exchange_count: session.exchange_count(),
        started_at: session.started_at(),
        ended_at: session.updated_at(),
        turns: session
            .utterance_log()
            .iter()
            .map(|record| TurnInput {
                exchange: record.exchange,
                phase: record.phase.as_str().to_string(),
                text: record.text.clone(),
                indicators: record
                    .indicators
                    .iter()
                    .map(|indicator| IndicatorInput {
                        label: indicator.label.as_str().to_string(),
                        kind: match indicator.kind {
                            MindsetType::Growth => MindsetKind::Growth,
                            MindsetType::Fixed => MindsetKind::Fixed,
                        },
                    })
                    .collect(),
                recorded_at: record.recorded_at,
            })
            .collect(),
        handovers: session
            .persona_history()
            .iter()
            .map(|handover| HandoverInput {
                from: handover.from.clone(),
                to: handover.to.clone(),
                phase: handover.phase.as_str().to_string(),
                exchange: handover.exchange,
                at: handover.at,
            })
            .collect(),
    }
}

// ============================================================================
// Fixtures
// ============================================================================

#[test]
fn test_fixture_unit_loads() {
    let unit = LessonUnit::load(fixture_path().join("unit.json")).expect("Failed to load unit");

    assert_eq!(unit.id, "SN-101");
    assert_eq!(unit.title, "Sales Negotiation");
    assert_eq!(unit.learning_outcomes.len(), 3);
    assert_eq!(unit.assessment_criteria.len(), 2);
    assert_eq!(unit.object_slug(), "sales-negotiation");
}

#[test]
fn test_fixture_config_loads() {
    let config = load_fixture_config();

    assert_eq!(config.unit, "unit.json");
    assert_eq!(config.default_persona, "coach");
    assert_eq!(config.turns_per_phase, 1);
    assert_eq!(config.telemetry.actor_id, "learner-42");
    assert_eq!(config.telemetry.actor_name, "Sam Rivera");
    // unspecified nested fields keep their defaults
    assert_eq!(config.telemetry.verb_base_uri, "http://adlnet.gov/expapi/verbs/");
    assert_eq!(config.server.port, 3100);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.output_dir, "reports");
}

// ============================================================================
// Full lesson
// ============================================================================

#[test]
fn test_transcript_completes_lesson() {
    let mut lesson = start_fixture_lesson();
    let (events, ignored) = play_fixture_transcript(&mut lesson);

    let session = lesson.session();
    assert!(session.is_complete());
    assert_eq!(session.current_phase(), Phase::Complete);
    assert_eq!(session.exchange_count(), 8);
    assert_eq!(session.active_persona_key(), "coach");
    assert_eq!(session.persona_history().len(), 2);
    assert_eq!(ignored, 1);

    let phase_advances = events
        .iter()
        .filter(|e| e.kind == EventKind::PhaseAdvance)
        .count();
    let switches = events
        .iter()
        .filter(|e| e.kind == EventKind::PersonaSwitch)
        .count();
    let completions = events
        .iter()
        .filter(|e| e.kind == EventKind::LessonComplete)
        .count();
    assert_eq!(phase_advances, 8);
    assert_eq!(switches, 2);
    assert_eq!(completions, 1);
    assert_eq!(events.last().map(|e| e.kind), Some(EventKind::LessonComplete));
}

#[test]
fn test_transcript_mindset_signals() {
    let mut lesson = start_fixture_lesson();
    play_fixture_transcript(&mut lesson);

    let tally = lesson.session().mindset_tally();
    assert_eq!(tally.growth, 7);
    assert_eq!(tally.fixed, 2);
    assert_eq!(tally.by_label.get(&IndicatorLabel::GaveUpEasily), Some(&1));
    assert_eq!(tally.by_label.get(&IndicatorLabel::BlamedExternal), Some(&1));

    let log = lesson.session().utterance_log();
    assert_eq!(log[0].phase, Phase::Teach1);
    assert_eq!(log[0].indicators[0].label, IndicatorLabel::SoughtFeedback);
    assert_eq!(log[7].phase, Phase::Assess2);
    assert_eq!(log[7].indicators[0].label, IndicatorLabel::SetChallengingGoal);
}

#[test]
fn test_telemetry_identifies_learner_and_unit() {
    let mut lesson = start_fixture_lesson();
    let (events, _) = play_fixture_transcript(&mut lesson);

    for event in &events {
        assert_eq!(event.actor.id, "learner-42");
        assert_eq!(
            event.object_id(),
            "https://academy.example.com/units/sales-negotiation"
        );
    }

    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    let mut sorted = sequences.clone();
    sorted.sort_unstable();
    assert_eq!(sequences, sorted);

    let complete = events.last().expect("no events");
    assert_eq!(
        complete.verb_id(),
        "http://adlnet.gov/expapi/verbs/completed"
    );
}

// ============================================================================
// Reports
// ============================================================================

#[test]
fn test_report_from_completed_lesson() {
    let mut lesson = start_fixture_lesson();
    play_fixture_transcript(&mut lesson);

    let report = ReportGenerator::new(report_input(lesson.session())).generate();

    assert_eq!(report.unit_title, "Sales Negotiation");
    assert_eq!(report.summary.status, LessonStatus::Completed);
    assert_eq!(report.summary.exchanges, 8);
    assert_eq!(report.summary.phases_completed, 8);
    assert_eq!(report.summary.growth_count, 7);
    assert_eq!(report.summary.fixed_count, 2);
    assert_eq!(report.summary.dominant_mindset, DominantMindset::Growth);

    let switches = report
        .timeline
        .iter()
        .filter(|e| e.kind == TimelineKind::PersonaSwitch)
        .count();
    let phase_changes = report
        .timeline
        .iter()
        .filter(|e| e.kind == TimelineKind::PhaseChange)
        .count();
    assert_eq!(switches, 2);
    assert_eq!(phase_changes, 8);

    let categories: Vec<&str> = report
        .recommendations
        .iter()
        .map(|r| r.category.as_str())
        .collect();
    assert_eq!(categories, vec!["Persistence", "Ownership"]);
}

#[test]
fn test_reports_render_and_write() {
    let mut lesson = start_fixture_lesson();
    play_fixture_transcript(&mut lesson);
    let report = ReportGenerator::new(report_input(lesson.session())).generate();

    let markdown = MarkdownGenerator::new(&report).generate();
    assert!(markdown.contains("# Lesson Report: Sales Negotiation"));
    assert!(markdown.contains("| Status | Lesson completed |"));
    assert!(markdown.contains("| Gave up easily | fixed | 1 |"));
    assert!(markdown.contains("**[Persistence]**"));

    let path = std::env::temp_dir().join(format!(
        "tutor-integration-report-{}.json",
        std::process::id()
    ));
    assert_ok!(JsonGenerator::new(&report).write_to_file(&path, true));
    let contents = std::fs::read_to_string(&path).expect("Failed to read report");
    std::fs::remove_file(&path).expect("Failed to clean up");

    let value: serde_json::Value = serde_json::from_str(&contents).expect("invalid JSON");
    assert_eq!(value["summary"]["status"], "completed");
    assert_eq!(value["signals"].as_array().map(Vec::len), Some(9));
}

#[test]
fn test_report_from_abandoned_lesson() {
    let mut lesson = start_fixture_lesson();
    assert_ok!(lesson.take_turn("I can't do this"));
    assert_ok!(lesson.take_turn("Can we just skip it?"));

    let report = ReportGenerator::new(report_input(lesson.session())).generate();

    assert_eq!(report.summary.status, LessonStatus::InProgress);
    assert_eq!(report.summary.final_phase, "TEACH_3");
    assert_eq!(report.summary.dominant_mindset, DominantMindset::Fixed);
    let categories: Vec<&str> = report
        .recommendations
        .iter()
        .map(|r| r.category.as_str())
        .collect();
    assert_eq!(categories, vec!["Challenge", "Engagement", "Completion"]);
}
