use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{GreenscreenError, Result};
use crate::host::Host;
use crate::input::Key;
use crate::screen::Position;
use crate::session::Session;
use crate::steps::{
    ArtifactMode, ArtifactsConfig, CaptureStep, ExpectTextStep, NotExpectTextStep, PatternStep,
    Step, StepsFile, WaitForScreenStep,
};

/// Timeout for wait steps that do not set one.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Clone)]
pub struct RunStepsOptions {
    pub trace: bool,
}

/// What a finished run left behind.
#[derive(Debug, Default)]
pub struct RunReport {
    pub steps_run: usize,
    pub artifacts_dir: Option<PathBuf>,
}

pub fn run_steps<H: Host>(
    session: &Session<H>,
    steps_file: &StepsFile,
    options: &RunStepsOptions,
) -> Result<RunReport> {
    let artifacts_dir = prepare_artifacts_dir(&steps_file.artifacts, options.trace)?;
    let mut trace_entries = Vec::new();
    let mut report = RunReport {
        steps_run: 0,
        artifacts_dir: artifacts_dir.clone(),
    };

    for (idx, step) in steps_file.steps.iter().enumerate() {
        let step_index = idx + 1;
        let started = Instant::now();

        let result = execute_step(session, step, step_index, artifacts_dir.as_deref());

        if options.trace {
            trace_entries.push(TraceEntry {
                step: step_index,
                action: step.label(),
                duration_ms: started.elapsed().as_millis(),
                error: result.as_ref().err().map(|e| e.to_string()),
            });
        }

        if let Err(err) = result {
            warn!(step = step_index, action = step.label(), error = %err, "step failed");
            if let Some(dir) = artifacts_dir.as_deref() {
                let capture = steps_file.artifacts.mode != ArtifactMode::Off;
                let trace = options.trace.then_some(trace_entries.as_slice());
                save_failure(session, dir, step_index, capture, trace);
            }
            return Err(err);
        }
        report.steps_run = step_index;

        if steps_file.artifacts.mode == ArtifactMode::Always {
            if let Some(dir) = artifacts_dir.as_ref() {
                capture_artifacts(session, dir, &format!("step-{step_index:03}"))?;
            }
        }
    }

    if let Some(dir) = artifacts_dir.as_ref().filter(|_| options.trace) {
        write_trace(dir, &trace_entries)?;
    }

    info!(steps = report.steps_run, "steps completed");
    Ok(report)
}

fn execute_step<H: Host>(
    session: &Session<H>,
    step: &Step,
    step_index: usize,
    artifacts_dir: Option<&Path>,
) -> Result<()> {
    match step {
        Step::SetText { set_text } => {
            session.set_text(&set_text.text, (set_text.row, set_text.col))?;
        }
        Step::SetCursor { set_cursor } => {
            session.set_cursor(set_cursor.position())?;
        }
        Step::SendKeys { send_keys } => {
            session.send_keys(&send_keys.keys)?;
        }
        Step::Press { press } => {
            let key: Key = press.key.parse()?;
            for _ in 0..press.times.unwrap_or(1) {
                session.send_key(key.clone())?;
            }
        }
        Step::Type { r#type } => {
            session.type_str(&r#type.text)?;
        }
        Step::WaitForString { wait_for_string } => {
            let pos = Position::new(wait_for_string.row, wait_for_string.col);
            let timeout = timeout(wait_for_string.timeout_ms);
            if !session.wait_for_string(&wait_for_string.text, pos, timeout)? {
                return Err(GreenscreenError::Timeout {
                    condition: format!(
                        "text '{}' at row={}, col={}",
                        wait_for_string.text, pos.row, pos.col
                    ),
                    timeout,
                });
            }
        }
        Step::WaitForCursor { wait_for_cursor } => {
            let pos = Position::new(wait_for_cursor.row, wait_for_cursor.col);
            let timeout = timeout(wait_for_cursor.timeout_ms);
            if !session.wait_for_cursor(pos, timeout)? {
                return Err(GreenscreenError::Timeout {
                    condition: format!("cursor at row={}, col={}", pos.row, pos.col),
                    timeout,
                });
            }
        }
        Step::WaitForScreen { wait_for_screen } => wait_for_screen_step(session, wait_for_screen)?,
        Step::ExpectText { expect_text } => expect_text_step(session, expect_text)?,
        Step::ExpectPattern { expect_pattern } => expect_pattern_step(session, expect_pattern)?,
        Step::NotExpectText { not_expect_text } => {
            not_expect_text_step(session, not_expect_text)?
        }
        Step::Pause { pause } => {
            session.pause(Duration::from_millis(pause.ms))?;
        }
        Step::Capture { capture } => capture_step(session, capture, step_index, artifacts_dir)?,
    }
    Ok(())
}

fn wait_for_screen_step<H: Host>(session: &Session<H>, step: &WaitForScreenStep) -> Result<()> {
    let mut screen = session.screen()?;
    screen.describe(&step.kind, step.row, step.col, step.options.clone())?;
    let timeout = timeout(step.timeout_ms);
    if !screen.wait(timeout)? {
        let condition = screen
            .description()
            .map(|d| d.to_string())
            .unwrap_or_default();
        return Err(GreenscreenError::Timeout { condition, timeout });
    }
    Ok(())
}

fn expect_text_step<H: Host>(session: &Session<H>, step: &ExpectTextStep) -> Result<()> {
    let position = Position::new(step.row, step.col);
    let found = session.get_text(position, step.text.chars().count() as u32)?;
    if found != step.text {
        return Err(GreenscreenError::ExpectationFailed {
            expected: step.text.clone(),
            found,
            position,
        });
    }
    Ok(())
}

fn expect_pattern_step<H: Host>(session: &Session<H>, step: &PatternStep) -> Result<()> {
    let screen = session.snapshot()?;
    if screen.find_pattern(&step.pattern)?.is_empty() {
        return Err(GreenscreenError::PatternNotFound {
            pattern: step.pattern.clone(),
        });
    }
    Ok(())
}

fn not_expect_text_step<H: Host>(session: &Session<H>, step: &NotExpectTextStep) -> Result<()> {
    let screen = session.snapshot()?;
    if let Some(found) = screen.find_text(&step.text).into_iter().next() {
        return Err(GreenscreenError::UnexpectedText {
            text: step.text.clone(),
            position: found.position,
        });
    }
    Ok(())
}

fn capture_step<H: Host>(
    session: &Session<H>,
    step: &CaptureStep,
    step_index: usize,
    artifacts_dir: Option<&Path>,
) -> Result<()> {
    let Some(dir) = artifacts_dir else {
        return Err(GreenscreenError::Steps(
            "capture step requires artifacts mode".to_string(),
        ));
    };
    let name = step
        .name
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("step-{step_index:03}-capture"));
    capture_artifacts(session, dir, &name)
}

// Failures here are logged, never returned.
fn save_failure<H: Host>(
    session: &Session<H>,
    dir: &Path,
    step_index: usize,
    capture: bool,
    trace: Option<&[TraceEntry]>,
) {
    if capture {
        let prefix = format!("failure-{step_index:03}");
        if let Err(err) = capture_artifacts(session, dir, &prefix) {
            warn!(step = step_index, error = %err, "could not save failure screen");
        }
    }
    if let Some(trace) = trace {
        if let Err(err) = write_trace(dir, trace) {
            warn!(error = %err, "could not write trace");
        }
    }
}

fn timeout(timeout_ms: Option<u64>) -> Duration {
    timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_STEP_TIMEOUT)
}

fn prepare_artifacts_dir(config: &ArtifactsConfig, trace: bool) -> Result<Option<PathBuf>> {
    if config.mode == ArtifactMode::Off && !trace {
        return Ok(None);
    }

    let base_dir = config.base_dir();
    let run_dir = base_dir.join(Local::now().format("%Y%m%d-%H%M%S").to_string());
    fs::create_dir_all(&run_dir)?;
    Ok(Some(run_dir))
}

// Reads without the input-ready guard so a failed screen is saved untouched.
fn capture_artifacts<H: Host>(session: &Session<H>, dir: &Path, base: &str) -> Result<()> {
    let screen = session.peek()?;

    fs::write(dir.join(format!("{base}-screen.txt")), screen.text())?;
    fs::write(dir.join(format!("{base}-screen.json")), screen.to_json()?)?;

    Ok(())
}

#[derive(Debug, Serialize)]
struct TraceEntry {
    step: usize,
    action: &'static str,
    duration_ms: u128,
    error: Option<String>,
}

fn write_trace(dir: &Path, trace: &[TraceEntry]) -> Result<()> {
    let path = dir.join("trace.json");
    let json = serde_json::to_string_pretty(trace)?;
    fs::write(path, json)?;
    Ok(())
}
