use std::fs;
use std::path::Path;

use greenscreen::host::mock::MockHost;
use greenscreen::prelude::*;
use greenscreen::runner::{RunStepsOptions, run_steps};
use greenscreen::steps::StepsFile;
use tempfile::tempdir;

fn sign_on_host() -> MockHost {
    MockHost::new()
        .with_connection('A')
        .with_text("Sign On", (1, 36))
        .with_text("User  . . . . . . . . . . . . .", (6, 17))
        .with_cursor((6, 53))
}

fn steps_yaml(artifacts: &Path, mode: &str, steps: &str) -> String {
    format!(
        "steps:\n{steps}artifacts:\n  mode: {mode}\n  dir: '{}'\n",
        artifacts.display()
    )
}

#[test]
fn sign_on_script_runs_end_to_end() -> Result<()> {
    let dir = tempdir().unwrap();
    let yaml = steps_yaml(
        dir.path(),
        "always",
        r#"  - waitForString: {text: "Sign On", row: 1, col: 36, timeoutMs: 100}
  - setText: {text: QUSER, row: 6, col: 53}
  - expectText: {text: QUSER, row: 6, col: 53}
  - waitForScreen: {kind: text, row: 6, col: 53, string: quser, timeoutMs: 50}
  - waitForCursor: {row: 6, col: 53, timeoutMs: 50}
  - notExpectText: {text: CPF}
  - expectPattern: {pattern: 'Sign\s+On'}
  - press: {key: Enter}
  - capture: {name: signed-on}
"#,
    );
    let file = StepsFile::from_yaml(&yaml)?;

    let host = sign_on_host();
    let spy = host.clone();
    let session = Session::connect(host, "A")?;

    let report = run_steps(&session, &file, &RunStepsOptions { trace: true })?;

    assert_eq!(report.steps_run, 9);
    assert_eq!(spy.keys_sent(), vec!["[enter]"]);

    let run_dir = report.artifacts_dir.expect("artifacts dir");
    assert!(run_dir.starts_with(dir.path()));
    let captured = fs::read_to_string(run_dir.join("signed-on-screen.txt"))?;
    assert!(captured.contains("QUSER"));
    assert!(run_dir.join("step-001-screen.json").is_file());
    assert!(run_dir.join("step-009-screen.txt").is_file());

    let trace: serde_json::Value = serde_json::from_str(&fs::read_to_string(run_dir.join("trace.json"))?)?;
    assert_eq!(trace.as_array().map(Vec::len), Some(9));
    assert_eq!(trace[3]["action"], "waitForScreen");
    Ok(())
}

#[test]
fn failed_expectation_saves_the_screen() -> Result<()> {
    let dir = tempdir().unwrap();
    let yaml = steps_yaml(
        dir.path(),
        "onFailure",
        r#"  - setText: {text: QUSER, row: 6, col: 53}
  - expectText: {text: MAIN, row: 1, col: 2}
  - press: {key: F3}
"#,
    );
    let file = StepsFile::from_yaml(&yaml)?;

    let host = sign_on_host();
    let spy = host.clone();
    let session = Session::connect(host, "A")?;

    let err = run_steps(&session, &file, &RunStepsOptions::default()).unwrap_err();
    assert!(matches!(err, GreenscreenError::ExpectationFailed { .. }));
    assert!(spy.keys_sent().is_empty());

    let runs: Vec<_> = fs::read_dir(dir.path())?.collect::<std::io::Result<_>>()?;
    assert_eq!(runs.len(), 1);
    let run_dir = runs[0].path();
    let saved = fs::read_to_string(run_dir.join("failure-002-screen.txt"))?;
    assert!(saved.contains("Sign On"));
    assert!(!run_dir.join("trace.json").exists());
    Ok(())
}

#[test]
fn timed_out_wait_is_reported() -> Result<()> {
    let file = StepsFile::from_yaml(
        "steps:\n  - waitForString: {text: MAIN, row: 1, col: 2, timeoutMs: 10}\nartifacts:\n  mode: off\n",
    )?;
    let session = Session::connect(sign_on_host(), "A")?;

    match run_steps(&session, &file, &RunStepsOptions::default()) {
        Err(GreenscreenError::Timeout { condition, timeout }) => {
            assert!(condition.contains("MAIN"));
            assert_eq!(timeout.as_millis(), 10);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    Ok(())
}

#[test]
fn steps_load_from_json_file() -> Result<()> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("signon.json");
    fs::write(
        &path,
        r#"{"session": {"name": "a"}, "steps": [{"type": {"text": "[x]"}}], "artifacts": {"mode": "off"}}"#,
    )?;

    let file = StepsFile::load(&path)?;
    let host = MockHost::new().with_connection('A');
    let spy = host.clone();
    let session = file.session.as_ref().unwrap().builder().connect(host, "a")?;

    run_steps(&session, &file, &RunStepsOptions::default())?;
    assert_eq!(spy.keys_sent(), vec!["[[x]]"]);
    Ok(())
}
