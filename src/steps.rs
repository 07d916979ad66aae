//! Step files: scripted session interactions in YAML or JSON.
//!
//! ```yaml
//! session:
//!   name: A
//!   autoLaunch: true
//! steps:
//!   - waitForString: {text: "Sign On", row: 1, col: 36, timeoutMs: 10000}
//!   - setText: {text: "QUSER", row: 6, col: 53}
//!   - press: {key: Enter}
//!   - expectText: {text: "MAIN", row: 1, col: 2}
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GreenscreenError, Result};
use crate::screen::Position;
use crate::session::{LaunchConfig, SessionBuilder, SessionConfig, default_session_dir};
use crate::wait::DescribeOptions;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepsFile {
    #[serde(default)]
    pub session: Option<SessionSpec>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

impl StepsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| GreenscreenError::Steps(format!("failed to read steps file: {e}")))?;

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        if ext == "json" {
            serde_json::from_str(&contents).map_err(GreenscreenError::Json)
        } else if ext == "yaml" || ext == "yml" {
            Self::from_yaml(&contents)
        } else {
            serde_json::from_str(&contents)
                .or_else(|_| serde_yaml::from_str(&contents))
                .map_err(|e| GreenscreenError::Steps(format!("steps parse error: {e}")))
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| GreenscreenError::Steps(format!("yaml error: {e}")))
    }
}

/// Which session to drive and how to reach it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSpec {
    pub name: String,
    #[serde(default)]
    pub auto_launch: bool,
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
    #[serde(default)]
    pub launch_grace_ms: Option<u64>,
    #[serde(default)]
    pub guard_timeout_ms: Option<u64>,
}

impl SessionSpec {
    pub fn config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(ms) = self.guard_timeout_ms {
            config.guard_timeout = Duration::from_millis(ms);
        }
        if self.auto_launch || self.session_dir.is_some() || self.launch_grace_ms.is_some() {
            let mut launch = LaunchConfig::default();
            launch.session_dir = self.session_dir.clone().unwrap_or_else(default_session_dir);
            if let Some(ms) = self.launch_grace_ms {
                launch.grace = Duration::from_millis(ms);
            }
            config.launch = Some(launch);
        }
        config
    }

    pub fn builder(&self) -> SessionBuilder {
        SessionBuilder::from_config(self.config())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactsConfig {
    #[serde(default)]
    pub mode: ArtifactMode,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            mode: ArtifactMode::OnFailure,
            dir: None,
        }
    }
}

impl ArtifactsConfig {
    pub fn base_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("greenscreen-artifacts"))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactMode {
    #[default]
    OnFailure,
    Always,
    Off,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Step {
    SetText {
        #[serde(rename = "setText")]
        set_text: SetTextStep,
    },
    SetCursor {
        #[serde(rename = "setCursor")]
        set_cursor: AtStep,
    },
    SendKeys {
        #[serde(rename = "sendKeys")]
        send_keys: SendKeysStep,
    },
    Press {
        press: PressStep,
    },
    Type {
        #[serde(rename = "type")]
        r#type: TypeStep,
    },
    WaitForString {
        #[serde(rename = "waitForString")]
        wait_for_string: WaitForStringStep,
    },
    WaitForCursor {
        #[serde(rename = "waitForCursor")]
        wait_for_cursor: WaitForCursorStep,
    },
    WaitForScreen {
        #[serde(rename = "waitForScreen")]
        wait_for_screen: WaitForScreenStep,
    },
    ExpectText {
        #[serde(rename = "expectText")]
        expect_text: ExpectTextStep,
    },
    ExpectPattern {
        #[serde(rename = "expectPattern")]
        expect_pattern: PatternStep,
    },
    NotExpectText {
        #[serde(rename = "notExpectText")]
        not_expect_text: NotExpectTextStep,
    },
    Pause {
        pause: PauseStep,
    },
    Capture {
        capture: CaptureStep,
    },
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::SetText { .. } => "setText",
            Step::SetCursor { .. } => "setCursor",
            Step::SendKeys { .. } => "sendKeys",
            Step::Press { .. } => "press",
            Step::Type { .. } => "type",
            Step::WaitForString { .. } => "waitForString",
            Step::WaitForCursor { .. } => "waitForCursor",
            Step::WaitForScreen { .. } => "waitForScreen",
            Step::ExpectText { .. } => "expectText",
            Step::ExpectPattern { .. } => "expectPattern",
            Step::NotExpectText { .. } => "notExpectText",
            Step::Pause { .. } => "pause",
            Step::Capture { .. } => "capture",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtStep {
    pub row: u16,
    pub col: u16,
}

impl AtStep {
    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTextStep {
    pub text: String,
    pub row: u16,
    pub col: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendKeysStep {
    pub keys: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PressStep {
    pub key: String,
    #[serde(default)]
    pub times: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStep {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForStringStep {
    pub text: String,
    pub row: u16,
    pub col: u16,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForCursorStep {
    pub row: u16,
    pub col: u16,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForScreenStep {
    pub kind: String,
    pub row: u16,
    pub col: u16,
    #[serde(flatten)]
    pub options: DescribeOptions,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectTextStep {
    pub text: String,
    pub row: u16,
    pub col: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternStep {
    pub pattern: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotExpectTextStep {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseStep {
    pub ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStep {
    #[serde(default)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
session:
  name: b
  sessionDir: /opt/sessions
  launchGraceMs: 250
steps:
  - setText: {text: QUSER, row: 6, col: 53}
  - press: {key: Enter}
  - waitForScreen: {kind: text, row: 1, col: 2, string: MAIN, case: true, timeoutMs: 100}
  - waitForScreen: {kind: cursor, row: 20, col: 7}
  - expectText: {text: MAIN, row: 1, col: 2}
  - pause: {ms: 10}
artifacts:
  mode: off
"#;

    #[test]
    fn test_parse_yaml_steps() {
        let file = StepsFile::from_yaml(SAMPLE).unwrap();
        let labels: Vec<_> = file.steps.iter().map(Step::label).collect();
        assert_eq!(
            labels,
            vec!["setText", "press", "waitForScreen", "waitForScreen", "expectText", "pause"]
        );
        assert_eq!(file.artifacts.mode, ArtifactMode::Off);

        let Step::WaitForScreen { wait_for_screen } = &file.steps[2] else {
            panic!("expected waitForScreen");
        };
        assert_eq!(wait_for_screen.options, DescribeOptions::text("MAIN").case_sensitive());
        assert_eq!(wait_for_screen.timeout_ms, Some(100));

        let Step::WaitForScreen { wait_for_screen } = &file.steps[3] else {
            panic!("expected waitForScreen");
        };
        assert_eq!(wait_for_screen.options, DescribeOptions::default());
    }

    #[test]
    fn test_session_spec_enables_launch() {
        let file = StepsFile::from_yaml(SAMPLE).unwrap();
        let config = file.session.unwrap().config();
        let launch = config.launch.unwrap();
        assert_eq!(launch.session_dir, PathBuf::from("/opt/sessions"));
        assert_eq!(launch.grace, Duration::from_millis(250));
    }

    #[test]
    fn test_session_spec_without_launch() {
        let spec: SessionSpec = serde_json::from_str(r#"{"name": "A", "guardTimeoutMs": 60000}"#).unwrap();
        let config = spec.config();
        assert_eq!(config.launch, None);
        assert_eq!(config.guard_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        assert!(StepsFile::from_yaml("steps:\n  - fly: {to: moon}\n").is_err());
    }
}
