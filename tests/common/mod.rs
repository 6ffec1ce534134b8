//! Common test utilities and fixtures
//!
//! Each test gets its own temp directory holding a config that points the
//! pilot at the mock backend and at a private results directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Mock-backed pilot environment in a temp directory
pub struct PilotEnv {
    pub root: TempDir,
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
}

impl PilotEnv {
    pub fn new() -> Self {
        Self::with_mock_settings("")
    }

    /// Extra lines are appended to the `[advisory.mock]` table
    pub fn with_mock_settings(mock_extra: &str) -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        let output_dir = root.path().join("results");
        let config_path = root.path().join("workshop-pilot.toml");

        let config = format!(
            r#"
[advisory]
provider = "mock"
max_attempts = 2
retry_backoff_ms = 0

[advisory.mock]
seed = "integration"
{mock_extra}

[orchestrator]
group_size = 5
max_concurrent_personas = 2
min_call_spacing_ms = 0

[logging]
level = "warn"

[storage]
output_dir = '{output}'
"#,
            mock_extra = mock_extra,
            output = output_dir.display()
        );
        fs::write(&config_path, config).expect("Failed to write config");

        Self {
            root,
            config_path,
            output_dir,
        }
    }

    /// The pilot binary, run inside the temp directory
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("workshop-pilot").expect("binary should build");
        cmd.current_dir(self.root.path());
        for var in [
            "PILOT_CONFIG",
            "PILOT_PROVIDER",
            "PILOT_GROUP_SIZE",
            "PILOT_OUTPUT_DIR",
            "PILOT_LOG_LEVEL",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// `run --config <fixture>` plus extra arguments
    pub fn run(&self, extra: &[&str]) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("run").arg("--config").arg(&self.config_path).args(extra);
        cmd
    }

    pub fn aggregate(&self, extra: &[&str]) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("aggregate").arg("--config").arg(&self.config_path).args(extra);
        cmd
    }

    pub fn artifact_path(&self, group: &str, persona: &str) -> PathBuf {
        self.output_dir.join(group).join(format!("{}_result.json", persona))
    }

    pub fn read_json(&self, relative: impl AsRef<Path>) -> serde_json::Value {
        let path = self.output_dir.join(relative);
        let text = fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
        serde_json::from_str(&text).unwrap_or_else(|e| panic!("parse {}: {}", path.display(), e))
    }
}

/// Same normalization the report uses for counting feedback
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
