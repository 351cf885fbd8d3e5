use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated data directory plus helpers for running the binary against it.
pub struct TestEnv {
    _tmp: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let data_dir = tmp.path().join("rulecheck");
        Self {
            _tmp: tmp,
            data_dir,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("rulecheck");
        cmd.env("RULECHECK_DATA_DIR", &self.data_dir)
            .env_remove("RULECHECK_API_KEY")
            .env_remove("RULECHECK_ENDPOINT")
            .env_remove("RULECHECK_MODEL")
            .env_remove("RULECHECK_TIMEOUT");
        cmd
    }

    /// Run and require success; returns stdout.
    pub fn run(&self, args: &[&str]) -> String {
        let out = self
            .cmd()
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(out).expect("utf8 stdout")
    }

    /// Run and require failure; returns stderr.
    pub fn run_err(&self, args: &[&str]) -> String {
        let out = self
            .cmd()
            .args(args)
            .assert()
            .failure()
            .get_output()
            .stderr
            .clone();
        String::from_utf8(out).expect("utf8 stderr")
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let out = self.run(args);
        serde_json::from_str(&out).expect("valid json output")
    }

    pub fn titles(&self) -> Vec<String> {
        self.run_json(&["rules", "list", "--json"])
            .as_array()
            .expect("rules array")
            .iter()
            .map(|r| r["title"].as_str().expect("title").to_string())
            .collect()
    }
}
