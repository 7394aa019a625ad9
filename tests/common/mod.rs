//! Common test utilities for trellis integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's data or config directories.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated data and config storage.
///
/// The `tl()` method returns a `Command` that sets `TL_DATA_DIR` and
/// `TL_CONFIG_DIR` per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the tl binary with isolated directories.
    pub fn tl(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tl"));
        cmd.current_dir(self.data_dir.path());
        cmd.env("TL_DATA_DIR", self.data_dir.path());
        cmd.env("TL_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("TL_DB");
        cmd.env_remove("TL_LOG");
        cmd
    }

    /// Run `tl` with `args`, assert success and parse stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.tl().args(args).assert().success().get_output().clone();
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Create a project and return its id.
    pub fn project(&self, name: &str) -> i64 {
        self.json(&["project", "create", name])["id"].as_i64().unwrap()
    }

    /// Create a phase and return its id.
    pub fn phase(&self, project_id: i64, name: &str, order: i64) -> i64 {
        let project = project_id.to_string();
        let order = order.to_string();
        self.json(&["phase", "create", &project, name, "--order", &order])["id"]
            .as_i64()
            .unwrap()
    }

    /// Create a task with extra `task create` flags and return its id.
    pub fn task(&self, title: &str, extra: &[&str]) -> i64 {
        let mut args = vec!["task", "create", title];
        args.extend_from_slice(extra);
        self.json(&args)["id"].as_i64().unwrap()
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    pub fn config_path(&self) -> &std::path::Path {
        self.config_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference date used with `--today` throughout the CLI tests.
pub const TODAY: &str = "2026-03-10";

/// Build the "Website Redesign" sample hierarchy relative to `TODAY`.
///
/// Returns (project, planning, development, testing) ids.
pub fn website(env: &TestEnv) -> (i64, i64, i64, i64) {
    let project = env.project("Website Redesign");
    let planning = env.phase(project, "Planning", 1);
    let development = env.phase(project, "Development", 2);
    let testing = env.phase(project, "Testing", 3);

    let p = planning.to_string();
    let d = development.to_string();
    env.task(
        "Draft task card UI",
        &["--phase", &p, "--priority", "5", "--due", "2026-03-11", "--status", "Needs sign-off", "--tags", "design,ui", "--signoff"],
    );
    env.task(
        "Ship MVP login flow",
        &["--phase", &d, "--priority", "4", "--due", "2026-03-12", "--status", "Started", "--assignee", "Ada", "--tags", "auth,ui"],
    );
    env.task(
        "Set up Pi-hosted instance",
        &["--phase", &d, "--priority", "3", "--due", "2026-03-15", "--status", "Assigned", "--assignee", "Sam"],
    );
    env.task(
        "Connect AI key store",
        &["--phase", &d, "--priority", "2", "--due", "2026-03-18", "--status", "Not assigned"],
    );

    (project, planning, development, testing)
}
