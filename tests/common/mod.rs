// Shared test helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

use sat_runner::audit::{AuditNodeId, AuditObserver};
use sat_runner::core::env::EnvCtx;
use sat_runner::core::execution::Engine;
use sat_runner::core::models::{
    ExecResult, NodeState, StepOutcome, TestCase, TestGroup, TestStand, TestStep,
};
use sat_runner::core::store::TomlStore;
use sat_runner::runner::{CommandRunner, Runners};

/// A command runner that never spawns anything. Results are scripted per step
/// identity (default: pass) and every call is recorded.
#[derive(Default)]
pub struct FakeRunner {
    results: HashMap<String, ExecResult>,
    stop_after: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, step: &str, result: ExecResult) -> Self {
        self.results.insert(step.to_string(), result);
        self
    }

    /// Requests a cooperative stop once `step` has run.
    pub fn stop_after(mut self, step: &str) -> Self {
        self.stop_after = Some(step.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn exec(&self, step: &TestStep, env: &EnvCtx) -> StepOutcome {
        self.calls.lock().unwrap().push(step.id.clone());
        if self.stop_after.as_deref() == Some(step.id.as_str()) {
            env.request_stop();
        }
        let result = self
            .results
            .get(&step.id)
            .cloned()
            .unwrap_or_else(ExecResult::pass);
        StepOutcome::new(result, format!("ran {}\n", step.id))
    }
}

/// Records every observer notification as a readable line.
#[derive(Default)]
pub struct RecordingObserver {
    next: Mutex<u64>,
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn open(&self, line: String) -> AuditNodeId {
        self.events.lock().unwrap().push(line);
        let mut next = self.next.lock().unwrap();
        *next += 1;
        AuditNodeId(*next)
    }

    fn close(&self, kind: &str, result: &ExecResult, state: NodeState, level: usize) {
        self.events.lock().unwrap().push(format!(
            "after {} {} {} L{}",
            kind,
            state.as_str(),
            result.code,
            level
        ));
    }
}

impl AuditObserver for RecordingObserver {
    fn before_stand(&self, stand: &TestStand, _: Option<AuditNodeId>, level: usize) -> AuditNodeId {
        self.open(format!("before stand {} L{}", stand.id, level))
    }
    fn after_stand(&self, _: AuditNodeId, result: &ExecResult, state: NodeState, level: usize) {
        self.close("stand", result, state, level);
    }
    fn before_group(&self, group: &TestGroup, _: Option<AuditNodeId>, level: usize) -> AuditNodeId {
        self.open(format!("before group {} L{}", group.id, level))
    }
    fn after_group(&self, _: AuditNodeId, result: &ExecResult, state: NodeState, level: usize) {
        self.close("group", result, state, level);
    }
    fn before_case(&self, case: &TestCase, _: Option<AuditNodeId>, level: usize) -> AuditNodeId {
        self.open(format!("before case {} L{}", case.id, level))
    }
    fn after_case(&self, _: AuditNodeId, result: &ExecResult, state: NodeState, level: usize) {
        self.close("case", result, state, level);
    }
    fn before_step(&self, step: &TestStep, _: Option<AuditNodeId>, level: usize) -> AuditNodeId {
        self.open(format!("before step {} L{}", step.id, level))
    }
    fn after_step(&self, _: AuditNodeId, result: &ExecResult, state: NodeState, _: &str, level: usize) {
        self.close("step", result, state, level);
    }
}

pub fn store(definitions: &str) -> Arc<TomlStore> {
    Arc::new(TomlStore::from_toml(definitions).expect("Failed to parse test definitions"))
}

/// An engine over `definitions` that runs every step through `runner`.
pub fn fake_engine(
    definitions: &str,
    runner: Arc<FakeRunner>,
    observer: Arc<RecordingObserver>,
) -> Engine {
    Engine::new(
        store(definitions),
        EnvCtx::new(),
        Runners::uniform(runner),
        observer,
    )
}

/// A scratch directory with `scripts/` and `modules/` roots and a temp area.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempdir().expect("Failed to create temporary directory");
        fs::create_dir_all(dir.path().join("scripts")).unwrap();
        fs::create_dir_all(dir.path().join("modules")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn scripts(&self) -> PathBuf {
        self.path().join("scripts")
    }

    pub fn modules(&self) -> PathBuf {
        self.path().join("modules")
    }

    pub fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.scripts().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    /// A harness config whose temp files and reports live inside this workspace.
    pub fn write_config(&self) -> PathBuf {
        let root = self.path().display().to_string();
        let content = format!(
            r#"language = "en"

[script]
root = "{root}/scripts"
temp_file = "{root}/tmp/inline_script.sh"
launcher = "sh"

[module]
root = "{root}/modules"
temp_file = "{root}/tmp/inline_module.sh"
launcher = "sh"

[audit]
report_dir = "{root}/reports"
title = "Integration Audit"

[run]
stop_timeout_secs = 5
"#
        );
        let path = self.path().join("SatHarness.toml");
        fs::write(&path, content).unwrap();
        path
    }

    pub fn write_definitions(&self, content: &str) -> PathBuf {
        let path = self.path().join("definitions.toml");
        fs::write(&path, content).unwrap();
        path
    }
}
