//! # Environment Context Module / 环境上下文模块
//!
//! A shared key/value store that carries configuration between steps and into
//! every subprocess a step launches. Vehicle profiles are exported into it
//! before a run, steps export values back through a marker syntax in their
//! output, and the cooperative stop flag of the current run lives here too.
//!
//! 一个共享的键值存储，在步骤之间以及步骤启动的每个子进程中传递配置。
//! 运行前车辆配置会导出到其中，步骤通过输出中的标记语法回写值，
//! 当前运行的协作式停止标志也保存在这里。

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use colored::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::store::DefinitionStore;
use crate::infra::t;

/// Prefix reserved for harness-owned and step-exported keys.
/// 为测试台自有键和步骤导出键保留的前缀。
pub const SAT_PREFIX: &str = "SAT_";

/// Output marker a step prints to export a value: `@@SAT_ENV KEY=VALUE`.
pub const EXPORT_MARKER: &str = "@@SAT_ENV";

/// Key mirrored to `true` when a stop has been requested.
pub const STOP_KEY: &str = "SAT_STOP_REQUESTED";

static VAR_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Failed to compile variable regex")
});

/// A value stored in the environment context.
/// 环境上下文中存储的值。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    Str(String),
    Bool(bool),
    Time(DateTime<Local>),
    Record(serde_json::Value),
}

impl EnvValue {
    fn type_name(&self) -> &'static str {
        match self {
            EnvValue::Str(_) => "string",
            EnvValue::Bool(_) => "bool",
            EnvValue::Time(_) => "timestamp",
            EnvValue::Record(_) => "record",
        }
    }
}

/// Renders the value the way a subprocess sees it.
impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Str(s) => f.write_str(s),
            EnvValue::Bool(b) => write!(f, "{}", b),
            EnvValue::Time(t) => f.write_str(&t.to_rfc3339()),
            EnvValue::Record(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        EnvValue::Str(value.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        EnvValue::Str(value)
    }
}

impl From<bool> for EnvValue {
    fn from(value: bool) -> Self {
        EnvValue::Bool(value)
    }
}

impl From<DateTime<Local>> for EnvValue {
    fn from(value: DateTime<Local>) -> Self {
        EnvValue::Time(value)
    }
}

impl From<serde_json::Value> for EnvValue {
    fn from(value: serde_json::Value) -> Self {
        EnvValue::Record(value)
    }
}

/// The environment context. Cloning yields another handle to the same store.
///
/// 环境上下文。克隆会得到指向同一存储的另一个句柄。
#[derive(Clone, Default)]
pub struct EnvCtx {
    values: Arc<RwLock<BTreeMap<String, EnvValue>>>,
    stop: Arc<Mutex<CancellationToken>>,
}

impl fmt::Debug for EnvCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvCtx")
            .field("keys", &self.read().len())
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}

impl EnvCtx {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, EnvValue>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, EnvValue>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<EnvValue>) {
        self.write().insert(key.into(), value.into());
    }

    pub fn unset(&self, key: &str) -> Option<EnvValue> {
        self.write().remove(key)
    }

    /// Returns the value for `key`, or `None` if it is absent.
    pub fn query(&self, key: &str) -> Option<EnvValue> {
        self.read().get(key).cloned()
    }

    fn get(&self, key: &str) -> Result<EnvValue> {
        self.query(key)
            .ok_or_else(|| anyhow!("Environment key '{}' is not set.", key))
    }

    fn mismatch(key: &str, expected: &str, found: &EnvValue) -> anyhow::Error {
        anyhow!(
            "Environment key '{}' holds a {}, expected a {}.",
            key,
            found.type_name(),
            expected
        )
    }

    pub fn get_str(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            EnvValue::Str(s) => Ok(s),
            other => Err(Self::mismatch(key, "string", &other)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            EnvValue::Bool(b) => Ok(b),
            other => Err(Self::mismatch(key, "bool", &other)),
        }
    }

    pub fn get_time(&self, key: &str) -> Result<DateTime<Local>> {
        match self.get(key)? {
            EnvValue::Time(t) => Ok(t),
            other => Err(Self::mismatch(key, "timestamp", &other)),
        }
    }

    pub fn get_record(&self, key: &str) -> Result<serde_json::Value> {
        match self.get(key)? {
            EnvValue::Record(v) => Ok(v),
            other => Err(Self::mismatch(key, "record", &other)),
        }
    }

    /// Pretty JSON of every stored value, for diagnostics.
    /// 所有存储值的格式化 JSON，用于诊断。
    pub fn dump(&self) -> String {
        serde_json::to_string_pretty(&*self.read()).unwrap_or_default()
    }

    /// Rewrites `${KEY}` references in each entry using the current values.
    /// References to absent keys are left untouched.
    ///
    /// 使用当前值重写每个条目中的 `${KEY}` 引用。未设置的键的引用保持不变。
    pub fn explain_env_in_list(&self, list: &[String]) -> Vec<String> {
        let values = self.read();
        list.iter()
            .map(|entry| {
                VAR_REF
                    .replace_all(entry, |caps: &regex::Captures| match values.get(&caps[1]) {
                        Some(value) => value.to_string(),
                        None => caps[0].to_string(),
                    })
                    .into_owned()
            })
            .collect()
    }

    /// Returns the ambient process environment overlaid with every stored value,
    /// ready to be installed as a child process environment.
    ///
    /// 返回叠加了所有存储值的进程环境，可直接作为子进程环境使用。
    pub fn fork_sat_env(&self) -> BTreeMap<String, String> {
        let mut snapshot: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        for (key, value) in self.read().iter() {
            snapshot.insert(key.clone(), value.to_string());
        }
        snapshot
    }

    /// Scans captured output for `@@SAT_ENV KEY=VALUE` lines and stores each
    /// pair under the reserved prefix. Returns the number of values merged.
    ///
    /// 扫描捕获的输出中的 `@@SAT_ENV KEY=VALUE` 行，并以保留前缀存储每一对。
    /// 返回合并的值的数量。
    pub fn read_sat_env_from_log(&self, log: &str) -> usize {
        let mut merged = 0;
        for line in log.lines() {
            let Some(rest) = line.trim().strip_prefix(EXPORT_MARKER) else {
                continue;
            };
            if !rest.starts_with(char::is_whitespace) {
                continue;
            }
            match parse_assignment(rest) {
                Some((key, value)) => {
                    self.set(prefixed(key), value);
                    merged += 1;
                }
                None => eprintln!(
                    "{}",
                    t!("env.malformed_export", line = line.trim()).yellow()
                ),
            }
        }
        merged
    }

    /// Populates the store from a vehicle profile: identity and connectivity
    /// attributes first, then the free-text attribute blocks of the vehicle,
    /// its model and its pass condition (later blocks override earlier ones).
    ///
    /// 从车辆配置填充存储：先是标识和连接属性，然后依次是车辆、车型和通过条件的
    /// 自由文本属性块（后面的块覆盖前面的）。
    pub fn update_vehicle_env(&self, store: &dyn DefinitionStore, vehicle_id: &str) -> Result<()> {
        let vehicle = store
            .vehicle(vehicle_id)
            .ok_or_else(|| anyhow!("Vehicle '{}' not found.", vehicle_id))?;

        self.set("SAT_VEHICLE_ID", vehicle.id.as_str());
        self.set("SAT_VEHICLE_NAME", vehicle.name.as_str());
        self.set("SAT_VEHICLE_DESC", vehicle.description.as_str());
        let optional = [
            ("SAT_VEHICLE_PIN", &vehicle.pin),
            ("SAT_VEHICLE_WIFI", &vehicle.wifi),
            ("SAT_VEHICLE_BLE", &vehicle.ble),
            ("SAT_VEHICLE_ADB", &vehicle.adb),
        ];
        for (key, value) in optional {
            match value {
                Some(value) => self.set(key, value.as_str()),
                None => {
                    self.unset(key);
                }
            }
        }
        self.set("SAT_RUN_STARTED", Local::now());

        let mut blocks = vec![("vehicle", vehicle.attributes.as_str())];

        if let Some(model_id) = &vehicle.model {
            let model = store
                .vehicle_model(model_id)
                .with_context(|| format!("Vehicle model '{}' not found.", model_id))?;
            self.set("SAT_MODEL_NAME", model.name.as_str());
            blocks.push(("model", model.attributes.as_str()));
        }
        if let Some(condition_id) = &vehicle.pass_condition {
            let condition = store
                .pass_condition(condition_id)
                .with_context(|| format!("Pass condition '{}' not found.", condition_id))?;
            self.set("SAT_PASS_CONDITION_NAME", condition.name.as_str());
            blocks.push(("pass condition", condition.attributes.as_str()));
        }

        for (source, block) in blocks {
            self.apply_attribute_block(source, block);
        }
        Ok(())
    }

    /// Parses a `KEY=VALUE` block line by line. Blank lines and `#` comments are
    /// ignored; malformed lines are reported and skipped.
    fn apply_attribute_block(&self, source: &str, block: &str) {
        for line in block.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_assignment(line) {
                Some((key, value)) => self.set(key, value),
                None => eprintln!(
                    "{}",
                    t!("env.malformed_attribute", source = source, line = line).yellow()
                ),
            }
        }
    }

    /// Requests a cooperative stop of the current run.
    /// 请求协作式停止当前运行。
    pub fn request_stop(&self) {
        self.stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        self.set(STOP_KEY, true);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_cancelled()
    }

    /// Arms a fresh stop flag for a new run.
    pub fn reset_stop(&self) {
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
        self.set(STOP_KEY, false);
    }
}

fn parse_assignment(text: &str) -> Option<(String, String)> {
    let (key, value) = text.split_once('=')?;
    let key = key.trim();
    if !is_key(key) {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Keys share the character set of `${KEY}` references so every stored key can be expanded.
fn is_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn prefixed(key: String) -> String {
    if key.starts_with(SAT_PREFIX) {
        key
    } else {
        format!("{SAT_PREFIX}{key}")
    }
}
