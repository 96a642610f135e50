//! # Test Definition Store Module / 测试定义存储模块
//!
//! The engine only ever reads test definitions. `DefinitionStore` is the
//! read-only seam it reads through; `TomlStore` is the file-backed
//! implementation used by the CLI and the tests.
//!
//! 引擎只读取测试定义。`DefinitionStore` 是它读取数据的只读接口；
//! `TomlStore` 是 CLI 和测试使用的基于文件的实现。

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::core::models::{
    PassCondition, TestCase, TestGroup, TestStand, TestStep, VehicleInfo, VehicleModel,
};

/// Read accessors over externally authored test definitions.
///
/// Lookups take an identity. Listings return enabled entities in stored order.
///
/// 对外部编写的测试定义的只读访问器。
/// 查找接受实体标识；列表按存储顺序返回已启用的实体。
pub trait DefinitionStore: Send + Sync {
    fn stand(&self, id: &str) -> Option<&TestStand>;
    fn group(&self, id: &str) -> Option<&TestGroup>;
    fn case(&self, id: &str) -> Option<&TestCase>;
    fn step(&self, id: &str) -> Option<&TestStep>;

    fn vehicle(&self, id: &str) -> Option<&VehicleInfo>;
    fn vehicle_model(&self, id: &str) -> Option<&VehicleModel>;
    fn pass_condition(&self, id: &str) -> Option<&PassCondition>;

    fn enabled_stands(&self) -> Vec<&TestStand>;
    fn enabled_groups(&self) -> Vec<&TestGroup>;
    fn enabled_cases(&self) -> Vec<&TestCase>;
    fn enabled_steps(&self) -> Vec<&TestStep>;
}

/// On-disk layout of a definitions file.
#[derive(Debug, Default, Deserialize)]
struct DefinitionsFile {
    #[serde(default)]
    stands: Vec<TestStand>,
    #[serde(default)]
    groups: Vec<TestGroup>,
    #[serde(default)]
    cases: Vec<TestCase>,
    #[serde(default)]
    steps: Vec<TestStep>,
    #[serde(default)]
    vehicles: Vec<VehicleInfo>,
    #[serde(default)]
    models: Vec<VehicleModel>,
    #[serde(default)]
    pass_conditions: Vec<PassCondition>,
}

/// Entities of one kind, kept in file order and indexed by identity.
#[derive(Debug)]
struct Table<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Table<T> {
    fn build(kind: &str, rows: Vec<T>, id_of: impl Fn(&T) -> &str) -> Result<Self> {
        let mut index = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let id = id_of(row);
            if index.insert(id.to_string(), i).is_some() {
                bail!("Duplicate {} identity '{}' in definitions.", kind, id);
            }
        }
        Ok(Self { rows, index })
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.rows[i])
    }
}

/// An in-memory store loaded from a TOML definitions file.
/// 从 TOML 定义文件加载的内存存储。
#[derive(Debug)]
pub struct TomlStore {
    stands: Table<TestStand>,
    groups: Table<TestGroup>,
    cases: Table<TestCase>,
    steps: Table<TestStep>,
    vehicles: Table<VehicleInfo>,
    models: Table<VehicleModel>,
    pass_conditions: Table<PassCondition>,
}

impl TomlStore {
    /// Loads definitions from a TOML file.
    /// 从 TOML 文件加载测试定义。
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read definitions: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse definitions: {}", path.display()))
    }

    /// Parses definitions from TOML text. Duplicate identities are rejected.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: DefinitionsFile = toml::from_str(content)?;
        Ok(Self {
            stands: Table::build("stand", file.stands, |s| &s.id)?,
            groups: Table::build("group", file.groups, |g| &g.id)?,
            cases: Table::build("case", file.cases, |c| &c.id)?,
            steps: Table::build("step", file.steps, |s| &s.id)?,
            vehicles: Table::build("vehicle", file.vehicles, |v| &v.id)?,
            models: Table::build("model", file.models, |m| &m.id)?,
            pass_conditions: Table::build("pass condition", file.pass_conditions, |p| &p.id)?,
        })
    }

    /// All vehicle profiles, in file order.
    pub fn vehicles(&self) -> &[VehicleInfo] {
        &self.vehicles.rows
    }

    /// Lists identities referenced somewhere in the file that no entity defines.
    /// Dangling references are not fatal; the engine reports them as failures.
    ///
    /// 列出文件中被引用但没有实体定义的标识。悬空引用不是致命错误，引擎会将其报告为失败。
    pub fn dangling_references(&self) -> Vec<String> {
        let mut missing = HashSet::new();
        for stand in &self.stands.rows {
            for group in &stand.groups {
                if self.groups.get(group).is_none() {
                    missing.insert(format!("group '{}' (stand '{}')", group, stand.id));
                }
            }
        }
        for group in &self.groups.rows {
            for edge in &group.children {
                if self.groups.get(&edge.group).is_none() {
                    missing.insert(format!("group '{}' (group '{}')", edge.group, group.id));
                }
            }
            for case in &group.cases {
                if self.cases.get(case).is_none() {
                    missing.insert(format!("case '{}' (group '{}')", case, group.id));
                }
            }
        }
        for case in &self.cases.rows {
            let steps = case
                .init_step
                .iter()
                .chain(case.cleanup_step.iter())
                .chain(case.sequence.iter().map(|entry| &entry.step));
            for step in steps {
                if self.steps.get(step).is_none() {
                    missing.insert(format!("step '{}' (case '{}')", step, case.id));
                }
            }
        }
        let mut missing: Vec<String> = missing.into_iter().collect();
        missing.sort();
        missing
    }
}

impl DefinitionStore for TomlStore {
    fn stand(&self, id: &str) -> Option<&TestStand> {
        self.stands.get(id)
    }

    fn group(&self, id: &str) -> Option<&TestGroup> {
        self.groups.get(id)
    }

    fn case(&self, id: &str) -> Option<&TestCase> {
        self.cases.get(id)
    }

    fn step(&self, id: &str) -> Option<&TestStep> {
        self.steps.get(id)
    }

    fn vehicle(&self, id: &str) -> Option<&VehicleInfo> {
        self.vehicles.get(id)
    }

    fn vehicle_model(&self, id: &str) -> Option<&VehicleModel> {
        self.models.get(id)
    }

    fn pass_condition(&self, id: &str) -> Option<&PassCondition> {
        self.pass_conditions.get(id)
    }

    fn enabled_stands(&self) -> Vec<&TestStand> {
        self.stands.rows.iter().filter(|s| s.enabled).collect()
    }

    fn enabled_groups(&self) -> Vec<&TestGroup> {
        self.groups.rows.iter().filter(|g| g.enabled).collect()
    }

    fn enabled_cases(&self) -> Vec<&TestCase> {
        self.cases.rows.iter().filter(|c| c.enabled).collect()
    }

    fn enabled_steps(&self) -> Vec<&TestStep> {
        self.steps.rows.iter().filter(|s| s.enabled).collect()
    }
}
