//! # Run Planning Module / 运行计划模块
//!
//! This module turns a command-line selection into a `RunTarget` and walks the
//! definition graph without executing anything, so a run can be previewed:
//! how many groups, cases and steps it reaches, which of them are disabled,
//! which references dangle, and which group edges close a cycle.
//!
//! 此模块将命令行选择转换为 `RunTarget`，并在不执行任何内容的情况下遍历定义图，
//! 以便预览一次运行：会涉及多少测试组、用例和步骤，其中哪些被禁用，
//! 哪些引用悬空，以及哪些测试组边构成了环。

use anyhow::{Result, bail};
use std::collections::HashSet;

use crate::core::execution::RunTarget;
use crate::core::store::DefinitionStore;

/// What the user picked on the command line. The value is an identity or,
/// failing that, the name of an enabled entity.
///
/// 用户在命令行上选择的内容。值为实体标识，或者（若无匹配标识）已启用实体的名称。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Stand(String),
    Group { key: String, force: bool },
    Case(String),
    Step(String),
}

/// Resolves a selection against the store.
///
/// # Errors
/// Fails if nothing matches, or if a name matches more than one entity.
pub fn resolve_target(store: &dyn DefinitionStore, selector: &Selector) -> Result<RunTarget> {
    fn pick<'a>(
        kind: &str,
        key: &str,
        by_id: bool,
        by_name: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> Result<String> {
        if by_id {
            return Ok(key.to_string());
        }
        let matches: Vec<&str> = by_name
            .filter(|(_, name)| *name == key)
            .map(|(id, _)| id)
            .collect();
        match matches.as_slice() {
            [id] => Ok(id.to_string()),
            [] => bail!("No {} with identity or name '{}'.", kind, key),
            _ => bail!(
                "The {} name '{}' is ambiguous; use one of the identities: {}",
                kind,
                key,
                matches.join(", ")
            ),
        }
    }

    Ok(match selector {
        Selector::Stand(key) => RunTarget::Stand(pick(
            "stand",
            key,
            store.stand(key).is_some(),
            store.enabled_stands().into_iter().map(|s| (s.id.as_str(), s.name.as_str())),
        )?),
        Selector::Group { key, force } => RunTarget::Group {
            id: pick(
                "group",
                key,
                store.group(key).is_some(),
                store.enabled_groups().into_iter().map(|g| (g.id.as_str(), g.name.as_str())),
            )?,
            force: *force,
        },
        Selector::Case(key) => RunTarget::Case(pick(
            "case",
            key,
            store.case(key).is_some(),
            store.enabled_cases().into_iter().map(|c| (c.id.as_str(), c.name.as_str())),
        )?),
        Selector::Step(key) => RunTarget::Step(pick(
            "step",
            key,
            store.step(key).is_some(),
            store.enabled_steps().into_iter().map(|s| (s.id.as_str(), s.name.as_str())),
        )?),
    })
}

/// A dry-run view of what a target reaches.
/// 目标所涉及内容的预演视图。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Distinct groups reached; a group referenced twice runs once unless forced.
    pub groups: usize,
    pub cases: usize,
    pub steps: usize,
    /// Disabled entities, as `kind 'id'`. Their subtrees are not counted.
    pub disabled: Vec<String>,
    /// References to identities the store does not define.
    pub missing: Vec<String>,
    /// Group chains that close a cycle, e.g. `a -> b -> a`.
    pub cycles: Vec<String>,
}

impl RunPlan {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.cycles.is_empty()
    }
}

struct PlanWalker<'s> {
    store: &'s dyn DefinitionStore,
    plan: RunPlan,
    seen_groups: HashSet<String>,
    seen_cases: HashSet<String>,
    seen_steps: HashSet<String>,
    path: Vec<String>,
}

impl<'s> PlanWalker<'s> {
    fn stand(&mut self, id: &str) {
        let Some(stand) = self.store.stand(id) else {
            self.plan.missing.push(format!("stand '{}'", id));
            return;
        };
        if !stand.enabled {
            self.plan.disabled.push(format!("stand '{}'", id));
            return;
        }
        for group in &stand.groups {
            self.group(group);
        }
    }

    fn group(&mut self, id: &str) {
        if let Some(start) = self.path.iter().position(|g| g == id) {
            let mut chain = self.path[start..].to_vec();
            chain.push(id.to_string());
            self.plan.cycles.push(chain.join(" -> "));
            return;
        }
        let Some(group) = self.store.group(id) else {
            self.plan.missing.push(format!("group '{}'", id));
            return;
        };
        if !self.seen_groups.insert(id.to_string()) {
            return;
        }
        if !group.enabled {
            self.plan.disabled.push(format!("group '{}'", id));
            return;
        }
        self.plan.groups += 1;
        self.path.push(id.to_string());
        for edge in &group.children {
            self.group(&edge.group);
        }
        for case in &group.cases {
            self.case(case);
        }
        self.path.pop();
    }

    fn case(&mut self, id: &str) {
        let Some(case) = self.store.case(id) else {
            self.plan.missing.push(format!("case '{}'", id));
            return;
        };
        if !self.seen_cases.insert(id.to_string()) {
            return;
        }
        if !case.enabled {
            self.plan.disabled.push(format!("case '{}'", id));
            return;
        }
        self.plan.cases += 1;
        let steps = case
            .init_step
            .iter()
            .chain(case.ordered_sequence().into_iter().map(|entry| &entry.step))
            .chain(case.cleanup_step.iter());
        for step in steps {
            self.step(step);
        }
    }

    fn step(&mut self, id: &str) {
        let Some(step) = self.store.step(id) else {
            self.plan.missing.push(format!("step '{}'", id));
            return;
        };
        if !self.seen_steps.insert(id.to_string()) {
            return;
        }
        if !step.enabled {
            self.plan.disabled.push(format!("step '{}'", id));
            return;
        }
        self.plan.steps += 1;
    }
}

/// Walks the definitions reachable from `target` without running anything.
///
/// 在不运行任何内容的情况下遍历从 `target` 可达的定义。
pub fn plan_run(store: &dyn DefinitionStore, target: &RunTarget) -> RunPlan {
    let mut walker = PlanWalker {
        store,
        plan: RunPlan::default(),
        seen_groups: HashSet::new(),
        seen_cases: HashSet::new(),
        seen_steps: HashSet::new(),
        path: Vec::new(),
    };
    match target {
        RunTarget::Stand(id) => walker.stand(id),
        RunTarget::Group { id, .. } => walker.group(id),
        RunTarget::Case(id) => walker.case(id),
        RunTarget::Step(id) => walker.step(id),
    }
    walker.plan
}
