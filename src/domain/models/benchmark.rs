//! Benchmarks: named bundles of task templates, and evals materialised
//! from them.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::errors::{TrackerError, TrackerResult};

use super::device::{Device, DeviceType};
use super::task::Task;
use super::wire::{V1Benchmark, V1Eval, V1Task, V1TaskTemplate};
use super::{now_ts, short_id};

/// A parametric task description without runtime state.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTemplate {
    pub id: String,
    pub owner_id: Option<String>,
    pub description: String,
    pub max_steps: u32,
    pub device: Option<Device>,
    pub device_type: Option<DeviceType>,
    pub expect_schema: Option<Value>,
    pub parameters: BTreeMap<String, Value>,
    pub tags: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub created: f64,
}

impl TaskTemplate {
    pub fn new(description: impl Into<String>, owner_id: Option<String>) -> Self {
        Self {
            id: short_id(),
            owner_id,
            description: description.into(),
            max_steps: 30,
            device: None,
            device_type: None,
            expect_schema: None,
            parameters: BTreeMap::new(),
            tags: Vec::new(),
            labels: BTreeMap::new(),
            created: now_ts(),
        }
    }

    /// Instantiate a fresh task from this template.
    pub fn to_task(
        &self,
        assigned_to: Option<&str>,
        assigned_type: Option<&str>,
        owner_id: Option<&str>,
    ) -> Task {
        let owner = owner_id
            .map(ToString::to_string)
            .or_else(|| self.owner_id.clone());
        let mut task = Task::new(self.description.clone(), owner);
        task.max_steps = self.max_steps;
        task.device = self.device.clone();
        task.device_type = self.device_type.clone();
        task.expect_schema = self.expect_schema.clone();
        task.parameters = self.parameters.clone();
        task.labels = self.labels.clone();
        task.tags = self.tags.clone();
        task.assigned_to = assigned_to.map(ToString::to_string);
        task.assigned_type = assigned_type.map(ToString::to_string);
        task.version = task.compute_version().ok();
        task
    }

    pub fn to_v1(&self) -> V1TaskTemplate {
        V1TaskTemplate {
            id: self.id.clone(),
            description: self.description.clone(),
            max_steps: self.max_steps,
            device: self.device.clone(),
            device_type: self.device_type.clone(),
            expect_schema: self.expect_schema.clone(),
            parameters: self.parameters.clone(),
            owner_id: self.owner_id.clone(),
            tags: self.tags.clone(),
            labels: self.labels.clone(),
            created: self.created,
        }
    }

    pub fn from_v1(v1: V1TaskTemplate, owner_id: Option<&str>) -> TrackerResult<Self> {
        let owner = owner_id
            .map(ToString::to_string)
            .or_else(|| v1.owner_id.clone());
        if v1.description.trim().is_empty() {
            return Err(TrackerError::validation("description", "must not be empty"));
        }
        Ok(Self {
            id: v1.id,
            owner_id: owner,
            description: v1.description,
            max_steps: v1.max_steps,
            device: v1.device,
            device_type: v1.device_type,
            expect_schema: v1.expect_schema,
            parameters: v1.parameters,
            tags: v1.tags,
            labels: v1.labels,
            created: v1.created,
        })
    }
}

/// A named bundle of task templates. Names are globally unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Benchmark {
    pub id: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub description: String,
    pub tasks: Vec<TaskTemplate>,
    pub labels: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub public: bool,
    pub created: f64,
}

impl Benchmark {
    /// Build a benchmark. Every template is stamped with a
    /// `benchmark=<name>` label on insertion.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        mut tasks: Vec<TaskTemplate>,
        owner_id: Option<String>,
    ) -> Self {
        let name = name.into();
        for template in &mut tasks {
            template
                .labels
                .insert("benchmark".to_string(), name.clone());
        }
        Self {
            id: short_id(),
            owner_id,
            name,
            description: description.into(),
            tasks,
            labels: BTreeMap::new(),
            tags: Vec::new(),
            public: false,
            created: now_ts(),
        }
    }

    /// Materialise an eval: one fresh task per template, labelled with the
    /// benchmark name and assigned as requested.
    pub fn eval(
        &self,
        assigned_to: Option<&str>,
        assigned_type: Option<&str>,
        owner_id: Option<&str>,
    ) -> Eval {
        let tasks = self
            .tasks
            .iter()
            .map(|tpl| {
                let mut task = tpl.to_task(assigned_to, assigned_type, owner_id);
                task.labels
                    .insert("benchmark".to_string(), self.name.clone());
                task
            })
            .collect();
        Eval {
            id: short_id(),
            benchmark_id: self.id.clone(),
            tasks,
            owner_id: owner_id
                .map(ToString::to_string)
                .or_else(|| self.owner_id.clone()),
            assigned_to: assigned_to.map(ToString::to_string),
            assigned_type: assigned_type.map(ToString::to_string),
            created: now_ts(),
        }
    }

    pub fn to_v1(&self) -> V1Benchmark {
        V1Benchmark {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            tasks: self.tasks.iter().map(TaskTemplate::to_v1).collect(),
            owner_id: self.owner_id.clone(),
            tags: self.tags.clone(),
            labels: self.labels.clone(),
            created: self.created,
            public: self.public,
        }
    }

    pub fn from_v1(v1: V1Benchmark, owner_id: Option<&str>) -> TrackerResult<Self> {
        let owner = owner_id
            .map(ToString::to_string)
            .or_else(|| v1.owner_id.clone());
        if owner.is_none() {
            return Err(TrackerError::validation("owner_id", "owner id is required"));
        }
        if v1.name.trim().is_empty() {
            return Err(TrackerError::validation("name", "must not be empty"));
        }
        let mut tasks = Vec::with_capacity(v1.tasks.len());
        for template in v1.tasks {
            tasks.push(TaskTemplate::from_v1(template, owner.as_deref())?);
        }
        for template in &mut tasks {
            template
                .labels
                .insert("benchmark".to_string(), v1.name.clone());
        }
        Ok(Self {
            id: v1.id,
            owner_id: owner,
            name: v1.name,
            description: v1.description,
            tasks,
            labels: v1.labels,
            tags: v1.tags,
            public: v1.public,
            created: v1.created,
        })
    }
}

/// A materialised run of a benchmark against an assignee.
#[derive(Debug, Clone, PartialEq)]
pub struct Eval {
    pub id: String,
    pub benchmark_id: String,
    pub tasks: Vec<Task>,
    pub owner_id: Option<String>,
    pub assigned_to: Option<String>,
    pub assigned_type: Option<String>,
    pub created: f64,
}

impl Eval {
    pub fn to_v1(&self, benchmark: &Benchmark) -> V1Eval {
        V1Eval {
            id: Some(self.id.clone()),
            benchmark: benchmark.to_v1(),
            tasks: self.tasks.iter().map(Task::to_v1).collect(),
            assigned_to: self.assigned_to.clone(),
            assigned_type: self.assigned_type.clone(),
            owner_id: self.owner_id.clone(),
        }
    }

    pub fn from_v1(v1: V1Eval, benchmark_id: &str, owner_id: Option<&str>) -> TrackerResult<Self> {
        let mut tasks = Vec::with_capacity(v1.tasks.len());
        for task in v1.tasks {
            tasks.push(Task::from_v1(task, owner_id)?);
        }
        Ok(Self {
            id: v1.id.unwrap_or_else(short_id),
            benchmark_id: benchmark_id.to_string(),
            tasks,
            owner_id: owner_id
                .map(ToString::to_string)
                .or(v1.owner_id),
            assigned_to: v1.assigned_to,
            assigned_type: v1.assigned_type,
            created: now_ts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(description: &str) -> TaskTemplate {
        TaskTemplate::new(description, Some("owner@x.com".into()))
    }

    #[test]
    fn test_benchmark_stamps_templates() {
        let bench = Benchmark::new(
            "test-bench",
            "two surfaces",
            vec![template("desktop"), template("mobile")],
            Some("owner@x.com".into()),
        );
        for tpl in &bench.tasks {
            assert_eq!(tpl.labels.get("benchmark").map(String::as_str), Some("test-bench"));
        }
    }

    #[test]
    fn test_eval_materialises_one_task_per_template() {
        let bench = Benchmark::new(
            "test-bench",
            "two surfaces",
            vec![template("desktop"), template("mobile")],
            Some("owner@x.com".into()),
        );
        let eval = bench.eval(Some("test_agent"), Some("pizza"), Some("owner@x.com"));
        assert_eq!(eval.tasks.len(), 2);
        for task in &eval.tasks {
            assert_eq!(task.assigned_to.as_deref(), Some("test_agent"));
            assert_eq!(task.assigned_type.as_deref(), Some("pizza"));
            assert_eq!(task.labels.get("benchmark").map(String::as_str), Some("test-bench"));
            assert!(task.thread("feed").is_some());
        }
        // Materialised tasks are fresh: distinct ids and episodes.
        assert_ne!(eval.tasks[0].id, eval.tasks[1].id);
        assert_ne!(eval.tasks[0].episode.id, eval.tasks[1].episode.id);
    }

    #[test]
    fn test_template_to_task_copies_parametric_fields() {
        let mut tpl = template("parameterised");
        tpl.parameters.insert("site".into(), serde_json::json!("example.com"));
        tpl.tags.push("smoke".into());
        let task = tpl.to_task(None, None, None);
        assert_eq!(task.description.as_deref(), Some("parameterised"));
        assert_eq!(task.parameters.get("site"), tpl.parameters.get("site"));
        assert_eq!(task.tags, tpl.tags);
        assert_eq!(task.owner_id, tpl.owner_id);
    }
}
