//! Task registry
//!
//! Every task is registered explicitly under its name, either as an action
//! (a function run against the [`Runner`]) or as a series of steps that refer
//! to other tasks by name. The registry is validated once at startup: every
//! referenced task must exist and no task may reach itself.

use crate::error::{ConfigError, ConfigResult};
use crate::runner::Runner;
use crate::tasks;
use std::collections::{BTreeMap, HashSet};

/// Body of an action task
pub type Action = fn(&Runner) -> anyhow::Result<()>;

/// What a task does when it runs
#[derive(Clone)]
pub enum TaskBody {
    /// Run a single action
    Action(Action),

    /// Run the steps one after another, stopping at the first failure
    Series(Vec<Step>),
}

/// One step of a series
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Run a single task
    Task(String),

    /// Run all tasks concurrently and wait for every one of them
    Parallel(Vec<String>),
}

impl Step {
    pub fn task(name: &str) -> Self {
        Step::Task(name.to_string())
    }

    pub fn parallel(names: &[&str]) -> Self {
        Step::Parallel(names.iter().map(|n| n.to_string()).collect())
    }

    /// Names of the tasks this step runs
    pub fn task_names(&self) -> Vec<&str> {
        match self {
            Step::Task(name) => vec![name.as_str()],
            Step::Parallel(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// A registered task
#[derive(Clone)]
pub struct TaskDef {
    /// Task name
    pub name: String,

    /// Usage description for help text
    pub usage: String,

    /// Whether this task is private (hidden from the command line)
    pub private: bool,

    /// What the task does
    pub body: TaskBody,
}

impl TaskDef {
    pub fn action(name: &str, usage: &str, action: Action) -> Self {
        TaskDef {
            name: name.to_string(),
            usage: usage.to_string(),
            private: false,
            body: TaskBody::Action(action),
        }
    }

    pub fn series(name: &str, usage: &str, steps: Vec<Step>) -> Self {
        TaskDef {
            name: name.to_string(),
            usage: usage.to_string(),
            private: false,
            body: TaskBody::Series(steps),
        }
    }

    /// Hide the task from the command line
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Names of the tasks this task runs, in declaration order
    pub fn dependencies(&self) -> Vec<&str> {
        match &self.body {
            TaskBody::Action(_) => Vec::new(),
            TaskBody::Series(steps) => steps.iter().flat_map(Step::task_names).collect(),
        }
    }
}

impl std::fmt::Debug for TaskDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match &self.body {
            TaskBody::Action(_) => "action".to_string(),
            TaskBody::Series(steps) => format!("series {:?}", steps),
        };
        f.debug_struct("TaskDef")
            .field("name", &self.name)
            .field("private", &self.private)
            .field("body", &body)
            .finish()
    }
}

/// Name → task mapping plus the task run when none is named
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: BTreeMap<String, TaskDef>,
    default_task: Option<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard asset pipeline
    pub fn standard() -> Self {
        let generate = Step::parallel(&["styles", "scripts", "images", "copy"]);

        let mut registry = Registry::new();
        registry.register(TaskDef::action(
            "styles",
            "Compile the stylesheet entry point to CSS",
            tasks::styles,
        ));
        registry.register(TaskDef::action(
            "scripts",
            "Bundle and transpile the script entry point",
            tasks::scripts,
        ));
        registry.register(TaskDef::action(
            "images",
            "Copy images, optimized in production",
            tasks::images,
        ));
        registry.register(TaskDef::action(
            "copy",
            "Copy all other source files to the output root",
            tasks::copy,
        ));
        registry.register(TaskDef::action(
            "clean",
            "Delete the output root",
            tasks::clean,
        ));
        registry.register(
            TaskDef::action("serve", "Start the live-reloading proxy", tasks::serve).private(),
        );
        registry.register(
            TaskDef::action("reload", "Reload connected browsers", tasks::reload).private(),
        );
        registry.register(
            TaskDef::action("watch", "Rebuild and reload on changes", tasks::watch).private(),
        );
        registry.register(TaskDef::series(
            "build",
            "Clean, then generate all assets",
            vec![Step::task("clean"), generate.clone()],
        ));
        registry.register(TaskDef::series(
            "dev",
            "Build, then serve and watch with live reload",
            vec![
                Step::task("clean"),
                generate,
                Step::task("serve"),
                Step::task("watch"),
            ],
        ));
        registry.set_default("dev");
        registry
    }

    /// Register a task, replacing any task of the same name
    pub fn register(&mut self, task: TaskDef) {
        self.tasks.insert(task.name.clone(), task);
    }

    /// Set the task run when no task is named
    pub fn set_default(&mut self, name: &str) {
        self.default_task = Some(name.to_string());
    }

    pub fn default_task(&self) -> Option<&str> {
        self.default_task.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.get(name)
    }

    /// All tasks, sorted by name
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.values()
    }

    /// Tasks that can be invoked from the command line
    pub fn public_tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.values().filter(|t| !t.private)
    }

    /// Check that every reference resolves and that there are no cycles
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(name) = &self.default_task {
            if !self.tasks.contains_key(name) {
                return Err(ConfigError::TaskNotFound(name.clone()));
            }
        }

        for task_name in self.tasks.keys() {
            let mut visited = HashSet::new();
            let mut stack = Vec::new();
            self.check_task_cycle(task_name, &mut visited, &mut stack)?;
        }
        Ok(())
    }

    /// Recursively check for cycles in task dependencies
    fn check_task_cycle(
        &self,
        task_name: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> ConfigResult<()> {
        // Check if we've found a cycle
        if stack.iter().any(|t| t == task_name) {
            stack.push(task_name.to_string());
            return Err(ConfigError::CircularDependency(stack.join(" -> ")));
        }

        // Skip if already fully processed
        if visited.contains(task_name) {
            return Ok(());
        }

        let task = self
            .tasks
            .get(task_name)
            .ok_or_else(|| ConfigError::TaskNotFound(task_name.to_string()))?;

        stack.push(task_name.to_string());
        for dependency in task.dependencies() {
            self.check_task_cycle(dependency, visited, stack)?;
        }
        stack.pop();
        visited.insert(task_name.to_string());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &Runner) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_standard_registry_is_valid() {
        let registry = Registry::standard();
        assert!(registry.validate().is_ok());
        assert_eq!(registry.default_task(), Some("dev"));
    }

    #[test]
    fn test_standard_public_tasks() {
        let registry = Registry::standard();
        let public: Vec<&str> = registry.public_tasks().map(|t| t.name.as_str()).collect();
        assert_eq!(
            public,
            vec!["build", "clean", "copy", "dev", "images", "scripts", "styles"]
        );
        assert!(registry.get("serve").unwrap().private);
    }

    #[test]
    fn test_standard_build_and_dev_sequences() {
        let registry = Registry::standard();
        assert_eq!(
            registry.get("build").unwrap().dependencies(),
            vec!["clean", "styles", "scripts", "images", "copy"]
        );
        assert_eq!(
            registry.get("dev").unwrap().dependencies(),
            vec!["clean", "styles", "scripts", "images", "copy", "serve", "watch"]
        );
    }

    #[test]
    fn test_missing_dependency() {
        let mut registry = Registry::new();
        registry.register(TaskDef::series(
            "all",
            "",
            vec![Step::task("a"), Step::task("missing")],
        ));
        registry.register(TaskDef::action("a", "", noop));

        let result = registry.validate();
        assert!(matches!(result, Err(ConfigError::TaskNotFound(name)) if name == "missing"));
    }

    #[test]
    fn test_missing_default_task() {
        let mut registry = Registry::new();
        registry.set_default("dev");
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_detect_circular_dependency() {
        let mut registry = Registry::new();
        registry.register(TaskDef::series("a", "", vec![Step::task("b")]));
        registry.register(TaskDef::series(
            "b",
            "",
            vec![Step::parallel(&["c", "a"])],
        ));
        registry.register(TaskDef::action("c", "", noop));

        let result = registry.validate();
        assert!(matches!(result, Err(ConfigError::CircularDependency(_))));
    }
}
