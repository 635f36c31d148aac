//! Task execution
//!
//! The runner executes registered tasks by name. Series run their steps in
//! order and stop at the first failure; parallel steps run every task of the
//! group on the rayon pool and fail with the first error in declaration order
//! once all of them have finished.

use crate::error::{TaskError, TaskResult};
use crate::runner::{Context, Registry, Step, TaskBody};
use rayon::prelude::*;
use std::time::Instant;

/// Executes tasks from a registry against a context
pub struct Runner {
    registry: Registry,
    context: Context,
}

impl Runner {
    pub fn new(registry: Registry, context: Context) -> Self {
        Runner { registry, context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run a task by name
    pub fn run(&self, name: &str) -> TaskResult<()> {
        let mut stack = Vec::new();
        self.run_with_stack(name, &mut stack)
    }

    /// Run tasks one after another, stopping at the first failure
    pub fn run_series(&self, names: &[&str]) -> TaskResult<()> {
        for name in names {
            self.run(name)?;
        }
        Ok(())
    }

    /// Run a task, tracking the chain of tasks that led to it
    fn run_with_stack(&self, name: &str, stack: &mut Vec<String>) -> TaskResult<()> {
        // Check for recursion
        if stack.iter().any(|t| t == name) {
            return Err(TaskError::Recursion(name.to_string()));
        }

        let task = self
            .registry
            .get(name)
            .ok_or_else(|| TaskError::NotFound(name.to_string()))?;

        let reporter = self.context.reporter;
        let started = Instant::now();
        reporter.task_start(name);
        stack.push(name.to_string());

        let result = match &task.body {
            TaskBody::Action(action) => action(self).map_err(|source| TaskError::Failed {
                task: name.to_string(),
                source,
            }),
            TaskBody::Series(steps) => self.run_steps(steps, stack),
        };

        stack.pop();
        match &result {
            Ok(()) => reporter.task_finish(name, started.elapsed()),
            Err(_) => reporter.task_failed(name, started.elapsed()),
        }

        result
    }

    /// Execute the steps of a series
    fn run_steps(&self, steps: &[Step], stack: &mut Vec<String>) -> TaskResult<()> {
        for step in steps {
            match step {
                Step::Task(name) => self.run_with_stack(name, stack)?,
                Step::Parallel(names) => self.run_parallel(names, stack)?,
            }
        }
        Ok(())
    }

    /// Execute a parallel group; every branch gets its own copy of the stack
    fn run_parallel(&self, names: &[String], stack: &[String]) -> TaskResult<()> {
        let results: Vec<TaskResult<()>> = names
            .par_iter()
            .map(|name| {
                let mut branch = stack.to_vec();
                self.run_with_stack(name, &mut branch)
            })
            .collect();

        results.into_iter().collect()
    }
}
