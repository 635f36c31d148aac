//! File watching
//!
//! One notify watcher covers the roots of every watch category. Each change is
//! classified against the categories and every matching category runs its
//! tasks on a scoped thread of its own. Runs are not debounced or serialized.

use crate::assets::FileSet;
use crate::runner::{Context, Runner};
use crate::utils::relative_slash_path;
use anyhow::{Context as _, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

/// Messages consumed by the watch loop
pub enum WatchMsg {
    /// A file system notification
    Fs(notify::Result<notify::Event>),
    /// Ctrl-C was pressed
    Shutdown,
}

/// A set of paths and the tasks a change to them triggers
pub struct Category {
    pub name: &'static str,
    pub files: FileSet,
    pub tasks: &'static [&'static str],
}

/// Every watch category of a project plus the paths never reported
pub struct WatchPlan {
    root: PathBuf,
    output: PathBuf,
    categories: Vec<Category>,
    ignore: FileSet,
}

impl WatchPlan {
    /// Build the categories from the configuration
    pub fn new(ctx: &Context) -> Result<Self> {
        let root = &ctx.root;
        let paths = &ctx.config.paths;
        let watch = &ctx.config.watch;

        let categories = vec![
            Category {
                name: "styles",
                files: FileSet::new(root, &watch.styles)?,
                tasks: &["styles", "reload"],
            },
            Category {
                name: "images",
                files: FileSet::new(root, &paths.images.source)?,
                tasks: &["images", "reload"],
            },
            Category {
                name: "scripts",
                files: FileSet::new(root, &watch.scripts)?,
                tasks: &["scripts", "reload"],
            },
            Category {
                name: "others",
                files: FileSet::new(root, &paths.others.source)?,
                tasks: &["copy", "reload"],
            },
            Category {
                name: "templates",
                files: FileSet::new(root, &watch.templates)?,
                tasks: &["reload"],
            },
        ];

        Ok(WatchPlan {
            root: root.clone(),
            output: ctx.output_dir(),
            categories,
            ignore: FileSet::new(root, &watch.ignore)?,
        })
    }

    /// Directories to watch recursively, relative to the root
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for dir in self
            .categories
            .iter()
            .flat_map(|c| c.files.walk_roots().iter())
        {
            if !roots.iter().any(|r| dir.starts_with(r)) {
                roots.retain(|r| !r.starts_with(dir));
                roots.push(dir.clone());
            }
        }
        roots
    }

    /// Categories affected by a change to any of `paths`, each listed once
    pub fn classify(&self, paths: &[PathBuf]) -> Vec<&Category> {
        let mut matched: Vec<&Category> = Vec::new();
        for path in paths {
            if path.starts_with(&self.output) {
                continue;
            }
            let relative = match relative_slash_path(&self.root, path) {
                Some(relative) => relative,
                None => continue,
            };
            if self.ignore.matches(&relative) {
                continue;
            }
            for category in &self.categories {
                if category.files.matches(&relative)
                    && !matched.iter().any(|m| m.name == category.name)
                {
                    matched.push(category);
                }
            }
        }
        matched
    }
}

/// Watch the project and rebuild on change until Ctrl-C
pub fn watch(runner: &Runner) -> Result<()> {
    let ctx = runner.context();
    let plan = WatchPlan::new(ctx)?;
    let (tx, rx) = mpsc::channel();

    let fs_tx = tx.clone();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = fs_tx.send(WatchMsg::Fs(res));
    })
    .context("Failed to create file watcher")?;

    for dir in plan.watch_roots() {
        let dir = ctx.resolve(&dir);
        if dir.is_dir() {
            watcher
                .watch(&dir, RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
            ctx.reporter.debug(&format!("Watching {}", dir.display()));
        }
    }

    ctrlc::set_handler(move || {
        let _ = tx.send(WatchMsg::Shutdown);
    })
    .context("Failed to install the Ctrl-C handler")?;

    ctx.reporter.info("Watching for changes, press Ctrl-C to stop");
    run_loop(runner, &plan, rx);
    ctx.reporter.info("Stopped watching");
    Ok(())
}

/// Dispatch watch messages until shutdown or until every sender is gone
pub fn run_loop(runner: &Runner, plan: &WatchPlan, rx: Receiver<WatchMsg>) {
    let reporter = runner.context().reporter;

    thread::scope(|scope| {
        for msg in rx.iter() {
            let event = match msg {
                WatchMsg::Shutdown => break,
                WatchMsg::Fs(Err(e)) => {
                    reporter.warn(&format!("Watch error: {}", e));
                    continue;
                }
                WatchMsg::Fs(Ok(event)) => event,
            };

            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }

            for category in plan.classify(&event.paths) {
                reporter.debug(&format!(
                    "Change in {}: {}",
                    category.name,
                    describe(&event.paths)
                ));
                scope.spawn(move || {
                    if let Err(e) = runner.run_series(category.tasks) {
                        reporter.error(&format!("{:#}", e));
                    }
                });
            }
        }
    });
}

fn describe(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{Registry, TaskDef};
    use crate::ui::Verbosity;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use notify::Event;
    use std::fs;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> Context {
        Context::new()
            .with_root(dir.path().to_path_buf())
            .with_verbosity(Verbosity::Silent)
    }

    fn record(runner: &Runner, name: &str) -> anyhow::Result<()> {
        fs::write(runner.context().root.join(format!("{}.ran", name)), name)?;
        Ok(())
    }

    fn styles(runner: &Runner) -> anyhow::Result<()> {
        record(runner, "styles")
    }

    fn reload(runner: &Runner) -> anyhow::Result<()> {
        record(runner, "reload")
    }

    fn copy(_: &Runner) -> anyhow::Result<()> {
        anyhow::bail!("copy broke")
    }

    fn recording_runner(dir: &TempDir) -> Runner {
        let mut registry = Registry::new();
        registry.register(TaskDef::action("styles", "", styles));
        registry.register(TaskDef::action("reload", "", reload));
        registry.register(TaskDef::action("copy", "", copy));
        Runner::new(registry, context(dir))
    }

    fn names(categories: Vec<&Category>) -> Vec<&'static str> {
        categories.into_iter().map(|c| c.name).collect()
    }

    #[test]
    fn test_classify_by_category() {
        let dir = TempDir::new().unwrap();
        let plan = WatchPlan::new(&context(&dir)).unwrap();
        let root = dir.path();

        assert_eq!(names(plan.classify(&[root.join("src/scss/_vars.scss")])), vec!["styles"]);
        assert_eq!(names(plan.classify(&[root.join("src/js/lib/util.js")])), vec!["scripts"]);
        assert_eq!(names(plan.classify(&[root.join("src/images/a.png")])), vec!["images"]);
        assert_eq!(names(plan.classify(&[root.join("src/fonts/a.woff")])), vec!["others"]);
        assert_eq!(names(plan.classify(&[root.join("index.php")])), vec!["templates"]);
        assert_eq!(
            names(plan.classify(&[root.join("src/index.php")])),
            vec!["others", "templates"]
        );
    }

    #[test]
    fn test_classify_ignores_output_and_vendor_trees() {
        let dir = TempDir::new().unwrap();
        let plan = WatchPlan::new(&context(&dir)).unwrap();
        let root = dir.path();

        assert!(plan.classify(&[root.join("dist/index.php")]).is_empty());
        assert!(plan.classify(&[root.join("node_modules/x/y.php")]).is_empty());
        assert!(plan.classify(&[root.join(".git/HEAD")]).is_empty());
        assert!(plan.classify(&[PathBuf::from("/elsewhere/a.php")]).is_empty());
    }

    #[test]
    fn test_classify_lists_each_category_once() {
        let dir = TempDir::new().unwrap();
        let plan = WatchPlan::new(&context(&dir)).unwrap();
        let root = dir.path();

        let matched = plan.classify(&[root.join("src/scss/a.scss"), root.join("src/scss/b.scss")]);
        assert_eq!(names(matched), vec!["styles"]);
    }

    #[test]
    fn test_watch_roots() {
        let dir = TempDir::new().unwrap();
        let plan = WatchPlan::new(&context(&dir)).unwrap();
        // `**/*.php` covers the whole project
        assert_eq!(plan.watch_roots(), vec![PathBuf::from("")]);
    }

    #[test]
    fn test_run_loop_dispatches_and_survives_errors() {
        let dir = TempDir::new().unwrap();
        let runner = recording_runner(&dir);
        let plan = WatchPlan::new(runner.context()).unwrap();
        let root = dir.path();

        let (tx, rx) = mpsc::channel();
        tx.send(WatchMsg::Fs(Ok(Event::new(EventKind::Access(AccessKind::Any))
            .add_path(root.join("src/scss/main.scss")))))
            .unwrap();
        tx.send(WatchMsg::Fs(Ok(Event::new(EventKind::Create(CreateKind::File))
            .add_path(root.join("src/fonts/a.woff")))))
            .unwrap();
        tx.send(WatchMsg::Fs(Err(notify::Error::generic("boom")))).unwrap();
        tx.send(WatchMsg::Fs(Ok(Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(root.join("src/scss/main.scss")))))
            .unwrap();
        tx.send(WatchMsg::Shutdown).unwrap();

        run_loop(&runner, &plan, rx);

        assert!(root.join("styles.ran").exists());
        assert!(root.join("reload.ran").exists());
    }

    #[test]
    fn test_run_loop_ends_when_senders_are_gone() {
        let dir = TempDir::new().unwrap();
        let runner = recording_runner(&dir);
        let plan = WatchPlan::new(runner.context()).unwrap();

        let (tx, rx) = mpsc::channel::<WatchMsg>();
        drop(tx);
        run_loop(&runner, &plan, rx);

        assert!(!dir.path().join("styles.ran").exists());
    }
}
