//! Main CLI application

use crate::config::{load_config, validate_config, BuildMode};
use crate::error::{ConfigError, SluiceError};
use crate::runner::{Context, Registry, Runner};
use crate::ui::Verbosity;
use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

/// CLI application
pub struct App {
    /// The clap command
    command: Command,
    /// Tasks that can be run
    registry: Registry,
}

impl App {
    /// Create the app with the standard task registry
    pub fn new() -> Self {
        Self::with_registry(Registry::standard())
    }

    /// Create the app for a specific registry
    pub fn with_registry(registry: Registry) -> Self {
        App {
            command: build_command(&registry),
            registry,
        }
    }

    /// Run the application with the process arguments
    pub fn run(self) -> Result<(), SluiceError> {
        self.run_from(std::env::args_os())
    }

    /// Run the application with explicit arguments
    pub fn run_from<I, T>(self, args: I) -> Result<(), SluiceError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut command = self.command.clone();
        let matches = command.clone().get_matches_from(args);

        if let Some(("completions", sub_matches)) = matches.subcommand() {
            if let Some(shell) = sub_matches.get_one::<Shell>("shell") {
                clap_complete::generate(*shell, &mut command, "sluice", &mut io::stdout());
            }
            return Ok(());
        }

        let verbosity = get_verbosity(&matches);
        let mode = BuildMode::from_flag(matches.get_flag("prod"));
        let file = matches.get_one::<String>("file").map(PathBuf::from);

        let loaded = load_config(file.as_deref())?;
        validate_config(&loaded.config)?;
        self.registry.validate()?;

        let task_name = match matches.subcommand_name() {
            Some(name) => name.to_string(),
            None => self
                .registry
                .default_task()
                .ok_or_else(|| ConfigError::TaskNotFound("default".to_string()))?
                .to_string(),
        };

        let ctx = Context::new()
            .with_root(loaded.root)
            .with_config_path(loaded.config_path)
            .with_config(loaded.config)
            .with_mode(mode)
            .with_verbosity(verbosity);

        match &ctx.config_path {
            Some(path) => ctx
                .reporter
                .debug(&format!("Using config file {}", path.display())),
            None => ctx.reporter.debug("No config file found, using defaults"),
        }
        ctx.reporter.debug(&format!("Build mode: {:?}", ctx.mode));

        let runner = Runner::new(self.registry, ctx);
        runner.run(&task_name)?;

        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the clap command from the registry
fn build_command(registry: &Registry) -> Command {
    let mut cmd = Command::new("sluice")
        .version(crate::VERSION)
        .about("A front-end asset pipeline with a live-reloading dev proxy")
        .after_help(match registry.default_task() {
            Some(task) => format!("Runs '{}' when no task is given.", task),
            None => String::new(),
        })
        .arg(
            Arg::new("prod")
                .long("prod")
                .help("Production build: minify, compress and write external style maps")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to sluice.yml config file")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print errors and task failures")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        );

    // Add subcommands for each public task
    for task in registry.public_tasks() {
        cmd = cmd.subcommand(Command::new(task.name.clone()).about(task.usage.clone()));
    }

    cmd.subcommand(
        Command::new("completions")
            .about("Print a shell completion script")
            .arg(
                Arg::new("shell")
                    .value_name("SHELL")
                    .required(true)
                    .value_parser(clap::value_parser!(Shell)),
            ),
    )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Run the CLI application
pub fn run() -> Result<(), SluiceError> {
    App::new().run()
}
