//! diffgate - CI quality gate for JavaScript and TypeScript projects
//!
//! Resolves which files a branch changed, runs lint, type-check and type
//! coverage against them, and exits non-zero if any enabled check failed.

use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use diffgate::changes::ChangeSetResolver;
use diffgate::config::{validate, ConfigOverrides, RunConfig};
use diffgate::operations::{RealGitOperations, RealToolRunner};
use diffgate::quality::{change_set_request, scope_rule_for, CheckerKind, RunOrchestrator};
use diffgate::testing::GitOperations;
use diffgate::error::CONFIG_EXIT_CODE;
use diffgate::GateError;

#[derive(Parser)]
#[command(name = "diffgate")]
#[command(version)]
#[command(about = "Run lint, type-check and type-coverage on the files a branch changed", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Config file (defaults to diffgate.toml in the project directory)
    #[arg(short, long, global = true, env = "DIFFGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags and environment variables layered over the config file.
#[derive(Args, Debug, Default)]
struct OverrideArgs {
    /// Enable the lint checker
    #[arg(long, global = true, env = "DIFFGATE_LINT", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    lint: Option<bool>,

    /// Lint the whole project instead of changed files
    #[arg(long, global = true, env = "DIFFGATE_LINT_FULL", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    lint_full: Option<bool>,

    /// Enable the type checker
    #[arg(long, global = true, env = "DIFFGATE_TYPE_CHECK", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    type_check: Option<bool>,

    /// Type-check the whole project instead of changed files
    #[arg(long, global = true, env = "DIFFGATE_TYPE_CHECK_FULL", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    type_check_full: Option<bool>,

    /// Enable the type coverage checker
    #[arg(long, global = true, env = "DIFFGATE_COVERAGE", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    coverage: Option<bool>,

    /// Minimum type coverage in percent
    #[arg(long, global = true, env = "DIFFGATE_COVERAGE_THRESHOLD", value_name = "PERCENT")]
    coverage_threshold: Option<f64>,

    /// Diff end (`*` or empty for the current commit)
    #[arg(long, global = true, env = "DIFFGATE_SOURCE_BRANCH", value_name = "REF")]
    source_branch: Option<String>,

    /// Diff start
    #[arg(long, global = true, env = "DIFFGATE_TARGET_BRANCH", value_name = "REF")]
    target_branch: Option<String>,

    /// Directories to check, newline or comma separated
    #[arg(long, global = true, env = "DIFFGATE_CHECK_DIRS", value_name = "DIRS")]
    check_dirs: Option<String>,

    /// Isolate the branch last merged into the deploy branch
    #[arg(long, global = true, env = "DIFFGATE_BRANCH_DEPLOY", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    branch_deploy: Option<bool>,

    /// Deploy branch (defaults to the current commit)
    #[arg(long, global = true, env = "DIFFGATE_DEPLOY_BRANCH", value_name = "REF")]
    deploy_branch: Option<String>,

    /// Mainline branch feature branches are cut from
    #[arg(long, global = true, env = "DIFFGATE_MAINLINE_BRANCH", value_name = "REF")]
    mainline_branch: Option<String>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            lint: args.lint,
            lint_full: args.lint_full,
            type_check: args.type_check,
            type_check_full: args.type_check_full,
            coverage: args.coverage,
            coverage_threshold: args.coverage_threshold,
            source_branch: args.source_branch,
            target_branch: args.target_branch,
            check_dirs: args.check_dirs,
            branch_deploy: args.branch_deploy,
            deploy_branch: args.deploy_branch,
            mainline_branch: args.mainline_branch,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run every enabled checker and exit non-zero on failure
    Run {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved change-set
    Changes {
        /// Narrow the change-set to one checker's scope
        #[arg(long, value_name = "CHECKER")]
        checker: Option<CheckerKind>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show {
        /// Print as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Validate the effective configuration
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_cli();

    // Initialize tracing
    let filter = if cli.verbose {
        "diffgate=debug,info"
    } else {
        "diffgate=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_path.display()
        );
        std::process::exit(1);
    }

    let config = load_config(&project_path, cli.config.as_deref(), cli.overrides.into());

    match cli.command {
        Commands::Run { json } => {
            ensure_valid(&config);

            let git = RealGitOperations::new(project_path.clone());
            let runner = RealToolRunner::new();
            let report = RunOrchestrator::new(&project_path, &config, &git, &runner)
                .run()
                .await
                .unwrap_or_else(|e| fail(&e));

            if json {
                println!("{}", report.to_json().unwrap_or_else(|e| fail(&e)));
            } else {
                println!("{}", report.format());
            }
            std::process::exit(report.exit_code());
        }

        Commands::Changes { checker, json } => {
            let git = RealGitOperations::new(project_path.clone());
            if !git.is_work_tree() {
                fail(&GateError::NotARepository {
                    path: project_path.clone(),
                });
            }

            let resolution = ChangeSetResolver::new(&git).resolve(&change_set_request(&config));
            let changes = resolution.change_set().cloned().unwrap_or_default();
            let files = match checker {
                Some(kind) => diffgate::changes::filter(&changes, &scope_rule_for(kind, &config), &project_path)
                    .unwrap_or_else(|e| fail(&e)),
                None => changes,
            };

            if json {
                let value = json!({
                    "strategy": resolution.strategy,
                    "notes": resolution.notes,
                    "files": files,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                for path in files.iter() {
                    println!("{}", path);
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    print!("{}", config.to_toml().unwrap_or_else(|e| fail(&e)));
                }
            }
            ConfigAction::Validate => {
                let report = validate(&config);
                for error in &report.errors {
                    println!("{} {}", "error:".red().bold(), error);
                }
                for warning in &report.warnings {
                    println!("{} {}", "warning:".yellow().bold(), warning);
                }
                println!("{}", report.summary());
                std::process::exit(report.exit_code());
            }
        },
    }

    Ok(())
}

/// Parse arguments; rejected flags and values exit with the configuration code.
fn parse_cli() -> Cli {
    Cli::try_parse().unwrap_or_else(|e| {
        if !e.use_stderr() {
            e.exit();
        }
        let _ = e.print();
        std::process::exit(CONFIG_EXIT_CODE);
    })
}

/// Defaults, then the config file, then flags and environment.
fn load_config(project: &Path, explicit: Option<&Path>, overrides: ConfigOverrides) -> RunConfig {
    let (mut config, _) = RunConfig::load(project, explicit).unwrap_or_else(|e| fail(&e));
    config.apply(&overrides);
    config
}

/// Abort on configuration errors; log warnings.
fn ensure_valid(config: &RunConfig) {
    let report = validate(config);
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    if !report.is_valid() {
        for error in &report.errors {
            eprintln!("{} {}", "Error:".red().bold(), error);
        }
        std::process::exit(report.exit_code());
    }
}

fn fail(error: &GateError) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), error);
    std::process::exit(error.exit_code());
}
