//! compatbot - module compatibility bot
//!
//! Tests every module of a modules repository against a new core release by
//! opening draft PRs, waiting for CI and recording the outcome.
//!
//! ## Commands
//!
//! - `run`: reconcile every module and converge the in-flight PRs
//! - `plan`: show what `run` would do, without side effects
//! - `identity`: print the PR title and branch name of one test

mod telemetry;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use compatbot_core::manifest::discover_modules;
use compatbot_core::{
    branch_name, plan_batch, BatchReport, BatchRunner, ComparisonLevel, CoreVersion, GitWorkspace,
    IdentityKey, PlannedAction, PlannedModule, PollPolicy, Settings,
};
use compatbot_github::{
    fetch_latest_version, GithubConfig, GithubHost, DEFAULT_API_URL, DEFAULT_CORE_VERSION_URL,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "compatbot")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test modules against new core releases through draft PRs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines (and JSON output for `plan` and `run`)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open, poll and resolve test PRs for every module
    Run(RunArgs),

    /// Show the action `run` would take for every module
    Plan(RunArgs),

    /// Print the PR title and branch name of one compatibility test
    Identity {
        /// Module name, e.g. `DeepSegmenter`
        module: String,

        /// Module version from its manifest
        module_version: String,

        /// Core version under test
        core_version: String,

        #[arg(long, env = "COMPARISON_LEVEL")]
        comparison_level: ComparisonLevel,

        #[arg(long, env = "CORE_NAME", default_value = "jina")]
        core_name: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Modules repository as owner/name
    #[arg(long, env = "MODULES_REPO")]
    repo: String,

    /// GitHub token with push and PR access
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: String,

    /// major, minor or patch
    #[arg(long, env = "COMPARISON_LEVEL")]
    comparison_level: ComparisonLevel,

    /// Retry modules that have an open fix-issue (true/false)
    #[arg(long, env = "TEST_AGAIN", action = clap::ArgAction::Set)]
    test_again: bool,

    /// Appended to fix-issue bodies, e.g. @org/maintainers
    #[arg(long, env = "TAG_IN_ISSUES", default_value = "")]
    tag_in_issues: String,

    /// Local clone of the modules repository
    #[arg(long, env = "MODULES_DIR", default_value = "hub_repo")]
    modules_dir: PathBuf,

    #[arg(long, env = "DEFAULT_BRANCH", default_value = "master")]
    default_branch: String,

    /// Git remote to push scratch branches to
    #[arg(long, env = "GIT_REMOTE", default_value = "origin")]
    remote: String,

    /// Core version to test against (default: latest release)
    #[arg(long, env = "CORE_VERSION")]
    core_version: Option<String>,

    /// Endpoint answering {"version": "..."} with the latest core release
    #[arg(long, env = "CORE_VERSION_URL", default_value = DEFAULT_CORE_VERSION_URL)]
    core_version_url: String,

    /// Core name used in PR titles and bodies
    #[arg(long, env = "CORE_NAME", default_value = "jina")]
    core_name: String,

    /// Package pinned in module requirements
    #[arg(long, env = "CORE_PACKAGE", default_value = "jina")]
    core_package: String,

    /// Seconds to wait before the first polling pass
    #[arg(long, env = "GRACE_SECS", default_value_t = 120)]
    grace_secs: u64,

    /// Seconds between polling passes
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 300)]
    poll_interval_secs: u64,

    /// Abandon PRs still pending after this many passes (default: never)
    #[arg(long, env = "MAX_POLL_CYCLES")]
    max_poll_cycles: Option<u32>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
}

impl RunArgs {
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::new(
            &self.repo,
            &self.token,
            self.comparison_level,
            self.test_again,
        );
        settings.tag_in_issues = self.tag_in_issues.clone();
        settings.modules_dir = self.modules_dir.clone();
        settings.default_branch = self.default_branch.clone();
        settings.remote = self.remote.clone();
        settings.core_name = self.core_name.clone();
        settings.core_package = self.core_package.clone();
        settings.poll = PollPolicy {
            grace: Duration::from_secs(self.grace_secs),
            interval: Duration::from_secs(self.poll_interval_secs),
            max_cycles: self.max_poll_cycles,
        };
        settings.validate().context("Invalid configuration")?;
        Ok(settings)
    }

    async fn core_version(&self) -> Result<CoreVersion> {
        let raw = match &self.core_version {
            Some(v) => v.clone(),
            None => fetch_latest_version(&self.core_version_url)
                .await
                .with_context(|| {
                    format!("Failed to fetch latest core version from {}", self.core_version_url)
                })?,
        };
        CoreVersion::parse(&raw).context("Invalid core version")
    }

    fn host(&self, settings: &Settings) -> Result<GithubHost> {
        let config = GithubConfig::new(&settings.repo, &settings.token).with_api_url(&self.api_url);
        GithubHost::new(config).context("Failed to create GitHub client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(&args, cli.json).await,
        Commands::Plan(args) => cmd_plan(&args, cli.json).await,
        Commands::Identity {
            module,
            module_version,
            core_version,
            comparison_level,
            core_name,
        } => cmd_identity(
            &module,
            &module_version,
            &core_version,
            comparison_level,
            &core_name,
        ),
    }
}

async fn cmd_run(args: &RunArgs, json: bool) -> Result<()> {
    let settings = args.settings()?;
    let core = args.core_version().await?;
    let host = args.host(&settings)?;
    let repo = GitWorkspace::open(&settings.modules_dir, &settings.remote)
        .context("Failed to open modules clone")?;

    info!(
        repo = %settings.repo,
        core = %core,
        level = %settings.comparison_level,
        test_again = settings.test_again,
        "starting compatibility run"
    );
    let report = BatchRunner::new(&settings, &host, &repo, &core)
        .run_all()
        .await
        .context("Compatibility run failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn cmd_plan(args: &RunArgs, json: bool) -> Result<()> {
    let settings = args.settings()?;
    let core = args.core_version().await?;
    let host = args.host(&settings)?;
    let modules = discover_modules(&settings.modules_dir)
        .with_context(|| format!("Failed to read modules from {:?}", settings.modules_dir))?;

    let plan = plan_batch(&settings, &host, &modules, &core).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("Core version: {core} ({} level)", settings.comparison_level);
        for planned in &plan {
            println!("{}", describe(planned));
        }
    }
    Ok(())
}

fn cmd_identity(
    module: &str,
    module_version: &str,
    core_version: &str,
    level: ComparisonLevel,
    core_name: &str,
) -> Result<()> {
    let core = CoreVersion::parse(core_version).context("Invalid core version")?;
    let identity = IdentityKey::derive(module, module_version, &core, level, core_name);
    println!("title:  {}", identity.title());
    println!("branch: {}", branch_name(module, module_version, &core));
    Ok(())
}

fn describe(planned: &PlannedModule) -> String {
    let action = match &planned.action {
        PlannedAction::Blocked { issue_url } => format!("blocked by {issue_url}"),
        PlannedAction::Create { branch } => format!("create on {branch}"),
        PlannedAction::Reuse { pr_url } => format!("resume {pr_url}"),
        PlannedAction::Skip { pr_url } => format!("skip, tested in {pr_url}"),
    };
    format!("  {} {}: {}", planned.module, planned.version, action)
}

fn print_report(report: &BatchReport) {
    println!("{}", report.summary());
    let sections = [
        ("passed", &report.passed),
        ("failed", &report.failed),
        ("abandoned", &report.abandoned),
        ("errored", &report.errored),
    ];
    for (label, entries) in sections {
        for entry in entries {
            let mut line = format!("  [{label}] {}", entry.module);
            if let Some(url) = &entry.pr_url {
                line.push_str(&format!(" {url}"));
            }
            if let Some(detail) = &entry.detail {
                line.push_str(&format!(" ({detail})"));
            }
            println!("{line}");
        }
    }
}
