use crate::core::interfaces::{BuildService, FileSystemService};
use crate::core::models::OptimizationGate;
use crate::core::orchestrator::{BuildOrchestrator, BuildReport, ExecutionMode};
use crate::core::services::DualpackBuildService;
use crate::infrastructure::TokioFileSystemService;
use crate::utils::{
    ConfigLoader, DualpackError, DualpackWatcher, LogVerbosity, Logger, ProjectConfig, Result,
    WatchConfig,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dualpack")]
#[command(about = "Builds one extension source tree for sandboxed and full-access hosts")]
pub struct Cli {
    /// Log verbosity; never quieter than info
    #[arg(long, value_enum, default_value_t = LogVerbosity::Info, global = true)]
    pub log_level: LogVerbosity,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Project root
    #[arg(short, long, default_value = ".")]
    pub root: String,
    /// Output root (overrides dualpack.config.json)
    #[arg(short, long)]
    pub outdir: Option<String>,
    /// Target language level (overrides dualpack.config.json)
    #[arg(long)]
    pub target: Option<String>,
    /// Force the optimization gate on regardless of the environment
    #[arg(long)]
    pub production: bool,
    /// Run jobs one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every target once
    Build(BuildArgs),
    /// Build, then rebuild on source changes
    Watch(BuildArgs),
    /// Print the composed target profiles
    Targets {
        #[arg(short, long, default_value = ".")]
        root: String,
    },
}

impl BuildArgs {
    /// The gate is read here, once per invocation, and nowhere else.
    fn gate(&self) -> OptimizationGate {
        if self.production {
            OptimizationGate::On
        } else {
            OptimizationGate::from_env()
        }
    }

    fn mode(&self) -> ExecutionMode {
        if self.sequential {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Parallel
        }
    }

    fn project_config(&self) -> Result<ProjectConfig> {
        let root = canonical_root(&self.root)?;
        ConfigLoader::load(&root, self.outdir.as_deref(), self.target.as_deref())
    }
}

fn canonical_root(root: &str) -> Result<PathBuf> {
    std::fs::canonicalize(root)
        .map_err(|e| DualpackError::config(format!("project root '{}': {}", root, e)))
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        let cli = Cli::parse();
        Logger::init(cli.log_level);

        match cli.command {
            Commands::Build(args) => self.handle_build_command(&args).await,
            Commands::Watch(args) => self.handle_watch_command(&args).await,
            Commands::Targets { root } => self.handle_targets_command(&root),
        }
    }

    fn build_service(&self) -> Arc<dyn BuildService> {
        let fs_service: Arc<dyn FileSystemService> = Arc::new(TokioFileSystemService);
        Arc::new(DualpackBuildService::new(fs_service))
    }

    async fn handle_build_command(&self, args: &BuildArgs) -> Result<()> {
        let config = args.project_config()?;
        let orchestrator = BuildOrchestrator::compose(&config, args.gate())?;

        let report = orchestrator.run(self.build_service(), args.mode()).await;
        summarize(&report);

        if report.is_success() {
            Ok(())
        } else {
            Err(DualpackError::Other(format!(
                "{} of {} targets failed",
                report.failures().count(),
                report.outcomes.len()
            )))
        }
    }

    async fn handle_watch_command(&self, args: &BuildArgs) -> Result<()> {
        let config = args.project_config()?;
        let orchestrator = BuildOrchestrator::compose(&config, args.gate())?;

        let mut watch_config = WatchConfig::new(config.root.clone());
        watch_config.mode = args.mode();

        DualpackWatcher::new(watch_config, orchestrator, self.build_service())
            .watch()
            .await
    }

    fn handle_targets_command(&self, root: &str) -> Result<()> {
        let config = ConfigLoader::load(&canonical_root(root)?, None, None)?;
        let orchestrator = BuildOrchestrator::compose(&config, OptimizationGate::from_env())?;

        for profile in orchestrator.profiles() {
            let rendered = serde_json::to_string_pretty(profile)?;
            Logger::info(&format!("target '{}':\n{}", profile.name, rendered));
        }
        Ok(())
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Problems were already logged by each job; this only adds fingerprints.
fn summarize(report: &BuildReport) {
    for outcome in &report.outcomes {
        let Ok(artifacts) = &outcome.result else {
            continue;
        };
        for file in artifacts.code_files() {
            Logger::debug(&format!(
                "[{}] {} blake3:{}",
                artifacts.target,
                file.path.display(),
                file.fingerprint()
            ));
        }
    }
}
