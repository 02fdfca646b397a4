//! Composes target profiles into independent build jobs and runs them.

use crate::core::interfaces::BuildService;
use crate::core::models::*;
use crate::core::profiles::default_profiles;
use crate::core::rules::{TransformRule, TransformRuleSet};
use crate::infrastructure::OxcCompiler;
use crate::utils::{DualpackError, JobFailure, Logger, ProjectConfig, Result, Timer};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

/// One target's compilation unit. Shares only read-only state with its
/// siblings.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub profile: TargetProfile,
    pub rules: Arc<TransformRuleSet>,
    pub gate: OptimizationGate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub target: String,
    pub result: std::result::Result<JobArtifacts, JobFailure>,
}

/// Per-job outcomes of one orchestrator run, in job order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub outcomes: Vec<JobOutcome>,
    pub elapsed: std::time::Duration,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobFailure> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err())
    }

    pub fn artifacts(&self, target: &str) -> Option<&JobArtifacts> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.target == target)
            .and_then(|outcome| outcome.result.as_ref().ok())
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Every error of every failed job, tagged with its target.
    pub fn errors(&self) -> Vec<(&str, &DualpackError)> {
        self.failures()
            .flat_map(|failure| {
                failure
                    .errors
                    .iter()
                    .map(move |err| (failure.target.as_str(), err))
            })
            .collect()
    }
}

/// Fixed set of targets plus the state every job shares.
pub struct BuildOrchestrator {
    profiles: Vec<TargetProfile>,
    rules: Arc<TransformRuleSet>,
    gate: OptimizationGate,
}

impl BuildOrchestrator {
    pub fn new(
        profiles: Vec<TargetProfile>,
        rules: TransformRuleSet,
        gate: OptimizationGate,
    ) -> Result<Self> {
        let mut names = HashSet::new();
        for profile in &profiles {
            if profile.name.is_empty() {
                return Err(DualpackError::config("target name must not be empty"));
            }
            if !names.insert(profile.name.as_str()) {
                return Err(DualpackError::config(format!(
                    "duplicate target name '{}'",
                    profile.name
                )));
            }
        }

        Ok(Self {
            profiles,
            rules: Arc::new(rules),
            gate,
        })
    }

    /// The sandboxed and full-access targets with the shared TypeScript rule.
    pub fn compose(config: &ProjectConfig, gate: OptimizationGate) -> Result<Self> {
        Self::new(default_profiles(config), default_rules(config)?, gate)
    }

    pub fn gate(&self) -> OptimizationGate {
        self.gate
    }

    pub fn profiles(&self) -> &[TargetProfile] {
        &self.profiles
    }

    pub fn jobs(&self) -> Vec<BuildJob> {
        self.profiles
            .iter()
            .map(|profile| BuildJob {
                profile: profile.clone(),
                rules: Arc::clone(&self.rules),
                gate: self.gate,
            })
            .collect()
    }

    pub async fn run(&self, service: Arc<dyn BuildService>, mode: ExecutionMode) -> BuildReport {
        let timer = Timer::start("orchestrator run");
        let jobs = self.jobs();
        let root = self
            .profiles
            .first()
            .map(|p| p.root.display().to_string())
            .unwrap_or_default();
        Logger::build_start(&root, jobs.len(), self.gate.is_on());

        let results = match mode {
            ExecutionMode::Parallel => {
                let handles = jobs.into_iter().map(|job| {
                    let service = Arc::clone(&service);
                    let target = job.profile.name.clone();
                    let handle = tokio::spawn(async move { service.run_job(&job).await });
                    async move {
                        let result = handle.await.unwrap_or_else(|err| {
                            Err(JobFailure::single(
                                target.clone(),
                                DualpackError::defect(format!("job task failed: {}", err)),
                            ))
                        });
                        (target, result)
                    }
                });
                join_all(handles).await
            }
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(jobs.len());
                for job in jobs {
                    let result = service.run_job(&job).await;
                    results.push((job.profile.name, result));
                }
                results
            }
        };

        let outcomes = results
            .into_iter()
            .map(|(target, result)| JobOutcome {
                result: result.and_then(|artifacts| check_nonempty(&target, artifacts)),
                target,
            })
            .collect();

        let report = BuildReport {
            outcomes,
            elapsed: timer.elapsed(),
        };
        Logger::build_finished(
            report.succeeded(),
            report.outcomes.len() - report.succeeded(),
            report.elapsed,
        );
        report
    }
}

fn default_rules(config: &ProjectConfig) -> Result<TransformRuleSet> {
    let options = CompilerOptions {
        target: config.target.clone(),
        tsconfig: config.tsconfig.clone(),
    };
    let rule = TransformRule::new(r"\.ts$", Arc::new(OxcCompiler::new()), options)?
        .with_exclude("node_modules")?;
    TransformRuleSet::new(vec![rule])
}

/// A job that reports success without producing anything is broken.
fn check_nonempty(
    target: &str,
    artifacts: JobArtifacts,
) -> std::result::Result<JobArtifacts, JobFailure> {
    if artifacts.output_files.is_empty() {
        let err = DualpackError::defect(format!("target '{}' succeeded with no output files", target));
        Logger::problem(target, &err);
        return Err(JobFailure::single(target, err));
    }
    Ok(artifacts)
}
