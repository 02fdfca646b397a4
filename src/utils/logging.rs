use crate::utils::errors::DualpackError;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Verbosity accepted by the CLI. There is no quieter level than `Info`:
/// editor problem matchers scan the info stream for build markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogVerbosity {
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogVerbosity {
    pub fn directive(self) -> &'static str {
        match self {
            LogVerbosity::Info => "dualpack=info",
            LogVerbosity::Debug => "dualpack=debug",
            LogVerbosity::Trace => "dualpack=trace",
        }
    }
}

pub struct Logger;

impl Logger {
    pub fn init(verbosity: LogVerbosity) {
        let filter = EnvFilter::new(verbosity.directive());
        // A second init (tests, watch restarts) keeps the first subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }

    pub fn build_start(root: &str, targets: usize, optimized: bool) {
        info!("dualpack build started");
        info!("  root: {}", root);
        info!("  targets: {}", targets);
        info!("  optimization: {}", if optimized { "on" } else { "off" });
    }

    pub fn job_start(target: &str, entry: &str) {
        info!(target_name = target, "[{}] compiling {}", target, entry);
    }

    pub fn resolving(request: &str, requester: &str) {
        debug!("resolving '{}' from {}", request, requester);
    }

    pub fn resolved(request: &str, resolved: &str) {
        debug!("resolved '{}' -> {}", request, resolved);
    }

    pub fn processing_file(name: &str, mode: &str) {
        debug!("processing: {} ({})", name, mode);
    }

    pub fn tree_shaking(target: &str, summary: &str) {
        info!(target_name = target, "[{}] {}", target, summary);
    }

    pub fn minified(target: &str, summary: &str) {
        info!(target_name = target, "[{}] {}", target, summary);
    }

    pub fn emitted(target: &str, path: &str, size: usize) {
        info!(target_name = target, "[{}] emitted {} ({} bytes)", target, path, size);
    }

    pub fn job_complete(target: &str, files: usize, elapsed: std::time::Duration) {
        info!(
            target_name = target,
            "[{}] compiled successfully: {} file(s) in {:.2?}", target, files, elapsed
        );
    }

    /// Problem-matcher marker: one line per error, file first.
    pub fn problem(target: &str, err: &DualpackError) {
        match err.file() {
            Some(file) => error!(target_name = target, "ERROR in {}: {}", file.display(), err),
            None => error!(target_name = target, "ERROR in [{}]: {}", target, err),
        }
    }

    pub fn job_failed(target: &str, count: usize) {
        error!(target_name = target, "[{}] compiled with {} error(s)", target, count);
    }

    pub fn build_finished(succeeded: usize, failed: usize, elapsed: std::time::Duration) {
        if failed == 0 {
            info!("build finished: {} target(s) succeeded in {:.2?}", succeeded, elapsed);
        } else {
            error!(
                "build finished with errors: {} succeeded, {} failed in {:.2?}",
                succeeded, failed, elapsed
            );
        }
    }

    pub fn info(msg: &str) {
        info!("{}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }

    pub fn error(msg: &str) {
        error!("{}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("{}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
