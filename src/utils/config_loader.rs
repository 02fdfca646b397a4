use crate::utils::{DualpackError, Logger, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "dualpack.config.json";

/// Per-target additions from the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetOverrides {
    #[serde(default)]
    pub alias: BTreeMap<String, String>,
    #[serde(default)]
    pub externals: Vec<String>,
}

/// Configuration file format (dualpack.config.json)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualpackConfigFile {
    /// Project settings passed to the compiler (default: "./tsconfig.json")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tsconfig: Option<String>,

    /// Target language level (default: "es2020")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Output root; targets write into `<outdir>/web` and `<outdir>/desktop` (default: "dist")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdir: Option<String>,

    #[serde(default)]
    pub targets: BTreeMap<String, TargetOverrides>,
}

/// Merged project settings consumed once by profile composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub tsconfig: PathBuf,
    pub target: String,
    pub outdir: PathBuf,
    pub targets: BTreeMap<String, TargetOverrides>,
}

impl ProjectConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tsconfig: PathBuf::from("./tsconfig.json"),
            target: "es2020".to_string(),
            outdir: PathBuf::from("dist"),
            targets: BTreeMap::new(),
        }
    }

    pub fn overrides_for(&self, target: &str) -> TargetOverrides {
        self.targets.get(target).cloned().unwrap_or_default()
    }
}

/// Config loader that supports config files with CLI override
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `dualpack.config.json` from the project root if present.
    pub fn load_from_file(root: &Path) -> Result<Option<DualpackConfigFile>> {
        let config_path = root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            Logger::debug("No dualpack.config.json found, using defaults");
            return Ok(None);
        }

        Logger::debug(&format!("Loading config from {}", config_path.display()));

        let content = std::fs::read_to_string(&config_path)?;
        let config: DualpackConfigFile = serde_json::from_str(&content).map_err(|e| {
            DualpackError::config(format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))
        })?;

        Ok(Some(config))
    }

    /// Merge file config with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(
        file_config: Option<DualpackConfigFile>,
        root: PathBuf,
        outdir: Option<&str>,
        target: Option<&str>,
    ) -> ProjectConfig {
        let base = file_config.unwrap_or_default();
        let mut config = ProjectConfig::new(root);

        if let Some(tsconfig) = base.tsconfig {
            config.tsconfig = PathBuf::from(tsconfig);
        }
        if let Some(level) = target.map(str::to_string).or(base.target) {
            config.target = level;
        }
        if let Some(dir) = outdir.map(str::to_string).or(base.outdir) {
            config.outdir = PathBuf::from(dir);
        }
        config.targets = base.targets;
        config
    }

    pub fn load(root: &Path, outdir: Option<&str>, target: Option<&str>) -> Result<ProjectConfig> {
        let file_config = Self::load_from_file(root)?;
        Ok(Self::merge_with_cli(file_config, root.to_path_buf(), outdir, target))
    }
}
