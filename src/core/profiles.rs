//! The two deployment targets, expressed as data.

use crate::core::models::*;
use crate::utils::{DualpackError, PathAliasResolver, ProjectConfig, Result};
use std::path::{Path, PathBuf};

pub const SANDBOXED_TARGET: &str = "web";
pub const FULL_ACCESS_TARGET: &str = "desktop";

/// Module the editor host injects at runtime in both environments.
pub const EDITOR_HOST_MODULE: &str = "vscode";

const SOURCE_MAP_TEMPLATE: &str = "../../[resource-path]";

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Web-worker bundle: browser-safe fields first, one file, `exports.x = ...`.
pub fn sandboxed_profile(config: &ProjectConfig) -> TargetProfile {
    let overrides = config.overrides_for(SANDBOXED_TARGET);
    let mut externals = vec![EDITOR_HOST_MODULE.to_string()];
    externals.extend(overrides.externals);

    TargetProfile {
        name: SANDBOXED_TARGET.to_string(),
        runtime: RuntimeKind::Sandboxed,
        root: config.root.clone(),
        entry: EntryPoint::new("webMain", "src/web/main.ts"),
        output: OutputDescriptor {
            dir: config.outdir.join("web"),
            filename: "[name].js".to_string(),
            format: OutputFormat::CommonJs,
            source_path_template: SOURCE_MAP_TEMPLATE.to_string(),
        },
        main_fields: strings(&["browser", "module", "main"]),
        extensions: strings(&[".ts", ".js"]),
        chunking: ChunkPolicy::SingleUnitOnly,
        alias: overrides.alias,
        externals,
    }
}

/// Host-process bundle: no browser field, chunks allowed, `module.exports = ...`.
pub fn full_access_profile(config: &ProjectConfig) -> TargetProfile {
    let overrides = config.overrides_for(FULL_ACCESS_TARGET);
    let mut externals = vec![EDITOR_HOST_MODULE.to_string()];
    externals.extend(overrides.externals);

    TargetProfile {
        name: FULL_ACCESS_TARGET.to_string(),
        runtime: RuntimeKind::FullAccess,
        root: config.root.clone(),
        entry: EntryPoint::new("desktopMain", "src/desktop/main.ts"),
        output: OutputDescriptor {
            dir: config.outdir.join("desktop"),
            filename: "[name].js".to_string(),
            format: OutputFormat::CommonJs2,
            source_path_template: SOURCE_MAP_TEMPLATE.to_string(),
        },
        main_fields: strings(&["module", "main"]),
        extensions: strings(&[".ts", ".js"]),
        chunking: ChunkPolicy::Unconstrained,
        alias: overrides.alias,
        externals,
    }
}

pub fn default_profiles(config: &ProjectConfig) -> Vec<TargetProfile> {
    vec![sandboxed_profile(config), full_access_profile(config)]
}

/// Checks that must hold before a job reads any source.
///
/// The entry file and every alias target must exist on disk.
pub fn validate_profile(profile: &TargetProfile) -> Result<()> {
    let entry = profile.entry_path();
    if !entry.is_file() {
        return Err(DualpackError::config(format!(
            "target '{}': entry '{}' ({}) does not exist",
            profile.name,
            profile.entry.name,
            entry.display()
        )));
    }

    let aliases = PathAliasResolver::new(&profile.alias, &profile.root);
    for (name, target) in &profile.alias {
        let path = aliases.resolve_target(target);
        if !alias_target_exists(profile, &path) {
            return Err(DualpackError::config(format!(
                "target '{}': alias '{}' points at missing {}",
                profile.name,
                name,
                path.display()
            )));
        }
    }

    if profile.main_fields.is_empty() {
        return Err(DualpackError::config(format!(
            "target '{}' has an empty module resolution order",
            profile.name
        )));
    }

    Ok(())
}

fn alias_target_exists(profile: &TargetProfile, path: &Path) -> bool {
    if path.exists() {
        return true;
    }
    profile.extensions.iter().any(|ext| {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(ext);
        PathBuf::from(candidate).is_file()
    })
}
