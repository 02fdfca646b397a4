use crate::utils::Logger;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Alias table lookup for import requests.
pub struct PathAliasResolver<'a> {
    aliases: &'a BTreeMap<String, String>,
    root: &'a Path,
}

impl<'a> PathAliasResolver<'a> {
    pub fn new(aliases: &'a BTreeMap<String, String>, root: &'a Path) -> Self {
        Self { aliases, root }
    }

    /// Substitute path for `request`, or `None` when no alias applies.
    ///
    /// Matches the alias exactly (`os`) or as a prefix (`os/path`); the
    /// longest matching alias wins.
    pub fn resolve(&self, request: &str) -> Option<PathBuf> {
        if let Some(target) = self.aliases.get(request) {
            let resolved = self.resolve_target(target);
            Logger::debug(&format!("alias: {} -> {}", request, resolved.display()));
            return Some(resolved);
        }

        let (alias, target) = self
            .aliases
            .iter()
            .filter(|(alias, _)| {
                request
                    .strip_prefix(alias.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(alias, _)| alias.len())?;

        let rest = &request[alias.len() + 1..];
        let resolved = self.resolve_target(target).join(rest);
        Logger::debug(&format!("alias: {} -> {}", request, resolved.display()));
        Some(resolved)
    }

    /// Absolute path of an alias target; relative targets are under the root.
    pub fn resolve_target(&self, target: &str) -> PathBuf {
        let path = Path::new(target);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(target.strip_prefix("./").unwrap_or(target))
        }
    }
}
