use crate::core::models::TreeShakingStats;
use crate::infrastructure::processors::module_linker::{Link, ModuleRecord, UsedName};
use crate::utils::Logger;
use std::collections::BTreeSet;

/// Exports of one module that something in the bundle reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedSet {
    all: bool,
    names: BTreeSet<String>,
}

impl UsedSet {
    pub fn everything() -> Self {
        Self {
            all: true,
            names: BTreeSet::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all || self.names.contains(name)
    }

    pub fn is_everything(&self) -> bool {
        self.all
    }

    /// Returns true when the set grew.
    pub fn insert(&mut self, name: &str) -> bool {
        !self.all && self.names.insert(name.to_string())
    }

    pub fn mark_all(&mut self) -> bool {
        let changed = !self.all;
        self.all = true;
        changed
    }

    fn apply(&mut self, name: &UsedName) -> bool {
        match name {
            UsedName::All => self.mark_all(),
            UsedName::Named(name) => self.insert(name),
        }
    }
}

/// Used-export analysis over a linked module graph.
///
/// `edges[m][r]` is what import record `r` of module `m` resolved to.
pub struct TreeShaker<'g> {
    modules: &'g [ModuleRecord],
    edges: &'g [Vec<Link>],
}

impl<'g> TreeShaker<'g> {
    pub fn new(modules: &'g [ModuleRecord], edges: &'g [Vec<Link>]) -> Self {
        Self { modules, edges }
    }

    /// Every export counts as used; what a disabled gate produces.
    pub fn keep_everything(&self) -> Vec<UsedSet> {
        vec![UsedSet::everything(); self.modules.len()]
    }

    pub fn shake(&self, entry: usize) -> (Vec<UsedSet>, TreeShakingStats) {
        let mut used = vec![UsedSet::default(); self.modules.len()];
        if let Some(set) = used.get_mut(entry) {
            set.mark_all();
        }

        // Iterate to a fixpoint; sets only grow.
        let mut changed = true;
        while changed {
            changed = false;

            for (index, module) in self.modules.iter().enumerate() {
                let current = used[index].clone();

                for import in &module.uses {
                    if let Some(target) = self.target(index, import.record) {
                        changed |= used[target].apply(&import.name);
                    }
                }

                for reexport in &module.reexports {
                    if !current.contains(&reexport.exported) {
                        continue;
                    }
                    if let Some(target) = self.target(index, reexport.record) {
                        changed |= used[target].apply(&reexport.imported);
                    }
                }

                for &record in &module.star_reexports {
                    let Some(target) = self.target(index, record) else {
                        continue;
                    };
                    if current.is_everything() {
                        changed |= used[target].mark_all();
                        continue;
                    }
                    let local: BTreeSet<&str> = module.exported_names().collect();
                    for name in &current.names {
                        if name != "default" && !local.contains(name.as_str()) {
                            changed |= used[target].insert(name);
                        }
                    }
                }
            }
        }

        let stats = self.stats(&used);
        Logger::debug(&stats.to_string());
        (used, stats)
    }

    fn target(&self, module: usize, record: usize) -> Option<usize> {
        self.edges
            .get(module)
            .and_then(|records| records.get(record))
            .and_then(Link::module)
    }

    fn stats(&self, used: &[UsedSet]) -> TreeShakingStats {
        let mut total_exports = 0;
        let mut removed_exports = 0;

        for (module, set) in self.modules.iter().zip(used) {
            for name in module.exported_names() {
                total_exports += 1;
                if !set.contains(name) {
                    removed_exports += 1;
                }
            }
        }

        TreeShakingStats {
            total_modules: self.modules.len(),
            total_exports,
            removed_exports,
            reduction_percentage: if total_exports > 0 {
                (removed_exports as f64 / total_exports as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}
