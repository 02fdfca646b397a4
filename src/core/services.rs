use crate::core::interfaces::{BuildService, FileSystemService};
use crate::core::models::*;
use crate::core::orchestrator::BuildJob;
use crate::core::profiles::validate_profile;
use crate::infrastructure::{
    BundleRenderer, ChunkPlan, Link, MinificationService, ModuleLinker, ModuleRecord,
    ProfileResolver, RenderedFile, ResolvedModule, TreeShaker,
};
use crate::utils::source_maps::{append_source_mapping_url, compose};
use crate::utils::{DualpackError, JobFailure, Logger, Result, Timer};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs one target's compilation: resolve, compile, link, optimize, emit.
pub struct DualpackBuildService {
    fs_service: Arc<dyn FileSystemService>,
}

/// Linked module graph of one job; index 0 is the entry.
struct ModuleGraph {
    modules: Vec<ModuleRecord>,
    edges: Vec<Vec<Link>>,
}

impl DualpackBuildService {
    pub fn new(fs_service: Arc<dyn FileSystemService>) -> Self {
        Self { fs_service }
    }

    fn check_preconditions(&self, job: &BuildJob) -> Result<()> {
        validate_profile(&job.profile)?;

        for rule in job.rules.rules() {
            let project_config = job.profile.root.join(&rule.options.tsconfig);
            if !self.fs_service.file_exists(&project_config) {
                return Err(DualpackError::config(format!(
                    "target '{}': project configuration {} does not exist",
                    job.profile.name,
                    project_config.display()
                )));
            }
        }

        Ok(())
    }

    /// Breadth-first walk from the entry. Keeps going after a failure so
    /// every problem in the job is reported at once.
    async fn load_graph(&self, job: &BuildJob) -> std::result::Result<ModuleGraph, Vec<DualpackError>> {
        let profile = &job.profile;
        let mut resolver = ProfileResolver::new(profile);
        let mut errors = Vec::new();

        let mut paths: Vec<PathBuf> = vec![profile.entry_path()];
        let mut index_of: HashMap<PathBuf, usize> = HashMap::new();
        index_of.insert(profile.entry_path(), 0);
        let mut queue = VecDeque::from([0usize]);

        let mut records: Vec<Option<ModuleRecord>> = Vec::new();
        let mut edges: Vec<Vec<Link>> = Vec::new();

        while let Some(index) = queue.pop_front() {
            let path = paths[index].clone();
            records.push(None);
            edges.push(Vec::new());

            let record = match self.load_module(job, &path).await {
                Ok(record) => record,
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            };

            let mut links = Vec::with_capacity(record.records.len());
            for import in &record.records {
                match resolver.resolve(&import.specifier, &path).await {
                    Ok(ResolvedModule::File(target)) => {
                        let target_index = match index_of.get(&target) {
                            Some(existing) => *existing,
                            None => {
                                let next = paths.len();
                                index_of.insert(target.clone(), next);
                                paths.push(target);
                                queue.push_back(next);
                                next
                            }
                        };
                        links.push(Link::Module(target_index));
                    }
                    Ok(ResolvedModule::External(name)) => links.push(Link::External(name)),
                    Err(err) => {
                        errors.push(err);
                        links.push(Link::External(import.specifier.clone()));
                    }
                }
            }

            records[index] = Some(record);
            edges[index] = links;
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ModuleGraph {
            modules: records.into_iter().flatten().collect(),
            edges,
        })
    }

    async fn load_module(&self, job: &BuildJob, path: &Path) -> Result<ModuleRecord> {
        let source = self.fs_service.read_file(path).await?;
        let file = SourceFile::new(path);
        let module_type = file.module_type();

        let rules = job.rules.clone();
        let compile_file = file.clone();
        let compiled = tokio::task::spawn_blocking(move || rules.apply(&compile_file, &source))
            .await
            .map_err(|e| DualpackError::defect(format!("compile task failed: {}", e)))??;

        ModuleLinker::analyze(&ModuleInfo {
            id: format!("./{}", job.profile.relative_to_root(path)),
            path: path.to_path_buf(),
            module_type,
            code: compiled.code,
            source_map: compiled.source_map,
        })
    }

    /// Turns rendered files into final output files, minifying when the
    /// gate says so.
    async fn finalize(
        &self,
        job: &BuildJob,
        rendered: Vec<RenderedFile>,
    ) -> Result<(Vec<OutputFile>, Option<MinificationStats>)> {
        let output_dir = job.profile.output_dir();
        let minifier = job
            .gate
            .minification()
            .then(|| MinificationService::new(job.rules.target_level()));

        let mut outputs = Vec::new();
        let mut original_size = 0;
        let mut minified_size = 0;

        for file in rendered {
            let map_name = format!("{}.map", file.file_name);

            let (mut code, map) = match &minifier {
                Some(service) => {
                    let minified = service.minify_bundle(file.code.clone(), &file.file_name).await?;
                    original_size += file.code.len();
                    minified_size += minified.code.len();
                    let map = match &minified.source_map {
                        Some(minified_map) => compose(minified_map, &file.source_map, &file.file_name)?,
                        None => file.source_map.clone(),
                    };
                    (minified.code, map)
                }
                None => (file.code, file.source_map),
            };

            append_source_mapping_url(&mut code, &map_name);
            outputs.push(OutputFile::new(output_dir.join(&file.file_name), code));
            outputs.push(OutputFile::new(output_dir.join(map_name), map));
        }

        let stats = minifier
            .is_some()
            .then(|| MinificationStats::new(original_size, minified_size));

        Ok((outputs, stats))
    }

    /// Chunk files a previous build left behind that this build does not emit.
    async fn remove_stale_chunks(&self, profile: &TargetProfile, outputs: &[OutputFile]) -> Result<()> {
        let emitted: HashSet<&Path> = outputs.iter().map(|file| file.path.as_path()).collect();

        for path in self.fs_service.list_files(&profile.output_dir()).await? {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if profile.output.is_chunk_file_name(&profile.entry.name, name)
                && !emitted.contains(path.as_path())
            {
                self.fs_service.remove_file(&path).await?;
                Logger::debug(&format!("[{}] removed stale {}", profile.name, path.display()));
            }
        }

        Ok(())
    }

    async fn execute(&self, job: &BuildJob) -> std::result::Result<JobArtifacts, Vec<DualpackError>> {
        let timer = Timer::start(&format!("build {}", job.profile.name));
        let profile = &job.profile;
        Logger::job_start(&profile.name, &profile.entry.source.display().to_string());

        self.check_preconditions(job).map_err(|err| vec![err])?;

        let graph = self.load_graph(job).await?;
        let entry = 0;

        let plan = ChunkPlan::plan(profile.chunking, &graph.modules, &graph.edges, entry);
        if let Some(max) = profile.chunking.max_files() {
            if plan.file_count() > max {
                return Err(vec![DualpackError::defect(format!(
                    "target '{}' planned {} files but allows {}",
                    profile.name,
                    plan.file_count(),
                    max
                ))]);
            }
        }

        let shaker = TreeShaker::new(&graph.modules, &graph.edges);
        let (used, tree_shaking_stats) = if job.gate.dead_code_elimination() {
            let (used, stats) = shaker.shake(entry);
            Logger::tree_shaking(&profile.name, &stats.to_string());
            (used, Some(stats))
        } else {
            (shaker.keep_everything(), None)
        };

        let rendered = BundleRenderer::new(profile, &graph.modules, &graph.edges, &used, &plan)
            .render(entry)
            .map_err(|err| vec![err])?;

        let (output_files, minification_stats) =
            self.finalize(job, rendered).await.map_err(|err| vec![err])?;
        if let Some(stats) = &minification_stats {
            Logger::minified(&profile.name, &stats.to_string());
        }

        // Nothing touches the output directory before this point.
        self.remove_stale_chunks(profile, &output_files)
            .await
            .map_err(|err| vec![err])?;
        for file in &output_files {
            self.fs_service
                .write_file(&file.path, &file.content)
                .await
                .map_err(|err| vec![err])?;
            Logger::emitted(&profile.name, &file.path.display().to_string(), file.size);
        }

        Ok(JobArtifacts {
            target: profile.name.clone(),
            output_files,
            modules: graph.modules.len(),
            tree_shaking_stats,
            minification_stats,
            build_time: timer.elapsed(),
        })
    }
}

#[async_trait::async_trait]
impl BuildService for DualpackBuildService {
    async fn run_job(&self, job: &BuildJob) -> std::result::Result<JobArtifacts, JobFailure> {
        match self.execute(job).await {
            Ok(artifacts) => {
                Logger::job_complete(
                    &artifacts.target,
                    artifacts.output_files.len(),
                    artifacts.build_time,
                );
                Ok(artifacts)
            }
            Err(errors) => {
                for err in &errors {
                    Logger::problem(&job.profile.name, err);
                }
                Logger::job_failed(&job.profile.name, errors.len());
                Err(JobFailure::new(job.profile.name.clone(), errors))
            }
        }
    }
}
