//! Writes linked modules out as a module registry plus a small runtime.

use crate::core::models::{ChunkPolicy, OutputFormat, TargetProfile};
use crate::infrastructure::processors::module_linker::{
    quote, ImportKind, Link, ModuleRecord, RenderContext,
};
use crate::infrastructure::processors::tree_shaker::UsedSet;
use crate::utils::source_maps::SourceMapBundler;
use crate::utils::Result;
use std::collections::{BTreeSet, HashMap};

const FACTORY_PARAMS: &str = "module, exports, __require, __export, __exportStar, __interop, __load";

const RUNTIME_HELPERS: &str = r#"var __cache = {};
function __require(id) {
  var cached = __cache[id];
  if (cached !== undefined) return cached.exports;
  var factory = __modules[id];
  if (factory === undefined) throw new Error("Cannot find module '" + id + "'");
  var module = __cache[id] = { exports: {} };
  factory.call(module.exports, module, module.exports, __require, __export, __exportStar, __interop, __load);
  return module.exports;
}
function __export(target, getters) {
  Object.defineProperty(target, "__esModule", { value: true });
  for (const name in getters) Object.defineProperty(target, name, { enumerable: true, get: getters[name] });
}
function __exportStar(target, source) {
  for (const name in source) {
    if (name !== "default" && !Object.prototype.hasOwnProperty.call(target, name)) {
      Object.defineProperty(target, name, { enumerable: true, get: () => source[name] });
    }
  }
}
function __interop(mod) {
  if (mod && mod.__esModule) return mod;
  return Object.assign({}, mod, { default: mod });
}
"#;

const CHUNK_LOADER: &str = r#"function __load(file) {
  return Promise.resolve().then(() => {
    var chunk = require("./" + file);
    for (const id in chunk.modules) {
      if (!Object.prototype.hasOwnProperty.call(__modules, id)) __modules[id] = chunk.modules[id];
    }
  });
}
"#;

const NO_CHUNK_LOADER: &str = "var __load = undefined;\n";

/// Which modules go into which output file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkPlan {
    pub main: Vec<usize>,
    /// Lazily loaded files, each rooted at a dynamic import target.
    pub chunks: Vec<Vec<usize>>,
    roots: HashMap<usize, usize>,
}

impl ChunkPlan {
    pub fn plan(
        policy: ChunkPolicy,
        modules: &[ModuleRecord],
        edges: &[Vec<Link>],
        entry: usize,
    ) -> Self {
        if policy == ChunkPolicy::SingleUnitOnly {
            return Self {
                main: (0..modules.len()).collect(),
                chunks: Vec::new(),
                roots: HashMap::new(),
            };
        }

        let main = static_closure(modules, edges, entry, &BTreeSet::new());
        let in_main: BTreeSet<usize> = main.iter().copied().collect();
        let mut chunks = Vec::new();
        let mut roots = HashMap::new();

        for (index, module) in modules.iter().enumerate() {
            for (record, link) in module.records.iter().zip(&edges[index]) {
                if record.kind != ImportKind::Dynamic {
                    continue;
                }
                let Some(target) = link.module() else {
                    continue;
                };
                if in_main.contains(&target) || roots.contains_key(&target) {
                    continue;
                }
                roots.insert(target, chunks.len());
                chunks.push(static_closure(modules, edges, target, &in_main));
            }
        }

        Self { main, chunks, roots }
    }

    pub fn file_count(&self) -> usize {
        1 + self.chunks.len()
    }

    pub fn chunk_of(&self, module: usize) -> Option<usize> {
        self.roots.get(&module).copied()
    }
}

/// Modules reachable from `start` without crossing a dynamic import,
/// excluding `skip`, in discovery order.
fn static_closure(
    modules: &[ModuleRecord],
    edges: &[Vec<Link>],
    start: usize,
    skip: &BTreeSet<usize>,
) -> Vec<usize> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];

    while let Some(index) = stack.pop() {
        if skip.contains(&index) || !seen.insert(index) {
            continue;
        }
        for (record, link) in modules[index].records.iter().zip(&edges[index]) {
            if record.kind == ImportKind::Dynamic {
                continue;
            }
            if let Some(target) = link.module() {
                stack.push(target);
            }
        }
    }

    seen.into_iter().collect()
}

#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub file_name: String,
    pub code: String,
    pub source_map: String,
}

/// Tracks the current line while text is appended.
struct LineWriter {
    out: String,
    line: u32,
}

impl LineWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            line: 0,
        }
    }

    fn push(&mut self, text: &str) {
        self.line += text.matches('\n').count() as u32;
        self.out.push_str(text);
    }
}

pub struct BundleRenderer<'a> {
    profile: &'a TargetProfile,
    modules: &'a [ModuleRecord],
    edges: &'a [Vec<Link>],
    used: &'a [UsedSet],
    plan: &'a ChunkPlan,
}

impl<'a> BundleRenderer<'a> {
    pub fn new(
        profile: &'a TargetProfile,
        modules: &'a [ModuleRecord],
        edges: &'a [Vec<Link>],
        used: &'a [UsedSet],
        plan: &'a ChunkPlan,
    ) -> Self {
        Self {
            profile,
            modules,
            edges,
            used,
            plan,
        }
    }

    pub fn main_file_name(&self) -> String {
        self.profile.output.file_name(&self.profile.entry.name)
    }

    fn chunk_file_name(&self, chunk: usize) -> String {
        self.profile
            .output
            .chunk_file_name(&self.profile.entry.name, chunk + 1)
    }

    /// Main file first, then chunks in plan order.
    pub fn render(&self, entry: usize) -> Result<Vec<RenderedFile>> {
        let mut files = vec![self.render_main(entry)?];
        for (index, chunk) in self.plan.chunks.iter().enumerate() {
            files.push(self.render_chunk(index, chunk)?);
        }
        Ok(files)
    }

    fn render_main(&self, entry: usize) -> Result<RenderedFile> {
        let file_name = self.main_file_name();
        let mut writer = LineWriter::new();
        let mut map = SourceMapBundler::new(&file_name);

        writer.push("(() => {\nvar __modules = {\n");
        self.write_modules(&mut writer, &mut map, &self.plan.main)?;
        writer.push("};\n");
        writer.push(RUNTIME_HELPERS);
        writer.push(if self.plan.chunks.is_empty() {
            NO_CHUNK_LOADER
        } else {
            CHUNK_LOADER
        });
        writer.push(&format!(
            "var __entry = __require({});\n",
            quote(&self.modules[entry].id)
        ));
        writer.push(match self.profile.output.format {
            OutputFormat::CommonJs => {
                "for (const name in __entry) {\n  Object.defineProperty(exports, name, { enumerable: true, get: () => __entry[name] });\n}\nif (__entry && __entry.__esModule) Object.defineProperty(exports, \"__esModule\", { value: true });\n"
            }
            OutputFormat::CommonJs2 => "module.exports = __entry;\n",
        });
        writer.push("})();\n");

        Ok(RenderedFile {
            file_name,
            code: writer.out,
            source_map: map.into_json()?,
        })
    }

    fn render_chunk(&self, index: usize, members: &[usize]) -> Result<RenderedFile> {
        let file_name = self.chunk_file_name(index);
        let mut writer = LineWriter::new();
        let mut map = SourceMapBundler::new(&file_name);

        writer.push("exports.modules = {\n");
        self.write_modules(&mut writer, &mut map, members)?;
        writer.push("};\n");

        Ok(RenderedFile {
            file_name,
            code: writer.out,
            source_map: map.into_json()?,
        })
    }

    fn write_modules(
        &self,
        writer: &mut LineWriter,
        map: &mut SourceMapBundler,
        members: &[usize],
    ) -> Result<()> {
        for &index in members {
            let module = &self.modules[index];
            let require = |record: usize| self.require_expr(index, record);
            let dynamic = |record: usize| self.dynamic_expr(index, record);
            let rendered = module.render(
                &self.used[index],
                &RenderContext {
                    require: &require,
                    dynamic: &dynamic,
                },
            );

            writer.push(&format!(
                "{}: function ({}) {{ {}\n",
                quote(&module.id),
                FACTORY_PARAMS,
                rendered.header
            ));

            let line_count = rendered.body.lines().count() as u32;
            let source_name = self
                .profile
                .output
                .source_path(&self.profile.relative_to_root(&module.path));
            map.append_module(
                module.source_map.as_deref(),
                &source_name,
                writer.line,
                line_count,
            )?;

            writer.push(&rendered.body);
            if !rendered.body.ends_with('\n') {
                writer.push("\n");
            }
            writer.push("},\n");
        }
        Ok(())
    }

    fn require_expr(&self, index: usize, record: usize) -> String {
        match &self.edges[index][record] {
            Link::Module(target) => format!("__require({})", quote(&self.modules[*target].id)),
            Link::External(name) => format!("require({})", quote(name)),
        }
    }

    fn dynamic_expr(&self, index: usize, record: usize) -> String {
        match &self.edges[index][record] {
            Link::Module(target) => {
                let id = quote(&self.modules[*target].id);
                match self.plan.chunk_of(*target) {
                    Some(chunk) => format!(
                        "__load({}).then(() => __interop(__require({})))",
                        quote(&self.chunk_file_name(chunk)),
                        id
                    ),
                    None => format!("Promise.resolve().then(() => __interop(__require({})))", id),
                }
            }
            Link::External(name) => format!(
                "Promise.resolve().then(() => __interop(require({})))",
                quote(name)
            ),
        }
    }
}
