use dualpack::core::interfaces::{BuildService, FileSystemService};
use dualpack::core::models::OptimizationGate;
use dualpack::core::orchestrator::{BuildOrchestrator, BuildReport, ExecutionMode};
use dualpack::core::services::DualpackBuildService;
use dualpack::infrastructure::TokioFileSystemService;
use dualpack::utils::ConfigLoader;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

pub const WEB_BUNDLE: &str = "dist/web/webMain.js";
pub const DESKTOP_BUNDLE: &str = "dist/desktop/desktopMain.js";

/// Loads a bundle the way the host does and prints what `activate()`
/// resolves to as JSON.
const ACTIVATE_SCRIPT: &str = r#"
const bundle = require(process.argv[1]);
Promise.resolve(bundle.activate()).then(
  (value) => console.log(JSON.stringify(value)),
  (err) => { console.error(err); process.exit(1); }
);
"#;

/// Tests that execute bundles are skipped when `node` is not on PATH.
pub fn node_available() -> bool {
    Command::new("node")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

/// A throwaway extension project with both entry files in place.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        fixture.write("tsconfig.json", r#"{ "compilerOptions": { "target": "es2020" } }"#);
        fixture.write(
            "src/shared/greeting.ts",
            "export function greeting(name: string): string {\n  return `hello ${name}`;\n}\n",
        );
        fixture.write(
            "src/web/main.ts",
            "import { greeting } from '../shared/greeting';\nexport function activate(): string {\n  return greeting('web');\n}\n",
        );
        fixture.write(
            "src/desktop/main.ts",
            "import { greeting } from '../shared/greeting';\nexport function activate(): string {\n  return greeting('desktop');\n}\n",
        );
        fixture
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().canonicalize().unwrap()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.dir.path().join(rel)).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(rel)).unwrap()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.dir.path().join(rel).exists()
    }

    /// File names directly inside `rel`, sorted.
    pub fn list(&self, rel: &str) -> Vec<String> {
        let dir = self.dir.path().join(rel);
        if !Path::new(&dir).is_dir() {
            return Vec::new();
        }
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    pub async fn build(&self, gate: OptimizationGate) -> BuildReport {
        let config = ConfigLoader::load(&self.root(), None, None).unwrap();
        let orchestrator = BuildOrchestrator::compose(&config, gate).unwrap();
        let fs_service: Arc<dyn FileSystemService> = Arc::new(TokioFileSystemService);
        let service: Arc<dyn BuildService> = Arc::new(DualpackBuildService::new(fs_service));
        orchestrator.run(service, ExecutionMode::Parallel).await
    }

    /// Runs `activate()` of the bundle at `rel` in node.
    pub fn activate(&self, rel: &str) -> String {
        let output = Command::new("node")
            .arg("-e")
            .arg(ACTIVATE_SCRIPT)
            .arg(self.dir.path().join(rel))
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "{} failed: {}",
            rel,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    pub fn clean(&self) {
        let _ = std::fs::remove_dir_all(self.dir.path().join("dist"));
    }
}
