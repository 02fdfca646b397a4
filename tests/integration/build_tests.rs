use crate::fixtures::{Fixture, DESKTOP_BUNDLE, WEB_BUNDLE};
use dualpack::core::models::OptimizationGate;
use dualpack::core::profiles::{FULL_ACCESS_TARGET, SANDBOXED_TARGET};
use dualpack::utils::DualpackError;

#[tokio::test]
async fn test_both_targets_build() {
    let fixture = Fixture::new();
    let report = fixture.build(OptimizationGate::Off).await;

    assert!(report.is_success(), "{:?}", report.errors());
    assert_eq!(fixture.list("dist/web"), vec!["webMain.js", "webMain.js.map"]);
    assert_eq!(
        fixture.list("dist/desktop"),
        vec!["desktopMain.js", "desktopMain.js.map"]
    );

    let web = fixture.read(WEB_BUNDLE);
    assert!(web.contains("\"./src/shared/greeting.ts\": function"));
    assert!(web.contains("Object.defineProperty(exports, name"));
    assert!(!web.contains("module.exports = __entry"));
    assert!(web.ends_with("//# sourceMappingURL=webMain.js.map\n"));

    let desktop = fixture.read(DESKTOP_BUNDLE);
    assert!(desktop.contains("module.exports = __entry;"));
    assert!(!desktop.contains(": string"));
}

#[tokio::test]
async fn test_source_map_uses_resource_path_template() {
    let fixture = Fixture::new();
    assert!(fixture.build(OptimizationGate::Off).await.is_success());

    let map: serde_json::Value =
        serde_json::from_str(&fixture.read("dist/web/webMain.js.map")).unwrap();
    let sources: Vec<&str> = map["sources"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s.as_str())
        .collect();

    assert!(sources.contains(&"../../src/web/main.ts"));
    assert!(sources.contains(&"../../src/shared/greeting.ts"));
    assert!(map.get("sourcesContent").is_none());
}

#[tokio::test]
async fn test_pass_through_files_are_unchanged() {
    let fixture = Fixture::new();
    let legacy = "module.exports = { legacyValue: 'legacy-marker' /* left as written */ };\n";
    fixture.write("src/shared/legacy.js", legacy);
    fixture.write(
        "src/desktop/main.ts",
        "import legacy from '../shared/legacy.js';\nexport const value = legacy.legacyValue;\n",
    );

    let report = fixture.build(OptimizationGate::Off).await;
    assert!(report.is_success(), "{:?}", report.errors());
    assert!(fixture.read(DESKTOP_BUNDLE).contains(legacy.trim_end()));
}

#[tokio::test]
async fn test_sandboxed_target_stays_single_file() {
    let fixture = Fixture::new();
    fixture.write("src/shared/lazy.ts", "export const lazyValue = 'lazy-marker';\n");
    let entry = "export async function activate(): Promise<string> {\n  const lazy = await import('../shared/lazy');\n  return lazy.lazyValue;\n}\n";
    fixture.write("src/web/main.ts", entry);
    fixture.write("src/desktop/main.ts", entry);

    let report = fixture.build(OptimizationGate::Off).await;
    assert!(report.is_success(), "{:?}", report.errors());

    assert_eq!(fixture.list("dist/web"), vec!["webMain.js", "webMain.js.map"]);
    assert!(fixture.read(WEB_BUNDLE).contains("lazy-marker"));

    // The unconstrained target moves the dynamic import into its own file.
    assert!(fixture.exists("dist/desktop/desktopMain.1.js"));
    assert!(!fixture.read(DESKTOP_BUNDLE).contains("lazy-marker"));
    assert!(fixture
        .read("dist/desktop/desktopMain.1.js")
        .contains("lazy-marker"));
}

#[tokio::test]
async fn test_compile_error_is_isolated_to_its_job() {
    let fixture = Fixture::new();
    fixture.write("src/web/main.ts", "export const broken = ;\n");

    let report = fixture.build(OptimizationGate::Off).await;

    assert!(!report.is_success());
    let errors = report.errors();
    assert!(errors
        .iter()
        .all(|(target, _)| *target == SANDBOXED_TARGET));
    assert!(errors.iter().any(|(_, err)| err.is_compile()));
    assert!(!fixture.exists(WEB_BUNDLE));

    let desktop = report.artifacts(FULL_ACCESS_TARGET).unwrap();
    assert_eq!(desktop.code_files().count(), 1);
    assert!(fixture.read(DESKTOP_BUNDLE).contains("module.exports = __entry;"));
}

#[tokio::test]
async fn test_all_errors_of_a_job_are_reported() {
    let fixture = Fixture::new();
    fixture.write(
        "src/desktop/main.ts",
        "import { a } from './missing-one';\nimport { b } from './missing-two';\nexport const sum = a + b;\n",
    );

    let report = fixture.build(OptimizationGate::Off).await;

    let errors: Vec<_> = report
        .errors()
        .into_iter()
        .filter(|(target, _)| *target == FULL_ACCESS_TARGET)
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|(_, err)| err.is_resolution()));
    assert!(report.artifacts(SANDBOXED_TARGET).is_some());
}

#[tokio::test]
async fn test_missing_project_config_fails_both_jobs() {
    let fixture = Fixture::new();
    fixture.remove("tsconfig.json");

    let report = fixture.build(OptimizationGate::Off).await;

    assert_eq!(report.failures().count(), 2);
    assert!(report
        .errors()
        .iter()
        .all(|(_, err)| matches!(err, DualpackError::Configuration(_))));
}

#[tokio::test]
async fn test_missing_entry_is_configuration_error() {
    let fixture = Fixture::new();
    fixture.remove("src/web/main.ts");

    let report = fixture.build(OptimizationGate::Off).await;
    let errors = report.errors();

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, SANDBOXED_TARGET);
    assert!(errors[0].1.is_configuration());
    assert!(report.artifacts(FULL_ACCESS_TARGET).is_some());
}

#[tokio::test]
async fn test_rebuild_is_byte_identical() {
    let fixture = Fixture::new();
    fixture.write("src/shared/lazy.ts", "export const lazyValue = 1;\n");
    fixture.write(
        "src/desktop/main.ts",
        "import { greeting } from '../shared/greeting';\nexport const load = () => import('../shared/lazy');\nexport const hi = greeting('x');\n",
    );

    for gate in [OptimizationGate::Off, OptimizationGate::On] {
        assert!(fixture.build(gate).await.is_success());
        let first: Vec<String> = ["dist/web", "dist/desktop"]
            .iter()
            .flat_map(|dir| {
                fixture
                    .list(dir)
                    .into_iter()
                    .map(move |name| format!("{}/{}", dir, name))
            })
            .map(|path| fixture.read(&path))
            .collect();

        fixture.clean();
        assert!(fixture.build(gate).await.is_success());
        let second: Vec<String> = ["dist/web", "dist/desktop"]
            .iter()
            .flat_map(|dir| {
                fixture
                    .list(dir)
                    .into_iter()
                    .map(move |name| format!("{}/{}", dir, name))
            })
            .map(|path| fixture.read(&path))
            .collect();

        assert_eq!(first, second);
        fixture.clean();
    }
}

#[tokio::test]
async fn test_rebuild_removes_chunks_no_longer_produced() {
    let fixture = Fixture::new();
    fixture.write("src/shared/lazy.ts", "export const lazyValue = 'lazy-marker';\n");
    fixture.write(
        "src/desktop/main.ts",
        "export async function activate(): Promise<string> {\n  return (await import('../shared/lazy')).lazyValue;\n}\n",
    );
    assert!(fixture.build(OptimizationGate::Off).await.is_success());
    assert!(fixture.exists("dist/desktop/desktopMain.1.js"));

    fixture.write(
        "src/desktop/main.ts",
        "export function activate(): string {\n  return 'eager';\n}\n",
    );
    fixture.write("dist/desktop/notes.txt", "kept");
    assert!(fixture.build(OptimizationGate::Off).await.is_success());

    assert_eq!(
        fixture.list("dist/desktop"),
        vec!["desktopMain.js", "desktopMain.js.map", "notes.txt"]
    );
}
