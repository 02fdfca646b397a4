use crate::fixtures::{node_available, Fixture, DESKTOP_BUNDLE, WEB_BUNDLE};
use dualpack::core::models::OptimizationGate;

/// Builds with `gate`, then activates both bundles. Returns (web, desktop).
async fn activate_both(fixture: &Fixture, gate: OptimizationGate) -> (String, String) {
    let report = fixture.build(gate).await;
    assert!(report.is_success(), "{:?}", report.errors());
    let results = (fixture.activate(WEB_BUNDLE), fixture.activate(DESKTOP_BUNDLE));
    fixture.clean();
    results
}

/// Both gate settings must produce bundles that behave the same.
async fn assert_activates_to(fixture: &Fixture, web: &str, desktop: &str) {
    for gate in [OptimizationGate::Off, OptimizationGate::On] {
        let (web_result, desktop_result) = activate_both(fixture, gate).await;
        assert_eq!(web_result, web, "web bundle with gate {}", gate);
        assert_eq!(desktop_result, desktop, "desktop bundle with gate {}", gate);
    }
}

fn write_both_entries(fixture: &Fixture, entry: &str) {
    fixture.write("src/web/main.ts", entry);
    fixture.write("src/desktop/main.ts", entry);
}

#[tokio::test]
async fn test_bundles_run_with_gate_off_and_on() {
    if !node_available() {
        eprintln!("node not found; skipping");
        return;
    }
    let fixture = Fixture::new();
    assert_activates_to(&fixture, "\"hello web\"", "\"hello desktop\"").await;
}

#[tokio::test]
async fn test_dynamic_import_runs_inline_and_from_chunk() {
    if !node_available() {
        eprintln!("node not found; skipping");
        return;
    }
    let fixture = Fixture::new();
    fixture.write(
        "src/shared/lazy.ts",
        "import { greeting } from './greeting';\nexport const lazyValue = greeting('lazy');\n",
    );
    write_both_entries(
        &fixture,
        "export async function activate(): Promise<string> {\n  const lazy = await import('../shared/lazy');\n  return lazy.lazyValue;\n}\n",
    );

    assert_activates_to(&fixture, "\"hello lazy\"", "\"hello lazy\"").await;

    // The desktop result above came through the chunk loader.
    assert!(fixture.build(OptimizationGate::Off).await.is_success());
    assert!(fixture.exists("dist/desktop/desktopMain.1.js"));
}

#[tokio::test]
async fn test_import_cycle_reads_initialized_binding() {
    if !node_available() {
        eprintln!("node not found; skipping");
        return;
    }
    let fixture = Fixture::new();
    fixture.write(
        "src/shared/a.ts",
        "import { b } from './b';\nexport const a = 1;\nexport function viaB(): number {\n  return b();\n}\n",
    );
    fixture.write(
        "src/shared/b.ts",
        "import { a } from './a';\nexport const b = (): number => a + 1;\n",
    );
    write_both_entries(
        &fixture,
        "import { viaB } from '../shared/a';\nexport function activate(): number {\n  return viaB();\n}\n",
    );

    assert_activates_to(&fixture, "2", "2").await;
}

#[tokio::test]
async fn test_mutable_export_is_seen_by_importer() {
    if !node_available() {
        eprintln!("node not found; skipping");
        return;
    }
    let fixture = Fixture::new();
    fixture.write(
        "src/shared/counter.ts",
        "export let count = 0;\nexport function inc(): void {\n  count++;\n}\n",
    );
    fixture.write(
        "src/shared/reexport.ts",
        "export { count as current } from './counter';\n",
    );
    write_both_entries(
        &fixture,
        "import { count, inc } from '../shared/counter';\nimport { current } from '../shared/reexport';\nexport function activate(): number[] {\n  inc();\n  inc();\n  return [count, current];\n}\n",
    );

    assert_activates_to(&fixture, "[2,2]", "[2,2]").await;
}

#[tokio::test]
async fn test_commonjs_default_import_runs() {
    if !node_available() {
        eprintln!("node not found; skipping");
        return;
    }
    let fixture = Fixture::new();
    fixture.write(
        "src/shared/legacy.js",
        "module.exports = { label: 'legacy', shout: (s) => s.toUpperCase() };\n",
    );
    write_both_entries(
        &fixture,
        "import legacy from '../shared/legacy.js';\nimport { shout } from '../shared/legacy.js';\nexport function activate(): string {\n  return shout(legacy.label);\n}\n",
    );

    assert_activates_to(&fixture, "\"LEGACY\"", "\"LEGACY\"").await;
}
