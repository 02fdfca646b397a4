use crate::fixtures::{Fixture, DESKTOP_BUNDLE, WEB_BUNDLE};
use dualpack::core::models::OptimizationGate;
use dualpack::core::profiles::{FULL_ACCESS_TARGET, SANDBOXED_TARGET};

fn with_unused_exports(fixture: &Fixture) {
    fixture.write(
        "src/shared/greeting.ts",
        "export function greeting(name: string): string {\n  return `hello ${name}`;\n}\n\nexport function farewell(name: string): string {\n  return `goodbye ${name}`;\n}\n\nexport const UNUSED_BANNER = 'unused-banner-marker';\n",
    );
}

#[tokio::test]
async fn test_gate_on_produces_smaller_bundles() {
    let fixture = Fixture::new();
    with_unused_exports(&fixture);

    assert!(fixture.build(OptimizationGate::Off).await.is_success());
    let web_off = fixture.read(WEB_BUNDLE).len();
    let desktop_off = fixture.read(DESKTOP_BUNDLE).len();
    fixture.clean();

    let report = fixture.build(OptimizationGate::On).await;
    assert!(report.is_success(), "{:?}", report.errors());

    assert!(fixture.read(WEB_BUNDLE).len() <= web_off);
    assert!(fixture.read(DESKTOP_BUNDLE).len() <= desktop_off);
}

#[tokio::test]
async fn test_gate_controls_both_optimizations() {
    let fixture = Fixture::new();
    with_unused_exports(&fixture);

    let off = fixture.build(OptimizationGate::Off).await;
    for target in [SANDBOXED_TARGET, FULL_ACCESS_TARGET] {
        let artifacts = off.artifacts(target).unwrap();
        assert!(artifacts.tree_shaking_stats.is_none());
        assert!(artifacts.minification_stats.is_none());
    }
    assert!(fixture.read(WEB_BUNDLE).contains("unused-banner-marker"));
    fixture.clean();

    let on = fixture.build(OptimizationGate::On).await;
    for target in [SANDBOXED_TARGET, FULL_ACCESS_TARGET] {
        let artifacts = on.artifacts(target).unwrap();
        let shaking = artifacts.tree_shaking_stats.as_ref().unwrap();
        assert!(shaking.removed_exports >= 2);
        let minified = artifacts.minification_stats.as_ref().unwrap();
        assert!(minified.minified_size < minified.original_size);
    }
}

#[tokio::test]
async fn test_minified_output_keeps_source_map() {
    let fixture = Fixture::new();

    let report = fixture.build(OptimizationGate::On).await;
    assert!(report.is_success(), "{:?}", report.errors());

    let code = fixture.read(WEB_BUNDLE);
    assert!(code.ends_with("//# sourceMappingURL=webMain.js.map\n"));

    let map: serde_json::Value =
        serde_json::from_str(&fixture.read("dist/web/webMain.js.map")).unwrap();
    let sources = map["sources"].as_array().unwrap();
    assert!(sources
        .iter()
        .any(|s| s.as_str() == Some("../../src/shared/greeting.ts")));
    assert!(!map["mappings"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_gate_does_not_change_module_set() {
    let fixture = Fixture::new();
    with_unused_exports(&fixture);

    let off = fixture.build(OptimizationGate::Off).await;
    fixture.clean();
    let on = fixture.build(OptimizationGate::On).await;

    for target in [SANDBOXED_TARGET, FULL_ACCESS_TARGET] {
        let before = off.artifacts(target).unwrap();
        let after = on.artifacts(target).unwrap();
        assert_eq!(before.modules, after.modules);
        assert_eq!(before.code_files().count(), after.code_files().count());
    }
}
