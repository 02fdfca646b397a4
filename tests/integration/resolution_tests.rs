use crate::fixtures::{Fixture, DESKTOP_BUNDLE, WEB_BUNDLE};
use dualpack::core::models::OptimizationGate;
use dualpack::core::profiles::{FULL_ACCESS_TARGET, SANDBOXED_TARGET};

const IMPORTS_DUALPKG: &str =
    "import { build } from 'dualpkg';\nexport function activate(): string {\n  return build;\n}\n";

fn with_dual_package(fixture: &Fixture) {
    fixture.write(
        "node_modules/dualpkg/package.json",
        r#"{ "name": "dualpkg", "browser": "browser.js", "main": "main.js" }"#,
    );
    fixture.write("node_modules/dualpkg/browser.js", "exports.build = 'browser-build';\n");
    fixture.write("node_modules/dualpkg/main.js", "exports.build = 'node-build';\n");
    fixture.write("src/web/main.ts", IMPORTS_DUALPKG);
    fixture.write("src/desktop/main.ts", IMPORTS_DUALPKG);
}

#[tokio::test]
async fn test_each_target_picks_its_package_field() {
    let fixture = Fixture::new();
    with_dual_package(&fixture);

    let report = fixture.build(OptimizationGate::Off).await;
    assert!(report.is_success(), "{:?}", report.errors());

    let web = fixture.read(WEB_BUNDLE);
    assert!(web.contains("browser-build"));
    assert!(!web.contains("node-build"));

    let desktop = fixture.read(DESKTOP_BUNDLE);
    assert!(desktop.contains("node-build"));
    assert!(!desktop.contains("browser-build"));
}

#[tokio::test]
async fn test_alias_wins_over_package_fields() {
    let fixture = Fixture::new();
    with_dual_package(&fixture);
    fixture.write("src/web/dualpkg-shim.ts", "export const build = 'shim-build';\n");
    fixture.write(
        "dualpack.config.json",
        r#"{ "targets": { "web": { "alias": { "dualpkg": "./src/web/dualpkg-shim.ts" } } } }"#,
    );

    let report = fixture.build(OptimizationGate::Off).await;
    assert!(report.is_success(), "{:?}", report.errors());

    let web = fixture.read(WEB_BUNDLE);
    assert!(web.contains("shim-build"));
    assert!(!web.contains("browser-build"));
    // The alias belongs to the sandboxed target only.
    assert!(fixture.read(DESKTOP_BUNDLE).contains("node-build"));
}

#[tokio::test]
async fn test_alias_to_missing_file_is_configuration_error() {
    let fixture = Fixture::new();
    fixture.write(
        "dualpack.config.json",
        r#"{ "targets": { "desktop": { "alias": { "os": "./src/desktop/nowhere.ts" } } } }"#,
    );

    let report = fixture.build(OptimizationGate::Off).await;
    let errors = report.errors();

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, FULL_ACCESS_TARGET);
    assert!(errors[0].1.is_configuration());
    assert!(report.artifacts(SANDBOXED_TARGET).is_some());
}

#[tokio::test]
async fn test_host_builtins_only_on_full_access_target() {
    let fixture = Fixture::new();
    let uses_fs = "import * as fs from 'fs';\nexport function activate(): boolean {\n  return fs.existsSync('x');\n}\n";
    fixture.write("src/web/main.ts", uses_fs);
    fixture.write("src/desktop/main.ts", uses_fs);

    let report = fixture.build(OptimizationGate::Off).await;

    let errors = report.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, SANDBOXED_TARGET);
    assert!(errors[0].1.is_resolution());
    assert!(errors[0].1.to_string().contains("'fs'"));

    assert!(fixture.read(DESKTOP_BUNDLE).contains("require(\"fs\")"));
}

#[tokio::test]
async fn test_editor_host_module_stays_external() {
    let fixture = Fixture::new();
    let uses_host = "import * as vscode from 'vscode';\nexport function activate(): void {\n  vscode.window.showInformationMessage('hi');\n}\n";
    fixture.write("src/web/main.ts", uses_host);
    fixture.write("src/desktop/main.ts", uses_host);

    let report = fixture.build(OptimizationGate::Off).await;
    assert!(report.is_success(), "{:?}", report.errors());

    assert!(fixture.read(WEB_BUNDLE).contains("require(\"vscode\")"));
    assert!(fixture.read(DESKTOP_BUNDLE).contains("require(\"vscode\")"));
}

#[tokio::test]
async fn test_every_missing_import_is_reported() {
    let fixture = Fixture::new();
    fixture.write(
        "src/web/main.ts",
        "import { a } from './nope-a';\nimport { b } from 'nope-b';\nexport const both = a + b;\n",
    );

    let report = fixture.build(OptimizationGate::Off).await;
    let messages: Vec<String> = report
        .errors()
        .iter()
        .filter(|(target, err)| *target == SANDBOXED_TARGET && err.is_resolution())
        .map(|(_, err)| err.to_string())
        .collect();

    assert_eq!(messages.len(), 2);
    assert!(messages.iter().any(|m| m.contains("'./nope-a'")));
    assert!(messages.iter().any(|m| m.contains("'nope-b'")));
    assert!(messages.iter().all(|m| m.contains("main.ts")));
}
