use crate::utils::{DualpackError, Result};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MinifiedOutput {
    pub code: String,
    /// Maps minified positions to the unminified bundle.
    pub source_map: Option<String>,
}

/// JavaScript minification using oxc.
///
/// Mangles local names and compresses without going above the rules'
/// language level.
pub struct OxcMinifier {
    target: String,
}

impl OxcMinifier {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    fn options(&self) -> Result<MinifierOptions> {
        let target = self.target.parse().map_err(|err| {
            DualpackError::config(format!("unsupported target '{}': {}", self.target, err))
        })?;

        Ok(MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions {
                target,
                ..CompressOptions::default()
            }),
        })
    }

    /// Minify a rendered bundle. `filename` names the file the map is for.
    pub fn minify(&self, source_code: &str, filename: &str) -> Result<MinifiedOutput> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source_code, SourceType::cjs()).parse();

        if parsed.panicked || !parsed.errors.is_empty() {
            let errors: Vec<String> = parsed
                .errors
                .iter()
                .map(|e| format!("Parse error: {}", e))
                .collect();
            return Err(DualpackError::defect(format!(
                "rendered bundle {} does not parse: {}",
                filename,
                errors.join("\n")
            )));
        }

        let mut program = parsed.program;
        let minified = Minifier::new(self.options()?).minify(&allocator, &mut program);

        let generated = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                source_map_path: Some(PathBuf::from(filename)),
                ..CodegenOptions::default()
            })
            .with_scoping(minified.scoping)
            .build(&program);

        Ok(MinifiedOutput {
            code: generated.code,
            source_map: generated.map.map(|map| map.to_json_string()),
        })
    }
}

/// Async wrapper for minification in the build pipeline
pub struct MinificationService {
    minifier: Arc<OxcMinifier>,
}

impl MinificationService {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            minifier: Arc::new(OxcMinifier::new(target)),
        }
    }

    pub async fn minify_bundle(&self, bundle: String, filename: &str) -> Result<MinifiedOutput> {
        let minifier = self.minifier.clone();
        let filename = filename.to_string();

        // oxc is CPU bound
        tokio::task::spawn_blocking(move || minifier.minify(&bundle, &filename))
            .await
            .map_err(|e| DualpackError::defect(format!("minification task failed: {}", e)))?
    }
}
