use crate::core::interfaces::SourceCompiler;
use crate::core::models::{CompiledModule, CompilerOptions, SourceFile};
use crate::utils::{DualpackError, Logger, Result, Timer};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};

/// TypeScript/JavaScript compiler backed by oxc.
///
/// Strips types and lowers syntax to the rule's target level. Module syntax
/// is left intact for the linker.
#[derive(Debug, Clone, Default)]
pub struct OxcCompiler;

impl OxcCompiler {
    pub fn new() -> Self {
        Self
    }

    fn transform_options(&self, options: &CompilerOptions) -> Result<TransformOptions> {
        TransformOptions::from_target(&options.target).map_err(|err| {
            DualpackError::config(format!("unsupported target '{}': {}", options.target, err))
        })
    }
}

impl SourceCompiler for OxcCompiler {
    fn name(&self) -> &str {
        "oxc"
    }

    fn compile(
        &self,
        file: &SourceFile,
        source: &str,
        options: &CompilerOptions,
    ) -> Result<CompiledModule> {
        let _timer = Timer::start(&format!("compiling {}", file.path.display()));
        Logger::processing_file(&file.normalized_path(), &options.target);

        let allocator = Allocator::default();
        let source_type = SourceType::from_path(&file.path).map_err(|err| {
            DualpackError::compile(file.path.clone(), format!("unknown source type: {:?}", err))
        })?;

        let parsed = Parser::new(&allocator, source, source_type).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            let diagnostics: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
            return Err(DualpackError::compile(file.path.clone(), diagnostics.join("; ")));
        }

        let mut program = parsed.program;
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();

        let transform_options = self.transform_options(options)?;
        let transformed = Transformer::new(&allocator, &file.path, &transform_options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            let diagnostics: Vec<String> =
                transformed.errors.iter().map(|e| e.to_string()).collect();
            return Err(DualpackError::compile(file.path.clone(), diagnostics.join("; ")));
        }

        let generated = Codegen::new()
            .with_options(CodegenOptions {
                source_map_path: Some(file.path.clone()),
                ..CodegenOptions::default()
            })
            .build(&program);

        Ok(CompiledModule {
            code: generated.code,
            source_map: generated.map.map(|map| map.to_json_string()),
        })
    }
}
