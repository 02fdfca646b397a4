//! Turns compiled ES/CommonJS modules into registry functions.
//!
//! Analysis records every import request and export binding of a module and
//! plans text edits over its compiled code. Edits never add or remove line
//! breaks, so the compiler's source map stays valid line for line.
//!
//! Imported names stay live: each import declaration binds the exporter's
//! namespace once and every reference to an imported local reads through it.

use crate::core::models::{ModuleInfo, ModuleType};
use crate::infrastructure::processors::tree_shaker::UsedSet;
use crate::utils::{DualpackError, Result};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit};
use oxc_parser::{ParseOptions, Parser};
use oxc_semantic::{ReferenceId, Scoping, SemanticBuilder};
use oxc_span::{GetSpan, SourceType, Span};
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_EXPORT_BINDING: &str = "__dp_default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import` / `export ... from`
    Static,
    /// `require("...")`
    Require,
    /// `import("...")`
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
}

/// What an import record resolved to within one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Index into the job's module list.
    Module(usize),
    /// Loaded by the host's own `require`.
    External(String),
}

impl Link {
    pub fn module(&self) -> Option<usize> {
        match self {
            Link::Module(index) => Some(*index),
            Link::External(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsedName {
    Named(String),
    All,
}

/// An export of this module and the expression its getter returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBinding {
    pub exported: String,
    pub expr: String,
}

#[derive(Debug, Clone)]
pub struct NameUse {
    pub record: usize,
    pub name: UsedName,
}

/// `export { imported as exported } from '...'`
#[derive(Debug, Clone)]
pub struct ReExport {
    pub record: usize,
    pub imported: UsedName,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Require(usize),
    Interop(usize),
    Dynamic(usize),
}

#[derive(Debug, Clone)]
struct Edit {
    start: u32,
    end: u32,
    pieces: Vec<Piece>,
}

impl Edit {
    fn new(start: u32, end: u32, pieces: Vec<Piece>) -> Self {
        Self { start, end, pieces }
    }

    fn replace(span: Span, pieces: Vec<Piece>) -> Self {
        Self::new(span.start, span.end, pieces)
    }

    fn text(start: u32, end: u32, text: &str) -> Self {
        Self::new(start, end, vec![Piece::Text(text.to_string())])
    }
}

/// Everything the linker knows about one module.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: String,
    pub path: PathBuf,
    pub module_type: ModuleType,
    pub code: String,
    pub source_map: Option<String>,
    pub is_esm: bool,
    pub records: Vec<ImportRecord>,
    pub exports: Vec<ExportBinding>,
    pub uses: Vec<NameUse>,
    pub reexports: Vec<ReExport>,
    pub star_reexports: Vec<usize>,
    edits: Vec<Edit>,
}

/// How record references are spelled in the rendered output.
pub struct RenderContext<'r> {
    pub require: &'r dyn Fn(usize) -> String,
    pub dynamic: &'r dyn Fn(usize) -> String,
}

#[derive(Debug, Clone)]
pub struct RenderedModule {
    /// Emitted on the registry line, before the first line of `body`.
    pub header: String,
    /// Same number of lines as the compiled code.
    pub body: String,
}

impl ModuleRecord {
    pub fn exported_names(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|e| e.exported.as_str())
    }

    pub fn render(&self, used: &UsedSet, ctx: &RenderContext<'_>) -> RenderedModule {
        let header = if self.is_esm {
            let getters: Vec<String> = self
                .exports
                .iter()
                .filter(|binding| used.contains(&binding.exported))
                .map(|binding| format!("{}: () => {}", quote(&binding.exported), binding.expr))
                .collect();
            format!("\"use strict\"; __export(exports, {{ {} }});", getters.join(", "))
        } else {
            String::new()
        };

        RenderedModule {
            header,
            body: self.apply_edits(ctx),
        }
    }

    fn apply_edits(&self, ctx: &RenderContext<'_>) -> String {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        edits.sort_by_key(|edit| (edit.start, edit.end));

        let code = self.code.as_str();
        let mut out = String::with_capacity(code.len());
        let mut cursor = 0usize;

        for edit in edits {
            let (start, end) = (edit.start as usize, edit.end as usize);
            if start < cursor || end > code.len() {
                continue;
            }
            out.push_str(&code[cursor..start]);
            for piece in &edit.pieces {
                match piece {
                    Piece::Text(text) => out.push_str(text),
                    Piece::Require(record) => out.push_str(&(ctx.require)(*record)),
                    Piece::Interop(record) => {
                        out.push_str(&format!("__interop({})", (ctx.require)(*record)))
                    }
                    Piece::Dynamic(record) => out.push_str(&(ctx.dynamic)(*record)),
                }
            }
            // Keep the line structure of the replaced range.
            let newlines = code[start..end].matches('\n').count();
            out.push_str(&"\n".repeat(newlines));
            cursor = end;
        }

        out.push_str(&code[cursor..]);
        out
    }
}

/// Builds [`ModuleRecord`]s from compiled modules.
pub struct ModuleLinker;

impl ModuleLinker {
    pub fn analyze(module: &ModuleInfo) -> Result<ModuleRecord> {
        if module.module_type == ModuleType::Json {
            return Self::json_module(module);
        }

        let allocator = Allocator::default();
        let options = ParseOptions {
            allow_return_outside_function: true,
            ..ParseOptions::default()
        };

        let mut parsed = Parser::new(&allocator, &module.code, SourceType::mjs()).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            // Not valid as an ES module; CommonJS scripts may still parse.
            parsed = Parser::new(&allocator, &module.code, SourceType::cjs())
                .with_options(options)
                .parse();
        }
        if parsed.panicked || !parsed.errors.is_empty() {
            let diagnostics: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
            return Err(DualpackError::compile(module.path.clone(), diagnostics.join("; ")));
        }

        let mut collector = Collector::default();
        {
            let semantic = SemanticBuilder::new().build(&parsed.program).semantic;
            collector.bind_imports(&parsed.program.body, semantic.scoping());
        }
        let mut is_esm = false;

        for stmt in &parsed.program.body {
            if collector.module_declaration(stmt) {
                is_esm = true;
            }
            collector.visit_statement(stmt);
        }

        Ok(ModuleRecord {
            id: module.id.clone(),
            path: module.path.clone(),
            module_type: module.module_type,
            code: module.code.clone(),
            source_map: module.source_map.clone(),
            is_esm,
            records: collector.records,
            exports: collector.exports,
            uses: collector.uses,
            reexports: collector.reexports,
            star_reexports: collector.star_reexports,
            edits: collector.edits,
        })
    }

    fn json_module(module: &ModuleInfo) -> Result<ModuleRecord> {
        serde_json::from_str::<serde_json::Value>(&module.code)
            .map_err(|err| DualpackError::compile(module.path.clone(), err.to_string()))?;

        Ok(ModuleRecord {
            id: module.id.clone(),
            path: module.path.clone(),
            module_type: ModuleType::Json,
            code: format!("module.exports = {};", module.code.trim_end()),
            source_map: None,
            is_esm: false,
            records: Vec::new(),
            exports: Vec::new(),
            uses: Vec::new(),
            reexports: Vec::new(),
            star_reexports: Vec::new(),
            edits: Vec::new(),
        })
    }
}

#[derive(Default)]
struct Collector {
    records: Vec<ImportRecord>,
    edits: Vec<Edit>,
    exports: Vec<ExportBinding>,
    uses: Vec<NameUse>,
    reexports: Vec<ReExport>,
    star_reexports: Vec<usize>,
    reexport_count: usize,
    /// Namespace binding per import declaration, keyed by span start.
    import_bindings: HashMap<u32, String>,
    /// Imported local name to the live access expression.
    import_locals: HashMap<String, String>,
    import_refs: HashMap<ReferenceId, String>,
}

impl Collector {
    fn record(&mut self, specifier: &str, kind: ImportKind) -> usize {
        if let Some(index) = self
            .records
            .iter()
            .position(|r| r.specifier == specifier && r.kind == kind)
        {
            return index;
        }
        self.records.push(ImportRecord {
            specifier: specifier.to_string(),
            kind,
        });
        self.records.len() - 1
    }

    fn use_name(&mut self, record: usize, name: UsedName) {
        self.uses.push(NameUse { record, name });
    }

    fn export(&mut self, exported: impl Into<String>, expr: impl Into<String>) {
        self.exports.push(ExportBinding {
            exported: exported.into(),
            expr: expr.into(),
        });
    }

    fn next_reexport_binding(&mut self) -> String {
        let name = format!("__dp_re{}", self.reexport_count);
        self.reexport_count += 1;
        name
    }

    /// Plans edits for an import/export statement. Returns false for any
    /// other statement.
    fn module_declaration(&mut self, stmt: &Statement<'_>) -> bool {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                self.import_declaration(decl);
                true
            }
            Statement::ExportNamedDeclaration(decl) => {
                self.export_named(decl);
                true
            }
            Statement::ExportDefaultDeclaration(decl) => {
                self.export_default(decl);
                true
            }
            Statement::ExportAllDeclaration(decl) => {
                self.export_all(decl);
                true
            }
            _ => false,
        }
    }

    /// Names the namespace binding of every import declaration and maps
    /// each resolved reference of an imported local to a property read on it.
    fn bind_imports(&mut self, body: &[Statement<'_>], scoping: &Scoping) {
        for stmt in body {
            let Statement::ImportDeclaration(decl) = stmt else {
                continue;
            };
            let Some(specifiers) = decl.specifiers.as_ref().filter(|s| !s.is_empty()) else {
                continue;
            };

            let namespace = specifiers.iter().find_map(|specifier| match specifier {
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(ns) => {
                    Some(ns.local.name.to_string())
                }
                _ => None,
            });
            let binding =
                namespace.unwrap_or_else(|| format!("__dp_i{}", self.import_bindings.len()));

            for specifier in specifiers {
                let (imported, local) = match specifier {
                    ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                        (module_export_name(&spec.imported), &spec.local)
                    }
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                        ("default".to_string(), &spec.local)
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => continue,
                };
                let access = format!("{}[{}]", binding, quote(&imported));
                if let Some(symbol) = local.symbol_id.get() {
                    for &reference in scoping.get_resolved_reference_ids(symbol) {
                        self.import_refs.insert(reference, access.clone());
                    }
                }
                self.import_locals.insert(local.name.to_string(), access);
            }

            self.import_bindings.insert(decl.span.start, binding);
        }
    }

    fn import_access(&self, ident: &IdentifierReference<'_>) -> Option<String> {
        ident
            .reference_id
            .get()
            .and_then(|reference| self.import_refs.get(&reference))
            .cloned()
    }

    fn import_declaration(&mut self, decl: &ImportDeclaration<'_>) {
        let record = self.record(decl.source.value.as_str(), ImportKind::Static);

        for specifier in decl.specifiers.iter().flatten() {
            let name = match specifier {
                ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                    UsedName::Named(module_export_name(&spec.imported))
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(_) => {
                    UsedName::Named("default".to_string())
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => UsedName::All,
            };
            self.use_name(record, name);
        }

        let pieces = match self.import_bindings.get(&decl.span.start) {
            Some(binding) => vec![
                Piece::Text(format!("const {} = ", binding)),
                Piece::Interop(record),
                Piece::Text(";".to_string()),
            ],
            // Side-effect import
            None => vec![Piece::Require(record), Piece::Text(";".to_string())],
        };

        self.edits.push(Edit::replace(decl.span, pieces));
    }

    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) {
        if let Some(declaration) = &decl.declaration {
            for name in declared_names(declaration) {
                self.export(name.clone(), name);
            }
            self.edits
                .push(Edit::text(decl.span.start, declaration.span().start, ""));
            return;
        }

        match &decl.source {
            Some(source) => {
                let record = self.record(source.value.as_str(), ImportKind::Static);
                let binding = self.next_reexport_binding();
                for spec in &decl.specifiers {
                    let imported = module_export_name(&spec.local);
                    let exported = module_export_name(&spec.exported);
                    self.export(exported.clone(), format!("{}[{}]", binding, quote(&imported)));
                    self.reexports.push(ReExport {
                        record,
                        imported: UsedName::Named(imported),
                        exported,
                    });
                }
                self.edits.push(Edit::replace(
                    decl.span,
                    vec![
                        Piece::Text(format!("const {} = ", binding)),
                        Piece::Interop(record),
                        Piece::Text(";".to_string()),
                    ],
                ));
            }
            None => {
                for spec in &decl.specifiers {
                    let local = module_export_name(&spec.local);
                    let expr = self.import_locals.get(&local).cloned().unwrap_or(local);
                    self.export(module_export_name(&spec.exported), expr);
                }
                self.edits.push(Edit::replace(decl.span, vec![]));
            }
        }
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) {
        let inner = decl.declaration.span();
        let named = match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                func.id.as_ref().map(|id| id.name.to_string())
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                class.id.as_ref().map(|id| id.name.to_string())
            }
            ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                self.edits.push(Edit::replace(decl.span, vec![]));
                return;
            }
            _ => None,
        };

        match named {
            Some(name) => {
                self.edits.push(Edit::text(decl.span.start, inner.start, ""));
                self.export("default", name);
            }
            None => {
                let prefix = format!("const {} = ", DEFAULT_EXPORT_BINDING);
                self.edits.push(Edit::text(decl.span.start, inner.start, &prefix));
                // Expression statements keep their own semicolon.
                if matches!(
                    decl.declaration,
                    ExportDefaultDeclarationKind::FunctionDeclaration(_)
                        | ExportDefaultDeclarationKind::ClassDeclaration(_)
                ) {
                    self.edits.push(Edit::text(inner.end, inner.end, ";"));
                }
                self.export("default", DEFAULT_EXPORT_BINDING);
            }
        }
    }

    fn export_all(&mut self, decl: &ExportAllDeclaration<'_>) {
        let record = self.record(decl.source.value.as_str(), ImportKind::Static);

        match &decl.exported {
            Some(exported) => {
                let exported = module_export_name(exported);
                let binding = self.next_reexport_binding();
                self.export(exported.clone(), binding.clone());
                self.reexports.push(ReExport {
                    record,
                    imported: UsedName::All,
                    exported,
                });
                self.edits.push(Edit::replace(
                    decl.span,
                    vec![
                        Piece::Text(format!("const {} = ", binding)),
                        Piece::Interop(record),
                        Piece::Text(";".to_string()),
                    ],
                ));
            }
            None => {
                self.star_reexports.push(record);
                self.edits.push(Edit::replace(
                    decl.span,
                    vec![
                        Piece::Text("__exportStar(exports, ".to_string()),
                        Piece::Interop(record),
                        Piece::Text(");".to_string()),
                    ],
                ));
            }
        }
    }
}

impl<'a> Visit<'a> for Collector {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if let Some(access) = self.import_access(it) {
            self.edits.push(Edit::text(it.span.start, it.span.end, &access));
        }
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(value) = &it.value {
                if let Some(access) = self.import_access(value) {
                    let text = format!("{}: {}", value.name, access);
                    self.edits.push(Edit::text(it.span.start, it.span.end, &text));
                    return;
                }
            }
        }
        walk::walk_object_property(self, it);
    }

    // Specifier lists are handled by `export_named`.
    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &it.declaration {
            self.visit_declaration(declaration);
        }
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &it.source {
            let record = self.record(literal.value.as_str(), ImportKind::Dynamic);
            self.use_name(record, UsedName::All);
            self.edits
                .push(Edit::replace(it.span, vec![Piece::Dynamic(record)]));
            return;
        }
        walk::walk_import_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            if callee.name.as_str() == "require" && it.arguments.len() == 1 {
                if let Some(Argument::StringLiteral(literal)) = it.arguments.first() {
                    let record = self.record(literal.value.as_str(), ImportKind::Require);
                    self.use_name(record, UsedName::All);
                    self.edits
                        .push(Edit::replace(it.span, vec![Piece::Require(record)]));
                    return;
                }
            }
            // Imported functions are called without the namespace as `this`.
            if let Some(access) = self.import_access(callee) {
                let text = format!("(0, {})", access);
                self.edits.push(Edit::text(callee.span.start, callee.span.end, &text));
                for argument in &it.arguments {
                    self.visit_argument(argument);
                }
                return;
            }
        }
        walk::walk_call_expression(self, it);
    }
}

fn module_export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(literal) => literal.value.to_string(),
    }
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|declarator| declarator.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(func) => {
            func.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|id| id.name.to_string()).collect()
        }
        _ => Vec::new(),
    }
}

/// JS string literal for a property key or module id.
pub fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}
