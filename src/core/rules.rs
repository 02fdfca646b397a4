use crate::core::interfaces::SourceCompiler;
use crate::core::models::{CompiledModule, CompilerOptions, SourceFile};
use crate::utils::{DualpackError, Result};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// File pattern plus the compiler invocation applied to matching files.
#[derive(Clone)]
pub struct TransformRule {
    pub test: Regex,
    pub exclude: Option<Regex>,
    pub compiler: Arc<dyn SourceCompiler>,
    pub options: CompilerOptions,
}

impl TransformRule {
    pub fn new(test: &str, compiler: Arc<dyn SourceCompiler>, options: CompilerOptions) -> Result<Self> {
        Ok(Self {
            test: Regex::new(test)?,
            exclude: None,
            compiler,
            options,
        })
    }

    pub fn with_exclude(mut self, exclude: &str) -> Result<Self> {
        self.exclude = Some(Regex::new(exclude)?);
        Ok(self)
    }

    pub fn matches(&self, file: &SourceFile) -> bool {
        let path = file.normalized_path();
        if !self.test.is_match(&path) {
            return false;
        }
        !self.exclude.as_ref().is_some_and(|re| re.is_match(&path))
    }
}

impl fmt::Debug for TransformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRule")
            .field("test", &self.test.as_str())
            .field("exclude", &self.exclude.as_ref().map(|re| re.as_str()))
            .field("compiler", &self.compiler.name())
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Debug)]
pub enum RuleMatch<'a> {
    Rule(&'a TransformRule),
    PassThrough,
}

/// Rules shared read-only by every build job.
#[derive(Debug, Clone, Default)]
pub struct TransformRuleSet {
    rules: Vec<TransformRule>,
}

impl TransformRuleSet {
    /// Every rule must compile to the same language level, since the
    /// minifier runs once per bundle at that level.
    pub fn new(rules: Vec<TransformRule>) -> Result<Self> {
        if let Some(first) = rules.first() {
            if let Some(other) = rules
                .iter()
                .find(|rule| rule.options.target != first.options.target)
            {
                return Err(DualpackError::config(format!(
                    "transform rules /{}/ and /{}/ target different levels ({} and {})",
                    first.test.as_str(),
                    other.test.as_str(),
                    first.options.target,
                    other.options.target
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[TransformRule] {
        &self.rules
    }

    /// Language level shared by the rules; minification keeps output at it.
    /// An empty rule set uses the default level.
    pub fn target_level(&self) -> String {
        self.rules
            .first()
            .map(|rule| rule.options.target.clone())
            .unwrap_or_else(|| CompilerOptions::default().target)
    }

    /// The single rule matching `file`. Two matches mean the patterns
    /// overlap, which is a configuration error.
    pub fn select(&self, file: &SourceFile) -> Result<RuleMatch<'_>> {
        let mut matching = self.rules.iter().filter(|rule| rule.matches(file));
        let first = match matching.next() {
            Some(rule) => rule,
            None => return Ok(RuleMatch::PassThrough),
        };
        if let Some(second) = matching.next() {
            return Err(DualpackError::config(format!(
                "{} matches overlapping transform rules /{}/ and /{}/",
                file.path.display(),
                first.test.as_str(),
                second.test.as_str()
            )));
        }
        Ok(RuleMatch::Rule(first))
    }

    /// Compile `source` with the matching rule, or return it untouched.
    pub fn apply(&self, file: &SourceFile, source: &str) -> Result<CompiledModule> {
        match self.select(file)? {
            RuleMatch::Rule(rule) => rule.compiler.compile(file, source, &rule.options),
            RuleMatch::PassThrough => Ok(CompiledModule {
                code: source.to_string(),
                source_map: None,
            }),
        }
    }
}
