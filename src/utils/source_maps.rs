//! Bundle-level source maps.
//!
//! Sources are written as template-rewritten paths and never embed file
//! contents.

use crate::utils::{DualpackError, Result};
use sourcemap::{SourceMap, SourceMapBuilder};

pub struct SourceMapBundler {
    builder: SourceMapBuilder,
}

impl SourceMapBundler {
    pub fn new(file: &str) -> Self {
        Self {
            builder: SourceMapBuilder::new(Some(file)),
        }
    }

    /// Append one module whose first body line sits at `line_offset`.
    ///
    /// With a compiler map its tokens are shifted into place; without one
    /// every line maps to the same line of the original file.
    pub fn append_module(
        &mut self,
        compiled_map: Option<&str>,
        source_name: &str,
        line_offset: u32,
        line_count: u32,
    ) -> Result<()> {
        match compiled_map {
            Some(json) => {
                let map = parse(json)?;
                for token in map.tokens() {
                    if !token.has_source() {
                        continue;
                    }
                    self.builder.add(
                        token.get_dst_line() + line_offset,
                        token.get_dst_col(),
                        token.get_src_line(),
                        token.get_src_col(),
                        Some(source_name),
                        token.get_name(),
                        false,
                    );
                }
            }
            None => {
                for line in 0..line_count {
                    self.builder
                        .add(line_offset + line, 0, line, 0, Some(source_name), None, false);
                }
            }
        }
        Ok(())
    }

    pub fn into_json(self) -> Result<String> {
        to_json(&self.builder.into_sourcemap())
    }
}

/// Chain `minified -> bundle` with `bundle -> original`.
pub fn compose(minified_map: &str, bundle_map: &str, file: &str) -> Result<String> {
    let minified = parse(minified_map)?;
    let bundle = parse(bundle_map)?;
    let mut builder = SourceMapBuilder::new(Some(file));

    for token in minified.tokens() {
        let Some(original) = bundle.lookup_token(token.get_src_line(), token.get_src_col()) else {
            continue;
        };
        if !original.has_source() {
            continue;
        }
        builder.add(
            token.get_dst_line(),
            token.get_dst_col(),
            original.get_src_line(),
            original.get_src_col(),
            original.get_source(),
            original.get_name().or(token.get_name()),
            false,
        );
    }

    to_json(&builder.into_sourcemap())
}

pub fn append_source_mapping_url(code: &mut String, map_file: &str) {
    if !code.ends_with('\n') {
        code.push('\n');
    }
    code.push_str("//# sourceMappingURL=");
    code.push_str(map_file);
    code.push('\n');
}

fn parse(json: &str) -> Result<SourceMap> {
    SourceMap::from_slice(json.as_bytes())
        .map_err(|err| DualpackError::defect(format!("invalid source map: {}", err)))
}

fn to_json(map: &SourceMap) -> Result<String> {
    let mut out = Vec::new();
    map.to_writer(&mut out)
        .map_err(|err| DualpackError::defect(format!("cannot serialize source map: {}", err)))?;
    String::from_utf8(out).map_err(|err| DualpackError::defect(err.to_string()))
}
