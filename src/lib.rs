//! # svelte2tsx-native
//!
//! Turns a Svelte component into TypeScript that a type checker can consume, plus
//! a map from generated positions back to the component source.
//!
//! ## Pipeline
//!
//! 1. **Extract**: `<script>`/`<style>` bodies are located and blanked so the
//!    markup parser never sees foreign syntax.
//! 2. **Parse**: the blanked markup becomes a [`ast::Root`]. An external parser's
//!    JSON in the legacy Svelte AST shape can be used instead.
//! 3. **Scripts**: the instance script is rewritten in place (`export` removal,
//!    `$:` statements, `$store` references) and its surface recorded.
//! 4. **Template**: one post-order walk rewrites every node into statements with a
//!    single `transform` per node. Scopes, if-chain conditions and aliases are
//!    tracked along the way.
//! 5. **Assemble**: everything is wrapped into `render()`, whose return type the
//!    default export is derived from.
//!
//! All edits go through one [`buffer::RewriteBuffer`], so the output keeps an exact
//! mapping to the original offsets of every copied character.

#[cfg(feature = "napi")]
use napi_derive::napi;

use rayon::prelude::*;
use tracing::debug_span;

pub mod ast;
pub mod buffer;
mod codegen;
mod component;
mod condition;
mod dialect;
pub mod exports;
mod expression;
mod extract;
mod options;
mod parse;
mod scope;
mod script;
mod sourcemap;
mod stores;
mod transform;
mod validate;
mod visitor;

#[cfg(test)]
mod buffer_tests;
#[cfg(test)]
mod component_tests;
#[cfg(test)]
mod expression_tests;
#[cfg(test)]
mod parse_tests;
#[cfg(test)]
mod transform_tests;

pub use codegen::{component_name, TransformOutput};
pub use extract::{extract_verbatim, Extracted, RegionKind, VerbatimRegion};
pub use options::{Dialect, EmitMode, Namespace, TransformOptions};
pub use parse::{parse_component, parse_template};
pub use sourcemap::to_source_map;
pub use validate::*;

#[cfg(feature = "napi")]
pub use options::NativeTransformOptions;

/// Transpile a component from its source text.
pub fn svelte2tsx(source: &str, options: &TransformOptions) -> Result<TransformOutput> {
    let span = debug_span!("svelte2tsx", file = options.file_label());
    let _guard = span.enter();
    let root = parse_component(source, options.file_label())?;
    codegen::assemble(source, &root, options)
}

/// Transpile with a tree produced by an external markup parser. Script and style
/// regions missing from `root` are located in `source`.
pub fn svelte2tsx_with_ast(
    source: &str,
    mut root: ast::Root,
    options: &TransformOptions,
) -> Result<TransformOutput> {
    let span = debug_span!("svelte2tsx", file = options.file_label(), external_ast = true);
    let _guard = span.enter();
    if root.instance.is_none() && root.module.is_none() && root.css.is_none() {
        let extracted = extract_verbatim(source);
        extract::attach_regions(&mut root, &extracted.regions, source, options.file_label())?;
    }
    codegen::assemble(source, &root, options)
}

/// Independent transpilations on the rayon pool, results in input order.
pub fn transform_batch(inputs: &[(String, TransformOptions)]) -> Vec<Result<TransformOutput>> {
    inputs
        .par_iter()
        .map(|(source, options)| svelte2tsx(source, options))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn svelte2tsx_native(
    source: String,
    options: Option<NativeTransformOptions>,
) -> napi::Result<serde_json::Value> {
    let options: TransformOptions = options.map(Into::into).unwrap_or_default();
    let output = svelte2tsx(&source, &options).map_err(|e| match e {
        TransformError::Strict(positioned) => napi::Error::from_reason(
            serde_json::to_string(&positioned).unwrap_or_else(|_| positioned.message.clone()),
        ),
        other => napi::Error::from_reason(other.to_string()),
    })?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}
