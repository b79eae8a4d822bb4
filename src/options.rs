#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};

/// Which trailing scaffolding the assembler emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EmitMode {
    /// Type-check text for the editor and CLI.
    #[default]
    Full,
    /// Declaration-friendly text that a `.d.ts` driver emits from.
    Dts,
    /// Like `Full` but without the reference directive and accessors.
    Lint,
}

/// Attribute case-folding namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    Foreign,
}

impl Namespace {
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "html" => Some(Namespace::Html),
            "svg" | "http://www.w3.org/2000/svg" => Some(Namespace::Svg),
            "foreign" => Some(Namespace::Foreign),
            _ => None,
        }
    }

    pub fn preserves_case(self) -> bool {
        !matches!(self, Namespace::Html)
    }
}

/// Shape of the generated template code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Dialect {
    /// Plain statements: `for` loops and `try` blocks.
    #[default]
    Statements,
    /// Loop and await bodies hoisted into callbacks that re-check their conditions.
    Closures,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformOptions {
    pub filename: Option<String>,
    pub is_ts_file: bool,
    pub mode: EmitMode,
    pub namespace: Namespace,
    pub accessors: bool,
    pub allow_any_attributes: bool,
    pub strict: bool,
    pub dialect: Dialect,
    pub emit_source_map: bool,
}

impl TransformOptions {
    pub fn file_label(&self) -> &str {
        self.filename.as_deref().unwrap_or("Input.svelte")
    }
}

/// Plain-object shape of [`TransformOptions`] for the Node binding.
#[cfg(feature = "napi")]
#[napi(object)]
#[derive(Debug, Clone, Default)]
pub struct NativeTransformOptions {
    pub filename: Option<String>,
    pub is_ts_file: Option<bool>,
    pub mode: Option<String>,
    pub namespace: Option<String>,
    pub accessors: Option<bool>,
    pub allow_any_attributes: Option<bool>,
    pub strict: Option<bool>,
    pub dialect: Option<String>,
    pub emit_source_map: Option<bool>,
}

#[cfg(feature = "napi")]
impl From<NativeTransformOptions> for TransformOptions {
    fn from(native: NativeTransformOptions) -> Self {
        TransformOptions {
            filename: native.filename,
            is_ts_file: native.is_ts_file.unwrap_or(false),
            mode: match native.mode.as_deref() {
                Some("dts") => EmitMode::Dts,
                Some("lint") => EmitMode::Lint,
                _ => EmitMode::Full,
            },
            namespace: native
                .namespace
                .as_deref()
                .and_then(Namespace::from_attribute)
                .unwrap_or_default(),
            accessors: native.accessors.unwrap_or(false),
            allow_any_attributes: native.allow_any_attributes.unwrap_or(false),
            strict: native.strict.unwrap_or(false),
            dialect: match native.dialect.as_deref() {
                Some("closures") => Dialect::Closures,
                _ => Dialect::Statements,
            },
            emit_source_map: native.emit_source_map.unwrap_or(false),
        }
    }
}
