//! Code generation.
//!
//! Walks the final IR depth-first and emits C# source text plus a source
//! map. Literal markup batches into chunked `WriteLiteral` calls;
//! expressions and statements are padded so their first significant
//! character lands on the source column, and wrapped in `#line` pragmas
//! when debug-line emission is on.

mod csharp;
mod tag_helper;
pub(crate) mod writer;

pub use csharp::CSharpGenerator;
pub use writer::Mapping;

use crate::CancellationToken;

/// Options for one compilation
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Namespace of the generated class
    pub namespace: String,
    /// Name of the generated class
    pub class_name: String,
    /// Base type; the `@model` type is appended as a generic argument
    pub base_type: String,
    /// Design-time mode: IDE-facing whitespace ownership, no instrumentation
    pub design_time: bool,
    /// Emit `#line` pragmas and source padding
    pub emit_line_pragmas: bool,
    /// Emit a `#pragma checksum` directive for the source file
    pub include_checksum: bool,
    /// Logical source path, used in diagnostics and pragmas
    pub file_path: Option<String>,
    /// Cooperative cancellation, checked between top-level units
    pub cancel: Option<CancellationToken>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            namespace: "Quill.Output".to_string(),
            class_name: "Template".to_string(),
            base_type: "Quill.Runtime.TemplateBase".to_string(),
            design_time: false,
            emit_line_pragmas: true,
            include_checksum: false,
            file_path: None,
            cancel: None,
        }
    }
}

/// Generation result: target text plus the source map
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub code: String,
    pub mappings: Vec<Mapping>,
}
