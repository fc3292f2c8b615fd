//! Quill template compiler.
//!
//! Compiles mixed markup/code `.quill` documents into C# source text plus a
//! source map. The pipeline: a mode-switching tokenizer feeds a cooperating
//! markup/code parser pair building an immutable syntax tree; rewriters
//! reshape the tree; lowering produces an IR that a fixed pass sequence
//! refines (classification, tag helper binding, injection,
//! instrumentation); the code generator walks the IR and emits text with
//! line pragmas and mappings back to the source.
//!
//! Parsing never aborts: malformed input yields a best-effort result plus
//! an ordered diagnostic list. Only cancellation produces no output.

pub mod codegen;
pub mod descriptor;
pub mod error;
mod html;
pub mod ir;
pub mod parser;
pub mod rewrite;
pub mod source;
pub mod symbols;
pub mod syntax;
mod tokenizer;

pub use codegen::{CSharpGenerator, GenerateOptions, GenerateResult, Mapping};
pub use descriptor::{
    BoundAttributeDescriptor, ContentBehavior, TagHelperDescriptor, TagMatchingRule,
};
pub use error::{CompileError, ErrorKind, ParseError};
pub use parser::{parse, ParseOutcome};

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal, checked between top-level units.
/// A cancelled compilation yields no output, not a partial one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A finished compilation: generated text, source map, and every diagnostic
/// collected along the way. Errors are data, not failures: output is still
/// produced for malformed input.
#[derive(Debug, Clone, Serialize)]
pub struct CompileResult {
    pub code: String,
    pub mappings: Vec<Mapping>,
    pub errors: Vec<ParseError>,
}

impl CompileResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A configured compiler: read-only descriptor set and the standard
/// rewriter/pass chain. One pipeline may compile many documents; each
/// compilation gets fresh mutable state, so independent pipelines can run
/// concurrently.
pub struct Pipeline {
    descriptors: Vec<TagHelperDescriptor>,
}

impl Pipeline {
    /// The standard pipeline with no tag helper descriptors
    pub fn standard() -> Self {
        Self { descriptors: Vec::new() }
    }

    /// Supply the descriptor set from the external discovery collaborator
    pub fn with_descriptors(mut self, descriptors: Vec<TagHelperDescriptor>) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn descriptors(&self) -> &[TagHelperDescriptor] {
        &self.descriptors
    }

    /// Compile one document. Returns `Err` only for cancellation; malformed
    /// input compiles to best-effort output with diagnostics attached.
    pub fn compile(&self, source: &str, options: &GenerateOptions) -> Result<CompileResult, CompileError> {
        let outcome = parser::parse(
            source,
            options.file_path.clone(),
            options.design_time,
            options.cancel.clone(),
        )
        .map_err(|_| CompileError::Cancelled)?;

        let rewriters = rewrite::standard_rewriters();
        let tree = rewrite::apply_all(&rewriters, outcome.tree);

        let mut doc = ir::lower(&tree, options);
        for pass in ir::passes::standard_passes(&self.descriptors, options) {
            pass.run(&mut doc);
        }

        let checksum = if options.include_checksum {
            Some(source::checksum_hex(&source::checksum(source.as_bytes())))
        } else {
            None
        };
        let generated = CSharpGenerator::new().generate(&doc, checksum, options);

        let mut errors = outcome.errors;
        errors.extend(doc.diagnostics);
        Ok(CompileResult { code: generated.code, mappings: generated.mappings, errors })
    }
}

/// Compile with default options (run-time mode, default class naming)
pub fn compile(source: &str) -> Result<CompileResult, CompileError> {
    Pipeline::standard().compile(source, &GenerateOptions::default())
}

/// Compile with explicit options
pub fn compile_with(source: &str, options: &GenerateOptions) -> Result<CompileResult, CompileError> {
    Pipeline::standard().compile(source, options)
}
