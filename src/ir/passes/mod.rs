//! Ordered IR passes.
//!
//! A fixed sequence over the lowered document: classification, tag helper
//! binding, member injection, then instrumentation (run-time only). No pass
//! is skipped or reordered, and every document gets a fresh pipeline; the
//! only state shared across documents is the read-only descriptor set.

mod classify;
mod inject;
mod instrument;
mod tag_helper;

pub use classify::DocumentClassifier;
pub use inject::InjectionPass;
pub use instrument::InstrumentationPass;
pub use tag_helper::TagHelperPass;

use super::IrDocument;
use crate::codegen::GenerateOptions;
use crate::descriptor::TagHelperDescriptor;

/// One transformation over the lowered document.
///
/// Passes must be idempotent for nodes they do not touch and preserve child
/// ordering except where their own contract reorders.
pub trait IrPass {
    fn run(&self, doc: &mut IrDocument);
}

/// The standard pass pipeline, in order
pub fn standard_passes(
    descriptors: &[TagHelperDescriptor],
    options: &GenerateOptions,
) -> Vec<Box<dyn IrPass>> {
    let mut passes: Vec<Box<dyn IrPass>> = vec![
        Box::new(DocumentClassifier),
        Box::new(TagHelperPass::new(descriptors.to_vec())),
        Box::new(InjectionPass),
    ];
    if !options.design_time {
        passes.push(Box::new(InstrumentationPass));
    }
    passes
}
