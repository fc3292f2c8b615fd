//! Document classification.
//!
//! Reads the top-level directives and picks the document kind; later passes
//! and the generator query the result. Also records the declared model type.

use super::IrPass;
use crate::ir::{DocumentKind, IrDocument};

pub struct DocumentClassifier;

impl IrPass for DocumentClassifier {
    fn run(&self, doc: &mut IrDocument) {
        let directives: Vec<(String, Vec<String>)> = doc
            .directives()
            .into_iter()
            .map(|(name, tokens)| {
                (name.to_string(), tokens.into_iter().map(String::from).collect())
            })
            .collect();

        for (name, tokens) in directives {
            match name.as_str() {
                "page" => doc.kind = DocumentKind::Page,
                "model" => {
                    if doc.model.is_none() {
                        doc.model = tokens.first().cloned();
                    }
                }
                _ => {}
            }
        }
    }
}
