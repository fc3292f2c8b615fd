//! Post-parse tree rewriters.
//!
//! Each rewriter consumes a syntax tree and produces a new one; the input is
//! never mutated in place. They run in a fixed order, every document getting
//! the full chain.

mod attributes;
mod whitespace;

pub use attributes::LiteralAttributeCollapser;
pub use whitespace::WhitespaceRelocator;

use crate::syntax::SyntaxTree;

/// A tree-to-tree transformation
pub trait Rewriter {
    fn rewrite(&self, tree: SyntaxTree) -> SyntaxTree;
}

/// The standard rewriter chain, in pass order
pub fn standard_rewriters() -> Vec<Box<dyn Rewriter>> {
    vec![
        Box::new(WhitespaceRelocator),
        Box::new(LiteralAttributeCollapser),
    ]
}

/// Run every rewriter over the tree, in order
pub fn apply_all(rewriters: &[Box<dyn Rewriter>], tree: SyntaxTree) -> SyntaxTree {
    let mut tree = tree;
    for rewriter in rewriters {
        tree = rewriter.rewrite(tree);
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn test_chain_preserves_text() {
        let source = "<div class=\"btn large\" href=\"@Url x\">@Value</div>";
        let outcome = parser::parse(source, None, false, None).unwrap();
        let rewriters = standard_rewriters();
        let tree = apply_all(&rewriters, outcome.tree);
        assert_eq!(tree.text(), source);
    }
}
