//! Literal-attribute collapsing.
//!
//! An attribute block whose value holds no code collapses into a single
//! literal markup span. Codegen then emits one write for the whole
//! attribute instead of a buffered attribute scope, smaller output on the
//! common path.

use super::Rewriter;
use crate::syntax::{
    AcceptedCharacters, Block, BlockGenerator, Span, SpanBuilder, SpanGenerator, SpanKind,
    SyntaxNode, SyntaxTree,
};

pub struct LiteralAttributeCollapser;

impl Rewriter for LiteralAttributeCollapser {
    fn rewrite(&self, tree: SyntaxTree) -> SyntaxTree {
        SyntaxTree::new(rewrite_block(tree.root))
    }
}

fn rewrite_block(block: Block) -> Block {
    let mut out = Vec::with_capacity(block.children.len());
    for child in block.children {
        match child {
            SyntaxNode::Block(inner) => {
                let inner = rewrite_block(inner);
                if is_literal_attribute(&inner) {
                    out.push(SyntaxNode::Span(collapse(inner)));
                } else {
                    out.push(SyntaxNode::Block(inner));
                }
            }
            span => out.push(span),
        }
    }
    Block::new(block.kind, block.generator, out)
}

/// An attribute block with no dynamic value fragments
fn is_literal_attribute(block: &Block) -> bool {
    matches!(block.generator, BlockGenerator::Attribute { .. })
        && block.children.iter().all(|c| matches!(c, SyntaxNode::Span(_)))
}

/// Merge every symbol of the block into one plain markup span
fn collapse(block: Block) -> Span {
    let mut builder = SpanBuilder::new(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    for child in block.children {
        if let SyntaxNode::Span(span) = child {
            for symbol in span.symbols {
                builder.accept(symbol);
            }
        }
    }
    builder.build()
}
