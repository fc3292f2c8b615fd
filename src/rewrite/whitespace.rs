//! Whitespace relocation.
//!
//! A leading whitespace-only span inside an expression block moves out into
//! the surrounding markup, so the generated markup keeps its natural line
//! breaks instead of feeding them through the expression path.

use super::Rewriter;
use crate::syntax::{Block, BlockKind, SpanGenerator, SyntaxNode, SyntaxTree};

pub struct WhitespaceRelocator;

impl Rewriter for WhitespaceRelocator {
    fn rewrite(&self, tree: SyntaxTree) -> SyntaxTree {
        SyntaxTree::new(rewrite_block(tree.root))
    }
}

fn rewrite_block(block: Block) -> Block {
    let mut out = Vec::with_capacity(block.children.len());
    for child in block.children {
        match child {
            SyntaxNode::Block(inner) => {
                let mut inner = rewrite_block(inner);
                if inner.kind == BlockKind::Expression {
                    if let Some(span) = take_leading_whitespace(&mut inner) {
                        out.push(SyntaxNode::Span(span));
                    }
                }
                out.push(SyntaxNode::Block(inner));
            }
            span => out.push(span),
        }
    }
    Block::new(block.kind, block.generator, out)
}

fn take_leading_whitespace(block: &mut Block) -> Option<crate::syntax::Span> {
    let leading = match block.children.first() {
        Some(SyntaxNode::Span(span)) if span.is_all_whitespace() => true,
        _ => false,
    };
    if !leading {
        return None;
    }
    match block.children.remove(0) {
        SyntaxNode::Span(mut span) => {
            span.generator = SpanGenerator::Markup;
            Some(span)
        }
        SyntaxNode::Block(_) => unreachable!("checked span above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceLocation;
    use crate::symbols::{Symbol, SymbolKind};
    use crate::syntax::{
        AcceptedCharacters, BlockGenerator, SpanBuilder, SpanKind,
    };

    fn span(kind: SpanKind, generator: SpanGenerator, text: &str, at: &SourceLocation) -> crate::syntax::Span {
        let mut b = SpanBuilder::new(kind, generator, AcceptedCharacters::Any);
        let sym_kind = if text.trim().is_empty() { SymbolKind::WhiteSpace } else { SymbolKind::Text };
        b.accept(Symbol::new(sym_kind, text, at.clone()));
        b.build()
    }

    #[test]
    fn test_moves_leading_whitespace_out_of_expression() {
        let at = SourceLocation::zero();
        let ws = span(SpanKind::Code, SpanGenerator::Expression, "  ", &at);
        let code = span(SpanKind::Code, SpanGenerator::Expression, "Name", &at.advance("  "));
        let expr = Block::new(
            BlockKind::Expression,
            BlockGenerator::Expression,
            vec![SyntaxNode::Span(ws), SyntaxNode::Span(code)],
        );
        let root = Block::new(BlockKind::Markup, BlockGenerator::None, vec![SyntaxNode::Block(expr)]);

        let rewritten = WhitespaceRelocator.rewrite(SyntaxTree::new(root));
        let children = &rewritten.root.children;
        assert_eq!(children.len(), 2);
        let moved = children[0].as_span().expect("moved whitespace span");
        assert!(moved.is_all_whitespace());
        assert_eq!(moved.generator, SpanGenerator::Markup);
        let expr = children[1].as_block().expect("expression block");
        assert_eq!(expr.content(), "Name");
        // Text order is unchanged
        assert_eq!(rewritten.text(), "  Name");
    }

    #[test]
    fn test_leaves_other_blocks_alone() {
        let at = SourceLocation::zero();
        let code = span(SpanKind::Code, SpanGenerator::Statement, "x();", &at);
        let stmt = Block::new(BlockKind::Statement, BlockGenerator::None, vec![SyntaxNode::Span(code)]);
        let root = Block::new(BlockKind::Markup, BlockGenerator::None, vec![SyntaxNode::Block(stmt)]);
        let rewritten = WhitespaceRelocator.rewrite(SyntaxTree::new(root));
        assert_eq!(rewritten.root.children.len(), 1);
    }
}
