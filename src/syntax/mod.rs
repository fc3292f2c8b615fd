//! Immutable syntax tree: leaf spans of symbols under composite blocks.
//!
//! Nodes are assembled through builders and frozen on completion; every
//! later phase that changes the tree produces a new one. Blocks own their
//! children exclusively; no node appears in two trees. Sequential (leaf
//! chain) access goes through [`SyntaxTree::leaf_spans`], which yields every
//! span in document order without needing parent or sibling pointers.

mod generator;
mod kinds;

pub use generator::{BlockGenerator, SpanGenerator};
pub use kinds::{AcceptedCharacters, BlockKind, SpanKind};

use crate::source::{SourceLocation, SourceSpan};
use crate::symbols::Symbol;

/// Leaf syntax node: an ordered run of symbols with a lowering strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub kind: SpanKind,
    pub symbols: Vec<Symbol>,
    pub accepted: AcceptedCharacters,
    pub generator: SpanGenerator,
    start: SourceLocation,
}

impl Span {
    pub fn start(&self) -> &SourceLocation {
        &self.start
    }

    /// Original source text of this span
    pub fn content(&self) -> String {
        self.symbols.iter().map(|s| s.content.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.iter().map(Symbol::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn source_span(&self) -> SourceSpan {
        SourceSpan::new(self.start.clone(), self.len())
    }

    /// Whitespace and newlines only (and not empty)
    pub fn is_all_whitespace(&self) -> bool {
        !self.symbols.is_empty() && self.symbols.iter().all(Symbol::is_spacing)
    }
}

/// Composite syntax node
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub generator: BlockGenerator,
    pub children: Vec<SyntaxNode>,
}

impl Block {
    pub fn new(kind: BlockKind, generator: BlockGenerator, children: Vec<SyntaxNode>) -> Self {
        Self { kind, generator, children }
    }

    /// First leaf location, if the block has any content
    pub fn start(&self) -> Option<&SourceLocation> {
        self.leaf_spans().first().map(|s| s.start())
    }

    /// Original source text of the whole block
    pub fn content(&self) -> String {
        self.leaf_spans().iter().map(|s| s.content()).collect()
    }

    pub fn len(&self) -> usize {
        self.leaf_spans().iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every leaf span under this block, in document order
    pub fn leaf_spans(&self) -> Vec<&Span> {
        let mut spans = Vec::new();
        collect_spans(self, &mut spans);
        spans
    }
}

fn collect_spans<'a>(block: &'a Block, out: &mut Vec<&'a Span>) {
    for child in &block.children {
        match child {
            SyntaxNode::Span(span) => out.push(span),
            SyntaxNode::Block(inner) => collect_spans(inner, out),
        }
    }
}

/// Either node shape
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNode {
    Span(Span),
    Block(Block),
}

impl SyntaxNode {
    pub fn as_span(&self) -> Option<&Span> {
        match self {
            SyntaxNode::Span(span) => Some(span),
            SyntaxNode::Block(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            SyntaxNode::Block(block) => Some(block),
            SyntaxNode::Span(_) => None,
        }
    }
}

/// Accumulates symbols for the span under construction
#[derive(Debug)]
pub struct SpanBuilder {
    pub kind: SpanKind,
    pub accepted: AcceptedCharacters,
    pub generator: SpanGenerator,
    symbols: Vec<Symbol>,
    start: Option<SourceLocation>,
}

impl SpanBuilder {
    pub fn new(kind: SpanKind, generator: SpanGenerator, accepted: AcceptedCharacters) -> Self {
        Self { kind, accepted, generator, symbols: Vec::new(), start: None }
    }

    pub fn accept(&mut self, symbol: Symbol) {
        if self.start.is_none() {
            self.start = Some(symbol.start.clone());
        }
        self.symbols.push(symbol);
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Remove and return the trailing whitespace run (used when ownership
    /// moves to the following code block)
    pub fn take_trailing_whitespace(&mut self) -> Vec<Symbol> {
        let mut tail = Vec::new();
        while matches!(self.symbols.last(), Some(s) if s.kind == crate::symbols::SymbolKind::WhiteSpace) {
            tail.push(self.symbols.pop().unwrap());
        }
        tail.reverse();
        if self.symbols.is_empty() {
            self.start = None;
        }
        tail
    }

    /// Whether everything since the last newline (or the span start) is whitespace
    pub fn at_line_start_modulo_whitespace(&self) -> bool {
        for symbol in self.symbols.iter().rev() {
            match symbol.kind {
                crate::symbols::SymbolKind::WhiteSpace => continue,
                crate::symbols::SymbolKind::NewLine => return true,
                _ => return false,
            }
        }
        true
    }

    /// Freeze into a span. The builder must have accepted at least one symbol.
    pub fn build(self) -> Span {
        let start = self
            .start
            .expect("cannot build an empty span; check is_empty() first");
        Span {
            kind: self.kind,
            symbols: self.symbols,
            accepted: self.accepted,
            generator: self.generator,
            start,
        }
    }
}

/// Accumulates children for the block under construction
#[derive(Debug)]
pub struct BlockBuilder {
    pub kind: BlockKind,
    pub generator: BlockGenerator,
    pub children: Vec<SyntaxNode>,
}

impl BlockBuilder {
    pub fn new(kind: BlockKind, generator: BlockGenerator) -> Self {
        Self { kind, generator, children: Vec::new() }
    }

    pub fn push_span(&mut self, span: Span) {
        self.children.push(SyntaxNode::Span(span));
    }

    pub fn push_block(&mut self, block: Block) {
        self.children.push(SyntaxNode::Block(block));
    }

    pub fn build(self) -> Block {
        Block::new(self.kind, self.generator, self.children)
    }
}

/// A completed parse: the root block plus flat access to its leaves
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub root: Block,
}

impl SyntaxTree {
    pub fn new(root: Block) -> Self {
        Self { root }
    }

    /// Leaf chain in document order
    pub fn leaf_spans(&self) -> Vec<&Span> {
        self.root.leaf_spans()
    }

    /// Reconstructed source text; equals the original input exactly
    pub fn text(&self) -> String {
        self.root.content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Symbol, SymbolKind};

    fn markup_span(text: &str, at: SourceLocation) -> Span {
        let mut builder = SpanBuilder::new(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
        builder.accept(Symbol::new(SymbolKind::Text, text, at));
        builder.build()
    }

    #[test]
    fn test_leaf_chain_is_document_order() {
        let a = markup_span("a", SourceLocation::zero());
        let b = markup_span("b", SourceLocation::zero().advance("a"));
        let c = markup_span("c", SourceLocation::zero().advance("ab"));

        let inner = Block::new(BlockKind::Expression, BlockGenerator::Expression, vec![SyntaxNode::Span(b)]);
        let root = Block::new(
            BlockKind::Markup,
            BlockGenerator::None,
            vec![
                SyntaxNode::Span(a),
                SyntaxNode::Block(inner),
                SyntaxNode::Span(c),
            ],
        );

        let tree = SyntaxTree::new(root);
        let contents: Vec<String> = tree.leaf_spans().iter().map(|s| s.content()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert_eq!(tree.text(), "abc");
    }

    #[test]
    fn test_take_trailing_whitespace() {
        let mut builder = SpanBuilder::new(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
        builder.accept(Symbol::new(SymbolKind::Text, "x", SourceLocation::zero()));
        builder.accept(Symbol::new(SymbolKind::NewLine, "\n", SourceLocation::zero().advance("x")));
        builder.accept(Symbol::new(SymbolKind::WhiteSpace, "  ", SourceLocation::zero().advance("x\n")));
        assert!(builder.at_line_start_modulo_whitespace());
        let tail = builder.take_trailing_whitespace();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].content, "  ");
        let span = builder.build();
        assert_eq!(span.content(), "x\n");
    }

    #[test]
    fn test_all_whitespace_span() {
        let mut builder = SpanBuilder::new(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
        builder.accept(Symbol::new(SymbolKind::WhiteSpace, "  ", SourceLocation::zero()));
        let span = builder.build();
        assert!(span.is_all_whitespace());
    }
}
