//! Shared parser state.
//!
//! Exactly one `ParserContext` exists per parse. The markup and code parsers
//! cooperate by passing it back and forth; "suspending" one parser is just
//! returning from its function. The context owns the tokenizer cursor, the
//! span under construction, the block builder stack, and the error sink.

use crate::error::{ErrorKind, ParseError};
use crate::source::{SourceLocation, SourceSpan};
use crate::symbols::{Symbol, SymbolKind};
use crate::syntax::{
    AcceptedCharacters, Block, BlockBuilder, BlockGenerator, BlockKind, SpanBuilder, SpanGenerator,
    SpanKind,
};
use crate::tokenizer::Tokenizer;
use crate::CancellationToken;

/// The parse was cancelled; unwind and produce nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Which parser currently drives the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveParser {
    Markup,
    Code,
}

pub struct ParserContext<'a> {
    tokens: Tokenizer<'a>,
    pub design_time: bool,
    pub errors: Vec<ParseError>,
    active: ActiveParser,
    cancel: Option<CancellationToken>,
    span: SpanBuilder,
    stack: Vec<BlockBuilder>,
}

impl<'a> ParserContext<'a> {
    pub fn new(
        source: &'a str,
        file: Option<String>,
        design_time: bool,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            tokens: Tokenizer::new(source, file),
            design_time,
            errors: Vec::new(),
            active: ActiveParser::Markup,
            cancel,
            span: SpanBuilder::new(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any),
            stack: Vec::new(),
        }
    }

    // === Cursor ===

    pub fn next_markup(&mut self) -> Option<Symbol> {
        self.tokens.next_markup()
    }

    pub fn next_code(&mut self) -> Option<Symbol> {
        self.tokens.next_code()
    }

    pub fn peek_markup(&mut self) -> Option<Symbol> {
        let saved = self.tokens.location();
        let sym = self.tokens.next_markup();
        self.tokens.seek(saved);
        sym
    }

    pub fn peek_code(&mut self) -> Option<Symbol> {
        let saved = self.tokens.location();
        let sym = self.tokens.next_code();
        self.tokens.seek(saved);
        sym
    }

    /// Peek the nth code symbol ahead (0 = next)
    pub fn peek_code_nth(&mut self, n: usize) -> Option<Symbol> {
        let saved = self.tokens.location();
        let mut sym = None;
        for _ in 0..=n {
            sym = self.tokens.next_code();
            if sym.is_none() {
                break;
            }
        }
        self.tokens.seek(saved);
        sym
    }

    /// Return a symbol to the input; the next read re-lexes from its start,
    /// in whichever mode the reader asks for
    pub fn put_back(&mut self, sym: &Symbol) {
        self.tokens.seek(sym.start.clone());
    }

    pub fn location(&self) -> SourceLocation {
        self.tokens.location()
    }

    pub fn seek(&mut self, location: SourceLocation) {
        self.tokens.seek(location);
    }

    pub fn at_eof(&self) -> bool {
        self.tokens.at_eof()
    }

    /// Consume the raw text of a template comment body (neither lexical
    /// grammar applies inside `@* ... *@`)
    pub fn next_template_comment_content(&mut self) -> Option<Symbol> {
        let start = self.tokens.location();
        if self.tokens.at_eof() {
            return None;
        }
        loop {
            if self.tokens.at_eof() {
                break;
            }
            if self.tokens.peek_char() == Some('*') && self.tokens.peek_char_at(1) == Some('@') {
                break;
            }
            self.tokens.advance();
        }
        if self.tokens.location().offset == start.offset {
            return None;
        }
        Some(self.tokens.symbol(SymbolKind::Text, start))
    }

    pub fn set_active(&mut self, active: ActiveParser) {
        self.active = active;
    }

    pub fn active(&self) -> ActiveParser {
        self.active
    }

    // === Span building ===

    /// Configure the span under construction. A non-empty builder whose
    /// configuration differs is completed first; identical configuration
    /// keeps accumulating into the same span.
    pub fn set_span(&mut self, kind: SpanKind, generator: SpanGenerator, accepted: AcceptedCharacters) {
        if !self.span.is_empty()
            && (self.span.kind != kind || self.span.generator != generator || self.span.accepted != accepted)
        {
            self.complete_span();
        }
        self.span.kind = kind;
        self.span.generator = generator;
        self.span.accepted = accepted;
    }

    /// Replace the pending span's generator (used once its content is known)
    pub fn set_span_generator(&mut self, generator: SpanGenerator) {
        self.span.generator = generator;
    }

    pub fn accept(&mut self, symbol: Symbol) {
        self.span.accept(symbol);
    }

    pub fn accept_all(&mut self, symbols: Vec<Symbol>) {
        for symbol in symbols {
            self.span.accept(symbol);
        }
    }

    pub fn span_is_empty(&self) -> bool {
        self.span.is_empty()
    }

    pub fn span_symbols(&self) -> &[Symbol] {
        self.span.symbols()
    }

    /// Whether the pending span sits at the start of a line (ignoring
    /// trailing whitespace), the precondition for code taking ownership of
    /// that whitespace in run-time mode
    pub fn span_at_line_start(&self) -> bool {
        self.span.at_line_start_modulo_whitespace()
    }

    pub fn take_trailing_whitespace(&mut self) -> Vec<Symbol> {
        self.span.take_trailing_whitespace()
    }

    /// Freeze the pending span into the current block; empty builders
    /// produce nothing
    pub fn complete_span(&mut self) {
        if self.span.is_empty() {
            return;
        }
        let kind = self.span.kind;
        let generator = self.span.generator.clone();
        let accepted = self.span.accepted;
        let finished = std::mem::replace(&mut self.span, SpanBuilder::new(kind, generator, accepted));
        let span = finished.build();
        let block = self
            .stack
            .last_mut()
            .expect("no open block to receive completed span");
        block.push_span(span);
    }

    // === Block building ===

    pub fn start_block(&mut self, kind: BlockKind, generator: BlockGenerator) {
        self.stack.push(BlockBuilder::new(kind, generator));
    }

    /// Close the innermost block. Returns the finished block when it was the
    /// root; otherwise it is attached to its parent.
    pub fn end_block(&mut self) -> Option<Block> {
        assert!(
            self.span.is_empty(),
            "complete_span must run before end_block"
        );
        let builder = self.stack.pop().expect("end_block without start_block");
        let block = builder.build();
        match self.stack.last_mut() {
            Some(parent) => {
                parent.push_block(block);
                None
            }
            None => Some(block),
        }
    }

    pub fn block_depth(&self) -> usize {
        self.stack.len()
    }

    /// Patch the innermost open block's generator (for blocks whose
    /// generator data is only known after some children are parsed)
    pub fn set_block_generator(&mut self, generator: BlockGenerator) -> bool {
        match self.stack.last_mut() {
            Some(top) => {
                top.generator = generator;
                true
            }
            None => false,
        }
    }

    // === Errors & cancellation ===

    pub fn error(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn error_at(&mut self, kind: ErrorKind, message: impl Into<String>, span: SourceSpan) {
        self.errors.push(ParseError::new(kind, message, span));
    }

    /// Cooperative cancellation check, called between top-level units
    pub fn check_cancel(&self) -> Result<(), Cancelled> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Cancelled),
            _ => Ok(()),
        }
    }

    /// Span pointing at the current location (for EOF diagnostics)
    pub fn here(&self) -> SourceSpan {
        SourceSpan::new(self.tokens.location(), 1)
    }
}
