//! Markup lexical mode.
//!
//! Fine-grained symbols: tag delimiters, attribute punctuation, and the
//! transition character each stand alone; everything else coalesces into
//! text runs. Braces are their own symbols so section bodies can track
//! nesting without re-splitting text.

use super::{is_inline_whitespace, Tokenizer};
use crate::symbols::{Symbol, SymbolKind};

/// Characters that terminate a text run
fn is_markup_stop(ch: char) -> bool {
    matches!(ch, '@' | '<' | '>' | '/' | '=' | '"' | '\'' | '!' | '{' | '}') || ch.is_whitespace()
}

impl<'a> Tokenizer<'a> {
    /// Produce the next symbol in markup mode, or `None` at end of input
    pub fn next_markup(&mut self) -> Option<Symbol> {
        let start = self.location();
        let ch = self.peek_char()?;

        let kind = match ch {
            '\r' | '\n' => {
                self.take_newline();
                SymbolKind::NewLine
            }
            c if is_inline_whitespace(c) => {
                self.take_while(is_inline_whitespace);
                SymbolKind::WhiteSpace
            }
            '@' => {
                self.advance();
                SymbolKind::Transition
            }
            '<' => {
                self.advance();
                SymbolKind::OpenAngle
            }
            '>' => {
                self.advance();
                SymbolKind::CloseAngle
            }
            '/' => {
                self.advance();
                SymbolKind::ForwardSlash
            }
            '=' => {
                self.advance();
                SymbolKind::Equals
            }
            '"' => {
                self.advance();
                SymbolKind::DoubleQuote
            }
            '\'' => {
                self.advance();
                SymbolKind::SingleQuote
            }
            '!' => {
                self.advance();
                SymbolKind::Bang
            }
            '{' => {
                self.advance();
                SymbolKind::LeftBrace
            }
            '}' => {
                self.advance();
                SymbolKind::RightBrace
            }
            _ => {
                self.take_while(|c| !is_markup_stop(c));
                SymbolKind::Text
            }
        };

        Some(self.symbol(kind, start))
    }
}
