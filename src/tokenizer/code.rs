//! Code lexical mode.
//!
//! Lexes the embedded C#-shaped code language: identifiers and keywords,
//! numeric/string/character literals (including verbatim `@"..."` strings),
//! line and block comments, and one-character punctuation. String and
//! comment contents are consumed whole, so delimiter counting in the parser
//! never sees a brace inside a literal.

use super::{is_inline_whitespace, Tokenizer};
use crate::symbols::{Symbol, SymbolKind};

/// Keywords of the embedded code language. Anything else lexes as an
/// identifier; dispatch on specific keywords happens in the parser.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "var",
    "virtual", "void", "volatile", "while",
];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

impl<'a> Tokenizer<'a> {
    /// Produce the next symbol in code mode, or `None` at end of input
    pub fn next_code(&mut self) -> Option<Symbol> {
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
                if self.peek_char_at(1) == Some('"') {
                    self.take_verbatim_string()
                } else {
                    self.advance();
                    SymbolKind::Transition
                }
            }
            '"' => self.take_string_literal(),
            '\'' => self.take_char_literal(),
            '/' => match self.peek_char_at(1) {
                Some('/') => {
                    self.take_while(|c| c != '\n' && c != '\r');
                    SymbolKind::Comment
                }
                Some('*') => self.take_block_comment(),
                _ => {
                    self.advance();
                    SymbolKind::Operator
                }
            },
            c if c.is_ascii_digit() => self.take_number(),
            c if is_identifier_start(c) => {
                self.take_while(is_identifier_part);
                if is_keyword(self.text_from(start.offset)) {
                    SymbolKind::Keyword
                } else {
                    SymbolKind::Identifier
                }
            }
            '{' => self.single(SymbolKind::LeftBrace),
            '}' => self.single(SymbolKind::RightBrace),
            '(' => self.single(SymbolKind::LeftParen),
            ')' => self.single(SymbolKind::RightParen),
            '[' => self.single(SymbolKind::LeftBracket),
            ']' => self.single(SymbolKind::RightBracket),
            ';' => self.single(SymbolKind::Semicolon),
            ':' => self.single(SymbolKind::Colon),
            ',' => self.single(SymbolKind::Comma),
            '.' => self.single(SymbolKind::Dot),
            '?' => self.single(SymbolKind::QuestionMark),
            '*' => self.single(SymbolKind::Star),
            c if c.is_ascii_punctuation() => self.single(SymbolKind::Operator),
            _ => self.single(SymbolKind::Unknown),
        };

        Some(self.symbol(kind, start))
    }

    fn single(&mut self, kind: SymbolKind) -> SymbolKind {
        self.advance();
        kind
    }

    /// `"..."` with backslash escapes; an unterminated literal stops at the
    /// end of the line so recovery resumes on the next one
    fn take_string_literal(&mut self) -> SymbolKind {
        self.advance(); // "
        while let Some(c) = self.peek_char() {
            match c {
                '\\' => {
                    self.advance();
                    if self.peek_char().is_some() {
                        self.advance();
                    }
                }
                '"' => {
                    self.advance();
                    break;
                }
                '\n' | '\r' => break,
                _ => self.advance(),
            }
        }
        SymbolKind::StringLiteral
    }

    /// `@"..."` with `""` as the only escape; may span lines
    fn take_verbatim_string(&mut self) -> SymbolKind {
        self.advance(); // @
        self.advance(); // "
        while let Some(c) = self.peek_char() {
            if c == '"' {
                self.advance();
                if self.peek_char() == Some('"') {
                    self.advance();
                } else {
                    break;
                }
            } else {
                self.advance();
            }
        }
        SymbolKind::StringLiteral
    }

    fn take_char_literal(&mut self) -> SymbolKind {
        self.advance(); // '
        while let Some(c) = self.peek_char() {
            match c {
                '\\' => {
                    self.advance();
                    if self.peek_char().is_some() {
                        self.advance();
                    }
                }
                '\'' => {
                    self.advance();
                    break;
                }
                '\n' | '\r' => break,
                _ => self.advance(),
            }
        }
        SymbolKind::CharacterLiteral
    }

    fn take_block_comment(&mut self) -> SymbolKind {
        self.advance(); // /
        self.advance(); // *
        while let Some(c) = self.peek_char() {
            if c == '*' && self.peek_char_at(1) == Some('/') {
                self.advance();
                self.advance();
                break;
            }
            self.advance();
        }
        SymbolKind::Comment
    }

    fn take_number(&mut self) -> SymbolKind {
        let mut real = false;
        if self.peek_char() == Some('0') && matches!(self.peek_char_at(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            self.take_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.take_while(|c| c.is_ascii_digit() || c == '_');
            if self.peek_char() == Some('.')
                && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())
            {
                real = true;
                self.advance();
                self.take_while(|c| c.is_ascii_digit() || c == '_');
            }
            if matches!(self.peek_char(), Some('e') | Some('E')) {
                let after = self.peek_char_at(1);
                let after2 = self.peek_char_at(2);
                let exp_digit = |c: Option<char>| c.map_or(false, |c| c.is_ascii_digit());
                if exp_digit(after) || (matches!(after, Some('+') | Some('-')) && exp_digit(after2)) {
                    real = true;
                    self.advance();
                    if matches!(self.peek_char(), Some('+') | Some('-')) {
                        self.advance();
                    }
                    self.take_while(|c| c.is_ascii_digit());
                }
            }
        }
        // Type suffixes: f/d/m force a real literal, l/u stay integral
        if let Some(c) = self.peek_char() {
            if matches!(c, 'f' | 'F' | 'd' | 'D' | 'm' | 'M') {
                real = true;
                self.advance();
            } else if matches!(c, 'l' | 'L' | 'u' | 'U') {
                self.advance();
                if matches!(self.peek_char(), Some('l') | Some('L') | Some('u') | Some('U')) {
                    self.advance();
                }
            }
        }
        if real {
            SymbolKind::RealLiteral
        } else {
            SymbolKind::IntegerLiteral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Symbol> {
        let mut t = Tokenizer::new(source, None);
        let mut out = Vec::new();
        while let Some(sym) = t.next_code() {
            out.push(sym);
        }
        out
    }

    fn kinds(source: &str) -> Vec<SymbolKind> {
        lex(source).into_iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_keywords_vs_identifiers() {
        assert_eq!(
            kinds("if foo"),
            vec![SymbolKind::Keyword, SymbolKind::WhiteSpace, SymbolKind::Identifier]
        );
    }

    #[test]
    fn test_string_with_escape() {
        let syms = lex(r#""a\"b" x"#);
        assert_eq!(syms[0].kind, SymbolKind::StringLiteral);
        assert_eq!(syms[0].content, r#""a\"b""#);
    }

    #[test]
    fn test_verbatim_string() {
        let syms = lex(r#"@"two "" quotes""#);
        assert_eq!(syms[0].kind, SymbolKind::StringLiteral);
        assert_eq!(syms[0].content, r#"@"two "" quotes""#);
    }

    #[test]
    fn test_transition_not_verbatim() {
        let syms = lex("@foo");
        assert_eq!(syms[0].kind, SymbolKind::Transition);
        assert_eq!(syms[1].kind, SymbolKind::Identifier);
    }

    #[test]
    fn test_comments_consumed_whole() {
        let syms = lex("a // b { c\nd /* e\n} */ f");
        let comment_contents: Vec<_> = syms
            .iter()
            .filter(|s| s.kind == SymbolKind::Comment)
            .map(|s| s.content.as_str())
            .collect();
        assert_eq!(comment_contents, vec!["// b { c", "/* e\n} */"]);
    }

    #[test]
    fn test_braces_inside_string_are_content() {
        let syms = lex(r#"{ "}" }"#);
        let braces = syms.iter().filter(|s| s.kind == SymbolKind::RightBrace).count();
        assert_eq!(braces, 1);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("42"), vec![SymbolKind::IntegerLiteral]);
        assert_eq!(kinds("3.25"), vec![SymbolKind::RealLiteral]);
        assert_eq!(kinds("0xFF"), vec![SymbolKind::IntegerLiteral]);
        assert_eq!(kinds("1e10"), vec![SymbolKind::RealLiteral]);
        assert_eq!(kinds("2f"), vec![SymbolKind::RealLiteral]);
    }

    #[test]
    fn test_unterminated_string_stops_at_line_end() {
        let syms = lex("\"abc\nx");
        assert_eq!(syms[0].kind, SymbolKind::StringLiteral);
        assert_eq!(syms[0].content, "\"abc");
        assert_eq!(syms[1].kind, SymbolKind::NewLine);
    }
}
