//! Markup-mode parser.
//!
//! Owns the document: scans literal markup, structures tags and attributes,
//! and hands control to the code parser at every transition. Attribute
//! values always build an attribute block; the literal-collapsing rewriter
//! folds the all-literal ones back into plain markup afterwards.

use super::code;
use super::context::{ActiveParser, Cancelled, ParserContext};
use super::keywords::CodeKeyword;
use crate::error::{ErrorKind, ParseError};
use crate::html;
use crate::symbols::{Symbol, SymbolKind};
use crate::syntax::{
    AcceptedCharacters, Block, BlockGenerator, BlockKind, SpanGenerator, SpanKind,
};

/// What terminates a markup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkupScope {
    /// End of input
    Document,
    /// Unmatched `}` (left unconsumed for the caller)
    Section,
    /// End of line (the newline is consumed and owned by markup)
    SingleLine,
}

/// Parse a whole document into the root markup block
pub fn parse_document(ctx: &mut ParserContext) -> Result<Block, Cancelled> {
    ctx.set_active(ActiveParser::Markup);
    ctx.start_block(BlockKind::Markup, BlockGenerator::None);
    ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    parse_markup_run(ctx, MarkupScope::Document)?;
    ctx.complete_span();
    Ok(ctx.end_block().expect("document root"))
}

/// Core markup loop shared by the document body, section bodies, and
/// single-line (`@:`) markup
pub(crate) fn parse_markup_run(ctx: &mut ParserContext, scope: MarkupScope) -> Result<(), Cancelled> {
    let mut brace_depth = 0usize;
    loop {
        ctx.check_cancel()?;
        let Some(sym) = ctx.next_markup() else {
            return Ok(());
        };
        match sym.kind {
            SymbolKind::Transition => handle_transition(ctx, sym)?,
            SymbolKind::OpenAngle => parse_tag(ctx, sym)?,
            SymbolKind::LeftBrace if scope == MarkupScope::Section => {
                brace_depth += 1;
                ctx.accept(sym);
            }
            SymbolKind::RightBrace if scope == MarkupScope::Section => {
                if brace_depth == 0 {
                    ctx.put_back(&sym);
                    return Ok(());
                }
                brace_depth -= 1;
                ctx.accept(sym);
            }
            SymbolKind::NewLine if scope == MarkupScope::SingleLine => {
                ctx.accept(sym);
                return Ok(());
            }
            _ => ctx.accept(sym),
        }
    }
}

/// Dispatch on whatever follows a `@` seen in markup
pub(crate) fn handle_transition(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    ctx.set_active(ActiveParser::Code);
    let result = dispatch_transition(ctx, transition);
    ctx.set_active(ActiveParser::Markup);
    // Whatever the transition produced, markup resumes with default spans
    ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    result
}

fn dispatch_transition(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    let Some(next) = ctx.peek_code() else {
        ctx.error(
            ParseError::new(
                ErrorKind::UnexpectedTransition,
                "unexpected end of file after '@'",
                transition.span(),
            )
            .with_help("Escape a literal '@' by doubling it: '@@'"),
        );
        ctx.accept(transition);
        return Ok(());
    };

    match next.kind {
        // '@@' escapes to a single literal '@': the first transition symbol
        // becomes an unrendered span, the second joins the following markup
        SymbolKind::Transition => {
            ctx.set_span(SpanKind::Transition, SpanGenerator::None, AcceptedCharacters::None);
            ctx.accept(transition);
            ctx.complete_span();
            let second = ctx.next_code().expect("peeked transition");
            ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
            ctx.accept(second);
            Ok(())
        }
        SymbolKind::Star => code::parse_template_comment(ctx, transition),
        SymbolKind::LeftBrace => code::parse_statement_block(ctx, transition),
        SymbolKind::LeftParen => code::parse_explicit_expression(ctx, transition),
        SymbolKind::Keyword => match CodeKeyword::from_str(&next.content) {
            Some(kw) if kw.starts_statement() => code::parse_keyword_block(ctx, transition, kw),
            Some(CodeKeyword::Using) => code::parse_using(ctx, transition),
            Some(kw) if kw.is_reserved() => {
                ctx.error(
                    ParseError::new(
                        ErrorKind::ReservedWord,
                        format!("'{}' is a reserved word and cannot follow '@'", next.content),
                        next.span(),
                    )
                    .with_help("Declarations belong in a '@functions' block"),
                );
                // Recover by rendering the text literally
                ctx.accept(transition);
                Ok(())
            }
            _ => code::parse_implicit_expression(ctx, transition),
        },
        SymbolKind::Identifier => match next.content.as_str() {
            "functions" => code::parse_functions_directive(ctx, transition),
            "section" => code::parse_section_directive(ctx, transition),
            "helper" => code::parse_helper_directive(ctx, transition),
            "inject" | "model" | "page" => code::parse_line_directive(ctx, transition, &next.content),
            _ => code::parse_implicit_expression(ctx, transition),
        },
        _ => {
            ctx.error(
                ParseError::new(
                    ErrorKind::UnexpectedTransition,
                    format!("unexpected '{}' after '@'", next.content.escape_debug()),
                    next.span(),
                )
                .with_help("Escape a literal '@' by doubling it: '@@'"),
            );
            ctx.accept(transition);
            Ok(())
        }
    }
}

/// A `<` was read: structure a tag if one follows, otherwise keep it literal
fn parse_tag(ctx: &mut ParserContext, open: Symbol) -> Result<(), Cancelled> {
    let open_span = open.span();
    let Some(next) = ctx.peek_markup() else {
        ctx.accept(open);
        return Ok(());
    };
    match next.kind {
        // End tag: literal markup through '>'
        SymbolKind::ForwardSlash => {
            ctx.accept(open);
            while let Some(sym) = ctx.next_markup() {
                match sym.kind {
                    SymbolKind::CloseAngle => {
                        ctx.accept(sym);
                        return Ok(());
                    }
                    SymbolKind::OpenAngle | SymbolKind::NewLine => {
                        ctx.put_back(&sym);
                        ctx.error_at(ErrorKind::UnclosedTag, "end tag is never closed", open_span);
                        return Ok(());
                    }
                    _ => ctx.accept(sym),
                }
            }
            ctx.error_at(ErrorKind::UnclosedTag, "end tag is never closed", open_span);
            Ok(())
        }
        SymbolKind::Text if html::is_tag_name_start(&next.content) => {
            ctx.accept(open);
            let name = ctx.next_markup().expect("peeked tag name");
            ctx.accept(name);
            parse_tag_attributes(ctx, &open_span)?;
            Ok(())
        }
        _ => {
            // '<!' doctype/comment or a bare '<': literal markup
            ctx.accept(open);
            Ok(())
        }
    }
}

/// Result of scanning a start tag's attribute area
pub(crate) struct TagClose {
    pub closed: bool,
    pub self_closing: bool,
}

/// Scan from just after a tag name to the closing `>`, structuring any
/// attribute that has a value
pub(crate) fn parse_tag_attributes(
    ctx: &mut ParserContext,
    open_span: &crate::source::SourceSpan,
) -> Result<TagClose, Cancelled> {
    let mut saw_slash = false;
    loop {
        ctx.check_cancel()?;
        let Some(sym) = ctx.next_markup() else {
            ctx.error_at(ErrorKind::UnclosedTag, "tag is never closed", open_span.clone());
            return Ok(TagClose { closed: false, self_closing: false });
        };
        match sym.kind {
            SymbolKind::CloseAngle => {
                ctx.accept(sym);
                return Ok(TagClose { closed: true, self_closing: saw_slash });
            }
            SymbolKind::ForwardSlash => {
                saw_slash = matches!(ctx.peek_markup(), Some(s) if s.kind == SymbolKind::CloseAngle);
                ctx.accept(sym);
            }
            SymbolKind::WhiteSpace | SymbolKind::NewLine => {
                let mut spacing = vec![sym];
                while matches!(ctx.peek_markup(), Some(s) if s.is_spacing()) {
                    spacing.push(ctx.next_markup().expect("peeked spacing"));
                }
                match ctx.peek_markup() {
                    Some(s) if s.kind == SymbolKind::Text => {
                        parse_attribute(ctx, spacing)?;
                    }
                    Some(_) => ctx.accept_all(spacing),
                    None => {
                        ctx.accept_all(spacing);
                        ctx.error_at(ErrorKind::UnclosedTag, "tag is never closed", open_span.clone());
                        return Ok(TagClose { closed: false, self_closing: false });
                    }
                }
            }
            SymbolKind::Transition => {
                handle_transition(ctx, sym)?;
            }
            SymbolKind::OpenAngle => {
                // A new tag opened before this one closed
                ctx.put_back(&sym);
                ctx.error_at(ErrorKind::UnclosedTag, "tag is never closed", open_span.clone());
                return Ok(TagClose { closed: false, self_closing: false });
            }
            _ => ctx.accept(sym),
        }
    }
}

/// Parse one attribute. `spacing` is the whitespace read before its name.
/// Boolean attributes stay literal; valued attributes build an attribute
/// block with literal and dynamic value fragments.
fn parse_attribute(ctx: &mut ParserContext, spacing: Vec<Symbol>) -> Result<(), Cancelled> {
    let name = ctx.next_markup().expect("attribute name");
    let Some(eq) = ctx.peek_markup() else {
        ctx.accept_all(spacing);
        ctx.accept(name);
        return Ok(());
    };
    if eq.kind != SymbolKind::Equals {
        // Boolean attribute
        ctx.accept_all(spacing);
        ctx.accept(name);
        return Ok(());
    }
    let equals = ctx.next_markup().expect("peeked equals");

    let quote = match ctx.peek_markup() {
        Some(s) if matches!(s.kind, SymbolKind::DoubleQuote | SymbolKind::SingleQuote) => {
            Some(ctx.next_markup().expect("peeked quote"))
        }
        _ => None,
    };

    let spacing_text: String = spacing.iter().map(|s| s.content.as_str()).collect();
    let prefix = format!(
        "{}{}{}{}",
        spacing_text,
        name.content,
        equals.content,
        quote.as_ref().map(|q| q.content.as_str()).unwrap_or("")
    );
    let suffix = quote.as_ref().map(|q| q.content.clone()).unwrap_or_default();

    ctx.complete_span();
    ctx.start_block(
        BlockKind::Markup,
        BlockGenerator::Attribute { name: name.content.clone(), prefix, suffix },
    );

    // Prefix span: everything through the opening quote, not itself rendered
    // (the attribute generator owns the text)
    ctx.set_span(SpanKind::Markup, SpanGenerator::None, AcceptedCharacters::None);
    ctx.accept_all(spacing);
    ctx.accept(name);
    ctx.accept(equals);
    let quote_kind = quote.as_ref().map(|q| q.kind);
    if let Some(q) = quote {
        ctx.accept(q);
    }
    ctx.complete_span();

    parse_attribute_value(ctx, quote_kind)?;

    ctx.complete_span();
    ctx.end_block();
    ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    Ok(())
}

/// Scan attribute value fragments up to the closing quote (or, unquoted, the
/// first spacing/tag-end symbol)
fn parse_attribute_value(
    ctx: &mut ParserContext,
    quote_kind: Option<SymbolKind>,
) -> Result<(), Cancelled> {
    let mut pending: Vec<Symbol> = Vec::new();
    let mut run: Vec<Symbol> = Vec::new();

    fn flush(ctx: &mut ParserContext, pending: &mut Vec<Symbol>, run: &mut Vec<Symbol>) {
        if pending.is_empty() && run.is_empty() {
            return;
        }
        let prefix: String = pending.iter().map(|s| s.content.as_str()).collect();
        let value: String = run.iter().map(|s| s.content.as_str()).collect();
        ctx.set_span(
            SpanKind::Markup,
            SpanGenerator::LiteralAttributeValue { prefix, value },
            AcceptedCharacters::Any,
        );
        ctx.accept_all(std::mem::take(pending));
        ctx.accept_all(std::mem::take(run));
        ctx.complete_span();
    }

    loop {
        ctx.check_cancel()?;
        let Some(sym) = ctx.next_markup() else {
            flush(ctx, &mut pending, &mut run);
            ctx.error_at(ErrorKind::UnclosedTag, "attribute value is never closed", ctx.here());
            return Ok(());
        };

        // Closing quote ends the value
        if quote_kind == Some(sym.kind) {
            flush(ctx, &mut pending, &mut run);
            ctx.set_span(SpanKind::Markup, SpanGenerator::None, AcceptedCharacters::None);
            ctx.accept(sym);
            ctx.complete_span();
            return Ok(());
        }

        match sym.kind {
            SymbolKind::WhiteSpace | SymbolKind::NewLine => {
                if quote_kind.is_none() {
                    // Unquoted values end at the first whitespace
                    flush(ctx, &mut pending, &mut run);
                    ctx.put_back(&sym);
                    return Ok(());
                }
                if !run.is_empty() {
                    flush(ctx, &mut pending, &mut run);
                }
                pending.push(sym);
            }
            SymbolKind::CloseAngle | SymbolKind::ForwardSlash if quote_kind.is_none() => {
                flush(ctx, &mut pending, &mut run);
                ctx.put_back(&sym);
                return Ok(());
            }
            SymbolKind::Transition => {
                if matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::Transition) {
                    // '@@' inside an attribute value: unrendered first half,
                    // the second '@' continues the literal run
                    flush(ctx, &mut pending, &mut run);
                    ctx.set_span(SpanKind::Transition, SpanGenerator::None, AcceptedCharacters::None);
                    ctx.accept(sym);
                    ctx.complete_span();
                    run.push(ctx.next_code().expect("peeked transition"));
                } else {
                    if !run.is_empty() {
                        flush(ctx, &mut pending, &mut run);
                    }
                    let prefix: String = pending.iter().map(|s| s.content.as_str()).collect();
                    ctx.start_block(BlockKind::Markup, BlockGenerator::DynamicAttributeValue { prefix });
                    if !pending.is_empty() {
                        ctx.set_span(SpanKind::Markup, SpanGenerator::None, AcceptedCharacters::None);
                        ctx.accept_all(std::mem::take(&mut pending));
                        ctx.complete_span();
                    }
                    handle_transition(ctx, sym)?;
                    ctx.complete_span();
                    ctx.end_block();
                }
            }
            _ => run.push(sym),
        }
    }
}

/// Parse one complete element from inside a code block (`<p>...</p>`), with
/// nesting, or a `<text>` pseudo-tag block. The cursor sits on `<`.
/// `leading` is spacing the markup owns (design-time mode hands it over).
pub(crate) fn parse_element_block(ctx: &mut ParserContext, leading: Vec<Symbol>) -> Result<(), Cancelled> {
    if is_text_tag_ahead(ctx) {
        debug_assert!(leading.is_empty(), "code keeps spacing before <text>");
        return parse_text_block(ctx);
    }

    ctx.set_active(ActiveParser::Markup);
    ctx.start_block(BlockKind::Markup, BlockGenerator::None);
    ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    ctx.accept_all(leading);

    let mut stack: Vec<String> = Vec::new();
    let root_span = ctx.here();

    loop {
        ctx.check_cancel()?;
        let Some(sym) = ctx.next_markup() else {
            ctx.error(
                ParseError::new(
                    ErrorKind::UnclosedTag,
                    "element is never closed",
                    ctx.here(),
                )
                .with_related(root_span.clone())
                .with_related_label("element opened here"),
            );
            break;
        };
        match sym.kind {
            SymbolKind::OpenAngle => {
                let next = ctx.peek_markup();
                match next {
                    Some(s) if s.kind == SymbolKind::ForwardSlash => {
                        // End tag
                        ctx.accept(sym);
                        let slash = ctx.next_markup().expect("peeked slash");
                        ctx.accept(slash);
                        let mut closed_name = String::new();
                        while let Some(part) = ctx.next_markup() {
                            match part.kind {
                                SymbolKind::CloseAngle => {
                                    ctx.accept(part);
                                    break;
                                }
                                _ => {
                                    if part.kind == SymbolKind::Text {
                                        closed_name = part.content.clone();
                                    }
                                    ctx.accept(part);
                                }
                            }
                        }
                        if let Some(pos) = stack.iter().rposition(|n| n.eq_ignore_ascii_case(&closed_name)) {
                            stack.truncate(pos);
                        } else {
                            stack.pop();
                        }
                        if stack.is_empty() {
                            break;
                        }
                    }
                    Some(s) if s.kind == SymbolKind::Text && html::is_tag_name_start(&s.content) => {
                        ctx.accept(sym);
                        let name = ctx.next_markup().expect("peeked tag name");
                        let tag_name = name.content.clone();
                        let open_span = name.span();
                        ctx.accept(name);
                        let close = parse_tag_attributes(ctx, &open_span)?;
                        if close.closed && !close.self_closing && !html::is_void_element(&tag_name) {
                            stack.push(tag_name);
                        } else if stack.is_empty() {
                            // A lone self-closing/void/broken element is the
                            // whole block
                            break;
                        }
                    }
                    _ => ctx.accept(sym),
                }
            }
            SymbolKind::Transition => handle_transition(ctx, sym)?,
            SymbolKind::NewLine if stack.is_empty() => {
                // Never part of the element; give it back to the code parser
                ctx.put_back(&sym);
                break;
            }
            _ => ctx.accept(sym),
        }
    }

    ctx.complete_span();
    ctx.end_block();
    ctx.set_active(ActiveParser::Code);
    Ok(())
}

/// `<text>...</text>`: the tags are structure only, the contents render
pub(crate) fn parse_text_block(ctx: &mut ParserContext) -> Result<(), Cancelled> {
    ctx.set_active(ActiveParser::Markup);
    ctx.start_block(BlockKind::Markup, BlockGenerator::None);

    // '<text>' is three symbols, not rendered
    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    let open = ctx.next_markup().expect("open angle");
    let open_span = open.span();
    ctx.accept(open);
    let name = ctx.next_markup().expect("text tag name");
    ctx.accept(name);
    match ctx.next_markup() {
        Some(s) if s.kind == SymbolKind::CloseAngle => ctx.accept(s),
        Some(s) => {
            // '<text' without '>': malformed; recover as literal
            ctx.put_back(&s);
        }
        None => {}
    }
    ctx.complete_span();

    ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    let mut depth = 0usize;
    loop {
        ctx.check_cancel()?;
        let Some(sym) = ctx.next_markup() else {
            ctx.error(
                ParseError::new(ErrorKind::UnclosedTag, "'<text>' is never closed", ctx.here())
                    .with_related(open_span.clone())
                    .with_related_label("opened here"),
            );
            break;
        };
        match sym.kind {
            SymbolKind::OpenAngle => {
                if let Some((is_close, is_text)) = peek_text_tag(ctx) {
                    if is_text && is_close {
                        if depth == 0 {
                            // '</text>' closes the block: consume as metacode and finish
                            ctx.complete_span();
                            ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
                            ctx.accept(sym);
                            for _ in 0..3 {
                                if let Some(part) = ctx.next_markup() {
                                    let done = part.kind == SymbolKind::CloseAngle;
                                    ctx.accept(part);
                                    if done {
                                        break;
                                    }
                                }
                            }
                            ctx.complete_span();
                            break;
                        }
                        depth -= 1;
                        ctx.accept(sym);
                    } else {
                        if is_text {
                            depth += 1;
                        }
                        ctx.accept(sym);
                    }
                } else {
                    ctx.accept(sym);
                }
            }
            SymbolKind::Transition => handle_transition(ctx, sym)?,
            _ => ctx.accept(sym),
        }
    }

    ctx.complete_span();
    ctx.end_block();
    ctx.set_active(ActiveParser::Code);
    Ok(())
}

/// Whether the cursor sits on `<text` (word boundary after the name)
pub(crate) fn is_text_tag_ahead(ctx: &mut ParserContext) -> bool {
    let saved = ctx.location();
    let mut result = false;
    if let Some(open) = ctx.next_markup() {
        if open.kind == SymbolKind::OpenAngle {
            if let Some(name) = ctx.next_markup() {
                result = name.kind == SymbolKind::Text && name.content == "text";
            }
        }
    }
    ctx.seek(saved);
    result
}

/// After an already-read `<`: (is_close_tag, is_text_tag), or None if what
/// follows is not tag-shaped
fn peek_text_tag(ctx: &mut ParserContext) -> Option<(bool, bool)> {
    let saved = ctx.location();
    let mut first = ctx.next_markup()?;
    let is_close = first.kind == SymbolKind::ForwardSlash;
    if is_close {
        match ctx.next_markup() {
            Some(sym) => first = sym,
            None => {
                ctx.seek(saved);
                return None;
            }
        }
    }
    let result = if first.kind == SymbolKind::Text {
        Some((is_close, first.content == "text"))
    } else {
        None
    };
    ctx.seek(saved);
    result
}
