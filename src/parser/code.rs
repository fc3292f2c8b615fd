//! Code-mode parser.
//!
//! Parses one logical unit per hand-off from the markup parser: a statement
//! block, a control-flow construct, an expression, a directive, or a
//! comment. Construct keywords dispatch through [`CodeKeyword`]; everything
//! else falls through to the plain statement scanner. Delimiter recovery is
//! backtrack-first: a dry-run balance scan, then a fallback scan to a safe
//! terminator (newline or closing brace) with an error recorded.

use super::context::{Cancelled, ParserContext};
use super::keywords::CodeKeyword;
use super::markup;
use crate::error::{ErrorKind, ParseError};
use crate::source::{SourceLocation, SourceSpan};
use crate::symbols::{Symbol, SymbolKind};
use crate::syntax::{AcceptedCharacters, BlockGenerator, BlockKind, SpanGenerator, SpanKind};

// === Whitespace ownership ===

/// In run-time mode a statement-shaped construct takes ownership of the
/// whitespace between the last line break and its `@`; in design-time mode
/// markup keeps it. Expressions never call this.
fn take_owned_whitespace(ctx: &mut ParserContext) -> Vec<Symbol> {
    if ctx.design_time {
        return Vec::new();
    }
    if ctx.span_at_line_start() {
        ctx.take_trailing_whitespace()
    } else {
        Vec::new()
    }
}

/// In run-time mode a completed construct absorbs a trailing
/// whitespace-and-newline run into its final span, so the generated markup
/// keeps no blank line where the construct stood
fn absorb_trailing_newline(ctx: &mut ParserContext) {
    if ctx.design_time {
        return;
    }
    let saved = ctx.location();
    let mut absorbed = Vec::new();
    loop {
        match ctx.next_markup() {
            Some(s) if s.kind == SymbolKind::WhiteSpace => absorbed.push(s),
            Some(s) if s.kind == SymbolKind::NewLine => {
                absorbed.push(s);
                ctx.accept_all(absorbed);
                return;
            }
            _ => {
                ctx.seek(saved);
                return;
            }
        }
    }
}

fn collect_spacing(ctx: &mut ParserContext) -> Vec<Symbol> {
    let mut out = Vec::new();
    while matches!(ctx.peek_code(), Some(s) if s.is_spacing()) {
        out.push(ctx.next_code().expect("peeked spacing"));
    }
    out
}

/// Leading whitespace span of a construct block (moved out of markup);
/// `rendered` controls whether it re-emits as statement text
fn emit_moved_whitespace(ctx: &mut ParserContext, moved: Vec<Symbol>, rendered: bool) {
    if moved.is_empty() {
        return;
    }
    let generator = if rendered { SpanGenerator::Statement } else { SpanGenerator::None };
    ctx.set_span(SpanKind::Code, generator, AcceptedCharacters::Any);
    ctx.accept_all(moved);
    ctx.complete_span();
}

fn accept_transition_span(ctx: &mut ParserContext, transition: Symbol) {
    ctx.set_span(SpanKind::Transition, SpanGenerator::None, AcceptedCharacters::None);
    ctx.accept(transition);
    ctx.complete_span();
}

fn close_brace_accepted(ctx: &ParserContext) -> AcceptedCharacters {
    if ctx.design_time {
        AcceptedCharacters::None
    } else {
        AcceptedCharacters::Any
    }
}

// === Balanced-delimiter scanning ===

/// Dry-run scan for the matching close delimiter, starting just inside the
/// open one. On success the cursor is restored and the location just past
/// the close delimiter returned; on EOF the cursor is restored and `None`
/// returned (backtrack-on-failure).
fn scan_balanced(
    ctx: &mut ParserContext,
    open: SymbolKind,
    close: SymbolKind,
) -> Option<SourceLocation> {
    let start = ctx.location();
    let mut depth = 1usize;
    loop {
        let Some(sym) = ctx.next_code() else {
            ctx.seek(start);
            return None;
        };
        if sym.kind == open {
            depth += 1;
        } else if sym.kind == close {
            depth -= 1;
            if depth == 0 {
                let end = ctx.location();
                ctx.seek(start);
                return Some(end);
            }
        }
    }
}

/// Accept code symbols up to `end` (`end` is the
/// first unconsumed offset)
fn accept_until(ctx: &mut ParserContext, end: &SourceLocation) {
    while ctx.location().offset < end.offset {
        let sym = ctx.next_code().expect("symbols up to scanned end");
        ctx.accept(sym);
    }
}

/// Fallback recovery: accept symbols up to (not including) a newline or
/// closing brace
fn scan_to_safe_terminator(ctx: &mut ParserContext) {
    while let Some(sym) = ctx.peek_code() {
        match sym.kind {
            SymbolKind::NewLine | SymbolKind::RightBrace => return,
            _ => {
                let sym = ctx.next_code().expect("peeked symbol");
                ctx.accept(sym);
            }
        }
    }
}

// === Statement blocks ===

/// `@{ ... }`
pub(crate) fn parse_statement_block(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    let moved = take_owned_whitespace(ctx);
    ctx.complete_span();
    ctx.start_block(BlockKind::Statement, BlockGenerator::None);
    emit_moved_whitespace(ctx, moved, true);
    accept_transition_span(ctx, transition);

    let lb = ctx.next_code().expect("peeked left brace");
    let open_span = lb.span();
    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    ctx.accept(lb);
    ctx.complete_span();

    ctx.set_span(SpanKind::Code, SpanGenerator::Statement, AcceptedCharacters::Any);
    let closed = parse_statements_until_close(ctx, &open_span)?;
    ctx.complete_span();

    if closed {
        let rb = ctx.next_code().expect("right brace");
        ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, close_brace_accepted(ctx));
        ctx.accept(rb);
        absorb_trailing_newline(ctx);
        ctx.complete_span();
    }
    ctx.end_block();
    Ok(())
}

/// Scan statements until the `}` matching the enclosing open brace, leaving
/// it unconsumed. Returns false when the input ends first (error recorded,
/// partial content kept).
fn parse_statements_until_close(ctx: &mut ParserContext, open_span: &SourceSpan) -> Result<bool, Cancelled> {
    let mut depth = 0usize;
    let mut at_stmt_start = true;
    let mut pending: Vec<Symbol> = Vec::new();

    loop {
        ctx.check_cancel()?;
        let Some(sym) = ctx.next_code() else {
            ctx.accept_all(std::mem::take(&mut pending));
            let here = ctx.here();
            ctx.error(
                ParseError::new(
                    ErrorKind::UnexpectedEndOfFile,
                    "expected end of block before end of file",
                    here,
                )
                .with_related(open_span.clone())
                .with_related_label("block opened here")
                .with_help("Close the block with '}'"),
            );
            return Ok(false);
        };

        if sym.is_spacing() {
            pending.push(sym);
            continue;
        }

        match sym.kind {
            SymbolKind::RightBrace if depth == 0 => {
                ctx.accept_all(std::mem::take(&mut pending));
                ctx.put_back(&sym);
                return Ok(true);
            }
            SymbolKind::RightBrace => {
                ctx.accept_all(std::mem::take(&mut pending));
                depth -= 1;
                ctx.accept(sym);
                at_stmt_start = true;
            }
            SymbolKind::LeftBrace => {
                ctx.accept_all(std::mem::take(&mut pending));
                depth += 1;
                ctx.accept(sym);
                at_stmt_start = true;
            }
            SymbolKind::Semicolon => {
                ctx.accept_all(std::mem::take(&mut pending));
                ctx.accept(sym);
                at_stmt_start = true;
            }
            SymbolKind::Operator if sym.content == "<" && at_stmt_start => {
                ctx.put_back(&sym);
                enter_markup(ctx, std::mem::take(&mut pending))?;
                at_stmt_start = true;
            }
            SymbolKind::Transition => match ctx.peek_code() {
                Some(next) if next.kind == SymbolKind::Colon => {
                    parse_single_line_markup(ctx, sym, std::mem::take(&mut pending))?;
                    at_stmt_start = true;
                }
                Some(next) if next.kind == SymbolKind::Star => {
                    ctx.accept_all(std::mem::take(&mut pending));
                    ctx.complete_span();
                    parse_template_comment(ctx, sym)?;
                    ctx.set_span(SpanKind::Code, SpanGenerator::Statement, AcceptedCharacters::Any);
                }
                Some(next) if next.kind == SymbolKind::Operator && next.content == "<" => {
                    ctx.accept_all(std::mem::take(&mut pending));
                    parse_template(ctx, sym)?;
                    ctx.set_span(SpanKind::Code, SpanGenerator::Statement, AcceptedCharacters::Any);
                }
                _ => {
                    ctx.accept_all(std::mem::take(&mut pending));
                    ctx.error(
                        ParseError::new(
                            ErrorKind::UnexpectedTransition,
                            "'@' is not needed here; you are already in code",
                            sym.span(),
                        )
                        .with_help("Write the expression directly, without '@'"),
                    );
                    ctx.accept(sym);
                    at_stmt_start = false;
                }
            },
            SymbolKind::Keyword if at_stmt_start => {
                ctx.accept_all(std::mem::take(&mut pending));
                match CodeKeyword::from_str(&sym.content) {
                    Some(kw)
                        if kw.starts_statement()
                            || matches!(kw, CodeKeyword::Using | CodeKeyword::Case | CodeKeyword::Default) =>
                    {
                        parse_keyword_construct(ctx, kw, sym)?;
                        at_stmt_start = true;
                    }
                    _ => {
                        ctx.accept(sym);
                        at_stmt_start = false;
                    }
                }
            }
            _ => {
                ctx.accept_all(std::mem::take(&mut pending));
                ctx.accept(sym);
                at_stmt_start = false;
            }
        }
    }
}

/// Markup encountered at a statement boundary. Ownership of the spacing read
/// so far follows the mode rule, except before `<text>`, where code keeps
/// it regardless.
fn enter_markup(ctx: &mut ParserContext, pending: Vec<Symbol>) -> Result<(), Cancelled> {
    let text_tag = markup::is_text_tag_ahead(ctx);
    let leading = if ctx.design_time && !text_tag {
        // Markup owns the spacing: it leads the markup block
        ctx.complete_span();
        pending
    } else {
        // Code owns the spacing
        ctx.accept_all(pending);
        ctx.complete_span();
        Vec::new()
    };
    markup::parse_element_block(ctx, leading)?;
    ctx.set_span(SpanKind::Code, SpanGenerator::Statement, AcceptedCharacters::Any);
    Ok(())
}

/// `@:` markup to the end of the line, inside a code block
fn parse_single_line_markup(
    ctx: &mut ParserContext,
    transition: Symbol,
    pending: Vec<Symbol>,
) -> Result<(), Cancelled> {
    ctx.complete_span();
    ctx.start_block(BlockKind::Markup, BlockGenerator::None);
    if !pending.is_empty() {
        ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
        ctx.accept_all(pending);
        ctx.complete_span();
    }
    accept_transition_span(ctx, transition);
    let colon = ctx.next_code().expect("peeked colon");
    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    ctx.accept(colon);
    ctx.complete_span();

    ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    markup::parse_markup_run(ctx, markup::MarkupScope::SingleLine)?;
    ctx.complete_span();
    ctx.end_block();
    ctx.set_span(SpanKind::Code, SpanGenerator::Statement, AcceptedCharacters::Any);
    Ok(())
}

// === Control-flow constructs ===

/// `@if`, `@for`, ...: a keyword construct wrapped in its own statement
/// block, entered from markup
pub(crate) fn parse_keyword_block(
    ctx: &mut ParserContext,
    transition: Symbol,
    kw: CodeKeyword,
) -> Result<(), Cancelled> {
    let moved = take_owned_whitespace(ctx);
    ctx.complete_span();
    ctx.start_block(BlockKind::Statement, BlockGenerator::None);
    emit_moved_whitespace(ctx, moved, true);
    accept_transition_span(ctx, transition);

    ctx.set_span(SpanKind::Code, SpanGenerator::Statement, AcceptedCharacters::Any);
    let sym = ctx.next_code().expect("peeked keyword");
    parse_keyword_construct(ctx, kw, sym)?;
    absorb_trailing_newline(ctx);
    ctx.complete_span();
    ctx.end_block();
    Ok(())
}

/// One construct, dispatched by keyword. The keyword symbol is already read.
/// Runs inside the current code span; nested blocks and markup recurse.
fn parse_keyword_construct(ctx: &mut ParserContext, kw: CodeKeyword, sym: Symbol) -> Result<(), Cancelled> {
    match kw {
        CodeKeyword::If => {
            ctx.accept(sym);
            parse_condition(ctx)?;
            parse_statement_body(ctx)?;
            parse_else_chain(ctx)?;
        }
        CodeKeyword::For
        | CodeKeyword::Foreach
        | CodeKeyword::While
        | CodeKeyword::Switch
        | CodeKeyword::Lock => {
            ctx.accept(sym);
            parse_condition(ctx)?;
            parse_statement_body(ctx)?;
        }
        CodeKeyword::Using => {
            // Statement form (`using (...) { }`); the declaration form is
            // only recognized at the top level and handled in parse_using
            let kw_span = sym.span();
            ctx.accept(sym);
            let spacing = collect_spacing(ctx);
            ctx.accept_all(spacing);
            if matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::LeftParen) {
                parse_condition(ctx)?;
                parse_statement_body(ctx)?;
            } else {
                ctx.error(
                    ParseError::new(
                        ErrorKind::MisplacedImport,
                        "namespace imports are only allowed at the top level",
                        kw_span,
                    )
                    .with_help("Move the '@using' directive out of the code block"),
                );
                scan_to_statement_end(ctx);
            }
        }
        CodeKeyword::Try => {
            ctx.accept(sym);
            parse_statement_body(ctx)?;
            parse_catch_chain(ctx)?;
        }
        CodeKeyword::Do => {
            ctx.accept(sym);
            parse_statement_body(ctx)?;
            let spacing = collect_spacing(ctx);
            if matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::Keyword && s.content == "while")
            {
                ctx.accept_all(spacing);
                let while_sym = ctx.next_code().expect("peeked while");
                ctx.accept(while_sym);
                parse_condition(ctx)?;
                let tail = collect_spacing(ctx);
                if matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::Semicolon) {
                    ctx.accept_all(tail);
                    let semi = ctx.next_code().expect("peeked semicolon");
                    ctx.accept(semi);
                } else {
                    ctx.accept_all(tail);
                }
            } else {
                ctx.accept_all(spacing);
                let here = ctx.here();
                ctx.error_at(ErrorKind::InvalidDirective, "expected 'while' after 'do' body", here);
            }
        }
        CodeKeyword::Case | CodeKeyword::Default => {
            // Label: everything through the ':'
            ctx.accept(sym);
            while let Some(part) = ctx.next_code() {
                let done = part.kind == SymbolKind::Colon;
                ctx.accept(part);
                if done {
                    break;
                }
            }
        }
        CodeKeyword::Else
        | CodeKeyword::Catch
        | CodeKeyword::Finally
        | CodeKeyword::Namespace
        | CodeKeyword::Class => {
            // Not construct starters on their own; treat as plain code
            ctx.accept(sym);
        }
    }
    Ok(())
}

/// Balanced `( ... )` with backtrack-first recovery
fn parse_condition(ctx: &mut ParserContext) -> Result<(), Cancelled> {
    let spacing = collect_spacing(ctx);
    ctx.accept_all(spacing);
    match ctx.peek_code() {
        Some(s) if s.kind == SymbolKind::LeftParen => {
            let lp = ctx.next_code().expect("peeked paren");
            let open_span = lp.span();
            ctx.accept(lp);
            match scan_balanced(ctx, SymbolKind::LeftParen, SymbolKind::RightParen) {
                Some(end) => accept_until(ctx, &end),
                None => {
                    ctx.error(
                        ParseError::new(
                            ErrorKind::UnbalancedDelimiter,
                            "unbalanced '(' in condition",
                            open_span,
                        )
                        .with_help("Close the condition with ')'"),
                    );
                    scan_to_safe_terminator(ctx);
                }
            }
        }
        _ => {
            let here = ctx.here();
            ctx.error_at(ErrorKind::UnbalancedDelimiter, "expected '(' to open the condition", here);
        }
    }
    Ok(())
}

/// `{ ... }` body, or a single statement through its `;`
fn parse_statement_body(ctx: &mut ParserContext) -> Result<(), Cancelled> {
    let spacing = collect_spacing(ctx);
    ctx.accept_all(spacing);
    match ctx.peek_code() {
        Some(s) if s.kind == SymbolKind::LeftBrace => {
            let lb = ctx.next_code().expect("peeked brace");
            let open_span = lb.span();
            ctx.accept(lb);
            let closed = parse_statements_until_close(ctx, &open_span)?;
            if closed {
                let rb = ctx.next_code().expect("right brace");
                ctx.accept(rb);
            }
            Ok(())
        }
        _ => {
            scan_to_statement_end(ctx);
            Ok(())
        }
    }
}

/// Accept through the terminating `;`, or stop before a newline/`}`
fn scan_to_statement_end(ctx: &mut ParserContext) {
    while let Some(sym) = ctx.peek_code() {
        match sym.kind {
            SymbolKind::Semicolon => {
                let sym = ctx.next_code().expect("peeked semicolon");
                ctx.accept(sym);
                return;
            }
            SymbolKind::NewLine | SymbolKind::RightBrace => return,
            _ => {
                let sym = ctx.next_code().expect("peeked symbol");
                ctx.accept(sym);
            }
        }
    }
}

fn parse_else_chain(ctx: &mut ParserContext) -> Result<(), Cancelled> {
    loop {
        let saved = ctx.location();
        let spacing = collect_spacing(ctx);
        if !matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::Keyword && s.content == "else")
        {
            ctx.seek(saved);
            return Ok(());
        }
        ctx.accept_all(spacing);
        let else_sym = ctx.next_code().expect("peeked else");
        ctx.accept(else_sym);

        let spacing2 = collect_spacing(ctx);
        ctx.accept_all(spacing2);
        if matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::Keyword && s.content == "if") {
            let if_sym = ctx.next_code().expect("peeked if");
            ctx.accept(if_sym);
            parse_condition(ctx)?;
            parse_statement_body(ctx)?;
            // Another 'else' may follow
        } else {
            parse_statement_body(ctx)?;
            return Ok(());
        }
    }
}

fn parse_catch_chain(ctx: &mut ParserContext) -> Result<(), Cancelled> {
    loop {
        let saved = ctx.location();
        let spacing = collect_spacing(ctx);
        match ctx.peek_code() {
            Some(s) if s.kind == SymbolKind::Keyword && s.content == "catch" => {
                ctx.accept_all(spacing);
                let catch_sym = ctx.next_code().expect("peeked catch");
                ctx.accept(catch_sym);
                let spacing2 = collect_spacing(ctx);
                ctx.accept_all(spacing2);
                if matches!(ctx.peek_code(), Some(p) if p.kind == SymbolKind::LeftParen) {
                    parse_condition(ctx)?;
                }
                parse_statement_body(ctx)?;
            }
            Some(s) if s.kind == SymbolKind::Keyword && s.content == "finally" => {
                ctx.accept_all(spacing);
                let finally_sym = ctx.next_code().expect("peeked finally");
                ctx.accept(finally_sym);
                parse_statement_body(ctx)?;
                return Ok(());
            }
            _ => {
                ctx.seek(saved);
                return Ok(());
            }
        }
    }
}

// === Expressions ===

/// `@identifier`, with `.member`, `(...)`, `[...]` continuations
pub(crate) fn parse_implicit_expression(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    ctx.complete_span();
    ctx.start_block(BlockKind::Expression, BlockGenerator::Expression);
    accept_transition_span(ctx, transition);

    ctx.set_span(SpanKind::Code, SpanGenerator::Expression, AcceptedCharacters::NonWhitespace);
    let first = ctx.next_code().expect("identifier after '@'");
    ctx.accept(first);

    loop {
        let Some(sym) = ctx.peek_code() else { break };
        match sym.kind {
            SymbolKind::Dot => {
                // Only a member access continues the expression; a trailing
                // dot belongs to the markup after it
                let after = ctx.peek_code_nth(1);
                if matches!(after, Some(a) if matches!(a.kind, SymbolKind::Identifier | SymbolKind::Keyword))
                {
                    let dot = ctx.next_code().expect("peeked dot");
                    ctx.accept(dot);
                    let member = ctx.next_code().expect("peeked member");
                    ctx.accept(member);
                } else {
                    break;
                }
            }
            SymbolKind::LeftParen | SymbolKind::LeftBracket => {
                let close = if sym.kind == SymbolKind::LeftParen {
                    SymbolKind::RightParen
                } else {
                    SymbolKind::RightBracket
                };
                let open = ctx.next_code().expect("peeked open delimiter");
                let open_span = open.span();
                let open_kind = open.kind;
                ctx.accept(open);
                match scan_balanced(ctx, open_kind, close) {
                    Some(end) => accept_until(ctx, &end),
                    None => {
                        ctx.error(
                            ParseError::new(
                                ErrorKind::UnbalancedDelimiter,
                                "unbalanced delimiter in expression",
                                open_span,
                            )
                            .with_help("Close the expression before the end of the file"),
                        );
                        scan_to_safe_terminator(ctx);
                        break;
                    }
                }
            }
            _ => break,
        }
    }

    ctx.complete_span();
    ctx.end_block();
    Ok(())
}

/// `@( ... )`
pub(crate) fn parse_explicit_expression(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    ctx.complete_span();
    ctx.start_block(BlockKind::Expression, BlockGenerator::Expression);
    accept_transition_span(ctx, transition);

    let lp = ctx.next_code().expect("peeked paren");
    let open_span = lp.span();
    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    ctx.accept(lp);
    ctx.complete_span();

    ctx.set_span(SpanKind::Code, SpanGenerator::Expression, AcceptedCharacters::Any);
    let mut depth = 0usize;
    loop {
        ctx.check_cancel()?;
        let Some(sym) = ctx.next_code() else {
            ctx.error(
                ParseError::new(
                    ErrorKind::UnbalancedDelimiter,
                    "expected ')' before end of file",
                    ctx.here(),
                )
                .with_related(open_span.clone())
                .with_related_label("expression opened here"),
            );
            break;
        };
        match sym.kind {
            SymbolKind::RightParen if depth == 0 => {
                ctx.complete_span();
                ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
                ctx.accept(sym);
                ctx.complete_span();
                break;
            }
            SymbolKind::LeftParen => {
                depth += 1;
                ctx.accept(sym);
            }
            SymbolKind::RightParen => {
                depth -= 1;
                ctx.accept(sym);
            }
            SymbolKind::Transition
                if matches!(ctx.peek_code(), Some(n) if n.kind == SymbolKind::Operator && n.content == "<") =>
            {
                parse_template(ctx, sym)?;
                ctx.set_span(SpanKind::Code, SpanGenerator::Expression, AcceptedCharacters::Any);
            }
            _ => ctx.accept(sym),
        }
    }

    ctx.complete_span();
    ctx.end_block();
    Ok(())
}

/// `@<p>...</p>` inline template
pub(crate) fn parse_template(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    ctx.complete_span();
    ctx.start_block(BlockKind::Template, BlockGenerator::Template);
    accept_transition_span(ctx, transition);
    markup::parse_element_block(ctx, Vec::new())?;
    ctx.end_block();
    Ok(())
}

// === Comments ===

/// `@* ... *@`
pub(crate) fn parse_template_comment(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    let moved = take_owned_whitespace(ctx);
    ctx.complete_span();
    let comment_span = transition.span();
    ctx.start_block(BlockKind::Comment, BlockGenerator::None);
    emit_moved_whitespace(ctx, moved, false);
    accept_transition_span(ctx, transition);

    let star = ctx.next_code().expect("peeked star");
    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    ctx.accept(star);
    ctx.complete_span();

    if let Some(content) = ctx.next_template_comment_content() {
        ctx.set_span(SpanKind::Comment, SpanGenerator::None, AcceptedCharacters::Any);
        ctx.accept(content);
        ctx.complete_span();
    }

    if ctx.at_eof() {
        ctx.error(
            ParseError::new(ErrorKind::UnclosedComment, "comment is never closed", ctx.here())
                .with_related(comment_span)
                .with_related_label("comment opened here")
                .with_help("Close the comment with '*@'"),
        );
    } else {
        let close_star = ctx.next_code().expect("star before '@'");
        ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
        ctx.accept(close_star);
        ctx.complete_span();
        // The closing '@' must be read in markup mode: code mode would see
        // '@"' as a verbatim string opener
        if let Some(close_transition) = ctx.next_markup() {
            ctx.set_span(SpanKind::Transition, SpanGenerator::None, close_brace_accepted(ctx));
            ctx.accept(close_transition);
            absorb_trailing_newline(ctx);
            ctx.complete_span();
        }
    }
    ctx.end_block();
    Ok(())
}

// === Directives ===

/// `@using System.IO;` (declaration) or `@using (resource) { ... }`
/// (statement); the parenthesized form is the statement
pub(crate) fn parse_using(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    // Look past 'using' and spacing to the deciding symbol
    let saved = ctx.location();
    let _kw = ctx.next_code();
    let _spacing = collect_spacing(ctx);
    let decider = ctx.peek_code();
    ctx.seek(saved);

    if matches!(decider, Some(s) if s.kind == SymbolKind::LeftParen) {
        return parse_keyword_block(ctx, transition, CodeKeyword::Using);
    }

    let moved = take_owned_whitespace(ctx);
    ctx.complete_span();
    ctx.start_block(BlockKind::Directive, BlockGenerator::Directive { name: "using".to_string() });
    emit_moved_whitespace(ctx, moved, false);
    accept_transition_span(ctx, transition);

    let kw = ctx.next_code().expect("using keyword");
    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    ctx.accept(kw);
    ctx.complete_span();

    ctx.set_span(
        SpanKind::Code,
        SpanGenerator::UsingImport { namespace: String::new() },
        AcceptedCharacters::AnyExceptNewline,
    );
    loop {
        match ctx.peek_code() {
            None => break,
            Some(s) if s.kind == SymbolKind::NewLine => break,
            Some(s) if s.kind == SymbolKind::Semicolon => {
                let semi = ctx.next_code().expect("peeked semicolon");
                ctx.accept(semi);
                break;
            }
            Some(_) => {
                let sym = ctx.next_code().expect("peeked symbol");
                ctx.accept(sym);
            }
        }
    }
    let namespace = ctx
        .span_symbols()
        .iter()
        .map(|s| s.content.as_str())
        .collect::<String>()
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string();
    if namespace.is_empty() {
        let here = ctx.here();
        ctx.error_at(ErrorKind::InvalidDirective, "expected a namespace after '@using'", here);
    }
    ctx.set_span_generator(SpanGenerator::UsingImport { namespace });
    ctx.complete_span();
    ctx.end_block();
    Ok(())
}

/// `@functions { ... }` class-level code
pub(crate) fn parse_functions_directive(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    let moved = take_owned_whitespace(ctx);
    ctx.complete_span();
    ctx.start_block(BlockKind::Functions, BlockGenerator::None);
    emit_moved_whitespace(ctx, moved, false);
    accept_transition_span(ctx, transition);

    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    let name = ctx.next_code().expect("functions keyword");
    let name_span = name.span();
    ctx.accept(name);
    let spacing = collect_spacing(ctx);
    ctx.accept_all(spacing);

    if !matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::LeftBrace) {
        ctx.error_at(
            ErrorKind::InvalidDirective,
            "expected '{' after '@functions'",
            name_span,
        );
        ctx.complete_span();
        ctx.end_block();
        return Ok(());
    }
    let lb = ctx.next_code().expect("peeked brace");
    let open_span = lb.span();
    ctx.accept(lb);
    ctx.complete_span();

    // Class-level code: plain balanced braces, no markup inside
    ctx.set_span(SpanKind::Code, SpanGenerator::TypeMember, AcceptedCharacters::Any);
    let mut depth = 0usize;
    let mut closed = false;
    loop {
        ctx.check_cancel()?;
        let Some(sym) = ctx.next_code() else {
            ctx.error(
                ParseError::new(
                    ErrorKind::UnexpectedEndOfFile,
                    "expected end of block before end of file",
                    ctx.here(),
                )
                .with_related(open_span.clone())
                .with_related_label("block opened here"),
            );
            break;
        };
        match sym.kind {
            SymbolKind::RightBrace if depth == 0 => {
                ctx.put_back(&sym);
                closed = true;
                break;
            }
            SymbolKind::RightBrace => {
                depth -= 1;
                ctx.accept(sym);
            }
            SymbolKind::LeftBrace => {
                depth += 1;
                ctx.accept(sym);
            }
            _ => ctx.accept(sym),
        }
    }
    ctx.complete_span();

    if closed {
        let rb = ctx.next_code().expect("right brace");
        ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, close_brace_accepted(ctx));
        ctx.accept(rb);
        absorb_trailing_newline(ctx);
        ctx.complete_span();
    }
    ctx.end_block();
    Ok(())
}

/// `@section Name { ...markup... }`
pub(crate) fn parse_section_directive(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    // The section name is needed before the block opens: scan ahead first
    let saved = ctx.location();
    let _kw = ctx.next_code();
    let _spacing = collect_spacing(ctx);
    let name_sym = ctx.peek_code();
    ctx.seek(saved);

    let name = match name_sym {
        Some(s) if s.kind == SymbolKind::Identifier => s.content,
        _ => {
            let here = ctx.here();
            ctx.error_at(ErrorKind::InvalidDirective, "expected a name after '@section'", here);
            // Recover: render literally
            ctx.accept(transition);
            return Ok(());
        }
    };

    let moved = take_owned_whitespace(ctx);
    ctx.complete_span();
    let section_span = transition.span();
    ctx.start_block(BlockKind::Section, BlockGenerator::Section { name });
    emit_moved_whitespace(ctx, moved, false);
    accept_transition_span(ctx, transition);

    // 'section Name {' is all structure
    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    let kw = ctx.next_code().expect("section keyword");
    ctx.accept(kw);
    let spacing = collect_spacing(ctx);
    ctx.accept_all(spacing);
    let name_sym = ctx.next_code().expect("section name");
    ctx.accept(name_sym);
    let spacing = collect_spacing(ctx);
    ctx.accept_all(spacing);

    if !matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::LeftBrace) {
        let here = ctx.here();
        ctx.error_at(ErrorKind::InvalidDirective, "expected '{' after the section name", here);
        ctx.complete_span();
        ctx.end_block();
        return Ok(());
    }
    let lb = ctx.next_code().expect("peeked brace");
    ctx.accept(lb);
    ctx.complete_span();

    ctx.start_block(BlockKind::Markup, BlockGenerator::None);
    ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    markup::parse_markup_run(ctx, markup::MarkupScope::Section)?;
    ctx.complete_span();
    ctx.end_block();

    match ctx.next_markup() {
        Some(rb) if rb.kind == SymbolKind::RightBrace => {
            ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, close_brace_accepted(ctx));
            ctx.accept(rb);
            absorb_trailing_newline(ctx);
            ctx.complete_span();
        }
        _ => {
            ctx.error(
                ParseError::new(ErrorKind::UnclosedSection, "section is never closed", ctx.here())
                    .with_related(section_span)
                    .with_related_label("section opened here")
                    .with_help("Close the section with '}'"),
            );
        }
    }
    ctx.end_block();
    Ok(())
}

/// `@helper Name(args) { ...markup... }` is a reusable markup method
pub(crate) fn parse_helper_directive(ctx: &mut ParserContext, transition: Symbol) -> Result<(), Cancelled> {
    // Signature text is needed for the block generator: scan ahead
    let saved = ctx.location();
    let _kw = ctx.next_code();
    let _spacing = collect_spacing(ctx);
    let name_sym = ctx.peek_code();
    ctx.seek(saved);

    if !matches!(&name_sym, Some(s) if s.kind == SymbolKind::Identifier) {
        let here = ctx.here();
        ctx.error_at(ErrorKind::InvalidDirective, "expected a name after '@helper'", here);
        ctx.accept(transition);
        return Ok(());
    }

    let moved = take_owned_whitespace(ctx);
    ctx.complete_span();
    let helper_span = transition.span();
    // Generator is patched once the signature has been read
    ctx.start_block(BlockKind::Helper, BlockGenerator::Helper { signature: String::new() });
    emit_moved_whitespace(ctx, moved, false);
    accept_transition_span(ctx, transition);

    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    let kw = ctx.next_code().expect("helper keyword");
    ctx.accept(kw);
    let spacing = collect_spacing(ctx);
    ctx.accept_all(spacing);
    ctx.complete_span();

    // Signature: Name(args)
    ctx.set_span(SpanKind::Code, SpanGenerator::None, AcceptedCharacters::None);
    let name = ctx.next_code().expect("helper name");
    let mut signature = name.content.clone();
    ctx.accept(name);
    if matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::LeftParen) {
        let lp = ctx.next_code().expect("peeked paren");
        let open_span = lp.span();
        let start_offset = lp.start.offset;
        ctx.accept(lp);
        match scan_balanced(ctx, SymbolKind::LeftParen, SymbolKind::RightParen) {
            Some(end) => {
                accept_until(ctx, &end);
                let args: String = ctx
                    .span_symbols()
                    .iter()
                    .filter(|s| s.start.offset >= start_offset)
                    .map(|s| s.content.as_str())
                    .collect();
                signature.push_str(&args);
            }
            None => {
                ctx.error(
                    ParseError::new(
                        ErrorKind::UnbalancedDelimiter,
                        "unbalanced '(' in helper signature",
                        open_span,
                    )
                    .with_help("Close the parameter list with ')'"),
                );
                scan_to_safe_terminator(ctx);
            }
        }
    } else {
        signature.push_str("()");
    }
    ctx.complete_span();

    ctx.set_block_generator(BlockGenerator::Helper { signature });

    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    let spacing = collect_spacing(ctx);
    ctx.accept_all(spacing);
    if !matches!(ctx.peek_code(), Some(s) if s.kind == SymbolKind::LeftBrace) {
        let here = ctx.here();
        ctx.error_at(ErrorKind::InvalidDirective, "expected '{' after the helper signature", here);
        ctx.complete_span();
        ctx.end_block();
        return Ok(());
    }
    let lb = ctx.next_code().expect("peeked brace");
    ctx.accept(lb);
    ctx.complete_span();

    ctx.start_block(BlockKind::Markup, BlockGenerator::None);
    ctx.set_span(SpanKind::Markup, SpanGenerator::Markup, AcceptedCharacters::Any);
    markup::parse_markup_run(ctx, markup::MarkupScope::Section)?;
    ctx.complete_span();
    ctx.end_block();

    match ctx.next_markup() {
        Some(rb) if rb.kind == SymbolKind::RightBrace => {
            ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, close_brace_accepted(ctx));
            ctx.accept(rb);
            absorb_trailing_newline(ctx);
            ctx.complete_span();
        }
        _ => {
            ctx.error(
                ParseError::new(ErrorKind::UnclosedSection, "helper is never closed", ctx.here())
                    .with_related(helper_span)
                    .with_related_label("helper opened here"),
            );
        }
    }
    ctx.end_block();
    Ok(())
}

/// `@inject Type Name`, `@model Type`, `@page ["route"]`
pub(crate) fn parse_line_directive(
    ctx: &mut ParserContext,
    transition: Symbol,
    name: &str,
) -> Result<(), Cancelled> {
    let moved = take_owned_whitespace(ctx);
    ctx.complete_span();
    let directive_span = transition.span();
    ctx.start_block(BlockKind::Directive, BlockGenerator::Directive { name: name.to_string() });
    emit_moved_whitespace(ctx, moved, false);
    accept_transition_span(ctx, transition);

    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
    let kw = ctx.next_code().expect("directive name");
    ctx.accept(kw);
    ctx.complete_span();

    let mut token_count = 0usize;
    loop {
        let spacing = collect_spacing(ctx);
        let has_newline = spacing.iter().any(|s| s.kind == SymbolKind::NewLine);
        match ctx.peek_code() {
            None => {
                ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
                ctx.accept_all(spacing);
                ctx.complete_span();
                break;
            }
            Some(_) if has_newline => {
                // Directive ends at the line break; give the spacing back
                if let Some(first) = spacing.first() {
                    ctx.put_back(first);
                }
                break;
            }
            Some(_) => {
                if spacing.is_empty() && token_count > 0 {
                    break;
                }
                ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, AcceptedCharacters::None);
                ctx.accept_all(spacing);
                ctx.complete_span();
                // One token: code symbols up to the next spacing
                ctx.set_span(SpanKind::Code, SpanGenerator::DirectiveToken, AcceptedCharacters::NonWhitespace);
                let mut any = false;
                while let Some(s) = ctx.peek_code() {
                    if s.is_spacing() {
                        break;
                    }
                    let s = ctx.next_code().expect("peeked token symbol");
                    ctx.accept(s);
                    any = true;
                }
                ctx.complete_span();
                if !any {
                    break;
                }
                token_count += 1;
            }
        }
    }

    let required = match name {
        "inject" => 2,
        "model" => 1,
        _ => 0,
    };
    if token_count < required {
        ctx.error(
            ParseError::new(
                ErrorKind::InvalidDirective,
                format!("'@{}' expects {} argument(s), found {}", name, required, token_count),
                directive_span,
            )
            .with_help(match name {
                "inject" => "Write '@inject <type> <member name>'",
                "model" => "Write '@model <type>'",
                _ => "Remove the extra arguments",
            }),
        );
    }

    ctx.set_span(SpanKind::MetaCode, SpanGenerator::None, close_brace_accepted(ctx));
    absorb_trailing_newline(ctx);
    ctx.complete_span();
    ctx.end_block();
    Ok(())
}
