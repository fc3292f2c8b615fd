//! The parser pair.
//!
//! A markup parser and a code parser cooperate over one [`ParserContext`]:
//! the markup parser owns the document and hands control to the code parser
//! at each `@`, which parses one logical unit and hands control back.
//! Parsing always yields a (possibly partial) tree plus an ordered error
//! list; there is no unrecoverable parse failure, only cancellation.

mod code;
mod context;
mod keywords;
mod markup;

pub use context::{ActiveParser, Cancelled, ParserContext};
pub use keywords::CodeKeyword;

use crate::error::ParseError;
use crate::syntax::SyntaxTree;
use crate::CancellationToken;

/// A finished parse: best-effort tree plus everything that went wrong
#[derive(Debug)]
pub struct ParseOutcome {
    pub tree: SyntaxTree,
    pub errors: Vec<ParseError>,
}

/// Parse a whole document. `design_time` switches the whitespace-ownership
/// rules; `cancel` is checked cooperatively between top-level units.
pub fn parse(
    source: &str,
    file: Option<String>,
    design_time: bool,
    cancel: Option<CancellationToken>,
) -> Result<ParseOutcome, Cancelled> {
    let mut ctx = ParserContext::new(source, file, design_time, cancel);
    let root = markup::parse_document(&mut ctx)?;
    Ok(ParseOutcome { tree: SyntaxTree::new(root), errors: ctx.errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Block, BlockKind, SyntaxNode};

    fn parse_runtime(source: &str) -> ParseOutcome {
        parse(source, None, false, None).expect("not cancelled")
    }

    fn parse_design(source: &str) -> ParseOutcome {
        parse(source, None, true, None).expect("not cancelled")
    }

    fn find_block<'a>(block: &'a Block, kind: BlockKind) -> Option<&'a Block> {
        if block.kind == kind {
            return Some(block);
        }
        for child in &block.children {
            if let SyntaxNode::Block(inner) = child {
                if let Some(found) = find_block(inner, kind) {
                    return Some(found);
                }
            }
        }
        None
    }

    // Reconstructing the leaf chain must reproduce the input byte-for-byte
    #[test]
    fn test_lossless_round_trip() {
        let sources = [
            "<p>Hello</p>",
            "<p>Hello @Name!</p>",
            "@{ var x = 1; <p>@x</p> }",
            "@if (a > b) { <span>hi</span> } else { <span>lo</span> }",
            "@foreach (var item in Items) {\n    <li>@item.Name</li>\n}",
            "@* a comment *@",
            "@@escaped",
            "before@@after",
            "@using System.IO;\n<div class=\"a @b c\">x</div>",
            "@functions { public int X { get; set; } }",
            "@section Footer {\n  <p>f</p>\n}",
            "@( 1 + 2 )",
            "@Model.Items[0].Render(\"x\")",
            "@{\n    <text>  raw  </text>\n}",
            "@{ @: one line @Name\n}",
            "@try { Work(); } catch (Exception ex) { Log(ex); } finally { Done(); }",
            "@do { x++; } while (x < 3);",
            "@switch (x) { case 1: break; default: break; }",
            "@inject IService Svc\n<p>@Svc.Get()</p>",
            "<input value=\"@x\" disabled>",
            "@lock (gate) { n++; }",
        ];
        for source in sources {
            let runtime = parse_runtime(source);
            assert_eq!(runtime.tree.text(), source, "runtime mode lost text for {:?}", source);
            let design = parse_design(source);
            assert_eq!(design.tree.text(), source, "design mode lost text for {:?}", source);
        }
    }

    #[test]
    fn test_plain_markup_has_no_errors() {
        let outcome = parse_runtime("<p>Hello</p>\n");
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.tree.root.kind, BlockKind::Markup);
    }

    #[test]
    fn test_implicit_expression_block() {
        let outcome = parse_runtime("<p>@Name</p>");
        let expr = find_block(&outcome.tree.root, BlockKind::Expression).expect("expression block");
        assert_eq!(expr.content(), "@Name");
    }

    #[test]
    fn test_implicit_expression_stops_at_trailing_dot() {
        let outcome = parse_runtime("<p>@Name.</p>");
        let expr = find_block(&outcome.tree.root, BlockKind::Expression).expect("expression block");
        assert_eq!(expr.content(), "@Name");
    }

    #[test]
    fn test_implicit_expression_method_chain() {
        let outcome = parse_runtime("@Model.Get(1)[2].Next");
        let expr = find_block(&outcome.tree.root, BlockKind::Expression).expect("expression block");
        assert_eq!(expr.content(), "@Model.Get(1)[2].Next");
    }

    #[test]
    fn test_double_transition_is_one_literal() {
        let outcome = parse_runtime("a@@b");
        assert!(outcome.errors.is_empty());
        // The first '@' sits in an unrendered transition span; the second is
        // ordinary markup text
        let spans = outcome.tree.leaf_spans();
        let rendered: String = spans
            .iter()
            .filter(|s| s.generator == crate::syntax::SpanGenerator::Markup)
            .map(|s| s.content())
            .collect();
        assert_eq!(rendered, "a@b");
    }

    #[test]
    fn test_double_transition_at_eof() {
        let outcome = parse_runtime("x@@");
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.tree.text(), "x@@");
    }

    #[test]
    fn test_triple_transition_then_expression() {
        let outcome = parse_runtime("@@@Expr");
        assert!(outcome.errors.is_empty());
        let expr = find_block(&outcome.tree.root, BlockKind::Expression).expect("expression block");
        assert_eq!(expr.content(), "@Expr");
        assert_eq!(outcome.tree.text(), "@@@Expr");
    }

    #[test]
    fn test_unbalanced_brace_recovers() {
        let outcome = parse_runtime("@if(true) { ");
        assert!(!outcome.errors.is_empty());
        assert!(outcome.errors.iter().any(|e| e.message.contains("end of block")));
        assert!(!outcome.tree.root.children.is_empty());
        assert_eq!(outcome.tree.text(), "@if(true) { ");
    }

    #[test]
    fn test_unbalanced_condition_recovers() {
        let outcome = parse_runtime("@while (x { <p>a</p> }");
        assert!(!outcome.errors.is_empty());
        assert_eq!(outcome.tree.text(), "@while (x { <p>a</p> }");
    }

    #[test]
    fn test_eof_in_comment_recovers() {
        let outcome = parse_runtime("@* never closed");
        assert!(outcome.errors.iter().any(|e| e.message.contains("never closed")));
        assert_eq!(outcome.tree.text(), "@* never closed");
    }

    // Identical input, different modes: the statement block's markup child
    // starts at the whitespace in design-time mode and at '<' in run-time
    #[test]
    fn test_whitespace_ownership_differs_by_mode() {
        let source = "@{ <p></p> }";

        let runtime = parse_runtime(source);
        let rt_statement = find_block(&runtime.tree.root, BlockKind::Statement).expect("statement");
        let rt_markup = find_block(rt_statement, BlockKind::Markup).expect("markup child");
        assert_eq!(rt_markup.content(), "<p></p>");

        let design = parse_design(source);
        let dt_statement = find_block(&design.tree.root, BlockKind::Statement).expect("statement");
        let dt_markup = find_block(dt_statement, BlockKind::Markup).expect("markup child");
        assert_eq!(dt_markup.content(), " <p></p>");
    }

    // Before '<text>' code keeps the whitespace in both modes
    #[test]
    fn test_text_tag_whitespace_stays_with_code() {
        let source = "@{ <text>x</text> }";
        for outcome in [parse_runtime(source), parse_design(source)] {
            let statement = find_block(&outcome.tree.root, BlockKind::Statement).expect("statement");
            let markup = find_block(statement, BlockKind::Markup).expect("markup child");
            assert_eq!(markup.content(), "<text>x</text>");
        }
    }

    #[test]
    fn test_leading_line_whitespace_moves_into_code_at_runtime() {
        let source = "<p></p>\n  @{ x(); }\n";
        let runtime = parse_runtime(source);
        let statement = find_block(&runtime.tree.root, BlockKind::Statement).expect("statement");
        assert!(statement.content().starts_with("  @{"), "code owns the indent");

        let design = parse_design(source);
        let statement = find_block(&design.tree.root, BlockKind::Statement).expect("statement");
        assert!(statement.content().starts_with("@{"), "markup keeps the indent");
    }

    #[test]
    fn test_using_declaration_vs_statement() {
        let decl = parse_runtime("@using System.IO;\n");
        let directive = find_block(&decl.tree.root, BlockKind::Directive).expect("directive");
        assert!(matches!(
            &directive.generator,
            crate::syntax::BlockGenerator::Directive { name } if name == "using"
        ));

        let stmt = parse_runtime("@using (var f = Open()) { Use(f); }");
        assert!(find_block(&stmt.tree.root, BlockKind::Statement).is_some());
        assert!(find_block(&stmt.tree.root, BlockKind::Directive).is_none());
    }

    #[test]
    fn test_using_declaration_inside_block_is_an_error() {
        let outcome = parse_runtime("@{ using System.IO; }");
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.kind == crate::error::ErrorKind::MisplacedImport));
    }

    #[test]
    fn test_reserved_words_rejected() {
        for source in ["@namespace Foo", "@class Bar"] {
            let outcome = parse_runtime(source);
            assert!(
                outcome.errors.iter().any(|e| e.kind == crate::error::ErrorKind::ReservedWord),
                "expected reserved-word error for {:?}",
                source
            );
        }
    }

    #[test]
    fn test_section_block() {
        let outcome = parse_runtime("@section Sidebar {\n<p>s</p>\n}");
        assert!(outcome.errors.is_empty());
        let section = find_block(&outcome.tree.root, BlockKind::Section).expect("section");
        assert!(matches!(
            &section.generator,
            crate::syntax::BlockGenerator::Section { name } if name == "Sidebar"
        ));
    }

    #[test]
    fn test_functions_block() {
        let outcome = parse_runtime("@functions { public int Count { get; set; } }");
        assert!(outcome.errors.is_empty());
        let functions = find_block(&outcome.tree.root, BlockKind::Functions).expect("functions");
        assert!(functions.content().contains("public int Count"));
    }

    #[test]
    fn test_helper_block() {
        let outcome = parse_runtime("@helper Row(string name) {\n<tr><td>@name</td></tr>\n}");
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let helper = find_block(&outcome.tree.root, BlockKind::Helper).expect("helper");
        assert!(matches!(
            &helper.generator,
            crate::syntax::BlockGenerator::Helper { signature } if signature == "Row(string name)"
        ));
    }

    #[test]
    fn test_inject_directive_tokens() {
        let outcome = parse_runtime("@inject IClock Clock\n");
        assert!(outcome.errors.is_empty());
        let directive = find_block(&outcome.tree.root, BlockKind::Directive).expect("directive");
        let tokens: Vec<String> = directive
            .leaf_spans()
            .iter()
            .filter(|s| s.generator == crate::syntax::SpanGenerator::DirectiveToken)
            .map(|s| s.content())
            .collect();
        assert_eq!(tokens, vec!["IClock", "Clock"]);
    }

    #[test]
    fn test_missing_directive_args() {
        let outcome = parse_runtime("@model\n");
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.kind == crate::error::ErrorKind::InvalidDirective));
    }

    #[test]
    fn test_comment_block_not_rendered() {
        let outcome = parse_runtime("a@* hidden *@b");
        assert!(outcome.errors.is_empty());
        let comment = find_block(&outcome.tree.root, BlockKind::Comment).expect("comment");
        assert!(comment
            .leaf_spans()
            .iter()
            .all(|s| s.generator == crate::syntax::SpanGenerator::None));
        assert_eq!(outcome.tree.text(), "a@* hidden *@b");
    }

    #[test]
    fn test_cancellation_yields_no_output() {
        let token = CancellationToken::new();
        token.cancel();
        let result = parse("<p>@x</p>", None, false, Some(token));
        assert!(result.is_err());
    }

    #[test]
    fn test_single_line_markup() {
        let outcome = parse_runtime("@{ @: plain @Name line\n}");
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let statement = find_block(&outcome.tree.root, BlockKind::Statement).expect("statement");
        let markup = find_block(statement, BlockKind::Markup).expect("line markup");
        assert!(markup.content().contains("plain"));
        assert!(find_block(markup, BlockKind::Expression).is_some());
    }

    #[test]
    fn test_else_if_chain() {
        let source = "@if (a) { <b>1</b> } else if (b) { <b>2</b> } else { <b>3</b> }";
        let outcome = parse_runtime(source);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.tree.text(), source);
        // All one statement block
        let statement = find_block(&outcome.tree.root, BlockKind::Statement).expect("statement");
        assert_eq!(statement.content(), source);
    }

    #[test]
    fn test_dynamic_attribute_builds_block() {
        let outcome = parse_runtime("<a href=\"@Url\">x</a>");
        assert!(outcome.errors.is_empty());
        let root = &outcome.tree.root;
        let attr = root
            .children
            .iter()
            .filter_map(|c| c.as_block())
            .find(|b| matches!(&b.generator, crate::syntax::BlockGenerator::Attribute { name, .. } if name == "href"))
            .expect("attribute block");
        assert!(find_block(attr, BlockKind::Expression).is_some());
    }

    #[test]
    fn test_template_in_expression() {
        let source = "@Repeat(3, @<li>item</li>)";
        let outcome = parse_runtime(source);
        assert_eq!(outcome.tree.text(), source);
    }
}
