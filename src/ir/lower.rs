//! Default lowering: the structural walk from syntax tree to IR.
//!
//! Dispatches on the generators the parser attached, 1:1: markup spans to
//! HtmlContent runs, expression blocks to CSharpExpression nodes, statement
//! blocks to interleaved statement/markup runs, directives to directive
//! nodes, class-level blocks to class items. Produces the full
//! document/namespace/class/method scaffold in one pass.

use super::{DocumentKind, IrDocument, IrNode};
use crate::codegen::GenerateOptions;
use crate::source::SourceSpan;
use crate::syntax::{Block, BlockGenerator, BlockKind, Span, SpanGenerator, SyntaxNode, SyntaxTree};

struct Parts {
    usings: Vec<IrNode>,
    class_items: Vec<IrNode>,
}

/// Lower a rewritten syntax tree into a generation-ready IR document
pub fn lower(tree: &SyntaxTree, options: &GenerateOptions) -> IrDocument {
    let mut parts = Parts { usings: Vec::new(), class_items: Vec::new() };
    let mut body = Vec::new();
    lower_children(&tree.root.children, &mut parts, &mut body);

    let mut class_children = parts.class_items;
    class_children.push(IrNode::Method { children: body });

    let mut namespace_children = parts.usings;
    namespace_children.push(IrNode::Class {
        name: options.class_name.clone(),
        base_type: options.base_type.clone(),
        children: class_children,
    });

    IrDocument {
        root: IrNode::Document {
            children: vec![IrNode::Namespace {
                name: options.namespace.clone(),
                children: namespace_children,
            }],
        },
        kind: DocumentKind::View,
        model: None,
        diagnostics: Vec::new(),
    }
}

fn lower_children(children: &[SyntaxNode], parts: &mut Parts, out: &mut Vec<IrNode>) {
    for child in children {
        match child {
            SyntaxNode::Span(span) => lower_span(span, out),
            SyntaxNode::Block(block) => lower_block(block, parts, out),
        }
    }
}

fn lower_span(span: &Span, out: &mut Vec<IrNode>) {
    match &span.generator {
        SpanGenerator::Markup => out.push(IrNode::HtmlContent {
            content: span.content(),
            span: Some(span.source_span()),
        }),
        // A statement span outside its block (does not happen from the
        // parser, but rewriters may synthesize one)
        SpanGenerator::Statement => {
            let source = span.source_span();
            out.push(IrNode::CSharpStatement {
                children: vec![IrNode::CSharpToken {
                    content: span.content(),
                    span: Some(source.clone()),
                }],
                span: Some(source),
            });
        }
        _ => {}
    }
}

fn lower_block(block: &Block, parts: &mut Parts, out: &mut Vec<IrNode>) {
    match &block.generator {
        BlockGenerator::Expression => out.push(lower_expression(block, parts)),
        BlockGenerator::Attribute { name, prefix, suffix } => {
            out.push(lower_attribute(block, name, prefix, suffix, parts));
        }
        BlockGenerator::Section { name } => {
            let mut inner = Vec::new();
            lower_children(&block.children, parts, &mut inner);
            out.push(IrNode::Section { name: name.clone(), children: inner });
        }
        BlockGenerator::Template => {
            let mut inner = Vec::new();
            lower_children(&block.children, parts, &mut inner);
            out.push(IrNode::Template { children: inner });
        }
        BlockGenerator::Directive { name } => lower_directive(block, name, parts, out),
        BlockGenerator::Helper { signature } => {
            let mut inner = Vec::new();
            lower_children(&block.children, parts, &mut inner);
            parts.class_items.push(IrNode::HelperMethod {
                signature: signature.clone(),
                children: inner,
            });
        }
        BlockGenerator::DynamicAttributeValue { .. } => {
            // Only meaningful inside an attribute block; elsewhere lower the
            // contents in place
            lower_children(&block.children, parts, out);
        }
        BlockGenerator::None => match block.kind {
            BlockKind::Statement => lower_statement(block, parts, out),
            BlockKind::Functions => lower_functions(block, parts),
            BlockKind::Comment => {}
            _ => lower_children(&block.children, parts, out),
        },
    }
}

fn lower_expression(block: &Block, parts: &mut Parts) -> IrNode {
    let mut children = Vec::new();
    let mut first: Option<SourceSpan> = None;
    let mut length = 0usize;

    for child in &block.children {
        match child {
            SyntaxNode::Span(span) if span.generator == SpanGenerator::Expression => {
                if first.is_none() {
                    first = Some(span.source_span());
                }
                length += span.len();
                children.push(IrNode::CSharpToken {
                    content: span.content(),
                    span: Some(span.source_span()),
                });
            }
            SyntaxNode::Block(inner) if matches!(inner.generator, BlockGenerator::Template) => {
                let mut template = Vec::new();
                lower_children(&inner.children, parts, &mut template);
                length += inner.len();
                children.push(IrNode::Template { children: template });
            }
            _ => {}
        }
    }

    let span = first.map(|s| SourceSpan::new(s.location, length));
    IrNode::CSharpExpression { children, span }
}

fn lower_statement(block: &Block, parts: &mut Parts, out: &mut Vec<IrNode>) {
    let mut run: Vec<IrNode> = Vec::new();
    let mut first: Option<SourceSpan> = None;
    let mut run_len = 0usize;

    fn flush(run: &mut Vec<IrNode>, first: &mut Option<SourceSpan>, run_len: &mut usize, out: &mut Vec<IrNode>) {
        if run.is_empty() {
            return;
        }
        let all_whitespace = run.iter().all(|node| match node {
            IrNode::CSharpToken { content, .. } => content.trim().is_empty(),
            _ => false,
        });
        if !all_whitespace {
            let span = first.clone().map(|s| SourceSpan::new(s.location, *run_len));
            out.push(IrNode::CSharpStatement { children: std::mem::take(run), span });
        } else {
            run.clear();
        }
        *first = None;
        *run_len = 0;
    }

    for child in &block.children {
        match child {
            SyntaxNode::Span(span) => {
                if span.generator == SpanGenerator::Statement {
                    if first.is_none() {
                        first = Some(span.source_span());
                    }
                    run_len += span.len();
                    run.push(IrNode::CSharpToken {
                        content: span.content(),
                        span: Some(span.source_span()),
                    });
                }
            }
            SyntaxNode::Block(inner) => {
                if matches!(inner.generator, BlockGenerator::Template) {
                    // Templates sit inline in the statement text
                    let mut template = Vec::new();
                    lower_children(&inner.children, parts, &mut template);
                    run_len += inner.len();
                    run.push(IrNode::Template { children: template });
                } else {
                    flush(&mut run, &mut first, &mut run_len, out);
                    lower_block(inner, parts, out);
                }
            }
        }
    }
    flush(&mut run, &mut first, &mut run_len, out);
}

fn lower_functions(block: &Block, parts: &mut Parts) {
    let mut content = String::new();
    let mut first: Option<SourceSpan> = None;
    for child in &block.children {
        if let SyntaxNode::Span(span) = child {
            if span.generator == SpanGenerator::TypeMember {
                if first.is_none() {
                    first = Some(span.source_span());
                }
                content.push_str(&span.content());
            }
        }
    }
    if !content.trim().is_empty() {
        parts.class_items.push(IrNode::CSharpCode { content, span: first });
    }
}

fn lower_attribute(
    block: &Block,
    name: &str,
    prefix: &str,
    suffix: &str,
    parts: &mut Parts,
) -> IrNode {
    let mut values = Vec::new();
    for child in &block.children {
        match child {
            SyntaxNode::Span(span) => {
                if let SpanGenerator::LiteralAttributeValue { prefix, value } = &span.generator {
                    values.push(IrNode::AttributeValue {
                        prefix: prefix.clone(),
                        literal: true,
                        children: vec![IrNode::HtmlContent {
                            content: value.clone(),
                            span: Some(span.source_span()),
                        }],
                        span: Some(span.source_span()),
                    });
                }
            }
            SyntaxNode::Block(inner) => {
                if let BlockGenerator::DynamicAttributeValue { prefix } = &inner.generator {
                    let mut children = Vec::new();
                    lower_children(&inner.children, parts, &mut children);
                    let span = inner
                        .start()
                        .map(|loc| SourceSpan::new(loc.clone(), inner.len()));
                    values.push(IrNode::AttributeValue {
                        prefix: prefix.clone(),
                        literal: false,
                        children,
                        span,
                    });
                }
            }
        }
    }
    let span = block.start().map(|loc| SourceSpan::new(loc.clone(), block.len()));
    IrNode::ConditionalAttribute {
        name: name.to_string(),
        prefix: prefix.to_string(),
        suffix: suffix.to_string(),
        values,
        span,
    }
}

fn lower_directive(block: &Block, name: &str, parts: &mut Parts, out: &mut Vec<IrNode>) {
    if name == "using" {
        for child in &block.children {
            if let SyntaxNode::Span(span) = child {
                if let SpanGenerator::UsingImport { namespace } = &span.generator {
                    parts.usings.push(IrNode::UsingDirective {
                        namespace: namespace.clone(),
                        span: Some(span.source_span()),
                    });
                }
            }
        }
        return;
    }
    let mut tokens = Vec::new();
    for child in &block.children {
        if let SyntaxNode::Span(span) = child {
            if span.generator == SpanGenerator::DirectiveToken {
                tokens.push(IrNode::DirectiveToken {
                    content: span.content(),
                    span: Some(span.source_span()),
                });
            }
        }
    }
    let span = block.start().map(|loc| SourceSpan::new(loc.clone(), block.len()));
    out.push(IrNode::Directive { name: name.to_string(), tokens, span });
}
