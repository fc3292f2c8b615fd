//! Instrumentation (run-time mode only).
//!
//! Wraps every HTML-content run and rendered expression in begin/end
//! markers carrying the node's absolute source offset and length, so the
//! runtime can trace execution back to source positions.

use super::IrPass;
use crate::ir::{IrDocument, IrNode};

pub struct InstrumentationPass;

impl IrPass for InstrumentationPass {
    fn run(&self, doc: &mut IrDocument) {
        if let Some(children) = doc.method_children_mut() {
            let body = std::mem::take(children);
            *children = instrument(body);
        }
    }
}

fn instrument(children: Vec<IrNode>) -> Vec<IrNode> {
    let mut out = Vec::with_capacity(children.len());
    for node in children {
        match node {
            IrNode::HtmlContent { content, span: Some(span) } => {
                out.push(IrNode::BeginContext {
                    offset: span.location.offset,
                    length: span.length,
                    is_literal: true,
                });
                out.push(IrNode::HtmlContent { content, span: Some(span) });
                out.push(IrNode::EndContext);
            }
            IrNode::CSharpExpression { children, span: Some(span) } => {
                out.push(IrNode::BeginContext {
                    offset: span.location.offset,
                    length: span.length,
                    is_literal: false,
                });
                out.push(IrNode::CSharpExpression { children, span: Some(span) });
                out.push(IrNode::EndContext);
            }
            IrNode::Section { name, children } => {
                out.push(IrNode::Section { name, children: instrument(children) });
            }
            IrNode::Template { children } => {
                out.push(IrNode::Template { children: instrument(children) });
            }
            IrNode::TagHelper { tag_name, mode, behavior, children } => {
                let children = children
                    .into_iter()
                    .map(|c| match c {
                        IrNode::TagHelperBody { children } => {
                            IrNode::TagHelperBody { children: instrument(children) }
                        }
                        other => other,
                    })
                    .collect();
                out.push(IrNode::TagHelper { tag_name, mode, behavior, children });
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::GenerateOptions;
    use crate::ir::lower;
    use crate::parser;
    use crate::rewrite;

    #[test]
    fn test_wraps_content_and_expressions() {
        let source = "<p>@Name</p>";
        let outcome = parser::parse(source, None, false, None).unwrap();
        let rewriters = rewrite::standard_rewriters();
        let tree = rewrite::apply_all(&rewriters, outcome.tree);
        let mut doc = lower(&tree, &GenerateOptions::default());
        InstrumentationPass.run(&mut doc);

        let body = doc.method_children().unwrap();
        // <p> / @Name / </p> each wrapped
        let begins: Vec<(usize, usize, bool)> = body
            .iter()
            .filter_map(|n| match n {
                IrNode::BeginContext { offset, length, is_literal } => {
                    Some((*offset, *length, *is_literal))
                }
                _ => None,
            })
            .collect();
        assert_eq!(begins.len(), 3);
        assert_eq!(begins[0], (0, 3, true)); // <p>
        assert_eq!(begins[1], (4, 4, false)); // Name
        assert_eq!(begins[2], (8, 4, true)); // </p>
        let ends = body.iter().filter(|n| matches!(n, IrNode::EndContext)).count();
        assert_eq!(ends, 3);
    }

    #[test]
    fn test_statements_not_wrapped() {
        let source = "@{ var x = 1; }";
        let outcome = parser::parse(source, None, false, None).unwrap();
        let rewriters = rewrite::standard_rewriters();
        let tree = rewrite::apply_all(&rewriters, outcome.tree);
        let mut doc = lower(&tree, &GenerateOptions::default());
        InstrumentationPass.run(&mut doc);
        let body = doc.method_children().unwrap();
        assert!(body.iter().all(|n| !matches!(n, IrNode::BeginContext { .. })));
    }
}
