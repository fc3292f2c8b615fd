//! Tag helper emission.
//!
//! Renders a TagHelper subtree according to its content behavior:
//!
//! - non-Modify: create, bind, execute, start tag, (Prepend: content),
//!   body unless Replace, (Append/Replace: content), end tag;
//! - Modify: create, bind, buffer the body in a try/finally writing scope,
//!   execute with the buffered body, then start tag / content / end tag.
//!
//! Attribute values are computed at most once per element: only the first
//! SetProperty for an attribute evaluates; later ones read the accessor.

use super::csharp::GenState;
use crate::descriptor::ContentBehavior;
use crate::ir::{IrNode, TagMode};

impl GenState {
    pub(crate) fn emit_tag_helper(
        &mut self,
        tag_name: &str,
        mode: TagMode,
        behavior: ContentBehavior,
        children: &[IrNode],
    ) {
        let n = self.helper_scope_counter;
        self.helper_scope_counter += 1;
        let ctx = format!("__tagHelperContext_{}", n);
        let mode_name = match mode {
            TagMode::StartTagAndEndTag => "StartTagAndEndTag",
            TagMode::SelfClosing => "SelfClosing",
        };
        self.w.line(&format!(
            "var {} = __tagHelperScopeManager.Begin(\"{}\", TagMode.{});",
            ctx, tag_name, mode_name
        ));

        // Create one helper instance per matched descriptor
        let mut helper_vars = Vec::new();
        for child in children {
            if let IrNode::CreateTagHelper { type_name } = child {
                let var = format!("__helper_{}_{}", n, helper_vars.len());
                self.w
                    .line(&format!("var {} = CreateTagHelper<global::{}>();", var, type_name));
                self.w.line(&format!("{}.Add({});", ctx, var));
                helper_vars.push(var);
            }
        }

        // Bind attributes in source order
        let mut html_attr_counter = 0usize;
        for child in children {
            match child {
                IrNode::SetProperty {
                    attribute_name,
                    property_name,
                    helper_index,
                    literal_value,
                    value,
                    accessor_index,
                    first_evaluation,
                    ..
                } => {
                    let var = helper_vars[*helper_index].clone();
                    match literal_value {
                        Some(literal) => {
                            self.w.line(&format!("{}.{} = {};", var, property_name, literal));
                        }
                        None => {
                            let accessor = format!("__tagHelperAttrValue_{}", accessor_index);
                            if *first_evaluation {
                                self.emit_buffered_scope(&accessor, value);
                            }
                            self.w
                                .line(&format!("{}.{} = {};", var, property_name, accessor));
                        }
                    }
                    self.w.line(&format!(
                        "{}.AddTagHelperAttribute(\"{}\", {}.{});",
                        ctx, attribute_name, var, property_name
                    ));
                }
                IrNode::TagHelperAttribute { name, value } => {
                    let literal_text = literal_only_text(value);
                    match literal_text {
                        Some(text) => {
                            self.w.line(&format!(
                                "{}.AddHtmlAttribute(\"{}\", \"{}\");",
                                ctx,
                                name,
                                super::writer::escape_literal(&text)
                            ));
                        }
                        None => {
                            let buf = format!("__tagHelperHtmlAttrValue_{}_{}", n, html_attr_counter);
                            html_attr_counter += 1;
                            self.emit_buffered_scope(&buf, value);
                            self.w
                                .line(&format!("{}.AddHtmlAttribute(\"{}\", {});", ctx, name, buf));
                        }
                    }
                }
                _ => {}
            }
        }

        let empty: Vec<IrNode> = Vec::new();
        let body = children
            .iter()
            .find_map(|c| match c {
                IrNode::TagHelperBody { children } => Some(children),
                _ => None,
            })
            .unwrap_or(&empty);

        match behavior {
            ContentBehavior::Modify => {
                // The body is captured, never streamed; execution receives it
                let buffer = format!("__tagHelperStringValueBuffer_{}", n);
                self.w.line(&format!("string {} = null;", buffer));
                self.w.line("StartTagHelperWritingScope();");
                self.w.line("try");
                self.w.open_brace();
                self.emit_body(body);
                self.w.close_brace();
                self.w.line("finally");
                self.w.open_brace();
                self.w
                    .line(&format!("{} = EndTagHelperWritingScope();", buffer));
                self.w.close_brace();
                self.w
                    .line(&format!("await {}.ExecuteAsync({});", ctx, buffer));
                self.w.line(&format!("WriteTagHelperStart({});", ctx));
                self.w.line(&format!("WriteTagHelperContent({});", ctx));
                self.w.line(&format!("WriteTagHelperEnd({});", ctx));
            }
            _ => {
                self.w.line(&format!("await {}.ExecuteAsync();", ctx));
                self.w.line(&format!("WriteTagHelperStart({});", ctx));
                if behavior == ContentBehavior::Prepend {
                    self.w.line(&format!("WriteTagHelperContent({});", ctx));
                }
                if behavior != ContentBehavior::Replace {
                    self.emit_body(body);
                }
                if matches!(behavior, ContentBehavior::Append | ContentBehavior::Replace) {
                    self.w.line(&format!("WriteTagHelperContent({});", ctx));
                }
                self.w.line(&format!("WriteTagHelperEnd({});", ctx));
            }
        }
        self.w.line("__tagHelperScopeManager.End();");
    }

    /// `try { write fragments } finally { var = EndWritingScope(); }`
    fn emit_buffered_scope(&mut self, var: &str, fragments: &[IrNode]) {
        self.w.line(&format!("string {} = null;", var));
        self.w.line("StartWritingScope();");
        self.w.line("try");
        self.w.open_brace();
        self.emit_attribute_fragments(fragments);
        self.w.close_brace();
        self.w.line("finally");
        self.w.open_brace();
        self.w.line(&format!("{} = EndWritingScope();", var));
        self.w.close_brace();
    }

    /// AttributeValue fragments inside a buffering scope
    fn emit_attribute_fragments(&mut self, fragments: &[IrNode]) {
        for node in fragments {
            match node {
                IrNode::AttributeValue { prefix, literal, children, .. } => {
                    if !prefix.is_empty() {
                        self.emit_literal(prefix);
                    }
                    if *literal {
                        for child in children {
                            if let IrNode::HtmlContent { content, .. } = child {
                                self.emit_literal(content);
                            }
                        }
                    } else {
                        for child in children {
                            self.emit_node(child);
                        }
                    }
                }
                other => self.emit_node(other),
            }
        }
    }
}

/// The joined text of fragments that are all literal, or None
fn literal_only_text(fragments: &[IrNode]) -> Option<String> {
    let mut out = String::new();
    for node in fragments {
        match node {
            IrNode::AttributeValue { prefix, literal: true, children, .. } => {
                out.push_str(prefix);
                for child in children {
                    match child {
                        IrNode::HtmlContent { content, .. } => out.push_str(content),
                        _ => return None,
                    }
                }
            }
            IrNode::HtmlContent { content, .. } => out.push_str(content),
            _ => return None,
        }
    }
    Some(out)
}
