//! C# emission.
//!
//! One depth-first walk over the IR. Consecutive literal runs batch into
//! `WriteLiteral` calls (split at a fixed chunk size); expressions and
//! statements are wrapped in `#line` pragma pairs and padded to their
//! source column when debug-line emission is on.

use super::writer::{escape_literal, CSharpWriter};
use super::{GenerateOptions, GenerateResult};
use crate::ir::{IrDocument, IrNode};
use crate::source::SourceSpan;

/// Longest single literal passed to one `WriteLiteral` call, in characters
const MAX_LITERAL_CHUNK: usize = 1024;

pub struct CSharpGenerator;

impl CSharpGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Emit the document. `checksum` is the hex digest of the raw source,
    /// already computed by the caller.
    pub fn generate(
        &self,
        doc: &IrDocument,
        checksum: Option<String>,
        options: &GenerateOptions,
    ) -> GenerateResult {
        let file_label = options
            .file_path
            .clone()
            .unwrap_or_else(|| format!("{}.quill", options.class_name));

        let mut state = GenState {
            w: CSharpWriter::new(options.emit_line_pragmas, file_label.clone()),
            model: doc.model.clone(),
            helper_scope_counter: 0,
        };

        if options.include_checksum {
            if let Some(sum) = checksum {
                state.w.raw(&format!(
                    "#pragma checksum \"{}\" \"{{ff1816ec-aa5e-4d10-87f7-6f4963833460}}\" \"{}\"\n",
                    file_label, sum
                ));
            }
        }
        state.w.line("// <auto-generated/>");
        state.emit_node(&doc.root);

        let (code, mappings) = state.w.finish();
        GenerateResult { code, mappings }
    }
}

impl Default for CSharpGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct GenState {
    pub(crate) w: CSharpWriter,
    model: Option<String>,
    pub(crate) helper_scope_counter: usize,
}

impl GenState {
    pub(crate) fn emit_node(&mut self, node: &IrNode) {
        match node {
            IrNode::Document { children } => {
                for child in children {
                    self.emit_node(child);
                }
            }
            IrNode::Namespace { name, children } => {
                self.w.line(&format!("namespace {}", name));
                self.w.open_brace();
                self.w.line("using System;");
                self.w.line("using System.Threading.Tasks;");
                for child in children {
                    if matches!(child, IrNode::UsingDirective { .. }) {
                        self.emit_node(child);
                    }
                }
                for child in children {
                    if !matches!(child, IrNode::UsingDirective { .. }) {
                        self.emit_node(child);
                    }
                }
                self.w.close_brace();
            }
            IrNode::UsingDirective { namespace, span } => {
                self.w.write_indent();
                let text = format!("using {};", namespace);
                let off = self.w.offset();
                self.w.raw(&text);
                if let Some(span) = span {
                    self.w.map(off, text.len(), span);
                }
                self.w.raw("\n");
            }
            IrNode::Class { name, base_type, children } => {
                let base = match &self.model {
                    Some(model) => format!("{}<{}>", base_type, model),
                    None => base_type.clone(),
                };
                self.w.line("");
                self.w.line(&format!("public class {} : {}", name, base));
                self.w.open_brace();
                for child in children {
                    self.emit_node(child);
                }
                self.w.close_brace();
            }
            IrNode::Method { children } => {
                self.w.line_hidden();
                self.w.line("public override async Task ExecuteAsync()");
                self.w.open_brace();
                self.emit_body(children);
                self.w.close_brace();
            }
            IrNode::CSharpCode { content, span } => {
                if let (true, Some(span)) = (self.w.pragmas(), span.as_ref()) {
                    self.w.line_pragma(span);
                    let off = self.w.offset();
                    self.w.raw(content);
                    self.w.map(off, content.len(), span);
                    if !content.ends_with('\n') {
                        self.w.raw("\n");
                    }
                    self.w.line_default();
                } else {
                    for code_line in content.trim_matches('\n').lines() {
                        self.w.line(code_line.trim_end());
                    }
                }
            }
            IrNode::HelperMethod { signature, children } => {
                self.w.line("");
                self.w
                    .line(&format!("public static Quill.Runtime.TemplateResult {}", signature));
                self.w.open_brace();
                self.w.line("return new Quill.Runtime.TemplateResult(async (__writer) =>");
                self.w.open_brace();
                self.w.line("PushWriter(__writer);");
                self.emit_body(children);
                self.w.line("PopWriter();");
                self.w.close_brace();
                self.w.line(");");
                self.w.close_brace();
            }
            IrNode::Section { name, children } => {
                self.w.line(&format!("DefineSection(\"{}\", async () =>", name));
                self.w.open_brace();
                self.emit_body(children);
                self.w.close_brace();
                self.w.line(");");
            }
            IrNode::HtmlContent { content, .. } => self.emit_literal(content),
            IrNode::CSharpExpression { children, span } => {
                self.emit_expression(children, span.as_ref());
            }
            IrNode::CSharpStatement { children, span } => {
                self.emit_statement(children, span.as_ref());
            }
            IrNode::ConditionalAttribute { name, prefix, suffix, values, span } => {
                self.emit_conditional_attribute(name, prefix, suffix, values, span.as_ref());
            }
            IrNode::TagHelper { tag_name, mode, behavior, children } => {
                self.emit_tag_helper(tag_name, *mode, *behavior, children);
            }
            IrNode::BeginContext { offset, length, is_literal } => {
                self.w
                    .line(&format!("BeginContext({}, {}, {});", offset, length, is_literal));
            }
            IrNode::EndContext => self.w.line("EndContext();"),
            IrNode::Template { children } => {
                // A template only renders as a value; standalone it becomes
                // an expression write
                let text = self.template_text(children);
                self.w.line(&format!("Write({});", text));
            }
            // Consumed by their parents or by earlier passes
            IrNode::Directive { .. }
            | IrNode::DirectiveToken { .. }
            | IrNode::CSharpToken { .. }
            | IrNode::AttributeValue { .. }
            | IrNode::CreateTagHelper { .. }
            | IrNode::SetProperty { .. }
            | IrNode::TagHelperAttribute { .. }
            | IrNode::TagHelperBody { .. }
            | IrNode::ExecuteTagHelpers => {}
        }
    }

    /// Emit a method-body run, batching consecutive literal content
    pub(crate) fn emit_body(&mut self, children: &[IrNode]) {
        let mut i = 0;
        while i < children.len() {
            if matches!(children[i], IrNode::HtmlContent { .. }) {
                let mut text = String::new();
                while i < children.len() {
                    match &children[i] {
                        IrNode::HtmlContent { content, .. } => {
                            text.push_str(content);
                            i += 1;
                        }
                        _ => break,
                    }
                }
                self.emit_literal(&text);
            } else {
                self.emit_node(&children[i]);
                i += 1;
            }
        }
    }

    /// `WriteLiteral` calls, splitting oversized literals into chunks
    pub(crate) fn emit_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(MAX_LITERAL_CHUNK) {
            let piece: String = chunk.iter().collect();
            self.w
                .line(&format!("WriteLiteral(\"{}\");", escape_literal(&piece)));
        }
    }

    /// Flatten expression children (tokens and inline templates) to text
    pub(crate) fn expression_text(&mut self, children: &[IrNode]) -> String {
        let mut out = String::new();
        for child in children {
            match child {
                IrNode::CSharpToken { content, .. } => out.push_str(content),
                IrNode::Template { children } => out.push_str(&self.template_text(children)),
                _ => {}
            }
        }
        out
    }

    /// Render an inline template as a lambda-valued expression
    fn template_text(&mut self, children: &[IrNode]) -> String {
        let label = self.w.file_label().to_string();
        let nested = CSharpWriter::new(false, label);
        let outer = std::mem::replace(&mut self.w, nested);

        self.w.raw("item => new Quill.Runtime.TemplateResult(async (__writer) =>\n");
        self.w.open_brace();
        self.w.line("PushWriter(__writer);");
        self.emit_body(children);
        self.w.line("PopWriter();");
        self.w.pop_indent();
        self.w.write_indent();
        self.w.raw("})");

        let nested = std::mem::replace(&mut self.w, outer);
        let (text, _) = nested.finish();
        text
    }

    fn emit_expression(&mut self, children: &[IrNode], span: Option<&SourceSpan>) {
        let expr = self.expression_text(children);
        if expr.trim().is_empty() {
            return;
        }
        match span {
            Some(span) if self.w.pragmas() => {
                self.w.line_pragma(span);
                // Padding lines the expression up with its source column
                let pad = span.location.col.saturating_sub("Write(".len());
                self.w.raw(&" ".repeat(pad));
                self.w.raw("Write(");
                let off = self.w.offset();
                self.w.raw(&expr);
                self.w.map(off, expr.len(), span);
                self.w.raw(");");
                self.w.line_default();
            }
            _ => {
                self.w.write_indent();
                self.w.raw("Write(");
                let off = self.w.offset();
                self.w.raw(&expr);
                if let Some(span) = span {
                    self.w.map(off, expr.len(), span);
                }
                self.w.raw(");\n");
            }
        }
    }

    fn emit_statement(&mut self, children: &[IrNode], span: Option<&SourceSpan>) {
        let text = self.expression_text(children);
        if text.trim().is_empty() {
            return;
        }
        match span {
            Some(span) if self.w.pragmas() => {
                self.w.line_pragma(span);
                self.w.raw(&" ".repeat(span.location.col));
                let off = self.w.offset();
                self.w.raw(&text);
                self.w.map(off, text.len(), span);
                if !text.ends_with('\n') {
                    self.w.raw("\n");
                }
                self.w.line_default();
            }
            _ => {
                self.w.write_indent();
                let off = self.w.offset();
                self.w.raw(text.trim());
                if let Some(span) = span {
                    self.w.map(off, text.trim().len(), span);
                }
                self.w.raw("\n");
            }
        }
    }

    fn emit_conditional_attribute(
        &mut self,
        name: &str,
        prefix: &str,
        suffix: &str,
        values: &[IrNode],
        span: Option<&SourceSpan>,
    ) {
        let prefix_offset = span.map(|s| s.location.offset).unwrap_or(0);
        let suffix_offset = span
            .map(|s| s.end_offset().saturating_sub(suffix.len()))
            .unwrap_or(0);
        self.w.line(&format!(
            "BeginWriteAttribute(\"{}\", \"{}\", {}, \"{}\", {}, {});",
            name,
            escape_literal(prefix),
            prefix_offset,
            escape_literal(suffix),
            suffix_offset,
            values.len()
        ));
        for value in values {
            let IrNode::AttributeValue { prefix, literal, children, span } = value else {
                continue;
            };
            let value_offset = span.as_ref().map(|s| s.location.offset).unwrap_or(0);
            let value_length = span.as_ref().map(|s| s.length).unwrap_or(0);
            if *literal {
                let text: String = children
                    .iter()
                    .filter_map(|c| match c {
                        IrNode::HtmlContent { content, .. } => Some(content.as_str()),
                        _ => None,
                    })
                    .collect();
                self.w.line(&format!(
                    "WriteAttributeValue(\"{}\", {}, \"{}\", {}, {}, true);",
                    escape_literal(prefix),
                    value_offset,
                    escape_literal(&text),
                    value_offset,
                    value_length
                ));
            } else {
                let mut expr = String::new();
                for child in children {
                    if let IrNode::CSharpExpression { children, .. } = child {
                        expr.push_str(&self.expression_text(children));
                    }
                }
                self.w.write_indent();
                self.w.raw(&format!(
                    "WriteAttributeValue(\"{}\", {}, ",
                    escape_literal(prefix),
                    value_offset
                ));
                let off = self.w.offset();
                self.w.raw(&expr);
                if let Some(span) = span {
                    self.w.map(off, expr.len(), span);
                }
                self.w
                    .raw(&format!(", {}, {}, false);\n", value_offset, value_length));
            }
        }
        self.w.line("EndWriteAttribute();");
    }
}
