//! Intermediate representation.
//!
//! The lowered, generation-ready tree: document/namespace/class/method
//! scaffolding around content runs, code runs, attributes, and tag helper
//! subtrees. Nodes own their children; a node optionally carries the source
//! span that produced it, which is what the source map is built from. The
//! syntax tree is discarded once lowering completes.

mod lower;
pub mod passes;

pub use lower::lower;

use crate::descriptor::ContentBehavior;
use crate::error::ParseError;
use crate::source::SourceSpan;

/// Classified document kind; downstream passes query this
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentKind {
    #[default]
    View,
    Page,
}

/// How a tag helper element was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    StartTagAndEndTag,
    SelfClosing,
}

/// One node of the lowered tree
#[derive(Debug, Clone, PartialEq)]
pub enum IrNode {
    Document { children: Vec<IrNode> },
    Namespace { name: String, children: Vec<IrNode> },
    Class { name: String, base_type: String, children: Vec<IrNode> },
    /// The template's execute method body
    Method { children: Vec<IrNode> },
    UsingDirective { namespace: String, span: Option<SourceSpan> },
    /// A non-import directive with its ordered tokens; consumed by passes,
    /// not emitted
    Directive { name: String, tokens: Vec<IrNode>, span: Option<SourceSpan> },
    DirectiveToken { content: String, span: Option<SourceSpan> },
    /// Literal markup to write out
    HtmlContent { content: String, span: Option<SourceSpan> },
    /// Rendered expression; children are CSharpToken / Template
    CSharpExpression { children: Vec<IrNode>, span: Option<SourceSpan> },
    /// Executed statement run; children are CSharpToken / Template
    CSharpStatement { children: Vec<IrNode>, span: Option<SourceSpan> },
    CSharpToken { content: String, span: Option<SourceSpan> },
    /// Class-level verbatim code (`@functions` content)
    CSharpCode { content: String, span: Option<SourceSpan> },
    /// Class-level markup method (`@helper`)
    HelperMethod { signature: String, children: Vec<IrNode> },
    Section { name: String, children: Vec<IrNode> },
    /// Inline template expression value
    Template { children: Vec<IrNode> },
    /// Attribute with at least one dynamic value fragment
    ConditionalAttribute {
        name: String,
        prefix: String,
        suffix: String,
        values: Vec<IrNode>,
        span: Option<SourceSpan>,
    },
    /// One value fragment of a conditional attribute
    AttributeValue {
        prefix: String,
        literal: bool,
        children: Vec<IrNode>,
        span: Option<SourceSpan>,
    },
    /// A matched structured-attribute element. Children are, in order:
    /// CreateTagHelper (one per descriptor), SetProperty / TagHelperAttribute
    /// (source attribute order), TagHelperBody, and a terminal
    /// ExecuteTagHelpers.
    TagHelper {
        tag_name: String,
        mode: TagMode,
        behavior: ContentBehavior,
        children: Vec<IrNode>,
    },
    CreateTagHelper { type_name: String },
    SetProperty {
        attribute_name: String,
        property_name: String,
        /// Index of the helper instance this assignment targets
        helper_index: usize,
        /// Plain literal text value, assigned directly
        literal_value: Option<String>,
        /// Non-literal value fragments, buffered before assignment
        value: Vec<IrNode>,
        /// Shared accessor slot; values are computed at most once per element
        accessor_index: usize,
        /// Whether this assignment performs the evaluation or reuses it
        first_evaluation: bool,
        span: Option<SourceSpan>,
    },
    /// Unbound attribute on a tag helper element, passed through to output
    TagHelperAttribute { name: String, value: Vec<IrNode> },
    TagHelperBody { children: Vec<IrNode> },
    ExecuteTagHelpers,
    /// Instrumentation markers (run-time mode only)
    BeginContext { offset: usize, length: usize, is_literal: bool },
    EndContext,
}

impl IrNode {
    pub fn span(&self) -> Option<&SourceSpan> {
        match self {
            IrNode::UsingDirective { span, .. }
            | IrNode::Directive { span, .. }
            | IrNode::DirectiveToken { span, .. }
            | IrNode::HtmlContent { span, .. }
            | IrNode::CSharpExpression { span, .. }
            | IrNode::CSharpStatement { span, .. }
            | IrNode::CSharpToken { span, .. }
            | IrNode::CSharpCode { span, .. }
            | IrNode::ConditionalAttribute { span, .. }
            | IrNode::AttributeValue { span, .. }
            | IrNode::SetProperty { span, .. } => span.as_ref(),
            _ => None,
        }
    }
}

/// The lowered document plus everything the passes learn about it
#[derive(Debug, Clone, PartialEq)]
pub struct IrDocument {
    pub root: IrNode,
    pub kind: DocumentKind,
    /// Declared model type (`@model`), if any
    pub model: Option<String>,
    /// Lowering/validation diagnostics (parse errors stay with the parse)
    pub diagnostics: Vec<ParseError>,
}

impl IrDocument {
    /// The class body (mutable), if the scaffold is intact
    pub fn class_children_mut(&mut self) -> Option<&mut Vec<IrNode>> {
        let IrNode::Document { children } = &mut self.root else { return None };
        let namespace = children.iter_mut().find_map(|c| match c {
            IrNode::Namespace { children, .. } => Some(children),
            _ => None,
        })?;
        namespace.iter_mut().find_map(|c| match c {
            IrNode::Class { children, .. } => Some(children),
            _ => None,
        })
    }

    /// The execute method body (mutable)
    pub fn method_children_mut(&mut self) -> Option<&mut Vec<IrNode>> {
        self.class_children_mut()?.iter_mut().find_map(|c| match c {
            IrNode::Method { children } => Some(children),
            _ => None,
        })
    }

    pub fn method_children(&self) -> Option<&Vec<IrNode>> {
        let IrNode::Document { children } = &self.root else { return None };
        let namespace = children.iter().find_map(|c| match c {
            IrNode::Namespace { children, .. } => Some(children),
            _ => None,
        })?;
        let class = namespace.iter().find_map(|c| match c {
            IrNode::Class { children, .. } => Some(children),
            _ => None,
        })?;
        class.iter().find_map(|c| match c {
            IrNode::Method { children } => Some(children),
            _ => None,
        })
    }

    /// Every directive node in the tree, in document order
    pub fn directives(&self) -> Vec<(&str, Vec<&str>)> {
        let mut out = Vec::new();
        collect_directives(&self.root, &mut out);
        out
    }
}

fn collect_directives<'a>(node: &'a IrNode, out: &mut Vec<(&'a str, Vec<&'a str>)>) {
    if let IrNode::Directive { name, tokens, .. } = node {
        let token_texts = tokens
            .iter()
            .filter_map(|t| match t {
                IrNode::DirectiveToken { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        out.push((name.as_str(), token_texts));
    }
    for child in node_children(node) {
        collect_directives(child, out);
    }
}

/// Shared read access to any node's children
pub fn node_children(node: &IrNode) -> &[IrNode] {
    match node {
        IrNode::Document { children }
        | IrNode::Namespace { children, .. }
        | IrNode::Class { children, .. }
        | IrNode::Method { children }
        | IrNode::CSharpExpression { children, .. }
        | IrNode::CSharpStatement { children, .. }
        | IrNode::HelperMethod { children, .. }
        | IrNode::Section { children, .. }
        | IrNode::Template { children }
        | IrNode::TagHelper { children, .. }
        | IrNode::TagHelperBody { children }
        | IrNode::AttributeValue { children, .. } => children,
        IrNode::Directive { tokens, .. } => tokens,
        IrNode::ConditionalAttribute { values, .. } => values,
        IrNode::TagHelperAttribute { value, .. } => value,
        IrNode::SetProperty { value, .. } => value,
        _ => &[],
    }
}
