//! Tag helper binding.
//!
//! Matches elements in the lowered content against the supplied descriptor
//! set and replaces each match (start tag, attributes, body, end tag)
//! with a TagHelper subtree: one CreateTagHelper per matching descriptor,
//! SetProperty children in source attribute order, unbound attributes as
//! pass-through HtmlAttribute children, the body, and a terminal
//! ExecuteTagHelpers. Attribute values are evaluated at most once per
//! element: a second descriptor bound to the same attribute reuses the
//! first's accessor.

use std::collections::{HashMap, VecDeque};

use super::IrPass;
use crate::codegen::writer::escape_literal;
use crate::descriptor::{ContentBehavior, TagHelperDescriptor};
use crate::error::{ErrorKind, ParseError};
use crate::html;
use crate::ir::{IrDocument, IrNode, TagMode};
use crate::source::{SourceLocation, SourceSpan};

pub struct TagHelperPass {
    descriptors: Vec<TagHelperDescriptor>,
}

impl TagHelperPass {
    pub fn new(descriptors: Vec<TagHelperDescriptor>) -> Self {
        Self { descriptors }
    }
}

impl IrPass for TagHelperPass {
    fn run(&self, doc: &mut IrDocument) {
        if self.descriptors.is_empty() {
            return;
        }
        let Some(children) = doc.method_children_mut() else { return };
        let body = std::mem::take(children);
        let mut rewriter = Rewriter {
            descriptors: &self.descriptors,
            accessor_counter: 0,
            diagnostics: Vec::new(),
        };
        *children = rewriter.rewrite_sequence(body, &mut Vec::new());
        doc.diagnostics.append(&mut rewriter.diagnostics);
    }
}

/// One source attribute of a candidate element
#[derive(Debug, Clone)]
struct ElementAttr {
    name: String,
    value: AttrValue,
}

#[derive(Debug, Clone)]
enum AttrValue {
    /// Plain literal text
    Literal(String),
    /// Value-less (boolean) attribute
    Bare,
    /// AttributeValue fragments from a ConditionalAttribute node
    Dynamic(Vec<IrNode>),
}

struct Rewriter<'d> {
    descriptors: &'d [TagHelperDescriptor],
    accessor_counter: usize,
    diagnostics: Vec<ParseError>,
}

impl<'d> Rewriter<'d> {
    fn rewrite_sequence(&mut self, nodes: Vec<IrNode>, parents: &mut Vec<String>) -> Vec<IrNode> {
        let mut queue: VecDeque<IrNode> = nodes.into();
        let mut out = Vec::new();
        while let Some(node) = queue.pop_front() {
            match node {
                IrNode::HtmlContent { content, span } => {
                    self.scan_text(content, span, &mut queue, &mut out, parents);
                }
                IrNode::Section { name, children } => {
                    let children = self.rewrite_sequence(children, &mut Vec::new());
                    out.push(IrNode::Section { name, children });
                }
                IrNode::Template { children } => {
                    let children = self.rewrite_sequence(children, &mut Vec::new());
                    out.push(IrNode::Template { children });
                }
                other => out.push(other),
            }
        }
        out
    }

    fn matching(&self, tag: &str, parent: Option<&String>, attrs: &[String]) -> Vec<usize> {
        self.descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.matches(tag, parent.map(|s| s.as_str()), attrs))
            .map(|(i, _)| i)
            .collect()
    }

    /// Scan one literal content run for element starts. Non-matching tags
    /// only move the parent stack; a match splits the run and consumes the
    /// element.
    fn scan_text(
        &mut self,
        content: String,
        span: Option<SourceSpan>,
        queue: &mut VecDeque<IrNode>,
        out: &mut Vec<IrNode>,
        parents: &mut Vec<String>,
    ) {
        let mut cursor = 0usize;
        while let Some(event) = find_tag(&content[cursor..]) {
            match event {
                TagEvent::Close { name, end, .. } => {
                    if let Some(pos) = parents.iter().rposition(|p| p.eq_ignore_ascii_case(&name)) {
                        parents.truncate(pos);
                    }
                    cursor += end;
                }
                TagEvent::Open { start, name, name_end } => {
                    let tag_start = cursor + start;
                    let area_start = cursor + name_end;
                    let area = parse_attr_area(&content[area_start..]);
                    let is_void = html::is_void_element(&name);
                    match area.end {
                        Some((area_end, self_closing)) => {
                            let tag_end = area_start + area_end;
                            let attr_names: Vec<String> =
                                area.attrs.iter().map(|(n, _)| n.clone()).collect();
                            let matched = self.matching(&name, parents.last(), &attr_names);
                            if matched.is_empty() {
                                if !self_closing && !is_void {
                                    parents.push(name);
                                }
                                cursor = tag_end;
                            } else {
                                if tag_start > 0 {
                                    out.push(IrNode::HtmlContent {
                                        content: content[..tag_start].to_string(),
                                        span: slice_span(&span, &content, 0, tag_start),
                                    });
                                }
                                let attrs = area
                                    .attrs
                                    .into_iter()
                                    .map(|(n, v)| ElementAttr {
                                        name: n,
                                        value: v.map(AttrValue::Literal).unwrap_or(AttrValue::Bare),
                                    })
                                    .collect();
                                let tail = content[tag_end..].to_string();
                                let tail_span = slice_span(&span, &content, tag_end, content.len());
                                let helper = self.consume_element(
                                    &name,
                                    matched,
                                    attrs,
                                    self_closing || is_void,
                                    tail,
                                    tail_span,
                                    queue,
                                    parents,
                                );
                                out.push(helper);
                                return;
                            }
                        }
                        None => {
                            // The start tag continues into the following
                            // nodes (dynamic attributes)
                            let Some(cont) = self.collect_continuation(queue) else {
                                out.push(IrNode::HtmlContent { content, span });
                                return;
                            };
                            let mut attrs: Vec<ElementAttr> = area
                                .attrs
                                .into_iter()
                                .map(|(n, v)| ElementAttr {
                                    name: n,
                                    value: v.map(AttrValue::Literal).unwrap_or(AttrValue::Bare),
                                })
                                .collect();
                            attrs.extend(cont.attrs);
                            let attr_names: Vec<String> =
                                attrs.iter().map(|a| a.name.clone()).collect();
                            let matched = self.matching(&name, parents.last(), &attr_names);
                            if matched.is_empty() {
                                if !cont.self_closing && !is_void {
                                    parents.push(name);
                                }
                                out.push(IrNode::HtmlContent { content, span });
                                return;
                            }
                            if tag_start > 0 {
                                out.push(IrNode::HtmlContent {
                                    content: content[..tag_start].to_string(),
                                    span: slice_span(&span, &content, 0, tag_start),
                                });
                            }
                            // Consume the attribute-area nodes
                            for _ in 0..cont.consumed {
                                queue.pop_front();
                            }
                            let (tail, tail_span) = cont.tail.unwrap_or_default();
                            let helper = self.consume_element(
                                &name,
                                matched,
                                attrs,
                                cont.self_closing || is_void,
                                tail,
                                tail_span,
                                queue,
                                parents,
                            );
                            out.push(helper);
                            return;
                        }
                    }
                }
            }
        }
        out.push(IrNode::HtmlContent { content, span });
    }

    /// Peek past a split start tag: ConditionalAttribute nodes and literal
    /// continuations until the run that carries the closing `>`
    fn collect_continuation(&self, queue: &VecDeque<IrNode>) -> Option<Continuation> {
        let mut attrs = Vec::new();
        for k in 0..queue.len() {
            match queue.get(k)? {
                IrNode::ConditionalAttribute { name, values, .. } => {
                    attrs.push(ElementAttr {
                        name: name.clone(),
                        value: AttrValue::Dynamic(values.clone()),
                    });
                }
                IrNode::HtmlContent { content, span } => {
                    let area = parse_attr_area(content);
                    for (n, v) in area.attrs {
                        attrs.push(ElementAttr {
                            name: n,
                            value: v.map(AttrValue::Literal).unwrap_or(AttrValue::Bare),
                        });
                    }
                    if let Some((end, self_closing)) = area.end {
                        let tail_text = content[end..].to_string();
                        let tail = if tail_text.is_empty() {
                            None
                        } else {
                            Some((tail_text, slice_span(span, content, end, content.len())))
                        };
                        return Some(Continuation { attrs, consumed: k + 1, self_closing, tail });
                    }
                }
                _ => return None,
            }
        }
        None
    }

    /// Consume the element body up to the matching end tag and build the
    /// TagHelper subtree
    #[allow(clippy::too_many_arguments)]
    fn consume_element(
        &mut self,
        name: &str,
        matched: Vec<usize>,
        attrs: Vec<ElementAttr>,
        self_closing: bool,
        tail: String,
        tail_span: Option<SourceSpan>,
        queue: &mut VecDeque<IrNode>,
        parents: &mut Vec<String>,
    ) -> IrNode {
        let mut body_items: Vec<IrNode> = Vec::new();

        if self_closing {
            if !tail.is_empty() {
                queue.push_front(IrNode::HtmlContent { content: tail, span: tail_span });
            }
        } else {
            let mut depth = 0usize;
            let mut text = tail;
            let mut text_span = tail_span;
            'collect: loop {
                let mut cursor = 0usize;
                loop {
                    match find_tag(&text[cursor..]) {
                        Some(TagEvent::Open { name: inner, name_end, .. })
                            if inner.eq_ignore_ascii_case(name) =>
                        {
                            let area = parse_attr_area(&text[cursor + name_end..]);
                            let (advance, opened) = match area.end {
                                Some((end, self_closed)) => {
                                    (cursor + name_end + end, !self_closed && !html::is_void_element(&inner))
                                }
                                None => (text.len(), true),
                            };
                            if opened {
                                depth += 1;
                            }
                            cursor = advance;
                        }
                        Some(TagEvent::Close { name: inner, start, end })
                            if inner.eq_ignore_ascii_case(name) =>
                        {
                            if depth == 0 {
                                let close_start = cursor + start;
                                if close_start > 0 {
                                    body_items.push(IrNode::HtmlContent {
                                        content: text[..close_start].to_string(),
                                        span: slice_span(&text_span, &text, 0, close_start),
                                    });
                                }
                                let rest_start = cursor + end;
                                if rest_start < text.len() {
                                    let rest_span =
                                        slice_span(&text_span, &text, rest_start, text.len());
                                    queue.push_front(IrNode::HtmlContent {
                                        content: text[rest_start..].to_string(),
                                        span: rest_span,
                                    });
                                }
                                break 'collect;
                            }
                            depth -= 1;
                            cursor += end;
                        }
                        Some(TagEvent::Open { name_end, .. }) => {
                            cursor += name_end;
                        }
                        Some(TagEvent::Close { end, .. }) => {
                            cursor += end;
                        }
                        None => break,
                    }
                }
                if !text.is_empty() {
                    body_items.push(IrNode::HtmlContent { content: text, span: text_span });
                }
                match queue.pop_front() {
                    Some(IrNode::HtmlContent { content, span }) => {
                        text = content;
                        text_span = span;
                    }
                    Some(other) => {
                        body_items.push(other);
                        text = String::new();
                        text_span = None;
                    }
                    None => {
                        self.diagnostics.push(
                            ParseError::new(
                                ErrorKind::UnclosedTag,
                                format!("tag helper element '<{}>' is never closed", name),
                                SourceSpan::new(SourceLocation::zero(), name.len()),
                            )
                            .with_help("Close the element so the helper can bind to it"),
                        );
                        break;
                    }
                }
            }
        }

        parents.push(name.to_string());
        let body = self.rewrite_sequence(body_items, parents);
        parents.pop();

        self.build_tag_helper(name, matched, attrs, self_closing, body)
    }

    fn build_tag_helper(
        &mut self,
        name: &str,
        matched: Vec<usize>,
        attrs: Vec<ElementAttr>,
        self_closing: bool,
        body: Vec<IrNode>,
    ) -> IrNode {
        let descriptors: Vec<&TagHelperDescriptor> =
            matched.iter().map(|&i| &self.descriptors[i]).collect();

        // First non-None behavior wins, in descriptor order. Conflicting
        // non-None declarations are diagnosed but still resolved the same
        // way, for compatibility.
        let behaviors: Vec<ContentBehavior> = descriptors
            .iter()
            .map(|d| d.content_behavior)
            .filter(|b| *b != ContentBehavior::None)
            .collect();
        let behavior = behaviors.first().copied().unwrap_or(ContentBehavior::None);
        if behaviors.windows(2).any(|w| w[0] != w[1]) {
            self.diagnostics.push(
                ParseError::new(
                    ErrorKind::AmbiguousTagHelper,
                    format!("descriptors for '<{}>' declare conflicting content behaviors", name),
                    SourceSpan::new(SourceLocation::zero(), name.len()),
                )
                .with_help("The first declared behavior is used"),
            );
        }

        let mut children: Vec<IrNode> = descriptors
            .iter()
            .map(|d| IrNode::CreateTagHelper { type_name: d.type_name.clone() })
            .collect();

        let mut accessor_by_attr: HashMap<String, usize> = HashMap::new();
        for attr in attrs {
            let bindings: Vec<(usize, String, String, bool)> = descriptors
                .iter()
                .enumerate()
                .filter_map(|(hi, d)| {
                    d.bound_attribute(&attr.name).map(|b| {
                        (hi, b.property_name.clone(), b.type_name.clone(), b.is_enum)
                    })
                })
                .collect();

            if bindings.is_empty() {
                let value = match &attr.value {
                    AttrValue::Literal(text) => vec![IrNode::HtmlContent {
                        content: text.clone(),
                        span: None,
                    }],
                    AttrValue::Bare => Vec::new(),
                    AttrValue::Dynamic(values) => values.clone(),
                };
                children.push(IrNode::TagHelperAttribute { name: attr.name.clone(), value });
                continue;
            }

            match &attr.value {
                AttrValue::Literal(text) => {
                    for (hi, property, type_name, is_enum) in &bindings {
                        children.push(IrNode::SetProperty {
                            attribute_name: attr.name.clone(),
                            property_name: property.clone(),
                            helper_index: *hi,
                            literal_value: Some(render_literal(text, type_name, *is_enum)),
                            value: Vec::new(),
                            accessor_index: 0,
                            first_evaluation: false,
                            span: None,
                        });
                    }
                }
                AttrValue::Bare => {
                    for (hi, property, _, _) in &bindings {
                        children.push(IrNode::SetProperty {
                            attribute_name: attr.name.clone(),
                            property_name: property.clone(),
                            helper_index: *hi,
                            literal_value: Some("true".to_string()),
                            value: Vec::new(),
                            accessor_index: 0,
                            first_evaluation: false,
                            span: None,
                        });
                    }
                }
                AttrValue::Dynamic(values) => {
                    let key = attr.name.to_ascii_lowercase();
                    for (binding_pos, (hi, property, _, _)) in bindings.iter().enumerate() {
                        let (accessor_index, first) = match accessor_by_attr.get(&key) {
                            Some(&idx) => (idx, false),
                            None => {
                                let idx = self.accessor_counter;
                                self.accessor_counter += 1;
                                accessor_by_attr.insert(key.clone(), idx);
                                (idx, true)
                            }
                        };
                        let first_evaluation = first && binding_pos == 0;
                        children.push(IrNode::SetProperty {
                            attribute_name: attr.name.clone(),
                            property_name: property.clone(),
                            helper_index: *hi,
                            literal_value: None,
                            value: if first_evaluation { values.clone() } else { Vec::new() },
                            accessor_index,
                            first_evaluation,
                            span: None,
                        });
                    }
                }
            }
        }

        children.push(IrNode::TagHelperBody { children: body });
        children.push(IrNode::ExecuteTagHelpers);

        IrNode::TagHelper {
            tag_name: name.to_string(),
            mode: if self_closing { TagMode::SelfClosing } else { TagMode::StartTagAndEndTag },
            behavior,
            children,
        }
    }
}

struct Continuation {
    attrs: Vec<ElementAttr>,
    consumed: usize,
    self_closing: bool,
    tail: Option<(String, Option<SourceSpan>)>,
}

/// Render a literal markup value as target-language text for assignment
fn render_literal(text: &str, type_name: &str, is_enum: bool) -> String {
    if is_enum {
        return format!("{}.{}", type_name, text);
    }
    match type_name {
        "string" | "System.String" => format!("\"{}\"", escape_literal(text)),
        _ => text.to_string(),
    }
}

fn slice_span(
    span: &Option<SourceSpan>,
    content: &str,
    start: usize,
    end: usize,
) -> Option<SourceSpan> {
    span.as_ref()
        .map(|s| SourceSpan::new(s.location.advance(&content[..start]), end - start))
}

enum TagEvent {
    Open { start: usize, name: String, name_end: usize },
    Close { start: usize, name: String, end: usize },
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

/// Next tag-shaped `<...` in the text, open or close
fn find_tag(text: &str) -> Option<TagEvent> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                let name_start = i + 2;
                let mut j = name_start;
                while j < bytes.len() && is_tag_name_byte(bytes[j]) {
                    j += 1;
                }
                if j > name_start {
                    let mut k = j;
                    while k < bytes.len() && bytes[k] != b'>' {
                        k += 1;
                    }
                    let end = if k < bytes.len() { k + 1 } else { bytes.len() };
                    return Some(TagEvent::Close {
                        start: i,
                        name: text[name_start..j].to_string(),
                        end,
                    });
                }
            } else if i + 1 < bytes.len() && bytes[i + 1].is_ascii_alphabetic() {
                let name_start = i + 1;
                let mut j = name_start;
                while j < bytes.len() && is_tag_name_byte(bytes[j]) {
                    j += 1;
                }
                return Some(TagEvent::Open {
                    start: i,
                    name: text[name_start..j].to_string(),
                    name_end: j,
                });
            }
        }
        i += 1;
    }
    None
}

struct AttrArea {
    attrs: Vec<(String, Option<String>)>,
    /// (offset just past `>`, self-closing), or None when the tag continues
    /// beyond this text
    end: Option<(usize, bool)>,
}

fn is_attr_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':' || b == b'@' || b == b'.'
}

/// Parse literal attributes from just after a tag name to the closing `>`
fn parse_attr_area(text: &str) -> AttrArea {
    let bytes = text.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return AttrArea { attrs, end: None };
        }
        match bytes[i] {
            b'>' => return AttrArea { attrs, end: Some((i + 1, false)) },
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'>' => {
                return AttrArea { attrs, end: Some((i + 2, true)) };
            }
            _ => {}
        }
        let name_start = i;
        while i < bytes.len() && is_attr_name_byte(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            i += 1;
            continue;
        }
        let name = text[name_start..i].to_string();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let quote = bytes[i];
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i >= bytes.len() {
                    // Unterminated here means the value is not literal text;
                    // let the continuation logic handle it
                    return AttrArea { attrs, end: None };
                }
                attrs.push((name, Some(text[value_start..i].to_string())));
                i += 1;
            } else {
                let value_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && bytes[i] != b'>'
                    && bytes[i] != b'/'
                {
                    i += 1;
                }
                attrs.push((name, Some(text[value_start..i].to_string())));
            }
        } else {
            attrs.push((name, None));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::GenerateOptions;
    use crate::descriptor::{BoundAttributeDescriptor, TagMatchingRule};
    use crate::ir::lower;
    use crate::parser;
    use crate::rewrite;

    fn descriptor(tag: &str, behavior: ContentBehavior) -> TagHelperDescriptor {
        TagHelperDescriptor {
            type_name: format!("Helpers.{}TagHelper", tag),
            rules: vec![TagMatchingRule {
                tag_name: tag.to_string(),
                parent_tag: None,
                required_attributes: Vec::new(),
            }],
            bound_attributes: Vec::new(),
            content_behavior: behavior,
        }
    }

    fn bind(mut d: TagHelperDescriptor, attr: &str, property: &str, type_name: &str) -> TagHelperDescriptor {
        d.bound_attributes.push(BoundAttributeDescriptor {
            name: attr.to_string(),
            type_name: type_name.to_string(),
            property_name: property.to_string(),
            is_enum: false,
            is_indexer: false,
        });
        d
    }

    fn run_pass(source: &str, descriptors: Vec<TagHelperDescriptor>) -> IrDocument {
        let outcome = parser::parse(source, None, false, None).unwrap();
        let rewriters = rewrite::standard_rewriters();
        let tree = rewrite::apply_all(&rewriters, outcome.tree);
        let mut doc = lower(&tree, &GenerateOptions::default());
        TagHelperPass::new(descriptors).run(&mut doc);
        doc
    }

    fn find_tag_helper(nodes: &[IrNode]) -> Option<&IrNode> {
        nodes.iter().find(|n| matches!(n, IrNode::TagHelper { .. }))
    }

    #[test]
    fn test_simple_element_replaced() {
        let doc = run_pass(
            "<p>before</p><bold>body</bold><p>after</p>",
            vec![descriptor("bold", ContentBehavior::None)],
        );
        let body = doc.method_children().unwrap();
        let helper = find_tag_helper(body).expect("tag helper node");
        let IrNode::TagHelper { tag_name, children, .. } = helper else { panic!() };
        assert_eq!(tag_name, "bold");
        assert!(matches!(children.first(), Some(IrNode::CreateTagHelper { .. })));
        assert!(matches!(children.last(), Some(IrNode::ExecuteTagHelpers)));
        // Surrounding markup survives, tag text itself is gone
        let text: String = body
            .iter()
            .filter_map(|n| match n {
                IrNode::HtmlContent { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "<p>before</p><p>after</p>");
        // Body is still present inside the helper
        let IrNode::TagHelperBody { children: inner } = children
            .iter()
            .find(|c| matches!(c, IrNode::TagHelperBody { .. }))
            .unwrap()
        else {
            panic!()
        };
        assert!(matches!(&inner[0], IrNode::HtmlContent { content, .. } if content == "body"));
    }

    #[test]
    fn test_unmatched_tag_untouched() {
        let doc = run_pass("<div>x</div>", vec![descriptor("bold", ContentBehavior::None)]);
        let body = doc.method_children().unwrap();
        assert!(find_tag_helper(body).is_none());
    }

    #[test]
    fn test_parent_constraint_tracks_stack() {
        let mut d = descriptor("item", ContentBehavior::None);
        d.rules[0].parent_tag = Some("list".to_string());
        let with_parent = run_pass("<list><item>x</item></list>", vec![d.clone()]);
        assert!(find_tag_helper(with_parent.method_children().unwrap()).is_some());

        let without_parent = run_pass("<nav><item>x</item></nav>", vec![d]);
        assert!(find_tag_helper(without_parent.method_children().unwrap()).is_none());
    }

    #[test]
    fn test_literal_bound_attribute() {
        let d = bind(descriptor("bold", ContentBehavior::None), "title", "Title", "string");
        let doc = run_pass("<bold title=\"Hi\">x</bold>", vec![d]);
        let body = doc.method_children().unwrap();
        let IrNode::TagHelper { children, .. } = find_tag_helper(body).unwrap() else { panic!() };
        let set = children
            .iter()
            .find_map(|c| match c {
                IrNode::SetProperty { property_name, literal_value, .. } => {
                    Some((property_name.clone(), literal_value.clone()))
                }
                _ => None,
            })
            .expect("set property");
        assert_eq!(set.0, "Title");
        assert_eq!(set.1.as_deref(), Some("\"Hi\""));
    }

    #[test]
    fn test_unbound_attribute_passes_through() {
        let d = descriptor("bold", ContentBehavior::None);
        let doc = run_pass("<bold class=\"x\">b</bold>", vec![d]);
        let body = doc.method_children().unwrap();
        let IrNode::TagHelper { children, .. } = find_tag_helper(body).unwrap() else { panic!() };
        assert!(children
            .iter()
            .any(|c| matches!(c, IrNode::TagHelperAttribute { name, .. } if name == "class")));
    }

    #[test]
    fn test_dynamic_bound_attribute_has_single_evaluation() {
        let a = bind(descriptor("bold", ContentBehavior::None), "title", "Title", "string");
        let b = bind(descriptor("bold", ContentBehavior::Replace), "title", "Heading", "string");
        let doc = run_pass("<bold title=\"@Value\">x</bold>", vec![a, b]);
        let body = doc.method_children().unwrap();
        let IrNode::TagHelper { children, behavior, .. } = find_tag_helper(body).unwrap() else {
            panic!()
        };
        // Tie-break: first non-None behavior in descriptor order
        assert_eq!(*behavior, ContentBehavior::Replace);
        let sets: Vec<(usize, bool, usize)> = children
            .iter()
            .filter_map(|c| match c {
                IrNode::SetProperty { helper_index, first_evaluation, accessor_index, .. } => {
                    Some((*helper_index, *first_evaluation, *accessor_index))
                }
                _ => None,
            })
            .collect();
        assert_eq!(sets.len(), 2);
        // Exactly one evaluation; both assignments share the accessor
        assert_eq!(sets.iter().filter(|(_, first, _)| *first).count(), 1);
        assert_eq!(sets[0].2, sets[1].2);
        assert!(sets[0].1);
        assert!(!sets[1].1);
    }

    #[test]
    fn test_conflicting_behaviors_diagnosed() {
        let a = descriptor("bold", ContentBehavior::Prepend);
        let b = descriptor("bold", ContentBehavior::Replace);
        let doc = run_pass("<bold>x</bold>", vec![a, b]);
        assert!(doc
            .diagnostics
            .iter()
            .any(|e| e.kind == ErrorKind::AmbiguousTagHelper));
        let body = doc.method_children().unwrap();
        let IrNode::TagHelper { behavior, .. } = find_tag_helper(body).unwrap() else { panic!() };
        assert_eq!(*behavior, ContentBehavior::Prepend);
    }

    #[test]
    fn test_nested_same_tag_depth() {
        let doc = run_pass(
            "<bold>a<bold>inner</bold>b</bold>",
            vec![descriptor("bold", ContentBehavior::None)],
        );
        let body = doc.method_children().unwrap();
        let IrNode::TagHelper { children, .. } = find_tag_helper(body).unwrap() else { panic!() };
        let IrNode::TagHelperBody { children: inner } = children
            .iter()
            .find(|c| matches!(c, IrNode::TagHelperBody { .. }))
            .unwrap()
        else {
            panic!()
        };
        // The inner element binds too, nested inside the body
        assert!(find_tag_helper(inner).is_some());
    }

    #[test]
    fn test_dynamic_attribute_across_nodes() {
        let d = bind(descriptor("bold", ContentBehavior::None), "title", "Title", "string");
        let doc = run_pass("<bold title=\"@Value\">x</bold>", vec![d]);
        let body = doc.method_children().unwrap();
        let IrNode::TagHelper { children, .. } = find_tag_helper(body).unwrap() else { panic!() };
        let IrNode::SetProperty { literal_value, value, first_evaluation, .. } = children
            .iter()
            .find(|c| matches!(c, IrNode::SetProperty { .. }))
            .unwrap()
        else {
            panic!()
        };
        assert!(literal_value.is_none());
        assert!(*first_evaluation);
        assert!(!value.is_empty());
    }

    #[test]
    fn test_self_closing_element() {
        let doc = run_pass("a<bold />b", vec![descriptor("bold", ContentBehavior::None)]);
        let body = doc.method_children().unwrap();
        let IrNode::TagHelper { mode, children, .. } = find_tag_helper(body).unwrap() else {
            panic!()
        };
        assert_eq!(*mode, TagMode::SelfClosing);
        let IrNode::TagHelperBody { children: inner } = children
            .iter()
            .find(|c| matches!(c, IrNode::TagHelperBody { .. }))
            .unwrap()
        else {
            panic!()
        };
        assert!(inner.is_empty());
        let text: String = body
            .iter()
            .filter_map(|n| match n {
                IrNode::HtmlContent { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "ab");
    }
}
