//! HTML element classification used by tag scanning.

/// Void elements: cannot have children or a closing tag.
/// https://html.spec.whatwg.org/multipage/syntax.html#void-elements
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Valid first character of a tag name
pub fn is_tag_name_start(text: &str) -> bool {
    text.chars().next().map_or(false, |c| c.is_ascii_alphabetic())
}
