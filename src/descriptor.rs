//! Tag helper descriptors.
//!
//! Supplied by an external discovery collaborator (typically as JSON); the
//! compiler only reads them. A descriptor binds element matches to a helper
//! type, its settable properties, and a content behavior.

use serde::{Deserialize, Serialize};

/// How a matched element's original body combines with generated output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ContentBehavior {
    #[default]
    None,
    Append,
    Prepend,
    Replace,
    Modify,
}

/// A property the helper binds from an element attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundAttributeDescriptor {
    /// Attribute name as written in markup (matched case-insensitively)
    pub name: String,
    /// Declared property type in the target language
    pub type_name: String,
    /// Property name on the helper type
    pub property_name: String,
    #[serde(default)]
    pub is_enum: bool,
    /// Dictionary-bound attribute (`prefix-*`)
    #[serde(default)]
    pub is_indexer: bool,
}

/// One way an element can match this descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMatchingRule {
    /// Tag name, or "*" for any element
    pub tag_name: String,
    /// Required parent element, if any
    #[serde(default)]
    pub parent_tag: Option<String>,
    /// Attribute names that must all be present
    #[serde(default)]
    pub required_attributes: Vec<String>,
}

impl TagMatchingRule {
    pub fn matches(&self, tag: &str, parent: Option<&str>, attributes: &[String]) -> bool {
        if self.tag_name != "*" && !self.tag_name.eq_ignore_ascii_case(tag) {
            return false;
        }
        if let Some(required_parent) = &self.parent_tag {
            match parent {
                Some(parent) if required_parent.eq_ignore_ascii_case(parent) => {}
                _ => return false,
            }
        }
        self.required_attributes.iter().all(|required| {
            attributes.iter().any(|attr| attr.eq_ignore_ascii_case(required))
        })
    }
}

/// A complete structured-attribute descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagHelperDescriptor {
    /// Fully qualified helper type name
    pub type_name: String,
    pub rules: Vec<TagMatchingRule>,
    #[serde(default)]
    pub bound_attributes: Vec<BoundAttributeDescriptor>,
    #[serde(default)]
    pub content_behavior: ContentBehavior,
}

impl TagHelperDescriptor {
    /// Whether any rule matches the element
    pub fn matches(&self, tag: &str, parent: Option<&str>, attributes: &[String]) -> bool {
        self.rules.iter().any(|rule| rule.matches(tag, parent, attributes))
    }

    /// Bound attribute by markup name, case-insensitive
    pub fn bound_attribute(&self, name: &str) -> Option<&BoundAttributeDescriptor> {
        self.bound_attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(tag: &str) -> TagHelperDescriptor {
        TagHelperDescriptor {
            type_name: "Test.BoldTagHelper".to_string(),
            rules: vec![TagMatchingRule {
                tag_name: tag.to_string(),
                parent_tag: None,
                required_attributes: Vec::new(),
            }],
            bound_attributes: Vec::new(),
            content_behavior: ContentBehavior::None,
        }
    }

    #[test]
    fn test_tag_name_match() {
        let d = descriptor("bold");
        assert!(d.matches("bold", None, &[]));
        assert!(d.matches("BOLD", None, &[]));
        assert!(!d.matches("div", None, &[]));
    }

    #[test]
    fn test_wildcard_match() {
        let d = descriptor("*");
        assert!(d.matches("anything", None, &[]));
    }

    #[test]
    fn test_parent_constraint() {
        let mut d = descriptor("li");
        d.rules[0].parent_tag = Some("ul".to_string());
        assert!(d.matches("li", Some("ul"), &[]));
        assert!(!d.matches("li", Some("ol"), &[]));
        assert!(!d.matches("li", None, &[]));
    }

    #[test]
    fn test_required_attributes() {
        let mut d = descriptor("a");
        d.rules[0].required_attributes = vec!["asp-route".to_string()];
        assert!(d.matches("a", None, &["href".to_string(), "asp-route".to_string()]));
        assert!(!d.matches("a", None, &["href".to_string()]));
    }

    #[test]
    fn test_descriptor_json_round_trip() {
        let d = descriptor("bold");
        let json = serde_json::to_string(&d).unwrap();
        let back: TagHelperDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn test_bound_attribute_lookup() {
        let mut d = descriptor("bold");
        d.bound_attributes.push(BoundAttributeDescriptor {
            name: "is-bold".to_string(),
            type_name: "bool".to_string(),
            property_name: "IsBold".to_string(),
            is_enum: false,
            is_indexer: false,
        });
        assert!(d.bound_attribute("IS-BOLD").is_some());
        assert!(d.bound_attribute("other").is_none());
    }
}
