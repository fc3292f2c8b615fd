//! Lowering strategies attached to syntax nodes.
//!
//! Every span and block carries a generator describing how it lowers into
//! IR. The lowering pass dispatches on these instead of re-deriving intent
//! from kinds, so a rewriter can change how a node lowers without changing
//! its shape.

/// How a leaf span lowers
#[derive(Debug, Clone, PartialEq)]
pub enum SpanGenerator {
    /// Nothing is emitted (transitions, metacode, comments)
    None,
    /// Literal markup content
    Markup,
    /// A token of a rendered code expression
    Expression,
    /// A token of an executed code statement
    Statement,
    /// Class-level code (`@functions` body)
    TypeMember,
    /// A literal fragment of an attribute value; `prefix` is the whitespace
    /// separating it from the previous fragment
    LiteralAttributeValue { prefix: String, value: String },
    /// A namespace import (`@using X;` declaration form)
    UsingImport { namespace: String },
    /// One token of a directive (`@inject T Name`)
    DirectiveToken,
}

/// How a composite block lowers
#[derive(Debug, Clone, PartialEq)]
pub enum BlockGenerator {
    /// Children lower on their own
    None,
    /// Rendered expression (`@x`, `@(x)`)
    Expression,
    /// A whole markup attribute; the block's literal/dynamic children are
    /// the value fragments
    Attribute { name: String, prefix: String, suffix: String },
    /// A dynamic fragment of an attribute value; `prefix` is the whitespace
    /// separating it from the previous fragment
    DynamicAttributeValue { prefix: String },
    /// Named section contents
    Section { name: String },
    /// Inline template (`@<p>...</p>`)
    Template,
    /// Directive block; tokens are the DirectiveToken spans among the children
    Directive { name: String },
    /// Class-level helper method with its signature text
    Helper { signature: String },
}
