//! Member injection.
//!
//! Turns `@inject` directives into property declarations prepended to the
//! class body ahead of the first method, in source order.

use super::IrPass;
use crate::ir::{IrDocument, IrNode};

pub struct InjectionPass;

impl IrPass for InjectionPass {
    fn run(&self, doc: &mut IrDocument) {
        let injected: Vec<IrNode> = doc
            .directives()
            .into_iter()
            .filter(|(name, _)| *name == "inject")
            .filter_map(|(_, tokens)| {
                let type_name = tokens.first()?;
                let member = tokens.get(1)?;
                Some(IrNode::CSharpCode {
                    content: format!("public {} {} {{ get; private set; }}", type_name, member),
                    span: None,
                })
            })
            .collect();
        if injected.is_empty() {
            return;
        }

        let Some(class_children) = doc.class_children_mut() else { return };
        let insert_at = class_children
            .iter()
            .position(|c| matches!(c, IrNode::Method { .. }))
            .unwrap_or(0);
        for (i, node) in injected.into_iter().enumerate() {
            class_children.insert(insert_at + i, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::GenerateOptions;
    use crate::ir::lower;
    use crate::parser;
    use crate::rewrite;

    #[test]
    fn test_inject_prepends_property() {
        let source = "@inject IClock Clock\n@inject ILog Log\n<p>@Clock.Now</p>";
        let outcome = parser::parse(source, None, false, None).unwrap();
        let rewriters = rewrite::standard_rewriters();
        let tree = rewrite::apply_all(&rewriters, outcome.tree);
        let mut doc = lower(&tree, &GenerateOptions::default());
        InjectionPass.run(&mut doc);

        let class_children = doc.class_children_mut().unwrap();
        let props: Vec<&str> = class_children
            .iter()
            .filter_map(|c| match c {
                IrNode::CSharpCode { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            props,
            vec![
                "public IClock Clock { get; private set; }",
                "public ILog Log { get; private set; }",
            ]
        );
        // Properties come before the method
        let method_pos = class_children
            .iter()
            .position(|c| matches!(c, IrNode::Method { .. }))
            .unwrap();
        assert_eq!(method_pos, 2);
    }
}
