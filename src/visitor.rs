use crate::ast::{AwaitBranch, TemplateNode};
use crate::validate::Result;

/// Sub-fragments of a block that are not separate nodes in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arm {
    /// `{:else}` of an if or each block. Also entered for `{:else if}`.
    Else,
    Pending,
    Then,
    Catch,
}

/// The single traversal mechanism for template trees.
///
/// Rules:
/// 1. Traversal order is document order and fixed.
/// 2. `enter` runs before any child, `leave` after every child.
/// 3. Arms of a block are bracketed by `enter_arm`/`leave_arm` between the block's
///    own `enter` and `leave`.
/// 4. No manual recursion outside of this system.
pub trait TemplateVisitor {
    fn enter(&mut self, _node: &TemplateNode, _parent: Option<&TemplateNode>) -> Result<()> {
        Ok(())
    }

    fn leave(&mut self, _node: &TemplateNode, _parent: Option<&TemplateNode>) -> Result<()> {
        Ok(())
    }

    fn enter_arm(&mut self, _owner: &TemplateNode, _arm: Arm) -> Result<()> {
        Ok(())
    }

    fn leave_arm(&mut self, _owner: &TemplateNode, _arm: Arm) -> Result<()> {
        Ok(())
    }
}

pub fn walk_fragment<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    children: &[TemplateNode],
    parent: Option<&TemplateNode>,
) -> Result<()> {
    for node in children {
        walk_node(visitor, node, parent)?;
    }
    Ok(())
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    node: &TemplateNode,
    parent: Option<&TemplateNode>,
) -> Result<()> {
    visitor.enter(node, parent)?;
    match node {
        TemplateNode::IfBlock(block) => {
            walk_fragment(visitor, &block.children, Some(node))?;
            if let Some(else_block) = &block.else_block {
                walk_arm(visitor, node, Arm::Else, &else_block.children)?;
            }
        }
        TemplateNode::EachBlock(block) => {
            walk_fragment(visitor, &block.children, Some(node))?;
            if let Some(else_block) = &block.else_block {
                walk_arm(visitor, node, Arm::Else, &else_block.children)?;
            }
        }
        TemplateNode::AwaitBlock(block) => {
            walk_await_arm(visitor, node, Arm::Pending, &block.pending)?;
            walk_await_arm(visitor, node, Arm::Then, &block.then)?;
            walk_await_arm(visitor, node, Arm::Catch, &block.catch)?;
        }
        TemplateNode::KeyBlock(block) => walk_fragment(visitor, &block.children, Some(node))?,
        other => {
            if let Some(element) = other.as_element() {
                walk_fragment(visitor, &element.children, Some(node))?;
            }
        }
    }
    visitor.leave(node, parent)
}

fn walk_arm<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    owner: &TemplateNode,
    arm: Arm,
    children: &[TemplateNode],
) -> Result<()> {
    visitor.enter_arm(owner, arm)?;
    walk_fragment(visitor, children, Some(owner))?;
    visitor.leave_arm(owner, arm)
}

fn walk_await_arm<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    owner: &TemplateNode,
    arm: Arm,
    branch: &AwaitBranch,
) -> Result<()> {
    if branch.skip {
        return Ok(());
    }
    walk_arm(visitor, owner, arm, &branch.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_template;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl TemplateVisitor for Recorder {
        fn enter(&mut self, node: &TemplateNode, _parent: Option<&TemplateNode>) -> Result<()> {
            self.events.push(format!("enter {}", node.kind()));
            Ok(())
        }

        fn leave(&mut self, node: &TemplateNode, _parent: Option<&TemplateNode>) -> Result<()> {
            self.events.push(format!("leave {}", node.kind()));
            Ok(())
        }

        fn enter_arm(&mut self, _owner: &TemplateNode, arm: Arm) -> Result<()> {
            self.events.push(format!("arm {:?}", arm));
            Ok(())
        }
    }

    #[test]
    fn test_children_run_between_enter_and_leave() {
        let fragment = parse_template("{#if a}<b/>{:else}{x}{/if}", "App.svelte").unwrap();
        let mut recorder = Recorder::default();
        walk_fragment(&mut recorder, &fragment.children, None).unwrap();
        assert_eq!(
            recorder.events,
            vec![
                "enter IfBlock",
                "enter Element",
                "leave Element",
                "arm Else",
                "enter MustacheTag",
                "leave MustacheTag",
                "leave IfBlock",
            ]
        );
    }

    #[test]
    fn test_skipped_await_arms_are_not_visited() {
        let fragment = parse_template("{#await p then v}{v}{/await}", "App.svelte").unwrap();
        let mut recorder = Recorder::default();
        walk_fragment(&mut recorder, &fragment.children, None).unwrap();
        assert!(!recorder.events.contains(&"arm Pending".to_string()));
        assert!(recorder.events.contains(&"arm Then".to_string()));
    }
}
