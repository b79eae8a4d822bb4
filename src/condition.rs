//! If-chain condition tracking
//!
//! Each `{#if}` opens a frame; `{:else if}` and `{:else}` move the same frame to its
//! next branch. The guard for a hoisted callback is rebuilt on demand from the frame
//! chain. When a callback parameter (or any other template binding) shadows a name a
//! live condition reads, the outer value is captured under an alias first and the
//! guard reads the alias.

use serde::{Deserialize, Serialize};

use crate::expression::Reference;
use crate::stores::{splice, TextEdit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchKind {
    If,
    ElseIf,
    Else,
}

/// One test of an if-chain, kept as original text plus the edits that rewrite it.
#[derive(Debug, Clone)]
pub struct Condition {
    pub text: String,
    pub base: u32,
    pub references: Vec<Reference>,
    /// Store rewrites inside the text.
    pub edits: Vec<TextEdit>,
}

impl Condition {
    pub fn new(text: impl Into<String>, base: u32) -> Self {
        Condition {
            text: text.into(),
            base,
            references: Vec::new(),
            edits: Vec::new(),
        }
    }

    pub fn with_references(mut self, references: Vec<Reference>, edits: Vec<TextEdit>) -> Self {
        self.references = references;
        self.edits = edits;
        self
    }

    fn reads(&self, name: &str) -> bool {
        self.references.iter().any(|r| r.name == name)
    }
}

#[derive(Debug, Clone)]
struct IfFrame {
    parent: Option<usize>,
    conditions: Vec<Condition>,
    kind: BranchKind,
}

#[derive(Debug, Clone)]
struct AliasEntry {
    name: String,
    alias: String,
    /// Frames created before the capture are the ones that read the outer value.
    frames_before: usize,
    owner: u32,
}

/// `const <alias> = <name>;` to emit where the shadowing scope begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasCapture {
    pub name: String,
    pub alias: String,
}

impl AliasCapture {
    pub fn statement(&self) -> String {
        format!("const {} = {};", self.alias, self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConditionTracker {
    frames: Vec<IfFrame>,
    current: Option<usize>,
    aliases: Vec<AliasEntry>,
    counter: usize,
}

impl ConditionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_nested_if(&mut self, condition: Condition) {
        self.frames.push(IfFrame {
            parent: self.current,
            conditions: vec![condition],
            kind: BranchKind::If,
        });
        self.current = Some(self.frames.len() - 1);
    }

    pub fn add_else_if(&mut self, condition: Condition) {
        if let Some(frame) = self.current.map(|id| &mut self.frames[id]) {
            frame.conditions.push(condition);
            frame.kind = BranchKind::ElseIf;
        }
    }

    pub fn add_else(&mut self) {
        if let Some(frame) = self.current.map(|id| &mut self.frames[id]) {
            frame.kind = BranchKind::Else;
        }
    }

    pub fn pop(&mut self) {
        if let Some(id) = self.current {
            self.current = self.frames[id].parent;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    fn chain(&self) -> Vec<usize> {
        let mut ids = Vec::new();
        let mut cursor = self.current;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.frames[id].parent;
        }
        ids.reverse();
        ids
    }

    /// Conjunction of every live branch, outermost first. `None` outside any if.
    pub fn get_full_condition(&self) -> Option<String> {
        let parts: Vec<String> = self
            .chain()
            .into_iter()
            .map(|id| self.frame_condition(id))
            .collect();
        (!parts.is_empty()).then(|| parts.join(" && "))
    }

    fn frame_condition(&self, id: usize) -> String {
        let frame = &self.frames[id];
        let rendered: Vec<String> = frame
            .conditions
            .iter()
            .map(|c| self.render(id, c))
            .collect();
        let (negated, last) = match frame.kind {
            BranchKind::Else => (&rendered[..], None),
            _ => match rendered.split_last() {
                Some((last, rest)) => (rest, Some(last)),
                None => (&rendered[..], None),
            },
        };
        let mut parts: Vec<String> = negated.iter().map(|c| format!("!({})", c)).collect();
        if let Some(last) = last {
            parts.push(format!("({})", last));
        }
        parts.join(" && ")
    }

    fn render(&self, frame: usize, condition: &Condition) -> String {
        let mut edits = condition.edits.clone();
        for reference in &condition.references {
            if let Some(alias) = self.alias_for(&reference.name, frame) {
                edits.push(TextEdit::new(reference.start, reference.end, alias));
            }
        }
        splice(&condition.text, condition.base, &edits)
    }

    fn alias_for(&self, name: &str, frame: usize) -> Option<&str> {
        self.aliases
            .iter()
            .find(|entry| entry.name == name && frame < entry.frames_before)
            .map(|entry| entry.alias.as_str())
    }

    /// Register bindings introduced by the node at `owner`. Returns the captures to
    /// emit in front of it for every live condition that reads a shadowed name.
    pub fn shadow(&mut self, names: &[String], owner: u32) -> Vec<AliasCapture> {
        let chain = self.chain();
        let mut captures = Vec::new();
        for name in names {
            let needs_alias = chain.iter().any(|&id| {
                self.alias_for(name, id).is_none()
                    && self.frames[id].conditions.iter().any(|c| c.reads(name))
            });
            if !needs_alias {
                continue;
            }
            let alias = format!("$$_{}{}", name, self.counter);
            self.counter += 1;
            self.aliases.push(AliasEntry {
                name: name.clone(),
                alias: alias.clone(),
                frames_before: self.frames.len(),
                owner,
            });
            captures.push(AliasCapture {
                name: name.clone(),
                alias,
            });
        }
        captures
    }

    /// Drop the aliases registered by the node at `owner`.
    pub fn release(&mut self, owner: u32) {
        self.aliases.retain(|entry| entry.owner != owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{analyze, JsKind};

    fn cond(text: &str, base: u32) -> Condition {
        let analysis = analyze(text, base, JsKind::Expression).unwrap();
        Condition::new(text, base).with_references(analysis.references, Vec::new())
    }

    #[test]
    fn test_chain_negates_earlier_branches() {
        let mut tracker = ConditionTracker::new();
        assert_eq!(tracker.get_full_condition(), None);
        tracker.add_nested_if(cond("a", 0));
        assert_eq!(tracker.get_full_condition().as_deref(), Some("(a)"));
        tracker.add_else_if(cond("b", 10));
        assert_eq!(tracker.get_full_condition().as_deref(), Some("!(a) && (b)"));
        tracker.add_else();
        assert_eq!(tracker.get_full_condition().as_deref(), Some("!(a) && !(b)"));
        tracker.add_nested_if(cond("c > 1", 20));
        assert_eq!(
            tracker.get_full_condition().as_deref(),
            Some("!(a) && !(b) && (c > 1)")
        );
        tracker.pop();
        tracker.pop();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_shadowed_name_reads_alias() {
        let mut tracker = ConditionTracker::new();
        tracker.add_nested_if(cond("a.length", 5));
        let captures = tracker.shadow(&["a".to_string(), "x".to_string()], 40);
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].statement(), "const $$_a0 = a;");
        assert_eq!(tracker.get_full_condition().as_deref(), Some("($$_a0.length)"));

        // A condition opened inside the shadowing scope reads the inner binding.
        tracker.add_nested_if(cond("a", 60));
        assert_eq!(
            tracker.get_full_condition().as_deref(),
            Some("($$_a0.length) && (a)")
        );
        // Shadowing again only aliases the inner frame.
        let again = tracker.shadow(&["a".to_string()], 80);
        assert_eq!(again[0].alias, "$$_a1");
        assert_eq!(
            tracker.get_full_condition().as_deref(),
            Some("($$_a0.length) && ($$_a1)")
        );
        tracker.release(80);
        tracker.pop();
        tracker.release(40);
        assert_eq!(tracker.get_full_condition().as_deref(), Some("(a.length)"));
    }

    #[test]
    fn test_unread_names_are_not_aliased() {
        let mut tracker = ConditionTracker::new();
        tracker.add_nested_if(cond("visible", 0));
        assert!(tracker.shadow(&["item".to_string()], 10).is_empty());
    }
}
