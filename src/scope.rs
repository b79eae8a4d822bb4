//! Template scope tracking
//!
//! Scopes live in an arena and refer to their parent by index. A lookup walks the
//! parent indices up to the root; `child()` is the only way to create a scope, so
//! the chain can never loop.

use serde::{Deserialize, Serialize};

pub type ScopeId = usize;

pub const ROOT_SCOPE: ScopeId = 0;

/// The template construct that introduced a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OwnerKind {
    EachContext,
    EachIndex,
    AwaitValue,
    AwaitError,
    ConstTag,
    SlotLet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingOwner {
    pub kind: OwnerKind,
    /// Span of the introducing node.
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub name: String,
    pub owner: BindingOwner,
    /// An expression for the bound value that is valid outside the template, used
    /// when a slot definition has to mention it.
    pub init: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRecord {
    pub parent: Option<ScopeId>,
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeTracker {
    scopes: Vec<ScopeRecord>,
    current: ScopeId,
}

impl Default for ScopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTracker {
    pub fn new() -> Self {
        ScopeTracker {
            scopes: vec![ScopeRecord::default()],
            current: ROOT_SCOPE,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Open a scope on top of the current one and make it current.
    pub fn child(&mut self) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(ScopeRecord {
            parent: Some(self.current),
            bindings: Vec::new(),
        });
        self.current = id;
        id
    }

    /// Return to the parent of the current scope. The root is never left.
    pub fn pop(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    /// Forget the current scope's bindings without leaving it. Used when one
    /// logical scope switches arms (await pending/then/catch).
    pub fn reset(&mut self) {
        self.scopes[self.current].bindings.clear();
    }

    pub fn add(&mut self, name: impl Into<String>, owner: BindingOwner, init: Option<String>) {
        let name = name.into();
        let bindings = &mut self.scopes[self.current].bindings;
        bindings.retain(|b| b.name != name);
        bindings.push(Binding { name, owner, init });
    }

    /// The innermost binding of `name` visible from the current scope.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.lookup_with_scope(name).map(|(_, binding)| binding)
    }

    /// Like [`lookup`](Self::lookup), also returning the scope that holds it.
    pub fn lookup_with_scope(&self, name: &str) -> Option<(ScopeId, &Binding)> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            let record = &self.scopes[id];
            if let Some(binding) = record.bindings.iter().rev().find(|b| b.name == name) {
                return Some((id, binding));
            }
            cursor = record.parent;
        }
        None
    }

    pub fn get_owner(&self, name: &str) -> Option<&BindingOwner> {
        self.lookup(name).map(|b| &b.owner)
    }

    pub fn get_init(&self, name: &str) -> Option<&str> {
        self.lookup(name).and_then(|b| b.init.as_deref())
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.scopes[self.current].parent;
        while let Some(id) = cursor {
            depth += 1;
            cursor = self.scopes[id].parent;
        }
        depth
    }

    pub fn record(&self, id: ScopeId) -> Option<&ScopeRecord> {
        self.scopes.get(id)
    }
}
