//! Block dialects
//!
//! Loops and await blocks are the only constructs whose output shape depends on the
//! dialect. Everything else (scopes, conditions, stores, attribute assembly) is
//! shared, so the walker asks a [`BlockDialect`] for these two shapes only.

use crate::buffer::Transformation;
use crate::options::Dialect;

pub type Span = (u32, u32);

/// Pieces of an `{#each}` block after its expressions have been analyzed.
#[derive(Debug, Clone, Default)]
pub struct EachParts {
    /// `const alias = name;` statements for shadowed condition names.
    pub captures: Vec<String>,
    /// Full condition of the enclosing if-chain, re-checked by hoisted callbacks.
    pub guard: Option<String>,
    pub expression: Span,
    pub context: Option<Span>,
    pub index: Option<String>,
    pub key: Option<Span>,
    pub children: Option<Span>,
    /// `Some` when an `{:else}` exists, with its children (if any).
    pub else_children: Option<Option<Span>>,
    /// The context binds a name the iterable reads.
    pub context_shadows_iterable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AwaitParts {
    pub captures: Vec<String>,
    pub then_guard: Option<String>,
    pub catch_guard: Option<String>,
    pub expression: Span,
    pub value: Option<Span>,
    pub error: Option<Span>,
    pub pending: Option<Span>,
    pub then: Option<Span>,
    pub catch: Option<Span>,
}

pub trait BlockDialect: Sync {
    /// Whether block bodies end up in callbacks that need guards and aliases.
    fn hoists(&self) -> bool;
    fn each(&self, parts: &EachParts) -> Vec<Transformation>;
    fn await_block(&self, parts: &AwaitParts) -> Vec<Transformation>;
}

pub fn for_dialect(dialect: Dialect) -> &'static dyn BlockDialect {
    match dialect {
        Dialect::Statements => &Statements,
        Dialect::Closures => &Closures,
    }
}

fn text(items: &mut Vec<Transformation>, text: impl Into<String>) {
    items.push(Transformation::text(text));
}

fn range(items: &mut Vec<Transformation>, span: Option<Span>) {
    if let Some((start, end)) = span {
        items.push(Transformation::range(start, end));
    }
}

fn context(items: &mut Vec<Transformation>, span: Option<Span>) {
    match span {
        Some(_) => range(items, span),
        None => text(items, "$$_"),
    }
}

fn guard(items: &mut Vec<Transformation>, condition: &Option<String>) {
    if let Some(condition) = condition {
        text(items, format!("if (!({})) return; ", condition));
    }
}

fn each_body(items: &mut Vec<Transformation>, parts: &EachParts, declare_index: bool) {
    if declare_index {
        if let Some(index) = &parts.index {
            text(items, format!("let {} = 1; ", index));
        }
    }
    if parts.key.is_some() {
        range(items, parts.key);
        text(items, "; ");
    }
    range(items, parts.children);
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// `for…of` loops and `try/catch` around an awaited value.
pub struct Statements;

impl BlockDialect for Statements {
    fn hoists(&self) -> bool {
        false
    }

    fn each(&self, parts: &EachParts) -> Vec<Transformation> {
        let mut items = Vec::new();
        if parts.else_children.is_none() && !parts.context_shadows_iterable {
            text(&mut items, "for (const ");
            context(&mut items, parts.context);
            text(&mut items, " of __sveltets_2_ensureArray(");
            range(&mut items, Some(parts.expression));
            text(&mut items, ")) { ");
            each_body(&mut items, parts, true);
            text(&mut items, "}");
            return items;
        }
        text(&mut items, "{ const $$_each = __sveltets_2_ensureArray(");
        range(&mut items, Some(parts.expression));
        text(&mut items, "); ");
        if let Some(else_children) = parts.else_children {
            text(&mut items, "if (!$$_each.length) { ");
            range(&mut items, else_children);
            text(&mut items, "} else ");
        }
        text(&mut items, "for (const ");
        context(&mut items, parts.context);
        text(&mut items, " of $$_each) { ");
        each_body(&mut items, parts, true);
        text(&mut items, "} }");
        items
    }

    fn await_block(&self, parts: &AwaitParts) -> Vec<Transformation> {
        let mut items = Vec::new();
        text(&mut items, "{ ");
        range(&mut items, parts.pending);
        text(&mut items, " let $$value = await (");
        range(&mut items, Some(parts.expression));
        text(&mut items, "); try { ");
        if parts.value.is_some() {
            text(&mut items, "const ");
            range(&mut items, parts.value);
            text(&mut items, " = $$value; ");
        }
        range(&mut items, parts.then);
        text(&mut items, "} catch ($$err) { ");
        if parts.error.is_some() {
            text(&mut items, "const ");
            range(&mut items, parts.error);
            text(&mut items, " = __sveltets_2_any($$err); ");
        }
        range(&mut items, parts.catch);
        text(&mut items, "} }");
        items
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOSURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Loop bodies and await arms hoisted into callbacks that re-check their guard.
pub struct Closures;

impl BlockDialect for Closures {
    fn hoists(&self) -> bool {
        true
    }

    fn each(&self, parts: &EachParts) -> Vec<Transformation> {
        let mut items = Vec::new();
        text(&mut items, "{ ");
        for capture in &parts.captures {
            text(&mut items, format!("{} ", capture));
        }
        match parts.else_children {
            Some(else_children) => {
                text(&mut items, "const $$_each = __sveltets_2_ensureArray(");
                range(&mut items, Some(parts.expression));
                text(&mut items, "); if (!$$_each.length) { ");
                range(&mut items, else_children);
                text(&mut items, "} __sveltets_2_each($$_each, (");
            }
            None => {
                text(&mut items, "__sveltets_2_each(");
                range(&mut items, Some(parts.expression));
                text(&mut items, ", (");
            }
        }
        context(&mut items, parts.context);
        if let Some(index) = &parts.index {
            text(&mut items, format!(", {}", index));
        }
        text(&mut items, ") => { ");
        guard(&mut items, &parts.guard);
        each_body(&mut items, parts, false);
        text(&mut items, "}); }");
        items
    }

    fn await_block(&self, parts: &AwaitParts) -> Vec<Transformation> {
        let mut items = Vec::new();
        text(&mut items, "{ ");
        for capture in &parts.captures {
            text(&mut items, format!("{} ", capture));
        }
        range(&mut items, parts.pending);
        text(&mut items, " __sveltets_2_awaitThen(");
        range(&mut items, Some(parts.expression));
        text(&mut items, ", ($$value) => { ");
        guard(&mut items, &parts.then_guard);
        if parts.value.is_some() {
            text(&mut items, "const ");
            range(&mut items, parts.value);
            text(&mut items, " = $$value; ");
        }
        range(&mut items, parts.then);
        text(&mut items, "}, ($$err) => { ");
        guard(&mut items, &parts.catch_guard);
        if parts.error.is_some() {
            text(&mut items, "const ");
            range(&mut items, parts.error);
            text(&mut items, " = __sveltets_2_any($$err); ");
        }
        range(&mut items, parts.catch);
        text(&mut items, "}); }");
        items
    }
}
