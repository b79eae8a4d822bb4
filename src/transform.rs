//! Template walk
//!
//! [`TemplateTransformer`] is the one visitor that rewrites the markup. Expressions
//! are analyzed (and their `$store` sites rewritten) when a node is entered, while
//! scopes and conditions reflect the node's position. Each node's own syntax is
//! rewritten with a single `transform` when it is left, after all of its children.

use tracing::{trace, warn};

use crate::ast::{children_span, AwaitBlock, EachBlock, IfBlock, JsSpan, TemplateNode};
use crate::buffer::{RewriteBuffer, Transformation};
use crate::condition::{AliasCapture, Condition, ConditionTracker};
use crate::dialect::{AwaitParts, BlockDialect, EachParts};
use crate::expression::{analyze, expression_filler, pattern_filler, Analysis, JsKind};
use crate::options::{Dialect, Namespace};
use crate::scope::{BindingOwner, OwnerKind, ScopeTracker};
use crate::script::ScriptInfo;
use crate::stores::{apply_edits, splice, unshadowed, TextEdit};
use crate::validate::{
    BufferResultExt, CompilerError, Result, TransformError, ERR_EXPRESSION_SYNTAX,
};
use crate::visitor::{walk_fragment, Arm, TemplateVisitor};

pub const ANY_NULL: &str = "__sveltets_2_any(null)";

/// A successfully parsed embedded expression and the store edits applied to it.
#[derive(Debug, Clone, Default)]
pub struct Parsed {
    pub analysis: Analysis,
    pub edits: Vec<TextEdit>,
}

/// Where a slot-consuming child takes its `let:` values from.
#[derive(Debug, Clone)]
pub(crate) struct SlotTarget {
    pub component_id: usize,
    pub slot_name: String,
}

/// Per-node state kept between `enter` and `leave`.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeFrame {
    pub scope_pushed: bool,
    pub captures: Vec<AliasCapture>,
    pub alias_owner: Option<u32>,
    pub guard: Option<String>,
    pub catch_guard: Option<String>,
    pub context_shadows_iterable: bool,
    /// `{@const}` that did not parse in lenient mode.
    pub dropped: bool,
    pub component_id: Option<usize>,
    pub slot_target: Option<SlotTarget>,
}

pub struct TemplateTransformer<'a> {
    pub(crate) source: &'a str,
    pub(crate) file: &'a str,
    pub(crate) strict: bool,
    pub(crate) allow_any_attributes: bool,
    pub(crate) namespace: Namespace,
    pub(crate) buffer: &'a mut RewriteBuffer,
    pub(crate) script: &'a mut ScriptInfo,
    pub(crate) scopes: ScopeTracker,
    pub(crate) conditions: ConditionTracker,
    pub(crate) dialect: &'static dyn BlockDialect,
    pub(crate) frames: Vec<NodeFrame>,
    pub(crate) counter: usize,
}

impl<'a> TemplateTransformer<'a> {
    pub fn new(
        source: &'a str,
        file: &'a str,
        buffer: &'a mut RewriteBuffer,
        script: &'a mut ScriptInfo,
        dialect: Dialect,
    ) -> Self {
        TemplateTransformer {
            source,
            file,
            strict: false,
            allow_any_attributes: false,
            namespace: Namespace::Html,
            buffer,
            script,
            scopes: ScopeTracker::new(),
            conditions: ConditionTracker::new(),
            dialect: crate::dialect::for_dialect(dialect),
            frames: Vec::new(),
            counter: 0,
        }
    }

    pub fn run(&mut self, children: &[TemplateNode]) -> Result<()> {
        walk_fragment(self, children, None)
    }

    pub(crate) fn next_id(&mut self) -> usize {
        let id = self.counter;
        self.counter += 1;
        id
    }

    pub(crate) fn frame_mut(&mut self) -> Option<&mut NodeFrame> {
        self.frames.last_mut()
    }

    pub(crate) fn is_declared(&self, name: &str) -> bool {
        self.scopes.is_bound(name) || self.script.declared.contains(name)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Embedded expressions
    // ───────────────────────────────────────────────────────────────────────────

    pub(crate) fn js(&mut self, span: JsSpan, kind: JsKind, node: &str) -> Result<Option<Parsed>> {
        self.analyze_span(span, kind, node, false)
    }

    /// An assignment target (`bind:` values). Blanked as a pattern so the output
    /// stays assignable.
    pub(crate) fn js_target(&mut self, span: JsSpan, node: &str) -> Result<Option<Parsed>> {
        self.analyze_span(span, JsKind::Expression, node, true)
    }

    fn analyze_span(
        &mut self,
        span: JsSpan,
        kind: JsKind,
        node: &str,
        target: bool,
    ) -> Result<Option<Parsed>> {
        if span.is_empty() {
            return Ok(None);
        }
        let text = span.text(self.source);
        match analyze(text, span.start, kind) {
            Ok(analysis) => {
                let edits: Vec<TextEdit> = unshadowed(&analysis.stores, |name| {
                    self.is_declared(name)
                })
                .flat_map(|site| site.edits())
                .collect();
                apply_edits(self.buffer, &edits).in_node(node, span.start, span.end)?;
                self.script.note_calls(&analysis.calls);
                Ok(Some(Parsed { analysis, edits }))
            }
            Err(issue) => {
                if self.strict {
                    let error = CompilerError::at(
                        ERR_EXPRESSION_SYNTAX,
                        &issue.message,
                        self.file,
                        self.source,
                        issue.start,
                        issue.end,
                    )
                    .with_context(format!("{} expression", node));
                    return Err(TransformError::Strict(error.positioned(self.source)));
                }
                warn!(
                    node,
                    start = span.start,
                    end = span.end,
                    message = %issue.message,
                    "blanking malformed expression"
                );
                if kind != JsKind::Declaration {
                    let filler = if target || kind == JsKind::Pattern {
                        pattern_filler(text)
                    } else {
                        expression_filler(text)
                    };
                    self.buffer
                        .overwrite(span.start, span.end, &filler)
                        .in_node(node, span.start, span.end)?;
                }
                Ok(None)
            }
        }
    }

    /// The expression as a range, or `undefined` when it is empty.
    pub(crate) fn expr_item(&self, span: JsSpan) -> Transformation {
        if span.is_empty() {
            Transformation::text("undefined")
        } else {
            Transformation::range(span.start, span.end)
        }
    }

    /// Expression text that is valid at the top of `render()`: names bound by the
    /// template are replaced by their init expressions.
    pub(crate) fn resolve(&self, span: JsSpan, parsed: Option<&Parsed>) -> String {
        let Some(parsed) = parsed else {
            return ANY_NULL.to_string();
        };
        let mut edits = parsed.edits.clone();
        for reference in &parsed.analysis.references {
            if let Some(binding) = self.scopes.lookup(&reference.name) {
                let init = binding.init.as_deref().unwrap_or(ANY_NULL);
                edits.push(TextEdit::new(
                    reference.start,
                    reference.end,
                    format!("({})", init),
                ));
            }
        }
        splice(span.text(self.source), span.start, &edits)
    }

    fn condition(&self, span: JsSpan, parsed: Option<&Parsed>) -> Condition {
        let text = span.text(self.source);
        match parsed {
            Some(parsed) => Condition::new(text, span.start)
                .with_references(parsed.analysis.references.clone(), parsed.edits.clone()),
            None if span.is_empty() => Condition::new("undefined", span.start),
            None => Condition::new(expression_filler(text), span.start),
        }
    }

    /// Register template bindings in the current scope and, for hoisting dialects,
    /// alias the condition names they shadow.
    pub(crate) fn bind(
        &mut self,
        names: &[String],
        kind: OwnerKind,
        span: (u32, u32),
        init: impl Fn(&str) -> Option<String>,
    ) {
        let owner = BindingOwner {
            kind,
            start: span.0,
            end: span.1,
        };
        for name in names {
            self.scopes.add(name.clone(), owner.clone(), init(name));
        }
        if self.dialect.hoists() && kind != OwnerKind::ConstTag {
            let captures = self.conditions.shadow(names, span.0);
            if let Some(frame) = self.frames.last_mut() {
                frame.alias_owner = Some(span.0);
                frame.captures.extend(captures);
            }
        }
    }

    fn guard(&self) -> Option<String> {
        if self.dialect.hoists() {
            self.conditions.get_full_condition()
        } else {
            None
        }
    }

    pub(crate) fn capture_text(frame: &NodeFrame) -> String {
        frame
            .captures
            .iter()
            .map(|c| format!("{} ", c.statement()))
            .collect()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Blocks: enter
    // ───────────────────────────────────────────────────────────────────────────

    fn enter_if(&mut self, block: &IfBlock) -> Result<()> {
        let parsed = self.js(block.expression, JsKind::Expression, "IfBlock")?;
        let condition = self.condition(block.expression, parsed.as_ref());
        if block.elseif {
            self.conditions.add_else_if(condition);
        } else {
            self.conditions.add_nested_if(condition);
        }
        Ok(())
    }

    fn enter_each(&mut self, block: &EachBlock) -> Result<()> {
        let parsed = self.js(block.expression, JsKind::Expression, "EachBlock")?;
        let iterable = self.resolve(block.expression, parsed.as_ref());

        self.scopes.child();
        if let Some(frame) = self.frame_mut() {
            frame.scope_pushed = true;
        }
        let mut names = Vec::new();
        let mut simple_context = false;
        if let Some(context) = block.context {
            if let Some(pattern) = self.js(context, JsKind::Pattern, "EachBlock")? {
                names = pattern.analysis.binding_names();
                simple_context = is_identifier(context.text(self.source));
            }
        }
        let shadows = parsed
            .as_ref()
            .map_or(false, |p| names.iter().any(|n| p.analysis.references_name(n)));
        let span = (block.start, block.end);
        let item_init = format!("__sveltets_2_unwrapArr({})", iterable);
        self.bind(&names, OwnerKind::EachContext, span, |_| {
            Some(if simple_context {
                item_init.clone()
            } else {
                ANY_NULL.to_string()
            })
        });
        if let Some(index) = &block.index {
            self.bind(
                std::slice::from_ref(index),
                OwnerKind::EachIndex,
                span,
                |_| Some("0".to_string()),
            );
        }
        let guard = self.guard();
        if let Some(frame) = self.frame_mut() {
            frame.context_shadows_iterable = shadows;
            frame.guard = guard;
        }
        if let Some(key) = block.key {
            self.js(key, JsKind::Expression, "EachBlock")?;
        }
        Ok(())
    }

    fn enter_await(&mut self, block: &AwaitBlock) -> Result<()> {
        self.js(block.expression, JsKind::Expression, "AwaitBlock")?;
        self.scopes.child();
        if let Some(frame) = self.frame_mut() {
            frame.scope_pushed = true;
        }
        Ok(())
    }

    fn enter_await_arm(&mut self, block: &AwaitBlock, arm: Arm) -> Result<()> {
        self.scopes.reset();
        let span = (block.start, block.end);
        match arm {
            Arm::Then => {
                if let Some(value) = block.value {
                    let parsed_value = self.js(value, JsKind::Pattern, "AwaitBlock")?;
                    let names = parsed_value
                        .map(|p| p.analysis.binding_names())
                        .unwrap_or_default();
                    let init = if is_identifier(value.text(self.source)) {
                        let promise = self.resolve_plain(block.expression);
                        format!("__sveltets_2_unwrapPromiseLike({})", promise)
                    } else {
                        ANY_NULL.to_string()
                    };
                    self.bind(&names, OwnerKind::AwaitValue, span, |_| Some(init.clone()));
                }
                let guard = self.guard();
                if let Some(frame) = self.frame_mut() {
                    frame.guard = guard;
                }
            }
            Arm::Catch => {
                if let Some(error) = block.error {
                    let parsed_error = self.js(error, JsKind::Pattern, "AwaitBlock")?;
                    let names = parsed_error
                        .map(|p| p.analysis.binding_names())
                        .unwrap_or_default();
                    self.bind(&names, OwnerKind::AwaitError, span, |_| {
                        Some(ANY_NULL.to_string())
                    });
                }
                let guard = self.guard();
                if let Some(frame) = self.frame_mut() {
                    frame.catch_guard = guard;
                }
            }
            Arm::Pending | Arm::Else => {}
        }
        Ok(())
    }

    /// Re-analyze an expression only to resolve it; no edits are applied.
    fn resolve_plain(&self, span: JsSpan) -> String {
        match analyze(span.text(self.source), span.start, JsKind::Expression) {
            Ok(analysis) => {
                let edits: Vec<TextEdit> = unshadowed(&analysis.stores, |name| {
                    self.is_declared(name)
                })
                .flat_map(|site| site.edits())
                .collect();
                self.resolve(span, Some(&Parsed { analysis, edits }))
            }
            Err(_) => ANY_NULL.to_string(),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Blocks: leave
    // ───────────────────────────────────────────────────────────────────────────

    fn if_tail(&self, block: &IfBlock) -> Vec<Transformation> {
        let mut items = Vec::new();
        if let Some(children) = children_span(&block.children) {
            items.push(Transformation::range(children.0, children.1));
        }
        if let Some(else_block) = &block.else_block {
            match else_block.else_if() {
                Some(inner) => {
                    items.push(Transformation::text(" } else if ("));
                    items.push(self.expr_item(inner.expression));
                    items.push(Transformation::text(") { "));
                    items.push(Transformation::range(inner.start, inner.end));
                }
                None => {
                    items.push(Transformation::text(" } else { "));
                    if let Some(children) = children_span(&else_block.children) {
                        items.push(Transformation::range(children.0, children.1));
                    }
                }
            }
        }
        items
    }

    fn leave_if(&self, block: &IfBlock) -> Vec<Transformation> {
        if block.elseif {
            return self.if_tail(block);
        }
        let mut items = vec![
            Transformation::text("if ("),
            self.expr_item(block.expression),
            Transformation::text(") { "),
        ];
        items.extend(self.if_tail(block));
        items.push(Transformation::text(" }"));
        items
    }

    fn leave_each(&self, block: &EachBlock, frame: &NodeFrame) -> Vec<Transformation> {
        let parts = EachParts {
            captures: frame.captures.iter().map(AliasCapture::statement).collect(),
            guard: frame.guard.clone(),
            expression: (block.expression.start, block.expression.end),
            context: block.context.map(|c| (c.start, c.end)),
            index: block.index.clone(),
            key: block.key.map(|k| (k.start, k.end)),
            children: children_span(&block.children),
            else_children: block
                .else_block
                .as_ref()
                .map(|e| children_span(&e.children)),
            context_shadows_iterable: frame.context_shadows_iterable,
        };
        let mut items = self.dialect.each(&parts);
        if block.expression.is_empty() {
            substitute_empty(&mut items, parts.expression);
        }
        items
    }

    fn leave_await(&self, block: &AwaitBlock, frame: &NodeFrame) -> Vec<Transformation> {
        let arm = |branch: &crate::ast::AwaitBranch| {
            if branch.skip {
                None
            } else {
                children_span(&branch.children)
            }
        };
        let parts = AwaitParts {
            captures: frame.captures.iter().map(AliasCapture::statement).collect(),
            then_guard: frame.guard.clone(),
            catch_guard: frame.catch_guard.clone(),
            expression: (block.expression.start, block.expression.end),
            value: block.value.map(|v| (v.start, v.end)),
            error: block.error.map(|e| (e.start, e.end)),
            pending: arm(&block.pending),
            then: arm(&block.then),
            catch: arm(&block.catch),
        };
        let mut items = self.dialect.await_block(&parts);
        if block.expression.is_empty() {
            substitute_empty(&mut items, parts.expression);
        }
        items
    }

    fn text_residue(&self, start: u32, end: u32) -> Vec<Transformation> {
        let text = self
            .source
            .get(start as usize..end as usize)
            .unwrap_or_default();
        let newlines = text.matches('\n').count();
        if newlines == 0 {
            vec![Transformation::text(" ")]
        } else {
            vec![Transformation::text("\n".repeat(newlines))]
        }
    }

    fn mustache(&self, expression: JsSpan) -> Vec<Transformation> {
        let text = expression.text(self.source).trim_start();
        let wrap = text.starts_with('{')
            || text.starts_with("function")
            || text.starts_with("class");
        if wrap {
            vec![
                Transformation::text("("),
                self.expr_item(expression),
                Transformation::text(");"),
            ]
        } else {
            vec![self.expr_item(expression), Transformation::text(";")]
        }
    }
}

/// Empty ranges are dropped by the buffer; put `undefined` where the expression goes.
fn substitute_empty(items: &mut [Transformation], span: (u32, u32)) {
    for item in items.iter_mut() {
        if *item == Transformation::range(span.0, span.1) {
            *item = Transformation::text("undefined");
        }
    }
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let text = text.trim();
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

impl TemplateVisitor for TemplateTransformer<'_> {
    fn enter(&mut self, node: &TemplateNode, parent: Option<&TemplateNode>) -> crate::validate::Result<()> {
        self.frames.push(NodeFrame::default());
        match node {
            TemplateNode::Text(_) | TemplateNode::Comment(_) | TemplateNode::Unknown(_) => {}
            TemplateNode::MustacheTag(tag) => {
                self.js(tag.expression, JsKind::Expression, "MustacheTag")?;
            }
            TemplateNode::RawMustacheTag(tag) => {
                self.js(tag.expression, JsKind::Expression, "RawMustacheTag")?;
            }
            TemplateNode::DebugTag(tag) => {
                for identifier in &tag.identifiers {
                    self.js(*identifier, JsKind::Expression, "DebugTag")?;
                }
            }
            TemplateNode::ConstTag(tag) => {
                match self.js(tag.expression, JsKind::Declaration, "ConstTag")? {
                    Some(parsed) => {
                        let names = parsed.analysis.binding_names();
                        self.bind(&names, OwnerKind::ConstTag, (tag.start, tag.end), |_| {
                            Some(ANY_NULL.to_string())
                        });
                    }
                    None => {
                        if let Some(frame) = self.frame_mut() {
                            frame.dropped = true;
                        }
                    }
                }
            }
            TemplateNode::IfBlock(block) => self.enter_if(block)?,
            TemplateNode::EachBlock(block) => self.enter_each(block)?,
            TemplateNode::AwaitBlock(block) => self.enter_await(block)?,
            TemplateNode::KeyBlock(block) => {
                self.js(block.expression, JsKind::Expression, "KeyBlock")?;
            }
            TemplateNode::Options(_) => {}
            TemplateNode::Element(_)
            | TemplateNode::InlineComponent(_)
            | TemplateNode::Slot(_)
            | TemplateNode::SlotTemplate(_)
            | TemplateNode::Head(_)
            | TemplateNode::Title(_)
            | TemplateNode::Window(_)
            | TemplateNode::Body(_)
            | TemplateNode::Document(_) => self.enter_element_like(node, parent)?,
        }
        Ok(())
    }

    fn enter_arm(&mut self, owner: &TemplateNode, arm: Arm) -> crate::validate::Result<()> {
        match owner {
            TemplateNode::IfBlock(block) => {
                let is_else_if = block
                    .else_block
                    .as_ref()
                    .map_or(false, |e| e.else_if().is_some());
                if arm == Arm::Else && !is_else_if {
                    self.conditions.add_else();
                }
            }
            // The else arm of a loop does not see the loop bindings.
            TemplateNode::EachBlock(_) => self.scopes.reset(),
            TemplateNode::AwaitBlock(block) => self.enter_await_arm(block, arm)?,
            _ => {}
        }
        Ok(())
    }

    fn leave(&mut self, node: &TemplateNode, _parent: Option<&TemplateNode>) -> crate::validate::Result<()> {
        let frame = self.frames.pop().unwrap_or_default();
        let (start, end) = node.span();
        trace!(kind = node.kind(), start, end, "rewriting node");

        let items = match node {
            TemplateNode::Unknown(_) => None,
            TemplateNode::Text(text) => Some(self.text_residue(text.start, text.end)),
            TemplateNode::Comment(_) | TemplateNode::Options(_) => Some(Vec::new()),
            TemplateNode::MustacheTag(tag) | TemplateNode::RawMustacheTag(tag) => {
                Some(self.mustache(tag.expression))
            }
            TemplateNode::DebugTag(tag) => {
                let mut items = vec![Transformation::text(";")];
                for identifier in &tag.identifiers {
                    items.push(self.expr_item(*identifier));
                    items.push(Transformation::text(";"));
                }
                Some(items)
            }
            TemplateNode::ConstTag(tag) => Some(if frame.dropped {
                Vec::new()
            } else {
                vec![
                    Transformation::text("const "),
                    self.expr_item(tag.expression),
                    Transformation::text(";"),
                ]
            }),
            TemplateNode::IfBlock(block) => Some(self.leave_if(block)),
            TemplateNode::EachBlock(block) => Some(self.leave_each(block, &frame)),
            TemplateNode::AwaitBlock(block) => Some(self.leave_await(block, &frame)),
            TemplateNode::KeyBlock(block) => {
                let mut items = vec![self.expr_item(block.expression), Transformation::text("; ")];
                if let Some(children) = children_span(&block.children) {
                    items.push(Transformation::range(children.0, children.1));
                }
                Some(items)
            }
            TemplateNode::Element(_)
            | TemplateNode::InlineComponent(_)
            | TemplateNode::Slot(_)
            | TemplateNode::SlotTemplate(_)
            | TemplateNode::Head(_)
            | TemplateNode::Title(_)
            | TemplateNode::Window(_)
            | TemplateNode::Body(_)
            | TemplateNode::Document(_) => Some(self.leave_element_like(node, &frame)?),
        };

        if let Some(items) = items {
            self.buffer
                .transform(start, end, &items)
                .in_node(node.kind(), start, end)?;
        }
        if frame.scope_pushed {
            self.scopes.pop();
        }
        if let Some(owner) = frame.alias_owner {
            self.conditions.release(owner);
        }
        if let TemplateNode::IfBlock(block) = node {
            if !block.elseif {
                self.conditions.pop();
            }
        }
        Ok(())
    }
}
