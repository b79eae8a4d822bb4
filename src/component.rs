//! Elements, components and slots
//!
//! Element-like nodes turn into a `svelteHTML.createElement` call or a component
//! instantiation. Attribute values and directives become object entries or
//! statements next to that call; `let:` directives open a scope for the children
//! that destructures the providing component's slot definition.

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::ast::{
    children_span, Attribute, AttributeNode, AttributeValue, AttributeValuePart, Directive,
    Element, ElementTag, JsSpan, TemplateNode,
};
use crate::buffer::Transformation;
use crate::exports::quote_key;
use crate::expression::{analyze, pattern_filler, JsKind};
use crate::scope::OwnerKind;
use crate::stores::{is_store_name, splice, unshadowed, TextEdit};
use crate::transform::{
    is_identifier, NodeFrame, Parsed, SlotTarget, TemplateTransformer, ANY_NULL,
};
use crate::validate::{
    CompilerError, Result, TransformError, ERR_DYNAMIC_SLOT_NAME, ERR_INVALID_LET,
};

lazy_static! {
    /// Lowercased SVG tag names; their attributes keep their case.
    static ref SVG_ELEMENTS: HashSet<&'static str> = [
        "svg", "path", "circle", "ellipse", "line", "polyline", "polygon", "rect", "g",
        "defs", "use", "symbol", "clippath", "mask", "pattern", "marker", "lineargradient",
        "radialgradient", "stop", "filter", "feblend", "fecolormatrix",
        "fecomponenttransfer", "fecomposite", "feconvolvematrix", "fediffuselighting",
        "fedisplacementmap", "fedistantlight", "fedropshadow", "feflood", "fefunca",
        "fefuncb", "fefuncg", "fefuncr", "fegaussianblur", "feimage", "femerge",
        "femergenode", "femorphology", "feoffset", "fepointlight", "fespecularlighting",
        "fespotlight", "fetile", "feturbulence", "foreignobject", "image", "switch",
        "text", "tspan", "textpath", "title", "desc", "metadata", "a", "view", "animate",
        "animatemotion", "animatetransform", "set", "mpath",
    ]
    .into_iter()
    .collect();

    /// Bindings the DOM only ever writes.
    static ref READONLY_BINDINGS: HashSet<&'static str> = [
        "clientWidth", "clientHeight", "offsetWidth", "offsetHeight", "duration",
        "buffered", "seekable", "played", "seeking", "ended", "videoWidth", "videoHeight",
        "naturalWidth", "naturalHeight", "contentRect", "contentBoxSize", "borderBoxSize",
        "devicePixelContentBoxSize",
    ]
    .into_iter()
    .collect();
}

fn text(value: impl Into<String>) -> Transformation {
    Transformation::text(value)
}

fn json(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

fn escape_template(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

fn join(entries: Vec<Vec<Transformation>>) -> Vec<Transformation> {
    let mut items = Vec::new();
    for (i, entry) in entries.into_iter().enumerate() {
        if i > 0 {
            items.push(text(", "));
        }
        items.extend(entry);
    }
    items
}

fn children_items(element: &Element) -> Vec<Transformation> {
    match children_span(&element.children) {
        Some((start, end)) => vec![Transformation::range(start, end), text(" ")],
        None => Vec::new(),
    }
}

fn is_self_or_dynamic(element: &Element) -> bool {
    matches!(element.name.as_str(), "svelte:self" | "svelte:component")
}

impl TemplateTransformer<'_> {
    // ───────────────────────────────────────────────────────────────────────────
    // Enter: analysis, scopes and slot wiring
    // ───────────────────────────────────────────────────────────────────────────

    pub(crate) fn enter_element_like(
        &mut self,
        node: &TemplateNode,
        parent: Option<&TemplateNode>,
    ) -> Result<()> {
        let Some(element) = node.as_element() else {
            return Ok(());
        };
        let is_component = matches!(node, TemplateNode::InlineComponent(_));
        let lets: Vec<&Directive> = element.let_directives().collect();
        let slot_attribute = element.slot_attribute();

        if is_component {
            let id = self.next_id();
            if let Some(frame) = self.frame_mut() {
                frame.component_id = Some(id);
            }
        }

        // Children with `slot="x"` (and every svelte:fragment) read their lets from
        // the parent component's slot definition.
        let consumes_parent_slot = !lets.is_empty()
            && (matches!(node, TemplateNode::SlotTemplate(_)) || slot_attribute.is_some());
        if consumes_parent_slot {
            let parent_component = match parent {
                Some(TemplateNode::InlineComponent(_)) => self
                    .frames
                    .len()
                    .checked_sub(2)
                    .and_then(|i| self.frames.get(i))
                    .and_then(|f| f.component_id),
                _ => None,
            };
            let Some(component_id) = parent_component else {
                return Err(self.invalid_let(lets[0]));
            };
            let slot_name = self.slot_name(slot_attribute)?;
            self.push_scope();
            self.bind_lets(element, &lets)?;
            if let Some(frame) = self.frame_mut() {
                frame.slot_target = Some(SlotTarget {
                    component_id,
                    slot_name,
                });
            }
        } else if !lets.is_empty() && !is_component {
            return Err(self.invalid_let(lets[0]));
        }

        if let Some(this) = element.expression {
            self.js(this, JsKind::Expression, node.kind())?;
        }
        if let Some(ElementTag::Dynamic(tag)) = &element.tag {
            self.js(*tag, JsKind::Expression, node.kind())?;
        }

        if matches!(node, TemplateNode::Slot(_)) {
            self.enter_slot(element)?;
        } else {
            self.analyze_attributes(element, is_component, node.kind())?;
        }

        if is_component && !consumes_parent_slot && !lets.is_empty() {
            self.push_scope();
            self.bind_lets(element, &lets)?;
        }
        Ok(())
    }

    fn push_scope(&mut self) {
        self.scopes.child();
        if let Some(frame) = self.frame_mut() {
            frame.scope_pushed = true;
        }
    }

    fn invalid_let(&self, directive: &Directive) -> TransformError {
        TransformError::structural(
            CompilerError::at(
                ERR_INVALID_LET,
                "let: directives are only valid on components and on their slotted children",
                self.file,
                self.source,
                directive.start,
                directive.end,
            )
            .with_hint("Move the directive onto the component, or give the element a slot attribute inside one."),
        )
    }

    fn bind_lets(&mut self, element: &Element, lets: &[&Directive]) -> Result<()> {
        let mut names = Vec::new();
        for directive in lets {
            match directive.expression {
                Some(pattern) => {
                    if let Some(parsed) = self.js(pattern, JsKind::Pattern, "Let")? {
                        names.extend(parsed.analysis.binding_names());
                    }
                }
                None => names.push(directive.name.clone()),
            }
        }
        self.bind(
            &names,
            OwnerKind::SlotLet,
            (element.start, element.end),
            |_| Some(ANY_NULL.to_string()),
        );
        Ok(())
    }

    /// Static slot name; `{NAME}` resolves through a top-level string constant.
    pub(crate) fn slot_name(&self, attribute: Option<&Attribute>) -> Result<String> {
        let Some(attribute) = attribute else {
            return Ok("default".to_string());
        };
        if let Some(value) = attribute.static_value() {
            return Ok(value);
        }
        let expression = match &attribute.value {
            AttributeValue::Parts(parts) => match parts.as_slice() {
                [AttributeValuePart::MustacheTag(tag)] => Some(tag.expression),
                [AttributeValuePart::AttributeShorthand(short)] => Some(short.expression),
                _ => None,
            },
            AttributeValue::Flag(_) => None,
        };
        if let Some(expression) = expression {
            let name = expression.text(self.source).trim();
            if let Some(value) = self.script.string_consts.get(name) {
                return Ok(value.clone());
            }
        }
        let (start, end) = expression
            .map(|e| (e.start, e.end))
            .unwrap_or((attribute.start, attribute.end));
        Err(TransformError::structural(
            CompilerError::at(
                ERR_DYNAMIC_SLOT_NAME,
                "Slot names must be static, or a constant initialized with a string literal",
                self.file,
                self.source,
                start,
                end,
            )
            .with_hint("Use a string literal, or declare `const NAME = \"...\"` at the top level of a script."),
        ))
    }

    fn analyze_value(&mut self, value: &AttributeValue, node: &str) -> Result<Vec<Option<Parsed>>> {
        let mut parsed = Vec::new();
        if let AttributeValue::Parts(parts) = value {
            for part in parts {
                match part {
                    AttributeValuePart::MustacheTag(tag) => {
                        parsed.push(self.js(tag.expression, JsKind::Expression, node)?)
                    }
                    AttributeValuePart::AttributeShorthand(short) => {
                        parsed.push(self.js(short.expression, JsKind::Expression, node)?)
                    }
                    AttributeValuePart::Text(_) => parsed.push(None),
                }
            }
        }
        Ok(parsed)
    }

    fn analyze_attributes(&mut self, element: &Element, is_component: bool, node: &str) -> Result<()> {
        for attribute in &element.attributes {
            match attribute {
                AttributeNode::Attribute(attr) => {
                    self.analyze_value(&attr.value, node)?;
                }
                AttributeNode::StyleDirective(style) => {
                    self.analyze_value(&style.value, node)?;
                }
                AttributeNode::Spread(spread) => {
                    self.js(spread.expression, JsKind::Expression, node)?;
                }
                AttributeNode::Binding(directive) => {
                    let Some(expression) = directive.expression else {
                        continue;
                    };
                    let as_statement = !is_component
                        && (directive.name == "this"
                            || READONLY_BINDINGS.contains(directive.name.as_str()));
                    if as_statement && self.bare_store(expression).is_some() {
                        continue;
                    }
                    self.js_target(expression, node)?;
                }
                AttributeNode::EventHandler(directive)
                | AttributeNode::Class(directive)
                | AttributeNode::Action(directive)
                | AttributeNode::Transition(directive)
                | AttributeNode::Animation(directive) => {
                    if let Some(expression) = directive.expression {
                        self.js(expression, JsKind::Expression, node)?;
                    }
                }
                AttributeNode::Let(_) | AttributeNode::Unknown => {}
            }
        }
        Ok(())
    }

    /// `$name` written as the whole expression, naming a store.
    fn bare_store(&self, span: JsSpan) -> Option<String> {
        let text = span.text(self.source).trim();
        (is_store_name(text) && is_identifier(text) && !self.is_declared(text))
            .then(|| text[1..].to_string())
    }

    fn enter_slot(&mut self, element: &Element) -> Result<()> {
        let name_attribute = element.attributes.iter().find_map(|a| match a {
            AttributeNode::Attribute(attr) if attr.name == "name" => Some(attr),
            _ => None,
        });
        let name = self.slot_name(name_attribute)?;
        let mut definition = Vec::new();
        for attribute in &element.attributes {
            match attribute {
                AttributeNode::Attribute(attr) if attr.name != "name" && attr.name != "slot" => {
                    let parsed = self.analyze_value(&attr.value, "Slot")?;
                    let resolved = self.resolve_value(&attr.value, &parsed);
                    definition.push((attr.name.clone(), resolved));
                }
                AttributeNode::Attribute(attr) => {
                    self.analyze_value(&attr.value, "Slot")?;
                }
                AttributeNode::Spread(spread) => {
                    self.js(spread.expression, JsKind::Expression, "Slot")?;
                }
                _ => {}
            }
        }
        self.script.slots.add(&name, definition);
        Ok(())
    }

    fn resolve_value(&self, value: &AttributeValue, parsed: &[Option<Parsed>]) -> String {
        let AttributeValue::Parts(parts) = value else {
            return "true".to_string();
        };
        let resolved: Vec<(bool, String)> = parts
            .iter()
            .zip(parsed)
            .map(|(part, parsed)| match part {
                AttributeValuePart::Text(t) => (false, t.data.clone()),
                AttributeValuePart::MustacheTag(tag) => {
                    (true, self.resolve(tag.expression, parsed.as_ref()))
                }
                AttributeValuePart::AttributeShorthand(short) => {
                    (true, self.resolve(short.expression, parsed.as_ref()))
                }
            })
            .collect();
        match resolved.as_slice() {
            [] => "\"\"".to_string(),
            [(false, value)] => json(value),
            [(true, value)] => value.clone(),
            _ => {
                let body: String = resolved
                    .iter()
                    .map(|(is_expr, value)| {
                        if *is_expr {
                            format!("${{{}}}", value)
                        } else {
                            escape_template(value)
                        }
                    })
                    .collect();
                format!("`{}`", body)
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Leave: output
    // ───────────────────────────────────────────────────────────────────────────

    pub(crate) fn leave_element_like(
        &mut self,
        node: &TemplateNode,
        frame: &NodeFrame,
    ) -> Result<Vec<Transformation>> {
        let Some(element) = node.as_element() else {
            return Ok(Vec::new());
        };
        let body = match node {
            TemplateNode::InlineComponent(_) => self.component_items(element, frame),
            TemplateNode::Slot(_) => self.slot_items(element)?,
            TemplateNode::SlotTemplate(_) => {
                let mut items = vec![text("{ ")];
                items.extend(children_items(element));
                items.push(text("}"));
                items
            }
            _ => self.element_items(element),
        };
        let Some(target) = &frame.slot_target else {
            return Ok(body);
        };
        let slot_def = format!(
            "$$_c{}.$$slot_def[{}]",
            target.component_id,
            json(&target.slot_name)
        );
        let mut items = vec![text(Self::capture_text(frame)), text("{ ")];
        items.extend(self.let_declarations(element, &slot_def));
        items.extend(body);
        items.push(text(" }"));
        Ok(items)
    }

    /// `const {a, b: c} = <slot_def>;` for the element's `let:` directives. Pattern
    /// lets (`let:{a, b}`) destructure the whole definition.
    fn let_declarations(&self, element: &Element, slot_def: &str) -> Vec<Transformation> {
        let mut fields = Vec::new();
        let mut patterns = Vec::new();
        for directive in element.let_directives() {
            match directive.expression {
                Some(pattern) if directive.name.is_empty() => patterns.push(pattern),
                Some(pattern) => fields.push(vec![
                    text(format!("{}: ", quote_key(&directive.name))),
                    Transformation::range(pattern.start, pattern.end),
                ]),
                None => {
                    let (start, end) = directive.name_span(self.source);
                    fields.push(vec![Transformation::range(start, end)]);
                }
            }
        }
        let mut items = Vec::new();
        if !fields.is_empty() {
            items.push(text("const {"));
            items.extend(join(fields));
            items.push(text(format!("}} = {}; ", slot_def)));
        }
        for pattern in patterns {
            items.push(text("const "));
            items.push(Transformation::range(pattern.start, pattern.end));
            items.push(text(format!(" = {}; ", slot_def)));
        }
        items
    }

    fn attribute_key(&self, element: &Element, name: &str) -> String {
        let preserve = self.namespace.preserves_case()
            || name.contains(':')
            || SVG_ELEMENTS.contains(element.name.to_ascii_lowercase().as_str());
        if preserve {
            json(name)
        } else {
            json(&name.to_ascii_lowercase())
        }
    }

    fn value_items(&self, value: &AttributeValue) -> Vec<Transformation> {
        let AttributeValue::Parts(parts) = value else {
            return vec![text("true")];
        };
        match parts.as_slice() {
            [] => vec![text("\"\"")],
            [AttributeValuePart::Text(t)] => vec![text(json(&t.data))],
            [AttributeValuePart::MustacheTag(tag)] => vec![self.expr_item(tag.expression)],
            [AttributeValuePart::AttributeShorthand(short)] => {
                vec![self.expr_item(short.expression)]
            }
            _ => {
                let mut items = vec![text("`")];
                for part in parts {
                    match part {
                        AttributeValuePart::Text(t) => items.push(text(escape_template(&t.data))),
                        AttributeValuePart::MustacheTag(tag) => {
                            items.push(text("${"));
                            items.push(self.expr_item(tag.expression));
                            items.push(text("}"));
                        }
                        AttributeValuePart::AttributeShorthand(short) => {
                            items.push(text("${"));
                            items.push(self.expr_item(short.expression));
                            items.push(text("}"));
                        }
                    }
                }
                items.push(text("`"));
                items
            }
        }
    }

    fn tag_name(&self, element: &Element) -> String {
        match &element.tag {
            Some(ElementTag::Static(tag)) if !tag.is_empty() => tag.clone(),
            Some(_) => "svelte:element".to_string(),
            None => element.name.clone(),
        }
    }

    /// `name(svelteHTML.mapElementTag("tag")<extra>, (params))` for use/transition/animate.
    fn directive_call(
        &self,
        helper: &str,
        element: &Element,
        directive: &Directive,
        extra: &str,
    ) -> Vec<Transformation> {
        let (name_start, name_end) = directive.name_span(self.source);
        let mut items = vec![
            text(format!("{}(", helper)),
            Transformation::range(name_start, name_end),
            text(format!(
                "(svelteHTML.mapElementTag({}){}",
                json(&self.tag_name(element)),
                extra
            )),
        ];
        if let Some(expression) = directive.expression {
            items.push(text(", ("));
            items.push(self.expr_item(expression));
            items.push(text(")"));
        }
        items.push(text(")); "));
        items
    }

    /// `x = value;`, or `store.set(value);` when `x` is a bare store.
    fn assign_back(&self, expression: JsSpan, value: &str) -> Vec<Transformation> {
        match self.bare_store(expression) {
            Some(store) => vec![text(format!("{}.set({}); ", store, value))],
            None => vec![
                self.expr_item(expression),
                text(format!(" = {}; ", value)),
            ],
        }
    }

    fn element_items(&mut self, element: &Element) -> Vec<Transformation> {
        let needs_id = element.attributes.iter().any(
            |a| matches!(a, AttributeNode::Binding(d) if d.name == "this" && d.expression.is_some()),
        );
        let id = needs_id.then(|| self.next_id());
        let element_ref = id.map(|id| format!("$$_el{}", id));

        let mut entries: Vec<Vec<Transformation>> = Vec::new();
        let mut statements: Vec<Transformation> = Vec::new();
        for attribute in &element.attributes {
            match attribute {
                AttributeNode::Attribute(attr) => match &attr.value {
                    AttributeValue::Parts(parts)
                        if matches!(parts.as_slice(), [AttributeValuePart::AttributeShorthand(_)]) =>
                    {
                        let mut entry = vec![text(format!("{}: ", json(&attr.name)))];
                        entry.extend(self.value_items(&attr.value));
                        entries.push(entry);
                    }
                    _ => {
                        let mut entry =
                            vec![text(format!("{}: ", self.attribute_key(element, &attr.name)))];
                        entry.extend(self.value_items(&attr.value));
                        entries.push(entry);
                    }
                },
                AttributeNode::Spread(spread) => {
                    entries.push(vec![text("..."), self.expr_item(spread.expression)]);
                }
                AttributeNode::EventHandler(directive) => match directive.expression {
                    Some(expression) => entries.push(vec![
                        text(format!("{}: ", json(&format!("on:{}", directive.name)))),
                        self.expr_item(expression),
                    ]),
                    None => self.script.events.discover(
                        &directive.name,
                        format!("__sveltets_2_mapElementEvent({})", json(&directive.name)),
                    ),
                },
                AttributeNode::Binding(directive) => {
                    let Some(expression) = directive.expression else {
                        continue;
                    };
                    if directive.name == "this" {
                        let target = element_ref.clone().unwrap_or_else(|| ANY_NULL.to_string());
                        statements.extend(self.assign_back(expression, &target));
                    } else if READONLY_BINDINGS.contains(directive.name.as_str()) {
                        statements.extend(self.assign_back(expression, ANY_NULL));
                    } else {
                        entries.push(vec![
                            text(format!("{}: ", json(&format!("bind:{}", directive.name)))),
                            self.expr_item(expression),
                        ]);
                    }
                }
                AttributeNode::Class(directive) => {
                    if let Some(expression) = directive.expression {
                        entries.push(vec![
                            text(format!("{}: ", json(&format!("class:{}", directive.name)))),
                            self.expr_item(expression),
                        ]);
                    }
                }
                AttributeNode::StyleDirective(style) => {
                    let mut entry = vec![text(format!(
                        "{}: ",
                        json(&format!("style:{}", style.name))
                    ))];
                    match &style.value {
                        AttributeValue::Flag(_) => {
                            let name_start = style.start + "style:".len() as u32;
                            entry.push(Transformation::range(
                                name_start,
                                name_start + style.name.len() as u32,
                            ));
                        }
                        value => entry.extend(self.value_items(value)),
                    }
                    entries.push(entry);
                }
                AttributeNode::Action(directive) => {
                    statements.extend(self.directive_call(
                        "__sveltets_2_ensureAction",
                        element,
                        directive,
                        "",
                    ));
                }
                AttributeNode::Transition(directive) => {
                    statements.extend(self.directive_call(
                        "__sveltets_2_ensureTransition",
                        element,
                        directive,
                        "",
                    ));
                }
                AttributeNode::Animation(directive) => {
                    statements.extend(self.directive_call(
                        "__sveltets_2_ensureAnimation",
                        element,
                        directive,
                        ", __sveltets_2_AnimationMove",
                    ));
                }
                AttributeNode::Let(_) | AttributeNode::Unknown => {}
            }
        }

        let mut items = vec![text("{ ")];
        if let Some(element_ref) = &element_ref {
            items.push(text(format!("const {} = ", element_ref)));
        }
        items.push(text("svelteHTML.createElement("));
        match &element.tag {
            Some(ElementTag::Dynamic(tag)) => items.push(self.expr_item(*tag)),
            Some(ElementTag::Static(tag)) => items.push(text(json(tag))),
            None => {
                let (start, end) = element.name_span();
                items.push(text("\""));
                items.push(Transformation::range(start, end));
                items.push(text("\""));
            }
        }
        items.push(text(", "));
        if self.allow_any_attributes {
            items.push(text("__sveltets_2_anyBag("));
        }
        items.push(text("{"));
        items.extend(join(entries));
        items.push(text("}"));
        if self.allow_any_attributes {
            items.push(text(")"));
        }
        items.push(text("); "));
        items.extend(statements);
        items.extend(children_items(element));
        items.push(text("}"));
        items
    }

    fn component_items(&mut self, element: &Element, frame: &NodeFrame) -> Vec<Transformation> {
        let id = frame.component_id.unwrap_or_default();
        let instance = format!("$$_c{}", id);
        let untyped = is_self_or_dynamic(element);

        let mut props: Vec<Vec<Transformation>> = Vec::new();
        let mut statements: Vec<Transformation> = Vec::new();
        for attribute in &element.attributes {
            match attribute {
                AttributeNode::Attribute(attr) if attr.name == "slot" => {}
                AttributeNode::Attribute(attr) => {
                    let mut entry = vec![text(format!("{}: ", quote_key(&attr.name)))];
                    entry.extend(self.value_items(&attr.value));
                    props.push(entry);
                }
                AttributeNode::Spread(spread) => {
                    props.push(vec![text("..."), self.expr_item(spread.expression)]);
                }
                AttributeNode::EventHandler(directive) => match directive.expression {
                    Some(expression) => {
                        statements.push(text(format!(
                            "{}.$on({}, ",
                            instance,
                            json(&directive.name)
                        )));
                        statements.push(self.expr_item(expression));
                        statements.push(text("); "));
                    }
                    None => {
                        let type_text = if untyped {
                            ANY_NULL.to_string()
                        } else {
                            format!(
                                "__sveltets_2_bubbleEventDef(__sveltets_2_instanceOf({}).$$events_def, {})",
                                element.name,
                                json(&directive.name)
                            )
                        };
                        self.script.events.discover(&directive.name, type_text);
                    }
                },
                AttributeNode::Binding(directive) => {
                    let Some(expression) = directive.expression else {
                        continue;
                    };
                    if directive.name == "this" {
                        let value = if untyped { ANY_NULL } else { instance.as_str() };
                        statements.extend(self.assign_back(expression, value));
                    } else {
                        props.push(vec![
                            text(format!("{}: ", quote_key(&directive.name))),
                            self.expr_item(expression),
                        ]);
                        let back = match self.bare_store(expression) {
                            Some(store) => format!("{}.set({})", store, ANY_NULL),
                            None => format!("{} = {}", self.copy_text(expression), ANY_NULL),
                        };
                        statements.push(text(format!("() => {}; ", back)));
                    }
                }
                _ => {}
            }
        }

        let ctor = match element.name.as_str() {
            "svelte:self" => text(ANY_NULL),
            "svelte:component" => match element.expression {
                Some(expression) => self.expr_item(expression),
                None => text(ANY_NULL),
            },
            _ => {
                let (start, end) = element.name_span();
                Transformation::range(start, end)
            }
        };
        let mut items = vec![
            text(format!("{{ const $$_C{} = __sveltets_2_ensureComponent(", id)),
            ctor,
            text(format!(
                "); const {} = new $$_C{}({{ target: __sveltets_2_any(), props: {{",
                instance, id
            )),
        ];
        items.extend(join(props));
        items.push(text("} }); "));
        items.extend(statements);

        let owns_lets = frame.slot_target.is_none() && element.let_directives().next().is_some();
        if owns_lets || !element.children.is_empty() {
            if owns_lets {
                items.push(text(Self::capture_text(frame)));
            }
            items.push(text("{ "));
            if owns_lets {
                let slot_def = format!("{}.$$slot_def[\"default\"]", instance);
                items.extend(self.let_declarations(element, &slot_def));
            }
            items.extend(children_items(element));
            items.push(text("} "));
        }
        items.push(text("}"));
        items
    }

    fn slot_items(&self, element: &Element) -> Result<Vec<Transformation>> {
        let name_attribute = element.attributes.iter().find_map(|a| match a {
            AttributeNode::Attribute(attr) if attr.name == "name" => Some(attr),
            _ => None,
        });
        let name = self.slot_name(name_attribute)?;
        let mut entries = Vec::new();
        for attribute in &element.attributes {
            match attribute {
                AttributeNode::Attribute(attr) if attr.name != "name" && attr.name != "slot" => {
                    let mut entry = vec![text(format!("{}: ", json(&attr.name)))];
                    entry.extend(self.value_items(&attr.value));
                    entries.push(entry);
                }
                AttributeNode::Spread(spread) => {
                    entries.push(vec![text("..."), self.expr_item(spread.expression)]);
                }
                _ => {}
            }
        }
        let mut items = vec![text(format!(
            "{{ __sveltets_2_createSlot({}, {{",
            json(&name)
        ))];
        items.extend(join(entries));
        items.push(text("}); "));
        items.extend(children_items(element));
        items.push(text("}"));
        Ok(items)
    }

    /// Rewritten copy of an expression, for when its range is already used once.
    fn copy_text(&self, span: JsSpan) -> String {
        let text = span.text(self.source);
        match analyze(text, span.start, JsKind::Expression) {
            Ok(analysis) => {
                let edits: Vec<TextEdit> = unshadowed(&analysis.stores, |name| {
                    self.is_declared(name)
                })
                .flat_map(|site| site.edits())
                .collect();
                splice(text, span.start, &edits)
            }
            Err(_) => pattern_filler(text),
        }
    }
}
