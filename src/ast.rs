//! Template AST
//!
//! Node shapes follow the legacy Svelte compiler AST so that JSON produced by an
//! external parser deserializes directly. Embedded JavaScript (expressions and
//! binding patterns) is only referenced by position; the engine re-parses the
//! source text with oxc when it needs structure.

use serde::{Deserialize, Serialize};

/// Position of an embedded JS/TS expression or pattern. Deserializes from any
/// ESTree node, extra fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JsSpan {
    pub start: u32,
    pub end: u32,
}

impl JsSpan {
    pub fn new(start: u32, end: u32) -> Self {
        JsSpan { start, end }
    }

    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROOT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    pub html: Fragment,
    #[serde(default)]
    pub instance: Option<Script>,
    #[serde(default)]
    pub module: Option<Script>,
    #[serde(default)]
    pub css: Option<Style>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub start: u32,
    pub end: u32,
    /// `"default"` or `"module"`.
    #[serde(default = "default_context")]
    pub context: String,
    pub content: JsSpan,
    #[serde(default)]
    pub lang: Option<String>,
}

fn default_context() -> String {
    "default".to_string()
}

impl Script {
    pub fn is_module(&self) -> bool {
        self.context == "module"
    }

    pub fn is_typescript(&self) -> bool {
        matches!(self.lang.as_deref(), Some("ts") | Some("typescript"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub start: u32,
    pub end: u32,
    pub content: JsSpan,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE NODES
// ═══════════════════════════════════════════════════════════════════════════════

/// One node of the markup tree. Kinds the engine does not know deserialize to
/// [`TemplateNode::Unknown`] and are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", from = "NodeRepr")]
pub enum TemplateNode {
    Text(Text),
    Comment(Comment),
    MustacheTag(MustacheTag),
    RawMustacheTag(MustacheTag),
    DebugTag(DebugTag),
    ConstTag(ConstTag),
    IfBlock(IfBlock),
    EachBlock(EachBlock),
    AwaitBlock(AwaitBlock),
    KeyBlock(KeyBlock),
    Element(Element),
    InlineComponent(Element),
    Slot(Element),
    SlotTemplate(Element),
    Head(Element),
    Title(Element),
    Window(Element),
    Body(Element),
    Document(Element),
    Options(Element),
    Unknown(UnknownNode),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownNode {
    #[serde(default)]
    pub kind: String,
    pub start: u32,
    pub end: u32,
}

impl TemplateNode {
    pub fn span(&self) -> (u32, u32) {
        match self {
            TemplateNode::Text(n) => (n.start, n.end),
            TemplateNode::Comment(n) => (n.start, n.end),
            TemplateNode::MustacheTag(n) | TemplateNode::RawMustacheTag(n) => (n.start, n.end),
            TemplateNode::DebugTag(n) => (n.start, n.end),
            TemplateNode::ConstTag(n) => (n.start, n.end),
            TemplateNode::IfBlock(n) => (n.start, n.end),
            TemplateNode::EachBlock(n) => (n.start, n.end),
            TemplateNode::AwaitBlock(n) => (n.start, n.end),
            TemplateNode::KeyBlock(n) => (n.start, n.end),
            TemplateNode::Element(n)
            | TemplateNode::InlineComponent(n)
            | TemplateNode::Slot(n)
            | TemplateNode::SlotTemplate(n)
            | TemplateNode::Head(n)
            | TemplateNode::Title(n)
            | TemplateNode::Window(n)
            | TemplateNode::Body(n)
            | TemplateNode::Document(n)
            | TemplateNode::Options(n) => (n.start, n.end),
            TemplateNode::Unknown(n) => (n.start, n.end),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            TemplateNode::Text(_) => "Text",
            TemplateNode::Comment(_) => "Comment",
            TemplateNode::MustacheTag(_) => "MustacheTag",
            TemplateNode::RawMustacheTag(_) => "RawMustacheTag",
            TemplateNode::DebugTag(_) => "DebugTag",
            TemplateNode::ConstTag(_) => "ConstTag",
            TemplateNode::IfBlock(_) => "IfBlock",
            TemplateNode::EachBlock(_) => "EachBlock",
            TemplateNode::AwaitBlock(_) => "AwaitBlock",
            TemplateNode::KeyBlock(_) => "KeyBlock",
            TemplateNode::Element(_) => "Element",
            TemplateNode::InlineComponent(_) => "InlineComponent",
            TemplateNode::Slot(_) => "Slot",
            TemplateNode::SlotTemplate(_) => "SlotTemplate",
            TemplateNode::Head(_) => "Head",
            TemplateNode::Title(_) => "Title",
            TemplateNode::Window(_) => "Window",
            TemplateNode::Body(_) => "Body",
            TemplateNode::Document(_) => "Document",
            TemplateNode::Options(_) => "Options",
            TemplateNode::Unknown(n) => &n.kind,
        }
    }

    /// Element-like nodes, whatever their flavour.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            TemplateNode::Element(n)
            | TemplateNode::InlineComponent(n)
            | TemplateNode::Slot(n)
            | TemplateNode::SlotTemplate(n)
            | TemplateNode::Head(n)
            | TemplateNode::Title(n)
            | TemplateNode::Window(n)
            | TemplateNode::Body(n)
            | TemplateNode::Document(n)
            | TemplateNode::Options(n) => Some(n),
            _ => None,
        }
    }
}

/// Span from the first child's start to the last child's end.
pub fn children_span(children: &[TemplateNode]) -> Option<(u32, u32)> {
    let first = children.first()?.span().0;
    let last = children.last()?.span().1;
    Some((first, last))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MustacheTag {
    pub start: u32,
    pub end: u32,
    pub expression: JsSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTag {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub identifiers: Vec<JsSpan>,
}

/// `{@const x = y}`; `expression` spans the assignment `x = y`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstTag {
    pub start: u32,
    pub end: u32,
    pub expression: JsSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfBlock {
    pub start: u32,
    pub end: u32,
    pub expression: JsSpan,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
    #[serde(default, rename = "else")]
    pub else_block: Option<ElseBlock>,
    /// Set on the `IfBlock` that an `{:else if}` clause desugars to.
    #[serde(default)]
    pub elseif: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElseBlock {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

impl ElseBlock {
    /// The nested `IfBlock` when this else is really an `{:else if}`.
    pub fn else_if(&self) -> Option<&IfBlock> {
        match self.children.as_slice() {
            [TemplateNode::IfBlock(block)] if block.elseif => Some(block),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EachBlock {
    pub start: u32,
    pub end: u32,
    pub expression: JsSpan,
    #[serde(default)]
    pub context: Option<JsSpan>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub key: Option<JsSpan>,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
    #[serde(default, rename = "else")]
    pub else_block: Option<ElseBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwaitBlock {
    pub start: u32,
    pub end: u32,
    pub expression: JsSpan,
    #[serde(default)]
    pub value: Option<JsSpan>,
    #[serde(default)]
    pub error: Option<JsSpan>,
    #[serde(default)]
    pub pending: AwaitBranch,
    #[serde(default)]
    pub then: AwaitBranch,
    #[serde(default)]
    pub catch: AwaitBranch,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AwaitBranch {
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub end: Option<u32>,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
    #[serde(default)]
    pub skip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBlock {
    pub start: u32,
    pub end: u32,
    pub expression: JsSpan,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
}

/// Any tag: DOM elements, components, `<slot>`, and the `svelte:*` specials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub start: u32,
    pub end: u32,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeNode>,
    #[serde(default)]
    pub children: Vec<TemplateNode>,
    /// `this={...}` of `<svelte:component>`.
    #[serde(default)]
    pub expression: Option<JsSpan>,
    /// `this` of `<svelte:element>`.
    #[serde(default)]
    pub tag: Option<ElementTag>,
}

impl Element {
    /// Position of the tag name right after `<`.
    pub fn name_span(&self) -> (u32, u32) {
        let start = self.start + 1;
        (start, start + self.name.len() as u32)
    }

    /// Static value of the `slot="..."` attribute, if present.
    pub fn slot_attribute(&self) -> Option<&Attribute> {
        self.attributes.iter().find_map(|attr| match attr {
            AttributeNode::Attribute(a) if a.name == "slot" => Some(a),
            _ => None,
        })
    }

    pub fn let_directives(&self) -> impl Iterator<Item = &Directive> {
        self.attributes.iter().filter_map(|attr| match attr {
            AttributeNode::Let(d) => Some(d),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementTag {
    Static(String),
    Dynamic(JsSpan),
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES & DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttributeNode {
    Attribute(Attribute),
    Spread(Spread),
    EventHandler(Directive),
    Binding(Directive),
    Class(Directive),
    StyleDirective(StyleDirective),
    Transition(Directive),
    Action(Directive),
    Animation(Directive),
    Let(Directive),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub start: u32,
    pub end: u32,
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn name_span(&self) -> (u32, u32) {
        (self.start, self.start + self.name.len() as u32)
    }

    /// Plain text value (`name="text"` or a bare `name`), if the value has no expressions.
    pub fn static_value(&self) -> Option<String> {
        match &self.value {
            AttributeValue::Flag(_) => Some(String::new()),
            AttributeValue::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    AttributeValuePart::Text(text) => Some(text.data.as_str()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(|texts| texts.concat()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Parts(Vec<AttributeValuePart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AttributeValuePart {
    Text(Text),
    MustacheTag(MustacheTag),
    AttributeShorthand(Shorthand),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shorthand {
    pub start: u32,
    pub end: u32,
    pub expression: JsSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spread {
    pub start: u32,
    pub end: u32,
    pub expression: JsSpan,
}

/// `prefix:name|modifiers={expression}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub start: u32,
    pub end: u32,
    pub name: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub expression: Option<JsSpan>,
    #[serde(default)]
    pub intro: bool,
    #[serde(default)]
    pub outro: bool,
}

impl Directive {
    /// Position of `name`, which follows the `prefix:` of the directive.
    pub fn name_span(&self, source: &str) -> (u32, u32) {
        let text = source
            .get(self.start as usize..self.end as usize)
            .unwrap_or_default();
        let offset = text.find(':').map(|i| i as u32 + 1).unwrap_or(0);
        let start = self.start + offset;
        (start, start + self.name.len() as u32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDirective {
    pub start: u32,
    pub end: u32,
    pub name: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub value: AttributeValue,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DESERIALIZATION WITH AN UNKNOWN FALLBACK
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeRepr {
    Known(KnownNode),
    Unknown {
        #[serde(rename = "type", default)]
        kind: String,
        start: u32,
        end: u32,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum KnownNode {
    Text(Text),
    Comment(Comment),
    MustacheTag(MustacheTag),
    RawMustacheTag(MustacheTag),
    DebugTag(DebugTag),
    ConstTag(ConstTag),
    IfBlock(IfBlock),
    EachBlock(EachBlock),
    AwaitBlock(AwaitBlock),
    KeyBlock(KeyBlock),
    Element(Element),
    InlineComponent(Element),
    Slot(Element),
    SlotTemplate(Element),
    Head(Element),
    Title(Element),
    Window(Element),
    Body(Element),
    Document(Element),
    Options(Element),
}

impl From<NodeRepr> for TemplateNode {
    fn from(repr: NodeRepr) -> Self {
        let known = match repr {
            NodeRepr::Known(known) => known,
            NodeRepr::Unknown { kind, start, end } => {
                return TemplateNode::Unknown(UnknownNode { kind, start, end })
            }
        };
        match known {
            KnownNode::Text(n) => TemplateNode::Text(n),
            KnownNode::Comment(n) => TemplateNode::Comment(n),
            KnownNode::MustacheTag(n) => TemplateNode::MustacheTag(n),
            KnownNode::RawMustacheTag(n) => TemplateNode::RawMustacheTag(n),
            KnownNode::DebugTag(n) => TemplateNode::DebugTag(n),
            KnownNode::ConstTag(n) => TemplateNode::ConstTag(n),
            KnownNode::IfBlock(n) => TemplateNode::IfBlock(n),
            KnownNode::EachBlock(n) => TemplateNode::EachBlock(n),
            KnownNode::AwaitBlock(n) => TemplateNode::AwaitBlock(n),
            KnownNode::KeyBlock(n) => TemplateNode::KeyBlock(n),
            KnownNode::Element(n) => TemplateNode::Element(n),
            KnownNode::InlineComponent(n) => TemplateNode::InlineComponent(n),
            KnownNode::Slot(n) => TemplateNode::Slot(n),
            KnownNode::SlotTemplate(n) => TemplateNode::SlotTemplate(n),
            KnownNode::Head(n) => TemplateNode::Head(n),
            KnownNode::Title(n) => TemplateNode::Title(n),
            KnownNode::Window(n) => TemplateNode::Window(n),
            KnownNode::Body(n) => TemplateNode::Body(n),
            KnownNode::Document(n) => TemplateNode::Document(n),
            KnownNode::Options(n) => TemplateNode::Options(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_legacy_shapes() {
        let json = r#"{
            "type": "IfBlock", "start": 0, "end": 20, "elseif": false,
            "expression": { "type": "Identifier", "start": 5, "end": 6, "name": "a" },
            "children": [ { "type": "Text", "start": 7, "end": 8, "data": "X" } ],
            "else": { "type": "ElseBlock", "start": 15, "end": 15, "children": [] }
        }"#;
        let node: TemplateNode = serde_json::from_str(json).unwrap();
        match node {
            TemplateNode::IfBlock(block) => {
                assert_eq!(block.expression, JsSpan::new(5, 6));
                assert_eq!(block.children.len(), 1);
                assert!(block.else_block.is_some());
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_keeps_span() {
        let json = r#"{ "type": "SnippetBlock", "start": 3, "end": 9, "children": [] }"#;
        let node: TemplateNode = serde_json::from_str(json).unwrap();
        assert!(matches!(node, TemplateNode::Unknown(_)));
        assert_eq!(node.span(), (3, 9));
        assert_eq!(node.kind(), "SnippetBlock");
    }

    #[test]
    fn test_attribute_values() {
        let json = r#"[
            { "type": "Attribute", "start": 0, "end": 8, "name": "disabled", "value": true },
            { "type": "Attribute", "start": 9, "end": 18, "name": "id", "value": [
                { "type": "Text", "start": 13, "end": 17, "data": "main" } ] },
            { "type": "EventHandler", "start": 19, "end": 30, "name": "click", "modifiers": [],
              "expression": null },
            { "type": "Ref", "start": 31, "end": 35 }
        ]"#;
        let attrs: Vec<AttributeNode> = serde_json::from_str(json).unwrap();
        assert!(matches!(&attrs[0], AttributeNode::Attribute(a) if matches!(a.value, AttributeValue::Flag(true))));
        match &attrs[1] {
            AttributeNode::Attribute(a) => assert_eq!(a.static_value().as_deref(), Some("main")),
            _ => panic!("expected attribute"),
        }
        assert!(matches!(&attrs[2], AttributeNode::EventHandler(d) if d.expression.is_none()));
        assert!(matches!(attrs[3], AttributeNode::Unknown));
    }
}
