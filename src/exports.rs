//! Exported surface: props, getters, events and slots collected during the walk,
//! rendered into the object literal `render()` returns.

use oxc_syntax::identifier::{is_identifier_part, is_identifier_start};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedName {
    pub name: String,
    /// Local identifier when re-exported under another name (`export { a as b }`).
    pub identifier: Option<String>,
    pub type_text: Option<String>,
    pub required: bool,
    pub doc: Option<String>,
    /// `false` for `export const/function/class`, which become getters.
    pub is_prop: bool,
}

impl ExportedName {
    pub fn local(&self) -> &str {
        self.identifier.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedNames {
    pub names: Vec<ExportedName>,
    /// `interface|type $$Props` is declared.
    pub props_interface: bool,
}

impl ExportedNames {
    pub fn add(&mut self, export: ExportedName) {
        if let Some(existing) = self.names.iter_mut().find(|e| e.name == export.name) {
            *existing = export;
        } else {
            self.names.push(export);
        }
    }

    pub fn props(&self) -> impl Iterator<Item = &ExportedName> {
        self.names.iter().filter(|e| e.is_prop)
    }

    pub fn getters(&self) -> impl Iterator<Item = &ExportedName> {
        self.names.iter().filter(|e| !e.is_prop)
    }

    fn value_object(&self) -> String {
        let entries: Vec<String> = self
            .props()
            .map(|e| format!("{}: {}", quote_key(&e.name), e.local()))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }

    fn type_literal(&self) -> String {
        let entries: Vec<String> = self
            .props()
            .map(|e| {
                let doc = e
                    .doc
                    .as_ref()
                    .map(|d| format!("/**{}*/", d))
                    .unwrap_or_default();
                let ty = e
                    .type_text
                    .clone()
                    .unwrap_or_else(|| format!("typeof {}", e.local()));
                let optional = if e.required { "" } else { "?" };
                format!("{}{}{}: {}", doc, quote_key(&e.name), optional, ty)
            })
            .collect();
        format!("{{{}}}", entries.join(", "))
    }

    /// The `props` member of the render return.
    pub fn render_props(&self, is_ts: bool) -> String {
        if self.props_interface {
            return format!(
                "{{...__sveltets_2_ensureRightProps<{}>(__sveltets_2_any(\"\") as $$Props)}} as $$Props",
                self.type_literal()
            );
        }
        if is_ts {
            format!("{} as {}", self.value_object(), self.type_literal())
        } else {
            self.value_object()
        }
    }

    pub fn render_getters(&self) -> String {
        let entries: Vec<String> = self
            .getters()
            .map(|e| format!("{}: {}", quote_key(&e.name), e.local()))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }

    /// Names `__sveltets_2_partial` should treat as optional (JS files only).
    pub fn optional_names(&self) -> Vec<&str> {
        self.props()
            .filter(|e| !e.required)
            .map(|e| e.name.as_str())
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub name: String,
    pub type_text: String,
}

/// Event name to payload type, in discovery order.
pub type IndexedEvents = Vec<EventEntry>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEvents {
    /// `interface|type $$Events` is declared; it overrides all discovery.
    pub interface: bool,
    /// Type arguments of typed `createEventDispatcher<...>()` calls.
    pub dispatcher_types: Vec<String>,
    pub entries: IndexedEvents,
}

impl ComponentEvents {
    /// Events are strictly declared when nothing was inferred from usage.
    pub fn is_strict(&self) -> bool {
        self.interface || !self.dispatcher_types.is_empty()
    }

    pub fn add(&mut self, name: &str, type_text: impl Into<String>) {
        if self.entries.iter().any(|e| e.name == name) {
            return;
        }
        self.entries.push(EventEntry {
            name: name.to_string(),
            type_text: type_text.into(),
        });
    }

    /// Usage-based discovery, ignored once `$$Events` is declared.
    pub fn discover(&mut self, name: &str, type_text: impl Into<String>) {
        if !self.interface {
            self.add(name, type_text);
        }
    }

    pub fn render(&self) -> String {
        if self.interface {
            return "{} as unknown as $$Events".to_string();
        }
        let mut parts: Vec<String> = self
            .dispatcher_types
            .iter()
            .map(|t| format!("...__sveltets_2_toEventTypings<{}>()", t))
            .collect();
        let typed_names: Vec<&str> = self
            .entries
            .iter()
            .filter(|e| e.type_text.starts_with("CustomEvent<"))
            .map(|e| e.name.as_str())
            .collect();
        for entry in &self.entries {
            if !self.dispatcher_types.is_empty() && typed_names.contains(&entry.name.as_str()) {
                continue;
            }
            parts.push(format!("{}: {}", quote_key(&entry.name), entry.type_text));
        }
        format!("{{{}}}", parts.join(", "))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SLOTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDefinition {
    pub name: String,
    /// Attribute name to an expression that is valid at the top of `render()`.
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDefinitions {
    pub slots: Vec<SlotDefinition>,
    /// `interface|type $$Slots` is declared.
    pub interface: bool,
}

impl SlotDefinitions {
    /// First definition of a slot name wins; later attributes are merged in.
    pub fn add(&mut self, name: &str, attributes: Vec<(String, String)>) {
        match self.slots.iter_mut().find(|s| s.name == name) {
            Some(slot) => {
                for (key, value) in attributes {
                    if !slot.attributes.iter().any(|(k, _)| *k == key) {
                        slot.attributes.push((key, value));
                    }
                }
            }
            None => self.slots.push(SlotDefinition {
                name: name.to_string(),
                attributes,
            }),
        }
    }

    pub fn render(&self) -> String {
        if self.interface {
            return "{} as unknown as $$Slots".to_string();
        }
        let slots: Vec<String> = self
            .slots
            .iter()
            .map(|slot| {
                let attributes: Vec<String> = slot
                    .attributes
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote_key(k), v))
                    .collect();
                format!("{}: {{{}}}", quote_key(&slot.name), attributes.join(", "))
            })
            .collect();
        format!("{{{}}}", slots.join(", "))
    }
}

/// Object key text: identifiers stay bare, everything else is single-quoted.
pub fn quote_key(name: &str) -> String {
    let mut chars = name.chars();
    let identifier = chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_part);
    if identifier {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}
