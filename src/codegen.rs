//! Render function assembly
//!
//! Puts the rewritten scripts and template into one `render()` function, returns
//! the collected surface from it, and derives the default export from that
//! function's return type.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{AttributeNode, AttributeValue, Root, Script, TemplateNode};
use crate::buffer::{MappedSegment, RewriteBuffer};
use crate::exports::{quote_key, ExportedName, IndexedEvents, SlotDefinition};
use crate::options::{EmitMode, Namespace, TransformOptions};
use crate::script::{process_instance, scan_module, ScriptInfo};
use crate::sourcemap::to_source_map;
use crate::transform::TemplateTransformer;
use crate::validate::{BufferResultExt, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub code: String,
    /// Generated ranges and where they came from.
    pub map: Vec<MappedSegment>,
    /// v3 source map, when requested.
    pub map_json: Option<String>,
    pub exported_names: Vec<ExportedName>,
    pub events: IndexedEvents,
    pub slots: Vec<SlotDefinition>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS FROM THE TEMPLATE
// ═══════════════════════════════════════════════════════════════════════════════

/// `<svelte:options>` overrides for `accessors` and `namespace`.
fn apply_svelte_options(root: &Root, options: &mut TransformOptions) {
    let Some(element) = root.html.children.iter().find_map(|node| match node {
        TemplateNode::Options(element) => Some(element),
        _ => None,
    }) else {
        return;
    };
    for attribute in &element.attributes {
        let AttributeNode::Attribute(attr) = attribute else {
            continue;
        };
        match attr.name.as_str() {
            "accessors" => {
                options.accessors = match &attr.value {
                    AttributeValue::Flag(flag) => *flag,
                    _ => attr.static_value().as_deref() != Some("false"),
                };
            }
            "namespace" => {
                if let Some(namespace) = attr
                    .static_value()
                    .as_deref()
                    .and_then(Namespace::from_attribute)
                {
                    options.namespace = namespace;
                }
            }
            _ => {}
        }
    }
    debug!(
        accessors = options.accessors,
        namespace = ?options.namespace,
        "applied svelte:options"
    );
}

/// PascalCase of the file stem; `_` in front when it would start with a digit.
pub fn component_name(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = base.split('.').next().unwrap_or(base);
    let mut name = String::new();
    for word in stem.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '$') {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    if name.is_empty() {
        return "Input".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSEMBLY
// ═══════════════════════════════════════════════════════════════════════════════

/// Drop the `<script ...>` / `</script>` tags, keeping the content in place.
fn unwrap_script(buffer: &mut RewriteBuffer, script: &Script) -> Result<()> {
    buffer
        .remove(script.start, script.content.start)
        .in_node("Script", script.start, script.end)?;
    buffer
        .remove(script.content.end, script.end)
        .in_node("Script", script.start, script.end)
}

/// Implicit declarations for `$$props`, `$$restProps` and `$$slots`.
fn implicit_declarations(source: &str, info: &ScriptInfo) -> String {
    let mut out = String::new();
    if source.contains("$$props") {
        out.push_str("let $$props = __sveltets_2_allPropsType();\n");
    }
    if source.contains("$$restProps") {
        out.push_str("let $$restProps = __sveltets_2_restPropsType();\n");
    }
    if source.contains("$$slots") {
        let names: Vec<String> = info
            .slots
            .slots
            .iter()
            .map(|slot| format!("{}: ''", quote_key(&slot.name)))
            .collect();
        out.push_str(&format!(
            "let $$slots = __sveltets_2_slotsType({{{}}});\n",
            names.join(", ")
        ));
    }
    out
}

fn accessors(info: &ScriptInfo) -> String {
    info.exports
        .props()
        .map(|prop| {
            let key = quote_key(&prop.name);
            let access = if key == prop.name {
                format!(".{}", prop.name)
            } else {
                format!("[{}]", key)
            };
            format!(
                "    get {key}() {{ return this.$$prop_def{access} }}\n    /**accessor*/\n    set {key}(_) {{}}\n"
            )
        })
        .collect()
}

/// The wrapped `render()` call the default export is typed from.
fn render_call(info: &ScriptInfo) -> String {
    let mut call = "render()".to_string();
    if !info.events.is_strict() {
        call = format!("__sveltets_2_with_any_event({})", call);
    }
    let optional = info.exports.optional_names();
    if info.is_typescript || info.exports.props_interface || optional.is_empty() {
        format!("__sveltets_2_partial({})", call)
    } else {
        let names: Vec<String> = optional
            .iter()
            .map(|n| serde_json::to_string(n).unwrap_or_default())
            .collect();
        format!("__sveltets_2_partial([{}], {})", names.join(","), call)
    }
}

fn epilogue(info: &ScriptInfo, options: &TransformOptions, name: &str) -> String {
    let call = render_call(info);
    match options.mode {
        EmitMode::Dts => format!(
            "const __propDef = {call};\n\
             export type {name}Props = typeof __propDef.props;\n\
             export type {name}Events = typeof __propDef.events;\n\
             export type {name}Slots = typeof __propDef.slots;\n\n\
             export default class {name} extends SvelteComponentTyped<{name}Props, {name}Events, {name}Slots> {{\n{accessors}}}",
            accessors = if options.accessors { accessors(info) } else { String::new() },
        ),
        EmitMode::Full | EmitMode::Lint => {
            let body = if options.accessors && options.mode == EmitMode::Full {
                accessors(info)
            } else {
                String::new()
            };
            format!(
                "\nexport default class {name}__SvelteComponent_ extends __sveltets_2_createSvelte2TsxComponent({call}) {{\n{body}}}"
            )
        }
    }
}

/// Transpile a parsed component. `root` must carry the positions of `source`.
pub fn assemble(source: &str, root: &Root, options: &TransformOptions) -> Result<TransformOutput> {
    let mut options = options.clone();
    apply_svelte_options(root, &mut options);
    let file = options.file_label().to_string();

    let mut buffer = RewriteBuffer::new(source);
    let mut info = ScriptInfo {
        is_typescript: options.is_ts_file
            || root.instance.as_ref().map_or(false, Script::is_typescript),
        ..ScriptInfo::default()
    };

    if let Some(module) = &root.module {
        scan_module(&mut info, module, source, &file, options.strict)?;
    }
    if let Some(instance) = &root.instance {
        process_instance(&mut buffer, &mut info, instance, source, &file, options.strict)?;
    }

    {
        let mut walker = TemplateTransformer::new(
            source,
            &file,
            &mut buffer,
            &mut info,
            options.dialect,
        );
        walker.strict = options.strict;
        walker.allow_any_attributes = options.allow_any_attributes;
        walker.namespace = options.namespace;
        walker.run(&root.html.children)?;
    }

    if let Some(style) = &root.css {
        buffer
            .remove(style.start, style.end)
            .in_node("Style", style.start, style.end)?;
    }

    // Everything is prepended, so the pieces go in back to front.
    buffer.prepend(";\nasync () => {");
    if let Some(instance) = &root.instance {
        unwrap_script(&mut buffer, instance)?;
        buffer
            .move_to_front(instance.content.start, instance.content.end)
            .in_node("Script", instance.start, instance.end)?;
    }
    buffer.prepend(&format!(
        ";function render() {{\n{}",
        implicit_declarations(source, &info)
    ));
    for &(start, end) in info.imports.iter().rev() {
        buffer.prepend("\n");
        buffer
            .move_to_front(start, end)
            .in_node("ImportDeclaration", start, end)?;
    }
    if let Some(module) = &root.module {
        unwrap_script(&mut buffer, module)?;
        buffer.prepend("\n");
        buffer
            .move_to_front(module.content.start, module.content.end)
            .in_node("Script", module.start, module.end)?;
    }
    if options.mode == EmitMode::Dts {
        buffer.prepend("import { SvelteComponentTyped } from \"svelte\"\n");
    }
    if options.mode != EmitMode::Lint {
        buffer.prepend("///<reference types=\"svelte\" />\n");
    }

    buffer.append(&format!(
        "\n}};\nreturn {{ props: {}, events: {}, slots: {}, getters: {} }}}}\n",
        info.exports.render_props(info.is_typescript),
        info.events.render(),
        info.slots.render(),
        info.exports.render_getters(),
    ));
    let name = component_name(&file);
    buffer.append(&epilogue(&info, &options, &name));

    let rendered = buffer.render();
    let map_json = options
        .emit_source_map
        .then(|| to_source_map(source, &rendered, &file).to_json_string());
    debug!(
        file = %file,
        props = info.exports.names.len(),
        events = info.events.entries.len(),
        slots = info.slots.slots.len(),
        "assembled render function"
    );
    Ok(TransformOutput {
        code: rendered.text,
        map: rendered.mapping,
        map_json,
        exported_names: info.exports.names,
        events: info.events.entries,
        slots: info.slots.slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_name_from_filename() {
        assert_eq!(component_name("src/lib/my-button.svelte"), "MyButton");
        assert_eq!(component_name("C:\\app\\Card.svelte"), "Card");
        assert_eq!(component_name("404.svelte"), "_404");
        assert_eq!(component_name(""), "Input");
    }

    #[test]
    fn test_render_call_wrappers() {
        let mut info = ScriptInfo::default();
        assert_eq!(
            render_call(&info),
            "__sveltets_2_partial(__sveltets_2_with_any_event(render()))"
        );
        info.events.interface = true;
        assert_eq!(render_call(&info), "__sveltets_2_partial(render())");
    }
}
