#[cfg(test)]
mod tests {
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    use crate::options::{Dialect, Namespace, TransformOptions};
    use crate::validate::{ERR_DYNAMIC_SLOT_NAME, ERR_INVALID_LET};
    use crate::{svelte2tsx, TransformOutput};

    fn tsx(source: &str) -> TransformOutput {
        svelte2tsx(source, &TransformOptions::default()).unwrap()
    }

    fn assert_valid_ts(code: &str) {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, code, SourceType::ts()).parse();
        assert!(ret.errors.is_empty(), "{:?}\n--- generated ---\n{}", ret.errors, code);
    }

    // Elements

    #[test]
    fn test_element_attributes_and_folding() {
        let out = tsx(
            r##"<div onClick={go} data-id="a{id}b" hidden {title}></div><svg viewBox="0 0 1 1"><path xlink:href="#a" /></svg>"##,
        );
        assert!(out.code.contains(
            r#"svelteHTML.createElement("div", {"onclick": go, "data-id": `a${id}b`, "hidden": true, "title": title});"#
        ));
        assert!(out.code.contains(r#"svelteHTML.createElement("svg", {"viewBox": "0 0 1 1"});"#));
        assert!(out.code.contains(r##"svelteHTML.createElement("path", {"xlink:href": "#a"});"##));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_foreign_namespace_keeps_case() {
        let out = svelte2tsx(
            "<svelte:options namespace=\"foreign\" />\n<Label textAlign=\"left\" /><div fontSize={12} />",
            &TransformOptions::default(),
        )
        .unwrap();
        assert!(out.code.contains(r#"{"fontSize": 12}"#));

        let svg = svelte2tsx(
            "<div strokeWidth={2} />",
            &TransformOptions {
                namespace: Namespace::Svg,
                ..TransformOptions::default()
            },
        )
        .unwrap();
        assert!(svg.code.contains(r#"{"strokeWidth": 2}"#));
    }

    #[test]
    fn test_any_bag_wraps_attributes() {
        let out = svelte2tsx(
            "<div custom-thing={1} />",
            &TransformOptions {
                allow_any_attributes: true,
                ..TransformOptions::default()
            },
        )
        .unwrap();
        assert!(out
            .code
            .contains(r#"svelteHTML.createElement("div", __sveltets_2_anyBag({"custom-thing": 1}));"#));
    }

    #[test]
    fn test_element_directives() {
        let source = r#"<script>let el; let w; let value;</script>
<input bind:this={el} bind:clientWidth={w} bind:value on:input={handle} on:focus class:active={on} style:color="red" use:tooltip={text} transition:fade animate:flip={{ duration: 200 }} />"#;
        let out = tsx(source);
        assert!(out.code.contains(r#"const $$_el0 = svelteHTML.createElement("input", {"bind:value": value, "on:input": handle, "class:active": on, "style:color": "red"});"#));
        assert!(out.code.contains("el = $$_el0;"));
        assert!(out.code.contains("w = __sveltets_2_any(null);"));
        assert!(out.code.contains(r#"__sveltets_2_ensureAction(tooltip(svelteHTML.mapElementTag("input"), (text)));"#));
        assert!(out.code.contains(r#"__sveltets_2_ensureTransition(fade(svelteHTML.mapElementTag("input")));"#));
        assert!(out.code.contains(r#"__sveltets_2_ensureAnimation(flip(svelteHTML.mapElementTag("input"), __sveltets_2_AnimationMove, ({ duration: 200 })));"#));
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].name, "focus");
        assert_eq!(out.events[0].type_text, r#"__sveltets_2_mapElementEvent("focus")"#);
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_bind_this_to_bare_store() {
        let source = "<script>import { writable } from 'svelte/store'; const node = writable(null);</script>\n<div bind:this={$node} />";
        let out = tsx(source);
        assert!(out.code.contains("node.set($$_el0);"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_special_elements() {
        let out = tsx("<svelte:window on:resize={onResize} /><svelte:element this={tag} class=\"x\" /><svelte:head><title>{name}</title></svelte:head>");
        assert!(out.code.contains(r#"svelteHTML.createElement("svelte:window", {"on:resize": onResize});"#));
        assert!(out.code.contains(r#"svelteHTML.createElement(tag, {"class": "x"});"#));
        assert!(out.code.contains(r#"svelteHTML.createElement("title", {}); name; }"#));
        assert_valid_ts(&out.code);
    }

    // Components

    #[test]
    fn test_component_props_events_and_bindings() {
        let source = "<script>import Field from './Field.svelte'; let text = '';</script>\n<Field label=\"Name\" bind:value={text} on:change={save} on:blur />";
        let out = tsx(source);
        assert!(out.code.contains("const $$_C0 = __sveltets_2_ensureComponent(Field); const $$_c0 = new $$_C0({ target: __sveltets_2_any(), props: {label: \"Name\", value: text} });"));
        assert!(out.code.contains("$$_c0.$on(\"change\", save);"));
        assert!(out.code.contains("() => text = __sveltets_2_any(null);"));
        assert_eq!(out.events[0].name, "blur");
        assert_eq!(
            out.events[0].type_text,
            "__sveltets_2_bubbleEventDef(__sveltets_2_instanceOf(Field).$$events_def, \"blur\")"
        );
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_component_default_slot_lets() {
        let out = tsx("<List items={rows} let:item let:index={i}>{item}{i}</List>{item}");
        assert!(out.code.contains(
            "{ const {item, index: i} = $$_c0.$$slot_def[\"default\"]; item;i; } }"
        ));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_named_slot_destructured_let() {
        let source = "<Table>\n<svelte:fragment slot=\"row\" let:{a, b}>{a}{b}</svelte:fragment>\n</Table>";
        let out = tsx(source);
        assert!(out.code.contains("{ const {a, b} = $$_c0.$$slot_def[\"row\"]; { a;b; } }"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_slotted_element_with_let() {
        let out = tsx("<Menu><li slot=\"item\" let:entry>{entry.label}</li></Menu>");
        assert!(out.code.contains(
            "{ const {entry} = $$_c0.$$slot_def[\"item\"]; { svelteHTML.createElement(\"li\", {\"slot\": \"item\"}); entry.label; } }"
        ));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_slot_let_aliases_shadowed_condition() {
        let out = svelte2tsx(
            "{#if item}<List let:item>{#each item.tags as tag}{tag}{/each}</List>{/if}",
            &TransformOptions {
                dialect: Dialect::Closures,
                ..TransformOptions::default()
            },
        )
        .unwrap();
        // The capture precedes the block that destructures `item`.
        assert!(out.code.contains(
            "const $$_item0 = item; { const {item} = $$_c0.$$slot_def[\"default\"];"
        ));
        assert!(out.code.contains("if (!(($$_item0))) return;"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_self_and_dynamic_components_are_untyped() {
        let out = tsx("<script>let me; let other;</script>\n<svelte:self bind:this={me} depth={1} /><svelte:component this={View} bind:this={other} />");
        assert!(out.code.contains("__sveltets_2_ensureComponent(__sveltets_2_any(null)); const $$_c0"));
        assert!(out.code.contains("me = __sveltets_2_any(null);"));
        assert!(out.code.contains("__sveltets_2_ensureComponent(View); const $$_c1"));
        assert!(out.code.contains("other = __sveltets_2_any(null);"));
        assert_valid_ts(&out.code);
    }

    // Slots

    #[test]
    fn test_slot_definitions_resolve_template_bindings() {
        let source = "<script>export let items = [];</script>\n{#each items as item, i}<slot {item} index={i} label=\"row {i}\" />{/each}<slot name=\"footer\" open />";
        let out = tsx(source);
        assert_eq!(out.slots.len(), 2);
        assert_eq!(out.slots[0].name, "default");
        assert_eq!(
            out.slots[0].attributes,
            vec![
                ("item".to_string(), "(__sveltets_2_unwrapArr(items))".to_string()),
                ("index".to_string(), "(0)".to_string()),
                ("label".to_string(), "`row ${(0)}`".to_string()),
            ]
        );
        assert_eq!(out.slots[1].attributes, vec![("open".to_string(), "true".to_string())]);
        assert!(out.code.contains("__sveltets_2_createSlot(\"default\", {\"item\": item, \"index\": i, \"label\": `row ${i}`});"));
        assert!(out.code.contains("slots: {default: {item: (__sveltets_2_unwrapArr(items)), index: (0), label: `row ${(0)}`}, footer: {open: true}}"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_slot_name_from_string_constant() {
        let out = tsx("<script>const HEADER = \"header\";</script>\n<slot name={HEADER} />");
        assert_eq!(out.slots[0].name, "header");

        let err = svelte2tsx("<slot name={dynamic} />", &TransformOptions::default()).unwrap_err();
        assert_eq!(err.code(), ERR_DYNAMIC_SLOT_NAME);
    }

    #[test]
    fn test_let_outside_a_component_is_rejected() {
        let err = svelte2tsx("<div let:x>{x}</div>", &TransformOptions::default()).unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_LET);
        let err = svelte2tsx("<div><p slot=\"a\" let:x /></div>", &TransformOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_LET);
    }
}
