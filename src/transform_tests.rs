#[cfg(test)]
mod tests {
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    use crate::ast::Root;
    use crate::options::{Dialect, EmitMode, TransformOptions};
    use crate::validate::{TransformError, ERR_EXPRESSION_SYNTAX};
    use crate::{svelte2tsx, svelte2tsx_with_ast, transform_batch, TransformOutput};

    /// `RUST_LOG=svelte2tsx_native=trace cargo test` shows the rewrite trace.
    fn init_logging() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_test_writer()
                .with_ansi(false)
                .try_init();
        });
    }

    fn tsx(source: &str) -> TransformOutput {
        init_logging();
        svelte2tsx(source, &TransformOptions::default()).unwrap()
    }

    fn tsx_with(source: &str, options: TransformOptions) -> TransformOutput {
        init_logging();
        svelte2tsx(source, &options).unwrap()
    }

    fn closures() -> TransformOptions {
        TransformOptions {
            dialect: Dialect::Closures,
            ..TransformOptions::default()
        }
    }

    fn assert_valid_ts(code: &str) {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, code, SourceType::ts()).parse();
        assert!(ret.errors.is_empty(), "{:?}\n--- generated ---\n{}", ret.errors, code);
    }

    // Mapping and no-ops

    #[test]
    fn test_copied_expression_maps_back_exactly() {
        let source = "<script>\n\tlet value = 1;\n</script>\n<p class=\"x\">{value + 1}</p>\n";
        let out = tsx(source);
        assert_valid_ts(&out.code);

        let rendered = crate::buffer::Rendered {
            text: out.code.clone(),
            mapping: out.map.clone(),
        };
        let generated = out.code.find("value + 1;").unwrap() as u32;
        let original = source.find("value + 1").unwrap() as u32;
        for i in 0.."value + 1".len() as u32 {
            assert_eq!(rendered.original_offset(generated + i), Some(original + i));
        }
        let declared = out.code.find("let value = 1;").unwrap() as u32;
        assert_eq!(
            rendered.original_offset(declared),
            Some(source.find("let value").unwrap() as u32)
        );
    }

    #[test]
    fn test_unknown_nodes_pass_through_untouched() {
        let source = "{@render row(item)}";
        let root: Root = serde_json::from_str(
            r#"{ "html": { "start": 0, "end": 19, "children": [
                { "type": "RenderTag", "start": 0, "end": 19 }
            ] } }"#,
        )
        .unwrap();
        let out = svelte2tsx_with_ast(source, root, &TransformOptions::default()).unwrap();
        assert!(out.code.starts_with(
            "///<reference types=\"svelte\" />\n;function render() {\n;\nasync () => {{@render row(item)}\n};\n"
        ));
        assert!(out.code.contains("return { props: {}, events: {}, slots: {}, getters: {} }}"));
    }

    // Blocks

    #[test]
    fn test_if_chain() {
        let out = tsx("{#if a}{x}{:else if b}{y}{:else}{z}{/if}");
        assert!(out
            .code
            .contains("if (a) { x; } else if (b) { y; } else { z; }"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_each_with_index_and_key() {
        let out = tsx("{#each items as item, i (item.id)}{item.id}{/each}");
        assert!(out.code.contains(
            "for (const item of __sveltets_2_ensureArray(items)) { let i = 1; item.id; item.id;}"
        ));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_each_else_uses_a_temporary() {
        let out = tsx("{#each items as item}{item}{:else}{empty}{/each}");
        assert!(out.code.contains(
            "{ const $$_each = __sveltets_2_ensureArray(items); if (!$$_each.length) { empty;} else for (const item of $$_each) { item;} }"
        ));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_await_statements() {
        let out = tsx("{#await promise}{wait}{:then value}{value}{:catch error}{error}{/await}");
        assert!(out.code.contains("let $$value = await (promise); try { const value = $$value; value;} catch ($$err) { const error = __sveltets_2_any($$err); error;} }"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_closure_guard_reads_alias_of_shadowed_condition() {
        let out = tsx_with("{#if a}{#each xs as a}{y}{/each}{/if}", closures());
        assert!(out.code.contains(
            "if (a) { { const $$_a0 = a; __sveltets_2_each(xs, (a) => { if (!(($$_a0))) return; y;}); } }"
        ));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_each_over_iterable_named_as() {
        let source = "{#if a}{#each as as a}{a}{/each}{/if}";
        let out = tsx(source);
        assert!(out
            .code
            .contains("for (const a of __sveltets_2_ensureArray(as)) { a;}"));
        assert_valid_ts(&out.code);

        let out = tsx_with(source, closures());
        assert!(out.code.contains(
            "{ const $$_a0 = a; __sveltets_2_each(as, (a) => { if (!(($$_a0))) return; a;}); }"
        ));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_closure_guard_negates_earlier_branches() {
        let out = tsx_with(
            "{#if a}{x}{:else}{#await p then v}{v}{/await}{/if}",
            closures(),
        );
        assert!(out
            .code
            .contains("__sveltets_2_awaitThen(p, ($$value) => { if (!(!(a))) return; const v = $$value; v;}"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_const_tag_and_key_block() {
        let out = tsx("{#each rows as row}{@const total = row.a + row.b}{total}{/each}{#key id}{id}{/key}");
        assert!(out.code.contains("const total = row.a + row.b;"));
        assert!(out.code.contains("id; id;"));
        assert_valid_ts(&out.code);
    }

    // Stores

    #[test]
    fn test_store_shapes_in_template_and_script() {
        let source = "<script>\n\timport { writable } from 'svelte/store';\n\tconst count = writable(0);\n\t$count = 5;\n</script>\n<button on:click={() => { $count += 2; $count++; }}>{$count}</button>\n{#each list as $local}{$local}{/each}";
        let out = tsx(source);
        assert!(out.code.contains("count.set(5);"));
        assert!(out.code.contains("count.set(__sveltets_2_store_get(count) + (2))"));
        assert!(out.code.contains("count.set(__sveltets_2_store_get(count) + 1)"));
        assert!(out.code.contains("__sveltets_2_store_get(count);"));
        // A template binding named like a store is a plain variable.
        assert!(out.code.contains("$local;"));
        assert!(!out.code.contains("__sveltets_2_store_get(local)"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_store_in_destructuring_assignment() {
        let source = "<script>\n\timport { writable } from 'svelte/store';\n\tconst a = writable(0);\n\tconst b = writable({ x: 0 });\n</script>\n<button on:click={() => { [$a] = [1]; ({ x: $a } = $b); }}>ok</button>";
        let out = tsx(source);
        let setter = "({ set v($$v: Parameters<typeof a.set>[0]) { a.set($$v); } }).v";
        assert!(out.code.contains(&format!("[{}] = [1];", setter)));
        assert!(out
            .code
            .contains(&format!("({{ x: {} }} = __sveltets_2_store_get(b));", setter)));
        assert!(!out.code.contains("[$a]"));
        assert_valid_ts(&out.code);
    }

    // Malformed expressions

    #[test]
    fn test_malformed_expression_lenient_blanks() {
        let out = tsx("<p>\n{a +}\n</p>");
        assert!(out.code.contains("0  ;"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_malformed_expression_strict_is_positioned() {
        let options = TransformOptions {
            strict: true,
            ..TransformOptions::default()
        };
        let err = svelte2tsx("<p>\n{a +}\n</p>", &options).unwrap_err();
        match err {
            TransformError::Strict(positioned) => {
                assert_eq!(positioned.code, ERR_EXPRESSION_SYNTAX);
                assert_eq!(positioned.start.line, 2);
                assert!(positioned.frame.contains("{a +}"));
            }
            other => panic!("expected strict error, got {:?}", other),
        }
    }

    // Assembly

    #[test]
    fn test_scripts_are_hoisted_in_order() {
        let source = "<script context=\"module\">\n\texport const prerender = true;\n</script>\n<script>\n\timport Card from './Card.svelte';\n\texport let title;\n</script>\n<Card {title} />";
        let out = tsx(source);
        let module = out.code.find("export const prerender").unwrap();
        let import = out.code.find("import Card").unwrap();
        let render = out.code.find(";function render()").unwrap();
        let prop = out.code.find("let title").unwrap();
        let template = out.code.find("async () => {").unwrap();
        assert!(module < import && import < render && render < prop && prop < template);
        assert!(out.code.contains("title: title"));
        assert_eq!(out.exported_names.len(), 1);
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_reactive_object_literal_stays_an_expression() {
        let out = tsx("<script>\n\tlet a = 1;\n\t$: cfg = { a, b: 2 };\n</script>\n{cfg.b}");
        assert!(out
            .code
            .contains("let cfg = __sveltets_2_invalidate(() => ({ a, b: 2 }));"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_declared_events_override_dispatcher_usage() {
        let source = "<script lang=\"ts\">\n\timport { createEventDispatcher } from 'svelte';\n\tconst d = createEventDispatcher();\n\td('a');\n\tinterface $$Events { b: CustomEvent<number> }\n</script>\n<button on:click={() => d('c')}>ok</button>";
        let out = tsx(source);
        let names: Vec<&str> = out.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
        assert_eq!(out.events[0].type_text, "CustomEvent<number>");
        assert!(out.code.contains("events: {} as unknown as $$Events"));
        assert_valid_ts(&out.code);

        let source = "<script lang=\"ts\">\n\ttype $$Events = { saved: CustomEvent<string> };\n</script>";
        let out = tsx(source);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].name, "saved");
        assert_eq!(out.events[0].type_text, "CustomEvent<string>");
        assert!(out.code.contains("events: {} as unknown as $$Events"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_full_mode_epilogue_and_accessors() {
        let source = "<svelte:options accessors />\n<script lang=\"ts\">\n\texport let size: number = 1;\n</script>";
        let out = tsx_with(
            source,
            TransformOptions {
                filename: Some("src/icon-button.svelte".into()),
                ..TransformOptions::default()
            },
        );
        assert!(out.code.contains("props: {size: size} as {size?: number}"));
        assert!(out.code.contains(
            "export default class IconButton__SvelteComponent_ extends __sveltets_2_createSvelte2TsxComponent(__sveltets_2_partial(__sveltets_2_with_any_event(render())))"
        ));
        assert!(out.code.contains("get size() { return this.$$prop_def.size }"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_js_props_pass_optional_names() {
        let out = tsx("<script>\n\texport let a;\n\texport let b = 2;\n</script>");
        assert!(out.code.contains("__sveltets_2_partial([\"b\"], __sveltets_2_with_any_event(render()))"));
    }

    #[test]
    fn test_dts_and_lint_modes() {
        let source = "<script>\n\texport let a = 1;\n</script>";
        let dts = tsx_with(
            source,
            TransformOptions {
                mode: EmitMode::Dts,
                ..TransformOptions::default()
            },
        );
        assert!(dts.code.contains("export type InputProps = typeof __propDef.props;"));
        assert!(dts
            .code
            .contains("export default class Input extends SvelteComponentTyped<InputProps, InputEvents, InputSlots>"));
        assert_valid_ts(&dts.code);

        let lint = tsx_with(
            source,
            TransformOptions {
                mode: EmitMode::Lint,
                ..TransformOptions::default()
            },
        );
        assert!(!lint.code.contains("///<reference"));
        assert!(lint.code.contains("Input__SvelteComponent_"));
    }

    #[test]
    fn test_implicit_props_and_slots_declarations() {
        let out = tsx("<div {...$$restProps}>{$$props.title}</div>{#if $$slots.footer}<slot name=\"footer\" />{/if}");
        assert!(out.code.contains("let $$props = __sveltets_2_allPropsType();"));
        assert!(out.code.contains("let $$restProps = __sveltets_2_restPropsType();"));
        assert!(out.code.contains("let $$slots = __sveltets_2_slotsType({footer: ''});"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_source_map_json_on_request() {
        let out = tsx_with(
            "<p>{a}</p>",
            TransformOptions {
                emit_source_map: true,
                ..TransformOptions::default()
            },
        );
        let map: serde_json::Value = serde_json::from_str(out.map_json.as_deref().unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["sources"][0], "Input.svelte");
        assert!(tsx("<p>{a}</p>").map_json.is_none());
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let inputs = vec![
            ("<p>{one}</p>".to_string(), TransformOptions::default()),
            ("<p>{two +}</p>".to_string(), TransformOptions {
                strict: true,
                ..TransformOptions::default()
            }),
            ("<p>{three}</p>".to_string(), TransformOptions::default()),
        ];
        let results = transform_batch(&inputs);
        assert_eq!(results.len(), 3);
        assert!(results[0].as_ref().unwrap().code.contains("one;"));
        assert!(results[1].is_err());
        assert!(results[2].as_ref().unwrap().code.contains("three;"));
    }
}
