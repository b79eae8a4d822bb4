#[cfg(test)]
mod tests {
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    use crate::options::TransformOptions;
    use crate::validate::{TransformError, ERR_EXPRESSION_SYNTAX};
    use crate::{svelte2tsx, TransformOutput};

    const STORE_SCRIPT: &str =
        "<script>\n\timport { writable } from 'svelte/store';\n\tconst text = writable('');\n\tconst items = writable([]);\n</script>\n";

    fn tsx(source: &str) -> TransformOutput {
        svelte2tsx(source, &TransformOptions::default()).unwrap()
    }

    fn assert_valid_ts(code: &str) {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, code, SourceType::ts()).parse();
        assert!(ret.errors.is_empty(), "{:?}\n--- generated ---\n{}", ret.errors, code);
    }

    #[test]
    fn test_store_reads_in_attributes_and_blocks() {
        let source = format!(
            "{}<p title=\"a {{$text}}\">{{#each $items as item}}{{item}}{{/each}}</p>",
            STORE_SCRIPT
        );
        let out = tsx(&source);
        assert!(out
            .code
            .contains(r#"{"title": `a ${__sveltets_2_store_get(text)}`}"#));
        assert!(out
            .code
            .contains("__sveltets_2_ensureArray(__sveltets_2_store_get(items))"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_store_bindings_write_through_set() {
        let source = format!(
            "{}<input bind:value={{$text}} /><Field bind:value={{$text}} />",
            STORE_SCRIPT
        );
        let out = tsx(&source);
        assert!(out
            .code
            .contains(r#"{"bind:value": __sveltets_2_store_get(text)}"#));
        assert!(out.code.contains("props: {value: __sveltets_2_store_get(text)} });"));
        assert!(out.code.contains("() => text.set(__sveltets_2_any(null));"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_object_literal_and_empty_mustaches() {
        let out = tsx("{{ a: 1 }}{}");
        assert!(out.code.contains("({ a: 1 });"));
        assert!(out.code.contains("undefined;"));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_malformed_each_context_becomes_a_pattern() {
        let out = tsx("{#each items as {a b}}{x}{/each}");
        assert!(out.code.contains("const $$_  "));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_malformed_const_tag() {
        let source = "{#each rows as row}{@const total =}{row}{/each}";
        let out = tsx(source);
        assert!(!out.code.contains("total"));
        assert!(out.code.contains("row;"));
        assert_valid_ts(&out.code);

        let strict = TransformOptions {
            strict: true,
            ..TransformOptions::default()
        };
        match svelte2tsx(source, &strict) {
            Err(TransformError::Strict(positioned)) => {
                assert_eq!(positioned.code, ERR_EXPRESSION_SYNTAX);
                assert!(positioned.message.len() > 0);
            }
            other => panic!("expected strict error, got {:?}", other.map(|o| o.code)),
        }
    }

    #[test]
    fn test_dispatcher_calls_in_template_declare_events() {
        let source = "<script>\n\timport { createEventDispatcher } from 'svelte';\n\tconst dispatch = createEventDispatcher();\n</script>\n<button on:click={() => dispatch('save')}>ok</button>";
        let out = tsx(source);
        let save = out.events.iter().find(|e| e.name == "save").unwrap();
        assert_eq!(save.type_text, "__sveltets_2_customEvent");
        assert!(out.code.contains(r#"{"on:click": () => dispatch('save')}"#));
        assert_valid_ts(&out.code);
    }

    #[test]
    fn test_debug_tag_and_raw_html() {
        let out = tsx("{@html markup}{@debug a, b}");
        assert!(out.code.contains("markup;"));
        assert!(out.code.contains(";a;b;"));
        assert_valid_ts(&out.code);
    }
}
