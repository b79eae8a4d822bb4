#[cfg(test)]
mod tests {
    use crate::ast::{AttributeNode, AttributeValue, AttributeValuePart, ElementTag, TemplateNode};
    use crate::parse::{parse_component, parse_template};

    fn first(source: &str) -> TemplateNode {
        let fragment = parse_template(source, "Test.svelte").unwrap();
        fragment.children.into_iter().next().expect("one node")
    }

    fn text<'s>(source: &'s str, span: (u32, u32)) -> &'s str {
        &source[span.0 as usize..span.1 as usize]
    }

    #[test]
    fn test_else_if_chain_spans() {
        let source = "{#if a}x{:else if b}y{:else}z{/if}";
        let TemplateNode::IfBlock(block) = first(source) else {
            panic!("expected if block");
        };
        assert_eq!(block.expression.text(source), "a");
        assert_eq!((block.start, block.end), (0, source.len() as u32));

        let else_block = block.else_block.as_ref().unwrap();
        let inner = else_block.else_if().expect("else-if branch");
        assert!(inner.elseif);
        assert_eq!(inner.expression.text(source), "b");
        // The inner branch starts after its clause and stops in front of `{/if}`.
        assert_eq!(text(source, (inner.start, inner.end)), "y{:else}z");
        assert_eq!((else_block.start, else_block.end), (inner.start, inner.end));
        assert!(inner.else_block.as_ref().unwrap().else_if().is_none());
    }

    #[test]
    fn test_each_context_index_key_and_else() {
        let source = "{#each items as { id, name }, i (id)}{name}{:else}none{/each}";
        let TemplateNode::EachBlock(block) = first(source) else {
            panic!("expected each block");
        };
        assert_eq!(block.expression.text(source), "items");
        assert_eq!(block.context.unwrap().text(source), "{ id, name }");
        assert_eq!(block.index.as_deref(), Some("i"));
        assert_eq!(block.key.unwrap().text(source), "id");
        assert_eq!(block.children.len(), 1);
        assert_eq!(block.else_block.unwrap().children.len(), 1);
    }

    #[test]
    fn test_each_over_iterable_named_as() {
        let source = "{#each as as a}{a}{/each}";
        let TemplateNode::EachBlock(block) = first(source) else {
            panic!("expected each block");
        };
        assert_eq!(block.expression.text(source), "as");
        assert_eq!(block.context.unwrap().text(source), "a");
    }

    #[test]
    fn test_await_branches() {
        let source = "{#await load() then value}{value}{:catch err}{err}{/await}";
        let TemplateNode::AwaitBlock(block) = first(source) else {
            panic!("expected await block");
        };
        assert_eq!(block.expression.text(source), "load()");
        assert_eq!(block.value.unwrap().text(source), "value");
        assert_eq!(block.error.unwrap().text(source), "err");
        assert!(block.pending.skip);
        assert_eq!(block.then.children.len(), 1);
        assert_eq!(block.catch.children.len(), 1);
    }

    #[test]
    fn test_attribute_forms() {
        let source = r#"<input {value} class="a {b}" disabled on:input bind:checked style:color={c} {...rest} />"#;
        let element = match first(source) {
            TemplateNode::Element(element) => element,
            other => panic!("unexpected {:?}", other),
        };
        let attrs = &element.attributes;
        assert_eq!(attrs.len(), 7);
        match &attrs[0] {
            AttributeNode::Attribute(attr) => {
                assert_eq!(attr.name, "value");
                assert!(matches!(
                    &attr.value,
                    AttributeValue::Parts(parts)
                        if matches!(parts.as_slice(), [AttributeValuePart::AttributeShorthand(_)])
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &attrs[1] {
            AttributeNode::Attribute(attr) => {
                assert!(matches!(&attr.value, AttributeValue::Parts(parts) if parts.len() == 2));
                assert_eq!(attr.static_value(), None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&attrs[2], AttributeNode::Attribute(a) if matches!(a.value, AttributeValue::Flag(true))));
        assert!(matches!(&attrs[3], AttributeNode::EventHandler(d) if d.expression.is_none()));
        // `bind:checked` reads the variable named like the binding.
        match &attrs[4] {
            AttributeNode::Binding(d) => assert_eq!(d.expression.unwrap().text(source), "checked"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&attrs[5], AttributeNode::StyleDirective(s) if s.name == "color"));
        assert!(matches!(&attrs[6], AttributeNode::Spread(s) if s.expression.text(source) == "rest"));
    }

    #[test]
    fn test_special_elements() {
        let source = r#"<svelte:component this={Current} /><svelte:element this="h2" /><svelte:self /><svelte:fragment slot="x" />"#;
        let fragment = parse_template(source, "Test.svelte").unwrap();
        match &fragment.children[0] {
            TemplateNode::InlineComponent(c) => {
                assert_eq!(c.expression.unwrap().text(source), "Current");
                assert!(c.attributes.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        match &fragment.children[1] {
            TemplateNode::Element(e) => {
                assert!(matches!(&e.tag, Some(ElementTag::Static(tag)) if tag == "h2"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&fragment.children[2], TemplateNode::InlineComponent(_)));
        assert!(matches!(&fragment.children[3], TemplateNode::SlotTemplate(_)));
    }

    #[test]
    fn test_let_pattern_directive() {
        let source = "<List let:{a, b} let:item={row}></List>";
        let TemplateNode::InlineComponent(list) = first(source) else {
            panic!("expected component");
        };
        let lets: Vec<_> = list.let_directives().collect();
        assert_eq!(lets.len(), 2);
        assert_eq!(lets[0].name, "");
        assert_eq!(lets[0].expression.unwrap().text(source), "{a, b}");
        assert_eq!(lets[1].name, "item");
        assert_eq!(lets[1].expression.unwrap().text(source), "row");
    }

    #[test]
    fn test_braces_inside_strings_and_templates() {
        let source = "{fn('}', `${ {a: 1}.a }`)}";
        let TemplateNode::MustacheTag(tag) = first(source) else {
            panic!("expected mustache");
        };
        assert_eq!(tag.expression.text(source), "fn('}', `${ {a: 1}.a }`)");
    }

    #[test]
    fn test_component_regions_and_errors() {
        let source = "<script context=\"module\">export const x = 1;</script>\n<script lang=\"ts\">let a: number = 1;</script>\n<p>{a}</p>\n<style>p { color: red; }</style>";
        let root = parse_component(source, "Test.svelte").unwrap();
        assert!(root.module.as_ref().unwrap().is_module());
        assert!(root.instance.as_ref().unwrap().is_typescript());
        assert!(root.css.is_some());
        assert!(root
            .html
            .children
            .iter()
            .any(|n| matches!(n, TemplateNode::Element(e) if e.name == "p")));

        let err = parse_template("{#if a}<p>{/if}", "Test.svelte").unwrap_err();
        assert!(err.code().starts_with("S2T-PARSE"));
        let err = parse_template("{#each items as item}", "Test.svelte").unwrap_err();
        assert!(err.to_string().contains("{#each}"));
    }
}
