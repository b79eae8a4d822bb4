//! Template Parser
//!
//! Hand-written recursive descent over the extractor's blanked source. Produces the
//! legacy Svelte node shapes and offsets, so it can stand in for an external parser.
//! Embedded JavaScript is only delimited here (balanced-bracket scan aware of
//! strings, template literals and comments); oxc parses it later.

use lazy_static::lazy_static;
use std::collections::HashSet;
use tracing::debug;

use crate::ast::{
    Attribute, AttributeNode, AttributeValue, AttributeValuePart, AwaitBlock, AwaitBranch,
    Comment, ConstTag, DebugTag, Directive, EachBlock, Element, ElementTag, ElseBlock, Fragment,
    IfBlock, JsSpan, KeyBlock, MustacheTag, Root, Shorthand, Spread, StyleDirective, TemplateNode,
    Text,
};
use crate::extract::{attach_regions, extract_verbatim};
use crate::validate::{
    CompilerError, Result, TransformError, ERR_TEMPLATE_SYNTAX, ERR_UNCLOSED_BLOCK,
};

lazy_static! {
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
        "meta", "param", "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
}

/// Parse `source` end to end: extract verbatim regions, parse the blanked markup,
/// and attach the regions to the tree.
pub fn parse_component(source: &str, file: &str) -> Result<Root> {
    let extracted = extract_verbatim(source);
    let html = parse_template(&extracted.blanked, file)?;
    let mut root = Root {
        html,
        ..Root::default()
    };
    attach_regions(&mut root, &extracted.regions, source, file)?;
    Ok(root)
}

/// Parse blanked markup into the root fragment. Top-level `<script>` and `<style>`
/// tags are skipped; the extractor owns them.
pub fn parse_template(source: &str, file: &str) -> Result<Fragment> {
    let mut parser = TemplateParser::new(source, file);
    let (children, stop) = parser.parse_children(true, false)?;
    match stop {
        Stop::Eof => {}
        Stop::CloseTag(at) => return Err(parser.error(at, "Unexpected closing tag")),
        Stop::Clause(at) => return Err(parser.error(at, "Unexpected block clause")),
        Stop::BlockClose(at) => return Err(parser.error(at, "Unexpected block closing tag")),
    }
    let (start, end) = match (children.first(), children.last()) {
        (Some(first), Some(last)) => (first.span().0, last.span().1),
        _ => (0, 0),
    };
    debug!(nodes = children.len(), "parsed template");
    Ok(Fragment {
        start,
        end,
        children,
    })
}

#[derive(Debug, Clone, Copy)]
enum Stop {
    Eof,
    CloseTag(usize),
    Clause(usize),
    BlockClose(usize),
}

struct TemplateParser<'s> {
    source: &'s str,
    bytes: &'s [u8],
    pos: usize,
    file: &'s str,
}

impl<'s> TemplateParser<'s> {
    fn new(source: &'s str, file: &'s str) -> Self {
        TemplateParser {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            file,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Cursor helpers
    // ───────────────────────────────────────────────────────────────────────────

    fn error(&self, at: usize, message: &str) -> TransformError {
        let end = (at + 1).min(self.source.len());
        TransformError::parse(CompilerError::at(
            ERR_TEMPLATE_SYNTAX,
            message,
            self.file,
            self.source,
            at as u32,
            end as u32,
        ))
    }

    fn unclosed(&self, start: usize, what: &str) -> TransformError {
        TransformError::parse(
            CompilerError::at(
                ERR_UNCLOSED_BLOCK,
                &format!("{} was left open", what),
                self.file,
                self.source,
                start as u32,
                (start + 1).min(self.source.len()) as u32,
            )
            .with_hint(format!("Add the closing tag for {}.", what)),
        )
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, text: &str) -> bool {
        self.source
            .get(self.pos..)
            .map(|rest| rest.starts_with(text))
            .unwrap_or(false)
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.starts_with(text) {
            self.pos += text.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<()> {
        if self.eat(text) {
            Ok(())
        } else {
            Err(self.error(self.pos, &format!("Expected {}", text)))
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_word(&mut self) -> &'s str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
        {
            self.pos += 1;
        }
        &self.source[start..self.pos]
    }

    fn read_until(&mut self, stop: impl Fn(u8) -> bool) -> &'s str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stop(b) {
                break;
            }
            self.pos += 1;
        }
        &self.source[start..self.pos]
    }

    /// Trimmed span of `[start, end)`.
    fn trimmed(&self, start: usize, end: usize) -> JsSpan {
        let text = &self.source[start..end];
        let lead = text.len() - text.trim_start().len();
        let trail = text.len() - text.trim_end().len();
        let s = start + lead;
        let e = (end - trail).max(s);
        JsSpan::new(s as u32, e as u32)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Embedded JavaScript delimiting
    // ───────────────────────────────────────────────────────────────────────────

    /// Scan JS from `from` and return the first offset at bracket depth zero where
    /// `stop` holds. Strings, template literals and comments are skipped over.
    fn scan_js(&self, from: usize, stop: &dyn Fn(&[u8], usize) -> bool) -> Option<usize> {
        let b = self.bytes;
        let mut i = from;
        let mut depth = 0i32;
        while i < b.len() {
            if depth == 0 && stop(b, i) {
                return Some(i);
            }
            match b[i] {
                quote @ (b'"' | b'\'') => {
                    i += 1;
                    while i < b.len() && b[i] != quote {
                        if b[i] == b'\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                    i += 1;
                }
                b'`' => {
                    i += 1;
                    while i < b.len() && b[i] != b'`' {
                        if b[i] == b'\\' {
                            i += 2;
                            continue;
                        }
                        if b[i] == b'$' && b.get(i + 1) == Some(&b'{') {
                            let close = self.scan_js(i + 2, &|b, i| b[i] == b'}')?;
                            i = close + 1;
                            continue;
                        }
                        i += 1;
                    }
                    i += 1;
                }
                b'/' if b.get(i + 1) == Some(&b'/') => {
                    while i < b.len() && b[i] != b'\n' {
                        i += 1;
                    }
                }
                b'/' if b.get(i + 1) == Some(&b'*') => {
                    i += 2;
                    while i + 1 < b.len() && !(b[i] == b'*' && b[i + 1] == b'/') {
                        i += 1;
                    }
                    i += 2;
                }
                b'(' | b'[' | b'{' => {
                    depth += 1;
                    i += 1;
                }
                b')' | b']' | b'}' => {
                    depth -= 1;
                    if depth < 0 {
                        return None;
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }
        None
    }

    /// Read an expression that runs to the next `}` and consume that brace.
    fn read_expression_to_brace(&mut self, opened_at: usize) -> Result<JsSpan> {
        let start = self.pos;
        let end = self
            .scan_js(start, &|b, i| b[i] == b'}')
            .ok_or_else(|| self.unclosed(opened_at, "the expression"))?;
        self.pos = end + 1;
        Ok(self.trimmed(start, end))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Fragments
    // ───────────────────────────────────────────────────────────────────────────

    fn parse_children(&mut self, top_level: bool, in_head: bool) -> Result<(Vec<TemplateNode>, Stop)> {
        let mut children = Vec::new();
        loop {
            if self.at_end() {
                return Ok((children, Stop::Eof));
            }
            if self.starts_with("</") {
                return Ok((children, Stop::CloseTag(self.pos)));
            }
            if self.starts_with("{:") {
                return Ok((children, Stop::Clause(self.pos)));
            }
            if self.starts_with("{/") {
                return Ok((children, Stop::BlockClose(self.pos)));
            }
            if self.starts_with("<!--") {
                children.push(self.parse_comment()?);
            } else if self.starts_with("<") && self.is_tag_start() {
                if let Some(node) = self.parse_tag(top_level, in_head)? {
                    children.push(node);
                }
            } else if self.starts_with("{") {
                children.push(self.parse_mustache()?);
            } else {
                children.push(self.parse_text());
            }
        }
    }

    fn is_tag_start(&self) -> bool {
        matches!(self.bytes.get(self.pos + 1), Some(b) if b.is_ascii_alphabetic())
    }

    fn parse_text(&mut self) -> TemplateNode {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some(b'{') => break,
                Some(b'<') if self.starts_with("</") || self.starts_with("<!--") || self.is_tag_start() => {
                    break
                }
                Some(_) => self.pos += 1,
            }
        }
        // Stay on a char boundary.
        while !self.source.is_char_boundary(self.pos) {
            self.pos += 1;
        }
        TemplateNode::Text(Text {
            start: start as u32,
            end: self.pos as u32,
            data: self.source[start..self.pos].to_string(),
        })
    }

    fn parse_comment(&mut self) -> Result<TemplateNode> {
        let start = self.pos;
        self.pos += 4;
        let rest = &self.source[self.pos..];
        let close = rest
            .find("-->")
            .ok_or_else(|| self.unclosed(start, "the comment"))?;
        let data = rest[..close].to_string();
        self.pos += close + 3;
        Ok(TemplateNode::Comment(Comment {
            start: start as u32,
            end: self.pos as u32,
            data,
        }))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Mustaches and blocks
    // ───────────────────────────────────────────────────────────────────────────

    fn parse_mustache(&mut self) -> Result<TemplateNode> {
        let start = self.pos;
        self.pos += 1;
        self.skip_whitespace();
        if self.eat("#") {
            let keyword = self.read_word();
            return match keyword {
                "if" => self.parse_if(start).map(TemplateNode::IfBlock),
                "each" => self.parse_each(start).map(TemplateNode::EachBlock),
                "await" => self.parse_await(start).map(TemplateNode::AwaitBlock),
                "key" => self.parse_key(start).map(TemplateNode::KeyBlock),
                other => Err(self.error(start, &format!("Unknown block type '{}'", other))),
            };
        }
        if self.eat("@") {
            let keyword = self.read_word();
            return match keyword {
                "html" => {
                    let expression = self.read_expression_to_brace(start)?;
                    Ok(TemplateNode::RawMustacheTag(MustacheTag {
                        start: start as u32,
                        end: self.pos as u32,
                        expression,
                    }))
                }
                "debug" => {
                    let inner = self.read_expression_to_brace(start)?;
                    let identifiers = self.split_top_level_commas(inner);
                    Ok(TemplateNode::DebugTag(DebugTag {
                        start: start as u32,
                        end: self.pos as u32,
                        identifiers,
                    }))
                }
                "const" => {
                    let expression = self.read_expression_to_brace(start)?;
                    Ok(TemplateNode::ConstTag(ConstTag {
                        start: start as u32,
                        end: self.pos as u32,
                        expression,
                    }))
                }
                other => Err(self.error(start, &format!("Unknown tag type '@{}'", other))),
            };
        }
        let expression = self.read_expression_to_brace(start)?;
        Ok(TemplateNode::MustacheTag(MustacheTag {
            start: start as u32,
            end: self.pos as u32,
            expression,
        }))
    }

    fn split_top_level_commas(&self, span: JsSpan) -> Vec<JsSpan> {
        let mut parts = Vec::new();
        let mut cursor = span.start as usize;
        let end = span.end as usize;
        while cursor < end {
            let comma = self
                .scan_js(cursor, &|b, i| b[i] == b',' || i >= end)
                .unwrap_or(end)
                .min(end);
            let part = self.trimmed(cursor, comma);
            if !part.is_empty() {
                parts.push(part);
            }
            cursor = comma + 1;
        }
        parts
    }

    /// Consume `{/name}` at the current position.
    fn expect_block_close(&mut self, name: &str, opened_at: usize) -> Result<()> {
        let at = self.pos;
        if !self.eat("{/") {
            return Err(self.unclosed(opened_at, &format!("{{#{}}}", name)));
        }
        self.skip_whitespace();
        let word = self.read_word();
        if word != name {
            return Err(self.error(at, &format!("Expected {{/{}}}, found {{/{}}}", name, word)));
        }
        self.skip_whitespace();
        self.expect("}")
    }

    fn parse_if(&mut self, start: usize) -> Result<IfBlock> {
        let expression = self.read_expression_to_brace(start)?;
        let mut block = self.parse_if_chain(start, expression, false)?;
        self.expect_block_close("if", start)?;
        block.end = self.pos as u32;
        Ok(block)
    }

    /// Parse one branch and its `{:else …}` successors. Stops in front of `{/if}`,
    /// which is where every branch of the chain (but the outermost) ends.
    fn parse_if_chain(&mut self, start: usize, expression: JsSpan, elseif: bool) -> Result<IfBlock> {
        let (children, stop) = self.parse_children(false, false)?;
        let mut block = IfBlock {
            start: start as u32,
            end: 0,
            expression,
            children,
            else_block: None,
            elseif,
        };
        match stop {
            Stop::BlockClose(at) => {
                block.end = at as u32;
                Ok(block)
            }
            Stop::Clause(at) => {
                self.pos = at + 2;
                self.skip_whitespace();
                if self.read_word() != "else" {
                    return Err(self.error(at, "Expected {:else} or {:else if}"));
                }
                self.skip_whitespace();
                if self.starts_with("if") && !self.bytes.get(self.pos + 2).map_or(false, |b| b.is_ascii_alphanumeric()) {
                    self.pos += 2;
                    let condition = self.read_expression_to_brace(at)?;
                    let else_start = self.pos;
                    let inner = self.parse_if_chain(else_start, condition, true)?;
                    let close = inner.end;
                    block.else_block = Some(ElseBlock {
                        start: else_start as u32,
                        end: close,
                        children: vec![TemplateNode::IfBlock(inner)],
                    });
                    block.end = close;
                } else {
                    self.expect("}")?;
                    let else_start = self.pos;
                    let (children, stop) = self.parse_children(false, false)?;
                    let close = match stop {
                        Stop::BlockClose(close) => close,
                        Stop::Eof => return Err(self.unclosed(start, "{#if}")),
                        Stop::Clause(other) | Stop::CloseTag(other) => {
                            return Err(self.error(other, "Unexpected token after {:else}"))
                        }
                    };
                    block.else_block = Some(ElseBlock {
                        start: else_start as u32,
                        end: close as u32,
                        children,
                    });
                    block.end = close as u32;
                }
                Ok(block)
            }
            Stop::Eof => Err(self.unclosed(start, "{#if}")),
            Stop::CloseTag(at) => Err(self.error(at, "Unexpected closing tag inside {#if}")),
        }
    }

    fn parse_each(&mut self, start: usize) -> Result<EachBlock> {
        let expr_start = self.pos;
        let as_at = self
            .scan_js(expr_start, &|b, i| {
                b[i] == b'}'
                    || (b[i..].starts_with(b"as")
                        && i > 0
                        && b[i - 1].is_ascii_whitespace()
                        && b.get(i + 2).map_or(false, |c| c.is_ascii_whitespace() || *c == b'{' || *c == b'[')
                        // `as` is also a valid identifier for the iterable itself.
                        && b[expr_start..i].iter().any(|c| !c.is_ascii_whitespace()))
            })
            .ok_or_else(|| self.unclosed(start, "{#each}"))?;
        let expression = self.trimmed(expr_start, as_at);
        self.pos = as_at;

        let mut context = None;
        let mut index = None;
        let mut key = None;
        if self.eat("as") {
            let ctx_start = self.pos;
            let ctx_end = self
                .scan_js(ctx_start, &|b, i| matches!(b[i], b',' | b'(' | b'}'))
                .ok_or_else(|| self.unclosed(start, "{#each}"))?;
            context = Some(self.trimmed(ctx_start, ctx_end));
            self.pos = ctx_end;
            if self.eat(",") {
                self.skip_whitespace();
                let name = self.read_word();
                if name.is_empty() {
                    return Err(self.error(self.pos, "Expected an index name"));
                }
                index = Some(name.to_string());
                self.skip_whitespace();
            }
            if self.eat("(") {
                let key_start = self.pos;
                let key_end = self
                    .scan_js(key_start, &|b, i| b[i] == b')')
                    .ok_or_else(|| self.unclosed(start, "the each key"))?;
                key = Some(self.trimmed(key_start, key_end));
                self.pos = key_end + 1;
                self.skip_whitespace();
            }
        }
        self.expect("}")?;

        let (children, stop) = self.parse_children(false, false)?;
        let mut else_block = None;
        match stop {
            Stop::BlockClose(_) => {}
            Stop::Clause(at) => {
                self.pos = at + 2;
                self.skip_whitespace();
                if self.read_word() != "else" {
                    return Err(self.error(at, "Expected {:else}"));
                }
                self.skip_whitespace();
                self.expect("}")?;
                let else_start = self.pos;
                let (else_children, stop) = self.parse_children(false, false)?;
                let Stop::BlockClose(close) = stop else {
                    return Err(self.unclosed(start, "{#each}"));
                };
                else_block = Some(ElseBlock {
                    start: else_start as u32,
                    end: close as u32,
                    children: else_children,
                });
            }
            Stop::Eof => return Err(self.unclosed(start, "{#each}")),
            Stop::CloseTag(at) => return Err(self.error(at, "Unexpected closing tag inside {#each}")),
        }
        self.expect_block_close("each", start)?;
        Ok(EachBlock {
            start: start as u32,
            end: self.pos as u32,
            expression,
            context,
            index,
            key,
            children,
            else_block,
        })
    }

    fn parse_await(&mut self, start: usize) -> Result<AwaitBlock> {
        let expr_start = self.pos;
        let keyword_at = |b: &[u8], i: usize, word: &[u8]| {
            b[i..].starts_with(word)
                && i > 0
                && b[i - 1].is_ascii_whitespace()
                && b
                    .get(i + word.len())
                    .map_or(false, |c| c.is_ascii_whitespace() || *c == b'}')
        };
        let stop_at = self
            .scan_js(expr_start, &|b, i| {
                b[i] == b'}' || keyword_at(b, i, b"then") || keyword_at(b, i, b"catch")
            })
            .ok_or_else(|| self.unclosed(start, "{#await}"))?;
        let expression = self.trimmed(expr_start, stop_at);
        self.pos = stop_at;

        let mut block = AwaitBlock {
            start: start as u32,
            end: 0,
            expression,
            value: None,
            error: None,
            pending: AwaitBranch::default(),
            then: AwaitBranch::default(),
            catch: AwaitBranch::default(),
        };
        block.pending.skip = true;
        block.then.skip = true;
        block.catch.skip = true;

        // Which arm the body right after the opening tag belongs to.
        let mut arm = if self.eat("then") {
            block.value = self.read_pattern_to_brace(start)?;
            Arm::Then
        } else if self.eat("catch") {
            block.error = self.read_pattern_to_brace(start)?;
            Arm::Catch
        } else {
            self.expect("}")?;
            Arm::Pending
        };

        loop {
            let arm_start = self.pos;
            let (children, stop) = self.parse_children(false, false)?;
            let arm_end = match stop {
                Stop::BlockClose(at) | Stop::Clause(at) => at,
                Stop::Eof => return Err(self.unclosed(start, "{#await}")),
                Stop::CloseTag(at) => {
                    return Err(self.error(at, "Unexpected closing tag inside {#await}"))
                }
            };
            let branch = AwaitBranch {
                start: Some(arm_start as u32),
                end: Some(arm_end as u32),
                children,
                skip: false,
            };
            match arm {
                Arm::Pending => block.pending = branch,
                Arm::Then => block.then = branch,
                Arm::Catch => block.catch = branch,
            }
            match stop {
                Stop::Clause(at) => {
                    self.pos = at + 2;
                    self.skip_whitespace();
                    match self.read_word() {
                        "then" => {
                            block.value = self.read_pattern_to_brace(at)?;
                            arm = Arm::Then;
                        }
                        "catch" => {
                            block.error = self.read_pattern_to_brace(at)?;
                            arm = Arm::Catch;
                        }
                        _ => return Err(self.error(at, "Expected {:then} or {:catch}")),
                    }
                }
                _ => break,
            }
        }
        self.expect_block_close("await", start)?;
        block.end = self.pos as u32;
        Ok(block)
    }

    fn read_pattern_to_brace(&mut self, opened_at: usize) -> Result<Option<JsSpan>> {
        let span = self.read_expression_to_brace(opened_at)?;
        Ok((!span.is_empty()).then_some(span))
    }

    fn parse_key(&mut self, start: usize) -> Result<KeyBlock> {
        let expression = self.read_expression_to_brace(start)?;
        let (children, stop) = self.parse_children(false, false)?;
        if !matches!(stop, Stop::BlockClose(_)) {
            return Err(self.unclosed(start, "{#key}"));
        }
        self.expect_block_close("key", start)?;
        Ok(KeyBlock {
            start: start as u32,
            end: self.pos as u32,
            expression,
            children,
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Tags
    // ───────────────────────────────────────────────────────────────────────────

    fn parse_tag(&mut self, top_level: bool, in_head: bool) -> Result<Option<TemplateNode>> {
        let start = self.pos;
        self.pos += 1;
        let name = self
            .read_until(|b| b.is_ascii_whitespace() || b == b'/' || b == b'>')
            .to_string();

        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            if self.eat("/>") {
                break true;
            }
            if self.eat(">") {
                break false;
            }
            if self.at_end() {
                return Err(self.unclosed(start, &format!("<{}>", name)));
            }
            attributes.push(self.parse_attribute()?);
        };

        let lower = name.to_ascii_lowercase();
        let raw_text = lower == "script" || lower == "style";
        let mut children = Vec::new();
        if raw_text && !self_closing {
            let close = format!("</{}", lower);
            let rest = self.source[self.pos..].to_ascii_lowercase();
            let close_at = rest
                .find(&close)
                .map(|i| self.pos + i)
                .ok_or_else(|| self.unclosed(start, &format!("<{}>", name)))?;
            if close_at > self.pos {
                children.push(TemplateNode::Text(Text {
                    start: self.pos as u32,
                    end: close_at as u32,
                    data: self.source[self.pos..close_at].to_string(),
                }));
            }
            self.pos = close_at + close.len();
            self.skip_whitespace();
            self.expect(">")?;
            if top_level {
                // Owned by the extractor.
                return Ok(None);
            }
        } else if !self_closing && !VOID_ELEMENTS.contains(lower.as_str()) {
            let (nodes, stop) = self.parse_children(false, name == "svelte:head")?;
            children = nodes;
            match stop {
                Stop::CloseTag(at) => {
                    self.pos = at + 2;
                    let closing = self
                        .read_until(|b| b.is_ascii_whitespace() || b == b'>')
                        .to_string();
                    if closing != name {
                        return Err(self.error(
                            at,
                            &format!("</{}> attempted to close <{}>", closing, name),
                        ));
                    }
                    self.skip_whitespace();
                    self.expect(">")?;
                }
                Stop::Eof => return Err(self.unclosed(start, &format!("<{}>", name))),
                Stop::Clause(at) | Stop::BlockClose(at) => {
                    return Err(self.error(at, &format!("Block was closed inside <{}>", name)))
                }
            }
        }

        let end = self.pos as u32;
        Ok(Some(build_element(start as u32, end, name, attributes, children, in_head)))
    }

    fn parse_attribute(&mut self) -> Result<AttributeNode> {
        let start = self.pos;
        if self.starts_with("{") {
            self.pos += 1;
            self.skip_whitespace();
            if self.eat("...") {
                let expression = self.read_expression_to_brace(start)?;
                return Ok(AttributeNode::Spread(Spread {
                    start: start as u32,
                    end: self.pos as u32,
                    expression,
                }));
            }
            let expression = self.read_expression_to_brace(start)?;
            let name = expression.text(self.source).to_string();
            return Ok(AttributeNode::Attribute(Attribute {
                start: start as u32,
                end: self.pos as u32,
                name,
                value: AttributeValue::Parts(vec![AttributeValuePart::AttributeShorthand(
                    Shorthand {
                        start: start as u32,
                        end: self.pos as u32,
                        expression,
                    },
                )]),
            }));
        }

        // `let:{a, b}` destructures the whole slot props object.
        if self.starts_with("let:{") || self.starts_with("let:[") {
            let pattern_start = self.pos + 4;
            let Some(close) = self.scan_js(pattern_start + 1, &|b, i| matches!(b[i], b'}' | b']'))
            else {
                return Err(self.unclosed(start, "the let: pattern"));
            };
            self.pos = close + 1;
            return Ok(AttributeNode::Let(Directive {
                start: start as u32,
                end: self.pos as u32,
                name: String::new(),
                modifiers: Vec::new(),
                expression: Some(JsSpan::new(pattern_start as u32, self.pos as u32)),
                intro: false,
                outro: false,
            }));
        }

        let name = self
            .read_until(|b| b.is_ascii_whitespace() || b == b'=' || b == b'>' || b == b'/')
            .to_string();
        if name.is_empty() {
            return Err(self.error(self.pos, "Expected an attribute name"));
        }
        self.skip_whitespace();
        let value = if self.eat("=") {
            self.skip_whitespace();
            self.parse_attribute_value(start)?
        } else {
            AttributeValue::Flag(true)
        };
        let end = self.pos as u32;
        Ok(build_attribute(start as u32, end, &name, value))
    }

    fn parse_attribute_value(&mut self, attr_start: usize) -> Result<AttributeValue> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                self.pos += 1;
                Some(q)
            }
            _ => None,
        };
        let mut parts = Vec::new();
        let mut text_start = self.pos;
        loop {
            let Some(b) = self.peek() else {
                return Err(self.unclosed(attr_start, "the attribute value"));
            };
            let at_end = match quote {
                Some(q) => b == q,
                None => b.is_ascii_whitespace() || b == b'>' || self.starts_with("/>"),
            };
            if at_end || b == b'{' {
                if self.pos > text_start {
                    parts.push(AttributeValuePart::Text(Text {
                        start: text_start as u32,
                        end: self.pos as u32,
                        data: self.source[text_start..self.pos].to_string(),
                    }));
                }
                if at_end {
                    break;
                }
                let open = self.pos;
                self.pos += 1;
                let expression = self.read_expression_to_brace(open)?;
                parts.push(AttributeValuePart::MustacheTag(MustacheTag {
                    start: open as u32,
                    end: self.pos as u32,
                    expression,
                }));
                text_start = self.pos;
                if quote.is_none() {
                    // An unquoted value is a single mustache or a single text run.
                    break;
                }
                continue;
            }
            self.pos += 1;
        }
        if quote.is_some() {
            self.pos += 1;
        }
        if parts.is_empty() {
            // `name=""`
            parts.push(AttributeValuePart::Text(Text {
                start: text_start as u32,
                end: text_start as u32,
                data: String::new(),
            }));
        }
        Ok(AttributeValue::Parts(parts))
    }
}

#[derive(Clone, Copy)]
enum Arm {
    Pending,
    Then,
    Catch,
}

/// The single mustache of a directive value, if it has one.
fn directive_expression(value: &AttributeValue) -> Option<JsSpan> {
    match value {
        AttributeValue::Parts(parts) => parts.iter().find_map(|part| match part {
            AttributeValuePart::MustacheTag(tag) => Some(tag.expression),
            AttributeValuePart::AttributeShorthand(short) => Some(short.expression),
            AttributeValuePart::Text(_) => None,
        }),
        AttributeValue::Flag(_) => None,
    }
}

fn build_attribute(start: u32, end: u32, raw_name: &str, value: AttributeValue) -> AttributeNode {
    let Some((prefix, rest)) = raw_name.split_once(':') else {
        return AttributeNode::Attribute(Attribute {
            start,
            end,
            name: raw_name.to_string(),
            value,
        });
    };
    let mut segments = rest.split('|');
    let name = segments.next().unwrap_or_default().to_string();
    let modifiers: Vec<String> = segments.map(str::to_string).collect();
    let name_start = start + prefix.len() as u32 + 1;
    // `bind:value` and `class:active` reference the variable named like the directive.
    let shorthand = || Some(JsSpan::new(name_start, name_start + name.len() as u32));

    let directive = |expression: Option<JsSpan>, intro: bool, outro: bool| Directive {
        start,
        end,
        name: name.clone(),
        modifiers: modifiers.clone(),
        expression,
        intro,
        outro,
    };
    let expression = directive_expression(&value);
    match prefix {
        "on" => AttributeNode::EventHandler(directive(expression, false, false)),
        "bind" => AttributeNode::Binding(directive(expression.or_else(shorthand), false, false)),
        "class" => AttributeNode::Class(directive(expression.or_else(shorthand), false, false)),
        "use" => AttributeNode::Action(directive(expression, false, false)),
        "transition" => AttributeNode::Transition(directive(expression, true, true)),
        "in" => AttributeNode::Transition(directive(expression, true, false)),
        "out" => AttributeNode::Transition(directive(expression, false, true)),
        "animate" => AttributeNode::Animation(directive(expression, false, false)),
        "let" => AttributeNode::Let(directive(expression, false, false)),
        "style" => AttributeNode::StyleDirective(StyleDirective {
            start,
            end,
            name: name.clone(),
            modifiers: modifiers.clone(),
            value,
        }),
        // Namespaced plain attributes such as `xlink:href`.
        _ => AttributeNode::Attribute(Attribute {
            start,
            end,
            name: raw_name.to_string(),
            value,
        }),
    }
}

fn build_element(
    start: u32,
    end: u32,
    name: String,
    mut attributes: Vec<AttributeNode>,
    children: Vec<TemplateNode>,
    in_head: bool,
) -> TemplateNode {
    let take_this = |attributes: &mut Vec<AttributeNode>| -> Option<AttributeValue> {
        let index = attributes
            .iter()
            .position(|a| matches!(a, AttributeNode::Attribute(attr) if attr.name == "this"))?;
        match attributes.remove(index) {
            AttributeNode::Attribute(attr) => Some(attr.value),
            _ => None,
        }
    };

    let mut element = Element {
        start,
        end,
        name,
        attributes: Vec::new(),
        children,
        expression: None,
        tag: None,
    };
    let kind = match element.name.as_str() {
        "svelte:head" => ElementKind::Head,
        "svelte:window" => ElementKind::Window,
        "svelte:body" => ElementKind::Body,
        "svelte:document" => ElementKind::Document,
        "svelte:options" => ElementKind::Options,
        "svelte:fragment" => ElementKind::SlotTemplate,
        "svelte:self" => ElementKind::Component,
        "svelte:component" => {
            element.expression = take_this(&mut attributes).as_ref().and_then(directive_expression);
            ElementKind::Component
        }
        "svelte:element" => {
            element.tag = take_this(&mut attributes).map(|value| match &value {
                AttributeValue::Parts(parts) => match parts.as_slice() {
                    [AttributeValuePart::Text(text)] => ElementTag::Static(text.data.clone()),
                    _ => directive_expression(&value)
                        .map(ElementTag::Dynamic)
                        .unwrap_or_else(|| ElementTag::Static(String::new())),
                },
                AttributeValue::Flag(_) => ElementTag::Static(String::new()),
            });
            ElementKind::Element
        }
        "slot" => ElementKind::Slot,
        "title" if in_head => ElementKind::Title,
        other => {
            let first = other.chars().next().unwrap_or('a');
            if first.is_ascii_uppercase() || other.contains('.') {
                ElementKind::Component
            } else {
                ElementKind::Element
            }
        }
    };
    element.attributes = attributes;
    match kind {
        ElementKind::Element => TemplateNode::Element(element),
        ElementKind::Component => TemplateNode::InlineComponent(element),
        ElementKind::Slot => TemplateNode::Slot(element),
        ElementKind::SlotTemplate => TemplateNode::SlotTemplate(element),
        ElementKind::Head => TemplateNode::Head(element),
        ElementKind::Title => TemplateNode::Title(element),
        ElementKind::Window => TemplateNode::Window(element),
        ElementKind::Body => TemplateNode::Body(element),
        ElementKind::Document => TemplateNode::Document(element),
        ElementKind::Options => TemplateNode::Options(element),
    }
}

enum ElementKind {
    Element,
    Component,
    Slot,
    SlotTemplate,
    Head,
    Title,
    Window,
    Body,
    Document,
    Options,
}
