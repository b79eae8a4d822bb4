//! Verbatim Region Extractor
//!
//! `<script>` and `<style>` bodies are foreign syntax to the markup parser. They are
//! located on the raw source, their interiors blanked to same-length filler, and the
//! located regions attached to the parsed tree afterwards.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{JsSpan, Root, Script, Style};
use crate::validate::{CompilerError, Result, TransformError, ERR_DUPLICATE_SCRIPT};

lazy_static! {
    static ref VERBATIM_OPEN_RE: Regex =
        Regex::new(r"(?i)<(script|style)\b((?:[^>]*?))(/?)>").unwrap();
    static ref ATTR_REGEX: Regex =
        Regex::new(r#"(?i)([a-z0-9_:-]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^>\s]+)))?"#).unwrap();
    static ref COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref HEAD_RE: Regex = Regex::new(r"(?s)<svelte:head\b.*?</svelte:head>").unwrap();
}

/// Blank runs longer than this get an inert `/**/` inserted.
const FILLER_RUN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegionKind {
    Script,
    Style,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerbatimRegion {
    pub kind: RegionKind,
    /// Whole tag, `<script ...>` through `</script>`.
    pub start: u32,
    pub end: u32,
    pub content_start: u32,
    pub content_end: u32,
    pub attributes: Vec<(String, Option<String>)>,
}

impl VerbatimRegion {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_deref().unwrap_or(""))
    }
}

#[derive(Debug, Clone)]
pub struct Extracted {
    /// Same length and line count as the source, region interiors blanked.
    pub blanked: String,
    pub regions: Vec<VerbatimRegion>,
}

/// Locate top-level script/style regions. Regions inside HTML comments or
/// `<svelte:head>` belong to the markup and are left alone.
pub fn extract_verbatim(source: &str) -> Extracted {
    let excluded: Vec<(usize, usize)> = COMMENT_RE
        .find_iter(source)
        .chain(HEAD_RE.find_iter(source))
        .map(|m| (m.start(), m.end()))
        .collect();
    let is_excluded = |at: usize| excluded.iter().any(|&(s, e)| at >= s && at < e);

    let mut regions = Vec::new();
    let mut search_from = 0;
    while let Some(caps) = VERBATIM_OPEN_RE.captures_at(source, search_from) {
        let Some(whole) = caps.get(0) else { break };
        search_from = whole.end();
        if is_excluded(whole.start()) {
            continue;
        }
        let tag = caps[1].to_ascii_lowercase();
        let kind = if tag == "script" {
            RegionKind::Script
        } else {
            RegionKind::Style
        };
        let attributes = parse_attributes(&caps[2]);

        let content_start = whole.end();
        let (content_end, end) = if &caps[3] == "/" {
            (content_start, content_start)
        } else {
            let close = format!("</{}", tag);
            match find_ascii_case_insensitive(source, &close, content_start) {
                Some(close_at) => {
                    let close_end = source[close_at..]
                        .find('>')
                        .map(|i| close_at + i + 1)
                        .unwrap_or(source.len());
                    (close_at, close_end)
                }
                // Unterminated: everything to the end is foreign.
                None => (source.len(), source.len()),
            }
        };
        debug!(
            kind = ?kind,
            start = whole.start(),
            end,
            "located verbatim region"
        );
        regions.push(VerbatimRegion {
            kind,
            start: whole.start() as u32,
            end: end as u32,
            content_start: content_start as u32,
            content_end: content_end as u32,
            attributes,
        });
        search_from = end.max(search_from);
    }

    let blanked = blank_regions(source, &regions);
    Extracted { blanked, regions }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let lower = haystack.get(from..)?.to_ascii_lowercase();
    lower.find(needle).map(|i| from + i)
}

fn parse_attributes(text: &str) -> Vec<(String, Option<String>)> {
    ATTR_REGEX
        .captures_iter(text)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string());
            (caps[1].to_string(), value)
        })
        .collect()
}

/// Replace every region interior with spaces, keeping line breaks, and break up
/// long blank runs with `/**/`.
pub fn blank_regions(source: &str, regions: &[VerbatimRegion]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for region in regions {
        let (start, end) = (region.content_start as usize, region.content_end as usize);
        if start < cursor {
            continue;
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&filler_for(&source[start..end]));
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Same byte length as `text`; newlines (and `\r`) survive.
pub fn filler_for(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for ch in text.chars() {
        match ch {
            '\n' | '\r' => {
                out.push(ch);
                run = 0;
            }
            _ => {
                let width = ch.len_utf8();
                if run >= FILLER_RUN && width == 1 && out.ends_with("    ") {
                    // Turn the last three blanks plus this byte into `/**/`.
                    out.truncate(out.len() - 3);
                    out.push_str("/**/");
                    run = 0;
                } else {
                    out.extend(std::iter::repeat(' ').take(width));
                    run += width;
                }
            }
        }
    }
    out
}

/// Put the located regions into `root` and widen the fragment over them.
pub fn attach_regions(
    root: &mut Root,
    regions: &[VerbatimRegion],
    source: &str,
    file: &str,
) -> Result<()> {
    for region in regions {
        let content = JsSpan::new(region.content_start, region.content_end);
        match region.kind {
            RegionKind::Script => {
                let module = matches!(region.attribute("context"), Some("module"))
                    || region.attribute("module").is_some();
                let script = Script {
                    start: region.start,
                    end: region.end,
                    context: if module { "module" } else { "default" }.to_string(),
                    content,
                    lang: region
                        .attribute("lang")
                        .or_else(|| region.attribute("type").map(|t| t.trim_start_matches("text/")))
                        .map(str::to_string),
                };
                let slot = if module {
                    &mut root.module
                } else {
                    &mut root.instance
                };
                if slot.is_some() {
                    let which = if module { "module" } else { "instance" };
                    return Err(TransformError::structural(
                        CompilerError::at(
                            ERR_DUPLICATE_SCRIPT,
                            &format!("A component can only have one {} <script> element", which),
                            file,
                            source,
                            region.start,
                            region.end,
                        )
                        .with_hint("Merge the script blocks into one."),
                    ));
                }
                *slot = Some(script);
            }
            RegionKind::Style => {
                if root.css.is_none() {
                    root.css = Some(Style {
                        start: region.start,
                        end: region.end,
                        content,
                    });
                }
            }
        }
        if root.html.children.is_empty() && root.html.start == root.html.end {
            root.html.start = region.start;
            root.html.end = region.end;
        } else {
            root.html.start = root.html.start.min(region.start);
            root.html.end = root.html.end.max(region.end);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blanking_preserves_length_and_lines() {
        let source = "<script lang=\"ts\">\nlet a: number = 1;\n</script>\n<div>{a}</div>";
        let extracted = extract_verbatim(source);
        assert_eq!(extracted.blanked.len(), source.len());
        assert_eq!(
            extracted.blanked.matches('\n').count(),
            source.matches('\n').count()
        );
        assert!(!extracted.blanked.contains("number"));
        assert!(extracted.blanked.ends_with("<div>{a}</div>"));

        let region = &extracted.regions[0];
        assert_eq!(region.kind, RegionKind::Script);
        assert_eq!(region.attribute("lang"), Some("ts"));
        assert_eq!(
            &source[region.content_start as usize..region.content_end as usize],
            "\nlet a: number = 1;\n"
        );
        assert_eq!(&source[region.end as usize - 9..region.end as usize], "</script>");
    }

    #[test]
    fn test_long_runs_get_inert_filler() {
        let text = "x".repeat(400);
        let filler = filler_for(&text);
        assert_eq!(filler.len(), 400);
        assert!(filler.contains("/**/"));
        assert!(filler.chars().all(|c| c == ' ' || c == '/' || c == '*'));
    }

    #[test]
    fn test_multibyte_content_keeps_byte_length() {
        let filler = filler_for("é😀");
        assert_eq!(filler.len(), "é😀".len());
    }

    #[test]
    fn test_regions_in_comments_and_head_are_skipped() {
        let source = "<!-- <script>bad</script> --><svelte:head><script src=\"x.js\"></script></svelte:head><script context=\"module\">export const a = 1;</script>";
        let extracted = extract_verbatim(source);
        assert_eq!(extracted.regions.len(), 1);
        assert_eq!(extracted.regions[0].attribute("context"), Some("module"));
    }

    #[test]
    fn test_attach_widens_root_and_rejects_duplicates() {
        let source = "<div/><script>let a;</script><style>p{}</style>";
        let extracted = extract_verbatim(source);
        let mut root = Root::default();
        root.html.start = 0;
        root.html.end = 6;
        root.html.children.push(crate::ast::TemplateNode::Unknown(crate::ast::UnknownNode {
            kind: "Element".into(),
            start: 0,
            end: 6,
        }));
        attach_regions(&mut root, &extracted.regions, source, "App.svelte").unwrap();
        assert!(root.instance.is_some());
        assert!(root.css.is_some());
        assert_eq!(root.html.end, source.len() as u32);

        let twice = "<script>let a;</script><script>let b;</script>";
        let extracted = extract_verbatim(twice);
        let err = attach_regions(&mut Root::default(), &extracted.regions, twice, "App.svelte")
            .unwrap_err();
        assert_eq!(err.code(), ERR_DUPLICATE_SCRIPT);
    }
}
