//! `$store` rewriting
//!
//! A `$name` reference that no enclosing scope declares is a store subscription.
//! Reads become `__sveltets_2_store_get(name)`; writes become `name.set(...)`.
//! Every site lowers to a list of [`TextEdit`]s so the same rewrite can be applied
//! to the buffer or to a synthesized copy of the expression text.

use serde::{Deserialize, Serialize};

use crate::buffer::{BufferError, RewriteBuffer};

pub const STORE_GET: &str = "__sveltets_2_store_get";

pub fn is_store_name(name: &str) -> bool {
    name.len() > 1 && name.starts_with('$') && !name.starts_with("$$")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum StoreAccess {
    Read,
    /// `{ $name }` object shorthand.
    ShorthandRead,
    Assign {
        right_start: u32,
        right_end: u32,
    },
    Compound {
        /// Binary operator without the trailing `=` (`+`, `>>>`, `??`, ...).
        operator: String,
        right_start: u32,
        right_end: u32,
    },
    Update {
        operator: String,
        prefix: bool,
        expr_start: u32,
        expr_end: u32,
    },
    /// Destructuring or `for ... of` target; `shorthand` for `{ $name } = ...`.
    Target {
        shorthand: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSite {
    /// Store name without the `$`.
    pub name: String,
    /// Span of the `$name` identifier.
    pub start: u32,
    pub end: u32,
    pub access: StoreAccess,
}

/// Which neighbour an insertion travels with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Attach {
    /// The text that ends at the insertion point.
    Left,
    /// The text that starts at the insertion point.
    Right,
}

/// Replace `[start, end)` with `text`; `start == end` is an insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: u32,
    pub end: u32,
    pub text: String,
    pub attach: Attach,
}

impl TextEdit {
    pub fn new(start: u32, end: u32, text: impl Into<String>) -> Self {
        TextEdit {
            start,
            end,
            text: text.into(),
            attach: Attach::Left,
        }
    }

    pub fn insert(at: u32, text: impl Into<String>) -> Self {
        TextEdit::new(at, at, text)
    }

    pub fn insert_before(at: u32, text: impl Into<String>) -> Self {
        TextEdit {
            attach: Attach::Right,
            ..TextEdit::new(at, at, text)
        }
    }

    pub fn is_insertion(&self) -> bool {
        self.start == self.end
    }
}

impl StoreSite {
    pub fn sigil_name(&self) -> String {
        format!("${}", self.name)
    }

    pub fn edits(&self) -> Vec<TextEdit> {
        let (ls, le) = (self.start, self.end);
        let get = format!("{}({})", STORE_GET, self.name);
        match &self.access {
            StoreAccess::Read => vec![
                TextEdit::new(ls, ls + 1, format!("{}(", STORE_GET)),
                TextEdit::insert(le, ")"),
            ],
            StoreAccess::ShorthandRead => vec![
                TextEdit::insert_before(ls, format!("{}: ", self.sigil_name())),
                TextEdit::new(ls, ls + 1, format!("{}(", STORE_GET)),
                TextEdit::insert(le, ")"),
            ],
            StoreAccess::Assign {
                right_start,
                right_end,
            } => vec![
                TextEdit::new(ls, ls + 1, ""),
                TextEdit::new(le, *right_start, ".set("),
                TextEdit::insert(*right_end, ")"),
            ],
            StoreAccess::Compound {
                operator,
                right_start,
                right_end,
            } => vec![
                TextEdit::new(ls, ls + 1, ""),
                TextEdit::new(le, *right_start, format!(".set({} {} (", get, operator)),
                TextEdit::insert(*right_end, "))"),
            ],
            StoreAccess::Update {
                operator,
                prefix,
                expr_start,
                expr_end,
            } => {
                let set = format!(".set({} {} 1)", get, operator);
                if *prefix {
                    vec![
                        TextEdit::new(*expr_start, ls + 1, ""),
                        TextEdit::insert(le, set),
                    ]
                } else {
                    vec![
                        TextEdit::new(ls, ls + 1, ""),
                        TextEdit::new(le, *expr_end, set),
                    ]
                }
            }
            StoreAccess::Target { shorthand } => {
                // A setter-only member is assignable wherever the identifier was.
                let setter = format!(
                    "({{ set v($$v: Parameters<typeof {name}.set>[0]) {{ {name}.set($$v); }} }}).v",
                    name = self.name
                );
                let mut edits = Vec::with_capacity(2);
                if *shorthand {
                    edits.push(TextEdit::insert_before(ls, format!("{}: ", self.sigil_name())));
                }
                edits.push(TextEdit::new(ls, le, setter));
                edits
            }
        }
    }
}

/// Sites whose `$name` is not shadowed by a declaration the caller knows about.
pub fn unshadowed<'a>(
    sites: &'a [StoreSite],
    is_declared: impl Fn(&str) -> bool + 'a,
) -> impl Iterator<Item = &'a StoreSite> + 'a {
    sites
        .iter()
        .filter(move |site| !is_declared(&site.sigil_name()))
}

/// Replacements go first, insertions afterwards in the order given.
pub fn apply_edits(buffer: &mut RewriteBuffer, edits: &[TextEdit]) -> Result<(), BufferError> {
    for edit in edits.iter().filter(|e| !e.is_insertion()) {
        if edit.text.is_empty() {
            buffer.remove(edit.start, edit.end)?;
        } else {
            buffer.overwrite(edit.start, edit.end, &edit.text)?;
        }
    }
    for edit in edits.iter().filter(|e| e.is_insertion()) {
        match edit.attach {
            Attach::Left => buffer.insert_left(edit.start, &edit.text)?,
            Attach::Right => buffer.insert_right(edit.start, &edit.text)?,
        }
    }
    Ok(())
}

pub fn apply_sites<'a>(
    buffer: &mut RewriteBuffer,
    sites: impl IntoIterator<Item = &'a StoreSite>,
) -> Result<(), BufferError> {
    let edits: Vec<TextEdit> = sites.into_iter().flat_map(StoreSite::edits).collect();
    apply_edits(buffer, &edits)
}

/// Apply edits to `text`, which starts at absolute offset `base`. Edits outside the
/// text are ignored. Same-position insertions keep their relative order, left-attached
/// ones first, and land in front of a replacement starting there.
pub fn splice(text: &str, base: u32, edits: &[TextEdit]) -> String {
    let end_of_text = base + text.len() as u32;
    let mut ordered: Vec<&TextEdit> = edits
        .iter()
        .filter(|e| e.start >= base && e.end <= end_of_text)
        .collect();
    ordered.sort_by_key(|e| (e.start, !e.is_insertion(), e.attach));

    let mut out = String::with_capacity(text.len() + 32);
    let mut cursor = base;
    for edit in ordered {
        if edit.start < cursor {
            continue;
        }
        out.push_str(&text[(cursor - base) as usize..(edit.start - base) as usize]);
        out.push_str(&edit.text);
        cursor = edit.end;
    }
    out.push_str(&text[(cursor - base) as usize..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{analyze, JsKind};

    fn rewrite(code: &str) -> String {
        let analysis = analyze(code, 0, JsKind::Expression).unwrap();
        let edits: Vec<TextEdit> = analysis.stores.iter().flat_map(StoreSite::edits).collect();
        splice(code, 0, &edits)
    }

    fn rewrite_in_buffer(code: &str) -> String {
        let analysis = analyze(code, 0, JsKind::Expression).unwrap();
        let mut buffer = RewriteBuffer::new(code);
        apply_sites(&mut buffer, &analysis.stores).unwrap();
        buffer.to_text()
    }

    #[test]
    fn test_read() {
        assert_eq!(rewrite("$count * 2"), "__sveltets_2_store_get(count) * 2");
        assert_eq!(rewrite_in_buffer("$count * 2"), "__sveltets_2_store_get(count) * 2");
    }

    #[test]
    fn test_assign_has_no_getter() {
        let out = rewrite_in_buffer("$count = 5");
        assert_eq!(out, "count.set(5)");
        assert!(!out.contains(STORE_GET));
    }

    #[test]
    fn test_compound_calls_getter_once() {
        let out = rewrite_in_buffer("$count += step");
        assert_eq!(out, "count.set(__sveltets_2_store_get(count) + (step))");
        assert_eq!(out.matches(STORE_GET).count(), 1);
        assert_eq!(
            rewrite("$flags >>>= 1"),
            "flags.set(__sveltets_2_store_get(flags) >>> (1))"
        );
    }

    #[test]
    fn test_updates() {
        assert_eq!(
            rewrite_in_buffer("$count++"),
            "count.set(__sveltets_2_store_get(count) + 1)"
        );
        assert_eq!(
            rewrite_in_buffer("--$count"),
            "count.set(__sveltets_2_store_get(count) - 1)"
        );
    }

    #[test]
    fn test_nested_store_on_right_side() {
        assert_eq!(
            rewrite_in_buffer("$a = $b"),
            "a.set(__sveltets_2_store_get(b))"
        );
        assert_eq!(rewrite("$a = $b"), "a.set(__sveltets_2_store_get(b))");
    }

    #[test]
    fn test_shorthand_property() {
        assert_eq!(
            rewrite_in_buffer("{ $user }"),
            "{ $user: __sveltets_2_store_get(user) }"
        );
    }

    #[test]
    fn test_local_and_double_dollar_untouched() {
        assert_eq!(rewrite("($value) => $value + 1"), "($value) => $value + 1");
        assert_eq!(rewrite("$$props.a"), "$$props.a");
    }

    #[test]
    fn test_destructuring_targets_write_through_set() {
        let setter = "({ set v($$v: Parameters<typeof a.set>[0]) { a.set($$v); } }).v";
        assert_eq!(rewrite("[$a] = pair"), format!("[{}] = pair", setter));
        assert_eq!(rewrite_in_buffer("[$a] = pair"), format!("[{}] = pair", setter));
        assert_eq!(rewrite("({ x: $a } = o)"), format!("({{ x: {} }} = o)", setter));
        assert_eq!(rewrite_in_buffer("({ $a } = o)"), format!("({{ $a: {} }} = o)", setter));
        assert_eq!(
            rewrite("[$a = $b] = pair"),
            format!("[{} = __sveltets_2_store_get(b)] = pair", setter)
        );
        assert_eq!(
            rewrite("[x[$k]] = pair"),
            "[x[__sveltets_2_store_get(k)]] = pair"
        );
        assert_eq!(rewrite("([$a]) => ([$a] = pair)"), "([$a]) => ([$a] = pair)");
    }

    #[test]
    fn test_unshadowed_filter() {
        let analysis = analyze("$a + $b", 0, JsKind::Expression).unwrap();
        let kept: Vec<_> = unshadowed(&analysis.stores, |name| name == "$a")
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(kept, vec!["b"]);
    }
}
