//! Position-Preserving Rewrite Buffer
//!
//! The original source is kept as a list of chunks linked in output order. Edits split
//! chunks at original offsets and then replace their content, attach text around
//! them, or relink them somewhere else. Rendering walks the links once and records
//! where every generated byte came from.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

type ChunkId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("cannot split edited chunk {start}..{end} at offset {offset}")]
    Overlap { offset: u32, start: u32, end: u32 },
    #[error("range {start}..{end} is not contiguous in the rewritten output")]
    NonContiguousMove { start: u32, end: u32 },
    #[error("cannot move {start}..{end} to {index}, which lies inside it")]
    MoveIntoSelf { start: u32, end: u32, index: u32 },
    #[error("offset {offset} is not a valid position in a source of {len} bytes")]
    InvalidOffset { offset: u32, len: u32 },
    #[error("range {start}..{end} lies outside the window {window_start}..{window_end}")]
    RangeOutsideWindow {
        start: u32,
        end: u32,
        window_start: u32,
        window_end: u32,
    },
    #[error("empty range at {at}; use an insert instead")]
    EmptyRange { at: u32 },
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORMATION ARRAYS
// ═══════════════════════════════════════════════════════════════════════════════

/// One element of a [`TransformationArray`]: either literal text to emit, or a
/// `[start, end)` range of the original source to relocate into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformation {
    Text(String),
    Range(u32, u32),
}

impl Transformation {
    pub fn text(text: impl Into<String>) -> Self {
        Transformation::Text(text.into())
    }

    pub fn range(start: u32, end: u32) -> Self {
        Transformation::Range(start, end)
    }
}

pub type TransformationArray = Vec<Transformation>;

// ═══════════════════════════════════════════════════════════════════════════════
// MAPPING OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SegmentOrigin {
    /// Copied byte for byte from `original_start`.
    #[serde(rename_all = "camelCase")]
    Verbatim { original_start: u32 },
    /// Replacement text for an overwritten original span.
    #[serde(rename_all = "camelCase")]
    Replaced { original_start: u32, original_end: u32 },
    /// Text with no origin in the source.
    Synthesized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedSegment {
    pub generated_start: u32,
    pub generated_end: u32,
    pub origin: SegmentOrigin,
}

#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub text: String,
    pub mapping: Vec<MappedSegment>,
}

impl Rendered {
    /// Original offset for a generated offset. `None` for synthesized text.
    pub fn original_offset(&self, generated: u32) -> Option<u32> {
        let idx = self
            .mapping
            .partition_point(|segment| segment.generated_end <= generated);
        let segment = self.mapping.get(idx)?;
        if generated < segment.generated_start {
            return None;
        }
        match segment.origin {
            SegmentOrigin::Verbatim { original_start } => {
                Some(original_start + (generated - segment.generated_start))
            }
            SegmentOrigin::Replaced { original_start, .. } => Some(original_start),
            SegmentOrigin::Synthesized => None,
        }
    }

    /// First generated offset that maps back to `original`, if any.
    pub fn generated_offset(&self, original: u32) -> Option<u32> {
        self.mapping.iter().find_map(|segment| match segment.origin {
            SegmentOrigin::Verbatim { original_start } => {
                let len = segment.generated_end - segment.generated_start;
                (original >= original_start && original < original_start + len)
                    .then(|| segment.generated_start + (original - original_start))
            }
            SegmentOrigin::Replaced {
                original_start,
                original_end,
            } => (original >= original_start && original < original_end)
                .then_some(segment.generated_start),
            SegmentOrigin::Synthesized => None,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHUNKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkOrigin {
    Source,
    /// Literal created by a `transform` over the given window.
    Literal { window_start: u32, window_end: u32 },
    /// Literal attached to the head or tail of the document.
    Detached,
}

#[derive(Debug, Clone)]
struct Chunk {
    start: u32,
    end: u32,
    content: String,
    intro: String,
    outro: String,
    edited: bool,
    origin: ChunkOrigin,
    prev: Option<ChunkId>,
    next: Option<ChunkId>,
}

impl Chunk {
    fn belongs_to(&self, start: u32, end: u32) -> bool {
        match self.origin {
            ChunkOrigin::Source => {
                self.start >= start && self.end <= end && self.start < self.end
            }
            ChunkOrigin::Literal {
                window_start,
                window_end,
            } => window_start >= start && window_end <= end,
            ChunkOrigin::Detached => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct RewriteBuffer {
    original: String,
    chunks: Vec<Chunk>,
    head: Option<ChunkId>,
    tail: Option<ChunkId>,
    by_start: BTreeMap<u32, ChunkId>,
    by_end: HashMap<u32, ChunkId>,
}

impl RewriteBuffer {
    pub fn new(source: impl Into<String>) -> Self {
        let original: String = source.into();
        let len = original.len() as u32;
        let chunk = Chunk {
            start: 0,
            end: len,
            content: original.clone(),
            intro: String::new(),
            outro: String::new(),
            edited: false,
            origin: ChunkOrigin::Source,
            prev: None,
            next: None,
        };
        let mut by_start = BTreeMap::new();
        let mut by_end = HashMap::new();
        by_start.insert(0, 0);
        by_end.insert(len, 0);
        RewriteBuffer {
            original,
            chunks: vec![chunk],
            head: Some(0),
            tail: Some(0),
            by_start,
            by_end,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn len(&self) -> u32 {
        self.original.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Original text of `[start, end)`, or an empty string when out of range.
    pub fn slice(&self, start: u32, end: u32) -> &str {
        self.original
            .get(start as usize..end as usize)
            .unwrap_or_default()
    }

    fn check_offset(&self, offset: u32) -> Result<(), BufferError> {
        if offset > self.len() || !self.original.is_char_boundary(offset as usize) {
            return Err(BufferError::InvalidOffset {
                offset,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn split(&mut self, index: u32) -> Result<(), BufferError> {
        self.check_offset(index)?;
        if index == 0 || index == self.len() {
            return Ok(());
        }
        if self.by_start.contains_key(&index) || self.by_end.contains_key(&index) {
            return Ok(());
        }
        let id = match self.by_start.range(..index).next_back() {
            Some((_, &id)) => id,
            None => return Err(BufferError::InvalidOffset { offset: index, len: self.len() }),
        };
        self.split_chunk(id, index)
    }

    fn split_chunk(&mut self, id: ChunkId, index: u32) -> Result<(), BufferError> {
        let (start, end, edited, next) = {
            let chunk = &self.chunks[id];
            (chunk.start, chunk.end, chunk.edited, chunk.next)
        };
        if edited && !self.chunks[id].content.is_empty() {
            return Err(BufferError::Overlap {
                offset: index,
                start,
                end,
            });
        }

        let new_id = self.chunks.len();
        let outro = std::mem::take(&mut self.chunks[id].outro);
        let tail_content = if edited {
            String::new()
        } else {
            self.original[index as usize..end as usize].to_string()
        };
        self.chunks.push(Chunk {
            start: index,
            end,
            content: tail_content,
            intro: String::new(),
            outro,
            edited,
            origin: ChunkOrigin::Source,
            prev: Some(id),
            next,
        });

        {
            let chunk = &mut self.chunks[id];
            chunk.end = index;
            chunk.content = if edited {
                String::new()
            } else {
                self.original[start as usize..index as usize].to_string()
            };
            chunk.next = Some(new_id);
        }
        if let Some(next) = next {
            self.chunks[next].prev = Some(new_id);
        }
        if self.tail == Some(id) {
            self.tail = Some(new_id);
        }

        self.by_end.insert(index, id);
        self.by_start.insert(index, new_id);
        self.by_end.insert(end, new_id);
        Ok(())
    }

    fn source_chunks_in(&self, start: u32, end: u32) -> Vec<ChunkId> {
        self.by_start.range(start..end).map(|(_, &id)| id).collect()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Edits
    // ───────────────────────────────────────────────────────────────────────────

    pub fn overwrite(&mut self, start: u32, end: u32, content: &str) -> Result<(), BufferError> {
        self.edit(start, end, content, false)
    }

    /// Replace the content of `[start, end)` but keep text attached around it.
    /// Also allowed over a range that was already overwritten.
    pub fn overwrite_content_only(
        &mut self,
        start: u32,
        end: u32,
        content: &str,
    ) -> Result<(), BufferError> {
        self.edit(start, end, content, true)
    }

    fn edit(
        &mut self,
        start: u32,
        end: u32,
        content: &str,
        content_only: bool,
    ) -> Result<(), BufferError> {
        if start == end {
            return Err(BufferError::EmptyRange { at: start });
        }
        self.split(start)?;
        self.split(end)?;
        let ids = self.source_chunks_in(start, end);
        if !content_only {
            if let Some(&id) = ids
                .iter()
                .find(|&&id| self.chunks[id].edited && !self.chunks[id].content.is_empty())
            {
                let chunk = &self.chunks[id];
                return Err(BufferError::Overlap {
                    offset: start,
                    start: chunk.start,
                    end: chunk.end,
                });
            }
        }
        for (i, &id) in ids.iter().enumerate() {
            let chunk = &mut self.chunks[id];
            chunk.content = if i == 0 {
                content.to_string()
            } else {
                String::new()
            };
            chunk.edited = true;
            if !content_only {
                chunk.intro.clear();
                chunk.outro.clear();
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, start: u32, end: u32) -> Result<(), BufferError> {
        if start == end {
            return Ok(());
        }
        self.split(start)?;
        self.split(end)?;
        for id in self.source_chunks_in(start, end) {
            let chunk = &mut self.chunks[id];
            if chunk.edited && !chunk.content.is_empty() {
                return Err(BufferError::Overlap {
                    offset: start,
                    start: chunk.start,
                    end: chunk.end,
                });
            }
            chunk.content.clear();
            chunk.intro.clear();
            chunk.outro.clear();
            chunk.edited = true;
        }
        Ok(())
    }

    /// Append text after whatever ends at `index`. It travels with that chunk.
    pub fn insert_left(&mut self, index: u32, content: &str) -> Result<(), BufferError> {
        self.split(index)?;
        match self.by_end.get(&index) {
            Some(&id) => self.chunks[id].outro.push_str(content),
            None => self.prepend(content),
        }
        Ok(())
    }

    /// Same anchor as [`insert_left`](Self::insert_left), but placed before earlier insertions.
    pub fn prepend_left(&mut self, index: u32, content: &str) -> Result<(), BufferError> {
        self.split(index)?;
        match self.by_end.get(&index) {
            Some(&id) => self.chunks[id].outro.insert_str(0, content),
            None => self.prepend(content),
        }
        Ok(())
    }

    /// Insert text before whatever starts at `index`. It travels with that chunk.
    pub fn insert_right(&mut self, index: u32, content: &str) -> Result<(), BufferError> {
        self.split(index)?;
        match self.by_start.get(&index) {
            Some(&id) if index < self.len() => self.chunks[id].intro.push_str(content),
            _ => self.append(content),
        }
        Ok(())
    }

    /// Same anchor as [`insert_right`](Self::insert_right), but placed before earlier insertions.
    pub fn prepend_right(&mut self, index: u32, content: &str) -> Result<(), BufferError> {
        self.split(index)?;
        match self.by_start.get(&index) {
            Some(&id) if index < self.len() => self.chunks[id].intro.insert_str(0, content),
            _ => self.append(content),
        }
        Ok(())
    }

    pub fn prepend(&mut self, content: &str) {
        let id = self.push_literal(content, ChunkOrigin::Detached, 0);
        let head = self.head;
        self.link_before(id, id, head);
    }

    pub fn append(&mut self, content: &str) {
        let len = self.len();
        let id = self.push_literal(content, ChunkOrigin::Detached, len);
        self.link_before(id, id, None);
    }

    fn push_literal(&mut self, content: &str, origin: ChunkOrigin, at: u32) -> ChunkId {
        let id = self.chunks.len();
        self.chunks.push(Chunk {
            start: at,
            end: at,
            content: content.to_string(),
            intro: String::new(),
            outro: String::new(),
            edited: true,
            origin,
            prev: None,
            next: None,
        });
        id
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Relinking
    // ───────────────────────────────────────────────────────────────────────────

    /// First and last chunk (in output order) of everything that belongs to
    /// `[start, end)`. Fails when foreign chunks sit in between.
    fn extent(&self, start: u32, end: u32) -> Result<Option<(ChunkId, ChunkId)>, BufferError> {
        let mut first = None;
        let mut last = None;
        let mut foreign_since_last = false;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let chunk = &self.chunks[id];
            if chunk.belongs_to(start, end) {
                if first.is_none() {
                    first = Some(id);
                } else if foreign_since_last {
                    return Err(BufferError::NonContiguousMove { start, end });
                }
                last = Some(id);
                foreign_since_last = false;
            } else if first.is_some() && !is_blank_zero_width(chunk) {
                foreign_since_last = true;
            }
            cursor = chunk.next;
        }
        Ok(first.zip(last))
    }

    fn unlink(&mut self, first: ChunkId, last: ChunkId) {
        let prev = self.chunks[first].prev;
        let next = self.chunks[last].next;
        match prev {
            Some(p) => self.chunks[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.chunks[n].prev = prev,
            None => self.tail = prev,
        }
        self.chunks[first].prev = None;
        self.chunks[last].next = None;
    }

    /// Link the detached run `first..=last` before `target`, or at the tail.
    fn link_before(&mut self, first: ChunkId, last: ChunkId, target: Option<ChunkId>) {
        match target {
            Some(t) => {
                let prev = self.chunks[t].prev;
                self.chunks[first].prev = prev;
                self.chunks[last].next = Some(t);
                self.chunks[t].prev = Some(last);
                match prev {
                    Some(p) => self.chunks[p].next = Some(first),
                    None => self.head = Some(first),
                }
            }
            None => {
                let tail = self.tail;
                self.chunks[first].prev = tail;
                self.chunks[last].next = None;
                match tail {
                    Some(t) => self.chunks[t].next = Some(first),
                    None => self.head = Some(first),
                }
                self.tail = Some(last);
            }
        }
    }

    fn anchor(&self, index: u32) -> Option<ChunkId> {
        if index >= self.len() {
            return None;
        }
        self.by_start.get(&index).copied()
    }

    fn relink_before(&mut self, block: (ChunkId, ChunkId), target: Option<ChunkId>) {
        let (first, last) = block;
        if let Some(target) = target {
            let mut cursor = Some(first);
            while let Some(id) = cursor {
                if id == target {
                    return;
                }
                cursor = if id == last { None } else { self.chunks[id].next };
            }
        }
        self.unlink(first, last);
        self.link_before(first, last, target);
    }

    /// Move `[start, end)` so that it renders right before the chunk that starts at
    /// `index` (or at the end of the document when `index` is the source length).
    pub fn move_range(&mut self, start: u32, end: u32, index: u32) -> Result<(), BufferError> {
        if index > start && index < end {
            return Err(BufferError::MoveIntoSelf { start, end, index });
        }
        self.split(start)?;
        self.split(end)?;
        self.split(index)?;
        if let Some(block) = self.extent(start, end)? {
            let target = self.anchor(index);
            self.relink_before(block, target);
        }
        Ok(())
    }

    /// Move `[start, end)` in front of everything rendered so far.
    pub fn move_to_front(&mut self, start: u32, end: u32) -> Result<(), BufferError> {
        self.split(start)?;
        self.split(end)?;
        if let Some(block) = self.extent(start, end)? {
            let head = self.head;
            self.relink_before(block, head);
        }
        Ok(())
    }

    /// Rewrite the window `[start, end)` so that it renders as exactly the given
    /// items, in order. Original text not named by a range is removed.
    pub fn transform(
        &mut self,
        start: u32,
        end: u32,
        items: &[Transformation],
    ) -> Result<(), BufferError> {
        self.split(start)?;
        self.split(end)?;

        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for item in items {
            if let Transformation::Range(s, e) = *item {
                if s == e {
                    continue;
                }
                if s < start || e > end || s > e {
                    return Err(BufferError::RangeOutsideWindow {
                        start: s,
                        end: e,
                        window_start: start,
                        window_end: end,
                    });
                }
                self.split(s)?;
                self.split(e)?;
                ranges.push((s, e));
            }
        }

        let mut sorted = ranges.clone();
        sorted.sort_unstable();
        let mut cursor = start;
        for &(s, e) in &sorted {
            if s < cursor {
                return Err(BufferError::Overlap {
                    offset: s,
                    start: s,
                    end: e,
                });
            }
            self.remove(cursor, s)?;
            cursor = e;
        }
        self.remove(cursor, end)?;

        // Extents are resolved before any literal of this window exists.
        let mut blocks: HashMap<(u32, u32), Option<(ChunkId, ChunkId)>> = HashMap::new();
        for &(s, e) in &ranges {
            let block = self.extent(s, e)?;
            blocks.insert((s, e), block);
        }

        let target = self.anchor(end);
        for item in items {
            match item {
                Transformation::Text(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    let id = self.push_literal(
                        text,
                        ChunkOrigin::Literal {
                            window_start: start,
                            window_end: end,
                        },
                        end,
                    );
                    self.link_before(id, id, target);
                }
                Transformation::Range(s, e) => {
                    if let Some(Some(block)) = blocks.get(&(*s, *e)) {
                        self.relink_before(*block, target);
                    }
                }
            }
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Rendering
    // ───────────────────────────────────────────────────────────────────────────

    pub fn render(&self) -> Rendered {
        let mut out = MappingWriter::default();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let chunk = &self.chunks[id];
            out.push(&chunk.intro, SegmentOrigin::Synthesized);
            let origin = match chunk.origin {
                ChunkOrigin::Source if !chunk.edited => SegmentOrigin::Verbatim {
                    original_start: chunk.start,
                },
                ChunkOrigin::Source => SegmentOrigin::Replaced {
                    original_start: chunk.start,
                    original_end: chunk.end,
                },
                _ => SegmentOrigin::Synthesized,
            };
            out.push(&chunk.content, origin);
            out.push(&chunk.outro, SegmentOrigin::Synthesized);
            cursor = chunk.next;
        }
        out.finish()
    }

    pub fn to_text(&self) -> String {
        self.render().text
    }
}

fn is_blank_zero_width(chunk: &Chunk) -> bool {
    chunk.origin == ChunkOrigin::Source
        && chunk.start == chunk.end
        && chunk.content.is_empty()
        && chunk.intro.is_empty()
        && chunk.outro.is_empty()
}

#[derive(Default)]
struct MappingWriter {
    text: String,
    mapping: Vec<MappedSegment>,
}

impl MappingWriter {
    fn push(&mut self, content: &str, origin: SegmentOrigin) {
        if content.is_empty() {
            return;
        }
        let generated_start = self.text.len() as u32;
        self.text.push_str(content);
        let generated_end = self.text.len() as u32;

        if let Some(last) = self.mapping.last_mut() {
            let merged = match (last.origin, origin) {
                (SegmentOrigin::Synthesized, SegmentOrigin::Synthesized) => true,
                (
                    SegmentOrigin::Verbatim { original_start: a },
                    SegmentOrigin::Verbatim { original_start: b },
                ) => a + (last.generated_end - last.generated_start) == b,
                _ => false,
            };
            if merged && last.generated_end == generated_start {
                last.generated_end = generated_end;
                return;
            }
        }
        self.mapping.push(MappedSegment {
            generated_start,
            generated_end,
            origin,
        });
    }

    fn finish(self) -> Rendered {
        Rendered {
            text: self.text,
            mapping: self.mapping,
        }
    }
}
