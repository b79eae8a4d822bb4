//! Line/column bookkeeping and v3 source map emission.
//!
//! Offsets everywhere in the crate are byte offsets. Editors and source maps want
//! lines and UTF-16 columns, so this module owns the conversion.

use crate::buffer::{Rendered, SegmentOrigin};

/// Byte offset of the first character of every line.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        LineIndex { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn line_start(&self, line: usize) -> Option<u32> {
        self.line_starts.get(line).copied()
    }

    /// 0-based line and 0-based byte column.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        (line as u32, offset - self.line_starts[line])
    }

    /// 0-based line and 0-based UTF-16 column.
    pub fn line_col_utf16(&self, source: &str, offset: u32) -> (u32, u32) {
        let (line, _) = self.line_col(offset);
        let start = self.line_starts[line as usize] as usize;
        let end = (offset as usize).min(source.len());
        let column = source
            .get(start..end)
            .map(|text| text.encode_utf16().count())
            .unwrap_or(end - start);
        (line, column as u32)
    }
}

/// Build a v3 source map from a rendered buffer. Synthesized text gets no token.
pub fn to_source_map(
    original: &str,
    rendered: &Rendered,
    source_path: &str,
) -> oxc_sourcemap::SourceMap {
    let original_lines = LineIndex::new(original);
    let generated_lines = LineIndex::new(&rendered.text);

    let mut builder = oxc_sourcemap::SourceMapBuilder::default();
    let source_id = builder.set_source_and_content(source_path, original);

    let mut add = |generated: u32, original_offset: u32| {
        let (dst_line, dst_col) = generated_lines.line_col_utf16(&rendered.text, generated);
        let (src_line, src_col) = original_lines.line_col_utf16(original, original_offset);
        builder.add_token(dst_line, dst_col, src_line, src_col, Some(source_id), None);
    };

    for segment in &rendered.mapping {
        match segment.origin {
            SegmentOrigin::Verbatim { original_start } => {
                add(segment.generated_start, original_start);
                // Every generated line inside a verbatim run gets its own token.
                let text = &rendered.text
                    [segment.generated_start as usize..segment.generated_end as usize];
                for (i, byte) in text.bytes().enumerate() {
                    let next = i as u32 + 1;
                    if byte == b'\n' && segment.generated_start + next < segment.generated_end {
                        add(segment.generated_start + next, original_start + next);
                    }
                }
            }
            SegmentOrigin::Replaced { original_start, .. } => {
                add(segment.generated_start, original_start);
            }
            SegmentOrigin::Synthesized => {}
        }
    }

    builder.into_sourcemap()
}
