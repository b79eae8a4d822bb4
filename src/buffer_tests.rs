#[cfg(test)]
mod tests {
    use crate::buffer::{
        BufferError, RewriteBuffer, SegmentOrigin, Transformation, Transformation as T,
    };

    #[test]
    fn test_untouched_source_maps_every_offset() {
        let buffer = RewriteBuffer::new("let a = 1;");
        let rendered = buffer.render();
        assert_eq!(rendered.text, "let a = 1;");
        assert_eq!(rendered.mapping.len(), 1);
        for offset in 0..10 {
            assert_eq!(rendered.original_offset(offset), Some(offset));
        }
    }

    #[test]
    fn test_overwrite_maps_replacement_to_start() {
        let mut buffer = RewriteBuffer::new("hello world");
        buffer.overwrite(0, 5, "HEY").unwrap();
        let rendered = buffer.render();
        assert_eq!(rendered.text, "HEY world");
        assert_eq!(rendered.original_offset(0), Some(0));
        assert_eq!(rendered.original_offset(2), Some(0));
        // "w" keeps its exact origin
        assert_eq!(rendered.original_offset(4), Some(6));
        assert!(matches!(
            rendered.mapping[0].origin,
            SegmentOrigin::Replaced {
                original_start: 0,
                original_end: 5
            }
        ));
    }

    #[test]
    fn test_overlapping_overwrite_fails_fast() {
        let mut buffer = RewriteBuffer::new("hello world");
        buffer.overwrite(0, 5, "HEY").unwrap();
        let err = buffer.overwrite(2, 7, "x").unwrap_err();
        assert!(matches!(err, BufferError::Overlap { .. }));

        let err = buffer.overwrite(0, 5, "again").unwrap_err();
        assert!(matches!(err, BufferError::Overlap { .. }));

        buffer.overwrite_content_only(0, 5, "again").unwrap();
        assert_eq!(buffer.to_text(), "again world");
    }

    #[test]
    fn test_move_keeps_origin() {
        let mut buffer = RewriteBuffer::new("abcdef");
        buffer.move_range(0, 2, 6).unwrap();
        let rendered = buffer.render();
        assert_eq!(rendered.text, "cdefab");
        assert_eq!(rendered.original_offset(4), Some(0));
        assert_eq!(rendered.original_offset(5), Some(1));
        assert_eq!(rendered.original_offset(0), Some(2));
    }

    #[test]
    fn test_move_into_itself_is_rejected() {
        let mut buffer = RewriteBuffer::new("abcdef");
        let err = buffer.move_range(0, 4, 2).unwrap_err();
        assert_eq!(
            err,
            BufferError::MoveIntoSelf {
                start: 0,
                end: 4,
                index: 2
            }
        );
    }

    #[test]
    fn test_transform_window() {
        let source = "{#if a}X{/if}";
        let mut buffer = RewriteBuffer::new(source);
        buffer
            .transform(
                0,
                source.len() as u32,
                &[
                    T::text("if ("),
                    T::range(5, 6),
                    T::text(") {"),
                    T::range(7, 8),
                    T::text("}"),
                ],
            )
            .unwrap();
        let rendered = buffer.render();
        assert_eq!(rendered.text, "if (a) {X}");
        assert_eq!(rendered.original_offset(4), Some(5));
        assert_eq!(rendered.original_offset(8), Some(7));
        assert_eq!(rendered.original_offset(0), None);
    }

    #[test]
    fn test_transform_reorders_ranges() {
        let source = "{#each items as item}";
        let mut buffer = RewriteBuffer::new(source);
        buffer
            .transform(
                0,
                source.len() as u32,
                &[
                    T::text("for (const "),
                    T::range(16, 20),
                    T::text(" of "),
                    T::range(7, 12),
                    T::text(") {"),
                ],
            )
            .unwrap();
        let rendered = buffer.render();
        assert_eq!(rendered.text, "for (const item of items) {");
        let item_at = rendered.text.find("item").unwrap() as u32;
        let items_at = rendered.text.find("items").unwrap() as u32;
        assert_eq!(rendered.original_offset(item_at), Some(16));
        assert_eq!(rendered.original_offset(items_at + 4), Some(11));
    }

    #[test]
    fn test_parent_window_carries_child_rewrites() {
        let source = "<p>{x}</p>";
        let mut buffer = RewriteBuffer::new(source);
        buffer
            .transform(3, 6, &[T::range(4, 5), T::text(";")])
            .unwrap();
        buffer
            .transform(0, 10, &[T::text("{ "), T::range(3, 6), T::text(" }")])
            .unwrap();
        let rendered = buffer.render();
        assert_eq!(rendered.text, "{ x; }");
        assert_eq!(rendered.original_offset(2), Some(4));
    }

    #[test]
    fn test_sibling_windows_keep_document_order() {
        let source = "{a}{b}";
        let mut buffer = RewriteBuffer::new(source);
        buffer
            .transform(0, 3, &[T::range(1, 2), T::text(";")])
            .unwrap();
        buffer
            .transform(3, 6, &[T::range(4, 5), T::text(";")])
            .unwrap();
        assert_eq!(buffer.to_text(), "a;b;");
    }

    #[test]
    fn test_non_contiguous_move_is_rejected() {
        let mut buffer = RewriteBuffer::new("abcdef");
        buffer
            .transform(0, 6, &[Transformation::Range(3, 4), Transformation::Range(0, 2)])
            .unwrap();
        assert_eq!(buffer.to_text(), "dab");
        let err = buffer.move_range(0, 4, 6).unwrap_err();
        assert_eq!(err, BufferError::NonContiguousMove { start: 0, end: 4 });
    }

    #[test]
    fn test_range_outside_window_is_rejected() {
        let mut buffer = RewriteBuffer::new("abcdef");
        let err = buffer
            .transform(2, 4, &[T::range(0, 3)])
            .unwrap_err();
        assert!(matches!(err, BufferError::RangeOutsideWindow { .. }));
    }

    #[test]
    fn test_inserted_text_travels_with_its_chunk() {
        let mut buffer = RewriteBuffer::new("abc");
        buffer.insert_left(1, "X").unwrap();
        buffer.move_range(0, 1, 3).unwrap();
        assert_eq!(buffer.to_text(), "bcaX");

        let mut buffer = RewriteBuffer::new("abc");
        buffer.insert_left(1, "X").unwrap();
        buffer.prepend_left(1, "V").unwrap();
        assert_eq!(buffer.to_text(), "aVXbc");

        let mut buffer = RewriteBuffer::new("abc");
        buffer.insert_right(1, "Y").unwrap();
        buffer.prepend_right(1, "W").unwrap();
        assert_eq!(buffer.to_text(), "aWYbc");
    }

    #[test]
    fn test_prepend_append_and_move_to_front() {
        let mut buffer = RewriteBuffer::new("x-y");
        buffer.prepend("A");
        buffer.append("Z");
        assert_eq!(buffer.to_text(), "Ax-yZ");
        buffer.move_to_front(2, 3).unwrap();
        assert_eq!(buffer.to_text(), "yAx-Z");
    }

    #[test]
    fn test_remove_and_generated_lookup() {
        let mut buffer = RewriteBuffer::new("keep drop keep");
        buffer.remove(4, 9).unwrap();
        let rendered = buffer.render();
        assert_eq!(rendered.text, "keep keep");
        assert_eq!(rendered.original_offset(5), Some(10));
        assert_eq!(rendered.generated_offset(10), Some(5));
        assert_eq!(rendered.generated_offset(6), None);
    }

    #[test]
    fn test_invalid_offset() {
        let mut buffer = RewriteBuffer::new("é");
        let err = buffer.overwrite(1, 2, "e").unwrap_err();
        assert!(matches!(err, BufferError::InvalidOffset { offset: 1, .. }));
    }
}
