//! Byte-range replacements applied to a text buffer in one pass.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self { range: at..at, text: text.into() }
    }

    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self { range, text: text.into() }
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self { range, text: String::new() }
    }
}

/// Apply non-overlapping edits. Later offsets go first so earlier ranges stay
/// valid; at the same offset the wider range goes first, so an insertion
/// lands in front of whatever a deletion leaves behind.
pub(crate) fn apply(source: &mut String, mut edits: Vec<Edit>) {
    edits.sort_by(|a, b| {
        b.range
            .start
            .cmp(&a.range.start)
            .then(b.range.end.cmp(&a.range.end))
    });
    for edit in edits {
        source.replace_range(edit.range, &edit.text);
    }
}

/// Range covering a node plus the indentation and line break in front of
/// it, when the node sits on its own line.
pub(crate) fn line_range(source: &str, range: Range<usize>) -> Range<usize> {
    let bytes = source.as_bytes();
    let mut start = range.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] == b'\n' {
        start -= 1;
        if start > 0 && bytes[start - 1] == b'\r' {
            start -= 1;
        }
        start..range.end
    } else {
        range
    }
}

/// `range` widened to the whole line(s) it touches, line break included.
pub(crate) fn whole_lines(source: &str, range: Range<usize>) -> Range<usize> {
    let start = source[..range.start].rfind('\n').map_or(0, |i| i + 1);
    let end = source[range.end..].find('\n').map_or(source.len(), |i| range.end + i + 1);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_survives_deletion_at_same_offset() {
        let mut source = "abcdef".to_string();
        apply(&mut source, vec![Edit::insert(2, "XY"), Edit::delete(2..4)]);
        assert_eq!(source, "abXYef");
    }

    #[test]
    fn edits_apply_back_to_front() {
        let mut source = "one two three".to_string();
        apply(
            &mut source,
            vec![Edit::replace(0..3, "1"), Edit::replace(8..13, "3")],
        );
        assert_eq!(source, "1 two 3");
    }

    #[test]
    fn line_range_takes_indentation_and_break() {
        let source = "a\n    <b />\nc";
        assert_eq!(line_range(source, 6..11), 1..11);
        assert_eq!(line_range("x <b />", 2..7), 2..7);
    }

    #[test]
    fn whole_lines_cover_break() {
        let source = "one\n\ttwo = 2\nthree";
        assert_eq!(&source[whole_lines(source, 5..8)], "\ttwo = 2\n");
        assert_eq!(&source[whole_lines(source, 13..15)], "three");
    }
}
