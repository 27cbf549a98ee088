//! Line-level state diffs
//!
//! `diff_lines` is a set-membership comparison used for change magnitude
//! (`+N, -M lines`), not for patching. `summarize_diff` compacts deeply
//! nested JSON lines to a line budget, and `render_unified` produces the
//! human-readable diff printed by `log show`.

use similar::TextDiff;
use std::collections::HashSet;

/// Lines added to and removed from a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDiff {
    /// Lines of the new text absent anywhere in the old text, in new-text order
    pub added: Vec<String>,
    /// Lines of the old text absent anywhere in the new text, in old-text order
    pub removed: Vec<String>,
}

impl LineDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute added/removed lines between two texts by set membership.
///
/// Neither position nor multiplicity is considered.
pub fn diff_lines(old: &str, new: &str) -> LineDiff {
    let old_lines: HashSet<&str> = old.split('\n').collect();
    let new_lines: HashSet<&str> = new.split('\n').collect();

    let added = new
        .split('\n')
        .filter(|line| !old_lines.contains(line))
        .map(str::to_string)
        .collect();
    let removed = old
        .split('\n')
        .filter(|line| !new_lines.contains(line))
        .map(str::to_string)
        .collect();

    LineDiff { added, removed }
}

/// Number of leading tabs
pub fn indentation_level(line: &str) -> usize {
    line.chars().take_while(|c| *c == '\t').count()
}

/// Compress `lines` to at most `limit` lines where possible.
///
/// Starting from the deepest indentation level, each round lowers the
/// threshold by one level and replaces every run of lines deeper than the
/// threshold with a single `... N lines omitted` marker. Stops once the
/// budget is met or the threshold reaches zero, so the result may still
/// exceed `limit`.
pub fn summarize_diff(lines: &[String], limit: usize) -> Vec<String> {
    let mut threshold = lines.iter().map(|l| indentation_level(l)).max().unwrap_or(0);
    let mut result: Vec<String> = lines.to_vec();

    loop {
        if result.len() <= limit || threshold == 0 {
            return result;
        }

        threshold -= 1;
        if threshold == 0 {
            return result;
        }

        let marker_indent = "\t".repeat(threshold + 1);
        let mut collapsed = Vec::with_capacity(result.len());
        let mut omitted = 0usize;

        for line in result {
            if indentation_level(&line) > threshold {
                omitted += 1;
                continue;
            }
            if omitted > 0 {
                collapsed.push(format!("{}... {} lines omitted", marker_indent, omitted));
                omitted = 0;
            }
            collapsed.push(line);
        }
        if omitted > 0 {
            collapsed.push(format!("{}... {} lines omitted", marker_indent, omitted));
        }

        result = collapsed;
    }
}

/// Unified diff between two documents with `context` lines around each hunk
pub fn render_unified(old: &str, new: &str, context: usize) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(context)
        .header("previous", "current")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_diff_json_change() {
        let old = "{\n\t\"a\": 1,\n\t\"b\": 2\n}";
        let new = "{\n\t\"a\": 3,\n\t\"b\": 2\n}";
        let diff = diff_lines(old, new);

        assert_eq!(diff.added, lines(&["\t\"a\": 3,"]));
        assert_eq!(diff.removed, lines(&["\t\"a\": 1,"]));
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_ignores_position_and_multiplicity() {
        let diff = diff_lines("a\nb\nb", "b\na");
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_symmetry() {
        let pairs = [
            ("a\nb\nc", "b\nc\nd"),
            ("", "x\ny"),
            ("same\nsame", "same"),
            ("{\n\t\"k\": 1\n}", "{\n\t\"k\": 2,\n\t\"j\": 3\n}"),
        ];
        for (a, b) in pairs {
            let forward = diff_lines(a, b);
            let backward = diff_lines(b, a);
            assert_eq!(forward.added, backward.removed, "pair ({:?}, {:?})", a, b);
            assert_eq!(forward.removed, backward.added, "pair ({:?}, {:?})", a, b);
        }
    }

    #[test]
    fn test_indentation_level() {
        assert_eq!(indentation_level("none"), 0);
        assert_eq!(indentation_level("\t\tx\t"), 2);
        assert_eq!(indentation_level("    spaces"), 0);
    }

    #[test]
    fn test_summarize_within_budget_is_untouched() {
        let input = lines(&["{", "\t\"a\": {", "\t\t\"b\": 1", "\t}", "}"]);
        assert_eq!(summarize_diff(&input, 10), input);
    }

    #[test]
    fn test_summarize_collapses_deepest_level_first() {
        let input = lines(&[
            "{",
            "\t\"a\": {",
            "\t\t\"b\": {",
            "\t\t\t\"c\": 1,",
            "\t\t\t\"d\": 2",
            "\t\t}",
            "\t}",
            "}",
        ]);

        let summary = summarize_diff(&input, 7);
        assert_eq!(
            summary,
            lines(&[
                "{",
                "\t\"a\": {",
                "\t\t\"b\": {",
                "\t\t\t... 2 lines omitted",
                "\t\t}",
                "\t}",
                "}",
            ])
        );
    }

    #[test]
    fn test_summarize_keeps_lowering_threshold() {
        // Markers from the previous round count as lines in the next one
        let input = lines(&[
            "{",
            "\t\"a\": {",
            "\t\t\"b\": {",
            "\t\t\t\"c\": 1,",
            "\t\t\t\"d\": 2",
            "\t\t}",
            "\t}",
            "}",
        ]);

        let summary = summarize_diff(&input, 4);
        assert_eq!(
            summary,
            lines(&["{", "\t\"a\": {", "\t\t... 3 lines omitted", "\t}", "}"])
        );
    }

    #[test]
    fn test_summarize_flushes_trailing_run() {
        let input = lines(&["top", "\tdeep", "\tdeep", "\tdeep"]);
        let summary = summarize_diff(&input, 2);
        // Threshold reaches zero before any collapse can happen
        assert_eq!(summary, input);

        let input = lines(&["top", "\tmid", "\t\tdeep", "\t\tdeep", "\t\tdeep"]);
        let summary = summarize_diff(&input, 3);
        assert_eq!(summary, lines(&["top", "\tmid", "\t\t... 3 lines omitted"]));
    }

    #[test]
    fn test_render_unified() {
        let rendered = render_unified("a\nb\nc\n", "a\nx\nc\n", 1);
        assert!(rendered.contains("--- previous"));
        assert!(rendered.contains("+++ current"));
        assert!(rendered.contains("-b"));
        assert!(rendered.contains("+x"));
    }
}
