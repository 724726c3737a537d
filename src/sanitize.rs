//! Strips inline reasoning blocks (`<think>`, `<reasoning>`) that reasoning
//! models emit ahead of their final answer.

use log::debug;
use once_cell::sync::Lazy;
use regex::{ Regex, RegexBuilder };

/// Tag names treated as reasoning blocks, applied in this order.
pub const REASONING_TAGS: &[&str] = &["think", "reasoning"];

static REASONING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    REASONING_TAGS.iter()
        .map(|tag| {
            RegexBuilder::new(&format!("<{tag}>.*?</{tag}>", tag = regex::escape(tag)))
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
                .unwrap_or_else(|e| panic!("invalid reasoning pattern for <{}>: {}", tag, e))
        })
        .collect()
});

// Three or more newlines separated only by whitespace.
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());

/// Returns the final-answer portion of raw model output.
///
/// Every balanced reasoning block is removed (case-insensitive, non-greedy,
/// spanning newlines). Removal is repeated until nothing matches, so the
/// result never contains a balanced pair and `sanitize` is idempotent. When
/// something was removed, runs of blank lines left behind are collapsed to a
/// single blank line. The result is always trimmed.
///
/// An opening tag without a closer is kept together with everything after
/// it.
pub fn sanitize(raw: &str) -> String {
    let (stripped, removed) = strip_reasoning(raw);
    if !removed {
        return stripped.trim().to_string();
    }
    debug!("Stripped reasoning blocks ({} -> {} bytes)", raw.len(), stripped.len());
    BLANK_RUN.replace_all(&stripped, "\n\n").trim().to_string()
}

/// Removes reasoning blocks and reports whether anything was removed.
fn strip_reasoning(raw: &str) -> (String, bool) {
    let mut text = raw.to_string();
    let mut removed = false;

    loop {
        let mut changed = false;
        for pattern in REASONING_PATTERNS.iter() {
            if pattern.is_match(&text) {
                text = pattern.replace_all(&text, "").into_owned();
                changed = true;
            }
        }
        if !changed {
            break;
        }
        removed = true;
    }

    (text, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_think_block() {
        assert_eq!(sanitize("<think>scratch</think>Final answer."), "Final answer.");
    }

    #[test]
    fn collapses_gap_left_by_removed_block() {
        assert_eq!(sanitize("<think>a</think>\n\n\n\nDone."), "Done.");
        assert_eq!(
            sanitize("First point.\n<think>\nhmm\n</think>\n\n\n\nSecond point."),
            "First point.\n\nSecond point."
        );
    }

    #[test]
    fn strips_both_tag_kinds() {
        assert_eq!(sanitize("<reasoning>X</reasoning><think>Y</think>Z"), "Z");
    }

    #[test]
    fn unterminated_tag_is_kept() {
        let raw = "  <think>unterminated and Final answer.\n";
        assert_eq!(sanitize(raw), "<think>unterminated and Final answer.");
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(sanitize("<THINK>x</THINK>Answer"), "Answer");
        assert_eq!(sanitize("<Reasoning>x</REASONING>Answer"), "Answer");
    }

    #[test]
    fn multi_paragraph_block_is_removed() {
        let raw = "<think>\nStep one.\n\nStep two.\n\nStep three.\n</think>\n\n1. Cook at home.";
        assert_eq!(sanitize(raw), "1. Cook at home.");
    }

    #[test]
    fn each_block_is_removed_individually() {
        let raw = "<think>a</think>Keep this.<think>b</think> And this.";
        assert_eq!(sanitize(raw), "Keep this. And this.");
    }

    #[test]
    fn empty_and_reasoning_only_inputs() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n"), "");
        assert_eq!(sanitize("<think>only thoughts</think>\n\n"), "");
    }

    #[test]
    fn tag_free_text_is_only_trimmed() {
        let samples = [
            "plain answer",
            "  padded  ",
            "line one\n\n\n\nline two",
            "\n\n1. Save.\n\n\n2. Spend less.\n",
            "a <b>bold</b> claim",
        ];
        for s in samples {
            assert_eq!(sanitize(s), s.trim(), "input: {:?}", s);
        }
    }

    #[test]
    fn nested_pair_formed_after_removal_is_also_removed() {
        let raw = "<thi<think>x</think>nk>y</think>Answer";
        assert_eq!(sanitize(raw), "Answer");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "",
            "Final answer.",
            "<think>scratch</think>Final answer.",
            "<think>a</think>\n\n\n\nDone.",
            "<reasoning>X</reasoning><think>Y</think>Z",
            "<think>unterminated and Final answer.",
            "<THINK>x</THINK>Answer",
            "<thi<think>x</think>nk>y</think>Answer",
            "A\n\n \n\n<think>t</think>\n\n\n  B\n\n\n\nC",
            "<reasoning>\n\n</reasoning>\n \n \n \ntext <think>open",
        ];
        for s in samples {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once, "input: {:?}", s);
        }
    }

    #[test]
    fn strip_reasoning_reports_whether_anything_was_removed() {
        assert_eq!(strip_reasoning("plain\n\n\n\ntext"), ("plain\n\n\n\ntext".to_string(), false));
        assert_eq!(strip_reasoning("<think>x</think>done"), ("done".to_string(), true));
        assert_eq!(strip_reasoning("<think>never closed"), ("<think>never closed".to_string(), false));
        let (after, _) = strip_reasoning("<REASONING>a</reasoning> b <think>c</THINK>");
        assert!(!REASONING_PATTERNS.iter().any(|p| p.is_match(&after)));
    }
}
