//! Locating a target string inside a paragraph and isolating it into whole
//! runs.
//!
//! [`locate`] maps a match in the paragraph's visible text back onto runs,
//! giving a [`SpanLocation`] with byte offsets inside the first and last
//! run. [`isolate`] then splits those boundary runs so that the matched text
//! occupies a contiguous range of paragraph children and nothing else.
//!
//! Split fragments keep the original run's attributes and `w:rPr`, so
//! formatting is unchanged on both sides of every cut.

use std::ops::Range;

use redline_opc::{Element, Node};

use super::paragraph::{STRUCTURAL, Segment, is_any, segments};
use super::{Vocab, child_text, needs_preserve, run_text};
#[cfg(test)]
use super::text_element;
use crate::config::MatchStrategy;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a located span lives. `run` values are paragraph child indices;
/// offsets are bytes within that run's visible text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanLocation {
    /// The span lies inside one run.
    Single {
        /// Paragraph child index of the run.
        run: usize,
        /// Start offset within the run.
        start: usize,
        /// End offset within the run (exclusive).
        end: usize,
    },
    /// The span covers two or more runs.
    Multi {
        /// Paragraph child indices of every covered run, in order.
        runs: Vec<usize>,
        /// Start offset within the first run.
        first_start: usize,
        /// End offset within the last run (exclusive).
        last_end: usize,
    },
}

/// Why a span could not be located.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanError {
    /// The text does not occur (or not often enough) in the paragraph.
    NotFound,
    /// The text occurs, but no usable occurrence exists, or the target is
    /// empty.
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// `true` for characters `IgnorePunctuation` drops: anything that is not a
/// letter, digit, underscore or whitespace.
#[must_use]
pub fn is_punctuation(c: char) -> bool {
    !(c.is_alphanumeric() || c == '_' || c.is_whitespace())
}

/// Every occurrence of `target` in `text` as byte ranges of `text`, left to
/// right, overlapping occurrences included.
#[must_use]
pub fn find_occurrences(text: &str, target: &str, strategy: MatchStrategy) -> Vec<Range<usize>> {
    match strategy {
        MatchStrategy::Exact => find_exact(text, target),
        MatchStrategy::IgnorePunctuation => find_ignoring_punctuation(text, target),
    }
}

fn find_exact(text: &str, target: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    if target.is_empty() {
        return out;
    }
    let mut from = 0;
    while let Some(found) = text[from..].find(target) {
        let start = from + found;
        out.push(start..start + target.len());
        let step = text[start..].chars().next().map_or(1, char::len_utf8);
        from = start + step;
    }
    out
}

fn find_ignoring_punctuation(text: &str, target: &str) -> Vec<Range<usize>> {
    let needle: String = target.chars().filter(|&c| !is_punctuation(c)).collect();
    if needle.is_empty() {
        return Vec::new();
    }
    // (offset in stripped text, original range) for every kept character.
    let mut kept: Vec<(usize, Range<usize>)> = Vec::new();
    let mut stripped = String::with_capacity(text.len());
    for (offset, c) in text.char_indices() {
        if !is_punctuation(c) {
            kept.push((stripped.len(), offset..offset + c.len_utf8()));
            stripped.push(c);
        }
    }
    find_exact(&stripped, &needle)
        .into_iter()
        .filter_map(|m| {
            let first = kept.partition_point(|(at, _)| *at < m.start);
            let last = kept.partition_point(|(at, _)| *at < m.end).checked_sub(1)?;
            Some(kept.get(first)?.1.start..kept.get(last)?.1.end)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Locate
// ---------------------------------------------------------------------------

/// Locate the `occurrence`-th usable occurrence of `target` in `paragraph`.
///
/// An occurrence is usable when every run it covers is editable, no existing
/// revision or run container sits between its first and last run, and any
/// complex field between them lies wholly inside.
///
/// # Errors
/// - [`SpanError::Invalid`] for an empty target (or, when ignoring
///   punctuation, one with nothing left to match), or when occurrences exist
///   but none is usable.
/// - [`SpanError::NotFound`] when the target does not occur, or occurs fewer
///   than `occurrence + 1` usable times.
pub fn locate(
    vocab: &Vocab,
    paragraph: &Element,
    target: &str,
    strategy: MatchStrategy,
    occurrence: usize,
) -> Result<SpanLocation, SpanError> {
    if target.is_empty() {
        return Err(SpanError::Invalid("empty target text".to_owned()));
    }
    if matches!(strategy, MatchStrategy::IgnorePunctuation) && target.chars().all(is_punctuation) {
        return Err(SpanError::Invalid("target text is only punctuation".to_owned()));
    }
    let visible = segments(vocab, paragraph);
    let matches = find_occurrences(&visible.text, target, strategy);
    if matches.is_empty() {
        return Err(SpanError::NotFound);
    }

    let mut usable = 0;
    let mut last_problem = None;
    for m in &matches {
        match usable_location(vocab, paragraph, &visible.segments, m) {
            Ok(location) if usable == occurrence => return Ok(location),
            Ok(_) => usable += 1,
            Err(problem) => last_problem = Some(problem),
        }
    }
    match last_problem {
        Some(problem) if usable == 0 => Err(SpanError::Invalid(problem)),
        _ => Err(SpanError::NotFound),
    }
}

fn usable_location(
    vocab: &Vocab,
    paragraph: &Element,
    segments: &[Segment],
    m: &Range<usize>,
) -> Result<SpanLocation, String> {
    let covered: Vec<&Segment> = segments
        .iter()
        .filter(|s| s.overlaps(m.start, m.end))
        .collect();
    let (Some(first), Some(last)) = (covered.first(), covered.last()) else {
        return Err("match covers no run".to_owned());
    };
    if covered.iter().any(|s| !s.editable) {
        return Err("text lies inside an existing revision, hyperlink or field".to_owned());
    }
    let enclosed = &paragraph.children()[first.child..=last.child];
    let swallowed = enclosed
        .iter()
        .filter_map(Node::as_element)
        .any(|e| is_any(vocab, e, STRUCTURAL));
    if swallowed {
        return Err("span would enclose an existing revision".to_owned());
    }
    if !fields_closed(vocab, enclosed) {
        return Err("span would split a field".to_owned());
    }

    if covered.len() == 1 {
        Ok(SpanLocation::Single {
            run: first.child,
            start: m.start - first.start,
            end: m.end - first.start,
        })
    } else {
        Ok(SpanLocation::Multi {
            runs: covered.iter().map(|s| s.child).collect(),
            first_start: m.start - first.start,
            last_end: m.end - last.start,
        })
    }
}

/// `true` when every complex field touched by `nodes` starts and ends among
/// them: each `fldChar` end closes a begin in `nodes`, every begin is closed
/// and no `instrText` sits outside a field opened here.
fn fields_closed(vocab: &Vocab, nodes: &[Node]) -> bool {
    let mut depth = 0usize;
    let runs = nodes
        .iter()
        .filter_map(Node::as_element)
        .filter(|e| vocab.is(e, "r"));
    for child in runs.flat_map(Element::child_elements) {
        if vocab.is(child, "instrText") && depth == 0 {
            return false;
        }
        if !vocab.is(child, "fldChar") {
            continue;
        }
        match vocab.attr(child, "fldCharType") {
            Some("begin") => depth += 1,
            Some("end") => match depth.checked_sub(1) {
                Some(outer) => depth = outer,
                None => return false,
            },
            _ if depth == 0 => return false,
            _ => {}
        }
    }
    depth == 0
}

// ---------------------------------------------------------------------------
// Isolate
// ---------------------------------------------------------------------------

/// Split the boundary runs of `span` so that the matched text occupies
/// exactly the returned range of paragraph children.
pub fn isolate(vocab: &Vocab, paragraph: &mut Element, span: &SpanLocation) -> Range<usize> {
    match span {
        SpanLocation::Single { run, start, end } => {
            split_child(vocab, paragraph, *run, *end);
            if *start > 0 && split_child(vocab, paragraph, *run, *start) {
                *run + 1..*run + 2
            } else {
                *run..*run + 1
            }
        }
        SpanLocation::Multi {
            runs,
            first_start,
            last_end,
        } => {
            let (Some(&first), Some(&last)) = (runs.first(), runs.last()) else {
                return 0..0;
            };
            split_child(vocab, paragraph, last, *last_end);
            let shift = usize::from(*first_start > 0 && split_child(vocab, paragraph, first, *first_start));
            first + shift..last + shift + 1
        }
    }
}

/// Split the run at `index` at byte offset `at` of its text, if `at` falls
/// strictly inside it. Returns `true` if a split happened.
fn split_child(vocab: &Vocab, paragraph: &mut Element, index: usize, at: usize) -> bool {
    let Some(run) = paragraph.children().get(index).and_then(Node::as_element) else {
        return false;
    };
    let len = run_text(vocab, run).len();
    if at == 0 || at >= len {
        return false;
    }
    let (left, right) = split_run(vocab, run, at);
    let children = paragraph.children_mut();
    children[index] = Node::Element(left);
    children.insert(index + 1, Node::Element(right));
    true
}

/// Split `run` at byte offset `at` of its visible text.
///
/// `w:rPr` is copied to both halves; a `w:t` straddling the cut is divided;
/// children that carry no text stay on the side they precede.
#[must_use]
pub fn split_run(vocab: &Vocab, run: &Element, at: usize) -> (Element, Element) {
    let mut left = run.empty_clone();
    let mut right = run.empty_clone();
    let mut pos = 0;
    for node in run.children() {
        if vocab.is_node(node, "rPr") {
            left.push(node.clone());
            right.push(node.clone());
            continue;
        }
        let len = child_text(vocab, node).map_or(0, |t| t.len());
        let end = pos + len;
        if len == 0 {
            if pos < at {
                left.push(node.clone());
            } else {
                right.push(node.clone());
            }
        } else if end <= at {
            left.push(node.clone());
        } else if pos >= at {
            right.push(node.clone());
        } else if let Some(t) = node.as_element() {
            // Only w:t is longer than one byte.
            let text = t.text();
            let (head, tail) = text.split_at(at - pos);
            left.push(retext(t, head));
            right.push(retext(t, tail));
        }
        pos = end;
    }
    (left, right)
}

fn retext(t: &Element, text: &str) -> Element {
    let mut out = t.empty_clone();
    out.push(Node::Text(text.to_owned()));
    if needs_preserve(text) {
        out.set_attr("xml:space", "preserve");
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::markup::paragraph::visible_text;
    use proptest::prelude::*;

    fn paragraph_of(runs: &[String]) -> Element {
        let mut p = Element::new("w:p");
        for text in runs {
            p.push(
                Element::new("w:r")
                    .with_child(Element::new("w:rPr").with_child(Element::new("w:i")))
                    .with_child(text_element(&Vocab::new("w"), "t", text)),
            );
        }
        p
    }

    proptest! {
        #[test]
        fn prop_isolated_range_holds_exactly_the_target(
            runs in prop::collection::vec("[ab ]{1,5}", 1..5),
            a in 0usize..100,
            b in 0usize..100,
        ) {
            let w = Vocab::new("w");
            let mut p = paragraph_of(&runs);
            let text: String = runs.concat();
            let (lo, hi) = if a % text.len() <= b % text.len() {
                (a % text.len(), b % text.len())
            } else {
                (b % text.len(), a % text.len())
            };
            let target = &text[lo..=hi];

            let span = locate(&w, &p, target, MatchStrategy::Exact, 0).unwrap();
            let range = isolate(&w, &mut p, &span);

            prop_assert_eq!(visible_text(&w, &p), text.clone());
            let covered: String = p.children()[range]
                .iter()
                .filter_map(Node::as_element)
                .map(|r| run_text(&w, r))
                .collect();
            prop_assert_eq!(covered, target.to_owned());
        }
    }
}
