//! Tracked substitutions.
//!
//! [`mark`] takes a range of paragraph children produced by
//! [`span::isolate`](super::span::isolate) and replaces it with
//!
//! ```text
//! <w:del w:id=N …><w:r>…<w:delText>old</w:delText></w:r>…</w:del>
//! <w:ins w:id=N+stride …><w:r><w:rPr/>…<w:t>new</w:t></w:r></w:ins>
//! ```
//!
//! Everything outside the range is left alone. An empty replacement writes
//! the delete block only.

use std::ops::Range;

use redline_opc::{Element, Node};

use super::{Vocab, text_run_children};
use crate::model::{Revision, word_date};

/// Replace `range` of `paragraph`'s children with the delete and insert
/// blocks for `revision`. Returns the range the new blocks occupy.
pub fn mark(vocab: &Vocab, paragraph: &mut Element, range: Range<usize>, revision: &Revision) -> Range<usize> {
    let date = word_date(&revision.timestamp);
    let removed: Vec<Node> = paragraph.children_mut().drain(range.clone()).collect();

    let rpr = removed
        .iter()
        .filter_map(Node::as_element)
        .find(|e| vocab.is(e, "r"))
        .and_then(|run| run.child(&vocab.name("rPr")))
        .cloned();

    let mut del = block(vocab, "del", revision.id, &revision.author, &date);
    for node in removed {
        match node {
            Node::Element(mut run) if vocab.is(&run, "r") => {
                to_deleted_run(vocab, &mut run);
                del.push(run);
            }
            other => del.push(other),
        }
    }

    let mut blocks = vec![Node::Element(del)];
    if revision.has_insert() {
        let mut ins = block(vocab, "ins", revision.insert_id, &revision.author, &date);
        ins.push(text_run(vocab, rpr, &revision.replacement));
        blocks.push(Node::Element(ins));
    }

    let inserted = blocks.len();
    paragraph
        .children_mut()
        .splice(range.start..range.start, blocks);
    range.start..range.start + inserted
}

fn block(vocab: &Vocab, local: &str, id: u32, author: &str, date: &str) -> Element {
    vocab
        .element(local)
        .with_attr(vocab.attr_name("id"), id.to_string())
        .with_attr(vocab.attr_name("author"), author)
        .with_attr(vocab.attr_name("date"), date)
}

/// Rewrite a run for placement inside `w:del`: `w:t` → `w:delText`,
/// `w:instrText` → `w:delInstrText`.
pub fn to_deleted_run(vocab: &Vocab, run: &mut Element) {
    for node in run.children_mut() {
        let Some(child) = node.as_element_mut() else {
            continue;
        };
        if vocab.is(child, "t") {
            child.set_name(vocab.name("delText"));
        } else if vocab.is(child, "instrText") {
            child.set_name(vocab.name("delInstrText"));
        }
    }
}

/// A run holding `text`, formatted with `rpr` when given.
#[must_use]
pub fn text_run(vocab: &Vocab, rpr: Option<Element>, text: &str) -> Element {
    let mut run = vocab.element("r");
    if let Some(rpr) = rpr {
        run.push(rpr);
    }
    for node in text_run_children(vocab, text) {
        run.push(node);
    }
    run
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::config::MatchStrategy;
    use crate::markup::paragraph::visible_text;
    use crate::markup::span::{isolate, locate};
    use chrono::DateTime;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_visible_text_is_original_with_span_replaced(
            runs in prop::collection::vec("[ab c]{1,5}", 1..5),
            a in 0usize..100,
            b in 0usize..100,
            replacement in "[xy \t]{0,4}",
        ) {
            let w = Vocab::new("w");
            let mut p = Element::new("w:p");
            for text in &runs {
                p.push(Element::new("w:r").with_child(
                    Element::new("w:t").with_attr("xml:space", "preserve").with_text(text.as_str()),
                ));
            }
            let text: String = runs.concat();
            let (lo, hi) = (a.min(b) % text.len(), a.max(b) % text.len());
            let (lo, hi) = (lo.min(hi), lo.max(hi));
            let target = text[lo..=hi].to_owned();

            let span = locate(&w, &p, &target, MatchStrategy::Exact, 0).unwrap();
            let found_at = text.find(&target).unwrap();
            let range = isolate(&w, &mut p, &span);
            let revision = Revision {
                id: 1,
                insert_id: 10_001,
                original: target.clone(),
                replacement: replacement.clone(),
                author: "p".to_owned(),
                timestamp: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
            };
            mark(&w, &mut p, range, &revision);

            let mut expected = text.clone();
            expected.replace_range(found_at..found_at + target.len(), &replacement);
            prop_assert_eq!(visible_text(&w, &p), expected);
        }
    }
}
