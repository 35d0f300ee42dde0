use std::sync::Arc;
use tiny_doc::*;

fn five_lines() -> Document {
    Document::from_str("l0\nl1\nl2\nl3\nl4\n")
}

#[test]
fn test_annotations_group_by_line() {
    let doc = five_lines();
    let mut index = AnnotationIndex::new();
    let a = index.add(&doc, 3, "error").unwrap();
    let b = index.add(&doc, 4, "warning").unwrap();
    let c = index.add(&doc, 9, "note").unwrap();

    assert_eq!(index.len(), 3);
    assert_eq!(index.annotations_on_line(1), &[a, b]);
    assert_eq!(index.active_for_line(1), Some((b, &"warning")));
    assert_eq!(index.cycle_active(1), Some(a));
    assert_eq!(index.active_for_line(1), Some((a, &"error")));
    assert_eq!(index.next_annotated_line(2), Some(3));
    assert_eq!(index.next_annotated_line(4), None);
    assert!(index.annotations_on_line(0).is_empty());

    assert_eq!(index.remove(&doc, c).unwrap(), "note");
    assert_eq!(index.next_annotated_line(2), None);
    assert!(index.remove(&doc, c).is_err());

    index.clear(&doc).unwrap();
    assert!(index.is_empty());
    assert_eq!(doc.mark_count(), 0);
}

#[test]
fn test_removing_active_keeps_a_valid_active() {
    let doc = five_lines();
    let mut index = AnnotationIndex::new();
    let a = index.add(&doc, 0, 1).unwrap();
    let b = index.add(&doc, 1, 2).unwrap();
    assert_eq!(index.active_for_line(0), Some((b, &2)));

    index.remove(&doc, b).unwrap();
    assert_eq!(index.active_for_line(0), Some((a, &1)));
    assert!(index.set_active(a));
}

#[test]
fn test_shared_annotations_follow_line_changes() {
    let doc = five_lines();
    let shared = Arc::new(SharedAnnotations::<&'static str>::new());
    doc.add_listener(shared.clone());
    let (a, c) = shared
        .with(&doc, |index| {
            (
                index.add(&doc, 3, "a").unwrap(),
                index.add(&doc, 9, "c").unwrap(),
            )
        })
        .unwrap();

    doc.insert_text(0, "new\nnew\n").unwrap();
    shared
        .with(&doc, |index| {
            assert_eq!(index.line_of(a), Some(3));
            assert_eq!(index.line_of(c), Some(5));
        })
        .unwrap();

    doc.remove_text(0, 11).unwrap();
    assert_eq!(doc.text().unwrap(), "l1\nl2\nl3\nl4\n");
    shared
        .with(&doc, |index| {
            assert_eq!(index.line_of(a), Some(0));
            assert_eq!(index.line_of(c), Some(2));
            assert_eq!(index.offset(&doc, c).unwrap(), 6);
        })
        .unwrap();
}

#[test]
fn test_newline_before_annotation_moves_it_down() {
    let doc = five_lines();
    let shared = Arc::new(SharedAnnotations::new());
    doc.add_listener(shared.clone());
    let id = shared.with(&doc, |index| index.add(&doc, 4, ()).unwrap()).unwrap();

    doc.insert_text(3, "\n").unwrap();
    shared
        .with(&doc, |index| {
            assert_eq!(index.line_of(id), Some(2));
            assert!(index.annotations_on_line(1).is_empty());
        })
        .unwrap();

    doc.undo().unwrap();
    shared
        .with(&doc, |index| assert_eq!(index.line_of(id), Some(1)))
        .unwrap();
}

#[test]
fn test_enter_at_line_start_carries_line_anchors() {
    let doc = Document::from_str("l0\nl1\nl2\n");
    let shared = Arc::new(SharedAnnotations::new());
    doc.add_listener(shared.clone());
    let id = shared.with(&doc, |index| index.add(&doc, 3, "on l1").unwrap()).unwrap();
    let mut marks = Bookmarks::new();
    marks.toggle(&doc, 1).unwrap();

    doc.insert_text(3, "\n").unwrap();
    assert_eq!(doc.text().unwrap(), "l0\n\nl1\nl2\n");
    assert_eq!(marks.lines(&doc).unwrap(), vec![2]);
    shared
        .with(&doc, |index| {
            assert_eq!(index.line_of(id), Some(2));
            assert!(index.annotations_on_line(1).is_empty());
        })
        .unwrap();

    // ordinary typing at the line start keeps both on the line
    doc.insert_text(4, "  ").unwrap();
    assert_eq!(marks.lines(&doc).unwrap(), vec![2]);
    shared
        .with(&doc, |index| assert_eq!(index.line_of(id), Some(2)))
        .unwrap();
}

#[test]
fn test_merged_lines_merge_groups() {
    let doc = five_lines();
    let shared = Arc::new(SharedAnnotations::new());
    doc.add_listener(shared.clone());
    let (first, second) = shared
        .with(&doc, |index| {
            (
                index.add(&doc, 3, "first").unwrap(),
                index.add(&doc, 6, "second").unwrap(),
            )
        })
        .unwrap();

    // join line 1 and line 2
    doc.remove_text(5, 1).unwrap();
    shared
        .with(&doc, |index| {
            assert_eq!(index.annotations_on_line(1), &[first, second]);
            assert_eq!(index.next_annotated_line(2), None);
            assert!(index.active_for_line(1).is_some());
        })
        .unwrap();
}

#[test]
fn test_bookmarks_toggle_and_wrap() {
    let doc = five_lines();
    let mut marks = Bookmarks::new();
    assert!(marks.toggle(&doc, 1).unwrap());
    assert!(marks.toggle(&doc, 3).unwrap());
    assert_eq!(marks.lines(&doc).unwrap(), vec![1, 3]);
    assert_eq!(marks.next(&doc, 1).unwrap(), Some(3));
    assert_eq!(marks.next(&doc, 3).unwrap(), Some(1));
    assert_eq!(marks.previous(&doc, 1).unwrap(), Some(3));
    assert_eq!(marks.previous(&doc, 3).unwrap(), Some(1));

    doc.insert_text(0, "top\n").unwrap();
    assert_eq!(marks.lines(&doc).unwrap(), vec![2, 4]);

    assert!(!marks.toggle(&doc, 2).unwrap());
    assert_eq!(marks.lines(&doc).unwrap(), vec![4]);

    // typing at the line start leaves the bookmark on its line
    let start = doc.line_start(4).unwrap();
    doc.insert_text(start, "  ").unwrap();
    assert_eq!(marks.lines(&doc).unwrap(), vec![4]);

    assert!(marks.toggle(&doc, 99).is_err());
    marks.clear(&doc).unwrap();
    assert_eq!(doc.mark_count(), 0);
    assert_eq!(marks.next(&doc, 0).unwrap(), None);
}

#[test]
fn test_layer_activations() {
    let doc = Document::from_str("0123456789");
    let mut layers = LayerActivations::new();
    layers.activate(&doc, "selection", 2..5).unwrap();
    layers.activate(&doc, "highlight", 4..8).unwrap();

    assert_eq!(layers.active_at(&doc, 4).unwrap(), vec!["highlight", "selection"]);
    assert!(layers.active_at(&doc, 1).unwrap().is_empty());
    assert_eq!(layers.next_boundary(&doc, 0).unwrap(), Some(2));
    assert_eq!(layers.next_boundary(&doc, 5).unwrap(), Some(8));
    assert_eq!(layers.next_boundary(&doc, 8).unwrap(), None);

    layers.activate(&doc, "selection", 5..6).unwrap();
    assert_eq!(layers.ranges(&doc, "selection").unwrap(), vec![2..6]);

    layers.deactivate(&doc, "highlight", 5..6).unwrap();
    assert_eq!(layers.ranges(&doc, "highlight").unwrap(), vec![4..5, 6..8]);

    doc.insert_text(0, "ab").unwrap();
    assert_eq!(layers.ranges(&doc, "selection").unwrap(), vec![4..8]);
    assert!(layers.ranges(&doc, "missing").unwrap().is_empty());

    layers.release(&doc).unwrap();
    assert_eq!(doc.mark_count(), 0);
}

#[test]
fn test_block_chain_split_and_collapse() {
    let doc = Document::from_str("abcdefghij");
    let mut chain = MarkBlockChain::new();
    chain.add(&doc, 1..3).unwrap();
    chain.add(&doc, 6..9).unwrap();
    assert_eq!(chain.block_count(), 2);
    assert_eq!(chain.block_at(&doc, 7).unwrap(), Some(6..9));
    assert_eq!(chain.block_at(&doc, 3).unwrap(), None);

    chain.remove(&doc, 7..8).unwrap();
    assert_eq!(chain.ranges(&doc).unwrap(), vec![1..3, 6..7, 8..9]);

    // a removal that swallows a block empties it
    doc.remove_text(0, 4).unwrap();
    assert_eq!(chain.ranges(&doc).unwrap(), vec![2..3, 4..5]);
    // the emptied block is dropped along with its marks
    assert_eq!(chain.block_count(), 2);
    assert_eq!(doc.mark_count(), 4);
    assert_eq!(chain.first_overlap(&doc, 0..3).unwrap(), Some(2..3));

    assert!(chain.add(&doc, 4..20).is_err());
    chain.clear(&doc).unwrap();
    assert_eq!(doc.mark_count(), 0);
}
