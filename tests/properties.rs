use proptest::collection::vec;
use proptest::prelude::*;
use tiny_doc::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, String),
    Remove(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), "[ab\n]{0,6}").prop_map(|(at, text)| Op::Insert(at, text)),
        (any::<usize>(), 0usize..8).prop_map(|(at, len)| Op::Remove(at, len)),
    ]
}

/// Plain string plus mark offsets, updated by the bias rules directly
struct Model {
    text: String,
    marks: Vec<(usize, Bias)>,
}

impl Model {
    fn insert(&mut self, at: usize, text: &str) {
        self.text.insert_str(at, text);
        for (offset, bias) in &mut self.marks {
            if *offset > at || (*offset == at && *bias == Bias::Forward) {
                *offset += text.len();
            }
        }
    }

    fn remove(&mut self, at: usize, len: usize) {
        self.text.replace_range(at..at + len, "");
        for (offset, _) in &mut self.marks {
            if *offset > at + len {
                *offset -= len;
            } else if *offset >= at {
                *offset = at;
            }
        }
    }
}

fn bias(forward: bool) -> Bias {
    if forward {
        Bias::Forward
    } else {
        Bias::Backward
    }
}

/// Apply `ops` to both, resolving positions against the current length
fn apply(doc: &Document, model: &mut Model, ops: &[Op]) -> usize {
    let mut applied = 0;
    for op in ops {
        let len = model.text.len();
        match op {
            Op::Insert(at, text) => {
                let at = at % (len + 1);
                doc.insert_text(at, text).unwrap();
                model.insert(at, text);
                applied += usize::from(!text.is_empty());
            }
            Op::Remove(at, n) => {
                let at = at % (len + 1);
                let n = (*n).min(len - at);
                doc.remove_text(at, n).unwrap();
                model.remove(at, n);
                applied += usize::from(n > 0);
            }
        }
    }
    applied
}

fn offsets(doc: &Document, handles: &[MarkHandle]) -> Vec<usize> {
    handles.iter().map(|h| doc.mark_offset(*h).unwrap()).collect()
}

proptest! {
    #[test]
    fn content_and_marks_match_model(
        initial in "[ab\n]{0,20}",
        seeds in vec((any::<usize>(), any::<bool>()), 0..8),
        ops in vec(op(), 0..20),
    ) {
        let doc = Document::from_str(&initial);
        let mut model = Model { text: initial.clone(), marks: Vec::new() };
        let mut handles = Vec::new();
        for (at, forward) in seeds {
            let at = at % (initial.len() + 1);
            handles.push(doc.create_mark(at, bias(forward)).unwrap());
            model.marks.push((at, bias(forward)));
        }

        apply(&doc, &mut model, &ops);

        prop_assert_eq!(doc.text().unwrap(), model.text.clone());
        prop_assert_eq!(doc.line_count(), model.text.matches('\n').count() + 1);
        let expected: Vec<usize> = model.marks.iter().map(|(o, _)| *o).collect();
        prop_assert_eq!(offsets(&doc, &handles), expected);
    }

    #[test]
    fn undo_all_then_redo_all_is_exact(
        initial in "[ab\n]{0,20}",
        seeds in vec((any::<usize>(), any::<bool>()), 0..8),
        ops in vec(op(), 0..20),
    ) {
        let doc = Document::from_str(&initial);
        let mut model = Model { text: initial.clone(), marks: Vec::new() };
        let mut handles = Vec::new();
        for (at, forward) in seeds {
            let at = at % (initial.len() + 1);
            handles.push(doc.create_mark(at, bias(forward)).unwrap());
            model.marks.push((at, bias(forward)));
        }
        let before = offsets(&doc, &handles);

        let applied = apply(&doc, &mut model, &ops);
        let after = offsets(&doc, &handles);
        let edited = doc.text().unwrap();
        prop_assert_eq!(doc.undo_depth(), applied);

        while doc.can_undo() {
            doc.undo().unwrap();
        }
        prop_assert_eq!(doc.text().unwrap(), initial);
        prop_assert_eq!(offsets(&doc, &handles), before);

        while doc.can_redo() {
            doc.redo().unwrap();
        }
        prop_assert_eq!(doc.text().unwrap(), edited);
        prop_assert_eq!(offsets(&doc, &handles), after);
    }

    #[test]
    fn failed_atomic_is_invisible(
        initial in "[ab\n]{0,20}",
        seeds in vec((any::<usize>(), any::<bool>()), 0..8),
        ops in vec(op(), 1..10),
    ) {
        let doc = Document::from_str(&initial);
        let mut handles = Vec::new();
        for (at, forward) in seeds {
            handles.push(doc.create_mark(at % (initial.len() + 1), bias(forward)).unwrap());
        }
        let before = offsets(&doc, &handles);

        let result = doc.run_atomic(|d| {
            let mut model = Model { text: initial.clone(), marks: Vec::new() };
            apply(d, &mut model, &ops);
            d.remove_text(d.len() + 1, 0)
        });

        prop_assert!(result.is_err());
        prop_assert_eq!(doc.text().unwrap(), initial);
        prop_assert_eq!(offsets(&doc, &handles), before);
        prop_assert!(!doc.can_undo());
    }
}
