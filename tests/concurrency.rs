use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_doc::*;

const WRITERS: usize = 4;
const EDITS: usize = 200;

#[test]
fn test_concurrent_writers_and_readers() {
    let doc = Arc::new(Document::new());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let doc = Arc::clone(&doc);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checks = 0usize;
                while !done.load(Ordering::Acquire) {
                    let _read = doc.read_lock().unwrap();
                    let text = doc.text().unwrap();
                    assert_eq!(text.len(), doc.len());
                    assert_eq!(doc.line_count(), text.matches('\n').count() + 1);
                    checks += 1;
                }
                checks
            })
        })
        .collect();

    let writers: Vec<_> = (0..WRITERS)
        .map(|_| {
            let doc = Arc::clone(&doc);
            thread::spawn(move || {
                for _ in 0..EDITS {
                    // length only grows, so a stale midpoint is still in range
                    let at = doc.len() / 2;
                    doc.insert_text(at, "ab\n").unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(doc.len(), WRITERS * EDITS * 3);
    assert_eq!(doc.line_count(), WRITERS * EDITS + 1);
    assert_eq!(doc.transaction_state(), TxState::Idle);
}

#[test]
fn test_atomic_sections_are_exclusive() {
    let doc = Arc::new(Document::from_str("|"));
    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let doc = Arc::clone(&doc);
            thread::spawn(move || {
                for _ in 0..50 {
                    doc.run_atomic(|d| {
                        let before = d.len();
                        d.insert_text(0, "(")?;
                        thread::yield_now();
                        d.insert_text(d.len(), ")")?;
                        assert_eq!(d.len(), before + 2);
                        Ok::<_, DocError>(())
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let text = doc.text().unwrap();
    let opens = text.find('|').unwrap();
    assert_eq!(opens, WRITERS * 50);
    assert!(text[..opens].chars().all(|c| c == '('));
    assert!(text[opens + 1..].chars().all(|c| c == ')'));
}

#[test]
fn test_rollbacks_under_contention_leave_no_trace() {
    let doc = Arc::new(Document::from_str("base"));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let doc = Arc::clone(&doc);
            thread::spawn(move || {
                for n in 0..50 {
                    let result = doc.run_atomic(|d| {
                        d.insert_text(0, "tmp")?;
                        if (n + i) % 2 == 0 {
                            // out of range, forces rollback
                            d.remove_text(d.len(), 1)?;
                        }
                        d.remove_text(0, 3)
                    });
                    assert_eq!(result.is_err(), (n + i) % 2 == 0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(doc.text().unwrap(), "base");
}

#[test]
fn test_lock_timeout_while_writer_holds() {
    let config = DocConfig {
        lock_timeout_ms: Some(20),
        ..DocConfig::default()
    };
    let doc = Arc::new(Document::with_config(config));
    let write = doc.write_lock().unwrap();

    let other = Arc::clone(&doc);
    let blocked = thread::spawn(move || {
        (
            other.insert_text(0, "x").is_err(),
            matches!(other.read_lock(), Err(DocError::LockTimeout)),
        )
    });
    let (insert_failed, read_timed_out) = blocked.join().unwrap();
    assert!(insert_failed);
    assert!(read_timed_out);

    drop(write);
    let other = Arc::clone(&doc);
    thread::spawn(move || other.insert_text(0, "y").unwrap())
        .join()
        .unwrap();
    assert_eq!(doc.text().unwrap(), "y");
}

#[test]
fn test_listener_sees_consistent_document() {
    struct LengthCheck;

    impl DocumentListener for LengthCheck {
        fn inserted(&self, doc: &Document, event: &DocumentEvent) {
            let text = doc.text().unwrap();
            assert_eq!(text.len(), doc.len());
            assert!(event.offset + event.len <= doc.len());
        }
    }

    let doc = Arc::new(Document::new());
    doc.add_listener(Arc::new(LengthCheck));
    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let doc = Arc::clone(&doc);
            thread::spawn(move || {
                for _ in 0..50 {
                    doc.insert_text(0, "z").unwrap();
                    thread::sleep(Duration::from_micros(10));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(doc.len(), WRITERS * 50);
}
