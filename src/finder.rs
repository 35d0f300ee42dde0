//! Stateful matchers fed contiguous chunks of document bytes
//!
//! The content store hands a finder at most two slices per search (one on each
//! side of its gap). Finders keep partial-match state between slices, so a match
//! straddling the gap is found without ever seeing gap bytes.

use memchr::{memchr, memrchr};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub trait Finder {
    fn direction(&self) -> Direction;

    /// Forget any partial match
    fn reset(&mut self);

    /// Scan `chunk`, whose first byte sits at document offset `base`.
    ///
    /// Forward finders get chunks in ascending order and scan front to back;
    /// backward finders get them in descending order and scan back to front.
    /// Returns the document offset where the match starts.
    fn scan(&mut self, base: usize, chunk: &[u8]) -> Option<usize>;
}

/// Finds a single character
pub struct CharFinder {
    direction: Direction,
    matcher: CharMatcher,
}

enum CharMatcher {
    Byte(u8),
    Encoded(StringFinder),
}

impl CharFinder {
    pub fn new(ch: char, direction: Direction) -> Self {
        let matcher = if ch.is_ascii() {
            CharMatcher::Byte(ch as u8)
        } else {
            let mut buf = [0u8; 4];
            let encoded = ch.encode_utf8(&mut buf);
            CharMatcher::Encoded(StringFinder::new(encoded, direction))
        };
        Self { direction, matcher }
    }

    pub fn forward(ch: char) -> Self {
        Self::new(ch, Direction::Forward)
    }

    pub fn backward(ch: char) -> Self {
        Self::new(ch, Direction::Backward)
    }
}

impl Finder for CharFinder {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn reset(&mut self) {
        if let CharMatcher::Encoded(inner) = &mut self.matcher {
            inner.reset();
        }
    }

    fn scan(&mut self, base: usize, chunk: &[u8]) -> Option<usize> {
        match &mut self.matcher {
            CharMatcher::Byte(b) => match self.direction {
                Direction::Forward => memchr(*b, chunk).map(|p| base + p),
                Direction::Backward => memrchr(*b, chunk).map(|p| base + p),
            },
            CharMatcher::Encoded(inner) => inner.scan(base, chunk),
        }
    }
}

/// Streaming substring matcher (KMP), optionally folding ASCII case
pub struct StringFinder {
    direction: Direction,
    /// Pattern bytes, reversed for backward search
    pattern: Vec<u8>,
    failure: Vec<usize>,
    matched: usize,
    ignore_case: bool,
}

impl StringFinder {
    pub fn new(pattern: &str, direction: Direction) -> Self {
        Self::build(pattern, direction, false)
    }

    pub fn ignore_case(pattern: &str, direction: Direction) -> Self {
        Self::build(pattern, direction, true)
    }

    fn build(pattern: &str, direction: Direction, ignore_case: bool) -> Self {
        let mut bytes: Vec<u8> = if ignore_case {
            pattern.bytes().map(|b| b.to_ascii_lowercase()).collect()
        } else {
            pattern.as_bytes().to_vec()
        };
        if direction == Direction::Backward {
            bytes.reverse();
        }
        let failure = failure_table(&bytes);
        Self {
            direction,
            pattern: bytes,
            failure,
            matched: 0,
            ignore_case,
        }
    }

    #[inline]
    fn step(&mut self, byte: u8) -> bool {
        let byte = if self.ignore_case {
            byte.to_ascii_lowercase()
        } else {
            byte
        };
        while self.matched > 0 && self.pattern[self.matched] != byte {
            self.matched = self.failure[self.matched - 1];
        }
        if self.pattern[self.matched] == byte {
            self.matched += 1;
        }
        if self.matched == self.pattern.len() {
            self.matched = self.failure[self.matched - 1];
            return true;
        }
        false
    }
}

impl Finder for StringFinder {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn reset(&mut self) {
        self.matched = 0;
    }

    fn scan(&mut self, base: usize, chunk: &[u8]) -> Option<usize> {
        if self.pattern.is_empty() {
            return None;
        }
        let m = self.pattern.len();
        match self.direction {
            Direction::Forward => {
                for (i, &b) in chunk.iter().enumerate() {
                    if self.step(b) {
                        return Some(base + i + 1 - m);
                    }
                }
            }
            Direction::Backward => {
                for i in (0..chunk.len()).rev() {
                    if self.step(chunk[i]) {
                        return Some(base + i);
                    }
                }
            }
        }
        None
    }
}

fn failure_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = table[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        table[i] = k;
    }
    table
}

/// Finds the first byte that is not a space or tab
pub struct NonWhitespaceFinder {
    direction: Direction,
}

impl NonWhitespaceFinder {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl Finder for NonWhitespaceFinder {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn reset(&mut self) {}

    fn scan(&mut self, base: usize, chunk: &[u8]) -> Option<usize> {
        let is_content = |b: &u8| *b != b' ' && *b != b'\t';
        let found = match self.direction {
            Direction::Forward => chunk.iter().position(is_content),
            Direction::Backward => chunk.iter().rposition(is_content),
        };
        found.map(|p| base + p)
    }
}
