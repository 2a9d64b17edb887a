use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByteSet([u64; 4]);

impl ByteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self([u64::MAX; 4])
    }

    pub fn single(byte: u8) -> Self {
        let mut set = Self::new();
        set.insert(byte);
        set
    }

    pub fn range(lo: u8, hi: u8) -> Self {
        let mut set = Self::new();
        set.insert_range(lo, hi);
        set
    }

    pub fn insert(&mut self, byte: u8) {
        self.0[usize::from(byte >> 6)] |= 1u64 << (byte & 63);
    }

    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        for byte in lo..=hi {
            self.insert(byte);
        }
    }

    pub fn remove(&mut self, byte: u8) {
        self.0[usize::from(byte >> 6)] &= !(1u64 << (byte & 63));
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.0[usize::from(byte >> 6)] & (1u64 << (byte & 63)) != 0
    }

    pub fn union(&self, other: &ByteSet) -> ByteSet {
        let mut out = *self;
        for (word, other) in out.0.iter_mut().zip(other.0) {
            *word |= other;
        }
        out
    }

    pub fn negated(&self) -> ByteSet {
        ByteSet(self.0.map(|word| !word))
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&word| word == 0)
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(|&word| word == u64::MAX)
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn case_folded(&self) -> ByteSet {
        let mut out = *self;
        for byte in 0..=u8::MAX {
            if self.contains(byte) && byte.is_ascii_alphabetic() {
                out.insert(byte.to_ascii_lowercase());
                out.insert(byte.to_ascii_uppercase());
            }
        }
        out
    }

    pub fn ranges(&self) -> Vec<(u8, u8)> {
        let mut ranges: Vec<(u8, u8)> = Vec::new();
        for byte in 0..=u8::MAX {
            if !self.contains(byte) {
                continue;
            }
            match ranges.last_mut() {
                Some((_, hi)) if *hi as u16 + 1 == byte as u16 => *hi = byte,
                _ => ranges.push((byte, byte)),
            }
        }
        ranges
    }

    pub fn to_symbol_set(&self) -> String {
        if self.is_full() {
            return "*".to_string();
        }
        let mut out = String::from("[");
        for (lo, hi) in self.ranges() {
            push_symbol(&mut out, lo);
            if hi > lo {
                if hi > lo + 1 {
                    out.push('-');
                }
                push_symbol(&mut out, hi);
            }
        }
        out.push(']');
        out
    }
}

fn push_symbol(out: &mut String, byte: u8) {
    if byte.is_ascii_alphanumeric() {
        out.push(byte as char);
    } else {
        out.push_str(&format!("\\x{byte:02x}"));
    }
}

impl fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteSet({})", self.to_symbol_set())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Regex {
    Empty,
    Class(ByteSet),
    Concat(Vec<Regex>),
    Alternate(Vec<Regex>),
    Repeat {
        inner: Box<Regex>,
        min: u32,
        max: Option<u32>,
        counted: bool,
    },
}

impl Regex {
    pub fn has_counted_repetition(&self) -> bool {
        match self {
            Regex::Empty | Regex::Class(_) => false,
            Regex::Concat(items) | Regex::Alternate(items) => {
                items.iter().any(Regex::has_counted_repetition)
            }
            Regex::Repeat { inner, counted, .. } => *counted || inner.has_counted_repetition(),
        }
    }

    pub fn has_positions(&self) -> bool {
        match self {
            Regex::Empty => false,
            Regex::Class(_) => true,
            Regex::Concat(items) | Regex::Alternate(items) => items.iter().any(Regex::has_positions),
            Regex::Repeat { inner, max, .. } => *max != Some(0) && inner.has_positions(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Regex::Empty => true,
            Regex::Class(_) => false,
            Regex::Concat(items) => items.iter().all(Regex::is_nullable),
            Regex::Alternate(items) => items.iter().any(Regex::is_nullable),
            Regex::Repeat { inner, min, .. } => *min == 0 || inner.is_nullable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub regex: Regex,
    pub anchored: bool,
}
