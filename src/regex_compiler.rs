use std::collections::BTreeSet;

use crate::anml::{AutomataNetwork, ElementRef, Port, StartType};
use crate::error::{NetworkError, PatternError};
use crate::regex_ast::*;

pub const MAX_POSITIONS: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPattern {
    symbols: Vec<ByteSet>,
    first: BTreeSet<usize>,
    last: BTreeSet<usize>,
    follow: Vec<BTreeSet<usize>>,
    anchored: bool,
}

#[derive(Debug)]
enum Term {
    Empty,
    Symbol(usize),
    Concat(Vec<Term>),
    Alternate(Vec<Term>),
    Star(Box<Term>),
    Plus(Box<Term>),
    Optional(Box<Term>),
}

struct Info {
    nullable: bool,
    first: BTreeSet<usize>,
    last: BTreeSet<usize>,
}

pub fn compile(pattern: &Pattern) -> Result<CompiledPattern, PatternError> {
    if pattern.regex.is_nullable() {
        return Err(PatternError::MatchesEmpty);
    }

    let mut symbols = Vec::new();
    let term = linearize(&pattern.regex, &mut symbols)?;
    let mut follow = vec![BTreeSet::new(); symbols.len()];
    let info = analyze(&term, &mut follow);

    Ok(CompiledPattern {
        symbols,
        first: info.first,
        last: info.last,
        follow,
        anchored: pattern.anchored,
    })
}

fn linearize(regex: &Regex, symbols: &mut Vec<ByteSet>) -> Result<Term, PatternError> {
    let term = match regex {
        Regex::Empty => Term::Empty,
        Regex::Class(set) => {
            if symbols.len() >= MAX_POSITIONS {
                return Err(PatternError::TooLarge {
                    positions: symbols.len() + 1,
                    limit: MAX_POSITIONS,
                });
            }
            symbols.push(*set);
            Term::Symbol(symbols.len() - 1)
        }
        Regex::Concat(items) => Term::Concat(
            items
                .iter()
                .map(|item| linearize(item, symbols))
                .collect::<Result<_, _>>()?,
        ),
        Regex::Alternate(items) => Term::Alternate(
            items
                .iter()
                .map(|item| linearize(item, symbols))
                .collect::<Result<_, _>>()?,
        ),
        Regex::Repeat {
            inner, min, max, ..
        } => linearize_repeat(inner, *min, *max, symbols)?,
    };
    Ok(term)
}

fn linearize_repeat(
    inner: &Regex,
    min: u32,
    max: Option<u32>,
    symbols: &mut Vec<ByteSet>,
) -> Result<Term, PatternError> {
    // copies of a body without positions add nothing
    if !inner.has_positions() {
        return Ok(Term::Empty);
    }
    let mut parts = Vec::new();
    match max {
        None if min == 0 => return Ok(Term::Star(Box::new(linearize(inner, symbols)?))),
        None => {
            for _ in 1..min {
                parts.push(linearize(inner, symbols)?);
            }
            parts.push(Term::Plus(Box::new(linearize(inner, symbols)?)));
        }
        Some(max) => {
            for _ in 0..min {
                parts.push(linearize(inner, symbols)?);
            }
            for _ in min..max {
                parts.push(Term::Optional(Box::new(linearize(inner, symbols)?)));
            }
        }
    }
    Ok(match parts.len() {
        0 => Term::Empty,
        1 => parts.remove(0),
        _ => Term::Concat(parts),
    })
}

fn analyze(term: &Term, follow: &mut [BTreeSet<usize>]) -> Info {
    match term {
        Term::Empty => Info {
            nullable: true,
            first: BTreeSet::new(),
            last: BTreeSet::new(),
        },
        Term::Symbol(p) => Info {
            nullable: false,
            first: BTreeSet::from([*p]),
            last: BTreeSet::from([*p]),
        },
        Term::Concat(items) => {
            let mut acc = Info {
                nullable: true,
                first: BTreeSet::new(),
                last: BTreeSet::new(),
            };
            for item in items {
                let next = analyze(item, follow);
                for &p in &acc.last {
                    follow[p].extend(next.first.iter().copied());
                }
                if acc.nullable {
                    acc.first.extend(next.first.iter().copied());
                }
                acc.last = if next.nullable {
                    acc.last.union(&next.last).copied().collect()
                } else {
                    next.last
                };
                acc.nullable &= next.nullable;
            }
            acc
        }
        Term::Alternate(items) => {
            let mut acc = Info {
                nullable: false,
                first: BTreeSet::new(),
                last: BTreeSet::new(),
            };
            for item in items {
                let next = analyze(item, follow);
                acc.nullable |= next.nullable;
                acc.first.extend(next.first);
                acc.last.extend(next.last);
            }
            acc
        }
        Term::Star(inner) | Term::Plus(inner) => {
            let mut info = analyze(inner, follow);
            for &p in &info.last {
                follow[p].extend(info.first.iter().copied());
            }
            if matches!(term, Term::Star(_)) {
                info.nullable = true;
            }
            info
        }
        Term::Optional(inner) => {
            let mut info = analyze(inner, follow);
            info.nullable = true;
            info
        }
    }
}

impl CompiledPattern {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol_set(&self, position: usize) -> String {
        self.symbols[position].to_symbol_set()
    }

    pub fn is_start(&self, position: usize) -> bool {
        self.first.contains(&position)
    }

    pub fn is_final(&self, position: usize) -> bool {
        self.last.contains(&position)
    }

    pub fn follow(&self, position: usize) -> impl Iterator<Item = usize> + '_ {
        self.follow[position].iter().copied()
    }

    pub fn instantiate(
        &self,
        network: &mut AutomataNetwork,
        id: &str,
        report_code: u32,
    ) -> Result<Vec<ElementRef>, NetworkError> {
        let start_type = if self.anchored {
            StartType::StartOfData
        } else {
            StartType::AllInput
        };

        let mut handles = Vec::with_capacity(self.symbols.len());
        for (position, set) in self.symbols.iter().enumerate() {
            let start = if self.is_start(position) {
                start_type
            } else {
                StartType::None
            };
            let handle = network.add_ste(
                set.to_symbol_set(),
                format!("{id}_{position}"),
                false,
                start,
            )?;
            if self.is_final(position) {
                network.set_report_code(handle, report_code);
            }
            handles.push(handle);
        }

        for (position, targets) in self.follow.iter().enumerate() {
            for &target in targets {
                network.add_edge(handles[position], handles[target], Port::Default)?;
            }
        }
        Ok(handles)
    }
}
