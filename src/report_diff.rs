use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ReportError;

pub type Reports = BTreeMap<String, BTreeSet<String>>;

pub fn read_reports(input: &str) -> Result<Reports, ReportError> {
    let mut reports = Reports::new();
    for (index, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(ReportError::MissingSeparator {
                line: index + 1,
                text: line.to_string(),
            });
        };
        reports
            .entry(key.to_string())
            .or_default()
            .insert(value.to_string());
    }
    Ok(reports)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub changed: BTreeMap<String, (BTreeSet<String>, BTreeSet<String>)>,
    pub unchanged: BTreeSet<String>,
}

impl ReportDiff {
    pub fn between(past: &Reports, current: &Reports) -> Self {
        let mut diff = ReportDiff::default();
        for (key, values) in current {
            match past.get(key) {
                None => {
                    diff.added.insert(key.clone());
                }
                Some(old) if old == values => {
                    diff.unchanged.insert(key.clone());
                }
                Some(old) => {
                    diff.changed
                        .insert(key.clone(), (old.clone(), values.clone()));
                }
            }
        }
        diff.removed = past
            .keys()
            .filter(|key| !current.contains_key(*key))
            .cloned()
            .collect();
        diff
    }

    pub fn has_differences(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty())
    }
}

impl fmt::Display for ReportDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.added.is_empty() {
            writeln!(f, "Added:")?;
            write_keys(f, &self.added)?;
        }
        if !self.removed.is_empty() {
            writeln!(f, "Removed:")?;
            write_keys(f, &self.removed)?;
        }
        if !self.changed.is_empty() {
            writeln!(f, "Changed:")?;
            for (key, (past, current)) in &self.changed {
                writeln!(f, "  {key}")?;
                for value in past.difference(current) {
                    writeln!(f, "    - {value}")?;
                }
                for value in current.difference(past) {
                    writeln!(f, "    + {value}")?;
                }
            }
        }
        Ok(())
    }
}

fn write_keys(f: &mut fmt::Formatter<'_>, keys: &BTreeSet<String>) -> fmt::Result {
    for key in keys {
        writeln!(f, "  {key}")?;
    }
    Ok(())
}
