use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub from: String,
    pub to: String,
    pub suffix: usize,
    pub relocated: bool,
}

impl Substitution {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            suffix: 0,
            relocated: false,
        }
    }

    /// `to` with the collision suffix applied.
    pub fn destination(&self) -> String {
        path_with_suffix(&self.to, self.suffix)
    }
}

/// Inserts `-N` before the extension of the final path element. A zero
/// suffix leaves the path untouched.
pub fn path_with_suffix(path: &str, suffix: usize) -> String {
    if suffix == 0 {
        return path.to_string();
    }

    let (dir, file_name) = match path.rfind('/') {
        Some(index) => (&path[..=index], &path[index + 1..]),
        None => ("", path),
    };
    let (stem, ext) = match file_name.rfind('.') {
        Some(index) => file_name.split_at(index),
        None => (file_name, ""),
    };
    format!("{dir}{stem}-{suffix}{ext}")
}

/// The run's ordered substitution list.
///
/// Nominal destinations are compared as exact, case-sensitive strings.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionBatch {
    entries: Vec<Substitution>,
    occurrences: HashMap<String, usize>,
    taken: HashSet<String>,
}

impl SubstitutionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `candidate`, numbering it by how many earlier entries share
    /// its nominal `to`. Earlier entries are never renumbered. If that
    /// numbered destination is already someone else's effective
    /// destination (a source file literally named `IMG-1.jpg`, say), the
    /// suffix keeps counting up until it is free. The suffix can therefore
    /// exceed the occurrence count; unique effective destinations take
    /// precedence over the plain count.
    pub fn register(&mut self, mut candidate: Substitution) -> &Substitution {
        let seen = self.occurrences.entry(candidate.to.clone()).or_insert(0);
        let mut suffix = *seen;
        *seen += 1;

        while self.taken.contains(&path_with_suffix(&candidate.to, suffix)) {
            suffix += 1;
        }
        candidate.suffix = suffix;
        self.taken.insert(candidate.destination());

        let index = self.entries.len();
        self.entries.push(candidate);
        &self.entries[index]
    }

    pub fn entries(&self) -> &[Substitution] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn relocated_count(&self) -> usize {
        self.entries.iter().filter(|e| e.relocated).count()
    }

    pub(crate) fn mark_relocated(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.relocated = true;
        }
    }
}
