use enquote::enquote;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

mod matchers;
mod selector;

pub use matchers::*;
pub use selector::*;

pub const METRIC_NAME_LABEL: &str = "__name__";

// separator fed into signature hashing so ("ab","c") and ("a","bc") differ
const SEP: u8 = 0xfe;

#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new<S: Into<String>>(name: S, value: S) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        let cmp = self.name.cmp(&other.name);
        if cmp != Ordering::Equal {
            cmp
        } else {
            self.value.cmp(&other.value)
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{name}={value}", name = self.name, value = self.value)
    }
}

/// A series identity: labels sorted by name, names unique.
#[derive(Clone, Debug, Default)]
pub struct Labels(SmallVec<Label, 6>);

impl Labels {
    /// Builds a label set from arbitrary input order. For duplicate names the
    /// lexically greatest value wins.
    pub fn new(labels: Vec<Label>) -> Self {
        let mut labels = labels;
        labels.sort();
        let mut out: SmallVec<Label, 6> = SmallVec::new();
        for label in labels {
            match out.last_mut() {
                Some(prev) if prev.name == label.name => *prev = label,
                _ => out.push(label),
            }
        }
        Self(out)
    }

    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, value)| Label {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stable identity hash used to deduplicate the same series across
    /// sources.
    pub fn signature(&self) -> u64 {
        let mut hasher = ahash::AHasher::default();
        for label in self.iter() {
            label.name.hash(&mut hasher);
            SEP.hash(&mut hasher);
            label.value.hash(&mut hasher);
            SEP.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl PartialEq for Labels {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl Eq for Labels {}

impl Hash for Labels {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_slice().hash(state);
    }
}

impl PartialOrd for Labels {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Labels {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_slice().cmp(other.0.as_slice())
    }
}

impl Display for Labels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for label in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}={}", label.name, enquote('"', &label.value))?;
        }
        write!(f, "}}")
    }
}
