//! NFA fragments produced by the grammar front end.
//!
//! Every rule of the grammar is first expressed as a nondeterministic finite
//! automaton with epsilon transitions for the grouping, optional and
//! repetition constructs. All states live in one flat arena and are referred
//! to by index, so that "the same state" is simply "the same index".

use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NfaStateID {
    raw: u32,
}

impl NfaStateID {
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    pub(crate) const fn into_raw(self) -> u32 {
        self.raw
    }
}

impl fmt::Debug for NfaStateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n#{:03}", self.raw)
    }
}

/// A single transition out of an NFA state. An absent label is an epsilon
/// transition; a present label is a terminal spelling or a nonterminal name,
/// not yet classified.
#[derive(Debug, Clone)]
pub struct NfaArc {
    pub label: Option<String>,
    pub target: NfaStateID,
}

#[derive(Debug)]
pub struct NfaState {
    /// Name of the grammar rule this state belongs to.
    pub from_rule: String,
    pub arcs: Vec<NfaArc>,
}

/// Arena holding the NFA states of every rule in the grammar.
#[derive(Debug, Default)]
pub struct Nfa {
    states: Vec<NfaState>,
}

impl Nfa {
    pub fn add_state(&mut self, from_rule: &str) -> NfaStateID {
        let id = NfaStateID::from_raw(self.states.len() as u32);
        self.states.push(NfaState {
            from_rule: from_rule.to_owned(),
            arcs: Vec::new(),
        });
        id
    }

    /// Add an arc between two states. `None` adds an epsilon transition.
    pub fn add_arc(&mut self, from: NfaStateID, target: NfaStateID, label: Option<&str>) {
        self.states[from.into_raw() as usize].arcs.push(NfaArc {
            label: label.map(str::to_owned),
            target,
        });
    }

    pub fn state(&self, id: NfaStateID) -> &NfaState {
        &self.states[id.into_raw() as usize]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// A set of NFA states, used as the subset-construction witness of a DFA
/// state. Equality is set equality.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NfaStateSet {
    inner: bit_set::BitSet,
}

impl NfaStateSet {
    pub fn contains(&self, id: NfaStateID) -> bool {
        self.inner.contains(id.into_raw() as usize)
    }

    pub fn insert(&mut self, id: NfaStateID) -> bool {
        self.inner.insert(id.into_raw() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = NfaStateID> + '_ {
        self.inner
            .iter()
            .map(|raw| NfaStateID::from_raw(raw as u32))
    }
}

impl FromIterator<NfaStateID> for NfaStateSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = NfaStateID>,
    {
        Self {
            inner: iter
                .into_iter()
                .map(|id| id.into_raw() as usize)
                .collect(),
        }
    }
}
