//! Per-rule DFA construction: powerset construction and state minimization.

use crate::{
    grammar::Terminal,
    nfa::{Nfa, NfaStateID, NfaStateSet},
    types::Map,
};
use std::fmt;

/// Index of a DFA state. During construction of a single rule the index is
/// local to that rule's state list; once the rule is installed into the
/// grammar-wide arena it is a global index. Arcs never cross rule
/// boundaries, so the remapping is a plain offset shift.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DfaStateID {
    raw: u32,
}

impl DfaStateID {
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    pub(crate) const fn into_raw(self) -> u32 {
        self.raw
    }

    pub(crate) const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Debug for DfaStateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d#{:03}", self.raw)
    }
}

/// The parser-facing decision for one lookahead terminal: the state to move
/// to within the current stack frame, and the nested rule frames to push
/// (outermost first) before the terminal is actually consumed. An empty
/// `dfa_pushes` means the terminal belongs directly to the current rule.
#[derive(Debug, Clone)]
pub struct DfaPlan {
    pub next_dfa: DfaStateID,
    pub dfa_pushes: Vec<DfaStateID>,
}

/// One state of a rule's DFA.
///
/// `arcs` are the raw edges from the powerset construction, labeled with
/// unclassified terminal spellings and nonterminal names. The transition
/// resolver then splits them into `nonterminal_arcs` and the resolved
/// `transitions` table, and the push-plan compiler extends `transitions`
/// with the multi-step nonterminal chains. A parsing engine only ever reads
/// `transitions` and `is_final`.
#[derive(Debug)]
pub struct DfaState<T> {
    pub from_rule: String,
    nfa_set: NfaStateSet,
    pub is_final: bool,
    arcs: Map<String, DfaStateID>,
    pub nonterminal_arcs: Map<String, DfaStateID>,
    pub transitions: Map<Terminal<T>, DfaPlan>,
}

impl<T> DfaState<T> {
    fn new(from_rule: &str, nfa_set: NfaStateSet, finish: NfaStateID) -> Self {
        let is_final = nfa_set.contains(finish);
        Self {
            from_rule: from_rule.to_owned(),
            nfa_set,
            is_final,
            arcs: Map::default(),
            nonterminal_arcs: Map::default(),
            transitions: Map::default(),
        }
    }

    /// The NFA states this DFA state stands for.
    pub fn nfa_set(&self) -> &NfaStateSet {
        &self.nfa_set
    }

    /// The raw label -> state edges recorded by the powerset construction.
    pub fn arcs(&self) -> impl Iterator<Item = (&str, DfaStateID)> + '_ {
        self.arcs.iter().map(|(label, target)| (label.as_str(), *target))
    }

    pub(crate) fn shift_arcs(&mut self, offset: u32) {
        for target in self.arcs.values_mut() {
            *target = DfaStateID::from_raw(target.into_raw() + offset);
        }
    }

    /// Structural equality used by the minimizer: same finality and the same
    /// label -> target mapping. `nfa_set` is deliberately ignored, and
    /// targets are compared by index rather than recursively, so the check
    /// stays well-defined on cyclic automata.
    fn merge_equal(&self, other: &Self) -> bool {
        if self.is_final != other.is_final {
            return false;
        }
        if self.arcs.len() != other.arcs.len() {
            return false;
        }
        self.arcs
            .iter()
            .all(|(label, target)| other.arcs.get(label) == Some(target))
    }
}

/// Convert one rule's NFA fragment into a list of DFA states via the
/// powerset construction. The first element is the rule's start state; arc
/// targets are indices into the returned list.
pub fn make_dfas<T>(
    nfa: &Nfa,
    from_rule: &str,
    start: NfaStateID,
    finish: NfaStateID,
) -> Vec<DfaState<T>> {
    let mut base_nfa_set = NfaStateSet::default();
    add_closure(nfa, start, &mut base_nfa_set);
    let mut states = vec![DfaState::new(from_rule, base_nfa_set, finish)];

    // NB: `states` grows while we are iterating.
    let mut current = 0;
    while current < states.len() {
        // Group the member states' labeled arcs by label and epsilon-close
        // the union of their targets.
        let mut arcs: Map<String, NfaStateSet> = Map::default();
        for nfa_id in states[current].nfa_set.iter() {
            for arc in &nfa.state(nfa_id).arcs {
                if let Some(label) = &arc.label {
                    let closure = arcs.entry(label.clone()).or_default();
                    add_closure(nfa, arc.target, closure);
                }
            }
        }

        for (label, nfa_set) in arcs {
            let target = match states.iter().position(|state| state.nfa_set == nfa_set) {
                Some(existing) => existing,
                None => {
                    states.push(DfaState::new(from_rule, nfa_set, finish));
                    states.len() - 1
                }
            };
            states[current]
                .arcs
                .insert(label, DfaStateID::from_raw(target as u32));
        }

        current += 1;
    }

    states
}

fn add_closure(nfa: &Nfa, id: NfaStateID, set: &mut NfaStateSet) {
    if !set.insert(id) {
        return;
    }
    for arc in &nfa.state(id).arcs {
        if arc.label.is_none() {
            add_closure(nfa, arc.target, set);
        }
    }
}

/// Merge structurally equal states until a fixed point is reached.
///
/// Not theoretically optimal, but rule DFAs are small. Rewrites every arc
/// that pointed at a removed state, so the accepted language never changes;
/// running it on an already-minimized list is a no-op.
pub fn simplify_dfas<T>(states: &mut Vec<DfaState<T>>) {
    let mut changed = true;
    while changed {
        changed = false;
        'scan: for i in 0..states.len() {
            for j in i + 1..states.len() {
                if states[i].merge_equal(&states[j]) {
                    states.remove(j);
                    let retained = DfaStateID::from_raw(i as u32);
                    for state in states.iter_mut() {
                        for target in state.arcs.values_mut() {
                            if target.index() == j {
                                *target = retained;
                            } else if target.index() > j {
                                *target = DfaStateID::from_raw(target.into_raw() - 1);
                            }
                        }
                    }
                    changed = true;
                    break 'scan;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::Nfa;

    // Hand-built NFA for `a: 'x' 'y' | 'x' 'z'`, shaped the way the grammar
    // front end builds fragments: two-state atoms chained by epsilon arcs
    // and an alternation fork.
    fn branching_nfa() -> (Nfa, NfaStateID, NfaStateID) {
        let mut nfa = Nfa::default();
        let atom = |nfa: &mut Nfa, label: &str| {
            let a = nfa.add_state("a");
            let z = nfa.add_state("a");
            nfa.add_arc(a, z, Some(label));
            (a, z)
        };

        let start = nfa.add_state("a");
        let end = nfa.add_state("a");
        for labels in [["x", "y"], ["x", "z"]] {
            let (a1, z1) = atom(&mut nfa, labels[0]);
            let (a2, z2) = atom(&mut nfa, labels[1]);
            nfa.add_arc(z1, a2, None);
            nfa.add_arc(start, a1, None);
            nfa.add_arc(z2, end, None);
        }
        (nfa, start, end)
    }

    #[test]
    fn powerset_merges_a_common_prefix() {
        let (nfa, start, end) = branching_nfa();
        let states: Vec<DfaState<u32>> = make_dfas(&nfa, "a", start, end);

        // One start state with a single 'x' arc: the two alternatives share
        // their first token.
        assert!(!states[0].is_final);
        let arcs: Vec<_> = states[0].arcs().collect();
        assert_eq!(arcs.len(), 1);
        let (label, mid) = arcs[0];
        assert_eq!(label, "x");

        // The middle state branches on 'y' and 'z', both reaching a final
        // state.
        let mid = &states[mid.index()];
        assert_eq!(mid.arcs().count(), 2);
        for (_, target) in mid.arcs() {
            assert!(states[target.index()].is_final);
        }
    }

    #[test]
    fn simplify_merges_equal_final_states() {
        let (nfa, start, end) = branching_nfa();
        let mut states: Vec<DfaState<u32>> = make_dfas(&nfa, "a", start, end);
        assert_eq!(states.len(), 4);

        simplify_dfas(&mut states);

        // The two arc-less final states collapse into one.
        assert_eq!(states.len(), 3);
        assert_eq!(states.iter().filter(|state| state.is_final).count(), 1);
    }

    #[test]
    fn simplify_is_idempotent() {
        let (nfa, start, end) = branching_nfa();
        let mut states: Vec<DfaState<u32>> = make_dfas(&nfa, "a", start, end);
        simplify_dfas(&mut states);
        let minimized = states.len();

        simplify_dfas(&mut states);
        assert_eq!(states.len(), minimized);
    }

    #[test]
    fn unreachable_final_state_is_not_final_anywhere() {
        // `a: 'x'` but with a final state no arc ever reaches.
        let mut nfa = Nfa::default();
        let a = nfa.add_state("a");
        let z = nfa.add_state("a");
        nfa.add_arc(a, z, Some("x"));
        let orphan = nfa.add_state("a");

        let states: Vec<DfaState<u32>> = make_dfas(&nfa, "a", a, orphan);
        assert!(states.iter().all(|state| !state.is_final));
    }
}
