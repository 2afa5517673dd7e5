//! Push-plan compilation.
//!
//! After terminal resolution, a DFA state's transition table only covers the
//! terminals consumed directly by its own rule. Whenever the way forward is
//! a nonterminal arc, the parser instead needs to know, for every terminal
//! that can begin the invoked rule, which nested rule frames to push before
//! that terminal is consumed. This module computes that closure, and in
//! doing so proves the grammar free of left recursion and of
//! first-set ambiguity.

use crate::{
    dfa::{DfaPlan, DfaState, DfaStateID},
    grammar::{GrammarError, ReservedStrings, Terminal},
    types::Map,
};
use std::{fmt, hash::Hash};

/// For one rule: every terminal that can begin it, paired with the rule
/// frames to push (outermost first) before that terminal is consumed.
type FirstPlan<T> = Map<Terminal<T>, Vec<DfaStateID>>;

/// Memo of per-rule first plans. `None` marks a rule whose plan is still
/// being computed; looking one up means the grammar is left-recursive.
type FirstPlans<T> = Map<String, Option<FirstPlan<T>>>;

/// Extend every DFA state's transition table with the plans distributed from
/// its nonterminal arcs.
pub(crate) fn calculate_tree_traversal<T>(
    states: &mut [DfaState<T>],
    nonterminal_to_dfas: &Map<String, Vec<DfaStateID>>,
    reserved: &ReservedStrings,
) -> Result<(), GrammarError>
where
    T: Copy + Eq + Hash + fmt::Debug,
{
    let mut first_plans: FirstPlans<T> = Map::default();

    // Rule names are processed in sorted order so that diagnostics are
    // reproducible across runs.
    let mut nonterminals: Vec<&String> = nonterminal_to_dfas.keys().collect();
    nonterminals.sort();
    for nonterminal in nonterminals {
        if !first_plans.contains_key(nonterminal.as_str()) {
            calculate_first_plans(states, nonterminal_to_dfas, &mut first_plans, nonterminal)?;
        }
    }

    // No left recursion beyond this point; every memo entry is complete.

    for ids in nonterminal_to_dfas.values() {
        for &id in ids {
            let nonterminal_arcs: Vec<(String, DfaStateID)> = states[id.index()]
                .nonterminal_arcs
                .iter()
                .map(|(name, target)| (name.clone(), *target))
                .collect();

            for (nonterminal, next_dfa) in nonterminal_arcs {
                let plans = first_plans[&nonterminal]
                    .as_ref()
                    .expect("first plans are complete");
                for (terminal, pushes) in plans {
                    if let Some(prev_plan) = states[id.index()].transitions.get(terminal) {
                        // Two ways to proceed on the same lookahead: the
                        // grammar is not LL(1). Sort the candidates so the
                        // error message is deterministic.
                        let mut choices = [
                            chosen_rule(states, prev_plan).to_owned(),
                            match pushes.first() {
                                Some(push) => states[push.index()].from_rule.clone(),
                                None => states[next_dfa.index()].from_rule.clone(),
                            },
                        ];
                        choices.sort();
                        let [first, second] = choices;
                        return Err(GrammarError::Ambiguity {
                            rule: states[id.index()].from_rule.clone(),
                            terminal: terminal.display(reserved).to_string(),
                            choices: (first, second),
                        });
                    }
                    states[id.index()].transitions.insert(
                        *terminal,
                        DfaPlan {
                            next_dfa,
                            dfa_pushes: pushes.clone(),
                        },
                    );
                }
            }
        }
    }

    Ok(())
}

/// The rule a plan would commit to: the outermost pushed frame's rule, or
/// the current rule when nothing is pushed.
fn chosen_rule<'a, T>(states: &'a [DfaState<T>], plan: &DfaPlan) -> &'a str {
    match plan.dfa_pushes.first() {
        Some(push) => &states[push.index()].from_rule,
        None => &states[plan.next_dfa.index()].from_rule,
    }
}

fn calculate_first_plans<T>(
    states: &[DfaState<T>],
    nonterminal_to_dfas: &Map<String, Vec<DfaStateID>>,
    first_plans: &mut FirstPlans<T>,
    nonterminal: &str,
) -> Result<(), GrammarError>
where
    T: Copy + Eq + Hash + fmt::Debug,
{
    let ids = &nonterminal_to_dfas[nonterminal];
    let mut new_first_plans: FirstPlan<T> = Map::default();
    first_plans.insert(nonterminal.to_owned(), None); // in-progress marker

    // Only the start state matters here: every other state is reached after
    // the rule has already consumed at least one token.
    let start = &states[ids[0].index()];

    for (terminal, plan) in &start.transitions {
        new_first_plans.insert(*terminal, vec![plan.next_dfa]);
    }

    for (invoked, &next_dfa) in &start.nonterminal_arcs {
        match first_plans.get(invoked.as_str()) {
            // The invoked rule is currently being computed somewhere up the
            // recursion: reaching it again without having consumed a token
            // is left recursion.
            Some(None) => {
                return Err(GrammarError::LeftRecursion {
                    rule: invoked.clone(),
                })
            }
            Some(Some(_)) => {}
            None => {
                calculate_first_plans(states, nonterminal_to_dfas, first_plans, invoked)?;
            }
        }

        let invoked_plans = first_plans[invoked.as_str()]
            .as_ref()
            .expect("recursion either completed or errored");
        for (terminal, pushes) in invoked_plans {
            // Prepend the local destination so pushes stay outermost-first.
            let mut with_destination = Vec::with_capacity(pushes.len() + 1);
            with_destination.push(next_dfa);
            with_destination.extend_from_slice(pushes);
            new_first_plans.insert(*terminal, with_destination);
        }
    }

    first_plans.insert(nonterminal.to_owned(), Some(new_first_plans));
    Ok(())
}
