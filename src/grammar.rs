//! Grammar compilation and the compiled table types.

use crate::{
    dfa::{self, DfaPlan, DfaState, DfaStateID},
    first_plans, syntax,
    types::{Map, Set},
    util::fmt_with,
};
use std::{fmt, hash::Hash};

/// Lookup of the named token kinds ("NAME", "NUMBER", ...) a grammar may
/// reference. The compiler never enumerates the namespace; it only resolves
/// the names that actually appear in the grammar text.
pub trait TokenNamespace {
    type TokenType: Copy + Eq + Hash + fmt::Debug;

    fn token_type(&self, name: &str) -> Option<Self::TokenType>;
}

impl<T> TokenNamespace for Map<String, T>
where
    T: Copy + Eq + Hash + fmt::Debug,
{
    type TokenType = T;

    fn token_type(&self, name: &str) -> Option<T> {
        self.get(name).copied()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ReservedStringID {
    raw: u16,
}

impl ReservedStringID {
    const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    const fn into_raw(self) -> u16 {
        self.raw
    }
}

/// Interning table for the keyword and operator spellings ("if", "+", ...)
/// mentioned in the grammar as quoted strings. Every occurrence of the same
/// spelling anywhere in the grammar resolves to the same ID, which is what
/// lets transition tables be keyed by it.
#[derive(Debug, Default)]
pub struct ReservedStrings {
    values: Set<String>,
}

impl ReservedStrings {
    fn intern(&mut self, value: &str) -> ReservedStringID {
        match self.values.get_index_of(value) {
            Some(index) => ReservedStringID::from_raw(index as u16),
            None => {
                let (index, _) = self.values.insert_full(value.to_owned());
                ReservedStringID::from_raw(index as u16)
            }
        }
    }

    pub fn get(&self, value: &str) -> Option<ReservedStringID> {
        self.values
            .get_index_of(value)
            .map(|index| ReservedStringID::from_raw(index as u16))
    }

    pub fn resolve(&self, id: ReservedStringID) -> &str {
        self.values
            .get_index(id.into_raw() as usize)
            .expect("unknown reserved string ID")
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReservedStringID, &str)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| (ReservedStringID::from_raw(index as u16), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A resolved terminal: the key type of a DFA state's transition table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Terminal<T> {
    /// A named token kind from the token namespace.
    Token(T),
    /// An interned keyword or operator spelling.
    Reserved(ReservedStringID),
}

impl<T: fmt::Debug> Terminal<T> {
    pub fn display<'g>(&'g self, reserved: &'g ReservedStrings) -> impl fmt::Display + 'g {
        fmt_with(move |f| match self {
            Terminal::Token(token) => write!(f, "{:?}", token),
            Terminal::Reserved(id) => write!(f, "{:?}", reserved.resolve(*id)),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("Syntax error: {}", _0)]
    Syntax(anyhow::Error),

    #[error("rule `{}' is defined more than once", rule)]
    DuplicateRule { rule: String },

    #[error("triple-quoted terminal {} is not allowed in a grammar", label)]
    TripleQuoted { label: String },

    #[error("malformed terminal label {}", label)]
    MalformedLabel { label: String },

    #[error("unknown token kind `{}'", name)]
    UnknownTokenKind { name: String },

    #[error("left recursion for rule {:?}", rule)]
    LeftRecursion { rule: String },

    #[error(
        "Rule {} is ambiguous; given a {} token, we can't determine if we should evaluate {} or {}.",
        rule, terminal, choices.0, choices.1
    )]
    Ambiguity {
        rule: String,
        terminal: String,
        /// The two candidate rules, sorted lexicographically. The order is
        /// only there to keep diagnostics deterministic.
        choices: (String, String),
    },
}

/// The compiled grammar tables consumed by a table-driven LL parsing engine.
///
/// Immutable once built: a parsing engine holds a current [`DfaState`] and,
/// for each observed terminal, looks up `transitions` to learn the next
/// state and which nested rule frames to push. Sharing a `Grammar` between
/// any number of parser instances is safe because nothing ever mutates it.
#[derive(Debug)]
pub struct Grammar<T> {
    states: Vec<DfaState<T>>,
    nonterminal_to_dfas: Map<String, Vec<DfaStateID>>,
    reserved_syntax_strings: ReservedStrings,
    start_nonterminal: String,
}

impl<T> Grammar<T> {
    /// Name of the grammar's root rule (the first rule defined).
    pub fn start_nonterminal(&self) -> &str {
        &self.start_nonterminal
    }

    /// The ordered DFA state list of a rule; the first element is the rule's
    /// start state.
    pub fn dfas(&self, nonterminal: &str) -> Option<&[DfaStateID]> {
        self.nonterminal_to_dfas
            .get(nonterminal)
            .map(|ids| &ids[..])
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = (&str, &[DfaStateID])> + '_ {
        self.nonterminal_to_dfas
            .iter()
            .map(|(name, ids)| (name.as_str(), &ids[..]))
    }

    pub fn state(&self, id: DfaStateID) -> &DfaState<T> {
        &self.states[id.index()]
    }

    pub fn reserved_syntax_strings(&self) -> &ReservedStrings {
        &self.reserved_syntax_strings
    }

    // `"rule.3"`, the rule-local position of a state.
    fn state_label(&self, id: DfaStateID) -> String {
        for (nonterminal, ids) in &self.nonterminal_to_dfas {
            if let Some(position) = ids.iter().position(|&candidate| candidate == id) {
                return format!("{}.{}", nonterminal, position);
            }
        }
        format!("{:?}", id)
    }
}

impl<T: fmt::Debug> fmt::Display for Grammar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (nonterminal, ids) in &self.nonterminal_to_dfas {
            write!(f, "## {}", nonterminal)?;
            if *nonterminal == self.start_nonterminal {
                write!(f, " (start)")?;
            }
            writeln!(f)?;

            for (position, &id) in ids.iter().enumerate() {
                let state = self.state(id);
                write!(f, "- {}", position)?;
                if state.is_final {
                    write!(f, " (final)")?;
                }
                writeln!(f)?;

                for (name, target) in &state.nonterminal_arcs {
                    writeln!(f, "    {} -> {}", name, self.state_label(*target))?;
                }
                for (terminal, plan) in &state.transitions {
                    write!(
                        f,
                        "    {} -> {}",
                        terminal.display(&self.reserved_syntax_strings),
                        self.state_label(plan.next_dfa)
                    )?;
                    if !plan.dfa_pushes.is_empty() {
                        write!(f, " (push")?;
                        for push in &plan.dfa_pushes {
                            write!(f, " {}", self.state_label(*push))?;
                        }
                        write!(f, ")")?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

/// Compile a grammar description into its [`Grammar`] tables.
///
/// `bnf_grammar` is a grammar in extended BNF: `*` for repetition, `+` for
/// at-least-once repetition, `[]` for optional parts, `|` for alternatives
/// and `()` for grouping. Compilation runs to completion in one call and
/// either returns the finished tables or the first fatal error; there is no
/// partial result.
pub fn generate_grammar<N>(
    bnf_grammar: &str,
    token_namespace: &N,
) -> Result<Grammar<N::TokenType>, GrammarError>
where
    N: TokenNamespace,
{
    let span = tracing::trace_span!("generate_grammar");
    let _entered = span.enter();

    let (nfa, rules) = syntax::parse(bnf_grammar).map_err(GrammarError::Syntax)?;

    let mut states: Vec<DfaState<N::TokenType>> = Vec::new();
    let mut nonterminal_to_dfas: Map<String, Vec<DfaStateID>> = Map::default();
    let mut start_nonterminal = None;

    for rule in &rules {
        if nonterminal_to_dfas.contains_key(&rule.name) {
            return Err(GrammarError::DuplicateRule {
                rule: rule.name.clone(),
            });
        }

        let mut dfas = dfa::make_dfas(&nfa, &rule.name, rule.start, rule.end);
        let unsimplified = dfas.len();
        dfa::simplify_dfas(&mut dfas);
        tracing::trace!(
            rule = %rule.name,
            unsimplified,
            simplified = dfas.len(),
            "rule DFA built"
        );

        // Install the rule's states into the grammar-wide arena.
        let offset = states.len() as u32;
        let ids = (0..dfas.len() as u32)
            .map(|local| DfaStateID::from_raw(offset + local))
            .collect();
        for mut state in dfas {
            state.shift_arcs(offset);
            states.push(state);
        }
        nonterminal_to_dfas.insert(rule.name.clone(), ids);

        if start_nonterminal.is_none() {
            start_nonterminal = Some(rule.name.clone());
        }
    }
    let start_nonterminal = start_nonterminal.expect("the front end rejects empty grammars");

    // Classify every arc label: a reference to another rule becomes a
    // nonterminal arc, anything else a resolved terminal with a one-step
    // plan.
    let mut reserved_syntax_strings = ReservedStrings::default();
    for index in 0..states.len() {
        let arcs: Vec<(String, DfaStateID)> = states[index]
            .arcs()
            .map(|(label, target)| (label.to_owned(), target))
            .collect();
        for (label, next_dfa) in arcs {
            if nonterminal_to_dfas.contains_key(&label) {
                states[index].nonterminal_arcs.insert(label, next_dfa);
            } else {
                let terminal =
                    make_transition(token_namespace, &mut reserved_syntax_strings, &label)?;
                states[index].transitions.insert(
                    terminal,
                    DfaPlan {
                        next_dfa,
                        dfa_pushes: Vec::new(),
                    },
                );
            }
        }
    }

    first_plans::calculate_tree_traversal(
        &mut states,
        &nonterminal_to_dfas,
        &reserved_syntax_strings,
    )?;

    tracing::debug!(
        rules = nonterminal_to_dfas.len(),
        states = states.len(),
        reserved_strings = reserved_syntax_strings.len(),
        "grammar compiled"
    );

    Ok(Grammar {
        states,
        nonterminal_to_dfas,
        reserved_syntax_strings,
        start_nonterminal,
    })
}

/// Resolve a terminal arc label into a token kind or an interned reserved
/// string. A label starting with an alphabetic character names a token kind;
/// everything else must be a quoted keyword or operator spelling.
fn make_transition<N: TokenNamespace>(
    token_namespace: &N,
    reserved_syntax_strings: &mut ReservedStrings,
    label: &str,
) -> Result<Terminal<N::TokenType>, GrammarError> {
    if label.starts_with(|c: char| c.is_alphabetic()) {
        let token = token_namespace
            .token_type(label)
            .ok_or_else(|| GrammarError::UnknownTokenKind {
                name: label.to_owned(),
            })?;
        Ok(Terminal::Token(token))
    } else {
        if label.starts_with("'''") || label.starts_with("\"\"\"") {
            return Err(GrammarError::TripleQuoted {
                label: label.to_owned(),
            });
        }
        let value = unquote(label).ok_or_else(|| GrammarError::MalformedLabel {
            label: label.to_owned(),
        })?;
        Ok(Terminal::Reserved(reserved_syntax_strings.intern(value)))
    }
}

// Escape sequences do not occur in grammar terminals, so stripping the
// surrounding quotes is all there is to it.
fn unquote(label: &str) -> Option<&str> {
    let mut chars = label.chars();
    let quote = chars.next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    chars.as_str().strip_suffix(quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_strips_matching_quotes() {
        assert_eq!(unquote("'if'"), Some("if"));
        assert_eq!(unquote("\"+\""), Some("+"));
        assert_eq!(unquote("'unterminated"), None);
        assert_eq!(unquote("'"), None);
        assert_eq!(unquote("%"), None);
    }

    #[test]
    fn interning_is_stable() {
        let mut reserved = ReservedStrings::default();
        let first = reserved.intern("if");
        let other = reserved.intern("else");
        let again = reserved.intern("if");
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(reserved.len(), 2);
        assert_eq!(reserved.resolve(first), "if");
        assert_eq!(reserved.get("else"), Some(other));
    }
}
