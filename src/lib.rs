//! Grammar compilation for table-driven LL parsing.
//!
//! The entry point is [`grammar::generate_grammar`]: it parses an
//! extended-BNF grammar description, converts every rule's NFA fragment into
//! a minimized DFA, resolves terminals against a token namespace, and
//! computes the push plans that let a parsing engine make every
//! stack-transition decision with a single table lookup.

pub mod dfa;
mod first_plans;
pub mod grammar;
pub mod nfa;
pub mod syntax;
pub mod types;
pub mod util;
