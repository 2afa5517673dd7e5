//! Grammar definition front end.
//!
//! Parses the extended-BNF dialect used to describe grammars and reduces
//! every rule to an NFA fragment. The dialect describes itself as:
//!
//! ```text
//! grammar: (NEWLINE | rule)* ENDMARKER
//! rule: NAME ':' rhs NEWLINE
//! rhs: items ('|' items)*
//! items: item+
//! item: '[' rhs ']' | atom ['+' | '*']
//! atom: '(' rhs ')' | NAME | STRING
//! ```
//!
//! `#` starts a line comment, a backslash continues a line, and newlines
//! inside `(...)` or `[...]` are insignificant.

pub mod lexer;

use self::lexer::Token;
use crate::nfa::{Nfa, NfaStateID};
use logos::Logos as _;
use std::fmt;

/// One grammar rule, reduced to its NFA fragment: a start state and a
/// distinguished final state in the shared arena.
#[derive(Debug)]
pub struct ParsedRule {
    pub name: String,
    pub start: NfaStateID,
    pub end: NfaStateID,
}

/// Parse a whole grammar description into NFA fragments, one per rule, in
/// definition order.
pub fn parse(source: &str) -> anyhow::Result<(Nfa, Vec<ParsedRule>)> {
    let span = tracing::trace_span!("parse_grammar");
    let _entered = span.enter();

    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        let token = result.map_err(|()| {
            anyhow::anyhow!(
                "unexpected character {:?} (line {})",
                &source[span.clone()],
                line_of(source, span.start)
            )
        })?;
        tokens.push((token, span.start));
    }

    let parser = GrammarParser {
        source,
        tokens,
        pos: 0,
        depth: 0,
        last_offset: 0,
        nfa: Nfa::default(),
        current_rule: String::new(),
    };
    parser.parse_rules()
}

struct GrammarParser<'s> {
    source: &'s str,
    tokens: Vec<(Token<'s>, usize)>,
    pos: usize,
    /// Bracket nesting depth; newlines are insignificant while positive.
    depth: usize,
    last_offset: usize,
    nfa: Nfa,
    current_rule: String,
}

impl<'s> GrammarParser<'s> {
    fn parse_rules(mut self) -> anyhow::Result<(Nfa, Vec<ParsedRule>)> {
        let mut rules = Vec::new();
        loop {
            while matches!(self.peek(), Some(Token::Newline)) {
                self.advance();
            }
            if self.peek().is_none() {
                break;
            }
            rules.push(self.parse_rule()?);
        }
        if rules.is_empty() {
            anyhow::bail!("the grammar defines no rules");
        }
        tracing::trace!(rules = rules.len(), nfa_states = self.nfa.len(), "grammar parsed");
        Ok((self.nfa, rules))
    }

    // rule: NAME ':' rhs NEWLINE
    fn parse_rule(&mut self) -> anyhow::Result<ParsedRule> {
        let name = match self.advance() {
            Some(Token::Name(name)) => name.to_owned(),
            other => return Err(self.error(format_args!("expected a rule name, got {:?}", other))),
        };
        self.current_rule = name.clone();
        self.expect(Token::Colon)?;
        let (start, end) = self.parse_rhs()?;
        match self.advance() {
            // The trailing newline may be missing on the last line.
            Some(Token::Newline) | None => {}
            Some(other) => {
                return Err(self.error(format_args!("expected end of rule, got {:?}", other)))
            }
        }
        Ok(ParsedRule { name, start, end })
    }

    // rhs: items ('|' items)*
    fn parse_rhs(&mut self) -> anyhow::Result<(NfaStateID, NfaStateID)> {
        let (mut a, mut z) = self.parse_items()?;
        if !matches!(self.peek(), Some(Token::VertBar)) {
            return Ok((a, z));
        }

        // Fork from a fresh pair of states so that every alternative can be
        // entered from the same start and rejoins the same end.
        let aa = self.nfa.add_state(&self.current_rule);
        let zz = self.nfa.add_state(&self.current_rule);
        loop {
            self.nfa.add_arc(aa, a, None);
            self.nfa.add_arc(z, zz, None);
            if !matches!(self.peek(), Some(Token::VertBar)) {
                break;
            }
            self.advance();
            let (next_a, next_z) = self.parse_items()?;
            a = next_a;
            z = next_z;
        }
        Ok((aa, zz))
    }

    // items: item+
    fn parse_items(&mut self) -> anyhow::Result<(NfaStateID, NfaStateID)> {
        let (a, mut b) = self.parse_item()?;
        while matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Str(_) | Token::LParen | Token::LBracket)
        ) {
            let (c, d) = self.parse_item()?;
            self.nfa.add_arc(b, c, None);
            b = d;
        }
        Ok((a, b))
    }

    // item: '[' rhs ']' | atom ['+' | '*']
    fn parse_item(&mut self) -> anyhow::Result<(NfaStateID, NfaStateID)> {
        if matches!(self.peek(), Some(Token::LBracket)) {
            self.advance();
            let (a, z) = self.parse_rhs()?;
            self.expect(Token::RBracket)?;
            // An optional part may be skipped without consuming a token.
            self.nfa.add_arc(a, z, None);
            return Ok((a, z));
        }

        let (a, z) = self.parse_atom()?;
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                self.nfa.add_arc(z, a, None);
                Ok((a, z))
            }
            Some(Token::Star) => {
                self.advance();
                self.nfa.add_arc(z, a, None);
                // Zero repetitions leave the state unchanged.
                Ok((a, a))
            }
            _ => Ok((a, z)),
        }
    }

    // atom: '(' rhs ')' | NAME | STRING
    fn parse_atom(&mut self) -> anyhow::Result<(NfaStateID, NfaStateID)> {
        match self.advance() {
            Some(Token::LParen) => {
                let (a, z) = self.parse_rhs()?;
                self.expect(Token::RParen)?;
                Ok((a, z))
            }
            Some(Token::Name(label) | Token::Str(label)) => {
                let a = self.nfa.add_state(&self.current_rule);
                let z = self.nfa.add_state(&self.current_rule);
                self.nfa.add_arc(a, z, Some(label));
                Ok((a, z))
            }
            other => Err(self.error(format_args!(
                "expected (...), NAME or STRING, got {:?}",
                other
            ))),
        }
    }

    fn expect(&mut self, expected: Token<'static>) -> anyhow::Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            other => Err(self.error(format_args!("expected {:?}, got {:?}", expected, other))),
        }
    }

    /// Consume the next significant token, maintaining the bracket depth.
    fn advance(&mut self) -> Option<Token<'s>> {
        while let Some(&(token, offset)) = self.tokens.get(self.pos) {
            self.pos += 1;
            self.last_offset = offset;
            match token {
                Token::Newline if self.depth > 0 => continue,
                Token::LParen | Token::LBracket => {
                    self.depth += 1;
                    return Some(token);
                }
                Token::RParen | Token::RBracket => {
                    self.depth = self.depth.saturating_sub(1);
                    return Some(token);
                }
                _ => return Some(token),
            }
        }
        None
    }

    fn peek(&self) -> Option<Token<'s>> {
        let mut pos = self.pos;
        while let Some(&(token, _)) = self.tokens.get(pos) {
            match token {
                Token::Newline if self.depth > 0 => pos += 1,
                _ => return Some(token),
            }
        }
        None
    }

    fn error(&self, msg: fmt::Arguments<'_>) -> anyhow::Error {
        anyhow::anyhow!("{} (line {})", msg, line_of(self.source, self.last_offset))
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rule() {
        let (nfa, rules) = parse("start: 'a' 'b' | 'a' 'c'\n").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "start");
        assert!(!nfa.is_empty());
        assert_eq!(nfa.state(rules[0].start).from_rule, "start");
    }

    #[test]
    fn several_rules_in_definition_order() {
        let source = "\
a: b 'x'
# a comment line
b: 'y'

c: 'z'
";
        let (_nfa, rules) = parse(source).unwrap();
        let names: Vec<_> = rules.iter().map(|rule| rule.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn newlines_inside_parentheses_are_joined() {
        let source = "\
a: ('x'
    | 'y'
   ) 'z'
";
        let (_nfa, rules) = parse(source).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn repetition_star_returns_to_the_same_state() {
        let (_nfa, rules) = parse("a: 'x'*\n").unwrap();
        // Zero or more repetitions: the fragment starts and ends in the same
        // state.
        assert_eq!(rules[0].start, rules[0].end);
    }

    #[test]
    fn missing_colon_is_a_syntax_error() {
        let err = parse("a 'x'\n").unwrap_err();
        assert!(err.to_string().contains("expected"), "{}", err);
    }

    #[test]
    fn empty_grammar_is_rejected() {
        let err = parse("\n\n").unwrap_err();
        assert!(err.to_string().contains("no rules"), "{}", err);
    }
}
