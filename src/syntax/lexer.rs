//! Lexer for the grammar definition dialect.

use logos::Logos;

#[derive(Debug, Copy, Clone, PartialEq, Logos)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum Token<'source> {
    #[token(":")]
    Colon,

    #[token("|")]
    VertBar,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("*")]
    Star,

    #[token("+")]
    Plus,

    #[regex(r"\r?\n")]
    Newline,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Name(&'source str),

    // Triple-quoted forms are lexed as one token so that the transition
    // resolver can reject them with a dedicated error.
    #[regex(r"'(?:[^'\\\n]|\\.)*'")]
    #[regex(r#""(?:[^"\\\n]|\\.)*""#)]
    #[regex(r"'''(?:[^']|'[^']|''[^'])*'''")]
    #[regex(r#""""(?:[^"]|"[^"]|""[^"])*""""#)]
    Str(&'source str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use Token::*;

    fn tokenize(input: &str) -> Vec<Token<'_>> {
        Token::lexer(input)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn smoketest() {
        let tokens = tokenize("file_input: (NEWLINE | stmt)* 'end' # trailing comment\n");
        assert_eq!(
            tokens,
            [
                Name("file_input"),
                Colon,
                LParen,
                Name("NEWLINE"),
                VertBar,
                Name("stmt"),
                RParen,
                Star,
                Str("'end'"),
                Newline,
            ]
        );
    }

    #[test]
    fn optional_and_repetition() {
        let tokens = tokenize("x: a ['+' b] c+\n");
        assert_eq!(
            tokens,
            [
                Name("x"),
                Colon,
                Name("a"),
                LBracket,
                Str("'+'"),
                Name("b"),
                RBracket,
                Name("c"),
                Plus,
                Newline,
            ]
        );
    }

    #[test]
    fn line_continuation_is_skipped() {
        let tokens = tokenize("a: b \\\n   c\n");
        assert_eq!(tokens, [Name("a"), Colon, Name("b"), Name("c"), Newline]);
    }

    #[test]
    fn triple_quoted_string_is_one_token() {
        let tokens = tokenize("a: '''kw'''\n");
        assert_eq!(tokens, [Name("a"), Colon, Str("'''kw'''"), Newline]);
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let mut lexer = Token::lexer("a: ?\n");
        assert_eq!(lexer.next(), Some(Ok(Name("a"))));
        assert_eq!(lexer.next(), Some(Ok(Colon)));
        assert_eq!(lexer.next(), Some(Err(())));
    }
}
