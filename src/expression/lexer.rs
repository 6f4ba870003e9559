//! Tokenizer for the rule language

use std::fmt;

use serde_json::Number;

use super::errors::{ExpressionError, ExpressionResult};

/// Token kinds produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    True,
    False,
    Null,
    Has,
    Number(Number),
    Str(String),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    EqEq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    AndAnd,
    OrOr,
    Bang,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Has => write!(f, "has"),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Comma => write!(f, ","),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::OrOr => write!(f, "||"),
            TokenKind::Bang => write!(f, "!"),
        }
    }
}

/// A token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Splits rule source into tokens
pub fn tokenize(source: &str) -> ExpressionResult<Vec<Token>> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).map(|(_, c)| *c);
        let (kind, consumed) = match (c, next) {
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('>', Some('=')) => (TokenKind::Gte, 2),
            ('<', Some('=')) => (TokenKind::Lte, 2),
            ('&', Some('&')) => (TokenKind::AndAnd, 2),
            ('|', Some('|')) => (TokenKind::OrOr, 2),
            ('>', _) => (TokenKind::Gt, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('!', _) => (TokenKind::Bang, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            ('"', _) | ('\'', _) => {
                let (literal, consumed) = lex_string(&chars[i..], position)?;
                (TokenKind::Str(literal), consumed)
            }
            (c, _) if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let (number, consumed) = lex_number(&chars[i..], position)?;
                (TokenKind::Number(number), consumed)
            }
            (c, _) if is_ident_start(c) => {
                let len = chars[i..]
                    .iter()
                    .take_while(|(_, c)| is_ident_continue(*c))
                    .count();
                let word: String = chars[i..i + len].iter().map(|(_, c)| *c).collect();
                let kind = match word.as_str() {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    "has" => TokenKind::Has,
                    _ => TokenKind::Ident(word),
                };
                (kind, len)
            }
            (found, _) => {
                return Err(ExpressionError::UnexpectedCharacter { found, position });
            }
        };

        tokens.push(Token { kind, position });
        i += consumed;
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn lex_string(chars: &[(usize, char)], position: usize) -> ExpressionResult<(String, usize)> {
    let quote = chars[0].1;
    let mut out = String::new();
    let mut i = 1;

    while i < chars.len() {
        match chars[i].1 {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or(ExpressionError::UnterminatedString { position })?
                    .1;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(ExpressionError::UnterminatedString { position })
}

fn lex_number(chars: &[(usize, char)], position: usize) -> ExpressionResult<(Number, usize)> {
    let len = chars
        .iter()
        .enumerate()
        .take_while(|(idx, (_, c))| c.is_ascii_digit() || *c == '.' || (*idx == 0 && *c == '-'))
        .count();
    let literal: String = chars[..len].iter().map(|(_, c)| *c).collect();

    let invalid = || ExpressionError::InvalidNumber {
        literal: literal.clone(),
        position,
    };

    let number = if literal.contains('.') {
        let parsed: f64 = literal.parse().map_err(|_| invalid())?;
        Number::from_f64(parsed).ok_or_else(invalid)?
    } else {
        let parsed: i64 = literal.parse().map_err(|_| invalid())?;
        Number::from(parsed)
    };

    Ok((number, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_operators_and_paths() {
        assert_eq!(
            kinds("document.owner == auth._id"),
            vec![
                TokenKind::Ident("document".into()),
                TokenKind::Dot,
                TokenKind::Ident("owner".into()),
                TokenKind::EqEq,
                TokenKind::Ident("auth".into()),
                TokenKind::Dot,
                TokenKind::Ident("_id".into()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_literals() {
        assert_eq!(
            kinds("auth.policies has 'Admin' && !false"),
            vec![
                TokenKind::Ident("auth".into()),
                TokenKind::Dot,
                TokenKind::Ident("policies".into()),
                TokenKind::Has,
                TokenKind::Str("Admin".into()),
                TokenKind::AndAnd,
                TokenKind::Bang,
                TokenKind::False,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("-3"), vec![TokenKind::Number(Number::from(-3))]);
        assert_eq!(
            kinds("2.5"),
            vec![TokenKind::Number(Number::from_f64(2.5).unwrap())]
        );
        assert!(matches!(
            tokenize("1.2.3"),
            Err(ExpressionError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"b""#), vec![TokenKind::Str("a\"b".into())]);
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokenize("document.name == \"abc"),
            Err(ExpressionError::UnterminatedString { position: 17 })
        );
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            tokenize("document.a = 1"),
            Err(ExpressionError::UnexpectedCharacter {
                found: '=',
                position: 11
            })
        );
    }
}
