//! Recursive descent parser for the rule language
//!
//! Precedence (lowest first): `||`, `&&`, `!`, comparison, primary.
//! A comparison is non-associative: `a == b == c` is rejected.

use serde_json::Value;

use super::ast::{Access, CompareOp, Expr, Root};
use super::errors::{ExpressionError, ExpressionResult};
use super::lexer::{tokenize, Token, TokenKind};

/// Maximum nesting of parentheses, negations and array literals
pub const MAX_DEPTH: usize = 64;

/// Parses rule source into an expression tree
pub fn parse(source: &str) -> ExpressionResult<Expr> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;

    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(unexpected(token)),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn unexpected(token: &Token) -> ExpressionError {
    ExpressionError::UnexpectedToken {
        found: token.kind.to_string(),
        position: token.position,
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn next(&mut self) -> ExpressionResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind) -> ExpressionResult<Token> {
        let token = self.next()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(unexpected(&token))
        }
    }

    fn enter(&mut self) -> ExpressionResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_or(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == Some(&TokenKind::OrOr) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ExpressionResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.peek_kind() == Some(&TokenKind::AndAnd) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ExpressionResult<Expr> {
        if self.peek_kind() == Some(&TokenKind::Bang) {
            self.pos += 1;
            self.enter()?;
            let inner = self.parse_unary()?;
            self.leave();
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ExpressionResult<Expr> {
        let left = self.parse_primary()?;

        let op = match self.peek_kind() {
            Some(TokenKind::EqEq) => CompareOp::Eq,
            Some(TokenKind::NotEq) => CompareOp::Ne,
            Some(TokenKind::Gt) => CompareOp::Gt,
            Some(TokenKind::Gte) => CompareOp::Gte,
            Some(TokenKind::Lt) => CompareOp::Lt,
            Some(TokenKind::Lte) => CompareOp::Lte,
            Some(TokenKind::Has) => CompareOp::Has,
            _ => return Ok(left),
        };
        self.pos += 1;

        let right = self.parse_primary()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn parse_primary(&mut self) -> ExpressionResult<Expr> {
        let token = self.next()?;
        match token.kind {
            TokenKind::True => Ok(Expr::Literal(Value::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Value::Bool(false))),
            TokenKind::Null => Ok(Expr::Literal(Value::Null)),
            TokenKind::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Value::String(s))),
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.leave();
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.enter()?;
                let items = self.parse_array_items()?;
                self.leave();
                Ok(Expr::Array(items))
            }
            TokenKind::Ident(name) => {
                let root = Root::from_ident(&name).ok_or(ExpressionError::UnknownRoot {
                    name,
                    position: token.position,
                })?;
                self.parse_access(root)
            }
            _ => Err(unexpected(&token)),
        }
    }

    fn parse_array_items(&mut self) -> ExpressionResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.peek_kind() == Some(&TokenKind::RBracket) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_primary()?);
            let token = self.next()?;
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::RBracket => return Ok(items),
                _ => return Err(unexpected(&token)),
            }
        }
    }

    fn parse_access(&mut self, root: Root) -> ExpressionResult<Expr> {
        let mut path = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::Dot) => {
                    self.pos += 1;
                    let token = self.next()?;
                    match token.kind {
                        TokenKind::Ident(segment) => path.push(segment),
                        // keywords are valid property names after a dot
                        TokenKind::True | TokenKind::False | TokenKind::Null | TokenKind::Has => {
                            path.push(token.kind.to_string())
                        }
                        _ => return Err(unexpected(&token)),
                    }
                }
                Some(TokenKind::LBracket) => {
                    self.pos += 1;
                    let token = self.next()?;
                    match token.kind {
                        TokenKind::Str(segment) => path.push(segment),
                        TokenKind::Number(n) if n.is_u64() => path.push(n.to_string()),
                        _ => return Err(unexpected(&token)),
                    }
                    self.expect(TokenKind::RBracket)?;
                }
                _ => break,
            }
        }
        Ok(Expr::Access(Access { root, path }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(path: &[&str]) -> Expr {
        Expr::Access(Access {
            root: Root::Document,
            path: path.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn auth(path: &[&str]) -> Expr {
        Expr::Access(Access {
            root: Root::Auth,
            path: path.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn test_parse_comparison() {
        let expr = parse("document.owner == auth._id").unwrap();
        assert_eq!(
            expr,
            Expr::Compare(
                CompareOp::Eq,
                Box::new(doc(&["owner"])),
                Box::new(auth(&["_id"]))
            )
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("true || false && false").unwrap();
        match expr {
            Expr::Or(_, right) => assert!(matches!(*right, Expr::And(_, _))),
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_parentheses_and_negation() {
        let expr = parse("!(document.a == 1)").unwrap();
        assert!(matches!(expr, Expr::Not(_)));
    }

    #[test]
    fn test_bracket_segments() {
        let expr = parse("document.tags[0] == 'x' && document['weird key'] == 1").unwrap();
        let mut paths = Vec::new();
        expr.for_each_access(&mut |a| paths.push(a.path.clone()));
        assert_eq!(
            paths,
            vec![vec!["tags".to_string(), "0".to_string()], vec!["weird key".to_string()]]
        );
    }

    #[test]
    fn test_array_literal() {
        let expr = parse("['a', 'b'] has document.status").unwrap();
        assert_eq!(
            expr,
            Expr::Compare(
                CompareOp::Has,
                Box::new(Expr::Array(vec![
                    Expr::Literal(json!("a")),
                    Expr::Literal(json!("b"))
                ])),
                Box::new(doc(&["status"]))
            )
        );
    }

    #[test]
    fn test_unknown_root_rejected() {
        assert_eq!(
            parse("user.id == 1"),
            Err(ExpressionError::UnknownRoot {
                name: "user".into(),
                position: 0
            })
        );
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(
            parse("true == true true"),
            Err(ExpressionError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_chained_comparison_rejected() {
        assert!(parse("document.a == 1 == true").is_err());
    }

    #[test]
    fn test_empty_and_truncated() {
        assert_eq!(parse("   "), Err(ExpressionError::Empty));
        assert_eq!(parse("document.a =="), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(parse("(true"), Err(ExpressionError::UnexpectedEnd));
    }

    #[test]
    fn test_depth_limit() {
        let source = format!("{}true{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(parse(&source), Err(ExpressionError::TooDeep(MAX_DEPTH)));
    }
}
