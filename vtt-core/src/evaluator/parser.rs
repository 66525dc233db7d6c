//! Recursive-descent parser producing an expression tree.

use super::lexer::{tokenize, Op, Token};
use crate::error::MacroError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Dice(String),
    Variable(String),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Assign(String, Box<Expr>),
}

/// Parses `source` into statements separated by `;`.
pub fn parse(source: &str) -> Result<Vec<Expr>, MacroError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();

    while !parser.at_end() {
        if parser.eat(&Token::Semicolon) {
            continue;
        }
        statements.push(parser.expression()?);
        if !parser.at_end() && !parser.eat(&Token::Semicolon) {
            return Err(parser.unexpected());
        }
    }
    Ok(statements)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, ops: &[(Op, BinaryOp)]) -> Option<BinaryOp> {
        let Some(Token::Op(op)) = self.peek() else {
            return None;
        };
        let found = ops.iter().find(|(candidate, _)| candidate == op)?.1;
        self.pos += 1;
        Some(found)
    }

    fn unexpected(&self) -> MacroError {
        match self.peek() {
            Some(token) => MacroError::Evaluation(format!("Unexpected token {token:?}")),
            None => MacroError::Evaluation("Unexpected end of expression".to_string()),
        }
    }

    fn expression(&mut self) -> Result<Expr, MacroError> {
        if let (Some(Token::Ident(name)), Some(Token::Op(Op::Assign))) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            let name = name.clone();
            self.pos += 2;
            let value = self.expression()?;
            return Ok(Expr::Assign(name, Box::new(value)));
        }
        self.binary(0)
    }

    /// Precedence climbing over the binary operator table, loosest first.
    fn binary(&mut self, level: usize) -> Result<Expr, MacroError> {
        const LEVELS: &[&[(Op, BinaryOp)]] = &[
            &[(Op::Or, BinaryOp::Or)],
            &[(Op::And, BinaryOp::And)],
            &[(Op::Eq, BinaryOp::Eq), (Op::Ne, BinaryOp::Ne)],
            &[
                (Op::Lt, BinaryOp::Lt),
                (Op::Le, BinaryOp::Le),
                (Op::Gt, BinaryOp::Gt),
                (Op::Ge, BinaryOp::Ge),
            ],
            &[(Op::Plus, BinaryOp::Add), (Op::Minus, BinaryOp::Sub)],
            &[(Op::Star, BinaryOp::Mul), (Op::Slash, BinaryOp::Div)],
        ];

        if level == LEVELS.len() {
            return self.unary();
        }
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.eat_op(LEVELS[level]) {
            let right = self.binary(level + 1)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, MacroError> {
        match self.peek() {
            Some(Token::Op(Op::Minus)) => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Negate, Box::new(self.unary()?)))
            }
            Some(Token::Op(Op::Not)) => {
                self.pos += 1;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, MacroError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(text)) => Ok(Expr::Literal(Value::Text(text))),
            Some(Token::Dice(notation)) => Ok(Expr::Dice(notation)),
            Some(Token::Ident(name)) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Variable(name));
                }
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        if !self.eat(&Token::Comma) {
                            return Err(self.unexpected());
                        }
                    }
                }
                Ok(Expr::Call(name, args))
            }
            Some(Token::LParen) => {
                let inner = self.expression()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.unexpected());
                }
                Ok(inner)
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::from(n)))
    }

    #[test]
    fn test_precedence() {
        let parsed = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            parsed,
            vec![Expr::Binary(
                BinaryOp::Add,
                num(1),
                Box::new(Expr::Binary(BinaryOp::Mul, num(2), num(3)))
            )]
        );
    }

    #[test]
    fn test_assignment_and_sequence() {
        let parsed = parse("x = 1; y = x").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], Expr::Assign("x".into(), num(1)));
        assert_eq!(
            parsed[1],
            Expr::Assign("y".into(), Box::new(Expr::Variable("x".into())))
        );
    }

    #[test]
    fn test_calls() {
        let parsed = parse("f()").unwrap();
        assert_eq!(parsed, vec![Expr::Call("f".into(), vec![])]);

        let parsed = parse("g(1, h(2))").unwrap();
        assert_eq!(
            parsed,
            vec![Expr::Call(
                "g".into(),
                vec![
                    Expr::Literal(Value::from(1_i64)),
                    Expr::Call("h".into(), vec![Expr::Literal(Value::from(2_i64))]),
                ]
            )]
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse("f(1,").is_err());
        assert!(parse("(1 + 2").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("* 3").is_err());
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(parse("  ").unwrap(), Vec::new());
    }
}
