use crate::ast::{Expr, Number};
use crate::lexer::Token;
use crate::parser::{ParseError, Parser};

/// Binary operator precedence; larger binds tighter. Anything not listed is
/// not a binary operator.
fn tok_precedence(token: &Token) -> i32 {
    match token {
        Token::Char(b'=') => 2,
        Token::Char(b'!') => 10,
        Token::Char(b'<') => 10,
        Token::Char(b'+') => 20,
        Token::Char(b'-') => 20,
        Token::Char(b'*') => 40,
        _ => -1,
    }
}

impl Parser {
    pub fn parse_expression(&mut self) -> Option<Expr> {
        let lhs = self.parse_primary()?;
        self.parse_binop_rhs(0, lhs)
    }

    /// Precedence climbing: keep folding operators at least as tight as
    /// `expr_prec`, recursing on the right whenever the following operator
    /// binds tighter. `=` chains to the right instead.
    fn parse_binop_rhs(&mut self, expr_prec: i32, mut lhs: Expr) -> Option<Expr> {
        loop {
            let tok_prec = tok_precedence(&self.cur);
            if tok_prec < expr_prec {
                return Some(lhs);
            }

            let op = match self.cur {
                Token::Char(c) => c,
                _ => unreachable!("precedence table only admits Char tokens"),
            };
            self.advance();

            let mut rhs = self.parse_primary()?;

            let next_prec = tok_precedence(&self.cur);
            if tok_prec < next_prec {
                rhs = self.parse_binop_rhs(tok_prec + 1, rhs)?;
            } else if op == b'=' && tok_prec == next_prec {
                rhs = self.parse_binop_rhs(tok_prec, rhs)?;
            }

            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    pub(crate) fn parse_primary(&mut self) -> Option<Expr> {
        match self.cur.clone() {
            Token::Ident(name) => self.parse_ident_or_call(name),
            Token::IntLit(value) => {
                self.advance();
                Some(Expr::Number(Number::Int(value)))
            }
            Token::FpLit(value) => {
                self.advance();
                Some(Expr::Number(Number::Fp(value)))
            }
            Token::StrLit(bytes) => {
                self.advance();
                Some(Expr::Number(Number::Str(bytes)))
            }
            Token::Char(b'(') => self.parse_paren(),
            // Unary address-of and dereference live here, in primary
            // position, so they bind tighter than any binary operator.
            Token::Char(op @ (b'&' | b'*')) => {
                self.advance();
                let operand = self.parse_primary()?;
                Some(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            _ => self.error(ParseError::ExpectedExpression),
        }
    }

    fn parse_ident_or_call(&mut self, name: String) -> Option<Expr> {
        self.advance(); // identifier

        if self.cur != Token::Char(b'(') {
            return Some(Expr::VarRef(name));
        }
        self.advance(); // '('

        let mut args = Vec::new();
        let mut first = true;
        loop {
            if self.accept_char(b')') {
                break;
            }
            if !first && !self.accept_char(b',') {
                return self.error(ParseError::BadArgumentList);
            }
            first = false;
            args.push(self.parse_expression()?);
        }
        Some(Expr::Call { callee: name, args })
    }

    fn parse_paren(&mut self) -> Option<Expr> {
        self.advance(); // '('
        let expr = self.parse_expression()?;
        if !self.accept_char(b')') {
            return self.error(ParseError::MissingCloseParen);
        }
        Some(expr)
    }
}
