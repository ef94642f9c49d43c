use crate::ast::{Expr, Number, Stmt};
use crate::lexer::Token;
use crate::parser::{ParseError, Parser};

impl Parser {
    pub fn parse_statement(&mut self) -> Option<Stmt> {
        match self.cur {
            Token::If => self.parse_if(),
            Token::For => self.parse_for(),
            Token::BlockOpen => self.parse_block(),
            Token::Var => self.parse_var_decl(),
            Token::Return => self.parse_return(),
            _ => Some(Stmt::Expr(self.parse_expression()?)),
        }
    }

    /// if_stmt := 'if' expr 'then' stmt 'else' stmt
    ///
    /// Both arms are mandatory.
    fn parse_if(&mut self) -> Option<Stmt> {
        self.advance(); // 'if'
        let cond = self.parse_expression()?;

        if self.cur != Token::Then {
            return self.error(ParseError::ExpectedThen);
        }
        self.advance();
        let then_stmt = self.parse_statement()?;

        if self.cur != Token::Else {
            return self.error(ParseError::ExpectedElse);
        }
        self.advance();
        let else_stmt = self.parse_statement()?;

        Some(Stmt::If {
            cond,
            then_stmt: Box::new(then_stmt),
            else_stmt: Box::new(else_stmt),
        })
    }

    /// for_stmt := 'for' ident '=' expr ',' expr (',' expr)? stmt
    fn parse_for(&mut self) -> Option<Stmt> {
        self.advance(); // 'for'

        let var = match &self.cur {
            Token::Ident(name) => name.clone(),
            _ => return self.error(ParseError::ExpectedForVariable),
        };
        self.advance();

        if !self.accept_char(b'=') {
            return self.error(ParseError::ExpectedForAssign);
        }
        let start = self.parse_expression()?;

        if !self.accept_char(b',') {
            return self.error(ParseError::ExpectedForEnd);
        }
        let end = self.parse_expression()?;

        let step = if self.accept_char(b',') {
            self.parse_expression()?
        } else {
            Expr::Number(Number::Fp(1.0))
        };

        let body = self.parse_statement()?;
        Some(Stmt::For {
            var,
            start,
            end,
            step,
            body: Box::new(body),
        })
    }

    /// block := '{' (stmt ';'?)* '}'
    fn parse_block(&mut self) -> Option<Stmt> {
        self.advance(); // '{'
        let mut body = Vec::new();
        loop {
            match self.cur {
                Token::Semi => {
                    self.advance();
                }
                Token::BlockClose => {
                    self.advance();
                    break;
                }
                Token::Eof => return self.error(ParseError::UnterminatedBlock),
                _ => body.push(self.parse_statement()?),
            }
        }
        Some(Stmt::Block(body))
    }

    /// var_decl := 'var' ident type ('=' expr)?
    fn parse_var_decl(&mut self) -> Option<Stmt> {
        self.advance(); // 'var'

        let name = match &self.cur {
            Token::Ident(name) => name.clone(),
            _ => return self.error(ParseError::ExpectedVarName),
        };
        self.advance();

        let vtype = self.parse_type()?;

        let init = if self.accept_char(b'=') {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Some(Stmt::VarDecl { name, vtype, init })
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        self.advance(); // 'return'
        Some(Stmt::Return(self.parse_expression()?))
    }
}
