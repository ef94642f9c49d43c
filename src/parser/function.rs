use crate::ast::{Expr, Function, Number, Prototype, Stmt, VarType};
use crate::lexer::Token;
use crate::parser::{ParseError, Parser, ANON_FUNCTION};

impl Parser {
    /// Type names are plain identifiers checked against the closed set.
    pub(crate) fn parse_type(&mut self) -> Option<VarType> {
        match &self.cur {
            Token::Ident(name) => match VarType::from_name(name) {
                Some(vtype) => {
                    self.advance();
                    Some(vtype)
                }
                None => {
                    let name = name.clone();
                    self.error(ParseError::UnknownType(name))
                }
            },
            _ => self.error(ParseError::ExpectedType),
        }
    }

    /// prototype := type ident '(' ( type ident (',' type ident)* )? ')'
    pub fn parse_prototype(&mut self) -> Option<Prototype> {
        let ret = self.parse_type()?;

        let name = match &self.cur {
            Token::Ident(name) => name.clone(),
            _ => return self.error(ParseError::ExpectedFunctionName),
        };
        self.advance();

        if !self.accept_char(b'(') {
            return self.error(ParseError::ExpectedProtoOpen);
        }

        let mut arg_names = Vec::new();
        let mut arg_types = Vec::new();
        if self.cur != Token::Char(b')') {
            loop {
                let vtype = self.parse_type()?;
                let arg = match &self.cur {
                    Token::Ident(name) => name.clone(),
                    _ => return self.error(ParseError::ExpectedParamName),
                };
                self.advance();

                arg_types.push(vtype);
                arg_names.push(arg);

                if !self.accept_char(b',') {
                    break;
                }
            }
        }

        if !self.accept_char(b')') {
            return self.error(ParseError::ExpectedProtoClose);
        }

        Some(Prototype {
            name,
            ret,
            arg_names,
            arg_types,
        })
    }

    /// def := 'def' prototype stmt
    pub fn parse_definition(&mut self) -> Option<Function> {
        self.advance(); // 'def'
        let proto = self.parse_prototype()?;
        let body = self.parse_statement()?;
        Some(Function { proto, body })
    }

    /// extern := 'extern' prototype
    pub fn parse_extern(&mut self) -> Option<Prototype> {
        self.advance(); // 'extern'
        self.parse_prototype()
    }

    /// A statement typed outside `def`/`extern` is wrapped into an anonymous
    /// nullary function returning a byte, with a synthetic `return`: an
    /// expression statement returns its own value, anything else runs and
    /// returns zero.
    pub fn parse_top_level(&mut self) -> Option<Function> {
        let stmt = self.parse_statement()?;
        let body = match stmt {
            Stmt::Expr(expr) => Stmt::Return(expr),
            other => Stmt::Block(vec![other, Stmt::Return(Expr::Number(Number::Int(0)))]),
        };
        Some(Function {
            proto: Prototype {
                name: ANON_FUNCTION.to_string(),
                ret: VarType::Byte,
                arg_names: Vec::new(),
                arg_types: Vec::new(),
            },
            body,
        })
    }
}
