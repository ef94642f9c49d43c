use std::fmt;

/// The closed set of value types the language knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Double,
    Byte,
    Bool,
    BytePtr,
}

impl VarType {
    /// Type names are ordinary identifiers, not keywords; the parser maps
    /// them here.
    pub fn from_name(name: &str) -> Option<VarType> {
        match name {
            "double" => Some(VarType::Double),
            "byte" => Some(VarType::Byte),
            "bool" => Some(VarType::Bool),
            "byte_ptr" => Some(VarType::BytePtr),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VarType::Double => "double",
            VarType::Byte => "byte",
            VarType::Bool => "bool",
            VarType::BytePtr => "byte_ptr",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Literal payload of a `Number` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Fp(f64),
    Int(i64),
    Str(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Number),
    VarRef(String),
    Unary {
        op: u8,
        operand: Box<Expr>,
    },
    Binary {
        op: u8,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// An expression evaluated for effect, value discarded.
    Expr(Expr),
    VarDecl {
        name: String,
        vtype: VarType,
        /// None means zero-initialised.
        init: Option<Expr>,
    },
    If {
        cond: Expr,
        then_stmt: Box<Stmt>,
        else_stmt: Box<Stmt>,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        /// Never absent; the parser synthesises `1.0` when the source omits
        /// the step.
        step: Expr,
        body: Box<Stmt>,
    },
    Block(Vec<Stmt>),
    Return(Expr),
}

/// A function signature independent of its body: name, return type and the
/// paired argument names/types.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub ret: VarType,
    pub arg_names: Vec<String>,
    pub arg_types: Vec<VarType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub proto: Prototype,
    pub body: Stmt,
}

// Pretty-printing renders concrete syntax the parser accepts again, so a
// printed AST can be fed back through the front end. String literals always
// come out in hex form and binary expressions fully parenthesised.

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Fp(value) => write!(f, "{value:?}"),
            Number::Int(value) => write!(f, "{value}"),
            Number::Str(bytes) => {
                write!(f, "\"\\x")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "\"")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(number) => number.fmt(f),
            Expr::VarRef(name) => f.write_str(name),
            Expr::Unary { op, operand } => write!(f, "{}{operand}", *op as char),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", *op as char),
            Expr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    arg.fmt(f)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expr(expr) => expr.fmt(f),
            Stmt::VarDecl { name, vtype, init } => {
                write!(f, "var {name} {vtype}")?;
                if let Some(init) = init {
                    write!(f, " = {init}")?;
                }
                Ok(())
            }
            Stmt::If { cond, then_stmt, else_stmt } => {
                write!(f, "if {cond} then {then_stmt} else {else_stmt}")
            }
            Stmt::For { var, start, end, step, body } => {
                write!(f, "for {var} = {start}, {end}, {step} {body}")
            }
            Stmt::Block(body) => {
                write!(f, "{{ ")?;
                for stmt in body {
                    write!(f, "{stmt}; ")?;
                }
                write!(f, "}}")
            }
            Stmt::Return(expr) => write!(f, "return {expr}"),
        }
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.ret, self.name)?;
        for (i, (name, vtype)) in self.arg_names.iter().zip(&self.arg_types).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{vtype} {name}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def {} {}", self.proto, self.body)
    }
}
