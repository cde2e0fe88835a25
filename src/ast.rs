//! The resolved, type-annotated syntax tree.
//!
//! ```plain
//! program        -> declaration* function* (one of them `main`)
//! function       -> "fun" name "(" param-list ")" type? block
//! block          -> "{" statement* "}"
//! statement      -> declaration | assignment ";" | call ";" | "for" | "if"
//!                 | "while" | "return" | block | async | dasync | ";"
//! declaration    -> "var" name ("," name)* type ("=" initializer ("," initializer)*)? ";"
//! assignment     -> name ("=" rhs | "+=" expr | "-=" expr | "*=" expr
//!                 | "/=" expr | "++" | "--")
//! rhs            -> expr | closure | async-expr | dasync-expr
//! async-expr     -> "async" block             (block must end in return)
//! dasync-expr    -> "dasync" "(" name ")" block
//! closure        -> "fun" "(" param-list ")" type? block
//! expr           -> relational (("==" | "!=" | "&&" | "||") expr)?
//! relational     -> arith (("<" | "<=" | ">" | ">=") arith)?
//! arith          -> unary (arith-op unary)*
//! unary          -> ("+" | "-" | "!")? primary
//! primary        -> literal | name | call | cast | "(" expr ")"
//! call           -> name "(" args ")" ("(" args ")")*
//! cast           -> "(" type ")" primary
//! ```
//!
//! Every expression node carries the type computed for it during the parse,
//! and every identifier reference was resolved against the scope stack, so
//! consumers never need a symbol table of their own.

use std::rc::Rc;

use crate::types::Type;

#[derive(Debug, PartialEq)]
pub struct Program {
    /// Global variable declarations, in source order.
    pub globals: Vec<Stmt>,
    pub functions: Vec<FunDecl>,
}

#[derive(Debug, PartialEq)]
pub struct FunDecl {
    pub name: Rc<str>,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: Block,
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub name: Rc<str>,
    pub ty: Type,
}

#[derive(Debug, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub enum Stmt {
    Declaration {
        name: Rc<str>,
        ty: Type,
        init: Option<Expr>,
    },
    Assignment {
        target: Rc<str>,
        op: AssignOp,
        value: Option<Expr>,
        /// True when reading the target must first wait on a pending
        /// async result.
        wait: bool,
    },
    Call(Call),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    If {
        cond: Expr,
        then_body: Block,
        else_body: Option<Block>,
    },
    Return(Option<Expr>),
    Block(Block),
    /// Statement-form async block; produces no value.
    Async(Block),
    /// Statement-form dasync block, executed against `target`.
    Dasync {
        target: Rc<str>,
        body: Block,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Incr,
    Decr,
}

/// A (possibly curried) call: `name(args)(more)(...)`. The type is the
/// final working return type after every application.
#[derive(Debug, PartialEq)]
pub struct Call {
    pub name: Rc<str>,
    pub args: Vec<Expr>,
    pub chained: Vec<Vec<Expr>>,
    pub ty: Type,
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Int(i32),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
    Bool(bool),
    Ident {
        name: Rc<str>,
        /// True when this reference consumes a pending async result and
        /// must wait for it first.
        wait: bool,
    },
    Call(Call),
    /// The target type is the expression's own `ty`.
    Cast(Box<Expr>),
    Closure(Box<Closure>),
    /// Assignment-form async block; its body ends with the return that
    /// produces the value.
    Async(Block),
    Dasync {
        target: Rc<str>,
        body: Block,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, PartialEq)]
pub struct Closure {
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: Block,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
    Incr,
    Decr,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    NotEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            DivAssign => "/=",
            Less => "<",
            LessEq => "<=",
            Greater => ">",
            GreaterEq => ">=",
            Eq => "==",
            NotEq => "!=",
            And => "&&",
            Or => "||",
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        use UnaryOp::*;
        match self {
            Pos => "+",
            Neg => "-",
            Not => "!",
            Incr => "++",
            Decr => "--",
        }
    }
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        use AssignOp::*;
        match self {
            Assign => "=",
            Add => "+=",
            Sub => "-=",
            Mul => "*=",
            Div => "/=",
            Incr => "++",
            Decr => "--",
        }
    }
}
