use std::{error, fmt};

/// A fatal compilation error. Compilation is fail-fast: the first error wins
/// and carries the line it was detected on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    pub line: u32,
    pub kind: ErrorKind,
}

impl CompileError {
    pub fn new(line: u32, kind: impl Into<ErrorKind>) -> CompileError {
        CompileError {
            line,
            kind: kind.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error at line {}: {}", self.line, self.kind)
    }
}

impl error::Error for CompileError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical(LexicalError),
    Syntax(SyntaxError),
    Scope(ScopeError),
    Type(TypeError),
    Async(AsyncError),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Lexical(e) => e.fmt(f),
            ErrorKind::Syntax(e) => e.fmt(f),
            ErrorKind::Scope(e) => e.fmt(f),
            ErrorKind::Type(e) => e.fmt(f),
            ErrorKind::Async(e) => e.fmt(f),
        }
    }
}

macro_rules! into_error_kind {
    ($($variant:ident($ty:ident)),* $(,)?) => {
        $(impl From<$ty> for ErrorKind {
            fn from(e: $ty) -> ErrorKind {
                ErrorKind::$variant(e)
            }
        })*
    };
}

into_error_kind! {
    Lexical(LexicalError),
    Syntax(SyntaxError),
    Scope(ScopeError),
    Type(TypeError),
    Async(AsyncError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexicalError {
    InvalidCharacter(char),
    UnterminatedString,
    UnterminatedComment,
    InvalidCharLiteral,
    DuplicatedPoint,
    DuplicatedFloatSuffix,
    MalformedNumber(String),
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LexicalError::*;
        match self {
            InvalidCharacter(c) => write!(f, "invalid character \"{c}\""),
            UnterminatedString => {
                write!(f, "the string literal is not closed by a double quote")
            }
            UnterminatedComment => write!(f, "insert \"*/\" to complete the comment"),
            InvalidCharLiteral => write!(f, "invalid character literal"),
            DuplicatedPoint => write!(f, "duplication of token \".\""),
            DuplicatedFloatSuffix => write!(f, "duplication of token \"f\""),
            MalformedNumber(lit) => write!(f, "malformed numeric literal \"{lit}\""),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyntaxError {
    /// Both sides are already rendered with [`TokenKind`]'s `Display`.
    ///
    /// [`TokenKind`]: crate::token::TokenKind
    ExpectedToken { expected: String, found: String },
    UnexpectedToken(String),
    ExpectedIdentifier(String),
    ExpectedType(String),
    ExpectedExpression(String),
    TooManyInitializers,
    InvalidAssignTarget,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SyntaxError::*;
        match self {
            ExpectedToken { expected, found } => {
                write!(f, "expected token \"{expected}\", instead of \"{found}\"")
            }
            UnexpectedToken(found) => write!(f, "token \"{found}\" not allowed here"),
            ExpectedIdentifier(found) => {
                write!(f, "expected an identifier, instead of \"{found}\"")
            }
            ExpectedType(found) => write!(f, "expected a type, instead of \"{found}\""),
            ExpectedExpression(found) => {
                write!(f, "expected an expression, instead of \"{found}\"")
            }
            TooManyInitializers => {
                write!(f, "the number of identifiers is less than the assignments")
            }
            InvalidAssignTarget => {
                write!(f, "the left side of a compound assignment must be an identifier")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeError {
    UndeclaredVariable(String),
    /// `call` is the rendered call shape, e.g. `half( int )`.
    UndeclaredFunction(String),
    DuplicatedVariable(String),
    /// The rendered signature, e.g. `half( int )`.
    DuplicatedFunction(String),
    UsedUninitialized(String),
    DuplicatedMain,
    MissingMain,
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ScopeError::*;
        match self {
            UndeclaredVariable(name) => {
                write!(f, "the variable \"{name}\" has never been declared")
            }
            UndeclaredFunction(call) => write!(f, "no function \"{call}\" found"),
            DuplicatedVariable(name) => {
                write!(f, "the variable \"{name}\" has already been declared")
            }
            DuplicatedFunction(sig) => {
                write!(f, "the function \"{sig}\" has already been declared")
            }
            UsedUninitialized(name) => {
                write!(f, "the variable \"{name}\" is used uninitialized")
            }
            DuplicatedMain => write!(f, "the main function has already been declared"),
            MissingMain => write!(f, "no main function found"),
        }
    }
}

/// Type errors carry already-rendered type names, via [`Type`]'s `Display`.
///
/// [`Type`]: crate::types::Type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    Mismatch { from: String, to: String },
    InvalidCast { from: String, to: String },
    NumberRequired(String),
    NumericExpression(String),
    NumericOperands { lhs: String, rhs: String },
    ComparableOperands { lhs: String, rhs: String },
    BoolOperand(String),
    BoolGuard(&'static str),
    ArityMismatch,
    NotAFunction(usize),
    ReturnMismatch { expected: String, found: String },
    MissingReturn { name: String, ty: String },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TypeError::*;
        match self {
            Mismatch { from, to } => {
                write!(f, "it is not possible to assign type \"{from}\" to type \"{to}\"")
            }
            InvalidCast { from, to } => {
                write!(f, "cannot cast an expression of type \"{from}\" to type \"{to}\"")
            }
            NumberRequired(name) => write!(f, "the variable \"{name}\" must be a number"),
            NumericExpression(ty) => {
                write!(f, "expected a numeric expression, instead of type \"{ty}\"")
            }
            NumericOperands { lhs, rhs } => write!(
                f,
                "arithmetic operands must be numbers, found \"{lhs}\" and \"{rhs}\""
            ),
            ComparableOperands { lhs, rhs } => write!(
                f,
                "the types \"{lhs}\" and \"{rhs}\" cannot be compared"
            ),
            BoolOperand(ty) => write!(
                f,
                "logical operands must have type \"bool\", found \"{ty}\""
            ),
            BoolGuard(stmt) => write!(f, "the {stmt} statement requires a boolean guard"),
            ArityMismatch => write!(
                f,
                "the number of arguments differs from the invoked function"
            ),
            NotAFunction(nth) => write!(
                f,
                "the return type of invocation {nth} is not a function"
            ),
            ReturnMismatch { expected, found } => write!(
                f,
                "the function has type \"{expected}\", while the return has type \"{found}\""
            ),
            MissingReturn { name, ty } => write!(
                f,
                "the function \"{name}\" has type \"{ty}\" but no return statement"
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsyncError {
    SideEffect,
    ReturnNotAllowed,
    MissingReturn,
    NonUrlTarget { name: String, found: String },
    UninitializedTarget(String),
    ClosureReturnForbidden,
    ClosureReturnRequired,
}

impl fmt::Display for AsyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use AsyncError::*;
        match self {
            SideEffect => write!(
                f,
                "side effects on enclosing variables are not allowed inside an async or dasync block"
            ),
            ReturnNotAllowed => write!(
                f,
                "a return statement is not allowed in an async or dasync block used as a statement"
            ),
            MissingReturn => write!(
                f,
                "an async or dasync block used as an assignment must end with a return statement"
            ),
            NonUrlTarget { name, found } => write!(
                f,
                "the dasync target \"{name}\" must have type \"url\", found \"{found}\""
            ),
            UninitializedTarget(name) => write!(
                f,
                "the dasync target \"{name}\" is used uninitialized"
            ),
            ClosureReturnForbidden => {
                write!(f, "the closure does not admit a return statement")
            }
            ClosureReturnRequired => write!(f, "the closure requires a return statement"),
        }
    }
}
