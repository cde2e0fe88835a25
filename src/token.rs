use std::fmt;

/// A lexed token: its kind (carrying any literal payload) plus the source
/// line it was read on. Lines start at 1.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32) -> Token {
        Token { kind, line }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Async,
    Dasync,
    For,
    If,
    Else,
    While,
    Var,
    Fun,
    Main,
    Return,
    True,
    False,

    // Type keywords.
    Int,
    Float,
    Double,
    Bool,
    Char,
    Str,
    Url,
    Void,

    IntLit(i32),
    FloatLit(f32),
    DoubleLit(f64),
    CharLit(char),
    StrLit(String),
    Identifier(String),

    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Incr,
    Decr,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    AndAnd,
    OrOr,
    Not,
    Semicolon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        match self {
            Async => write!(f, "async"),
            Dasync => write!(f, "dasync"),
            For => write!(f, "for"),
            If => write!(f, "if"),
            Else => write!(f, "else"),
            While => write!(f, "while"),
            Var => write!(f, "var"),
            Fun => write!(f, "fun"),
            Main => write!(f, "main"),
            Return => write!(f, "return"),
            True => write!(f, "true"),
            False => write!(f, "false"),
            Int => write!(f, "int"),
            Float => write!(f, "float"),
            Double => write!(f, "double"),
            Bool => write!(f, "bool"),
            Char => write!(f, "char"),
            Str => write!(f, "string"),
            Url => write!(f, "url"),
            Void => write!(f, "void"),
            IntLit(v) => write!(f, "{v}"),
            FloatLit(v) => write!(f, "{v}f"),
            DoubleLit(v) => write!(f, "{v}"),
            CharLit(c) => write!(f, "'{c}'"),
            StrLit(s) => write!(f, "\"{s}\""),
            Identifier(name) => write!(f, "{name}"),
            Assign => write!(f, "="),
            Plus => write!(f, "+"),
            Minus => write!(f, "-"),
            Star => write!(f, "*"),
            Slash => write!(f, "/"),
            PlusAssign => write!(f, "+="),
            MinusAssign => write!(f, "-="),
            StarAssign => write!(f, "*="),
            SlashAssign => write!(f, "/="),
            Incr => write!(f, "++"),
            Decr => write!(f, "--"),
            EqEq => write!(f, "=="),
            NotEq => write!(f, "!="),
            Less => write!(f, "<"),
            LessEq => write!(f, "<="),
            Greater => write!(f, ">"),
            GreaterEq => write!(f, ">="),
            AndAnd => write!(f, "&&"),
            OrOr => write!(f, "||"),
            Not => write!(f, "!"),
            Semicolon => write!(f, ";"),
            Comma => write!(f, ","),
            LParen => write!(f, "("),
            RParen => write!(f, ")"),
            LBrace => write!(f, "{{"),
            RBrace => write!(f, "}}"),
            Eof => write!(f, "end of file"),
        }
    }
}

/// The reserved words of the language. Matching is case-sensitive.
pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "async" => TokenKind::Async,
    "dasync" => TokenKind::Dasync,
    "for" => TokenKind::For,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "var" => TokenKind::Var,
    "fun" => TokenKind::Fun,
    "main" => TokenKind::Main,
    "return" => TokenKind::Return,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "int" => TokenKind::Int,
    "float" => TokenKind::Float,
    "double" => TokenKind::Double,
    "bool" => TokenKind::Bool,
    "char" => TokenKind::Char,
    "string" => TokenKind::Str,
    "url" => TokenKind::Url,
    "void" => TokenKind::Void,
};
