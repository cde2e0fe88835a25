use std::{iter::Peekable, str::Chars};

use crate::{
    error::{CompileError, LexicalError},
    token::{Token, TokenKind, KEYWORDS},
};

/// Lexes the whole source, including the final [`TokenKind::Eof`] token.
/// Stops at the first lexical error.
pub fn tokenize(src: &str) -> Result<Vec<Token>, CompileError> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let eof = token.is_eof();
        tokens.push(token);
        if eof {
            return Ok(tokens);
        }
    }
}

pub struct Lexer<'src> {
    chars: Peekable<Chars<'src>>,
    line: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            chars: src.chars().peekable(),
            line: 1,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        use TokenKind::*;
        loop {
            self.skip_whitespace();
            let line = self.line;
            let Some(c) = self.advance() else {
                return Ok(Token::new(Eof, line));
            };
            let kind = match c {
                c if c.is_ascii_alphabetic() || c == '_' => self.ident_or_keyword(c),
                c if c.is_ascii_digit() || c == '.' => self.number(c, line)?,
                '\'' => self.char_literal(line)?,
                '"' => self.string_literal(line)?,
                '/' if self.take('/') => {
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.take('*') => {
                    self.skip_block_comment(line)?;
                    continue;
                }
                '/' if self.take('=') => SlashAssign,
                '/' => Slash,
                '+' if self.take('+') => Incr,
                '+' if self.take('=') => PlusAssign,
                '+' => Plus,
                '-' if self.take('-') => Decr,
                '-' if self.take('=') => MinusAssign,
                '-' => Minus,
                '*' if self.take('=') => StarAssign,
                '*' => Star,
                '=' if self.take('=') => EqEq,
                '=' => Assign,
                '!' if self.take('=') => NotEq,
                '!' => Not,
                '<' if self.take('=') => LessEq,
                '<' => Less,
                '>' if self.take('=') => GreaterEq,
                '>' => Greater,
                '&' if self.take('&') => AndAnd,
                '|' if self.take('|') => OrOr,
                ';' => Semicolon,
                ',' => Comma,
                '(' => LParen,
                ')' => RParen,
                '{' => LBrace,
                '}' => RBrace,
                c => return Err(err(line, LexicalError::InvalidCharacter(c))),
            };
            return Ok(Token::new(kind, line));
        }
    }

    fn ident_or_keyword(&mut self, first: char) -> TokenKind {
        let mut buf = String::new();
        buf.push(first);
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            buf.push(self.peek());
            self.advance();
        }
        KEYWORDS
            .get(&buf)
            .cloned()
            .unwrap_or(TokenKind::Identifier(buf))
    }

    fn number(&mut self, first: char, line: u32) -> Result<TokenKind, CompileError> {
        let mut buf = String::new();
        buf.push(first);
        let mut point = first == '.';
        let mut has_digits = first.is_ascii_digit();
        // The `f` suffix, when present, must be the final character.
        let mut suffixed = false;
        loop {
            let c = self.peek();
            match c {
                '0'..='9' | '.' if suffixed => {
                    buf.push(c);
                    return Err(err(line, LexicalError::MalformedNumber(buf)));
                }
                '0'..='9' => has_digits = true,
                '.' if point => return Err(err(line, LexicalError::DuplicatedPoint)),
                '.' => point = true,
                'f' if suffixed => {
                    return Err(err(line, LexicalError::DuplicatedFloatSuffix));
                }
                'f' => suffixed = true,
                c if c.is_ascii_alphabetic() || c == '_' => {
                    buf.push(c);
                    return Err(err(line, LexicalError::MalformedNumber(buf)));
                }
                _ => break,
            }
            buf.push(c);
            self.advance();
        }
        if !has_digits {
            return Err(err(line, LexicalError::InvalidCharacter('.')));
        }
        let malformed = |buf: String| err(line, LexicalError::MalformedNumber(buf));
        if suffixed {
            let body = &buf[..buf.len() - 1];
            match body.parse() {
                Ok(v) => Ok(TokenKind::FloatLit(v)),
                Err(_) => Err(malformed(buf)),
            }
        } else if point {
            match buf.parse() {
                Ok(v) => Ok(TokenKind::DoubleLit(v)),
                Err(_) => Err(malformed(buf)),
            }
        } else {
            match buf.parse() {
                Ok(v) => Ok(TokenKind::IntLit(v)),
                Err(_) => Err(malformed(buf)),
            }
        }
    }

    fn char_literal(&mut self, line: u32) -> Result<TokenKind, CompileError> {
        let invalid = || err(line, LexicalError::InvalidCharLiteral);
        let c = self.advance().ok_or_else(invalid)?;
        if c == '\'' || c == '\n' {
            return Err(invalid());
        }
        if !self.take('\'') {
            return Err(invalid());
        }
        Ok(TokenKind::CharLit(c))
    }

    fn string_literal(&mut self, line: u32) -> Result<TokenKind, CompileError> {
        let mut buf = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(err(line, LexicalError::UnterminatedString));
                }
                Some('"') => return Ok(TokenKind::StrLit(buf)),
                Some(c) => buf.push(c),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while !matches!(self.peek(), '\n' | '\0') {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, line: u32) -> Result<(), CompileError> {
        loop {
            match self.advance() {
                None => return Err(err(line, LexicalError::UnterminatedComment)),
                Some('*') if self.take('/') => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_whitespace() && self.peek() != '\0' {
            self.advance();
        }
    }

    /// Returns the next character without consuming it, `'\0'` at the end.
    fn peek(&mut self) -> char {
        self.chars.peek().copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn take(&mut self, expected: char) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }
}

fn err(line: u32, kind: LexicalError) -> CompileError {
    CompileError::new(line, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use TokenKind::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lines(src: &str) -> Vec<(TokenKind, u32)> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.line))
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        Identifier(name.into())
    }

    macro_rules! cases {
        ($($name:ident : $src:expr => [$($kind:expr),* $(,)?];)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(kinds($src), vec![$($kind,)* Eof]);
                }
            )*
        };
    }

    cases! {
        keywords:
            "async dasync for if else while var fun main return true false"
            => [Async, Dasync, For, If, Else, While, Var, Fun, Main, Return, True, False];
        type_keywords:
            "int float double bool char string url void"
            => [Int, Float, Double, Bool, Char, Str, Url, Void];
        keywords_are_case_sensitive:
            "If WHILE Async"
            => [ident("If"), ident("WHILE"), ident("Async")];
        identifiers:
            "foo _bar f2 intx"
            => [ident("foo"), ident("_bar"), ident("f2"), ident("intx")];
        operators:
            "+ - * / += -= *= /= ++ -- == != < <= > >= && || ! ="
            => [Plus, Minus, Star, Slash, PlusAssign, MinusAssign, StarAssign,
                SlashAssign, Incr, Decr, EqEq, NotEq, Less, LessEq, Greater,
                GreaterEq, AndAnd, OrOr, Not, Assign];
        punctuation:
            "; , ( ) { }"
            => [Semicolon, Comma, LParen, RParen, LBrace, RBrace];
        int_literals:
            "0 42 1024"
            => [IntLit(0), IntLit(42), IntLit(1024)];
        double_literals:
            "3.14 .5 0.0"
            => [DoubleLit(3.14), DoubleLit(0.5), DoubleLit(0.0)];
        float_literals:
            "2.5f 7f .25f"
            => [FloatLit(2.5), FloatLit(7.0), FloatLit(0.25)];
        char_and_string_literals:
            r#"'a' 'z' "" "hello world""#
            => [CharLit('a'), CharLit('z'), StrLit(String::new()),
                StrLit("hello world".into())];
        adjacent_operators_split_greedily:
            "a+++b a<=b==c"
            => [ident("a"), Incr, Plus, ident("b"),
                ident("a"), LessEq, ident("b"), EqEq, ident("c")];
        comments_are_skipped:
            "var // trailing\n/* inline */ x /* multi\nline */ ;"
            => [Var, ident("x"), Semicolon];
        empty_source:
            "" => [];
    }

    #[test]
    fn tracks_lines_across_comments_and_newlines() {
        let src = indoc! {"
            var x // one
            /* two
               spans */ y
            ;
        "};
        assert_eq!(
            lines(src),
            vec![
                (Var, 1),
                (ident("x"), 1),
                (ident("y"), 3),
                (Semicolon, 4),
                (Eof, 5),
            ]
        );
    }

    macro_rules! error_cases {
        ($($name:ident : $src:expr => ($line:expr, $kind:expr);)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(
                        tokenize($src).unwrap_err(),
                        CompileError::new($line, $kind)
                    );
                }
            )*
        };
    }

    error_cases! {
        invalid_character: "var @" => (1, LexicalError::InvalidCharacter('@'));
        lone_ampersand: "a & b" => (1, LexicalError::InvalidCharacter('&'));
        lone_pipe: "a | b" => (1, LexicalError::InvalidCharacter('|'));
        lone_point: "x = . ;" => (1, LexicalError::InvalidCharacter('.'));
        unterminated_string: "\"abc" => (1, LexicalError::UnterminatedString);
        newline_in_string: "\"ab\nc\"" => (1, LexicalError::UnterminatedString);
        unterminated_comment: "x /* y" => (1, LexicalError::UnterminatedComment);
        empty_char: "''" => (1, LexicalError::InvalidCharLiteral);
        overlong_char: "'ab'" => (1, LexicalError::InvalidCharLiteral);
        double_point: "1.2.3" => (1, LexicalError::DuplicatedPoint);
        double_suffix: "1ff" => (1, LexicalError::DuplicatedFloatSuffix);
        digit_after_suffix: "1f2" => (1, LexicalError::MalformedNumber("1f2".into()));
        letter_in_number: "\n12ab" => (2, LexicalError::MalformedNumber("12a".into()));
        error_line_is_reported: "var x\n  '" => (2, LexicalError::InvalidCharLiteral);
    }
}
