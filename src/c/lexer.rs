//! A single-pass lexer for the handful of C we parse: type names and member
//! designators.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TokenKind {
    Eof,
    Void,
    Char,
    Short,
    Int,
    Long,
    Signed,
    Unsigned,
    Bool,
    Float,
    Double,
    Complex,
    Const,
    Restrict,
    Volatile,
    Atomic,
    Struct,
    Union,
    Enum,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Asterisk,
    Dot,
    Number,
    Identifier,
}

impl TokenKind {
    pub fn is_specifier(self) -> bool {
        matches!(
            self,
            TokenKind::Void
                | TokenKind::Char
                | TokenKind::Short
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Signed
                | TokenKind::Unsigned
                | TokenKind::Bool
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Complex
        )
    }

    pub fn is_qualifier(self) -> bool {
        matches!(
            self,
            TokenKind::Const | TokenKind::Restrict | TokenKind::Volatile | TokenKind::Atomic
        )
    }

    pub fn spelling(self) -> &'static str {
        match self {
            TokenKind::Eof => "<end of input>",
            TokenKind::Void => "void",
            TokenKind::Char => "char",
            TokenKind::Short => "short",
            TokenKind::Int => "int",
            TokenKind::Long => "long",
            TokenKind::Signed => "signed",
            TokenKind::Unsigned => "unsigned",
            TokenKind::Bool => "_Bool",
            TokenKind::Float => "float",
            TokenKind::Double => "double",
            TokenKind::Complex => "_Complex",
            TokenKind::Const => "const",
            TokenKind::Restrict => "restrict",
            TokenKind::Volatile => "volatile",
            TokenKind::Atomic => "_Atomic",
            TokenKind::Struct => "struct",
            TokenKind::Union => "union",
            TokenKind::Enum => "enum",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Asterisk => "*",
            TokenKind::Dot => ".",
            TokenKind::Number => "<number>",
            TokenKind::Identifier => "<identifier>",
        }
    }
}

/// Built once for the process.
static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    [
        TokenKind::Void,
        TokenKind::Char,
        TokenKind::Short,
        TokenKind::Int,
        TokenKind::Long,
        TokenKind::Signed,
        TokenKind::Unsigned,
        TokenKind::Bool,
        TokenKind::Float,
        TokenKind::Double,
        TokenKind::Complex,
        TokenKind::Const,
        TokenKind::Restrict,
        TokenKind::Volatile,
        TokenKind::Atomic,
        TokenKind::Struct,
        TokenKind::Union,
        TokenKind::Enum,
    ]
    .into_iter()
    .map(|kind| (kind.spelling(), kind))
    .collect()
});

#[derive(Debug, Clone, Copy)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

pub(crate) struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    pushed: Vec<Token<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            input,
            pos: 0,
            pushed: Vec::new(),
        }
    }

    pub fn pop(&mut self) -> Result<Token<'a>> {
        if let Some(token) = self.pushed.pop() {
            return Ok(token);
        }
        self.lex()
    }

    pub fn push(&mut self, token: Token<'a>) {
        self.pushed.push(token);
    }

    pub fn peek(&mut self) -> Result<Token<'a>> {
        let token = self.pop()?;
        self.push(token);
        Ok(token)
    }

    fn lex(&mut self) -> Result<Token<'a>> {
        let bytes = self.input.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        let start = self.pos;
        let Some(&byte) = bytes.get(self.pos) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: "",
            });
        };

        let kind = match byte {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'*' => TokenKind::Asterisk,
            b'.' => TokenKind::Dot,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                while self
                    .pos
                    .checked_add(1)
                    .and_then(|next| bytes.get(next))
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
                {
                    self.pos += 1;
                }
                let text = &self.input[start..=self.pos];
                self.pos += 1;
                return Ok(Token {
                    kind: KEYWORDS
                        .get(text)
                        .copied()
                        .unwrap_or(TokenKind::Identifier),
                    text,
                });
            }
            b'0'..=b'9' => {
                self.pos += 1;
                if byte == b'0' && bytes.get(self.pos) == Some(&b'x') {
                    self.pos += 1;
                    while bytes
                        .get(self.pos)
                        .is_some_and(|b| b.is_ascii_hexdigit())
                    {
                        self.pos += 1;
                    }
                    if self.pos - start <= 2 {
                        return Err(Error::Syntax("invalid number".into()));
                    }
                } else {
                    while bytes.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
                        self.pos += 1;
                    }
                }
                if bytes
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
                {
                    return Err(Error::Syntax("invalid number".into()));
                }
                return Ok(Token {
                    kind: TokenKind::Number,
                    text: &self.input[start..self.pos],
                });
            }
            byte => {
                return Err(Error::Syntax(format!(
                    "invalid character \\x{byte:02x}"
                )))
            }
        };
        self.pos += 1;
        Ok(Token {
            kind,
            text: &self.input[start..self.pos],
        })
    }
}

/// Converts a number token with overflow checking. Handles decimal, octal,
/// and hexadecimal.
pub(crate) fn token_to_u64(token: &Token<'_>) -> Result<u64> {
    debug_assert_eq!(token.kind, TokenKind::Number);
    let text = token.text;
    let overflow = || Error::InvalidArgument("number is too large".into());
    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x") {
        (hex, 16)
    } else if text != "0" && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    let mut value: u64 = 0;
    for c in digits.chars() {
        let digit = c
            .to_digit(radix)
            .ok_or_else(|| Error::Syntax(format!("invalid digit '{c}'")))?;
        value = value
            .checked_mul(u64::from(radix))
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(overflow)?;
    }
    Ok(value)
}
