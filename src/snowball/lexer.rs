use std::collections::HashMap;
use std::iter::Peekable;
use std::str::CharIndices;

use once_cell::sync::Lazy;

use super::ParseError;

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("integers", TokenKind::Integers);
    m.insert("booleans", TokenKind::Booleans);
    m.insert("strings", TokenKind::Strings);
    m.insert("unused", TokenKind::Unused);
    m.insert("routine", TokenKind::Routine);
    m.insert("external", TokenKind::External);
    m.insert("backward", TokenKind::Backward);
    m.insert("grouping", TokenKind::Grouping);
    m.insert("repeat", TokenKind::Repeat);
    m.insert("loop", TokenKind::Loop);
    m.insert("atleast", TokenKind::AtLeast);
    m.insert("or", TokenKind::Or);
    m.insert("and", TokenKind::And);
    m.insert("bra", TokenKind::Bra);
    m.insert("[", TokenKind::LeftSlice);
    m.insert("]", TokenKind::RightSlice);
    m.insert("lit", TokenKind::Lit);
    m.insert("<-", TokenKind::SliceFrom);
    m.insert("->", TokenKind::SliceTo);
    m.insert("delete", TokenKind::Delete);
    m.insert("insert", TokenKind::Insert);
    m.insert("true", TokenKind::True);
    m.insert("false", TokenKind::False);
    m.insert("$", TokenKind::Dollar);
    m.insert("==", TokenKind::EqEq);
    m.insert("!=", TokenKind::BangEq);
    m.insert(">", TokenKind::Gt);
    m.insert(">=", TokenKind::GtEq);
    m.insert("<", TokenKind::Lt);
    m.insert("<=", TokenKind::LtEq);
    m.insert("call", TokenKind::Call);
    m.insert("substring", TokenKind::Substring);
    m.insert("among", TokenKind::Among);
    m.insert("starter", TokenKind::Starter);
    m.insert("atlimit", TokenKind::AtLimit);
    m.insert("tolimit", TokenKind::ToLimit);
    m.insert("atmark", TokenKind::AtMark);
    m.insert("tomark", TokenKind::ToMark);
    m.insert("not", TokenKind::Not);
    m.insert("try", TokenKind::Try);
    m.insert("do", TokenKind::Do);
    m.insert("test", TokenKind::Test);
    m.insert("fail", TokenKind::Fail);
    m.insert("hop", TokenKind::Hop);
    m.insert("next", TokenKind::Next);
    m.insert("set", TokenKind::Set);
    m.insert("unset", TokenKind::Unset);
    m.insert("?", TokenKind::Question);
    m.insert("non", TokenKind::Non);
    m.insert("goto", TokenKind::Goto);
    m.insert("gopast", TokenKind::GoPast);
    m.insert("setmark", TokenKind::SetMark);
    m.insert("backwards", TokenKind::Backwards);
    m.insert("setlimit", TokenKind::SetLimit);
    m.insert("reverse", TokenKind::Reverse);
    m.insert("limit", TokenKind::Limit);
    m.insert("cursor", TokenKind::Cursor);
    m.insert("size", TokenKind::Size);
    m.insert("maxint", TokenKind::MaxInt);
    m.insert("minint", TokenKind::MinInt);
    m.insert("neg", TokenKind::Neg);
    m.insert("+", TokenKind::Plus);
    m.insert("-", TokenKind::Minus);
    m.insert("*", TokenKind::Star);
    m.insert("/", TokenKind::Slash);
    m
});

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub line: usize,
    pub kind: TokenKind,
    pub data: TokenData,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum TokenKind {
    /// (
    LParen,
    /// )
    RParen,
    /// -?[0-9]+
    IntLit,
    /// a " delimited string
    String,
    /// a name
    Ident,
    /// integers
    Integers,
    /// booleans
    Booleans,
    /// strings
    Strings,
    /// unused
    Unused,
    /// routine
    Routine,
    /// external
    External,
    /// backward
    Backward,
    /// grouping
    Grouping,
    /// repeat
    Repeat,
    /// loop
    Loop,
    /// atleast
    AtLeast,
    /// or
    Or,
    /// and
    And,
    /// bra
    Bra,
    /// [
    LeftSlice,
    /// ]
    RightSlice,
    /// lit
    Lit,
    /// <-
    SliceFrom,
    /// ->
    SliceTo,
    /// delete
    Delete,
    /// insert
    Insert,
    /// true
    True,
    /// false
    False,
    /// $
    Dollar,
    /// ==
    EqEq,
    /// !=
    BangEq,
    /// >
    Gt,
    /// >=
    GtEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// call
    Call,
    /// substring
    Substring,
    /// among
    Among,
    /// starter
    Starter,
    /// atlimit
    AtLimit,
    /// tolimit
    ToLimit,
    /// atmark
    AtMark,
    /// tomark
    ToMark,
    /// not
    Not,
    /// try
    Try,
    /// do
    Do,
    /// test
    Test,
    /// fail
    Fail,
    /// hop
    Hop,
    /// next
    Next,
    /// set
    Set,
    /// unset
    Unset,
    /// ?
    Question,
    /// non
    Non,
    /// goto
    Goto,
    /// gopast
    GoPast,
    /// setmark
    SetMark,
    /// backwards
    Backwards,
    /// setlimit
    SetLimit,
    /// reverse
    Reverse,
    /// limit
    Limit,
    /// cursor
    Cursor,
    /// size
    Size,
    /// maxint
    MaxInt,
    /// minint
    MinInt,
    /// neg
    Neg,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenData {
    Int(i64),
    Bytes(Vec<u8>),
    String(String),
    None,
}

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | ';')
}

pub struct Lexer<'input> {
    input: &'input str,
    line: usize,
    chars: Peekable<CharIndices<'input>>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            line: 1,
            chars: input.char_indices().peekable(),
        }
    }

    fn error<T>(&self, msg: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError::new(self.line, msg))
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        self.chars.next();
        Token { line: self.line, kind, data: TokenData::None }
    }

    fn atom(&mut self) -> Result<Token, ParseError> {
        let Some((start, _)) = self.chars.next() else {
            return self.error("unexpected end of input");
        };
        let mut end = self.input.len();
        while let Some(&(i, c)) = self.chars.peek() {
            if !is_atom_char(c) {
                end = i;
                break;
            }
            self.chars.next();
        }
        let s = &self.input[start..end];

        if let Some(kind) = KEYWORDS.get(s) {
            return Ok(Token { line: self.line, kind: *kind, data: TokenData::None });
        }

        let digits = s.strip_prefix('-').unwrap_or(s);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let Ok(n) = s.parse::<i64>() else {
                return self.error(format!("integer literal {s} out of range"));
            };
            return Ok(Token { line: self.line, kind: TokenKind::IntLit, data: TokenData::Int(n) });
        }

        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return self.error(format!("unexpected `{s}`"));
        }
        Ok(Token { line: self.line, kind: TokenKind::Ident, data: TokenData::String(s.to_string()) })
    }

    fn hex_digit(&mut self) -> Result<u8, ParseError> {
        match self.chars.next().and_then(|(_, c)| c.to_digit(16)) {
            Some(d) => Ok(d as u8),
            None => self.error("expected a hex digit in \\x escape"),
        }
    }

    fn string(&mut self) -> Result<Token, ParseError> {
        self.chars.next();
        let line = self.line;
        let mut out = Vec::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(ParseError::new(line, "unclosed string literal"));
            };
            match c {
                '"' => break,
                '\n' => {
                    self.line += 1;
                    out.push(b'\n');
                }
                '\\' => {
                    let escaped = match self.chars.next().map(|(_, c)| c) {
                        Some('n') => b'\n',
                        Some('t') => b'\t',
                        Some('\\') => b'\\',
                        Some('"') => b'"',
                        Some('x') => {
                            let hi = self.hex_digit()?;
                            let lo = self.hex_digit()?;
                            hi << 4 | lo
                        }
                        Some(c) => return self.error(format!("unrecognized escape character: '{c}'")),
                        None => return Err(ParseError::new(line, "unclosed string literal")),
                    };
                    out.push(escaped);
                }
                c => {
                    let mut buf = [0; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        Ok(Token { line, kind: TokenKind::String, data: TokenData::Bytes(out) })
    }

    pub fn lex(&mut self) -> Result<Option<Token>, ParseError> {
        loop {
            let token = match self.chars.peek().map(|&(_, c)| c) {
                Some('\n') => {
                    self.chars.next();
                    self.line += 1;
                    continue;
                }
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                    continue;
                }
                Some(';') => {
                    while self.chars.next_if(|&(_, c)| c != '\n').is_some() {}
                    continue;
                }
                Some('(') => self.single(TokenKind::LParen),
                Some(')') => self.single(TokenKind::RParen),
                Some('"') => self.string()?,
                Some(_) => self.atom()?,
                None => return Ok(None),
            };

            return Ok(Some(token));
        }
    }

    /// Lexes everything, ending with an [`TokenKind::Eof`] token.
    pub fn lex_all(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(t) = self.lex()? {
            tokens.push(t);
        }
        tokens.push(Token { line: self.line, kind: TokenKind::Eof, data: TokenData::None });
        Ok(tokens)
    }
}
