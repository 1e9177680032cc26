use crate::runtime::{among, Grouping};

use super::ast::*;
use super::lexer::{Lexer, Token, TokenData, TokenKind};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: parse error: {msg}")]
pub struct ParseError {
    pub line: usize,
    pub msg: String,
}

impl ParseError {
    pub fn new(line: usize, msg: impl Into<String>) -> Self {
        Self { line, msg: msg.into() }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

pub fn parse(input: &str) -> ParseResult<Program> {
    let tokens = Lexer::new(input).lex_all()?;
    Parser::new(tokens).program()
}

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    next_token: usize,
    names: NameTable,
    routines: Vec<Option<Routine>>,
    groupings: Vec<GroupingDef>,
    amongs: Vec<Among>,
    /// Among reserved by a `substring` that has not met its `among` yet.
    pending_substring: Option<(AmongId, usize)>,
    /// Every call site with the mode it was made in, checked once all routines are defined.
    calls: Vec<(RoutineId, Mode, usize)>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            next_token: 0,
            names: NameTable::default(),
            routines: Vec::new(),
            groupings: Vec::new(),
            amongs: Vec::new(),
            pending_substring: None,
            calls: Vec::new(),
        }
    }

    fn peek(&self) -> &Token {
        self.peek_n(1)
    }

    fn peek_n(&self, n: usize) -> &Token {
        let ix = (self.next_token + n - 1).min(self.tokens.len() - 1);
        &self.tokens[ix]
    }

    fn consume(&mut self) -> Token {
        let t = self.peek().clone();
        if t.kind != TokenKind::Eof {
            self.next_token += 1;
        }
        t
    }

    fn test_next_is(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn assert_next_is(&mut self, kind: TokenKind) -> ParseResult<Token> {
        let t = self.consume();
        if t.kind == kind {
            Ok(t)
        } else {
            Err(ParseError::new(t.line, format!("expected {kind:?}, found {:?}", t.kind)))
        }
    }

    fn ident(&mut self) -> ParseResult<(String, usize)> {
        let t = self.assert_next_is(TokenKind::Ident)?;
        match t.data {
            TokenData::String(s) => Ok((s, t.line)),
            _ => unreachable!("identifier tokens carry their name"),
        }
    }

    fn bytes(&mut self) -> ParseResult<Vec<u8>> {
        let t = self.assert_next_is(TokenKind::String)?;
        match t.data {
            TokenData::Bytes(b) => Ok(b),
            _ => unreachable!("string tokens carry their bytes"),
        }
    }

    pub fn program(mut self) -> ParseResult<Program> {
        while !self.test_next_is(TokenKind::Eof) {
            self.decl()?;
        }

        let mut routines = Vec::with_capacity(self.routines.len());
        for (ix, r) in self.routines.into_iter().enumerate() {
            match r {
                Some(r) => routines.push(r),
                None => {
                    let name = self
                        .names
                        .iter()
                        .find(|n| matches!(n.kind, NameKind::Routine | NameKind::External) && n.slot == Some(ix))
                        .map(|n| n.name.clone())
                        .unwrap_or_default();
                    return Err(ParseError::new(self.tokens.last().map_or(0, |t| t.line), format!("routine `{name}` is called but never defined")));
                }
            }
        }

        for (id, mode, line) in self.calls {
            let r = &routines[id.ix()];
            if r.mode != mode {
                let (want, have) = match mode {
                    Mode::Forward => ("forward", "backward"),
                    Mode::Backward => ("backward", "forward"),
                };
                return Err(ParseError::new(line, format!("{have} routine `{}` called in {want} mode", r.name)));
            }
        }

        Ok(Program {
            names: self.names,
            routines,
            groupings: self.groupings,
            amongs: self.amongs,
        })
    }

    fn decl(&mut self) -> ParseResult<()> {
        self.assert_next_is(TokenKind::LParen)?;
        let t = self.consume();
        match t.kind {
            TokenKind::Integers => self.vars(NameKind::Integer, true)?,
            TokenKind::Booleans => self.vars(NameKind::Boolean, true)?,
            TokenKind::Strings => self.vars(NameKind::String, true)?,
            TokenKind::Unused => {
                let t = self.consume();
                let kind = match t.kind {
                    TokenKind::Integers => NameKind::Integer,
                    TokenKind::Booleans => NameKind::Boolean,
                    TokenKind::Strings => NameKind::String,
                    k => return Err(ParseError::new(t.line, format!("expected a variable kind after unused, found {k:?}"))),
                };
                self.vars(kind, false)?;
            }
            TokenKind::Grouping => self.grouping_decl()?,
            TokenKind::Routine => self.routine(false)?,
            TokenKind::External => self.routine(true)?,
            k => return Err(ParseError::new(t.line, format!("expected a declaration, found {k:?}"))),
        }
        self.assert_next_is(TokenKind::RParen)?;
        Ok(())
    }

    fn declare(&mut self, name: &str, line: usize, kind: NameKind, slot: Option<usize>) -> ParseResult<()> {
        if self.names.insert(name, kind, slot) {
            Ok(())
        } else {
            Err(ParseError::new(line, format!("`{name}` is declared twice")))
        }
    }

    fn vars(&mut self, kind: NameKind, used: bool) -> ParseResult<()> {
        while self.test_next_is(TokenKind::Ident) {
            let (name, line) = self.ident()?;
            let slot = used.then(|| self.names.count(kind));
            self.declare(&name, line, kind, slot)?;
        }
        Ok(())
    }

    fn grouping_decl(&mut self) -> ParseResult<()> {
        let (name, line) = self.ident()?;
        let mut grouping = Grouping::new(&[]);
        loop {
            let kind = self.peek().kind;
            let part = match kind {
                TokenKind::String => Grouping::new(&self.bytes()?),
                TokenKind::Ident => {
                    let id = self.grouping_ref()?;
                    self.groupings[id.ix()].grouping.clone()
                }
                _ => break,
            };
            grouping = grouping.union(&part);
        }
        let slot = self.groupings.len();
        self.declare(&name, line, NameKind::Grouping, Some(slot))?;
        self.groupings.push(GroupingDef { name, grouping });
        Ok(())
    }

    /// Looks up a routine, reserving a slot for it if it has not been seen yet.
    fn routine_ref(&mut self, name: &str, line: usize) -> ParseResult<RoutineId> {
        match self.names.get(name) {
            Some(Name { kind: NameKind::Routine | NameKind::External, slot: Some(slot), .. }) => Ok(RoutineId::from(*slot)),
            Some(_) => Err(ParseError::new(line, format!("`{name}` is not a routine"))),
            None => {
                let slot = self.routines.len();
                self.routines.push(None);
                self.declare(name, line, NameKind::Routine, Some(slot))?;
                Ok(RoutineId::from(slot))
            }
        }
    }

    fn routine(&mut self, external: bool) -> ParseResult<()> {
        let (name, line) = self.ident()?;
        let id = self.routine_ref(&name, line)?;
        if self.routines[id.ix()].is_some() {
            return Err(ParseError::new(line, format!("routine `{name}` is defined twice")));
        }
        if external {
            if let Some(n) = self.names.get_mut(&name) {
                n.kind = NameKind::External;
            }
        }
        let mode = if self.test_next_is(TokenKind::Backward) {
            self.consume();
            Mode::Backward
        } else {
            Mode::Forward
        };
        let body = self.command(mode)?;
        if let Some((_, line)) = self.pending_substring.take() {
            return Err(ParseError::new(line, "substring is not followed by an among"));
        }
        self.routines[id.ix()] = Some(Routine { name, mode, external, body });
        Ok(())
    }

    fn var(&mut self, kind: NameKind) -> ParseResult<VarRef> {
        let (name, line) = self.ident()?;
        match self.names.get(&name) {
            Some(n) if n.kind == kind => Ok(VarRef { name, slot: n.slot }),
            Some(n) => Err(ParseError::new(line, format!("`{name}` is a {:?}, expected a {kind:?}", n.kind))),
            None => Err(ParseError::new(line, format!("`{name}` is not declared"))),
        }
    }

    fn grouping_ref(&mut self) -> ParseResult<GroupingId> {
        let (name, line) = self.ident()?;
        match self.names.get(&name) {
            Some(Name { kind: NameKind::Grouping, slot: Some(slot), .. }) => Ok(GroupingId::from(*slot)),
            Some(_) => Err(ParseError::new(line, format!("`{name}` is not a grouping"))),
            None => Err(ParseError::new(line, format!("grouping `{name}` is not declared"))),
        }
    }

    /// A literal string or the name of a string variable.
    fn text(&mut self) -> ParseResult<Text> {
        if self.test_next_is(TokenKind::String) {
            Ok(Text::Lit(self.bytes()?))
        } else {
            Ok(Text::Var(self.var(NameKind::String)?))
        }
    }

    fn ae(&mut self) -> ParseResult<Node<Ae>> {
        if self.test_next_is(TokenKind::Ident) {
            let line = self.peek().line;
            return Ok(Node::new(Ae::Var(self.var(NameKind::Integer)?), line));
        }
        let t = self.consume();
        let line = t.line;
        let ae = match t.kind {
            TokenKind::IntLit => match t.data {
                TokenData::Int(n) => Ae::Number(n),
                _ => unreachable!("integer tokens carry their value"),
            },
            TokenKind::Limit => Ae::Limit,
            TokenKind::Cursor => Ae::Cursor,
            TokenKind::Size => Ae::Size,
            TokenKind::MaxInt => Ae::MaxInt,
            TokenKind::MinInt => Ae::MinInt,
            TokenKind::LParen => {
                let op = self.consume();
                let ae = match op.kind {
                    TokenKind::Neg => Ae::Neg(Box::new(self.ae()?)),
                    TokenKind::Plus => Ae::Bop(Binop::Plus, Box::new(self.ae()?), Box::new(self.ae()?)),
                    TokenKind::Minus => Ae::Bop(Binop::Minus, Box::new(self.ae()?), Box::new(self.ae()?)),
                    TokenKind::Star => Ae::Bop(Binop::Multiply, Box::new(self.ae()?), Box::new(self.ae()?)),
                    TokenKind::Slash => Ae::Bop(Binop::Divide, Box::new(self.ae()?), Box::new(self.ae()?)),
                    k => return Err(ParseError::new(op.line, format!("expected an arithmetic operator, found {k:?}"))),
                };
                self.assert_next_is(TokenKind::RParen)?;
                ae
            }
            k => return Err(ParseError::new(line, format!("expected an arithmetic expression, found {k:?}"))),
        };
        Ok(Node::new(ae, line))
    }

    fn boxed(&mut self, mode: Mode) -> ParseResult<Box<Node<Command>>> {
        Ok(Box::new(self.command(mode)?))
    }

    fn block(&mut self, mode: Mode) -> ParseResult<Block> {
        let mut block = Vec::new();
        while !self.test_next_is(TokenKind::RParen) {
            block.push(self.command(mode)?);
        }
        Ok(block)
    }

    fn command(&mut self, mode: Mode) -> ParseResult<Node<Command>> {
        if self.test_next_is(TokenKind::String) {
            let line = self.peek().line;
            return Ok(Node::new(Command::Literal(mode, Text::Lit(self.bytes()?)), line));
        }

        self.assert_next_is(TokenKind::LParen)?;
        let t = self.consume();
        let line = t.line;
        let command = match t.kind {
            TokenKind::Repeat => Command::Repeat(self.boxed(mode)?),
            TokenKind::Loop => Command::Loop(self.ae()?, self.boxed(mode)?),
            TokenKind::AtLeast => Command::AtLeast(self.ae()?, self.boxed(mode)?),
            TokenKind::Or => Command::Or(self.block(mode)?),
            TokenKind::And => Command::And(self.block(mode)?),
            TokenKind::Bra => Command::Bra(self.block(mode)?),
            TokenKind::LeftSlice => Command::LeftSlice(mode),
            TokenKind::RightSlice => Command::RightSlice(mode),
            TokenKind::Lit => Command::Literal(mode, self.text()?),
            TokenKind::SliceFrom => Command::SliceFrom(self.text()?),
            TokenKind::SliceTo => Command::SliceTo(self.var(NameKind::String)?),
            TokenKind::Delete => Command::Delete,
            TokenKind::Insert => Command::Insert(self.text()?),
            TokenKind::True => Command::True,
            TokenKind::False => Command::False,
            TokenKind::Dollar => Command::MathAssign(self.var(NameKind::Integer)?, self.ae()?),
            TokenKind::EqEq => Command::Compare(Cmp::Eq, self.ae()?, self.ae()?),
            TokenKind::BangEq => Command::Compare(Cmp::Ne, self.ae()?, self.ae()?),
            TokenKind::Gt => Command::Compare(Cmp::Gr, self.ae()?, self.ae()?),
            TokenKind::GtEq => Command::Compare(Cmp::Ge, self.ae()?, self.ae()?),
            TokenKind::Lt => Command::Compare(Cmp::Ls, self.ae()?, self.ae()?),
            TokenKind::LtEq => Command::Compare(Cmp::Le, self.ae()?, self.ae()?),
            TokenKind::Call => {
                let (name, line) = self.ident()?;
                let id = self.routine_ref(&name, line)?;
                self.calls.push((id, mode, line));
                Command::Call(id)
            }
            TokenKind::Substring => {
                if let Some((_, line)) = self.pending_substring {
                    return Err(ParseError::new(line, "substring is not followed by an among"));
                }
                let id = AmongId::from(self.amongs.len());
                self.amongs.push(Among::default());
                self.pending_substring = Some((id, line));
                Command::Substring(mode, id)
            }
            TokenKind::Among => Command::Among(self.among(mode, line)?),
            TokenKind::AtLimit => Command::AtLimit(mode),
            TokenKind::ToLimit => Command::ToLimit(mode),
            TokenKind::AtMark => Command::AtMark(self.ae()?),
            TokenKind::ToMark => Command::ToMark(mode, self.ae()?),
            TokenKind::Not => Command::Not(self.boxed(mode)?),
            TokenKind::Try => Command::Try(self.boxed(mode)?),
            TokenKind::Do => Command::Do(self.boxed(mode)?),
            TokenKind::Test => Command::Test(self.boxed(mode)?),
            TokenKind::Fail => Command::Fail(self.boxed(mode)?),
            TokenKind::Hop => Command::Hop(mode, self.ae()?),
            TokenKind::Next => Command::Next(mode),
            TokenKind::Set => Command::Set(self.var(NameKind::Boolean)?),
            TokenKind::Unset => Command::Unset(self.var(NameKind::Boolean)?),
            TokenKind::Question => Command::BoolTest(self.var(NameKind::Boolean)?),
            TokenKind::Grouping => Command::Grouping(mode, self.grouping_ref()?),
            TokenKind::Non => Command::Non(mode, self.grouping_ref()?),
            TokenKind::Goto => Command::Goto(mode, self.boxed(mode)?),
            TokenKind::GoPast => Command::GoPast(mode, self.boxed(mode)?),
            TokenKind::SetMark => Command::SetMark(self.var(NameKind::Integer)?),
            TokenKind::Backwards => {
                if mode == Mode::Backward {
                    return Err(ParseError::new(line, "backwards inside backward mode"));
                }
                Command::Backwards(self.boxed(Mode::Backward)?)
            }
            TokenKind::SetLimit => Command::SetLimit(self.boxed(mode)?, self.boxed(mode)?),
            TokenKind::Reverse => {
                let mode = match mode {
                    Mode::Forward => Mode::Backward,
                    Mode::Backward => Mode::Forward,
                };
                Command::Reverse(self.boxed(mode)?)
            }
            k => return Err(ParseError::new(line, format!("expected a command, found {k:?}"))),
        };
        self.assert_next_is(TokenKind::RParen)?;
        Ok(Node::new(command, line))
    }

    /// `(among [(starter C)] (S+) [C] (S+) [C] ...)`, after the `among` keyword.
    fn among(&mut self, mode: Mode, line: usize) -> ParseResult<AmongId> {
        let reserved = self.pending_substring.take().map(|(id, _)| id);

        let mut starter = None;
        if self.test_next_is(TokenKind::LParen) && self.peek_n(2).kind == TokenKind::Starter {
            self.consume();
            self.consume();
            starter = Some(self.command(mode)?);
            self.assert_next_is(TokenKind::RParen)?;
        }

        let mut candidates = Vec::new();
        let mut commands: Vec<Option<Node<Command>>> = Vec::new();
        while !self.test_next_is(TokenKind::RParen) {
            if self.test_next_is(TokenKind::LParen) && self.peek_n(2).kind == TokenKind::String {
                self.consume();
                let outcome = commands.len() + 1;
                while self.test_next_is(TokenKind::String) {
                    candidates.push((self.bytes()?, outcome));
                }
                self.assert_next_is(TokenKind::RParen)?;
                commands.push(None);
            } else {
                let cmd_line = self.peek().line;
                let cmd = self.command(mode)?;
                match commands.last_mut() {
                    Some(slot) if slot.is_none() => *slot = Some(cmd),
                    _ => return Err(ParseError::new(cmd_line, "among command must follow a list of strings")),
                }
            }
        }
        if candidates.is_empty() {
            return Err(ParseError::new(line, "among has no strings"));
        }

        let entries = among::build(candidates, mode == Mode::Backward).map_err(|e| ParseError::new(line, e.to_string()))?;
        let x = Among {
            mode,
            entries,
            starter,
            among_var_needed: commands.len() > 1,
            commands,
            substring: reserved.is_some(),
            line,
        };
        match reserved {
            Some(id) => {
                self.amongs[id.ix()] = x;
                Ok(id)
            }
            None => {
                let id = AmongId::from(self.amongs.len());
                self.amongs.push(x);
                Ok(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_allocate_slots() {
        let prog = parse(
            "(integers p1 p2) (unused integers x) (booleans b) (strings s)
             (grouping v \"aeiou\") (grouping vy v \"y\")
             (external stem (true))",
        )
        .unwrap();
        assert_eq!(prog.names.get("p2").unwrap().slot, Some(1));
        assert_eq!(prog.names.get("x").unwrap().slot, None);
        assert_eq!(prog.names.counts(), crate::runtime::Counts { integers: 2, booleans: 1, strings: 1 });
        assert!(prog.groupings[1].grouping.contains(b'y'));
        assert!(prog.groupings[1].grouping.contains(b'e'));
        assert!(prog.external("stem").is_some());
    }

    #[test]
    fn backwards_switches_mode() {
        let prog = parse("(external stem (backwards (bra ([) \"s\" (]) (delete))))").unwrap();
        let Command::Backwards(body) = &prog.routines[0].body.t else { panic!("expected backwards") };
        let Command::Bra(seq) = &body.t else { panic!("expected bra") };
        assert_eq!(seq[0].t, Command::LeftSlice(Mode::Backward));
        assert_eq!(seq[1].t, Command::Literal(Mode::Backward, Text::Lit(b"s".to_vec())));
    }

    #[test]
    fn calls_resolve_forward_references() {
        let prog = parse("(external stem (call helper)) (routine helper (true))").unwrap();
        assert_eq!(prog.routines.len(), 2);
        assert_eq!(prog.routines[0].name, "stem");
        assert_eq!(prog.routines[0].body.t, Command::Call(RoutineId::from(1)));
        assert_eq!(prog.routines[1].name, "helper");
        assert!(!prog.routines[1].external);
    }

    #[test]
    fn calls_must_match_routine_mode() {
        let err = parse("(routine r backward \"a\") (external stem (call r))").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.msg.contains("backward routine `r` called in forward mode"), "{}", err.msg);

        // checked after the routine is defined, so forward references are covered too
        let err = parse("(external stem (backwards (call r)))\n(routine r (true))").unwrap_err();
        assert!(err.msg.contains("forward routine `r` called in backward mode"), "{}", err.msg);

        assert!(parse("(routine r backward \"a\") (external stem (backwards (call r)))").is_ok());
    }

    #[test]
    fn undefined_routine_is_an_error() {
        let err = parse("(external stem (call nowhere))").unwrap_err();
        assert!(err.msg.contains("nowhere"));
    }

    #[test]
    fn substring_links_to_following_among() {
        let prog = parse(
            "(external stem (backwards (bra ([) (substring) (]) (among (\"ed\" \"ing\") (delete) (\"ies\") (<- \"y\")))))",
        )
        .unwrap();
        assert_eq!(prog.amongs.len(), 1);
        let x = &prog.amongs[0];
        assert!(x.substring);
        assert!(x.among_var_needed);
        assert_eq!(x.mode, Mode::Backward);
        assert_eq!(x.command_count(), 2);
        assert_eq!(x.entries.len(), 3);
    }

    #[test]
    fn dangling_substring_is_an_error() {
        assert!(parse("(external stem (substring))").is_err());
    }

    #[test]
    fn among_strings_without_command() {
        let prog = parse("(external stem (among (\"a\") (true) (\"b\")))").unwrap();
        let x = &prog.amongs[0];
        assert!(!x.substring);
        assert_eq!(x.command_count(), 1);
        assert_eq!(x.nocommand_count(), 1);
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let err = parse("(booleans b) (external stem ($ b 1))").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.msg.contains("Boolean"));
    }

    #[test]
    fn duplicate_among_strings_are_rejected() {
        assert!(parse("(external stem (among (\"a\" \"a\")))").is_err());
    }
}
