use std::collections::HashMap;
use std::ops::Deref;

use crate::runtime::{AmongEntry, Counts, Grouping, Symbol};

pub type Ident = String;

/// A value tagged with the source line it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Node<T> {
    pub t: T,
    pub line: usize,
}

impl<T> Node<T> {
    pub fn new(t: T, line: usize) -> Self {
        Self { t, line }
    }
}

impl<T> Deref for Node<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.t
    }
}

/// Scan direction, fixed per node when the tree is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct RoutineId(u32);

impl RoutineId {
    pub fn ix(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for RoutineId {
    fn from(value: usize) -> Self {
        RoutineId(value as u32)
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct GroupingId(u32);

impl GroupingId {
    pub fn ix(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for GroupingId {
    fn from(value: usize) -> Self {
        GroupingId(value as u32)
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct AmongId(u32);

impl AmongId {
    pub fn ix(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for AmongId {
    fn from(value: usize) -> Self {
        AmongId(value as u32)
    }
}

/// A resolved variable reference. `slot` is `None` when the variable was optimised out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarRef {
    pub name: Ident,
    pub slot: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binop {
    Plus,
    Minus,
    Multiply,
    Divide,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Ne,
    Gr,
    Ge,
    Ls,
    Le,
}

/// Arithmetic expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum Ae {
    Number(i64),
    Var(VarRef),
    Limit,
    // The rest are recognised but not evaluated.
    Cursor,
    Size,
    MaxInt,
    MinInt,
    Neg(Box<Node<Ae>>),
    Bop(Binop, Box<Node<Ae>>, Box<Node<Ae>>),
}

impl Ae {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Ae::Number(_) => "number",
            Ae::Var(_) => "name",
            Ae::Limit => "limit",
            Ae::Cursor => "cursor",
            Ae::Size => "size",
            Ae::MaxInt => "maxint",
            Ae::MinInt => "minint",
            Ae::Neg(_) => "neg",
            Ae::Bop(Binop::Plus, ..) => "plus",
            Ae::Bop(Binop::Minus, ..) => "minus",
            Ae::Bop(Binop::Multiply, ..) => "multiply",
            Ae::Bop(Binop::Divide, ..) => "divide",
        }
    }
}

/// Text a command matches or writes: a literal, or the contents of a string variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Text {
    Lit(Vec<Symbol>),
    Var(VarRef),
}

pub type Block = Vec<Node<Command>>;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Repeat(Box<Node<Command>>),
    Loop(Node<Ae>, Box<Node<Command>>),
    AtLeast(Node<Ae>, Box<Node<Command>>),
    Or(Block),
    And(Block),
    /// Plain sequence.
    Bra(Block),
    LeftSlice(Mode),
    RightSlice(Mode),
    Literal(Mode, Text),
    SliceFrom(Text),
    SliceTo(VarRef),
    Delete,
    Insert(Text),
    True,
    False,
    MathAssign(VarRef, Node<Ae>),
    Compare(Cmp, Node<Ae>, Node<Ae>),
    Call(RoutineId),
    Substring(Mode, AmongId),
    Among(AmongId),
    AtLimit(Mode),
    ToLimit(Mode),
    AtMark(Node<Ae>),
    ToMark(Mode, Node<Ae>),
    Not(Box<Node<Command>>),
    Try(Box<Node<Command>>),
    Do(Box<Node<Command>>),
    Test(Box<Node<Command>>),
    Fail(Box<Node<Command>>),
    Hop(Mode, Node<Ae>),
    Next(Mode),
    Set(VarRef),
    Unset(VarRef),
    BoolTest(VarRef),
    Grouping(Mode, GroupingId),
    Non(Mode, GroupingId),
    Goto(Mode, Box<Node<Command>>),
    GoPast(Mode, Box<Node<Command>>),
    SetMark(VarRef),
    Backwards(Box<Node<Command>>),
    /// Recognised and printed, but the evaluator reports it as unsupported.
    SetLimit(Box<Node<Command>>, Box<Node<Command>>),
    /// Recognised and printed, but the evaluator reports it as unsupported.
    /// The body is tagged with the opposite mode.
    Reverse(Box<Node<Command>>),
}

impl Command {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Command::Repeat(_) => "repeat",
            Command::Loop(..) => "loop",
            Command::AtLeast(..) => "atleast",
            Command::Or(_) => "or",
            Command::And(_) => "and",
            Command::Bra(_) => "bra",
            Command::LeftSlice(_) => "leftslice",
            Command::RightSlice(_) => "rightslice",
            Command::Literal(..) => "literalstring",
            Command::SliceFrom(_) => "slicefrom",
            Command::SliceTo(_) => "sliceto",
            Command::Delete => "delete",
            Command::Insert(_) => "insert",
            Command::True => "true",
            Command::False => "false",
            Command::MathAssign(..) => "mathassign",
            Command::Compare(Cmp::Eq, ..) => "eq",
            Command::Compare(Cmp::Ne, ..) => "ne",
            Command::Compare(Cmp::Gr, ..) => "gr",
            Command::Compare(Cmp::Ge, ..) => "ge",
            Command::Compare(Cmp::Ls, ..) => "ls",
            Command::Compare(Cmp::Le, ..) => "le",
            Command::Call(_) => "call",
            Command::Substring(..) => "substring",
            Command::Among(_) => "among",
            Command::AtLimit(_) => "atlimit",
            Command::ToLimit(_) => "tolimit",
            Command::AtMark(_) => "atmark",
            Command::ToMark(..) => "tomark",
            Command::Not(_) => "not",
            Command::Try(_) => "try",
            Command::Do(_) => "do",
            Command::Test(_) => "test",
            Command::Fail(_) => "fail",
            Command::Hop(..) => "hop",
            Command::Next(_) => "next",
            Command::Set(_) => "set",
            Command::Unset(_) => "unset",
            Command::BoolTest(_) => "booltest",
            Command::Grouping(..) => "grouping",
            Command::Non(..) => "non",
            Command::Goto(..) => "goto",
            Command::GoPast(..) => "gopast",
            Command::SetMark(_) => "setmark",
            Command::Backwards(_) => "backwards",
            Command::SetLimit(..) => "setlimit",
            Command::Reverse(_) => "reverse",
        }
    }
}

/// An among table together with what runs after it matches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Among {
    pub mode: Mode,
    pub entries: Vec<AmongEntry>,
    pub starter: Option<Node<Command>>,
    /// Indexed by outcome - 1. `None` for strings listed without a command.
    pub commands: Vec<Option<Node<Command>>>,
    /// Set when a separate `substring` command does the search for this among.
    pub substring: bool,
    pub among_var_needed: bool,
    pub line: usize,
}

impl Among {
    pub fn command_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_some()).count()
    }

    pub fn nocommand_count(&self) -> usize {
        self.commands.len() - self.command_count()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Routine {
    pub name: Ident,
    pub mode: Mode,
    pub external: bool,
    pub body: Node<Command>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupingDef {
    pub name: Ident,
    pub grouping: Grouping,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameKind {
    Integer,
    Boolean,
    String,
    Routine,
    External,
    Grouping,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name {
    pub name: Ident,
    pub kind: NameKind,
    /// Register or table index; `None` when optimised out.
    pub slot: Option<usize>,
}

/// Declared names in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameTable {
    pool: Vec<Name>,
    mapping: HashMap<Ident, usize>,
}

impl NameTable {
    /// Adds `name`, returning `false` if it was already declared.
    pub fn insert(&mut self, name: &str, kind: NameKind, slot: Option<usize>) -> bool {
        if self.mapping.contains_key(name) {
            return false;
        }
        self.mapping.insert(name.to_string(), self.pool.len());
        self.pool.push(Name { name: name.to_string(), kind, slot });
        true
    }

    pub fn get(&self, name: &str) -> Option<&Name> {
        self.mapping.get(name).map(|&ix| &self.pool[ix])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Name> {
        self.mapping.get(name).map(|&ix| &mut self.pool[ix])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.pool.iter()
    }

    /// Number of live (not optimised out) names of `kind`; also the next free slot.
    pub fn count(&self, kind: NameKind) -> usize {
        self.pool.iter().filter(|n| n.kind == kind && n.slot.is_some()).count()
    }

    pub fn counts(&self) -> Counts {
        Counts {
            integers: self.count(NameKind::Integer),
            booleans: self.count(NameKind::Boolean),
            strings: self.count(NameKind::String),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub names: NameTable,
    pub routines: Vec<Routine>,
    pub groupings: Vec<GroupingDef>,
    pub amongs: Vec<Among>,
}

impl Program {
    pub fn routine(&self, id: RoutineId) -> &Routine {
        &self.routines[id.ix()]
    }

    pub fn grouping(&self, id: GroupingId) -> &Grouping {
        &self.groupings[id.ix()].grouping
    }

    pub fn among(&self, id: AmongId) -> &Among {
        &self.amongs[id.ix()]
    }

    pub fn external(&self, name: &str) -> Option<&Routine> {
        self.routines.iter().find(|r| r.external && r.name == name)
    }
}
