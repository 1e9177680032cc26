use std::fmt;
use std::io;

use super::ast::*;
use super::write_separated;

const INDENT: &str = "    ";

fn do_indent<W: io::Write>(w: &mut W, indent: i32) -> io::Result<()> {
    for _ in 0..indent {
        write!(w, "{INDENT}")?;
    }
    Ok(())
}

/// Writes `prog` back out as a listing that [`super::parse`] accepts.
pub fn write<W: io::Write>(mut w: W, prog: &Program) -> io::Result<()> {
    write_decls(&mut w, prog)?;
    for g in &prog.groupings {
        writeln!(w, "(grouping {} {})", g.name, Lit(&g.grouping.members().collect::<Vec<_>>()))?;
    }
    for r in &prog.routines {
        let head = if r.external { "external" } else { "routine" };
        write!(w, "({head} {}", r.name)?;
        if r.mode == Mode::Backward {
            write!(w, " backward")?;
        }
        writeln!(w)?;
        do_indent(&mut w, 1)?;
        write_command(&mut w, prog, &r.body, 1)?;
        writeln!(w, ")")?;
    }
    Ok(())
}

fn write_decls<W: io::Write>(w: &mut W, prog: &Program) -> io::Result<()> {
    let kinds = [(NameKind::Integer, "integers"), (NameKind::Boolean, "booleans"), (NameKind::String, "strings")];
    for (kind, head) in kinds {
        for (live, prefix) in [(true, ""), (false, "unused ")] {
            let names: Vec<_> = prog
                .names
                .iter()
                .filter(|n| n.kind == kind && n.slot.is_some() == live)
                .map(|n| n.name.as_str())
                .collect();
            if !names.is_empty() {
                write!(w, "({prefix}{head} ")?;
                write_separated(&mut IoFmt(&mut *w), " ", names).map_err(|_| io::Error::other("formatting failed"))?;
                writeln!(w, ")")?;
            }
        }
    }
    Ok(())
}

/// Lets the `fmt::Write` helpers target an `io::Write`.
struct IoFmt<'w, W: io::Write>(&'w mut W);

impl<W: io::Write> fmt::Write for IoFmt<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

fn write_block<W: io::Write>(w: &mut W, prog: &Program, head: &str, block: &[Node<Command>], indent: i32) -> io::Result<()> {
    write!(w, "({head}")?;
    for c in block {
        writeln!(w)?;
        do_indent(w, indent + 1)?;
        write_command(w, prog, c, indent + 1)?;
    }
    write!(w, ")")
}

fn write_command<W: io::Write>(w: &mut W, prog: &Program, c: &Command, indent: i32) -> io::Result<()> {
    match c {
        Command::Repeat(b) => write_unary(w, prog, "repeat", b, indent)?,
        Command::Loop(n, b) => write_unary(w, prog, &format!("loop {}", n.t), b, indent)?,
        Command::AtLeast(n, b) => write_unary(w, prog, &format!("atleast {}", n.t), b, indent)?,
        Command::Or(b) => write_block(w, prog, "or", b, indent)?,
        Command::And(b) => write_block(w, prog, "and", b, indent)?,
        Command::Bra(b) => write_block(w, prog, "bra", b, indent)?,
        Command::LeftSlice(_) => write!(w, "([)")?,
        Command::RightSlice(_) => write!(w, "(])")?,
        Command::Literal(_, Text::Lit(s)) => write!(w, "{}", Lit(s))?,
        Command::Literal(_, t @ Text::Var(_)) => write!(w, "(lit {t})")?,
        Command::SliceFrom(t) => write!(w, "(<- {t})")?,
        Command::SliceTo(v) => write!(w, "(-> {})", v.name)?,
        Command::Delete => write!(w, "(delete)")?,
        Command::Insert(t) => write!(w, "(insert {t})")?,
        Command::True => write!(w, "(true)")?,
        Command::False => write!(w, "(false)")?,
        Command::MathAssign(v, e) => write!(w, "($ {} {})", v.name, e.t)?,
        Command::Compare(cmp, a, b) => write!(w, "({cmp} {} {})", a.t, b.t)?,
        Command::Call(id) => write!(w, "(call {})", prog.routine(*id).name)?,
        Command::Substring(..) => write!(w, "(substring)")?,
        Command::Among(id) => write_among(w, prog, prog.among(*id), indent)?,
        Command::AtLimit(_) => write!(w, "(atlimit)")?,
        Command::ToLimit(_) => write!(w, "(tolimit)")?,
        Command::AtMark(e) => write!(w, "(atmark {})", e.t)?,
        Command::ToMark(_, e) => write!(w, "(tomark {})", e.t)?,
        Command::Not(b) => write_unary(w, prog, "not", b, indent)?,
        Command::Try(b) => write_unary(w, prog, "try", b, indent)?,
        Command::Do(b) => write_unary(w, prog, "do", b, indent)?,
        Command::Test(b) => write_unary(w, prog, "test", b, indent)?,
        Command::Fail(b) => write_unary(w, prog, "fail", b, indent)?,
        Command::Hop(_, e) => write!(w, "(hop {})", e.t)?,
        Command::Next(_) => write!(w, "(next)")?,
        Command::Set(v) => write!(w, "(set {})", v.name)?,
        Command::Unset(v) => write!(w, "(unset {})", v.name)?,
        Command::BoolTest(v) => write!(w, "(? {})", v.name)?,
        Command::Grouping(_, id) => write!(w, "(grouping {})", prog.groupings[id.ix()].name)?,
        Command::Non(_, id) => write!(w, "(non {})", prog.groupings[id.ix()].name)?,
        Command::Goto(_, b) => write_unary(w, prog, "goto", b, indent)?,
        Command::GoPast(_, b) => write_unary(w, prog, "gopast", b, indent)?,
        Command::SetMark(v) => write!(w, "(setmark {})", v.name)?,
        Command::Backwards(b) => write_unary(w, prog, "backwards", b, indent)?,
        Command::SetLimit(a, b) => {
            write!(w, "(setlimit ")?;
            write_command(w, prog, a, indent)?;
            write!(w, " ")?;
            write_command(w, prog, b, indent)?;
            write!(w, ")")?;
        }
        Command::Reverse(b) => write_unary(w, prog, "reverse", b, indent)?,
    }
    Ok(())
}

fn write_unary<W: io::Write>(w: &mut W, prog: &Program, head: &str, body: &Command, indent: i32) -> io::Result<()> {
    write!(w, "({head} ")?;
    write_command(w, prog, body, indent)?;
    write!(w, ")")
}

fn write_among<W: io::Write>(w: &mut W, prog: &Program, x: &Among, indent: i32) -> io::Result<()> {
    write!(w, "(among")?;
    if let Some(starter) = &x.starter {
        writeln!(w)?;
        do_indent(w, indent + 1)?;
        write!(w, "(starter ")?;
        write_command(w, prog, starter, indent + 1)?;
        write!(w, ")")?;
    }
    for (ix, cmd) in x.commands.iter().enumerate() {
        writeln!(w)?;
        do_indent(w, indent + 1)?;
        let strings = x.entries.iter().filter(|e| e.outcome == ix + 1).map(|e| Lit(&e.bytes));
        write!(w, "(")?;
        write_separated(&mut IoFmt(&mut *w), " ", strings).map_err(|_| io::Error::other("formatting failed"))?;
        write!(w, ")")?;
        if let Some(cmd) = cmd {
            write!(w, " ")?;
            write_command(w, prog, cmd, indent + 1)?;
        }
    }
    write!(w, ")")
}

/// A string literal, escaped for the listing.
struct Lit<'a>(&'a [u8]);

impl fmt::Display for Lit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for &b in self.0 {
            match b {
                b'"' => write!(f, "\\\"")?,
                b'\\' => write!(f, "\\\\")?,
                b'\n' => write!(f, "\\n")?,
                b'\t' => write!(f, "\\t")?,
                0x20..=0x7e => write!(f, "{}", b as char)?,
                _ => write!(f, "\\x{b:02x}")?,
            }
        }
        write!(f, "\"")
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Text::Lit(s) => write!(f, "{}", Lit(s)),
            Text::Var(v) => write!(f, "{}", v.name),
        }
    }
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cmp::Eq => "==",
            Cmp::Ne => "!=",
            Cmp::Gr => ">",
            Cmp::Ge => ">=",
            Cmp::Ls => "<",
            Cmp::Le => "<=",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Ae {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ae::Number(n) => write!(f, "{n}"),
            Ae::Var(v) => write!(f, "{}", v.name),
            Ae::Limit => write!(f, "limit"),
            Ae::Cursor => write!(f, "cursor"),
            Ae::Size => write!(f, "size"),
            Ae::MaxInt => write!(f, "maxint"),
            Ae::MinInt => write!(f, "minint"),
            Ae::Neg(e) => write!(f, "(neg {})", e.t),
            Ae::Bop(op, a, b) => {
                let op = match op {
                    Binop::Plus => "+",
                    Binop::Minus => "-",
                    Binop::Multiply => "*",
                    Binop::Divide => "/",
                };
                write!(f, "({op} {} {})", a.t, b.t)
            }
        }
    }
}
