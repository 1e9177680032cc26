use crate::runtime::{among, grouping, Env, ExecError, Symbol};

use super::ast::{Ae, AmongId, Cmp, Command, Mode, Node, Program, Text, VarRef};

pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Grow the native stack when less than this remains before evaluating a command.
const RED_ZONE: usize = 100 * 1024;

/// Size of each stack segment added when growing.
const STACK_GROWTH: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    /// Deepest nesting of commands (including routine calls) before the run is abandoned.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

/// What a finished run leaves behind.
#[derive(Debug)]
pub struct Outcome {
    pub result: bool,
    pub env: Env,
}

impl Outcome {
    pub fn text(&self) -> &[Symbol] {
        self.env.text()
    }
}

/// Runs the external `stem` routine of `prog` over `word`.
pub fn run(prog: &Program, word: &[Symbol], config: &Config) -> Result<Outcome, ExecError> {
    let Some(stem) = prog.external("stem") else {
        return Err(ExecError::MissingStem);
    };
    let mut env = Env::new(prog.names.counts())?;
    env.load(word)?;
    tracing::debug!(word = %String::from_utf8_lossy(word), "running stem");
    let result = Interp::new(prog, config).command(&mut env, &stem.body)?;
    tracing::debug!(result, text = %env.p, "stem finished");
    Ok(Outcome { result, env })
}

/// Tree-walking evaluator. Borrows the program; all run state lives in the [`Env`].
pub struct Interp<'p> {
    prog: &'p Program,
    max_depth: usize,
    depth: usize,
}

fn slot(v: &VarRef, line: usize) -> Result<usize, ExecError> {
    v.slot.ok_or_else(|| ExecError::OptimisedOut { name: v.name.clone(), line })
}

impl<'p> Interp<'p> {
    pub fn new(prog: &'p Program, config: &Config) -> Self {
        Self {
            prog,
            max_depth: config.max_depth,
            depth: 0,
        }
    }

    pub fn ae(&self, z: &Env, p: &Node<Ae>) -> Result<i64, ExecError> {
        match &p.t {
            Ae::Number(n) => Ok(*n),
            Ae::Var(v) => Ok(z.integers[slot(v, p.line)?]),
            Ae::Limit => Ok(z.l as i64),
            Ae::Cursor | Ae::Size | Ae::MaxInt | Ae::MinInt | Ae::Neg(_) | Ae::Bop(..) => {
                Err(ExecError::Unsupported { kind: p.kind_name(), line: p.line })
            }
        }
    }

    /// Evaluates one command. `Ok(false)` means the pattern failed to match.
    pub fn command(&mut self, z: &mut Env, p: &Node<Command>) -> Result<bool, ExecError> {
        if self.depth >= self.max_depth {
            return Err(ExecError::TooDeep {
                depth: self.depth + 1,
                max_depth: self.max_depth,
                line: p.line,
            });
        }
        self.depth += 1;
        tracing::trace!(line = p.line, kind = p.kind_name(), c = z.c, depth = self.depth, "eval");
        let r = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.eval(z, p));
        self.depth -= 1;
        r
    }

    fn eval(&mut self, z: &mut Env, p: &Node<Command>) -> Result<bool, ExecError> {
        let line = p.line;
        let r = match &p.t {
            Command::Repeat(body) => {
                loop {
                    let c = z.c;
                    if !self.command(z, body)? {
                        z.c = c;
                        break;
                    }
                }
                true
            }
            Command::Loop(n, body) => {
                let n = self.ae(z, n)?;
                for _ in 0..n {
                    if !self.command(z, body)? {
                        return Ok(false);
                    }
                }
                true
            }
            Command::AtLeast(n, body) => {
                let mut n = self.ae(z, n)?;
                loop {
                    let c = z.c;
                    if !self.command(z, body)? {
                        z.c = c;
                        break;
                    }
                    n -= 1;
                }
                n <= 0
            }
            Command::Or(alts) => {
                for alt in alts {
                    let c = z.c;
                    if self.command(z, alt)? {
                        return Ok(true);
                    }
                    z.c = c;
                }
                false
            }
            Command::And(conjs) => {
                for conj in conjs {
                    let c = z.c;
                    if !self.command(z, conj)? {
                        return Ok(false);
                    }
                    z.c = c;
                }
                true
            }
            Command::Bra(seq) => {
                for s in seq {
                    if !self.command(z, s)? {
                        return Ok(false);
                    }
                }
                true
            }
            Command::LeftSlice(Mode::Forward) | Command::RightSlice(Mode::Backward) => {
                z.bra = z.c;
                true
            }
            Command::RightSlice(Mode::Forward) | Command::LeftSlice(Mode::Backward) => {
                z.ket = z.c;
                true
            }
            Command::Literal(mode, Text::Lit(s)) => match mode {
                Mode::Forward => z.eq_s(s),
                Mode::Backward => z.eq_s_b(s),
            },
            Command::Literal(mode, Text::Var(v)) => {
                let ix = slot(v, line)?;
                match mode {
                    Mode::Forward => z.eq_v(ix),
                    Mode::Backward => z.eq_v_b(ix),
                }
            }
            Command::SliceFrom(Text::Lit(s)) => {
                z.slice_from(s)?;
                true
            }
            Command::SliceFrom(Text::Var(v)) => {
                let s = z.strings[slot(v, line)?].clone();
                z.slice_from(s.as_slice())?;
                true
            }
            Command::SliceTo(v) => {
                z.slice_to(slot(v, line)?)?;
                true
            }
            Command::Delete => {
                z.slice_del()?;
                true
            }
            Command::Insert(Text::Lit(s)) => {
                z.insert(z.c, z.c, s)?;
                true
            }
            Command::Insert(Text::Var(v)) => {
                let s = z.strings[slot(v, line)?].clone();
                z.insert(z.c, z.c, s.as_slice())?;
                true
            }
            Command::True => true,
            Command::False => false,
            Command::MathAssign(v, e) => {
                let ix = slot(v, line)?;
                z.integers[ix] = self.ae(z, e)?;
                true
            }
            Command::Compare(cmp, lhs, rhs) => {
                let (a, b) = (self.ae(z, lhs)?, self.ae(z, rhs)?);
                match cmp {
                    Cmp::Eq => a == b,
                    Cmp::Ne => a != b,
                    Cmp::Gr => a > b,
                    Cmp::Ge => a >= b,
                    Cmp::Ls => a < b,
                    Cmp::Le => a <= b,
                }
            }
            Command::Call(id) => {
                let prog = self.prog;
                self.command(z, &prog.routine(*id).body)?
            }
            Command::Substring(mode, id) => {
                let x = self.prog.among(*id);
                let among_var = match mode {
                    Mode::Forward => among::find_among(z, &x.entries),
                    Mode::Backward => among::find_among_b(z, &x.entries),
                };
                if x.among_var_needed {
                    z.among_var = among_var;
                }
                among_var != 0
            }
            Command::Among(id) => self.among(z, p, *id)?,
            Command::AtLimit(Mode::Forward) => z.c >= z.l,
            Command::AtLimit(Mode::Backward) => z.c <= z.lb,
            Command::ToLimit(Mode::Forward) => {
                z.c = z.l;
                true
            }
            Command::ToLimit(Mode::Backward) => {
                z.c = z.lb;
                true
            }
            Command::AtMark(e) => self.ae(z, e)? == z.c as i64,
            Command::ToMark(mode, e) => {
                let mark = self.ae(z, e)?;
                let ok = match mode {
                    Mode::Forward => mark >= z.c as i64 && mark <= z.l as i64,
                    Mode::Backward => mark <= z.c as i64 && mark >= z.lb as i64,
                };
                if ok {
                    z.c = mark as usize;
                }
                ok
            }
            Command::Not(body) => !self.command(z, body)?,
            Command::Try(body) => {
                let c = z.c;
                if !self.command(z, body)? {
                    z.c = c;
                }
                true
            }
            Command::Do(body) => {
                let c = z.c;
                self.command(z, body)?;
                z.c = c;
                true
            }
            Command::Test(body) => {
                let c = z.c;
                let r = self.command(z, body)?;
                z.c = c;
                r
            }
            Command::Fail(body) => {
                self.command(z, body)?;
                false
            }
            Command::Hop(mode, e) => {
                let n = self.ae(z, e)?;
                if n < 0 {
                    return Ok(false);
                }
                let n = n as usize;
                match mode {
                    Mode::Forward if z.ahead() >= n => {
                        z.c += n;
                        true
                    }
                    Mode::Backward if z.behind() >= n => {
                        z.c -= n;
                        true
                    }
                    _ => false,
                }
            }
            Command::Next(Mode::Forward) => {
                if z.c >= z.l {
                    return Ok(false);
                }
                z.c += 1;
                true
            }
            Command::Next(Mode::Backward) => {
                if z.c <= z.lb {
                    return Ok(false);
                }
                z.c -= 1;
                true
            }
            Command::Set(v) => {
                z.booleans[slot(v, line)?] = true;
                true
            }
            // Reports failure, as the reference interpreter does. Only the side effect is relied on.
            Command::Unset(v) => {
                z.booleans[slot(v, line)?] = false;
                false
            }
            Command::BoolTest(v) => z.booleans[slot(v, line)?],
            Command::Grouping(mode, id) => {
                let g = self.prog.grouping(*id);
                let outcome = match mode {
                    Mode::Forward => grouping::in_grouping(z, g, false),
                    Mode::Backward => grouping::in_grouping_b(z, g, false),
                };
                outcome.matched()
            }
            Command::Non(mode, id) => {
                let g = self.prog.grouping(*id);
                let outcome = match mode {
                    Mode::Forward => grouping::out_grouping(z, g, false),
                    Mode::Backward => grouping::out_grouping_b(z, g, false),
                };
                outcome.matched()
            }
            Command::Goto(mode, body) => self.go(z, *mode, body, true)?,
            Command::GoPast(mode, body) => self.go(z, *mode, body, false)?,
            // Same convention as unset.
            Command::SetMark(v) => {
                z.integers[slot(v, line)?] = z.c as i64;
                false
            }
            Command::Backwards(body) => {
                z.lb = z.c;
                z.c = z.l;
                let r = self.command(z, body)?;
                z.c = z.lb;
                r
            }
            Command::SetLimit(..) | Command::Reverse(_) => {
                return Err(ExecError::Unsupported { kind: p.kind_name(), line });
            }
        };
        Ok(r)
    }

    /// Tries `body` at each position from the cursor towards the limit.
    /// `goto` leaves the cursor where the successful attempt started,
    /// `gopast` where it finished.
    fn go(&mut self, z: &mut Env, mode: Mode, body: &Node<Command>, restore: bool) -> Result<bool, ExecError> {
        loop {
            let c = z.c;
            if self.command(z, body)? {
                if restore {
                    z.c = c;
                }
                return Ok(true);
            }
            z.c = c;
            match mode {
                Mode::Forward => {
                    if z.c >= z.l {
                        return Ok(false);
                    }
                    z.c += 1;
                }
                Mode::Backward => {
                    if z.c <= z.lb {
                        return Ok(false);
                    }
                    z.c -= 1;
                }
            }
        }
    }

    fn among(&mut self, z: &mut Env, p: &Node<Command>, id: AmongId) -> Result<bool, ExecError> {
        let x = self.prog.among(id);
        if !x.substring {
            let among_var = match x.mode {
                Mode::Forward => among::find_among(z, &x.entries),
                Mode::Backward => among::find_among_b(z, &x.entries),
            };
            if among_var == 0 {
                return Ok(false);
            }
            z.among_var = among_var;
        }
        if let Some(starter) = &x.starter {
            if !self.command(z, starter)? {
                return Ok(false);
            }
        }
        if x.command_count() == 0 {
            return Ok(true);
        }
        if x.command_count() == 1 && x.nocommand_count() == 0 {
            if let Some(Some(cmd)) = x.commands.first() {
                return self.command(z, cmd);
            }
        }
        match x.commands.get(z.among_var.wrapping_sub(1)) {
            Some(Some(cmd)) => self.command(z, cmd),
            Some(None) => Ok(true),
            None => Err(ExecError::AmongOutcome {
                outcome: z.among_var,
                commands: x.commands.len(),
                line: p.line,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snowball::parse;

    fn run_str(src: &str, word: &str) -> Outcome {
        let prog = parse(src).unwrap();
        run(&prog, word.as_bytes(), &Config::default()).unwrap()
    }

    #[test]
    fn or_restores_cursor_between_alternatives() {
        let r = run_str("(external stem (or (bra \"ab\" \"x\") \"abc\"))", "abcd");
        assert!(r.result);
        assert_eq!(r.env.c, 3);
    }

    #[test]
    fn not_keeps_cursor_moves() {
        let r = run_str("(external stem (not (bra \"a\" \"x\")))", "abc");
        assert!(r.result);
        assert_eq!(r.env.c, 1);
    }

    #[test]
    fn try_test_and_fail() {
        let r = run_str("(external stem (bra (try \"x\") (test \"ab\") \"a\"))", "abc");
        assert!(r.result);
        assert_eq!(r.env.c, 1);

        let r = run_str("(external stem (fail (true)))", "abc");
        assert!(!r.result);
    }

    #[test]
    fn goto_stops_before_and_gopast_after() {
        let r = run_str("(external stem (goto \"m\"))", "stemming");
        assert_eq!(r.env.c, 3);
        let r = run_str("(external stem (gopast \"mm\"))", "stemming");
        assert_eq!(r.env.c, 5);
        let r = run_str("(external stem (gopast \"q\"))", "stemming");
        assert!(!r.result);
    }

    #[test]
    fn backwards_returns_cursor_to_where_it_started() {
        let r = run_str("(external stem (bra (hop 1) (backwards (bra ([) \"ing\" (]) (delete)))))", "sing");
        assert!(r.result);
        assert_eq!(r.text(), b"s");
        assert_eq!((r.env.c, r.env.lb), (1, 1));
    }

    #[test]
    fn backward_scan_cannot_pass_starting_cursor() {
        let r = run_str("(external stem (bra (hop 2) (backwards \"ing\")))", "sing");
        assert!(!r.result);
    }

    #[test]
    fn among_runs_starter_then_command() {
        let src = "(booleans seen)
            (external stem (among (starter (set seen)) (\"ab\" \"abc\") (<- \"X\") (\"b\")))";
        let r = run_str(src, "abcd");
        assert!(r.result);
        assert_eq!(r.env.booleans, vec![true]);
        assert_eq!(r.env.among_var, 1);
        // the bracket still covers the whole word, so the slice replaces it
        assert_eq!(r.text(), b"X");
    }

    #[test]
    fn among_outcome_without_command_succeeds() {
        let src = "(external stem (among (\"a\") (delete) (\"b\")))";
        let r = run_str(src, "bat");
        assert!(r.result);
        assert_eq!(r.text(), b"bat");
        assert_eq!(r.env.c, 1);
        let r = run_str(src, "cat");
        assert!(!r.result);
    }

    #[test]
    fn limits_and_marks() {
        let r = run_str("(integers m) (external stem (bra ($ m 2) (tomark m) (atmark m) (tolimit) (atlimit)))", "abcd");
        assert!(r.result);
        assert_eq!(r.env.c, 4);
        // tomark never moves backwards in forward mode
        let r = run_str("(external stem (bra (hop 3) (tomark 1)))", "abcd");
        assert!(!r.result);
    }

    #[test]
    fn loop_and_atleast_count_successes() {
        let r = run_str("(external stem (loop 3 (next)))", "ab");
        assert!(!r.result);
        let r = run_str("(external stem (atleast 1 (next)))", "ab");
        assert!(r.result);
        assert_eq!(r.env.c, 2);
    }

    #[test]
    fn sliceto_and_string_literal_test() {
        let src = "(strings s) (external stem (bra ([) (hop 2) (]) (-> s) (do (bra (tolimit) (insert s))) (next) (lit s)))";
        let r = run_str(src, "abc");
        assert!(r.result);
        assert_eq!(r.text(), b"abcab");
        assert_eq!(r.env.strings[0].as_slice(), b"ab");
    }

    #[test]
    fn deep_recursion_on_small_thread_reports_depth() {
        let prog = parse("(routine r (call r)) (external stem (call r))").unwrap();
        let config = Config { max_depth: 5000 };
        let err = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || run(&prog, b"x", &config).unwrap_err())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(err, ExecError::TooDeep { depth: 5001, max_depth: 5000, line: 1 });
    }

    #[test]
    fn depth_counts_nested_commands() {
        let prog = parse("(external stem (do (do (do (true)))))").unwrap();
        assert!(run(&prog, b"x", &Config { max_depth: 4 }).unwrap().result);
        let err = run(&prog, b"x", &Config { max_depth: 3 }).unwrap_err();
        assert_eq!(err, ExecError::TooDeep { depth: 4, max_depth: 3, line: 1 });
    }
}
