use super::{ExecError, Symbol, SymbolBuffer};

/// Per-kind declared variable counts, as handed out by the name table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub integers: usize,
    pub booleans: usize,
    pub strings: usize,
}

/// Register file of one interpretation run.
///
/// `c` is the cursor, `l` the forward limit and `lb` the backward limit.
/// `bra` and `ket` bracket the span the next slice operation acts on.
/// Outside of [`Env::replace_s`] these only ever move one at a time, so the
/// bookkeeping that keeps them consistent across edits lives there and
/// nowhere else.
#[derive(Clone, Debug, Default)]
pub struct Env {
    pub p: SymbolBuffer,
    pub c: usize,
    pub l: usize,
    pub lb: usize,
    pub bra: usize,
    pub ket: usize,
    pub integers: Vec<i64>,
    pub booleans: Vec<bool>,
    pub strings: Vec<SymbolBuffer>,
    /// 1-based outcome of the last among search, 0 for none.
    pub among_var: usize,
}

impl Env {
    pub fn new(counts: Counts) -> Result<Self, ExecError> {
        let mut integers = Vec::new();
        integers.try_reserve_exact(counts.integers).map_err(|_| ExecError::Alloc { requested: counts.integers })?;
        integers.resize(counts.integers, 0);

        let mut booleans = Vec::new();
        booleans.try_reserve_exact(counts.booleans).map_err(|_| ExecError::Alloc { requested: counts.booleans })?;
        booleans.resize(counts.booleans, false);

        let mut strings = Vec::new();
        strings.try_reserve_exact(counts.strings).map_err(|_| ExecError::Alloc { requested: counts.strings })?;
        strings.resize_with(counts.strings, SymbolBuffer::new);

        Ok(Self {
            integers,
            booleans,
            strings,
            ..Self::default()
        })
    }

    /// Replaces the buffer with `text` and resets the scan region to all of it.
    pub fn load(&mut self, text: &[Symbol]) -> Result<(), ExecError> {
        self.p.assign(text)?;
        self.c = 0;
        self.l = text.len();
        self.lb = 0;
        self.bra = 0;
        self.ket = text.len();
        Ok(())
    }

    pub fn text(&self) -> &[Symbol] {
        self.p.as_slice()
    }

    /// Replaces `[c_bra, c_ket)` with `s` and keeps the limit and cursor in step.
    /// Returns the change in length.
    pub fn replace_s(&mut self, c_bra: usize, c_ket: usize, s: &[Symbol]) -> Result<isize, ExecError> {
        if c_bra > c_ket || c_ket > self.p.len() {
            return Err(ExecError::InvalidSlice {
                bra: c_bra,
                ket: c_ket,
                limit: self.l,
                size: self.p.len(),
            });
        }
        let adjustment = self.p.splice(c_bra, c_ket, s)?;
        if adjustment != 0 {
            self.l = self.l.wrapping_add_signed(adjustment);
            if self.c >= c_ket {
                self.c = self.c.wrapping_add_signed(adjustment);
            } else if self.c > c_bra {
                self.c = c_bra;
            }
        }
        Ok(adjustment)
    }

    fn slice_check(&self) -> Result<(), ExecError> {
        if self.bra > self.ket || self.ket > self.l || self.l > self.p.len() {
            return Err(ExecError::InvalidSlice {
                bra: self.bra,
                ket: self.ket,
                limit: self.l,
                size: self.p.len(),
            });
        }
        Ok(())
    }

    /// Replaces the bracketed slice with `s`. Afterwards the slice brackets the replacement.
    pub fn slice_from(&mut self, s: &[Symbol]) -> Result<(), ExecError> {
        self.slice_check()?;
        self.replace_s(self.bra, self.ket, s)?;
        self.ket = self.bra + s.len();
        Ok(())
    }

    pub fn slice_del(&mut self) -> Result<(), ExecError> {
        self.slice_from(&[])
    }

    /// Copies the bracketed slice into string register `slot`.
    pub fn slice_to(&mut self, slot: usize) -> Result<(), ExecError> {
        self.slice_check()?;
        let (bra, ket) = (self.bra, self.ket);
        let Self { p, strings, .. } = self;
        strings[slot].assign(&p.as_slice()[bra..ket])
    }

    /// Inserts `s` at `[c_bra, c_ket)`, shifting the slice markers that sit at or after it.
    pub fn insert(&mut self, c_bra: usize, c_ket: usize, s: &[Symbol]) -> Result<(), ExecError> {
        let adjustment = self.replace_s(c_bra, c_ket, s)?;
        if c_bra <= self.bra {
            self.bra = self.bra.wrapping_add_signed(adjustment);
        }
        if c_bra <= self.ket {
            self.ket = self.ket.wrapping_add_signed(adjustment);
        }
        Ok(())
    }

    /// Symbols between the cursor and the forward limit.
    pub fn ahead(&self) -> usize {
        self.l.saturating_sub(self.c)
    }

    /// Symbols between the backward limit and the cursor. Zero when the cursor
    /// sits outside `[lb, l]`, which a restored cursor can after an edit.
    pub fn behind(&self) -> usize {
        if self.c > self.l {
            return 0;
        }
        self.c.saturating_sub(self.lb)
    }

    /// Matches `s` forwards at the cursor, moving past it on success.
    pub fn eq_s(&mut self, s: &[Symbol]) -> bool {
        if self.ahead() < s.len() || &self.p.as_slice()[self.c..self.c + s.len()] != s {
            return false;
        }
        self.c += s.len();
        true
    }

    /// Matches `s` backwards, ending at the cursor, moving before it on success.
    pub fn eq_s_b(&mut self, s: &[Symbol]) -> bool {
        if self.behind() < s.len() || &self.p.as_slice()[self.c - s.len()..self.c] != s {
            return false;
        }
        self.c -= s.len();
        true
    }

    pub fn eq_v(&mut self, slot: usize) -> bool {
        let s = std::mem::take(&mut self.strings[slot]);
        let r = self.eq_s(s.as_slice());
        self.strings[slot] = s;
        r
    }

    pub fn eq_v_b(&mut self, slot: usize) -> bool {
        let s = std::mem::take(&mut self.strings[slot]);
        let r = self.eq_s_b(s.as_slice());
        self.strings[slot] = s;
        r
    }
}
