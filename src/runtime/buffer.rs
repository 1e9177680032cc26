use std::fmt;

use super::ExecError;

/// A single code unit of text.
pub type Symbol = u8;

/// Extra room reserved whenever the buffer has to grow.
const HEADROOM: usize = 20;

/// Growable run of symbols with a logical size and a separately tracked capacity.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SymbolBuffer {
    data: Vec<Symbol>,
}

impl SymbolBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(s: &[Symbol]) -> Result<Self, ExecError> {
        let mut b = Self::new();
        b.assign(s)?;
        Ok(b)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[Symbol] {
        &self.data
    }

    /// Makes sure at least `needed` symbols fit without another allocation.
    pub fn reserve(&mut self, needed: usize) -> Result<(), ExecError> {
        if needed <= self.data.capacity() {
            return Ok(());
        }
        let additional = needed + HEADROOM - self.data.len();
        self.data.try_reserve_exact(additional).map_err(|_| ExecError::Alloc { requested: needed + HEADROOM })
    }

    /// Overwrites the whole buffer with `s`.
    pub fn assign(&mut self, s: &[Symbol]) -> Result<(), ExecError> {
        self.data.clear();
        self.reserve(s.len())?;
        self.data.extend_from_slice(s);
        Ok(())
    }

    /// Replaces the symbols in `[bra, ket)` with `s`, moving the tail as needed.
    /// Returns the change in length.
    pub fn splice(&mut self, bra: usize, ket: usize, s: &[Symbol]) -> Result<isize, ExecError> {
        debug_assert!(bra <= ket && ket <= self.data.len());
        let adjustment = s.len() as isize - (ket - bra) as isize;
        if adjustment > 0 {
            self.reserve(self.data.len() + adjustment as usize)?;
        }
        if adjustment == 0 {
            self.data[bra..ket].copy_from_slice(s);
        } else {
            self.data.splice(bra..ket, s.iter().copied());
        }
        Ok(adjustment)
    }
}

impl fmt::Debug for SymbolBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.data))
    }
}

impl fmt::Display for SymbolBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_grows_and_shrinks() {
        let mut b = SymbolBuffer::from_slice(b"happiness").unwrap();
        assert_eq!(b.splice(4, 9, b"y").unwrap(), -4);
        assert_eq!(b.as_slice(), b"happy");
        assert_eq!(b.splice(5, 5, b"ish").unwrap(), 3);
        assert_eq!(b.as_slice(), b"happyish");
        assert_eq!(b.splice(0, 1, b"s").unwrap(), 0);
        assert_eq!(b.as_slice(), b"sappyish");
    }

    #[test]
    fn growth_keeps_headroom() {
        let mut b = SymbolBuffer::new();
        b.assign(b"abc").unwrap();
        assert!(b.capacity() >= 3 + HEADROOM);
        assert!(b.len() <= b.capacity());
    }
}
