use super::{Env, Symbol};

/// A character class: an inclusive range plus one membership bit per character in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grouping {
    pub min: Symbol,
    pub max: Symbol,
    pub bits: Vec<u8>,
}

/// Result of one grouping test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupingOutcome {
    Matched,
    NoMatch,
    /// The cursor was already at the limit in the scan direction.
    OffEnd,
}

impl GroupingOutcome {
    pub fn matched(self) -> bool {
        self == GroupingOutcome::Matched
    }
}

impl Grouping {
    pub fn new(chars: &[Symbol]) -> Self {
        let (Some(&min), Some(&max)) = (chars.iter().min(), chars.iter().max()) else {
            return Self { min: 1, max: 0, bits: Vec::new() };
        };
        let mut g = Self {
            min,
            max,
            bits: vec![0; (max - min) as usize / 8 + 1],
        };
        for &ch in chars {
            g.set(ch);
        }
        g
    }

    /// Every character that is a member of `self` or `other`.
    pub fn union(&self, other: &Grouping) -> Self {
        let chars: Vec<Symbol> = self.members().chain(other.members()).collect();
        Self::new(&chars)
    }

    fn set(&mut self, ch: Symbol) {
        let ch = (ch - self.min) as usize;
        self.bits[ch >> 3] |= 1 << (ch & 0x7);
    }

    pub fn contains(&self, ch: Symbol) -> bool {
        if ch < self.min || ch > self.max {
            return false;
        }
        let ch = (ch - self.min) as usize;
        self.bits[ch >> 3] & (1 << (ch & 0x7)) != 0
    }

    pub fn members(&self) -> impl Iterator<Item = Symbol> + '_ {
        (self.min..=self.max).filter(|&ch| self.contains(ch))
    }
}

fn scan(z: &mut Env, g: &Grouping, repeat: bool, want: bool, forward: bool) -> GroupingOutcome {
    loop {
        let ch = if forward {
            if z.c >= z.l {
                return GroupingOutcome::OffEnd;
            }
            z.p.as_slice()[z.c]
        } else {
            if z.c <= z.lb || z.c > z.l {
                return GroupingOutcome::OffEnd;
            }
            z.p.as_slice()[z.c - 1]
        };
        if g.contains(ch) != want {
            return GroupingOutcome::NoMatch;
        }
        if forward {
            z.c += 1;
        } else {
            z.c -= 1;
        }
        if !repeat {
            return GroupingOutcome::Matched;
        }
    }
}

/// Tests that the symbol at the cursor is in `g`, stepping past it if so.
/// With `repeat`, keeps stepping until a symbol fails the test or the limit is hit,
/// and reports why it stopped.
pub fn in_grouping(z: &mut Env, g: &Grouping, repeat: bool) -> GroupingOutcome {
    scan(z, g, repeat, true, true)
}

pub fn out_grouping(z: &mut Env, g: &Grouping, repeat: bool) -> GroupingOutcome {
    scan(z, g, repeat, false, true)
}

pub fn in_grouping_b(z: &mut Env, g: &Grouping, repeat: bool) -> GroupingOutcome {
    scan(z, g, repeat, true, false)
}

pub fn out_grouping_b(z: &mut Env, g: &Grouping, repeat: bool) -> GroupingOutcome {
    scan(z, g, repeat, false, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Counts;

    fn env(text: &str) -> Env {
        let mut z = Env::new(Counts::default()).unwrap();
        z.load(text.as_bytes()).unwrap();
        z
    }

    #[test]
    fn membership_from_character_list() {
        let v = Grouping::new(b"aeiouy");
        assert_eq!((v.min, v.max), (b'a', b'y'));
        assert!(v.contains(b'e'));
        assert!(!v.contains(b'b'));
        assert!(!v.contains(b'z'));
        assert!(!v.contains(b'A'));
        assert_eq!(v.members().collect::<Vec<_>>(), b"aeiouy");
    }

    #[test]
    fn union_merges_members() {
        let g = Grouping::new(b"aeiou").union(&Grouping::new(b"wxY"));
        assert_eq!(g.members().collect::<Vec<_>>(), b"Yaeiouwx");
    }

    #[test]
    fn empty_grouping_matches_nothing() {
        let g = Grouping::new(b"");
        assert!(!g.contains(0));
        let mut z = env("a");
        assert_eq!(out_grouping(&mut z, &g, false), GroupingOutcome::Matched);
    }

    #[test]
    fn single_step_does_not_move_on_failure() {
        let v = Grouping::new(b"aeiou");
        let mut z = env("sky");
        assert_eq!(in_grouping(&mut z, &v, false), GroupingOutcome::NoMatch);
        assert_eq!(z.c, 0);
        assert_eq!(out_grouping(&mut z, &v, false), GroupingOutcome::Matched);
        assert_eq!(z.c, 1);
    }

    #[test]
    fn off_end_is_distinct_from_no_match() {
        let v = Grouping::new(b"aeiou");
        let mut z = env("a");
        z.c = 1;
        assert_eq!(in_grouping(&mut z, &v, false), GroupingOutcome::OffEnd);
        assert_eq!(out_grouping(&mut z, &v, false), GroupingOutcome::OffEnd);
        assert_eq!(z.c, 1);
    }

    #[test]
    fn repeat_reports_where_it_stopped() {
        let v = Grouping::new(b"aeiou");
        let mut z = env("aeixa");
        assert_eq!(in_grouping(&mut z, &v, true), GroupingOutcome::NoMatch);
        assert_eq!(z.c, 3);
        let mut z = env("aei");
        assert_eq!(in_grouping(&mut z, &v, true), GroupingOutcome::OffEnd);
        assert_eq!(z.c, 3);
    }

    #[test]
    fn backward_scan_reads_before_cursor() {
        let v = Grouping::new(b"aeiou");
        let mut z = env("strea");
        z.c = 5;
        assert_eq!(in_grouping_b(&mut z, &v, true), GroupingOutcome::NoMatch);
        assert_eq!(z.c, 3);
        assert_eq!(out_grouping_b(&mut z, &v, false), GroupingOutcome::Matched);
        assert_eq!(z.c, 2);
        z.lb = 2;
        assert_eq!(out_grouping_b(&mut z, &v, false), GroupingOutcome::OffEnd);
    }
}
