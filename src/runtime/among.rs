use std::cmp::Ordering;

use super::{Env, Symbol};

/// One candidate string of an among table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmongEntry {
    pub bytes: Vec<Symbol>,
    /// 1-based result reported when this entry matches.
    pub outcome: usize,
    /// Next entry to try when this one is not fully covered by the match,
    /// always one whose bytes are a prefix (suffix, for backward tables) of these.
    pub fail_skip: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AmongError {
    #[error("duplicate among string \"{0}\"")]
    Duplicate(String),
}

fn order(a: &[Symbol], b: &[Symbol], backward: bool) -> Ordering {
    if backward {
        a.iter().rev().cmp(b.iter().rev())
    } else {
        a.cmp(b)
    }
}

/// Lays out `(bytes, outcome)` candidates the way the matchers expect them:
/// sorted in scan order, each linked to the longest earlier entry that it extends.
pub fn build(mut candidates: Vec<(Vec<Symbol>, usize)>, backward: bool) -> Result<Vec<AmongEntry>, AmongError> {
    candidates.sort_by(|(a, _), (b, _)| order(a, b, backward));
    if let Some(w) = candidates.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(AmongError::Duplicate(String::from_utf8_lossy(&w[0].0).into_owned()));
    }

    let mut entries: Vec<AmongEntry> = Vec::with_capacity(candidates.len());
    for (k, (bytes, outcome)) in candidates.into_iter().enumerate() {
        let fail_skip = (0..k).rev().find(|&j| {
            let s = &entries[j].bytes;
            if backward { bytes.ends_with(s) } else { bytes.starts_with(s) }
        });
        entries.push(AmongEntry { bytes, outcome, fail_skip });
    }
    Ok(entries)
}

/// Finds the entry of `v` matching forwards from the cursor.
///
/// `v` is binary searched; `common_i` and `common_j` record how many symbols are
/// already known to agree with the entries at either end of the search window, so
/// no symbol is compared twice. Returns the outcome and moves the cursor past the
/// match, or returns 0 and leaves the cursor alone.
pub fn find_among(z: &mut Env, v: &[AmongEntry]) -> usize {
    if v.is_empty() || z.c > z.l {
        return 0;
    }
    let mut i = 0;
    let mut j = v.len();

    let c = z.c;
    let l = z.l;
    let q = &z.p.as_slice()[c..];

    let mut common_i = 0;
    let mut common_j = 0;

    let mut first_key_inspected = false;

    loop {
        let k = i + ((j - i) >> 1);
        let mut diff = 0i32;
        let mut common = common_i.min(common_j);
        let w = &v[k];
        for i2 in common..w.bytes.len() {
            if c + common == l {
                diff = -1;
                break;
            }
            diff = q[common] as i32 - w.bytes[i2] as i32;
            if diff != 0 {
                break;
            }
            common += 1;
        }
        if diff < 0 {
            j = k;
            common_j = common;
        } else {
            i = k;
            common_i = common;
        }
        if j - i <= 1 {
            if i > 0 || j == i {
                break;
            }
            // v[0] is never a midpoint until the window is [0, 1), so go
            // round once more to compare against it.
            if first_key_inspected {
                break;
            }
            first_key_inspected = true;
        }
    }

    loop {
        let w = &v[i];
        if common_i >= w.bytes.len() {
            z.c = c + w.bytes.len();
            return w.outcome;
        }
        match w.fail_skip {
            Some(next) => i = next,
            None => return 0,
        }
    }
}

/// Backward counterpart of [`find_among`]: matches entries ending at the cursor
/// and moves the cursor before the match.
pub fn find_among_b(z: &mut Env, v: &[AmongEntry]) -> usize {
    if v.is_empty() || z.c < z.lb || z.c > z.l {
        return 0;
    }
    let mut i = 0;
    let mut j = v.len();

    let c = z.c;
    let lb = z.lb;
    let q = &z.p.as_slice()[..c];

    let mut common_i = 0;
    let mut common_j = 0;

    let mut first_key_inspected = false;

    loop {
        let k = i + ((j - i) >> 1);
        let mut diff = 0i32;
        let mut common = common_i.min(common_j);
        let w = &v[k];
        for i2 in (0..w.bytes.len().saturating_sub(common)).rev() {
            if c - common == lb {
                diff = -1;
                break;
            }
            diff = q[c - 1 - common] as i32 - w.bytes[i2] as i32;
            if diff != 0 {
                break;
            }
            common += 1;
        }
        if diff < 0 {
            j = k;
            common_j = common;
        } else {
            i = k;
            common_i = common;
        }
        if j - i <= 1 {
            if i > 0 || j == i {
                break;
            }
            if first_key_inspected {
                break;
            }
            first_key_inspected = true;
        }
    }

    loop {
        let w = &v[i];
        if common_i >= w.bytes.len() {
            z.c = c - w.bytes.len();
            return w.outcome;
        }
        match w.fail_skip {
            Some(next) => i = next,
            None => return 0,
        }
    }
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

    fn table(strings: &[(&str, usize)], backward: bool) -> Vec<AmongEntry> {
        build(strings.iter().map(|(s, r)| (s.as_bytes().to_vec(), *r)).collect(), backward).unwrap()
    }

    #[test]
    fn build_sorts_and_links_prefixes() {
        let v = table(&[("ab", 2), ("a", 1), ("abc", 3), ("b", 4)], false);
        let order: Vec<_> = v.iter().map(|e| e.bytes.as_slice()).collect();
        assert_eq!(order, vec![&b"a"[..], b"ab", b"abc", b"b"]);
        let skips: Vec<_> = v.iter().map(|e| e.fail_skip).collect();
        assert_eq!(skips, vec![None, Some(0), Some(1), None]);
    }

    #[test]
    fn build_backward_links_suffixes() {
        let v = table(&[("ing", 1), ("ling", 2), ("g", 3)], true);
        let order: Vec<_> = v.iter().map(|e| e.bytes.as_slice()).collect();
        assert_eq!(order, vec![&b"g"[..], b"ing", b"ling"]);
        let skips: Vec<_> = v.iter().map(|e| e.fail_skip).collect();
        assert_eq!(skips, vec![None, Some(0), Some(1)]);
    }

    #[test]
    fn build_rejects_duplicates() {
        let r = build(vec![(b"x".to_vec(), 1), (b"x".to_vec(), 2)], false);
        assert_eq!(r, Err(AmongError::Duplicate("x".to_string())));
    }

    #[test]
    fn longest_match_wins() {
        let v = table(&[("a", 1), ("ab", 2), ("abc", 3), ("b", 4)], false);
        let mut z = env("abcd");
        assert_eq!(find_among(&mut z, &v), 3);
        assert_eq!(z.c, 3);

        let mut z = env("abd");
        assert_eq!(find_among(&mut z, &v), 2);
        assert_eq!(z.c, 2);

        let mut z = env("ax");
        assert_eq!(find_among(&mut z, &v), 1);
        assert_eq!(z.c, 1);
    }

    #[test]
    fn first_entry_is_inspected() {
        let v = table(&[("a", 1), ("m", 2), ("z", 3)], false);
        let mut z = env("a");
        assert_eq!(find_among(&mut z, &v), 1);
        let v = table(&[("a", 1), ("m", 2)], false);
        let mut z = env("a");
        assert_eq!(find_among(&mut z, &v), 1);
        let v = table(&[("a", 7)], false);
        let mut z = env("a");
        assert_eq!(find_among(&mut z, &v), 7);
    }

    #[test]
    fn no_match_leaves_cursor() {
        let v = table(&[("cat", 1), ("dog", 2)], false);
        let mut z = env("cow");
        assert_eq!(find_among(&mut z, &v), 0);
        assert_eq!(z.c, 0);
    }

    #[test]
    fn limit_ends_candidates_short() {
        let v = table(&[("ca", 1), ("cat", 2)], false);
        let mut z = env("cat");
        z.l = 2;
        assert_eq!(find_among(&mut z, &v), 1);
        assert_eq!(z.c, 2);
    }

    #[test]
    fn empty_string_matches_everywhere() {
        let v = table(&[("", 1), ("s", 2)], true);
        let mut z = env("cats");
        z.c = 4;
        assert_eq!(find_among_b(&mut z, &v), 2);
        assert_eq!(z.c, 3);
        assert_eq!(find_among_b(&mut z, &v), 1);
        assert_eq!(z.c, 3);
    }

    #[test]
    fn backward_suffixes() {
        let v = table(&[("tion", 1), ("sion", 2)], true);
        let mut z = env("nation");
        z.c = 6;
        assert_eq!(find_among_b(&mut z, &v), 1);
        assert_eq!(z.c, 2);

        let mut z = env("vision");
        z.c = 6;
        assert_eq!(find_among_b(&mut z, &v), 2);
        assert_eq!(z.c, 2);
    }

    #[test]
    fn backward_respects_backward_limit() {
        let v = table(&[("ies", 1), ("s", 2)], true);
        let mut z = env("flies");
        z.c = 5;
        z.lb = 3;
        assert_eq!(find_among_b(&mut z, &v), 2);
        assert_eq!(z.c, 4);
    }

    #[test]
    fn empty_table_never_matches() {
        let mut z = env("abc");
        assert_eq!(find_among(&mut z, &[]), 0);
        assert_eq!(find_among_b(&mut z, &[]), 0);
    }

    #[test]
    fn cursor_outside_region_finds_nothing() {
        let v = table(&[("a", 1), ("b", 2)], true);
        let mut z = env("abc");
        z.lb = 2;
        z.c = 0;
        assert_eq!(find_among_b(&mut z, &v), 0);
        assert_eq!(z.c, 0);

        let v = table(&[("a", 1)], false);
        let mut z = env("abc");
        z.l = 1;
        z.c = 3;
        assert_eq!(find_among(&mut z, &v), 0);
        assert_eq!(z.c, 3);
    }
}
