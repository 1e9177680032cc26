use std::collections::BTreeSet;

use proptest::prelude::*;
use snowball_interp::runtime::{among, find_among, find_among_b, grouping, Env, Grouping};

fn env(text: &[u8]) -> Env {
    let mut z = Env::default();
    z.load(text).unwrap();
    z
}

fn table(strings: &BTreeSet<String>, backward: bool) -> Vec<among::AmongEntry> {
    let candidates = strings
        .iter()
        .enumerate()
        .map(|(ix, s)| {
            let mut bytes = s.as_bytes().to_vec();
            if backward {
                bytes.reverse();
            }
            (bytes, ix + 1)
        })
        .collect();
    among::build(candidates, backward).unwrap()
}

/// Outcome and length of the longest candidate starting at `at`.
fn longest_match(strings: &BTreeSet<String>, text: &[u8], at: usize) -> (usize, usize) {
    strings
        .iter()
        .enumerate()
        .filter(|(_, s)| text[at..].starts_with(s.as_bytes()))
        .map(|(ix, s)| (ix + 1, s.len()))
        .max_by_key(|&(_, len)| len)
        .unwrap_or((0, 0))
}

proptest! {
    #[test]
    fn among_finds_longest_candidate(
        strings in prop::collection::btree_set("[abc]{1,4}", 1..10),
        text in "[abc]{0,8}",
        at in 0usize..9,
    ) {
        let text = text.as_bytes();
        let at = at.min(text.len());
        let v = table(&strings, false);

        let mut z = env(text);
        z.c = at;
        let outcome = find_among(&mut z, &v);
        let (expected, len) = longest_match(&strings, text, at);
        prop_assert_eq!(outcome, expected);
        prop_assert_eq!(z.c, at + len);

        // same state, same answer
        let mut again = env(text);
        again.c = at;
        prop_assert_eq!(find_among(&mut again, &v), outcome);
        prop_assert_eq!(again.c, z.c);
    }

    #[test]
    fn backward_among_mirrors_forward(
        strings in prop::collection::btree_set("[abc]{1,4}", 1..10),
        text in "[abc]{0,8}",
    ) {
        let forward = table(&strings, false);
        let backward = table(&strings, true);

        let mut z = env(text.as_bytes());
        let outcome = find_among(&mut z, &forward);

        let reversed: Vec<u8> = text.bytes().rev().collect();
        let mut zb = env(&reversed);
        zb.c = zb.l;
        prop_assert_eq!(find_among_b(&mut zb, &backward), outcome);
        prop_assert_eq!(zb.l - zb.c, z.c);
    }

    #[test]
    fn grouping_complements_within_range(
        members in prop::collection::vec(b'a'..=b'z', 1..10),
        probe in b'a'..=b'z',
    ) {
        let g = Grouping::new(&members);
        let lo = *members.iter().min().unwrap();
        let hi = *members.iter().max().unwrap();
        prop_assume!((lo..=hi).contains(&probe));

        let mut z = env(&[probe]);
        let inside = grouping::in_grouping(&mut z, &g, false).matched();
        let mut z = env(&[probe]);
        let outside = grouping::out_grouping(&mut z, &g, false).matched();
        prop_assert_ne!(inside, outside);
        prop_assert_eq!(inside, members.contains(&probe));
    }

    #[test]
    fn literal_matches_both_ways(text in "[a-z]{0,10}", i in 0usize..11, j in 0usize..11) {
        let text = text.as_bytes();
        let (i, j) = (i.min(j).min(text.len()), i.max(j).min(text.len()));
        let s = &text[i..j];

        let mut z = env(text);
        z.c = i;
        prop_assert!(z.eq_s(s));
        prop_assert_eq!(z.c, j);
        prop_assert!(z.eq_s_b(s));
        prop_assert_eq!(z.c, i);
    }

    #[test]
    fn slice_edits_keep_markers_ordered(
        text in "[a-z]{0,10}",
        edits in prop::collection::vec((0usize..12, 0usize..12, 0usize..12, "[A-Z]{0,4}"), 1..6),
    ) {
        let mut z = env(text.as_bytes());
        let mut model = text.as_bytes().to_vec();
        for (a, b, c, replacement) in edits {
            let (a, b) = (a.min(b).min(z.l), a.max(b).min(z.l));
            z.bra = a;
            z.ket = b;
            z.c = c.min(z.l);
            z.slice_from(replacement.as_bytes()).unwrap();
            model.splice(a..b, replacement.bytes());

            prop_assert_eq!(z.text(), &model[..]);
            prop_assert!(z.bra <= z.ket && z.ket <= z.l && z.l <= z.text().len());
            prop_assert!(z.c <= z.l);
        }
    }
}
