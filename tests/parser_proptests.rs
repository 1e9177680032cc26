use proptest::prelude::*;
use snowball_interp::snowball;
use std::fs;

proptest! {
    #[test]
    fn doesnt_crash(s in "\\PC*") {
        let _ = snowball::parse(&s);
    }

    #[test]
    fn doesnt_crash_on_commands(s in "\\((bra|or|and|not|try|do|repeat|\\[|\\]|delete|next|\"[a-z]{0,3}\"| |\\(|\\))*\\)") {
        let _ = snowball::parse(&format!("(external stem {s})"));
    }

    #[test]
    fn stemmer_never_errors(word in "[a-z]{0,12}") {
        let s = fs::read_to_string("tests/programs/english_lite.sbl").expect("failed to read file");
        let prog = snowball::parse(&s).expect("english_lite.sbl");
        let r = snowball::run(&prog, word.as_bytes(), &snowball::Config::default());
        prop_assert!(r.is_ok(), "{word}: {r:?}");
        prop_assert!(r.unwrap().text().len() <= word.len());
    }
}
