#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use slicegrep::query::Matcher;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    term: &'a str,
    line: &'a str,
}

fuzz_target!(|input: Input| {
    if input.term.trim().is_empty() {
        return;
    }
    let matcher = Matcher::new(input.term);
    let ranges = matcher.find_all(input.line);

    // Ranges are ordered and slice the original line on char boundaries
    let mut last_start = 0;
    for range in &ranges {
        assert!(range.start >= last_start);
        assert!(range.start <= range.end && range.end <= input.line.len());
        assert!(input.line.is_char_boundary(range.start));
        assert!(input.line.is_char_boundary(range.end));
        last_start = range.start;
    }
    assert_eq!(matcher.is_match(input.line), !ranges.is_empty());
});
