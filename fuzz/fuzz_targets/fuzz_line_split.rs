#![no_main]

use libfuzzer_sys::fuzz_target;
use slicegrep::index::chunk::{count_lines, decode_chunk, split_lines};

fuzz_target!(|data: &[u8]| {
    let text = decode_chunk(data);
    let lines = split_lines(&text);
    assert_eq!(lines.len(), count_lines(&text));
    assert!(lines.iter().all(|line| !line.contains('\n')));
});
