#![no_main]

use libfuzzer_sys::fuzz_target;
use lapso::event::parse_event_line;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Event lines are untrusted text; parsing must never panic
        let _ = parse_event_line(input);
    }
});
