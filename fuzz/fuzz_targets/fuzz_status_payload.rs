#![no_main]

//! Feeds arbitrary bytes to the response decoders. Server payloads must
//! either parse or be rejected, never panic.

use libfuzzer_sys::fuzz_target;

use timepulse::format::{format_compact, format_hms};
use timepulse::models::{
    BreakPolicy, BreakSession, BreakStopOutcome, LoginResponse, MemberStatus, TrackedSession,
};

fuzz_target!(|data: &[u8]| {
    if let Ok(session) = serde_json::from_slice::<TrackedSession>(data) {
        let _ = format_hms(session.total_seconds);
        // Whatever we parsed must serialize back out.
        let _ = serde_json::to_string(&session).unwrap();
    }
    if let Ok(members) = serde_json::from_slice::<Vec<MemberStatus>>(data) {
        for m in &members {
            let _ = format_compact(m.total_seconds);
        }
    }
    let _ = serde_json::from_slice::<BreakSession>(data);
    let _ = serde_json::from_slice::<Vec<BreakPolicy>>(data);
    let _ = serde_json::from_slice::<BreakStopOutcome>(data);
    let _ = serde_json::from_slice::<LoginResponse>(data);
});
