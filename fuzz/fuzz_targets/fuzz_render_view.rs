#![no_main]

//! Rendering must cope with any label, error text and elapsed time,
//! including multi-byte characters and `u64::MAX` seconds.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use timepulse::format::{format_compact, format_hms, render_line};
use timepulse::widget::{Affordance, Disabled, Phase, TrackerView};

#[derive(Arbitrary, Debug)]
struct ViewInput {
    label: String,
    phase: u8,
    project: Option<i64>,
    seconds: u64,
    affordance: u8,
    error: Option<String>,
}

fuzz_target!(|input: ViewInput| {
    let phase = match input.phase % 7 {
        0 => Phase::Uninitialized,
        1 => Phase::Disabled(Disabled::NotAuthenticated),
        2 => Phase::Disabled(Disabled::NoProject),
        3 => Phase::Loading,
        4 => Phase::Active,
        5 => Phase::Paused,
        _ => Phase::Stopped,
    };
    let affordance = match input.affordance % 4 {
        0 => Affordance::Start,
        1 => Affordance::Pause,
        2 => Affordance::Busy,
        _ => Affordance::Unavailable,
    };

    let display = format_hms(input.seconds);
    let _ = format_compact(input.seconds);

    let view = TrackerView {
        label: input.label,
        phase,
        project: input.project,
        seconds: input.seconds,
        display: display.clone(),
        affordance,
        error: input.error,
        last_sync: None,
    };

    let line = render_line(&view);
    assert!(line.contains(&display));
});
