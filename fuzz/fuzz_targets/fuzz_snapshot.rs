#![no_main]

//! Snapshot restore fuzzer.
//!
//! Any snapshot JSON that restores successfully must yield a consistent
//! state, and that state must stay consistent through a turn.

use duskfall::config::GameConfig;
use duskfall::game::{Snapshot, check_invariants, resolve_turn};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(snapshot) = Snapshot::from_json(text) else {
        return;
    };
    if snapshot.map.len() > 64 || snapshot.map.first().is_some_and(|row| row.len() > 64) {
        return;
    }
    let Ok(mut state) = snapshot.restore(GameConfig::default()) else {
        return;
    };

    let violations = check_invariants(&state);
    assert!(violations.is_empty(), "Restored state invalid: {violations:?}");

    resolve_turn(&mut state, &[]);
    let violations = check_invariants(&state);
    assert!(violations.is_empty(), "Invalid after one turn: {violations:?}");
});
