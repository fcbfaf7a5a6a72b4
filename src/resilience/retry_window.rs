//! Jittered retry window.
//!
//! Decides whether a process should act early on a shared deadline. Every
//! process sharing the deadline rolls its own chance, so a fleet of
//! invocations spreads its refreshes across the window instead of all
//! refreshing at the same instant.
//!
//! ```text
//!             width
//!   ├────────────────────────┤
//! ──┼────────────────────────┼──▶ time
//! end - width               end
//!   never │ rising chance │ certain (last THRESHOLD secs, and past end)
//! ```

use rand::Rng;

/// Seconds before `end` inside which a retry is certain.
pub const THRESHOLD: i64 = 10;

/// Should a process at time `at` act on the deadline `end`?
pub fn in_window(width: i64, end: i64, at: i64) -> bool {
    in_window_with(&mut rand::thread_rng(), width, end, at)
}

/// `in_window` with an explicit random source.
pub fn in_window_with<R: Rng + ?Sized>(rng: &mut R, width: i64, end: i64, at: i64) -> bool {
    if end - width > at {
        return false;
    }
    let remaining = end - at;
    if remaining <= THRESHOLD {
        return true;
    }
    let chance = rng.gen_range(1..=remaining);
    width % chance < THRESHOLD
}

pub fn left_of_window(width: i64, end: i64, at: i64) -> bool {
    !in_window(width, end, at)
}
