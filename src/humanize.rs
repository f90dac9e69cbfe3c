// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Human-readable retry hints.

/// Append a retry hint to `base`.
///
/// `retry_after_secs` of `None` or `<= 0` gives a generic "later" hint;
/// otherwise the delay is spelled out in whole minutes and seconds.
pub fn retry_message(base: &str, retry_after_secs: Option<i64>) -> String {
    match retry_after_secs {
        Some(secs) if secs > 0 => format!("{base} {}", retry_phrase(secs)),
        _ => format!("{base} Please try again later."),
    }
}

fn retry_phrase(secs: i64) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;

    match (minutes, seconds) {
        (0, 0) => "Please try again in a moment.".to_string(),
        (m, 0) => format!("Please try again in {}.", unit(m, "minute")),
        (0, s) => format!("Please try again in {}.", unit(s, "second")),
        (m, s) => format!(
            "Please try again in {} and {}.",
            unit(m, "minute"),
            unit(s, "second")
        ),
    }
}

fn unit(n: i64, name: &str) -> String {
    if n > 1 {
        format!("{n} {name}s")
    } else {
        format!("{n} {name}")
    }
}
