//! Human-readable sizes using SI units (powers of 1000).

const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
const BASE: u64 = 1000;

/// Format a byte count, e.g. `1500 -> "1.5 kB"`, `82854982 -> "83 MB"`.
///
/// Values are rounded to one decimal place; the decimal is only shown while
/// the rounded value is below ten.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{bytes} B");
    }

    let mut exponent = 0usize;
    let mut scale = 1u64;
    while exponent + 1 < UNITS.len() && bytes / scale >= BASE {
        scale *= BASE;
        exponent += 1;
    }

    let value = ((bytes as f64 / scale as f64) * 10.0 + 0.5).floor() / 10.0;
    if value < 10.0 {
        format!("{:.1} {}", value, UNITS[exponent])
    } else {
        format!("{:.0} {}", value, UNITS[exponent])
    }
}

/// Format a throughput in bytes per second.
pub fn format_rate(bytes_per_sec: f64) -> String {
    let bytes = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec.round() as u64
    } else {
        0
    };
    format!("{}/s", format_bytes(bytes))
}
