/// Monotonic wall-clock milliseconds since the first call in this process.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}

/// Monotonic wall-clock milliseconds since page load.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map(|perf| perf.now())
        .unwrap_or(0.0)
}

/// Formats a millisecond timestamp as `m:ss.t` for the ruler and status line.
pub fn format_ms(ms: f64) -> String {
    let total_tenths = (ms.max(0.0) / 100.0).round() as u64;
    let minutes = total_tenths / 600;
    let seconds = (total_tenths / 10) % 60;
    let tenths = total_tenths % 10;
    format!("{minutes}:{seconds:02}.{tenths}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_monotonic() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(0.0), "0:00.0");
        assert_eq!(format_ms(61_500.0), "1:01.5");
    }
}
