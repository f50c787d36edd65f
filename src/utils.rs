use crate::config::FALLBACK_THREADS;
#[cfg(not(target_arch = "wasm32"))]
use once_cell::sync::Lazy;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(not(target_arch = "wasm32"))]
static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds on a monotonic clock; only differences are meaningful.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    EPOCH.elapsed().as_secs_f64() * 1000.0
}

#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Route `log` records to the browser console. Safe to call more than once.
#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| wasm_logger::init(wasm_logger::Config::new(log::Level::Info)));
}

/// Parallelism reported by the platform, if any.
#[cfg(not(target_arch = "wasm32"))]
pub fn detected_parallelism() -> Option<usize> {
    std::thread::available_parallelism().ok().map(|n| n.get())
}

#[cfg(target_arch = "wasm32")]
pub fn detected_parallelism() -> Option<usize> {
    let reported = web_sys::window()?.navigator().hardware_concurrency();
    if reported >= 1.0 {
        Some(reported as usize)
    } else {
        None
    }
}

/// Number of worker slots: one fewer than the cores, leaving one for the
/// coordinator, and never zero.
pub fn worker_count(detected: Option<usize>) -> usize {
    detected
        .unwrap_or(FALLBACK_THREADS)
        .saturating_sub(1)
        .max(1)
}

/// Round to two decimals.
pub fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// Generic numeric input validation
pub fn validate_numeric_input<T>(
    input: &str,
    min: Option<T>,
    max: Option<T>,
    field_name: &str,
) -> Result<T, String>
where
    T: std::str::FromStr + std::fmt::Display + PartialOrd,
{
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(format!("{} cannot be empty", field_name));
    }

    match trimmed.parse::<T>() {
        Ok(val) => {
            if let Some(min_val) = min {
                if val < min_val {
                    return Err(format!("{} must be at least {}", field_name, min_val));
                }
            }
            if let Some(max_val) = max {
                if val > max_val {
                    return Err(format!("{} cannot exceed {}", field_name, max_val));
                }
            }
            Ok(val)
        }
        Err(_) => Err(format!("{} must be a valid number", field_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_leaves_a_core_and_never_hits_zero() {
        assert_eq!(worker_count(Some(8)), 7);
        assert_eq!(worker_count(Some(2)), 1);
        assert_eq!(worker_count(Some(1)), 1);
        assert_eq!(worker_count(Some(0)), 1);
        assert_eq!(worker_count(None), 1);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(20.049), 20.05);
    }

    #[test]
    fn numeric_input_bounds() {
        assert_eq!(validate_numeric_input::<u32>(" 12 ", Some(1), None, "Workers"), Ok(12));
        assert!(validate_numeric_input::<u32>("0", Some(1), None, "Workers").is_err());
        assert!(validate_numeric_input::<f64>("101", None, Some(100.0), "Rate").is_err());
        assert!(validate_numeric_input::<u32>("", None, None, "Workers").is_err());
        assert!(validate_numeric_input::<u32>("abc", None, None, "Workers").is_err());
    }

    #[test]
    fn clock_is_monotonic() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}
