//! Utility functions and helpers

/// Format a settlement-currency amount for log output
pub fn format_usdt(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// `part` as a percentage of `whole`, zero when `whole` is not positive
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (part / whole) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_usdt(1234.567), "$1234.57");
    }

    #[test]
    fn percentage_of_zero_whole_is_zero() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert!((percentage(5.0, 1000.0) - 0.5).abs() < 1e-12);
    }
}
