//! Model-driven analysis stages run for every unprocessed stock:
//! fact extraction, sector screening and forward-guidance assessment.

pub mod guidance;
pub mod sector;
pub mod stock_info;

pub use self::guidance::find_guidance;
pub use self::sector::is_financial;
pub use self::stock_info::extract_stock_info;

/// Compound annual growth rate in percent, `((future/current)^(1/years) - 1) * 100`.
/// `None` unless both values and the horizon are positive.
pub fn calculate_cagr(current: f64, future: f64, years: u32) -> Option<f64> {
    if current <= 0.0 || future <= 0.0 || years == 0 {
        return None;
    }
    Some(((future / current).powf(1.0 / f64::from(years)) - 1.0) * 100.0)
}

/// Render an optional amount for a prompt or report.
pub fn fmt_amount(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cagr_over_known_horizons() {
        let doubled = calculate_cagr(100.0, 200.0, 1).unwrap();
        assert!((doubled - 100.0).abs() < 1e-9);

        let three_year = calculate_cagr(500.0, 800.0, 3).unwrap();
        assert!((three_year - 16.9607).abs() < 1e-3);
    }

    #[test]
    fn cagr_rejects_degenerate_inputs() {
        assert_eq!(calculate_cagr(0.0, 800.0, 3), None);
        assert_eq!(calculate_cagr(500.0, -1.0, 3), None);
        assert_eq!(calculate_cagr(500.0, 800.0, 0), None);
    }

    #[test]
    fn amounts_render_without_trailing_zeroes() {
        assert_eq!(fmt_amount(Some(4578.0)), "4578");
        assert_eq!(fmt_amount(Some(12.5)), "12.5");
        assert_eq!(fmt_amount(None), "");
    }
}
