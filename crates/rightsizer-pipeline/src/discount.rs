//! Discount arithmetic.
//!
//! Pure functions; absent inputs propagate as absent outputs. An unpriced
//! record must never show a zero-dollar discount in the report.

/// Round a dollar amount to cents.
pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `monthly_list × (1 − percent/100)`, rounded to cents.
pub fn discounted_price(monthly_list: Option<f64>, discount_percent: Option<f64>) -> Option<f64> {
    match (monthly_list, discount_percent) {
        (Some(price), Some(percent)) => Some(round_cents(price * (1.0 - percent / 100.0))),
        _ => None,
    }
}

/// `current_monthly − discounted`, rounded to cents.
pub fn savings_with_discount(current_monthly: Option<f64>, discounted: Option<f64>) -> Option<f64> {
    match (current_monthly, discounted) {
        (Some(current), Some(discounted)) => Some(round_cents(current - discounted)),
        _ => None,
    }
}
