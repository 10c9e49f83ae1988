//! Display helpers for the presentation boundary. Rounding to whole units happens here and
//! nowhere in the engines.

use crate::models::Day;
use crate::trend::TrendModel;
use num_format::{Locale, ToFormattedString};

/// Map a user-provided locale tag to a `num_format::Locale`.
///
/// Supported tags (case-insensitive): `en`, `us`, `en_US`, `de`, `de_DE`, `german`,
/// `fr`, `es`, `it`, `pt`, `nl`. Defaults to English.
pub fn map_locale(tag: &str) -> &'static Locale {
    match tag.to_lowercase().as_str() {
        "de" | "de_de" | "german" => &Locale::de,
        "fr" | "fr_fr" => &Locale::fr,
        "es" | "es_es" => &Locale::es,
        "it" | "it_it" => &Locale::it,
        "pt" | "pt_pt" | "pt_br" => &Locale::pt,
        "nl" | "nl_nl" => &Locale::nl,
        _ => &Locale::en,
    }
}

/// `1234567` -> `1,234,567` (en) / `1.234.567` (de).
pub fn fmt_count(v: u64, locale: &Locale) -> String {
    v.to_formatted_string(locale)
}

/// Absent counts print as `N/A`.
pub fn fmt_opt_count(v: Option<u64>, locale: &Locale) -> String {
    v.map(|v| fmt_count(v, locale))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Round to the nearest whole number and group digits; undefined values print as `NA`.
/// Halves round up (`-2.5` -> `-2`, `2.5` -> `3`).
pub fn fmt_rounded(v: Option<f64>, locale: &Locale) -> String {
    match v {
        Some(x) if x.is_finite() => {
            let r = (x + 0.5).floor();
            let grouped = (r.abs() as u64).to_formatted_string(locale);
            if r < 0.0 { format!("-{grouped}") } else { grouped }
        }
        _ => "NA".to_string(),
    }
}

/// Ratio as a percentage with two decimals: `0.0433` -> `4.33%`.
pub fn fmt_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// `y = 10.00x + 0.00`, or `n/a` without a fit.
pub fn fmt_equation(model: Option<&TrendModel>) -> String {
    match model {
        Some(m) => format!("y = {:.2}x + {:.2}", m.slope, m.intercept),
        None => "n/a (insufficient data)".to_string(),
    }
}

/// Short axis-style label, e.g. `Jan 22`.
pub fn day_label(day: Day) -> String {
    day.format("%b %-d").to_string()
}
