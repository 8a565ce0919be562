use chrono::{Datelike, NaiveDate};

fn group_digits(int_part: &str, sep: char) -> String {
    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(sep);
        }
        grouped.push(c);
    }
    grouped.chars().rev().collect()
}

pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let whole = format!("{:.0}", val.abs());
    let grouped = group_digits(&whole, '.');
    if negative {
        format!("-{grouped} ₫")
    } else {
        format!("{grouped} ₫")
    }
}

/// Render a number the way it is stored in the sheet: integral values
/// without a decimal point, fractions to at most two places. Three places
/// would read back as thousands grouping.
pub fn plain_number(val: f64) -> String {
    if !val.is_finite() {
        return "0".to_string();
    }
    if val.fract() == 0.0 && val.abs() < 1e15 {
        return format!("{}", val as i64);
    }
    let s = format!("{val:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn compact_quantity(val: f64) -> String {
    if val >= 1e6 {
        format!("{:.1} triệu", val / 1e6)
    } else if val >= 1e3 {
        format!("{:.1} nghìn", val / 1e3)
    } else {
        plain_number(val)
    }
}

pub fn percent(share: f64) -> String {
    if !share.is_finite() {
        return "0.0%".to_string();
    }
    format!("{:.1}%", share * 100.0)
}

pub fn day_label(day: NaiveDate) -> String {
    format!("{}/{}/{}", day.day(), day.month(), day.year())
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(500000.0), "500.000 ₫");
        assert_eq!(money(-1234.0), "-1.234 ₫");
        assert_eq!(money(0.0), "0 ₫");
        assert_eq!(money(1000000.4), "1.000.000 ₫");
    }

    #[test]
    fn test_plain_number() {
        assert_eq!(plain_number(500000.0), "500000");
        assert_eq!(plain_number(12.5), "12.5");
        assert_eq!(plain_number(0.25), "0.25");
        assert_eq!(plain_number(f64::NAN), "0");
        assert_eq!(plain_number(2.0 / 3.0), "0.67");
    }

    #[test]
    fn test_compact_quantity() {
        assert_eq!(compact_quantity(1_240_000.0), "1.2 triệu");
        assert_eq!(compact_quantity(3_400.0), "3.4 nghìn");
        assert_eq!(compact_quantity(42.0), "42");
    }

    #[test]
    fn test_percent_never_nan() {
        assert_eq!(percent(0.125), "12.5%");
        assert_eq!(percent(f64::NAN), "0.0%");
        assert_eq!(percent(f64::INFINITY), "0.0%");
    }

    #[test]
    fn test_day_label_is_unpadded() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert_eq!(day_label(d), "2/3/2025");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
