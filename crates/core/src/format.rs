use rust_decimal::{Decimal, RoundingStrategy};

/// `$1,234,567.89`, rounded half away from zero.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

/// Capitalizes the first letter of every alphanumeric run: `professional_services` ->
/// `Professional_Services`.
pub fn title_case(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                output.extend(ch.to_uppercase());
            } else {
                output.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            output.push(ch);
            at_word_start = true;
        }
    }
    output
}

/// Lowercase file-name-safe form: `Joe's Diner` -> `joes_diner`.
pub fn slugify(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|ch| match ch {
            'a'..='z' | '0'..='9' | '-' | '_' => Some(ch),
            ' ' => Some('_'),
            _ => None,
        })
        .collect()
}
