//! Tera filters used by the quote report template.
//!
//! - `money`: `amount | money` renders `$1,234.50`
//! - `format`: printf-style precision, `"%.2f" | format(value=factor)`
//!
//! Amounts arrive either as JSON numbers or as the decimal strings `rust_decimal`
//! serializes to; both are read without going through `f64`.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use tera::{Tera, Value};

use autouw_core::format::format_money;

pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("format", format_filter);
    tera.register_filter("money", money_filter);
}

fn money_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(format_money(decimal_from(value))))
}

fn format_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let pattern =
        value.as_str().ok_or_else(|| tera::Error::msg("format filter expects a string input"))?;
    let number = args
        .get("value")
        .map(decimal_from)
        .ok_or_else(|| tera::Error::msg("format filter requires a 'value' argument"))?;

    let rendered = match pattern.strip_prefix("%.").and_then(|rest| rest.strip_suffix('f')) {
        Some(precision) => {
            let precision: u32 = precision.parse().unwrap_or(2);
            format!("{:.*}", precision as usize, number.round_dp(precision))
        }
        None => number.to_string(),
    };
    Ok(Value::String(rendered))
}

/// Null and non-numeric values render as zero.
fn decimal_from(value: &Value) -> Decimal {
    match value {
        Value::Number(number) => Decimal::from_str(&number.to_string()).unwrap_or_default(),
        Value::String(text) => Decimal::from_str(text.trim()).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}
