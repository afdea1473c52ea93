//! resolve::primitive
//!
//! Text to primitive conversion with predicate checks.

use serde_json::Value;

use super::value::ArgValue;
use crate::core::types::{format_number, Container, Predicate, Primitive, PrimitiveName, TypeExpr};

const NAMED_COLORS: &[&str] = &[
    "black", "blue", "brown", "cyan", "gray", "green", "grey", "magenta", "navy", "olive",
    "orange", "pink", "purple", "red", "teal", "white", "yellow",
];

/// Parse a textual boolean.
///
/// ```
/// use plugcli::resolve::primitive::parse_bool;
///
/// assert_eq!(parse_bool("Yes"), Some(true));
/// assert_eq!(parse_bool("off"), Some(false));
/// assert_eq!(parse_bool("maybe"), None);
/// ```
pub fn parse_bool(token: &str) -> Option<bool> {
    match token.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" | "y" | "t" => Some(true),
        "0" | "no" | "false" | "off" | "n" | "f" => Some(false),
        _ => None,
    }
}

fn is_color(token: &str) -> bool {
    match token.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => NAMED_COLORS.contains(&token.to_ascii_lowercase().as_str()),
    }
}

/// `x>=0`, `0<x<=1` and so on.
fn describe_range(predicate: &Predicate, integer: bool) -> String {
    if integer {
        if let Some((lo, hi)) = predicate.int_bounds() {
            return match (lo, hi) {
                (Some(lo), Some(hi)) => format!("{}<=x<={}", lo, hi),
                (Some(lo), None) => format!("x>={}", lo),
                (None, Some(hi)) => format!("x<={}", hi),
                (None, None) => "any integer".to_string(),
            };
        }
    }
    match predicate {
        Predicate::Range {
            start,
            end,
            inclusive_start,
            inclusive_end,
        } => {
            let mut text = String::new();
            if let Some(start) = start {
                text.push_str(&format_number(*start));
                text.push_str(if *inclusive_start { "<=" } else { "<" });
            }
            text.push('x');
            if let Some(end) = end {
                text.push_str(if *inclusive_end { "<=" } else { "<" });
                text.push_str(&format_number(*end));
            }
            text
        }
        Predicate::Choices { .. } => predicate.to_string(),
    }
}

fn check_choices(predicate: Option<&Predicate>, token: &str) -> Result<(), String> {
    if let Some(Predicate::Choices { choices }) = predicate {
        if !choices.iter().any(|c| c == token) {
            let quoted: Vec<String> = choices.iter().map(|c| format!("'{}'", c)).collect();
            return Err(format!(
                "'{}' is not one of {}.",
                token,
                quoted.join(", ")
            ));
        }
    }
    Ok(())
}

/// Convert one token to a primitive, enforcing its predicate.
pub fn parse_primitive(primitive: &Primitive, token: &str) -> Result<ArgValue, String> {
    let predicate = primitive.predicate.as_ref();
    match primitive.name {
        PrimitiveName::Int => {
            let value: i64 = token
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not a valid integer.", token))?;
            if let Some(pred) = predicate {
                if let Some((lo, hi)) = pred.int_bounds() {
                    if lo.is_some_and(|lo| value < lo) || hi.is_some_and(|hi| value > hi) {
                        return Err(format!(
                            "{} is not in the range {}.",
                            value,
                            describe_range(pred, true)
                        ));
                    }
                }
            }
            Ok(ArgValue::Int(value))
        }
        PrimitiveName::Float => {
            let value: f64 = token
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not a valid number.", token))?;
            if let Some(pred) = predicate {
                if !pred.contains_float(value) {
                    return Err(format!(
                        "{} is not in the range {}.",
                        format_number(value),
                        describe_range(pred, false)
                    ));
                }
            }
            Ok(ArgValue::Float(value))
        }
        PrimitiveName::Str => {
            check_choices(predicate, token)?;
            Ok(ArgValue::Str(token.to_string()))
        }
        PrimitiveName::Bool => parse_bool(token)
            .map(ArgValue::Bool)
            .ok_or_else(|| format!("'{}' is not a valid boolean.", token)),
        PrimitiveName::Color => {
            if is_color(token) {
                Ok(ArgValue::Str(token.to_ascii_lowercase()))
            } else {
                Err(format!("'{}' is not a valid color.", token))
            }
        }
    }
}

/// Convert a token against a primitive or union of primitives.
///
/// Union members are tried in declaration order; the first that accepts
/// the token wins.
pub fn parse_value(type_expr: &TypeExpr, token: &str) -> Result<ArgValue, String> {
    match type_expr {
        TypeExpr::Primitive(p) => parse_primitive(p, token),
        TypeExpr::Union { members } => {
            let mut errors = Vec::new();
            for member in members {
                match parse_value(member, token) {
                    Ok(value) => return Ok(value),
                    Err(e) => errors.push(e),
                }
            }
            Err(format!(
                "'{}' does not match any of {}: {}",
                token,
                type_expr,
                errors.join(" ")
            ))
        }
        other => Err(format!("{} does not take text values.", other)),
    }
}

/// Convert a declared JSON default into a value of `type_expr`.
pub fn from_default(type_expr: &TypeExpr, default: &Value) -> ArgValue {
    match (type_expr.collection_style(), default) {
        (_, Value::Null) => ArgValue::None,
        (Some(style), Value::Array(items)) => {
            let member = style.members.first().copied();
            let items = items
                .iter()
                .map(|v| match member {
                    Some(m) => from_default(m, v),
                    None => json_scalar(v),
                })
                .collect();
            match style.container {
                Container::List => ArgValue::List(items),
                Container::Set => ArgValue::Set(items),
            }
        }
        (Some(style), Value::Object(map)) => ArgValue::Keyed(
            map.iter()
                .map(|(k, v)| {
                    let value = match style.members.first() {
                        Some(m) => from_default(m, v),
                        None => json_scalar(v),
                    };
                    (k.clone(), value)
                })
                .collect(),
        ),
        (None, v) => match (type_expr, v) {
            (
                TypeExpr::Primitive(Primitive {
                    name: PrimitiveName::Float,
                    ..
                }),
                Value::Number(n),
            ) => n.as_f64().map(ArgValue::Float).unwrap_or(ArgValue::None),
            _ => json_scalar(v),
        },
        (Some(_), v) => json_scalar(v),
    }
}

fn json_scalar(value: &Value) -> ArgValue {
    match value {
        Value::Null => ArgValue::None,
        Value::Bool(b) => ArgValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ArgValue::Int(i),
            None => n.as_f64().map(ArgValue::Float).unwrap_or(ArgValue::None),
        },
        Value::String(s) => ArgValue::Str(s.clone()),
        Value::Array(items) => ArgValue::List(items.iter().map(json_scalar).collect()),
        Value::Object(map) => {
            ArgValue::Keyed(map.iter().map(|(k, v)| (k.clone(), json_scalar(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn int_with(pred: Predicate) -> Primitive {
        Primitive {
            name: PrimitiveName::Int,
            predicate: Some(pred),
        }
    }

    #[test]
    fn negative_rejected_by_open_range() {
        let p = int_with(Predicate::range(Some(0.0), None));
        let err = parse_primitive(&p, "-5").unwrap_err();
        assert_eq!(err, "-5 is not in the range x>=0.");
        assert_eq!(parse_primitive(&p, "0").unwrap(), ArgValue::Int(0));
    }

    #[test]
    fn exclusive_start_raises_minimum() {
        let p = int_with(Predicate::Range {
            start: Some(0.0),
            end: Some(10.0),
            inclusive_start: false,
            inclusive_end: false,
        });
        assert!(parse_primitive(&p, "0").is_err());
        assert!(parse_primitive(&p, "1").is_ok());
        assert!(parse_primitive(&p, "9").is_ok());
        assert_eq!(parse_primitive(&p, "10").unwrap_err(), "10 is not in the range 1<=x<=9.");
    }

    #[test]
    fn float_range_honors_inclusivity() {
        let p = Primitive {
            name: PrimitiveName::Float,
            predicate: Some(Predicate::range(Some(0.0), Some(1.0))),
        };
        assert!(parse_primitive(&p, "0").is_ok());
        assert_eq!(parse_primitive(&p, "1").unwrap_err(), "1 is not in the range 0<=x<1.");
    }

    #[test]
    fn choices_enforced() {
        let p = Primitive {
            name: PrimitiveName::Str,
            predicate: Some(Predicate::choices(["cat", "dog"])),
        };
        assert!(parse_primitive(&p, "cat").is_ok());
        assert_eq!(
            parse_primitive(&p, "cow").unwrap_err(),
            "'cow' is not one of 'cat', 'dog'."
        );
    }

    #[test]
    fn colors() {
        let p = Primitive {
            name: PrimitiveName::Color,
            predicate: None,
        };
        assert!(parse_primitive(&p, "#A0b").is_ok());
        assert!(parse_primitive(&p, "Red").is_ok());
        assert!(parse_primitive(&p, "#12345").is_err());
    }

    #[test]
    fn union_tries_members_in_order() {
        let t = TypeExpr::union(vec![
            TypeExpr::int(),
            TypeExpr::primitive(PrimitiveName::Str, None),
        ]);
        assert_eq!(parse_value(&t, "4").unwrap(), ArgValue::Int(4));
        assert_eq!(parse_value(&t, "auto").unwrap(), ArgValue::Str("auto".into()));
    }

    #[test]
    fn defaults_follow_type() {
        let float = TypeExpr::primitive(PrimitiveName::Float, None);
        assert_eq!(from_default(&float, &json!(1)), ArgValue::Float(1.0));
        assert_eq!(
            from_default(&TypeExpr::set(TypeExpr::int()), &json!([1, 2])),
            ArgValue::Set(vec![ArgValue::Int(1), ArgValue::Int(2)])
        );
        assert_eq!(from_default(&TypeExpr::int(), &json!(null)), ArgValue::None);
    }
}
