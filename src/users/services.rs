use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::users::dto::{Issue, UserInput};

// Lengths are counted in Unicode scalar values (`chars()`), so a name of
// astral-plane characters may hold up to twice as many UTF-16 code units.
pub const NAME_MAX_CHARS: usize = 120;
pub const EMAIL_MAX_CHARS: usize = 254;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$"
        )
        .unwrap();
    }
    !email.starts_with('.') && !email.contains("..") && EMAIL_RE.is_match(email)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_field<'a>(body: &'a Value, field: &str, issues: &mut Vec<Issue>) -> Option<&'a str> {
    match body.get(field) {
        None => {
            issues.push(Issue::new("invalid_type", Some(field), "Required"));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(other) => {
            issues.push(Issue::new(
                "invalid_type",
                Some(field),
                format!("Expected string, received {}", type_name(other)),
            ));
            None
        }
    }
}

/// Checks a `POST /users` body. All problems are reported at once; nothing
/// else in the request is touched until this returns `Ok`.
pub fn validate_user_input(body: &Value) -> Result<UserInput, Vec<Issue>> {
    if !body.is_object() {
        return Err(vec![Issue::new(
            "invalid_type",
            None,
            format!("Expected object, received {}", type_name(body)),
        )]);
    }

    let mut issues = Vec::new();

    let name = string_field(body, "name", &mut issues);
    if let Some(name) = name {
        let len = name.chars().count();
        if len < 1 {
            issues.push(Issue::new(
                "too_small",
                Some("name"),
                "String must contain at least 1 character(s)",
            ));
        }
        if len > NAME_MAX_CHARS {
            issues.push(Issue::new(
                "too_big",
                Some("name"),
                format!("String must contain at most {NAME_MAX_CHARS} character(s)"),
            ));
        }
    }

    let email = string_field(body, "email", &mut issues);
    if let Some(email) = email {
        if !is_valid_email(email) {
            issues.push(Issue::new("invalid_string", Some("email"), "Invalid email"));
        }
        if email.chars().count() > EMAIL_MAX_CHARS {
            issues.push(Issue::new(
                "too_big",
                Some("email"),
                format!("String must contain at most {EMAIL_MAX_CHARS} character(s)"),
            ));
        }
    }

    match (name, email) {
        (Some(name), Some(email)) if issues.is_empty() => Ok(UserInput {
            name: name.to_string(),
            email: email.to_string(),
        }),
        _ => Err(issues),
    }
}

/// Loose numeric coercion for query values: blank means zero, anything that
/// is not a plain number literal is NaN.
fn coerce_number(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s.trim_start_matches(['+', '-']) {
        "Infinity" => {
            return if s.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        }
        rest if rest.is_empty() => return f64::NAN,
        _ => {}
    }
    if let Some(n) = radix_literal(s) {
        return n;
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// Unsigned `0x`/`0o`/`0b` integer literals. Signed or empty ones are NaN.
fn radix_literal(s: &str) -> Option<f64> {
    let radix = match s.get(..2)?.to_ascii_lowercase().as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let digits = &s[2..];
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    Some(
        digits
            .chars()
            .try_fold(0f64, |acc, c| {
                c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
            })
            .unwrap_or(f64::NAN),
    )
}

/// Effective page size for `GET /users`: absent, non-numeric, zero or
/// negative values fall back to the default; anything else is capped.
pub fn effective_limit(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return DEFAULT_LIST_LIMIT;
    };
    let n = coerce_number(raw);
    if n.is_nan() || n <= 0.0 {
        return DEFAULT_LIST_LIMIT;
    }
    let capped = n.min(MAX_LIST_LIMIT as f64).trunc() as i64;
    if capped < 1 {
        DEFAULT_LIST_LIMIT
    } else {
        capped
    }
}

/// Picks `limit` out of the query pairs. A repeated `limit` is not a
/// number and gets the default.
pub fn limit_from_query(params: &[(String, String)]) -> i64 {
    let limits: Vec<&str> = params
        .iter()
        .filter(|(k, _)| k == "limit")
        .map(|(_, v)| v.as_str())
        .collect();
    match limits.as_slice() {
        [] => effective_limit(None),
        [one] => effective_limit(Some(*one)),
        _ => DEFAULT_LIST_LIMIT,
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use serde_json::json;

    fn codes(issues: &[Issue]) -> Vec<(&'static str, String)> {
        issues
            .iter()
            .map(|i| (i.code, i.path.join(".")))
            .collect()
    }

    #[test]
    fn accepts_plain_input() {
        let input = validate_user_input(&json!({"name": "Ana", "email": "ana@example.com"}))
            .expect("valid");
        assert_eq!(input.name, "Ana");
        assert_eq!(input.email, "ana@example.com");
    }

    #[test]
    fn ignores_unknown_fields() {
        let input = validate_user_input(
            &json!({"name": "Ana", "email": "ana@example.com", "role": "admin"}),
        )
        .expect("valid");
        assert_eq!(input.name, "Ana");
    }

    #[test]
    fn empty_name_is_too_small() {
        let issues = validate_user_input(&json!({"name": "", "email": "ana@example.com"}))
            .unwrap_err();
        assert_eq!(codes(&issues), vec![("too_small", "name".to_string())]);
        assert_eq!(issues[0].message, "String must contain at least 1 character(s)");
    }

    #[test]
    fn name_length_counts_characters_not_bytes() {
        let name: String = "é".repeat(120);
        assert!(validate_user_input(&json!({"name": name, "email": "a@b.io"})).is_ok());

        let name: String = "é".repeat(121);
        let issues = validate_user_input(&json!({"name": name, "email": "a@b.io"})).unwrap_err();
        assert_eq!(codes(&issues), vec![("too_big", "name".to_string())]);
    }

    #[test]
    fn astral_characters_count_once() {
        let name: String = "🦀".repeat(NAME_MAX_CHARS);
        assert_eq!(name.encode_utf16().count(), 2 * NAME_MAX_CHARS);
        assert!(validate_user_input(&json!({"name": name, "email": "a@b.io"})).is_ok());
    }

    #[test]
    fn missing_fields_are_required() {
        let issues = validate_user_input(&json!({})).unwrap_err();
        assert_eq!(
            codes(&issues),
            vec![
                ("invalid_type", "name".to_string()),
                ("invalid_type", "email".to_string())
            ]
        );
        assert!(issues.iter().all(|i| i.message == "Required"));
    }

    #[test]
    fn wrong_types_are_reported() {
        let issues = validate_user_input(&json!({"name": 42, "email": null})).unwrap_err();
        assert_eq!(issues[0].message, "Expected string, received number");
        assert_eq!(issues[1].message, "Expected string, received null");
    }

    #[test]
    fn non_object_body_is_rejected() {
        let issues = validate_user_input(&json!(["Ana"])).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].path.is_empty());
        assert_eq!(issues[0].message, "Expected object, received array");
    }

    #[test]
    fn overlong_email_reports_both_problems() {
        let email = format!("{}@example.com", "a".repeat(250));
        let issues = validate_user_input(&json!({"name": "Ana", "email": "x"})).unwrap_err();
        assert_eq!(codes(&issues), vec![("invalid_string", "email".to_string())]);

        let issues = validate_user_input(&json!({"name": "Ana", "email": email})).unwrap_err();
        assert_eq!(codes(&issues), vec![("too_big", "email".to_string())]);
    }

    #[test]
    fn email_syntax() {
        for ok in [
            "ana@example.com",
            "first.last+tag@sub.example.co",
            "o'neil@example.org",
            "A_B-C@EXAMPLE.COM",
        ] {
            assert!(is_valid_email(ok), "{ok} should be valid");
        }
        for bad in [
            "",
            "ana",
            "ana@",
            "@example.com",
            ".ana@example.com",
            "a..b@example.com",
            "ana@example",
            "ana@example.c",
            "ana@-example.com",
            "ana @example.com",
            "ana.@example.com",
        ] {
            assert!(!is_valid_email(bad), "{bad} should be invalid");
        }
    }
}
