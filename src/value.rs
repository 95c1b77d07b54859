use std::cmp::Ordering;
use std::fmt;
use std::num::ParseIntError;

use chrono::NaiveDate;
use thiserror::Error;

use crate::parser::quote_if_needed;
use crate::schema::ValueType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A literal converted to the value type of the attribute it is compared against
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
    String(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("not a base-10 integer ({0})")]
    Integer(#[from] ParseIntError),
    #[error("not a decimal number (digits with at most one '.')")]
    Decimal,
    #[error("not a calendar date in YYYY-MM-DD form ({0})")]
    Date(#[from] chrono::ParseError),
    #[error("expected 'true' or 'false'")]
    Boolean,
}

/// Convert a raw query literal into `target`.
pub fn coerce(raw: &str, target: ValueType) -> Result<CoercedValue, CoercionError> {
    let value = match target {
        ValueType::String => CoercedValue::String(raw.to_string()),
        ValueType::Integer => CoercedValue::Integer(raw.parse()?),
        ValueType::Decimal => CoercedValue::Decimal(parse_decimal(raw)?),
        ValueType::Date => CoercedValue::Date(NaiveDate::parse_from_str(raw, DATE_FORMAT)?),
        ValueType::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                CoercedValue::Boolean(true)
            } else if raw.eq_ignore_ascii_case("false") {
                CoercedValue::Boolean(false)
            } else {
                return Err(CoercionError::Boolean);
            }
        }
    };
    Ok(value)
}

fn parse_decimal(raw: &str) -> Result<f64, CoercionError> {
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    let well_formed = unsigned.chars().any(|c| c.is_ascii_digit())
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.matches('.').count() <= 1;
    if !well_formed {
        return Err(CoercionError::Decimal);
    }

    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(CoercionError::Decimal),
    }
}

impl CoercedValue {
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            CoercedValue::String(_) => Some(ValueType::String),
            CoercedValue::Integer(_) => Some(ValueType::Integer),
            CoercedValue::Decimal(_) => Some(ValueType::Decimal),
            CoercedValue::Date(_) => Some(ValueType::Date),
            CoercedValue::Boolean(_) => Some(ValueType::Boolean),
            CoercedValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CoercedValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CoercedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Order a record value (`self`) against a query value.
    ///
    /// Values of the same type use their natural order. Integers and decimals
    /// compare numerically. A record string is coerced to the query's type
    /// first, and a non-string record value is compared by its text against a
    /// query string. `None` means the two values cannot be compared.
    pub fn compare_to(&self, query: &CoercedValue) -> Option<Ordering> {
        use CoercedValue::*;

        match (self, query) {
            (Null, _) | (_, Null) => None,
            (String(a), String(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Decimal(a), Decimal(b)) => a.partial_cmp(b),
            (Integer(a), Decimal(b)) => (*a as f64).partial_cmp(b),
            (Decimal(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Date(a), Date(b)) => Some(a.cmp(b)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (String(raw), other) => {
                let target = other.value_type()?;
                coerce(raw, target).ok()?.compare_to(other)
            }
            (other, String(b)) => Some(other.to_string().as_str().cmp(b.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for CoercedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercedValue::String(s) => write!(f, "{}", quote_if_needed(s)),
            CoercedValue::Integer(n) => write!(f, "{}", n),
            CoercedValue::Decimal(n) => write!(f, "{}", n),
            CoercedValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            CoercedValue::Boolean(b) => write!(f, "{}", b),
            CoercedValue::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> CoercedValue {
        CoercedValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce("18", ValueType::Integer), Ok(CoercedValue::Integer(18)));
        assert_eq!(coerce("-7", ValueType::Integer), Ok(CoercedValue::Integer(-7)));
        assert_eq!(coerce("+7", ValueType::Integer), Ok(CoercedValue::Integer(7)));
        assert!(matches!(
            coerce("abc", ValueType::Integer),
            Err(CoercionError::Integer(_))
        ));
        assert!(coerce("1.5", ValueType::Integer).is_err());
        assert!(coerce("99999999999999999999", ValueType::Integer).is_err());
    }

    #[test]
    fn test_coerce_decimal() {
        assert_eq!(coerce("1.25", ValueType::Decimal), Ok(CoercedValue::Decimal(1.25)));
        assert_eq!(coerce("-3", ValueType::Decimal), Ok(CoercedValue::Decimal(-3.0)));
        for bad in ["1.2.3", "1e5", "inf", "NaN", "", "-", ".", "1,5"] {
            assert_eq!(
                coerce(bad, ValueType::Decimal),
                Err(CoercionError::Decimal),
                "{:?} should not coerce",
                bad
            );
        }
    }

    #[test]
    fn test_coerce_date() {
        assert_eq!(coerce("2020-02-29", ValueType::Date), Ok(date(2020, 2, 29)));
        assert!(matches!(
            coerce("2021-02-29", ValueType::Date),
            Err(CoercionError::Date(_))
        ));
        assert!(coerce("29/02/2020", ValueType::Date).is_err());
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(coerce("TRUE", ValueType::Boolean), Ok(CoercedValue::Boolean(true)));
        assert_eq!(coerce("False", ValueType::Boolean), Ok(CoercedValue::Boolean(false)));
        assert_eq!(coerce("yes", ValueType::Boolean), Err(CoercionError::Boolean));
    }

    #[test]
    fn test_string_is_verbatim() {
        let value = coerce(" Mixed Case ", ValueType::String).unwrap();
        assert_eq!(value.as_str(), Some(" Mixed Case "));
        assert_eq!(CoercedValue::Integer(1).as_str(), None);
        assert_eq!(
            coerce(" Mixed Case ", ValueType::String),
            Ok(CoercedValue::String(" Mixed Case ".to_string()))
        );
    }

    #[test]
    fn test_compare_same_type() {
        assert_eq!(
            CoercedValue::Integer(20).compare_to(&CoercedValue::Integer(18)),
            Some(Ordering::Greater)
        );
        assert_eq!(date(2020, 1, 1).compare_to(&date(2021, 1, 1)), Some(Ordering::Less));
        assert_eq!(
            CoercedValue::String("b".into()).compare_to(&CoercedValue::String("a".into())),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_compare_numeric_across_types() {
        assert_eq!(
            CoercedValue::Integer(2).compare_to(&CoercedValue::Decimal(2.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            CoercedValue::Decimal(1.5).compare_to(&CoercedValue::Integer(2)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_record_string_coerced_to_query_type() {
        let stored = CoercedValue::String("2020-05-01".to_string());
        assert_eq!(stored.compare_to(&date(2020, 5, 1)), Some(Ordering::Equal));

        let stored = CoercedValue::String("not a date".to_string());
        assert_eq!(stored.compare_to(&date(2020, 5, 1)), None);
    }

    #[test]
    fn test_null_is_incomparable() {
        assert_eq!(CoercedValue::Null.compare_to(&CoercedValue::Integer(1)), None);
        assert_eq!(CoercedValue::Integer(1).compare_to(&CoercedValue::Null), None);
        assert_eq!(
            CoercedValue::Boolean(true).compare_to(&date(2020, 1, 1)),
            None
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(date(2020, 3, 4).to_string(), "2020-03-04");
        assert_eq!(CoercedValue::String("a b".into()).to_string(), "\"a b\"");
        assert_eq!(CoercedValue::Decimal(2.5).to_string(), "2.5");
        assert_eq!(CoercedValue::Boolean(false).to_string(), "false");
    }
}
