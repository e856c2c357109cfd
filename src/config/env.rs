//! Environment variable parsing helpers.
//!
//! Every override goes through a lookup function instead of reading the
//! process environment directly, so tests can supply a fixed map.

use crate::{Error, Result};

/// Looks up a variable in the process environment.
pub(crate) fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Returns the trimmed value, or `None` when unset or blank.
pub(crate) fn string_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses `true`/`1`/`yes` as true and anything else as false.
pub(crate) fn bool_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    string_var(lookup, key).map(|value| {
        let value = value.to_lowercase();
        value == "true" || value == "1" || value == "yes"
    })
}

/// Parses a numeric variable, ignoring values that do not parse.
pub(crate) fn parsed_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    string_var(lookup, key).and_then(|value| value.parse().ok())
}

/// Parses a variable that must be well formed when set.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the variable is set but does not parse.
pub(crate) fn required_parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    string_var(lookup, key)
        .map(|value| {
            value
                .parse()
                .map_err(|e| Error::InvalidInput(format!("{key}={value:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_string_var_trims_and_drops_blank() {
        let lookup = lookup_from(&[("A", "  value "), ("B", "   ")]);
        assert_eq!(string_var(&lookup, "A").as_deref(), Some("value"));
        assert_eq!(string_var(&lookup, "B"), None);
        assert_eq!(string_var(&lookup, "C"), None);
    }

    #[test]
    fn test_bool_var() {
        let lookup = lookup_from(&[("T", "YES"), ("F", "off"), ("ONE", "1")]);
        assert_eq!(bool_var(&lookup, "T"), Some(true));
        assert_eq!(bool_var(&lookup, "F"), Some(false));
        assert_eq!(bool_var(&lookup, "ONE"), Some(true));
        assert_eq!(bool_var(&lookup, "MISSING"), None);
    }

    #[test]
    fn test_parsed_var_ignores_garbage() {
        let lookup = lookup_from(&[("PORT", "8081"), ("BAD", "eighty")]);
        assert_eq!(parsed_var::<u16>(&lookup, "PORT"), Some(8081));
        assert_eq!(parsed_var::<u16>(&lookup, "BAD"), None);
    }

    #[test]
    fn test_required_parse_rejects_garbage() {
        let lookup = lookup_from(&[("PORT", " 8081 "), ("BAD", "60s")]);
        assert_eq!(required_parse::<u16>(&lookup, "PORT").unwrap(), Some(8081));
        assert_eq!(required_parse::<u16>(&lookup, "MISSING").unwrap(), None);
        assert!(matches!(
            required_parse::<u64>(&lookup, "BAD"),
            Err(Error::InvalidInput(_))
        ));
    }
}
