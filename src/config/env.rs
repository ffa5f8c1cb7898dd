//! Environment variable helpers.
//!
//! `.env` files are loaded into the process environment by `main.rs` before
//! any of these run, so they only ever look at `std::env`.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Read a variable, treating unset and blank the same.
pub(super) fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read and parse a variable. Unset is `Ok(None)`; unparsable is an error
/// naming the variable.
pub(super) fn parse<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: Display,
{
    match var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name} ('{raw}'): {e}").into()),
        None => Ok(None),
    }
}

/// Read a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
pub(super) fn parse_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    let Some(raw) = var(name) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(format!("Invalid boolean for {name}: '{raw}'").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_var_treats_blank_as_unset() {
        unsafe {
            env::set_var("RELAY_TEST_BLANK", "   ");
        }
        assert_eq!(var("RELAY_TEST_BLANK"), None);
        unsafe {
            env::remove_var("RELAY_TEST_BLANK");
        }
    }

    #[test]
    #[serial]
    fn test_parse_reports_variable_name() {
        unsafe {
            env::set_var("RELAY_TEST_NUMBER", "abc");
        }
        let err = parse::<u16>("RELAY_TEST_NUMBER").unwrap_err();
        assert!(err.to_string().contains("RELAY_TEST_NUMBER"));

        unsafe {
            env::set_var("RELAY_TEST_NUMBER", "42");
        }
        assert_eq!(parse::<u16>("RELAY_TEST_NUMBER").unwrap(), Some(42));
        unsafe {
            env::remove_var("RELAY_TEST_NUMBER");
        }
        assert_eq!(parse::<u16>("RELAY_TEST_NUMBER").unwrap(), None);
    }

    #[test]
    #[serial]
    fn test_parse_bool_variants() {
        for (raw, expected) in [("true", true), ("1", true), ("No", false), ("off", false)] {
            unsafe {
                env::set_var("RELAY_TEST_FLAG", raw);
            }
            assert_eq!(parse_bool("RELAY_TEST_FLAG").unwrap(), Some(expected));
        }
        unsafe {
            env::set_var("RELAY_TEST_FLAG", "maybe");
        }
        assert!(parse_bool("RELAY_TEST_FLAG").is_err());
        unsafe {
            env::remove_var("RELAY_TEST_FLAG");
        }
    }
}
