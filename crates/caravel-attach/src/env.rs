//! Session environment construction.
//!
//! A one-off inherits two fixed keys describing the client side plus any
//! `--env KEY=VALUE` overrides given on the command line.

use std::collections::BTreeMap;

use crate::error::AttachError;

/// Build the effective environment for a one-off.
///
/// Fixed keys: `TERM` (the local terminal type, empty if unset) and
/// `CLIENT_OS` (the client operating system). Overrides are split on the
/// first `=`, so values may themselves contain `=`. Overrides win over
/// the fixed keys.
///
/// # Errors
///
/// Returns [`AttachError::EnvFormat`] for an override with no `=`, an
/// empty key or an empty value.
pub fn build_session_env(overrides: &[String]) -> Result<BTreeMap<String, String>, AttachError> {
    let mut env = BTreeMap::new();
    env.insert(
        "TERM".to_string(),
        std::env::var("TERM").unwrap_or_default(),
    );
    env.insert(
        "CLIENT_OS".to_string(),
        std::env::consts::OS.to_string(),
    );

    for override_ in overrides {
        let Some((key, value)) = override_.split_once('=') else {
            return Err(AttachError::EnvFormat(override_.clone()));
        };
        if key.is_empty() || value.is_empty() {
            return Err(AttachError::EnvFormat(override_.clone()));
        }
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_keys_are_present() {
        let env = build_session_env(&[]).expect("should build");
        assert!(env.contains_key("TERM"));
        assert_eq!(env.get("CLIENT_OS"), Some(&std::env::consts::OS.to_string()));
    }

    #[test]
    fn splits_on_first_equals_only() {
        let env = build_session_env(&["TEST=a=b".into()]).expect("should build");
        assert_eq!(env.get("TEST"), Some(&"a=b".to_string()));
    }

    #[test]
    fn override_wins_over_fixed_key() {
        let env = build_session_env(&["TERM=vt100".into()]).expect("should build");
        assert_eq!(env.get("TERM"), Some(&"vt100".to_string()));
    }

    #[test]
    fn rejects_override_without_equals() {
        let result = build_session_env(&["NOEQUALS".into()]);
        assert!(matches!(result, Err(AttachError::EnvFormat(_))));
    }

    #[test]
    fn rejects_empty_key() {
        let result = build_session_env(&["=value".into()]);
        assert!(matches!(result, Err(AttachError::EnvFormat(_))));
    }

    #[test]
    fn rejects_empty_value() {
        let result = build_session_env(&["KEY=".into()]);
        assert!(matches!(result, Err(AttachError::EnvFormat(_))));
    }

    #[test]
    fn later_overrides_win() {
        let env =
            build_session_env(&["A=1".into(), "A=2".into()]).expect("should build");
        assert_eq!(env.get("A"), Some(&"2".to_string()));
    }
}
