//! Environment variable substitution for configuration files
//!
//! Credentials usually should not live in the YAML file itself, so values
//! can reference the environment with `${VAR_NAME}`, or `${VAR_NAME:-fallback}`
//! when an unset variable has a sensible default.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::env;

use crate::config::ConfigError;

/// Matches `${VAR}` and `${VAR:-fallback}`
static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid env var pattern")
});

/// Substitute environment variable references in a string.
///
/// Returns an error listing every referenced variable that is unset and
/// has no fallback.
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing_vars: Vec<String> = Vec::new();

    let result = ENV_VAR_PATTERN.replace_all(input, |caps: &Captures<'_>| {
        let var_name = &caps[1];
        match (env::var(var_name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                if !missing_vars.iter().any(|v| v == var_name) {
                    missing_vars.push(var_name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing_vars.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Missing environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_plain_text_untouched() {
        let input = "bucket: assets\nregion: eu-west-1";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_credentials_substituted() {
        env::set_var("BUCKET_FS_ENV_KEY", "AKIA123");
        env::set_var("BUCKET_FS_ENV_SECRET", "shh");
        let result =
            substitute_env_vars("key: ${BUCKET_FS_ENV_KEY}\nsecret: ${BUCKET_FS_ENV_SECRET}")
                .unwrap();
        assert_eq!(result, "key: AKIA123\nsecret: shh");
        env::remove_var("BUCKET_FS_ENV_KEY");
        env::remove_var("BUCKET_FS_ENV_SECRET");
    }

    #[test]
    fn test_fallback_used_when_unset() {
        let result = substitute_env_vars("endpoint: ${BUCKET_FS_UNSET_ENDPOINT:-localhost:9000}")
            .unwrap();
        assert_eq!(result, "endpoint: localhost:9000");
    }

    #[test]
    fn test_set_variable_wins_over_fallback() {
        env::set_var("BUCKET_FS_ENV_REGION", "us-east-2");
        let result = substitute_env_vars("${BUCKET_FS_ENV_REGION:-eu-west-1}").unwrap();
        assert_eq!(result, "us-east-2");
        env::remove_var("BUCKET_FS_ENV_REGION");
    }

    #[test]
    fn test_missing_variables_reported_once() {
        let err = substitute_env_vars("${BUCKET_FS_MISSING_A} ${BUCKET_FS_MISSING_B} ${BUCKET_FS_MISSING_A}")
            .unwrap_err()
            .to_string();
        assert!(err.contains("BUCKET_FS_MISSING_A"));
        assert!(err.contains("BUCKET_FS_MISSING_B"));
        assert_eq!(err.matches("BUCKET_FS_MISSING_A").count(), 1);
    }

    #[test]
    fn test_bare_dollar_not_substituted() {
        let result = substitute_env_vars("$VAR and {VAR} remain").unwrap();
        assert_eq!(result, "$VAR and {VAR} remain");
    }
}
