use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub command_prefix: String,
    pub database_path: String,
    /// Bound on opening the store at startup. Command transactions use the
    /// store's own fixed wait, not this.
    pub store_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or("DISCORD_TOKEN must be set to authenticate")?;

        let database_path = lookup("DATABASE_PATH").unwrap_or_else(|| "./D0g.db".to_string());
        if database_path.is_empty() {
            return Err("DATABASE_PATH must not be empty".to_string());
        }

        let store_timeout = match lookup("STORE_TIMEOUT_SECS") {
            Some(secs) => match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err("STORE_TIMEOUT_SECS must be a positive whole number of seconds".to_string()),
            },
            None => Duration::from_secs(1),
        };

        Ok(Self {
            discord_token,
            command_prefix: lookup("COMMAND_PREFIX")
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "!".to_string()),
            database_path,
            store_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DISCORD_TOKEN", "abc")]).unwrap();
        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.database_path, "./D0g.db");
        assert_eq!(config.store_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("COMMAND_PREFIX", "?"),
            ("DATABASE_PATH", "/var/lib/d0g/bot.db"),
            ("STORE_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.command_prefix, "?");
        assert_eq!(config.database_path, "/var/lib/d0g/bot.db");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_token_is_an_error() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("DISCORD_TOKEN", "")]).is_err());
    }

    #[test]
    fn test_bad_values_are_errors() {
        assert!(config_from(&[("DISCORD_TOKEN", "abc"), ("STORE_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("DISCORD_TOKEN", "abc"), ("STORE_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("DISCORD_TOKEN", "abc"), ("DATABASE_PATH", "")]).is_err());
    }
}
