use crate::types::{Config, Role};
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Secrets live in the environment, not in the YAML file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SUPABASE_URL") {
            self.store.url = url;
        }
        if let Some(key) = lookup("SUPABASE_KEY") {
            self.store.api_key = key;
        }
        if let Some(token) = lookup("TELEGRAM_TOKEN").filter(|t| !t.is_empty()) {
            self.notifier.token = Some(token);
        }
        if let Some(chat_id) = lookup("TELEGRAM_CHAT_ID") {
            self.notifier.chat_id = chat_id;
        }
    }

    /// An empty role list runs both loops in this process.
    pub fn runs(&self, role: Role) -> bool {
        self.roles.is_empty() || self.roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_secrets() {
        let env: HashMap<&str, &str> = [
            ("SUPABASE_URL", "https://db.example.test"),
            ("SUPABASE_KEY", "secret"),
            ("TELEGRAM_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "42"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.store.url, "https://db.example.test");
        assert_eq!(config.store.api_key, "secret");
        assert_eq!(config.notifier.token.as_deref(), Some("123:abc"));
        assert_eq!(config.notifier.chat_id, "42");
    }

    #[test]
    fn test_empty_token_keeps_notifier_disabled() {
        let mut config = Config::default();
        config.apply_env(|k| (k == "TELEGRAM_TOKEN").then(String::new));
        assert!(config.notifier.token.is_none());
    }

    #[test]
    fn test_roles() {
        let mut config = Config::default();
        assert!(config.runs(Role::Decision));
        assert!(config.runs(Role::Dispatcher));

        config.roles = vec![Role::Dispatcher];
        assert!(!config.runs(Role::Decision));
        assert!(config.runs(Role::Dispatcher));
    }
}
