use lazy_static::lazy_static;
use regex::Regex;

use crate::config::FormatConfig;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
    static ref PASSWORD_RE: Regex = Regex::new(r"^[\x21-\x7E]+$").unwrap();
}

/// Username and password shape checks; bounds come from configuration.
#[derive(Debug, Clone)]
pub struct FormatRules {
    config: FormatConfig,
}

impl FormatRules {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn username(&self, username: &str) -> bool {
        let len = username.chars().count();
        len >= self.config.username_min_len
            && len <= self.config.username_max_len
            && USERNAME_RE.is_match(username)
    }

    pub fn password(&self, password: &str) -> bool {
        let len = password.len();
        len >= self.config.password_min_len
            && len <= self.config.password_max_len
            && PASSWORD_RE.is_match(password)
    }
}
