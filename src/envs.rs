use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::contact::Contact;

fn default_country() -> String {
    "US".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Session-wide defaults: which languages are in play, where phone numbers
/// without a country prefix belong, and what timezone timestamps render in.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Environment {
    #[serde(default)]
    allowed_languages: Vec<String>,
    #[serde(default = "default_country")]
    default_country: String,
    #[serde(default = "default_timezone")]
    timezone: String,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            allowed_languages: Vec::new(),
            default_country: default_country(),
            timezone: default_timezone(),
        }
    }
}

impl Environment {
    pub fn new(allowed_languages: Vec<String>, default_country: impl Into<String>, timezone: impl Into<String>) -> Self {
        Environment {
            allowed_languages,
            default_country: default_country.into(),
            timezone: timezone.into(),
        }
    }

    pub fn allowed_languages(&self) -> &[String] {
        &self.allowed_languages
    }

    pub fn default_country(&self) -> &str {
        &self.default_country
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Language priority used for localization lookups: the contact's
    /// language first (when the environment allows it, or when the
    /// environment doesn't restrict languages at all), then the remaining
    /// allowed languages in order, without duplicates.
    pub fn language_priority(&self, contact: &Contact) -> Vec<String> {
        let mut languages = Vec::with_capacity(self.allowed_languages.len() + 1);
        if let Some(lang) = contact.language() {
            if self.allowed_languages.is_empty() || self.allowed_languages.iter().any(|l| l == lang) {
                languages.push(lang.to_string());
            }
        }
        for lang in &self.allowed_languages {
            if !languages.iter().any(|l| l == lang) {
                languages.push(lang.clone());
            }
        }
        languages
    }
}
