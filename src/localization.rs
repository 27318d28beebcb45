use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-flow translation tables: language → item UUID → property → text array.
/// The flow's own base-language text is always the default; lookups only
/// consult these tables for more specific translations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Localization(HashMap<String, HashMap<Uuid, HashMap<String, Vec<String>>>>);

impl Localization {
    /// Returns, per index, the most specific available translation of
    /// `property` on the item identified by `uuid`, falling back to the
    /// default value at that index. The result always has the same length
    /// and order as `defaults`; empty translations never shadow a default.
    pub fn translated_text_array(
        &self,
        uuid: Uuid,
        property: &str,
        defaults: &[String],
        languages: &[String],
    ) -> Vec<String> {
        let mut out = defaults.to_vec();
        for (i, slot) in out.iter_mut().enumerate() {
            for language in languages {
                let translated = self
                    .0
                    .get(language)
                    .and_then(|items| items.get(&uuid))
                    .and_then(|props| props.get(property))
                    .and_then(|texts| texts.get(i));
                if let Some(text) = translated {
                    if !text.is_empty() {
                        *slot = text.clone();
                        break;
                    }
                }
            }
        }
        out
    }
}
