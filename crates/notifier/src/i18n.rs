//! Localization of notification text.

use std::collections::HashMap;

const FALLBACK_LOCALE: &str = "en";

/// Localization collaborator used to render payload text.
pub trait Translator: Send + Sync {
    /// Translate `key` into `locale`, interpolating `{{name}}` placeholders.
    fn translate(&self, key: &str, locale: &str, params: &[(&str, &str)]) -> String;
}

/// Translation catalogs keyed by language, then message key.
pub struct Catalog {
    default_locale: String,
    messages: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
    /// Load the catalogs shipped with the crate (`en`, `es`).
    pub fn bundled(default_locale: &str) -> Result<Self, serde_json::Error> {
        let mut messages = HashMap::new();
        messages.insert(
            "en".to_string(),
            serde_json::from_str(include_str!("../locales/en.json"))?,
        );
        messages.insert(
            "es".to_string(),
            serde_json::from_str(include_str!("../locales/es.json"))?,
        );

        Ok(Self {
            default_locale: default_locale.to_string(),
            messages,
        })
    }

    /// Candidate languages for a requested locale, most specific first:
    /// `es-419` → `es-419`, `es`, then the default locale, then `en`.
    fn candidates<'a>(&'a self, locale: &'a str) -> Vec<&'a str> {
        let mut out = vec![locale];
        if let Some((lang, _)) = locale.split_once(['-', '_']) {
            out.push(lang);
        }
        out.push(self.default_locale.as_str());
        out.push(FALLBACK_LOCALE);
        out
    }

    fn lookup(&self, key: &str, locale: &str) -> Option<&str> {
        self.candidates(locale).into_iter().find_map(|lang| {
            self.messages
                .get(&lang.to_lowercase())
                .and_then(|m| m.get(key))
                .map(String::as_str)
        })
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str, locale: &str, params: &[(&str, &str)]) -> String {
        let Some(template) = self.lookup(key, locale) else {
            tracing::warn!(key, locale, "Missing translation");
            return key.to_string();
        };

        params
            .iter()
            .fold(template.to_string(), |text, (name, value)| {
                text.replace(&format!("{{{{{name}}}}}"), value)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_params() {
        let catalog = Catalog::bundled("en").unwrap();
        let text = catalog.translate(
            "paymentReceivedBody",
            "en",
            &[("amount", "1.50"), ("currency", "cUSD"), ("sender", "0x12...ab")],
        );
        assert_eq!(text, "You received 1.50 cUSD from 0x12...ab");
    }

    #[test]
    fn test_regional_locale_falls_back_to_language() {
        let catalog = Catalog::bundled("en").unwrap();
        let text = catalog.translate("inviteRedeemedTitle", "es-419", &[]);
        assert_eq!(text, "Invitación canjeada");
    }

    #[test]
    fn test_unknown_locale_uses_default() {
        let catalog = Catalog::bundled("es").unwrap();
        assert_eq!(
            catalog.translate("paymentRequestedTitle", "fr", &[]),
            "Solicitud de pago"
        );
    }

    #[test]
    fn test_missing_key_renders_key() {
        let catalog = Catalog::bundled("en").unwrap();
        assert_eq!(catalog.translate("noSuchKey", "en", &[]), "noSuchKey");
    }
}
