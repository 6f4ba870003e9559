//! Request locale resolution
//!
//! Translatable properties are stored as `{"en_US": "...", "tr_TR": "..."}`.
//! A request resolves once to a `best` language and a `fallback` (the
//! configured default).

use serde::{Deserialize, Serialize};

use crate::config::LocalizationConfig;

/// Resolved locale for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub best: String,
    pub fallback: String,
}

impl Locale {
    pub fn new(best: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            best: best.into(),
            fallback: fallback.into(),
        }
    }

    /// Resolves the caller language against stored preferences.
    ///
    /// `language` may be a single tag (`tr_TR`, `tr-TR`) or an
    /// Accept-Language list (`tr-TR,en;q=0.8`). Candidates are tried in
    /// order: exact supported match first, then primary subtag (`en` →
    /// `en_US`). Unmatched or missing input resolves to the default.
    pub fn resolve(language: Option<&str>, preferences: &LocalizationConfig) -> Self {
        let fallback = preferences.default_language.clone();

        let best = language
            .into_iter()
            .flat_map(|l| l.split(','))
            .map(|candidate| {
                candidate
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .replace('-', "_")
            })
            .filter(|candidate| !candidate.is_empty())
            .find_map(|candidate| match_supported(&candidate, &preferences.supported_languages))
            .unwrap_or_else(|| fallback.clone());

        Self { best, fallback }
    }
}

fn match_supported(candidate: &str, supported: &[String]) -> Option<String> {
    if let Some(exact) = supported
        .iter()
        .find(|s| s.eq_ignore_ascii_case(candidate))
    {
        return Some(exact.clone());
    }

    let primary = candidate.split('_').next()?;
    supported
        .iter()
        .find(|s| {
            s.split('_')
                .next()
                .is_some_and(|p| p.eq_ignore_ascii_case(primary))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs() -> LocalizationConfig {
        LocalizationConfig {
            default_language: "en_US".into(),
            supported_languages: vec!["en_US".into(), "tr_TR".into(), "de_DE".into()],
        }
    }

    #[test]
    fn test_exact_and_dash_normalized() {
        assert_eq!(
            Locale::resolve(Some("tr_TR"), &prefs()),
            Locale::new("tr_TR", "en_US")
        );
        assert_eq!(Locale::resolve(Some("tr-tr"), &prefs()).best, "tr_TR");
    }

    #[test]
    fn test_primary_subtag() {
        assert_eq!(Locale::resolve(Some("de"), &prefs()).best, "de_DE");
    }

    #[test]
    fn test_accept_language_list() {
        assert_eq!(
            Locale::resolve(Some("fr-FR,tr;q=0.8,en;q=0.5"), &prefs()).best,
            "tr_TR"
        );
    }

    #[test]
    fn test_unsupported_or_missing_falls_back() {
        assert_eq!(Locale::resolve(Some("ja_JP"), &prefs()).best, "en_US");
        assert_eq!(Locale::resolve(None, &prefs()), Locale::new("en_US", "en_US"));
    }
}
