//! Message localisation for the rating endpoint.
//!
//! The language comes from the `lang` query parameter, then the `lang`
//! cookie, and falls back to English. Tags are matched on their primary
//! subtag, so `fr-CA` selects French.

use axum::http::{header, HeaderMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    En,
    Es,
    Fr,
    De,
}

impl Lang {
    /// Parse a language tag; `None` for unsupported languages.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Lang::En),
            "es" => Some(Lang::Es),
            "fr" => Some(Lang::Fr),
            "de" => Some(Lang::De),
            _ => None,
        }
    }

    pub fn already_voted(&self) -> &'static str {
        match self {
            Lang::En => "You have already rated today. Please come back tomorrow.",
            Lang::Es => "Ya has votado hoy. Vuelve mañana, por favor.",
            Lang::Fr => "Vous avez déjà voté aujourd'hui. Revenez demain.",
            Lang::De => "Sie haben heute bereits abgestimmt. Bitte kommen Sie morgen wieder.",
        }
    }
}

/// Pick the response language for a request.
pub fn negotiate(query_lang: Option<&str>, headers: &HeaderMap) -> Lang {
    query_lang
        .and_then(Lang::from_tag)
        .or_else(|| cookie(headers, "lang").and_then(|v| Lang::from_tag(&v)))
        .unwrap_or_default()
}

/// Value of cookie `name`, if the request carries it.
fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
}
