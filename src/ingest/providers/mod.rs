// src/ingest/providers/mod.rs
pub mod fun_facts;
pub mod http;
pub mod nasa_apod;
pub mod numbers;
pub mod on_this_day;
pub mod wikipedia;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::ingest::types::SourceProvider;

pub use fun_facts::FunFactsSource;
pub use nasa_apod::NasaApodSource;
pub use numbers::NumbersSource;
pub use on_this_day::OnThisDaySource;
pub use wikipedia::WikipediaSource;

/// The built-in sources. Names parse case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum SourceKind {
    Wikipedia,
    Nasa,
    Numbers,
    OnThisDay,
    FunFacts,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Wikipedia,
        SourceKind::Nasa,
        SourceKind::Numbers,
        SourceKind::OnThisDay,
        SourceKind::FunFacts,
    ];

    /// Same string the provider reports from `SourceProvider::name`.
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Wikipedia => "Wikipedia",
            SourceKind::Nasa => "NASA",
            SourceKind::Numbers => "NumbersAPI",
            SourceKind::OnThisDay => "OnThisDay",
            SourceKind::FunFacts => "FunFacts",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SourceKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownSource(wanted.to_string()))
    }
}

impl TryFrom<String> for SourceKind {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub request_timeout: Duration,
    pub nasa_api_key: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            request_timeout: http::DEFAULT_TIMEOUT,
            nasa_api_key: "DEMO_KEY".to_string(),
        }
    }
}

/// Build one provider per kind, in the order given. All providers share one client.
pub fn build_sources(
    settings: &SourceSettings,
    kinds: &[SourceKind],
) -> Result<Vec<Arc<dyn SourceProvider>>, ConfigError> {
    let client = http::build_client(settings.request_timeout)
        .map_err(|e| ConfigError::Other(format!("{e:#}")))?;

    Ok(kinds
        .iter()
        .map(|kind| -> Arc<dyn SourceProvider> {
            match kind {
                SourceKind::Wikipedia => Arc::new(WikipediaSource::new(client.clone())),
                SourceKind::Nasa => Arc::new(NasaApodSource::new(
                    client.clone(),
                    settings.nasa_api_key.clone(),
                )),
                SourceKind::Numbers => Arc::new(NumbersSource::new(client.clone())),
                SourceKind::OnThisDay => Arc::new(OnThisDaySource::new(client.clone())),
                SourceKind::FunFacts => Arc::new(FunFactsSource::new(client.clone())),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_provider_names() {
        let built = build_sources(&SourceSettings::default(), &SourceKind::ALL).unwrap();
        let names = built.iter().map(|p| p.name()).collect::<Vec<_>>();
        let expected = SourceKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>();
        assert_eq!(names, expected);
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(" nasa ".parse::<SourceKind>().unwrap(), SourceKind::Nasa);
        assert_eq!("FUNFACTS".parse::<SourceKind>().unwrap(), SourceKind::FunFacts);
        let err = "Bloomberg".parse::<SourceKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSource(s) if s == "Bloomberg"));
    }
}
