//! Supported content providers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a provider name does not match any supported provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown provider: '{0}'")]
pub struct UnknownProvider(pub String);

/// An external source of title metadata and chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    MangaDex,
    Comick,
}

impl Provider {
    /// Every supported provider, in registration order.
    pub const ALL: &'static [Provider] = &[Provider::MangaDex, Provider::Comick];

    /// Stable name used in the database and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::MangaDex => "mangadex",
            Provider::Comick => "comick",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::MangaDex => "MangaDex",
            Provider::Comick => "Comick",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mangadex" | "manga-dex" | "md" => Ok(Provider::MangaDex),
            "comick" | "comick.io" | "comick.fun" => Ok(Provider::Comick),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_as_str() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(*provider));
        }
    }

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("MangaDex".parse::<Provider>(), Ok(Provider::MangaDex));
        assert_eq!(" comick.io ".parse::<Provider>(), Ok(Provider::Comick));
    }

    #[test]
    fn unknown_name_is_explicit_error() {
        let err = "batoto".parse::<Provider>().unwrap_err();
        assert_eq!(err, UnknownProvider("batoto".to_string()));
        assert_eq!(err.to_string(), "Unknown provider: 'batoto'");
    }
}
