//! Contract for triggering a batch run from outside (cron, HTTP).
//!
//! The engine has no notion of HTTP; this module only decides whether a
//! caller may trigger a run and shapes the JSON reply.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::batch::BatchSummary;

/// Deployment environment. Trigger authorization is only enforced in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
/// The scheme is matched case-insensitively.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Decide whether a trigger call may run a batch.
///
/// Outside production every call is allowed. In production the caller must
/// present the configured secret as a bearer token; with no secret
/// configured, every call is rejected.
pub fn authorize(environment: Environment, secret: Option<&str>, authorization: Option<&str>) -> bool {
    if environment == Environment::Development {
        return true;
    }
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        log::warn!("Batch trigger rejected: no cron secret configured");
        return false;
    };
    match authorization.and_then(bearer_token) {
        Some(token) => constant_time_eq(token.as_bytes(), secret.as_bytes()),
        None => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// JSON reply of a trigger call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchResponse {
    #[serde(rename_all = "camelCase")]
    Success {
        success: bool,
        titles_checked: usize,
        titles_updated: usize,
        chapters_added: usize,
        message: String,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl BatchResponse {
    pub fn from_summary(summary: &BatchSummary) -> Self {
        let mut message = format!(
            "Checked {} titles, {} updated, {} new chapters",
            summary.titles_checked, summary.titles_updated, summary.chapters_added
        );
        if !summary.per_title_errors.is_empty() {
            message.push_str(&format!(" ({} failed)", summary.per_title_errors.len()));
        }
        BatchResponse::Success {
            success: true,
            titles_checked: summary.titles_checked,
            titles_updated: summary.titles_updated,
            chapters_added: summary.chapters_added,
            message,
        }
    }

    /// Reply for a run that failed as a whole. The detail goes to the log,
    /// not to the caller.
    pub fn failure(error: &dyn fmt::Display) -> Self {
        log::error!("Batch sync failed: {error}");
        BatchResponse::Failure {
            success: false,
            error: "Batch sync failed, try again later".to_string(),
        }
    }

    pub fn unauthorized() -> Self {
        BatchResponse::Failure {
            success: false,
            error: "Unauthorized".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }

    #[test]
    fn development_allows_everything() {
        assert!(authorize(Environment::Development, None, None));
        assert!(authorize(Environment::Development, Some("s"), Some("Bearer wrong")));
    }

    #[test]
    fn production_requires_matching_secret() {
        let env = Environment::Production;
        assert!(authorize(env, Some("s3cret"), Some("Bearer s3cret")));
        assert!(!authorize(env, Some("s3cret"), Some("Bearer s3cre")));
        assert!(!authorize(env, Some("s3cret"), None));
        assert!(!authorize(env, None, Some("Bearer anything")));
        assert!(!authorize(env, Some(""), Some("Bearer ")));
    }

    #[test]
    fn success_json_shape() {
        let summary = BatchSummary {
            titles_checked: 2,
            titles_updated: 1,
            chapters_added: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(BatchResponse::from_summary(&summary)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["titlesChecked"], 2);
        assert_eq!(json["titlesUpdated"], 1);
        assert_eq!(json["chaptersAdded"], 2);
        assert!(json["message"].as_str().unwrap().contains("2 new chapters"));
    }

    #[test]
    fn failure_json_hides_detail() {
        let err = SyncError::Sqlite(rusqlite::Error::InvalidQuery);
        let json = serde_json::to_value(BatchResponse::failure(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("titlesChecked").is_none());
        assert!(!json["error"].as_str().unwrap().contains("SQLite"));
    }
}
