//! Shared DTO types for the read endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

/// `limit` query parameter for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LimitParams {
    /// Maximum rows to return (max 100). Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

impl LimitParams {
    /// Clamps `limit` to the allowed range of 1..=100.
    #[must_use]
    pub fn clamped(&self) -> i64 {
        self.limit.clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(LimitParams { limit: 0 }.clamped(), 1);
        assert_eq!(LimitParams { limit: 20 }.clamped(), 20);
        assert_eq!(LimitParams { limit: 5000 }.clamped(), 100);
    }
}
