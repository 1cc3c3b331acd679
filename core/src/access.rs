//! Authorization capability injected by the front-end. The core never
//! decides on its own whether an operator may connect.

use thiserror::Error;

pub const ACCESS_TOKEN_ENV_VAR: &str = "HELM_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("access token missing; set {ACCESS_TOKEN_ENV_VAR}")]
    MissingToken,
    #[error("access token rejected")]
    InvalidToken,
}

pub trait AccessGate: Send + Sync {
    fn check(&self) -> Result<(), AccessDenied>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn check(&self) -> Result<(), AccessDenied> {
        Ok(())
    }
}

/// Admits the operator when the presented token equals the configured one.
#[derive(Debug, Clone)]
pub struct TokenGate {
    expected: String,
    presented: Option<String>,
}

impl TokenGate {
    pub fn new(expected: impl Into<String>, presented: Option<String>) -> Self {
        Self {
            expected: expected.into(),
            presented,
        }
    }

    /// Read the presented token from `HELM_ACCESS_TOKEN`.
    pub fn from_env(expected: impl Into<String>) -> Self {
        let presented = std::env::var(ACCESS_TOKEN_ENV_VAR)
            .ok()
            .filter(|token| !token.is_empty());
        Self::new(expected, presented)
    }
}

impl AccessGate for TokenGate {
    fn check(&self) -> Result<(), AccessDenied> {
        match self.presented.as_deref() {
            None => Err(AccessDenied::MissingToken),
            Some(token) if constant_time_eq(token.as_bytes(), self.expected.as_bytes()) => Ok(()),
            Some(_) => Err(AccessDenied::InvalidToken),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
