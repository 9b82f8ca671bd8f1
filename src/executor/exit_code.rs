//! Exit code value type

#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code of a process, tool or whole run. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Canonical success value
    pub const SUCCESS: Self = Self(0);

    /// Canonical failure value
    pub const FAILURE: Self = Self(1);

    /// Wraps a raw exit code
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Returns the raw code
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Returns true if the code is zero
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the code is non-zero
    pub const fn is_failure(self) -> bool {
        self.0 != 0
    }

    /// Collapses the code to `SUCCESS` or `FAILURE` for the process boundary
    pub const fn normalized(self) -> Self {
        if self.is_success() {
            Self::SUCCESS
        } else {
            Self::FAILURE
        }
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        if code.is_success() {
            std::process::ExitCode::SUCCESS
        } else {
            std::process::ExitCode::FAILURE
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_values() {
        assert!(ExitCode::SUCCESS.is_success());
        assert!(ExitCode::FAILURE.is_failure());
        assert_eq!(ExitCode::default(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_normalized() {
        assert_eq!(ExitCode::new(42).normalized(), ExitCode::FAILURE);
        assert_eq!(ExitCode::new(-1).normalized(), ExitCode::FAILURE);
        assert_eq!(ExitCode::new(0).normalized(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_display_and_conversion() {
        let code: ExitCode = 3.into();
        assert_eq!(code.to_string(), "3");
        assert_eq!(code.code(), 3);
    }
}
