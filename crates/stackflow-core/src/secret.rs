//! Secret taint wrappers
//!
//! Secret material never implements a plaintext `Debug` or `Display`. Reading
//! the value requires an explicit call to [`Secret::expose_secret`] or
//! [`Revealed::expose`], so leaking a key into a log line is a type error
//! rather than a review finding.

use serde::{Serialize, Serializer};
use std::fmt;

/// Placeholder printed and persisted in place of secret values
pub const REDACTED: &str = "[secret]";

/// A value that must not be printed
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose_secret(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", REDACTED)
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> Serialize for Secret<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// A settled value together with its taint bit.
///
/// `Debug` shows the value only when it is not secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Revealed<T> {
    value: T,
    secret: bool,
}

impl<T> Revealed<T> {
    pub fn new(value: T, secret: bool) -> Self {
        Self { value, secret }
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// Take the value out, dropping the taint bit
    pub fn expose(self) -> T {
        self.value
    }

    pub fn expose_ref(&self) -> &T {
        &self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Revealed<U> {
        Revealed {
            value: f(self.value),
            secret: self.secret,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Revealed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secret {
            write!(f, "Revealed({})", REDACTED)
        } else {
            f.debug_tuple("Revealed").field(&self.value).finish()
        }
    }
}

impl<T: fmt::Display> fmt::Display for Revealed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secret {
            f.write_str(REDACTED)
        } else {
            self.value.fmt(f)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2".to_string());
        assert_eq!(format!("{}", secret), REDACTED);
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn test_secret_serializes_as_marker() {
        let secret = Secret::new("hunter2");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"[secret]\"");
    }

    #[test]
    fn test_revealed_debug_depends_on_taint() {
        let plain = Revealed::new("acct1", false);
        let hidden = Revealed::new("k1", true);
        assert!(format!("{:?}", plain).contains("acct1"));
        assert!(!format!("{:?}", hidden).contains("k1"));
        assert_eq!(hidden.to_string(), REDACTED);
        assert_eq!(hidden.expose(), "k1");
    }
}
