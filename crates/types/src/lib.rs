//! # Clinic Types
//!
//! Validated primitive types shared across the clinic authorisation crates.
//!
//! Every identifier that enters the system (from a directory file, a REST body or a CLI argument)
//! is parsed into one of these newtypes at the boundary. Inside the crates they are treated as
//! opaque, comparable keys.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Maximum length accepted for any identifier.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Errors that can occur when creating validated text types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// Errors that can occur when parsing email addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmailError {
    #[error("email address cannot be empty")]
    Empty,
    #[error("invalid email address: {0:?}")]
    Invalid(String),
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    #[error("{kind} exceeds maximum length of {max} characters")]
    TooLong { kind: &'static str, max: usize },

    #[error("{kind} contains invalid characters: {value:?}")]
    InvalidCharacters { kind: &'static str, value: String },

    #[error("permission identifier must be dot-namespaced (e.g. patients.view): {0:?}")]
    NotNamespaced(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A syntactically plausible email address.
///
/// Only the shape is checked (a single `@` with non-empty local and domain parts, a dot in the
/// domain, no whitespace). Deliverability is not this crate's concern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(input: impl AsRef<str>) -> Result<Self, EmailError> {
        let value = input.as_ref().trim();
        if value.is_empty() {
            return Err(EmailError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(EmailError::Invalid(value.to_owned()));
        }
        let Some((local, domain)) = value.split_once('@') else {
            return Err(EmailError::Invalid(value.to_owned()));
        };
        if local.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(EmailError::Invalid(value.to_owned()));
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for EmailAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for EmailAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EmailAddress::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn check_length(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { kind });
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong {
            kind,
            max: MAX_IDENTIFIER_LEN,
        });
    }
    Ok(())
}

fn is_slug_byte(b: u8) -> bool {
    matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-')
}

/// Implements the string plumbing shared by every identifier newtype.
macro_rules! identifier_impls {
    ($ty:ident) => {
        impl $ty {
            /// Returns the inner string as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $ty {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $ty {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// A permission identifier such as `patients.view`.
///
/// Canonical form is two or more lowercase segments of `[a-z0-9_-]` joined by single dots.
/// Surrounding whitespace is trimmed; anything else that does not match is rejected rather than
/// normalised, so the same capability can never be spelled two ways.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermissionId(String);

impl PermissionId {
    const KIND: &'static str = "permission identifier";

    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let value = input.trim();
        check_length(Self::KIND, value)?;

        let mut segments = 0usize;
        for segment in value.split('.') {
            if segment.is_empty() {
                return Err(IdentifierError::NotNamespaced(value.to_owned()));
            }
            if !segment.bytes().all(is_slug_byte) {
                return Err(IdentifierError::InvalidCharacters {
                    kind: Self::KIND,
                    value: value.to_owned(),
                });
            }
            segments += 1;
        }
        if segments < 2 {
            return Err(IdentifierError::NotNamespaced(value.to_owned()));
        }

        Ok(Self(value.to_owned()))
    }

    /// The leading segment, e.g. `patients` for `patients.view`.
    pub fn domain(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }
}

identifier_impls!(PermissionId);

/// A role slug such as `nurse` or `super_admin`.
///
/// Users reference their role by this slug, and the privileged-role bypass is keyed on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleName(String);

impl RoleName {
    const KIND: &'static str = "role name";

    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let value = input.trim();
        check_length(Self::KIND, value)?;
        if !value.bytes().all(is_slug_byte) {
            return Err(IdentifierError::InvalidCharacters {
                kind: Self::KIND,
                value: value.to_owned(),
            });
        }
        Ok(Self(value.to_owned()))
    }
}

identifier_impls!(RoleName);

/// Declares an opaque backend-issued entity identifier.
///
/// Backends may hand out numeric ids, UUIDs or slugs, so only printable non-whitespace ASCII is
/// enforced.
macro_rules! entity_id {
    ($(#[$meta:meta])* $ty:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $ty(String);

        impl $ty {
            pub fn parse(input: &str) -> Result<Self, IdentifierError> {
                let value = input.trim();
                check_length($kind, value)?;
                if !value.bytes().all(|b| b.is_ascii_graphic()) {
                    return Err(IdentifierError::InvalidCharacters {
                        kind: $kind,
                        value: value.to_owned(),
                    });
                }
                Ok(Self(value.to_owned()))
            }
        }

        identifier_impls!($ty);
    };
}

entity_id!(
    /// Backend identifier of a role record.
    RoleId,
    "role id"
);
entity_id!(
    /// Backend identifier of a user.
    UserId,
    "user id"
);
entity_id!(
    /// Backend identifier of a clinic.
    ClinicId,
    "clinic id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_id_accepts_namespaced_values() {
        let id = PermissionId::parse(" patients.view ").unwrap();
        assert_eq!(id.as_str(), "patients.view");
        assert_eq!(id.domain(), "patients");

        let nested = PermissionId::parse("lab_tests.reports.export").unwrap();
        assert_eq!(nested.domain(), "lab_tests");
    }

    #[test]
    fn permission_id_rejects_unnamespaced_or_malformed_values() {
        assert!(matches!(
            PermissionId::parse("patients"),
            Err(IdentifierError::NotNamespaced(_))
        ));
        assert!(matches!(
            PermissionId::parse("patients..view"),
            Err(IdentifierError::NotNamespaced(_))
        ));
        assert!(matches!(
            PermissionId::parse(".view"),
            Err(IdentifierError::NotNamespaced(_))
        ));
        assert!(matches!(
            PermissionId::parse("Patients.View"),
            Err(IdentifierError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            PermissionId::parse("   "),
            Err(IdentifierError::Empty { .. })
        ));
    }

    #[test]
    fn identifiers_reject_overlong_input() {
        let long = format!("a.{}", "b".repeat(MAX_IDENTIFIER_LEN));
        assert!(matches!(
            PermissionId::parse(&long),
            Err(IdentifierError::TooLong { .. })
        ));
    }

    #[test]
    fn role_name_is_a_lowercase_slug() {
        assert_eq!(RoleName::parse("super_admin").unwrap().as_str(), "super_admin");
        assert!(RoleName::parse("Super Admin").is_err());
    }

    #[test]
    fn entity_ids_reject_whitespace() {
        assert_eq!(UserId::parse("n1").unwrap().as_str(), "n1");
        assert!(ClinicId::parse("c 9").is_err());
        assert!(RoleId::parse("").is_err());
    }

    #[test]
    fn deserialize_validates_at_the_boundary() {
        let ok: PermissionId = serde_json::from_str("\"invoices.view\"").unwrap();
        assert_eq!(ok.as_str(), "invoices.view");

        let err = serde_json::from_str::<PermissionId>("\"invoices\"");
        assert!(err.is_err());
    }

    #[test]
    fn email_address_checks_shape_only() {
        assert!(EmailAddress::parse("nurse@clinic.example").is_ok());
        assert_eq!(EmailAddress::parse(""), Err(EmailError::Empty));
        assert!(EmailAddress::parse("nurse.clinic.example").is_err());
        assert!(EmailAddress::parse("nurse@clinic").is_err());
        assert!(EmailAddress::parse("a b@clinic.example").is_err());
    }

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  Nurse ").unwrap().as_str(), "Nurse");
        assert_eq!(NonEmptyText::new(" \t"), Err(TextError::Empty));
    }
}
