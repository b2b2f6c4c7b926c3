//! Stored documents and the state transitions that keep them consistent.
//!
//! Sub-collections (registrations, claims, members, gallery, resources,
//! forum posts, responses) live inside their parent document and are only
//! reachable through it.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Department {
    Cse,
    Ece,
    Eee,
    Mech,
    Civil,
    It,
    Other,
}

/// Implements [`crate::store::Document`] for a model with `id`, `created_at`
/// and `updated_at` fields.
macro_rules! document {
    ($ty:ty, $collection:literal, $kind:literal) => {
        impl $crate::store::Document for $ty {
            const COLLECTION: &'static str = $collection;
            const KIND: &'static str = $kind;

            fn id(&self) -> uuid::Uuid {
                self.id
            }

            fn touch(&mut self, at: chrono::DateTime<chrono::Utc>) {
                self.updated_at = at;
            }
        }
    };
}

pub(crate) mod announcement;
pub(crate) mod club;
pub(crate) mod event;
pub(crate) mod feedback;
pub(crate) mod lost_found;
pub(crate) mod user;

pub use announcement::*;
pub use club::*;
pub use event::*;
pub use feedback::*;
pub use lost_found::*;
pub use user::*;

pub(crate) fn required(field: &'static str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, format!("please provide {field}")));
    }
    Ok(())
}

pub(crate) fn max_len(field: &'static str, value: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::validation(
            field,
            format!("{field} cannot be more than {max} characters"),
        ));
    }
    Ok(())
}

pub(crate) fn required_max(field: &'static str, value: &str, max: usize) -> AppResult<()> {
    required(field, value)?;
    max_len(field, value, max)
}

pub(crate) fn email(field: &'static str, value: &str) -> AppResult<()> {
    if email_address::EmailAddress::is_valid(value) {
        Ok(())
    } else {
        Err(AppError::validation(field, "please provide a valid email"))
    }
}

pub(crate) fn phone(field: &'static str, value: &str) -> AppResult<()> {
    if value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::validation(field, "please provide a valid phone number"))
    }
}

pub(crate) fn year(field: &'static str, value: u8) -> AppResult<()> {
    if (1..=4).contains(&value) {
        Ok(())
    } else {
        Err(AppError::validation(field, "year must be between 1 and 4"))
    }
}

/// Case-insensitive substring match used by list searches.
pub(crate) fn matches_text<'a>(needle: &str, haystack: impl IntoIterator<Item = &'a str>) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    haystack
        .into_iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("9876543210", true)]
    #[case("98765", false)]
    #[case("98765432ab", false)]
    fn phone_needs_ten_digits(#[case] value: &str, #[case] ok: bool) {
        assert_eq!(phone("contactPhone", value).is_ok(), ok);
    }

    #[test]
    fn max_len_counts_chars() {
        assert!(max_len("message", &"é".repeat(1000), 1000).is_ok());
        assert!(max_len("message", &"a".repeat(1001), 1000).is_err());
    }

    #[test]
    fn text_search_is_case_insensitive() {
        assert!(matches_text("HACK", ["Campus Hackathon", "x"]));
        assert!(!matches_text("robotics", ["Campus Hackathon"]));
        assert!(matches_text("  ", ["anything"]));
    }
}
