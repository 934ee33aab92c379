//! Contact persistence and the lifecycle transitions around it.
//!
//! A contact is either active or trashed. Trash, restore and purge are guarded
//! transitions: each one only applies when the stored row is in the expected
//! prior state, and reports `None` otherwise. The favorite flag is independent
//! of the lifecycle.

use async_trait::async_trait;
use sea_orm::DbErr;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::contact;

mod memory;
mod sea_orm_store;

pub use memory::MemoryContactStore;
pub use sea_orm_store::SeaOrmContactStore;

/// How far back `list_recent` looks.
pub const RECENT_WINDOW_DAYS: i64 = 7;

pub type SharedStore = Arc<dyn ContactStore>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Name is required")]
    MissingName,
    #[error("At least one valid phone number is required")]
    MissingPhone,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("contact not found")]
    NotFound,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// User-editable contact fields that already passed validation.
///
/// The only way to build one is [`ContactDraft::new`], so every draft has a
/// non-blank name and at least one non-blank phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDraft {
    name: String,
    email: Option<String>,
    phones: Vec<String>,
    address: Option<String>,
    company: Option<String>,
}

impl ContactDraft {
    pub fn new(
        name: Option<String>,
        email: Option<String>,
        phones: Vec<String>,
        address: Option<String>,
        company: Option<String>,
    ) -> Result<Self, ValidationError> {
        let name = non_blank(name).ok_or(ValidationError::MissingName)?;

        let phones: Vec<String> = phones
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if phones.is_empty() {
            return Err(ValidationError::MissingPhone);
        }

        Ok(Self {
            name,
            email: non_blank(email),
            phones,
            address: non_blank(address),
            company: non_blank(company),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phones(&self) -> &[String] {
        &self.phones
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Optional listing filters. Every present term is a case-insensitive
/// substring match and all of them must hold. Terms match literally: `%` and
/// `_` are not wildcards. The phone term is matched against the array's text
/// form, e.g. `["1", "2"]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Matches name, email or phone.
    pub search: Option<String>,
}

impl ContactFilter {
    /// Lowercased term, or `None` when the term is absent or blank.
    pub(crate) fn term(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase)
    }
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn create(&self, draft: ContactDraft) -> Result<contact::Model, StoreError>;

    /// Replaces every user-editable field. Lifecycle and favorite flags are
    /// left alone.
    async fn update(&self, id: Uuid, draft: ContactDraft) -> Result<contact::Model, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError>;

    async fn list_active(&self, filter: &ContactFilter) -> Result<Vec<contact::Model>, StoreError>;

    /// Contacts created in the last [`RECENT_WINDOW_DAYS`], newest first.
    /// Trashed contacts are included.
    async fn list_recent(&self) -> Result<Vec<contact::Model>, StoreError>;

    /// Trashed contacts, most recently trashed first.
    async fn list_trashed(&self) -> Result<Vec<contact::Model>, StoreError>;

    /// Active favorites ordered by name.
    async fn list_favorites(&self) -> Result<Vec<contact::Model>, StoreError>;

    async fn move_to_trash(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError>;

    async fn restore_from_trash(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError>;

    /// Removes a trashed contact and returns the removed row. Active contacts
    /// are never purged.
    async fn delete_permanently(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError>;

    async fn mark_favorite(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError>;

    async fn unmark_favorite(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phones(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn draft_trims_and_drops_blank_phones() {
        let draft = ContactDraft::new(
            Some("Ana".into()),
            None,
            phones(&[" +15551234 ", "", "   ", "+15559876"]),
            None,
            None,
        )
        .unwrap();

        assert_eq!(draft.phones(), &["+15551234", "+15559876"]);
    }

    #[test]
    fn draft_requires_a_name() {
        let err = ContactDraft::new(None, None, phones(&["1"]), None, None).unwrap_err();
        assert_eq!(err, ValidationError::MissingName);

        let err = ContactDraft::new(Some("  ".into()), None, phones(&["1"]), None, None).unwrap_err();
        assert_eq!(err, ValidationError::MissingName);
    }

    #[test]
    fn draft_requires_a_non_blank_phone() {
        let err = ContactDraft::new(Some("Ana".into()), None, phones(&[" ", ""]), None, None)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingPhone);

        let err = ContactDraft::new(Some("Ana".into()), None, vec![], None, None).unwrap_err();
        assert_eq!(err, ValidationError::MissingPhone);
    }

    #[test]
    fn blank_optional_fields_become_absent() {
        let draft = ContactDraft::new(
            Some("Ana".into()),
            Some("".into()),
            phones(&["1"]),
            Some("  ".into()),
            Some("Acme".into()),
        )
        .unwrap();

        assert_eq!(draft.email(), None);
        assert_eq!(draft.address(), None);
        assert_eq!(draft.company(), Some("Acme"));
    }

    #[test]
    fn filter_terms_ignore_blank_values() {
        assert_eq!(ContactFilter::term(&Some("  ".into())), None);
        assert_eq!(ContactFilter::term(&Some(" AnA ".into())), Some("ana".into()));
        assert_eq!(ContactFilter::term(&None), None);
    }
}
