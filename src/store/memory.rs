use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ContactDraft, ContactFilter, ContactStore, StoreError, RECENT_WINDOW_DAYS};
use crate::entities::contact::{self, PhoneList};

/// In-process store with the same contract as the database-backed one.
///
/// Every transition holds the write lock across its guard check and the
/// mutation, so racing callers observe the same outcomes the SQL guards give.
#[derive(Debug, Default)]
pub struct MemoryContactStore {
    contacts: RwLock<Vec<contact::Model>>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a pre-built row, e.g. one with a back-dated `created_at`.
    pub async fn insert_raw(&self, model: contact::Model) {
        self.contacts.write().await.push(model);
    }

    async fn transition<F>(&self, id: Uuid, apply: F) -> Option<contact::Model>
    where
        F: FnOnce(&mut contact::Model) -> bool,
    {
        let mut contacts = self.contacts.write().await;
        let found = contacts.iter_mut().find(|c| c.id == id)?;
        if apply(found) {
            Some(found.clone())
        } else {
            None
        }
    }
}

fn email_taken(contacts: &[contact::Model], email: Option<&str>, except: Option<Uuid>) -> bool {
    let Some(email) = email else {
        return false;
    };
    contacts
        .iter()
        .any(|c| Some(c.id) != except && c.email.as_deref() == Some(email))
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// The phone array as PostgreSQL renders `jsonb::text`: `["1", "2"]`.
fn phone_text(model: &contact::Model) -> String {
    let items: Vec<String> = model
        .phone
        .as_slice()
        .iter()
        .map(|p| serde_json::Value::from(p.as_str()).to_string())
        .collect();
    format!("[{}]", items.join(", "))
}

fn matches(model: &contact::Model, filter: &ContactFilter) -> bool {
    if let Some(name) = ContactFilter::term(&filter.name) {
        if !contains(&model.name, &name) {
            return false;
        }
    }
    if let Some(email) = ContactFilter::term(&filter.email) {
        if !model.email.as_deref().is_some_and(|e| contains(e, &email)) {
            return false;
        }
    }
    if let Some(phone) = ContactFilter::term(&filter.phone) {
        if !contains(&phone_text(model), &phone) {
            return false;
        }
    }
    if let Some(search) = ContactFilter::term(&filter.search) {
        let hit = contains(&model.name, &search)
            || model.email.as_deref().is_some_and(|e| contains(e, &search))
            || contains(&phone_text(model), &search);
        if !hit {
            return false;
        }
    }
    true
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn create(&self, draft: ContactDraft) -> Result<contact::Model, StoreError> {
        let mut contacts = self.contacts.write().await;
        if email_taken(&contacts, draft.email(), None) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = chrono::Utc::now().naive_utc();
        let model = contact::Model {
            id: Uuid::new_v4(),
            name: draft.name,
            email: draft.email,
            phone: PhoneList(draft.phones),
            address: draft.address,
            company: draft.company,
            is_favorite: false,
            is_in_trash: false,
            created_at: now,
            updated_at: now,
        };
        contacts.push(model.clone());
        Ok(model)
    }

    async fn update(&self, id: Uuid, draft: ContactDraft) -> Result<contact::Model, StoreError> {
        let mut contacts = self.contacts.write().await;
        if email_taken(&contacts, draft.email(), Some(id)) {
            return Err(StoreError::DuplicateEmail);
        }

        let found = contacts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound)?;
        found.name = draft.name;
        found.email = draft.email;
        found.phone = PhoneList(draft.phones);
        found.address = draft.address;
        found.company = draft.company;
        found.updated_at = chrono::Utc::now().naive_utc();
        Ok(found.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        let contacts = self.contacts.read().await;
        Ok(contacts.iter().find(|c| c.id == id).cloned())
    }

    async fn list_active(&self, filter: &ContactFilter) -> Result<Vec<contact::Model>, StoreError> {
        let contacts = self.contacts.read().await;
        Ok(contacts
            .iter()
            .filter(|c| !c.is_in_trash && matches(c, filter))
            .cloned()
            .collect())
    }

    async fn list_recent(&self) -> Result<Vec<contact::Model>, StoreError> {
        let since = chrono::Utc::now().naive_utc() - chrono::Duration::days(RECENT_WINDOW_DAYS);
        let contacts = self.contacts.read().await;
        let mut recent: Vec<_> = contacts
            .iter()
            .filter(|c| c.created_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recent)
    }

    async fn list_trashed(&self) -> Result<Vec<contact::Model>, StoreError> {
        let contacts = self.contacts.read().await;
        let mut trashed: Vec<_> = contacts.iter().filter(|c| c.is_in_trash).cloned().collect();
        trashed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(trashed)
    }

    async fn list_favorites(&self) -> Result<Vec<contact::Model>, StoreError> {
        let contacts = self.contacts.read().await;
        let mut favorites: Vec<_> = contacts
            .iter()
            .filter(|c| c.is_favorite && !c.is_in_trash)
            .cloned()
            .collect();
        favorites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(favorites)
    }

    async fn move_to_trash(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        Ok(self
            .transition(id, |c| {
                if c.is_in_trash {
                    return false;
                }
                c.is_in_trash = true;
                c.updated_at = chrono::Utc::now().naive_utc();
                true
            })
            .await)
    }

    async fn restore_from_trash(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        Ok(self
            .transition(id, |c| {
                if !c.is_in_trash {
                    return false;
                }
                c.is_in_trash = false;
                c.updated_at = chrono::Utc::now().naive_utc();
                true
            })
            .await)
    }

    async fn delete_permanently(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        let mut contacts = self.contacts.write().await;
        let Some(pos) = contacts.iter().position(|c| c.id == id && c.is_in_trash) else {
            return Ok(None);
        };
        Ok(Some(contacts.remove(pos)))
    }

    async fn mark_favorite(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        Ok(self
            .transition(id, |c| {
                c.is_favorite = true;
                true
            })
            .await)
    }

    async fn unmark_favorite(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        Ok(self
            .transition(id, |c| {
                c.is_favorite = false;
                true
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, email: Option<&str>, phones: &[&str]) -> ContactDraft {
        ContactDraft::new(
            Some(name.to_string()),
            email.map(str::to_string),
            phones.iter().map(|p| p.to_string()).collect(),
            None,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_assigns_id_and_defaults() {
        let store = MemoryContactStore::new();
        let created = store
            .create(draft("Ana", Some("ana@example.com"), &["+15551234"]))
            .await
            .unwrap();

        assert!(!created.is_favorite);
        assert!(!created.is_in_trash);
        assert_eq!(created.created_at, created.updated_at);

        let fetched = store.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_but_absent_email_is_not() {
        let store = MemoryContactStore::new();
        store.create(draft("Ana", Some("a@x.io"), &["1"])).await.unwrap();

        let err = store.create(draft("Bea", Some("a@x.io"), &["2"])).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        store.create(draft("Cai", None, &["3"])).await.unwrap();
        store.create(draft("Dan", None, &["4"])).await.unwrap();
    }

    #[tokio::test]
    async fn update_replaces_fields_and_keeps_flags() {
        let store = MemoryContactStore::new();
        let created = store.create(draft("Ana", Some("a@x.io"), &["1"])).await.unwrap();
        store.mark_favorite(created.id).await.unwrap();

        let updated = store
            .update(created.id, draft("Ana Maria", None, &["9", "8"]))
            .await
            .unwrap();

        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.email, None);
        assert_eq!(updated.phone.as_slice(), &["9", "8"]);
        assert!(updated.is_favorite);
        assert!(!updated.is_in_trash);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = MemoryContactStore::new();
        let err = store.update(Uuid::new_v4(), draft("Ana", None, &["1"])).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn update_to_another_contacts_email_is_duplicate() {
        let store = MemoryContactStore::new();
        store.create(draft("Ana", Some("a@x.io"), &["1"])).await.unwrap();
        let bea = store.create(draft("Bea", Some("b@x.io"), &["2"])).await.unwrap();

        let err = store
            .update(bea.id, draft("Bea", Some("a@x.io"), &["2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        // Keeping one's own email is fine.
        store.update(bea.id, draft("Bea", Some("b@x.io"), &["2"])).await.unwrap();
    }

    #[tokio::test]
    async fn trash_twice_is_a_no_op() {
        let store = MemoryContactStore::new();
        let created = store.create(draft("Ana", None, &["1"])).await.unwrap();

        let trashed = store.move_to_trash(created.id).await.unwrap().unwrap();
        assert!(trashed.is_in_trash);

        assert!(store.move_to_trash(created.id).await.unwrap().is_none());
        let after = store.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(after.updated_at, trashed.updated_at);
    }

    #[tokio::test]
    async fn restore_requires_trashed_state() {
        let store = MemoryContactStore::new();
        let created = store.create(draft("Ana", None, &["1"])).await.unwrap();

        assert!(store.restore_from_trash(created.id).await.unwrap().is_none());

        store.move_to_trash(created.id).await.unwrap();
        let restored = store.restore_from_trash(created.id).await.unwrap().unwrap();
        assert!(!restored.is_in_trash);
    }

    #[tokio::test]
    async fn purge_only_from_trash() {
        let store = MemoryContactStore::new();
        let created = store.create(draft("Ana", None, &["1"])).await.unwrap();

        assert!(store.delete_permanently(created.id).await.unwrap().is_none());
        assert!(store.get_by_id(created.id).await.unwrap().is_some());

        store.move_to_trash(created.id).await.unwrap();
        let removed = store.delete_permanently(created.id).await.unwrap().unwrap();
        assert_eq!(removed.id, created.id);

        assert!(store.get_by_id(created.id).await.unwrap().is_none());
        assert!(store.restore_from_trash(created.id).await.unwrap().is_none());
        assert!(store.mark_favorite(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listings_partition_by_trash_state() {
        let store = MemoryContactStore::new();
        let ana = store.create(draft("Ana", None, &["1"])).await.unwrap();
        let bea = store.create(draft("Bea", None, &["2"])).await.unwrap();
        store.move_to_trash(bea.id).await.unwrap();

        let active = store.list_active(&ContactFilter::default()).await.unwrap();
        assert_eq!(active.iter().map(|c| c.id).collect::<Vec<_>>(), vec![ana.id]);

        let trashed = store.list_trashed().await.unwrap();
        assert_eq!(trashed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![bea.id]);
    }

    #[tokio::test]
    async fn phone_filter_sees_the_jsonb_text_form() {
        let store = MemoryContactStore::new();
        store.create(draft("Ana", None, &["111", "222"])).await.unwrap();

        let filter = ContactFilter {
            phone: Some(r#"111", "222"#.into()),
            ..Default::default()
        };
        assert_eq!(store.list_active(&filter).await.unwrap().len(), 1);

        let filter = ContactFilter {
            phone: Some(r#"111","222"#.into()),
            ..Default::default()
        };
        assert!(store.list_active(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn like_wildcards_match_literally() {
        let store = MemoryContactStore::new();
        store.create(draft("Ana", None, &["1"])).await.unwrap();
        store.create(draft("100% Ana", None, &["2"])).await.unwrap();

        let filter = ContactFilter {
            name: Some("%".into()),
            ..Default::default()
        };
        let hits = store.list_active(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "100% Ana");

        let filter = ContactFilter {
            name: Some("_".into()),
            ..Default::default()
        };
        assert!(store.list_active(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn filters_are_case_insensitive_and_conjunctive() {
        let store = MemoryContactStore::new();
        store.create(draft("Ana Lopez", Some("ana@acme.io"), &["+1555"])).await.unwrap();
        store.create(draft("Anabel", Some("bel@other.io"), &["+1666"])).await.unwrap();

        let filter = ContactFilter {
            name: Some("ANA".into()),
            ..Default::default()
        };
        assert_eq!(store.list_active(&filter).await.unwrap().len(), 2);

        let filter = ContactFilter {
            name: Some("ana".into()),
            email: Some("ACME".into()),
            ..Default::default()
        };
        let hits = store.list_active(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Ana Lopez");

        let filter = ContactFilter {
            phone: Some("666".into()),
            ..Default::default()
        };
        let hits = store.list_active(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Anabel");

        let filter = ContactFilter {
            search: Some("other".into()),
            ..Default::default()
        };
        assert_eq!(store.list_active(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recent_excludes_old_contacts_and_keeps_trashed() {
        let store = MemoryContactStore::new();
        let fresh = store.create(draft("Ana", None, &["1"])).await.unwrap();
        store.move_to_trash(fresh.id).await.unwrap();

        let old_ts = chrono::Utc::now().naive_utc() - chrono::Duration::days(30);
        store
            .insert_raw(contact::Model {
                id: Uuid::new_v4(),
                name: "Old".into(),
                email: None,
                phone: PhoneList(vec!["0".into()]),
                address: None,
                company: None,
                is_favorite: false,
                is_in_trash: false,
                created_at: old_ts,
                updated_at: old_ts,
            })
            .await;

        let recent = store.list_recent().await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, fresh.id);
    }

    #[tokio::test]
    async fn favorites_are_orthogonal_to_trash() {
        let store = MemoryContactStore::new();
        let ana = store.create(draft("Ana", None, &["1"])).await.unwrap();
        store.move_to_trash(ana.id).await.unwrap();

        let marked = store.mark_favorite(ana.id).await.unwrap().unwrap();
        assert!(marked.is_favorite);
        assert!(marked.is_in_trash);
        assert!(store.list_favorites().await.unwrap().is_empty());

        store.restore_from_trash(ana.id).await.unwrap();
        assert_eq!(store.list_favorites().await.unwrap().len(), 1);

        let unmarked = store.unmark_favorite(ana.id).await.unwrap().unwrap();
        assert!(!unmarked.is_favorite);
    }
}
