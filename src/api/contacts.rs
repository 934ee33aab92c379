use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Span};
use uuid::Uuid;

use super::error::ApiError;
use crate::entities::contact;
use crate::metrics;
use crate::store::{ContactDraft, ContactFilter, SharedStore, ValidationError};

/// Phone numbers as clients send them: a single string or a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PhoneInput {
    One(String),
    Many(Vec<Option<String>>),
}

impl PhoneInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            PhoneInput::One(phone) => vec![phone],
            PhoneInput::Many(phones) => phones.into_iter().flatten().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<PhoneInput>,
    pub address: Option<String>,
    pub company: Option<String>,
}

impl ContactPayload {
    pub fn into_draft(self) -> Result<ContactDraft, ValidationError> {
        let phones = self.phone.map(PhoneInput::into_vec).unwrap_or_default();
        ContactDraft::new(self.name, self.email, phones, self.address, self.company)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ContactResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Vec<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub is_favorite: bool,
    pub is_in_trash: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl From<contact::Model> for ContactResponse {
    fn from(model: contact::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone.into_inner(),
            address: model.address,
            company: model.company,
            is_favorite: model.is_favorite,
            is_in_trash: model.is_in_trash,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn many(contacts: Vec<contact::Model>) -> Json<Vec<ContactResponse>> {
    Json(contacts.into_iter().map(Into::into).collect())
}

fn record(action: &'static str, id: Option<Uuid>) {
    let span = Span::current();
    span.record("table", "contacts");
    span.record("action", action);
    if let Some(id) = id {
        span.record("contact_id", tracing::field::display(id));
    }
}

// POST /api/contacts - Create a contact
pub async fn create_contact(
    Extension(store): Extension<SharedStore>,
    WithRejection(Json(payload), _): WithRejection<Json<ContactPayload>, ApiError>,
) -> ApiResult<(StatusCode, Json<ContactResponse>)> {
    record("create", None);

    let draft = payload.into_draft().map_err(|e| {
        warn!("Rejected contact: {}", e);
        ApiError::from(e)
    })?;

    let contact = store
        .create(draft)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to create contact"))?;

    Span::current().record("contact_id", tracing::field::display(contact.id));
    info!("Created contact: {}", contact.id);
    metrics::increment_contacts_created();

    Ok((StatusCode::CREATED, Json(contact.into())))
}

// GET /api/contacts?name&email&phone&search - List contacts outside the trash
pub async fn list_contacts(
    Extension(store): Extension<SharedStore>,
    Query(filter): Query<ContactFilter>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    record("list_active", None);

    let contacts = store
        .list_active(&filter)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to fetch contacts"))?;

    Ok(many(contacts))
}

// GET /api/contacts/:id
pub async fn get_contact(
    Extension(store): Extension<SharedStore>,
    WithRejection(Path(contact_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ContactResponse>> {
    record("get", Some(contact_id));

    match store.get_by_id(contact_id).await {
        Ok(Some(contact)) => Ok(Json(contact.into())),
        Ok(None) => Err(ApiError::NotFound("Contact not found")),
        Err(e) => Err(ApiError::from_store(e, "Failed to fetch contact")),
    }
}

// PUT /api/contacts/:id - Replace every editable field
pub async fn update_contact(
    Extension(store): Extension<SharedStore>,
    WithRejection(Path(contact_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<ContactPayload>, ApiError>,
) -> ApiResult<Json<ContactResponse>> {
    record("update", Some(contact_id));

    let draft = payload.into_draft().map_err(|e| {
        warn!("Rejected update for contact {}: {}", contact_id, e);
        ApiError::from(e)
    })?;

    let contact = store
        .update(contact_id, draft)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to update contact"))?;

    info!("Updated contact: {}", contact.id);
    Ok(Json(contact.into()))
}

// PUT /api/contacts/:id/trash
pub async fn move_to_trash(
    Extension(store): Extension<SharedStore>,
    WithRejection(Path(contact_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ContactResponse>> {
    record("trash", Some(contact_id));

    let contact = store
        .move_to_trash(contact_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to move contact to trash"))?
        .ok_or(ApiError::NotFound("Contact not found or already in trash"))?;

    info!("Moved contact to trash: {}", contact.id);
    metrics::increment_transitions("trash");
    Ok(Json(contact.into()))
}

// POST /api/contacts/:id/restore
pub async fn restore_from_trash(
    Extension(store): Extension<SharedStore>,
    WithRejection(Path(contact_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ContactResponse>> {
    record("restore", Some(contact_id));

    let contact = store
        .restore_from_trash(contact_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to restore contact"))?
        .ok_or(ApiError::NotFound("Contact not found in trash"))?;

    info!("Restored contact from trash: {}", contact.id);
    metrics::increment_transitions("restore");
    Ok(Json(contact.into()))
}

// GET /api/contacts/trash/all
pub async fn list_trashed_contacts(
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    record("list_trashed", None);

    let contacts = store
        .list_trashed()
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to fetch trashed contacts"))?;

    Ok(many(contacts))
}

// DELETE /api/contacts/:id - Purge a trashed contact
pub async fn delete_contact_permanently(
    Extension(store): Extension<SharedStore>,
    WithRejection(Path(contact_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ContactResponse>> {
    record("purge", Some(contact_id));

    let contact = store
        .delete_permanently(contact_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to delete contact"))?
        .ok_or(ApiError::NotFound(
            "Contact not found in trash or already deleted",
        ))?;

    info!("Permanently deleted contact: {}", contact.id);
    metrics::increment_transitions("purge");
    Ok(Json(contact.into()))
}

// GET /api/contacts/recent/all
pub async fn list_recent_contacts(
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    record("list_recent", None);

    let contacts = store
        .list_recent()
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to fetch recent contacts"))?;

    Ok(many(contacts))
}

// GET /api/contacts/favorites/all
pub async fn list_favorite_contacts(
    Extension(store): Extension<SharedStore>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    record("list_favorites", None);

    let contacts = store
        .list_favorites()
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to fetch favorite contacts"))?;

    Ok(many(contacts))
}

// PUT /api/contacts/:id/favorite/mark
pub async fn mark_favorite(
    Extension(store): Extension<SharedStore>,
    WithRejection(Path(contact_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ContactResponse>> {
    record("favorite_mark", Some(contact_id));

    let contact = store
        .mark_favorite(contact_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to mark contact as favorite"))?
        .ok_or(ApiError::NotFound("Contact not found"))?;

    metrics::increment_transitions("favorite_mark");
    Ok(Json(contact.into()))
}

// PUT /api/contacts/:id/favorite/unmark
pub async fn unmark_favorite(
    Extension(store): Extension<SharedStore>,
    WithRejection(Path(contact_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<Json<ContactResponse>> {
    record("favorite_unmark", Some(contact_id));

    let contact = store
        .unmark_favorite(contact_id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to unmark contact as favorite"))?
        .ok_or(ApiError::NotFound("Contact not found"))?;

    metrics::increment_transitions("favorite_unmark");
    Ok(Json(contact.into()))
}
