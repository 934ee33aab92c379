pub mod contacts;
pub mod error;

use axum::{
    routing::{get, post, put},
    Extension, Router,
};

use crate::store::SharedStore;

/// Contact routes with the store injected. Tracing, CORS and metrics layers
/// are added by the server binary.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route(
            "/api/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/api/contacts/trash/all", get(contacts::list_trashed_contacts))
        .route("/api/contacts/recent/all", get(contacts::list_recent_contacts))
        .route(
            "/api/contacts/favorites/all",
            get(contacts::list_favorite_contacts),
        )
        .route(
            "/api/contacts/:id",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact_permanently),
        )
        .route("/api/contacts/:id/trash", put(contacts::move_to_trash))
        .route("/api/contacts/:id/restore", post(contacts::restore_from_trash))
        .route(
            "/api/contacts/:id/favorite/mark",
            put(contacts::mark_favorite),
        )
        .route(
            "/api/contacts/:id/favorite/unmark",
            put(contacts::unmark_favorite),
        )
        .layer(Extension(store))
}
