use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Func, LikeExpr, Query, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, SqlErr, Statement,
};
use tracing::warn;
use uuid::Uuid;

use super::{ContactDraft, ContactFilter, ContactStore, StoreError, RECENT_WINDOW_DAYS};
use crate::entities::contact::{self, PhoneList};
use crate::entities::Contact;

/// PostgreSQL-backed store. Every guarded transition is one
/// `UPDATE/DELETE ... WHERE <precondition> RETURNING *` statement.
pub struct SeaOrmContactStore {
    db: DatabaseConnection,
}

impl SeaOrmContactStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn fetch_returning(&self, stmt: Statement) -> Result<Option<contact::Model>, StoreError> {
        Contact::find()
            .from_raw_sql(stmt)
            .one(&self.db)
            .await
            .map_err(classify)
    }

    async fn set_trash(&self, id: Uuid, in_trash: bool) -> Result<Option<contact::Model>, StoreError> {
        let now = chrono::Utc::now().naive_utc();
        let stmt = Query::update()
            .table(Contact)
            .values([
                (contact::Column::IsInTrash, in_trash.into()),
                (contact::Column::UpdatedAt, now.into()),
            ])
            .and_where(Expr::col(contact::Column::Id).eq(id))
            .and_where(Expr::col(contact::Column::IsInTrash).eq(!in_trash))
            .returning_all()
            .to_owned();

        self.fetch_returning(self.db.get_database_backend().build(&stmt))
            .await
    }

    async fn set_favorite(&self, id: Uuid, favorite: bool) -> Result<Option<contact::Model>, StoreError> {
        let stmt = Query::update()
            .table(Contact)
            .value(contact::Column::IsFavorite, favorite)
            .and_where(Expr::col(contact::Column::Id).eq(id))
            .returning_all()
            .to_owned();

        self.fetch_returning(self.db.get_database_backend().build(&stmt))
            .await
    }
}

/// Name of the unique index on `contacts.email`, created by the migrator.
const EMAIL_UNIQUE_KEY: &str = "contacts_email_key";

fn is_email_conflict(err: &SqlErr) -> bool {
    matches!(err, SqlErr::UniqueConstraintViolation(detail) if detail.contains(EMAIL_UNIQUE_KEY))
}

fn classify(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(sql_err) if is_email_conflict(&sql_err) => {
            warn!("duplicate email rejected: {}", sql_err);
            StoreError::DuplicateEmail
        }
        _ => StoreError::Database(err),
    }
}

fn phones_json(phones: &[String]) -> serde_json::Value {
    serde_json::Value::from(phones.to_vec())
}

/// Escapes LIKE wildcards so user terms only ever match literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `lower(expr) LIKE '%term%' ESCAPE '\'`, where `term` is already lowercased.
fn contains(expr: impl Into<SimpleExpr>, term: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(term));
    Expr::expr(Func::lower(expr)).like(LikeExpr::new(pattern).escape('\\'))
}

fn column(col: contact::Column) -> SimpleExpr {
    Expr::col((Contact, col)).into()
}

fn phone_text() -> SimpleExpr {
    Func::cast_as(Expr::col((Contact, contact::Column::Phone)), Alias::new("text")).into()
}

fn filter_condition(filter: &ContactFilter) -> Condition {
    let mut cond = Condition::all().add(contact::Column::IsInTrash.eq(false));

    if let Some(term) = ContactFilter::term(&filter.name) {
        cond = cond.add(contains(column(contact::Column::Name), &term));
    }
    if let Some(term) = ContactFilter::term(&filter.email) {
        cond = cond.add(contains(column(contact::Column::Email), &term));
    }
    if let Some(term) = ContactFilter::term(&filter.phone) {
        cond = cond.add(contains(phone_text(), &term));
    }
    if let Some(term) = ContactFilter::term(&filter.search) {
        cond = cond.add(
            Condition::any()
                .add(contains(column(contact::Column::Name), &term))
                .add(contains(column(contact::Column::Email), &term))
                .add(contains(phone_text(), &term)),
        );
    }

    cond
}

#[async_trait]
impl ContactStore for SeaOrmContactStore {
    async fn create(&self, draft: ContactDraft) -> Result<contact::Model, StoreError> {
        let now = chrono::Utc::now().naive_utc();

        let active_model = contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(draft.name),
            email: Set(draft.email),
            phone: Set(PhoneList(draft.phones)),
            address: Set(draft.address),
            company: Set(draft.company),
            is_favorite: Set(false),
            is_in_trash: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };

        active_model.insert(&self.db).await.map_err(classify)
    }

    async fn update(&self, id: Uuid, draft: ContactDraft) -> Result<contact::Model, StoreError> {
        let now = chrono::Utc::now().naive_utc();
        let stmt = Query::update()
            .table(Contact)
            .values([
                (contact::Column::Name, draft.name.into()),
                (contact::Column::Email, draft.email.into()),
                (contact::Column::Phone, phones_json(&draft.phones).into()),
                (contact::Column::Address, draft.address.into()),
                (contact::Column::Company, draft.company.into()),
                (contact::Column::UpdatedAt, now.into()),
            ])
            .and_where(Expr::col(contact::Column::Id).eq(id))
            .returning_all()
            .to_owned();

        self.fetch_returning(self.db.get_database_backend().build(&stmt))
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        Ok(Contact::find_by_id(id).one(&self.db).await?)
    }

    async fn list_active(&self, filter: &ContactFilter) -> Result<Vec<contact::Model>, StoreError> {
        Ok(Contact::find()
            .filter(filter_condition(filter))
            .all(&self.db)
            .await?)
    }

    async fn list_recent(&self) -> Result<Vec<contact::Model>, StoreError> {
        let since = chrono::Utc::now().naive_utc() - chrono::Duration::days(RECENT_WINDOW_DAYS);
        Ok(Contact::find()
            .filter(contact::Column::CreatedAt.gte(since))
            .order_by_desc(contact::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn list_trashed(&self) -> Result<Vec<contact::Model>, StoreError> {
        Ok(Contact::find()
            .filter(contact::Column::IsInTrash.eq(true))
            .order_by_desc(contact::Column::UpdatedAt)
            .all(&self.db)
            .await?)
    }

    async fn list_favorites(&self) -> Result<Vec<contact::Model>, StoreError> {
        Ok(Contact::find()
            .filter(contact::Column::IsFavorite.eq(true))
            .filter(contact::Column::IsInTrash.eq(false))
            .order_by_asc(contact::Column::Name)
            .all(&self.db)
            .await?)
    }

    async fn move_to_trash(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        self.set_trash(id, true).await
    }

    async fn restore_from_trash(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        self.set_trash(id, false).await
    }

    async fn delete_permanently(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        let stmt = Query::delete()
            .from_table(Contact)
            .and_where(Expr::col(contact::Column::Id).eq(id))
            .and_where(Expr::col(contact::Column::IsInTrash).eq(true))
            .returning_all()
            .to_owned();

        self.fetch_returning(self.db.get_database_backend().build(&stmt))
            .await
    }

    async fn mark_favorite(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        self.set_favorite(id, true).await
    }

    async fn unmark_favorite(&self, id: Uuid) -> Result<Option<contact::Model>, StoreError> {
        self.set_favorite(id, false).await
    }
}
