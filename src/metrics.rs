use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter};

use crate::entities::{contact, Contact};

/// Seeds the contact gauges from the current table contents.
pub async fn init_metrics(db: &DatabaseConnection) -> Result<(), DbErr> {
    let total = Contact::find().count(db).await?;
    metrics::gauge!("contacts_total").set(total as f64);

    let trashed = Contact::find()
        .filter(contact::Column::IsInTrash.eq(true))
        .count(db)
        .await?;
    metrics::gauge!("contacts_trashed_total").set(trashed as f64);

    tracing::info!(
        "Initialized metrics: Contacts={}, Trashed={}",
        total,
        trashed
    );
    Ok(())
}

pub fn increment_contacts_created() {
    metrics::counter!("contacts_created_total").increment(1);
    metrics::gauge!("contacts_total").increment(1.0);
}

/// Counts a successful lifecycle or favorite transition and keeps the gauges
/// in step with it.
pub fn increment_transitions(action: &'static str) {
    metrics::counter!("contacts_transitions_total", "action" => action).increment(1);

    match action {
        "trash" => metrics::gauge!("contacts_trashed_total").increment(1.0),
        "restore" => metrics::gauge!("contacts_trashed_total").decrement(1.0),
        "purge" => {
            metrics::gauge!("contacts_trashed_total").decrement(1.0);
            metrics::gauge!("contacts_total").decrement(1.0);
        }
        _ => {}
    }
}
