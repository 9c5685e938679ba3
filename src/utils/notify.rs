use anyhow::Result;
use sqlx::MySqlPool;

/// Notification kinds the engine emits after committed transitions.
pub const KIND_LEAVE: &str = "leave";
pub const KIND_OVERTIME: &str = "overtime";

/// Fire-and-forget dispatch. The state transition that triggered this has
/// already committed; a failed insert is logged and dropped, never bubbled
/// back to the caller.
pub fn dispatch(pool: &MySqlPool, recipient_id: u64, message: String, kind: &'static str) {
    let pool = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = insert(&pool, recipient_id, &message, kind).await {
            log::warn!("notification dispatch to {recipient_id} failed: {e:?}");
        }
    });
}

async fn insert(pool: &MySqlPool, recipient_id: u64, message: &str, kind: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (recipient_id, message, kind)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(recipient_id)
    .bind(message)
    .bind(kind)
    .execute(pool)
    .await?;
    Ok(())
}
