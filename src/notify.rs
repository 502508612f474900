use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::EngineError;

pub const CATEGORY_REQUEST: &str = "request";
pub const CATEGORY_DECISION: &str = "decision";
pub const CATEGORY_ENROLLMENT: &str = "enrollment";
pub const CATEGORY_ATTENDANCE: &str = "attendance";

/// Append one row to the notification outbox. Delivery and read-state
/// tracking live elsewhere; this table is append-only from the engine's
/// point of view.
pub fn create(
    conn: &Connection,
    destination_id: &str,
    destination_role: &str,
    title: &str,
    body: &str,
    category: &str,
) -> Result<(), EngineError> {
    conn.execute(
        "INSERT INTO notifications(id, destination_id, destination_role, title, body, category, read_flag, created_at)
         VALUES(?, ?, ?, ?, ?, ?, 0, ?)",
        (
            Uuid::new_v4().to_string(),
            destination_id,
            destination_role,
            title,
            body,
            category,
            Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

/// Fire-and-forget append: a notification failure must never roll back or
/// fail the state transition that triggered it.
pub fn best_effort(
    conn: &Connection,
    destination_id: &str,
    destination_role: &str,
    title: &str,
    body: &str,
    category: &str,
) {
    if let Err(e) = create(conn, destination_id, destination_role, title, body, category) {
        tracing::warn!(error = %e, destination_id, "notification append failed");
    }
}

/// Notify every active administrator. Best-effort per recipient.
pub fn admins_best_effort(conn: &Connection, title: &str, body: &str, category: &str) {
    let admins = match admin_ids(conn) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "admin lookup for notification failed");
            return;
        }
    };
    for id in admins {
        best_effort(conn, &id, "admin", title, body, category);
    }
}

fn admin_ids(conn: &Connection) -> Result<Vec<String>, EngineError> {
    let mut stmt = conn.prepare("SELECT id FROM staff WHERE role = 'admin' AND active = 1")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
