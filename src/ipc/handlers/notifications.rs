use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::ipc::helpers::{optional_str, required_str, with_db};
use crate::ipc::types::{AppState, Request};

fn list(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let destination_id = required_str(params, "destinationId")?;
    let category = optional_str(params, "category");
    let mut stmt = conn.prepare(
        "SELECT id, destination_role, title, body, category, read_flag, created_at
         FROM notifications
         WHERE destination_id = ?1 AND (?2 IS NULL OR category = ?2)
         ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map((&destination_id, &category), |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "destinationRole": r.get::<_, String>(1)?,
                "title": r.get::<_, String>(2)?,
                "body": r.get::<_, String>(3)?,
                "category": r.get::<_, String>(4)?,
                "read": r.get::<_, i64>(5)? != 0,
                "createdAt": r.get::<_, String>(6)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "notifications": rows }))
}

fn mark_read(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let notification_id = required_str(params, "notificationId")?;
    let n = conn.execute(
        "UPDATE notifications SET read_flag = 1 WHERE id = ?",
        [&notification_id],
    )?;
    if n == 0 {
        return Err(EngineError::NotFound("notification"));
    }
    Ok(json!({ "notificationId": notification_id, "read": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.list" => Some(with_db(state, req, |c| list(c, &req.params))),
        "notifications.markRead" => Some(with_db(state, req, |c| mark_read(c, &req.params))),
        _ => None,
    }
}
