use rusqlite::Connection;
use serde_json::Value;

use crate::error::EngineError;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::workflow::Actor;

/// Run a handler body against the selected workspace's connection, mapping
/// the typed result into the response envelope.
pub fn with_db<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection) -> Result<Value, EngineError>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn required_str(params: &Value, key: &str) -> Result<String, EngineError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| EngineError::BadInput(format!("missing {key}")))
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn required_bool(params: &Value, key: &str) -> Result<bool, EngineError> {
    params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| EngineError::BadInput(format!("missing {key}")))
}

pub fn required_f64(params: &Value, key: &str) -> Result<f64, EngineError> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| EngineError::BadInput(format!("missing {key}")))
}

pub fn optional_f64(params: &Value, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

pub fn required_i64(params: &Value, key: &str) -> Result<i64, EngineError> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| EngineError::BadInput(format!("missing {key}")))
}

/// `actingUser: { id, role }` is required on every engine call; the engine
/// never infers the caller from ambient state.
pub fn acting_user(params: &Value) -> Result<Actor, EngineError> {
    let Some(raw) = params.get("actingUser") else {
        return Err(EngineError::BadInput("missing actingUser".to_string()));
    };
    let actor: Actor = serde_json::from_value(raw.clone())
        .map_err(|_| EngineError::BadInput("actingUser must be {id, role}".to_string()))?;
    if actor.id.trim().is_empty() || actor.role.trim().is_empty() {
        return Err(EngineError::BadInput(
            "actingUser must be {id, role}".to_string(),
        ));
    }
    Ok(actor)
}
