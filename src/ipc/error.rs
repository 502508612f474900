use serde_json::json;

use crate::error::EngineError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Map a domain error to its stable wire code. Each code renders differently
/// in the frontend, which is why the taxonomy is preserved here rather than
/// flattened into one failure shape.
pub fn engine_err(id: &str, e: EngineError) -> serde_json::Value {
    match e {
        EngineError::Conflict { occupied_by } => err(
            id,
            "conflict",
            format!("already assigned to vehicle {occupied_by}"),
            Some(json!({ "occupiedBy": occupied_by })),
        ),
        EngineError::InvalidStateTransition { status, expected } => err(
            id,
            "invalid_state",
            format!("request is {status}, expected {expected}; refresh and retry"),
            Some(json!({ "status": status })),
        ),
        EngineError::InvalidCode => err(
            id,
            "invalid_code",
            "verification code does not match",
            None,
        ),
        EngineError::UnknownPricingTier {
            transport,
            subscription,
        } => {
            // Configuration gap: alert operators, show the user a generic
            // message rather than the missing-tier internals.
            tracing::error!(%transport, %subscription, "missing pricing tier");
            err(id, "pricing_unavailable", "pricing unavailable", None)
        }
        EngineError::NotOnRoster => err(
            id,
            "not_on_roster",
            "student has no active enrollment on a vehicle",
            None,
        ),
        EngineError::NotFound(what) => err(id, "not_found", format!("{what} not found"), None),
        EngineError::BadInput(msg) => err(id, "bad_params", msg, None),
        EngineError::Payload(e) => {
            tracing::error!(error = %e, "stored request payload failed to deserialize");
            err(id, "internal", "stored request payload is malformed", None)
        }
        EngineError::Store(e) => err(id, "db_query_failed", e.to_string(), None),
    }
}
