use rusqlite::Connection;
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::ipc::helpers::{
    acting_user, optional_f64, optional_str, required_f64, required_str, with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::workflow::{self, EnrollmentSubmission, Outcome, SubmitInput};

fn submit(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let actor = acting_user(params)?;
    let kind = required_str(params, "kind")?;
    let input = match kind.as_str() {
        "enrollment" => {
            let batch: EnrollmentSubmission = serde_json::from_value(params.clone())
                .map_err(|_| {
                    EngineError::BadInput(
                        "enrollment requires guardianId and children".to_string(),
                    )
                })?;
            SubmitInput::Enrollment(batch)
        }
        "salaryIncrease" => SubmitInput::SalaryIncrease {
            current_salary: required_f64(params, "currentSalary")?,
            requested_salary: required_f64(params, "requestedSalary")?,
        },
        "leave" => SubmitInput::Leave {
            start_date: required_str(params, "startDate")?,
            end_date: required_str(params, "endDate")?,
        },
        "relocation" => SubmitInput::Relocation {
            student_id: required_str(params, "studentId")?,
            new_address: required_str(params, "newAddress")?,
        },
        other => {
            return Err(EngineError::BadInput(format!("unknown request kind: {other}")));
        }
    };
    let submitted = workflow::submit(conn, &actor, input)?;
    Ok(json!({ "requests": submitted }))
}

fn decide(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let actor = acting_user(params)?;
    let request_id = required_str(params, "requestId")?;
    let outcome = required_str(params, "outcome")?;
    let Some(outcome) = Outcome::parse(&outcome) else {
        return Err(EngineError::BadInput(format!(
            "outcome must be approved or rejected; got {outcome}"
        )));
    };
    let comment = optional_str(params, "comment");
    let approved_salary = optional_f64(params, "approvedSalary");
    let result = workflow::decide(
        conn,
        &actor,
        &request_id,
        outcome,
        comment.as_deref(),
        approved_salary,
    )?;
    Ok(serde_json::to_value(result)?)
}

fn redeem(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let actor = acting_user(params)?;
    let request_id = required_str(params, "requestId")?;
    let code = required_str(params, "code")?;
    let vehicle_id = required_str(params, "vehicleId")?;
    let result = workflow::redeem(conn, &actor, &request_id, &code, &vehicle_id)?;
    Ok(serde_json::to_value(result)?)
}

fn list(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let status = optional_str(params, "status");
    let kind = optional_str(params, "kind");
    let mut stmt = conn.prepare(
        "SELECT id, kind, requester_id, requester_role, status, created_at,
                decision_comment, payload
         FROM requests
         WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR kind = ?2)
         ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map((&status, &kind), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, Option<String>>(6)?,
                r.get::<_, String>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = Vec::with_capacity(rows.len());
    for (id, kind, requester_id, requester_role, status, created_at, comment, payload) in rows {
        let payload: Value = serde_json::from_str(&payload)?;
        out.push(json!({
            "id": id,
            "kind": kind,
            "requesterId": requester_id,
            "requesterRole": requester_role,
            "status": status,
            "createdAt": created_at,
            "decisionComment": comment,
            "payload": payload,
        }));
    }
    Ok(json!({ "requests": out }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "requests.submit" => Some(with_db(state, req, |c| submit(c, &req.params))),
        "requests.decide" => Some(with_db(state, req, |c| decide(c, &req.params))),
        "requests.redeem" => Some(with_db(state, req, |c| redeem(c, &req.params))),
        "requests.list" => Some(with_db(state, req, |c| list(c, &req.params))),
        _ => None,
    }
}
