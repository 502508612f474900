use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::EngineError;
use crate::ipc::helpers::{acting_user, optional_str, required_str, with_db};
use crate::ipc::types::{AppState, Request};

const STAFF_ROLES: [&str; 3] = ["driver", "supervisor", "admin"];
const STUDENT_STATUSES: [&str; 3] = ["inactive", "active", "suspended"];

fn guardian_create(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let full_name = required_str(params, "fullName")?;
    let phone = optional_str(params, "phone");
    let address = optional_str(params, "address");
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO guardians(id, full_name, phone, address) VALUES(?, ?, ?, ?)",
        (&id, &full_name, &phone, &address),
    )?;
    Ok(json!({ "guardianId": id }))
}

fn staff_create(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let full_name = required_str(params, "fullName")?;
    let role = required_str(params, "role")?;
    if !STAFF_ROLES.contains(&role.as_str()) {
        return Err(EngineError::BadInput(format!(
            "role must be one of driver, supervisor, admin; got {role}"
        )));
    }
    let salary = params.get("salary").and_then(|v| v.as_f64());
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO staff(id, full_name, role, salary, active) VALUES(?, ?, ?, ?, 1)",
        (&id, &full_name, &role, salary),
    )?;
    Ok(json!({ "staffId": id }))
}

fn staff_list(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let role = optional_str(params, "role");
    let mut stmt = conn.prepare(
        "SELECT id, full_name, role, salary, active FROM staff
         WHERE (?1 IS NULL OR role = ?1)
         ORDER BY full_name",
    )?;
    let rows = stmt
        .query_map([&role], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "fullName": r.get::<_, String>(1)?,
                "role": r.get::<_, String>(2)?,
                "salary": r.get::<_, Option<f64>>(3)?,
                "active": r.get::<_, i64>(4)? != 0,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "staff": rows }))
}

fn students_list(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let status = optional_str(params, "status");
    let mut stmt = conn.prepare(
        "SELECT id, guardian_id, full_name, class_name, address, zone, status
         FROM students
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY full_name",
    )?;
    let rows = stmt
        .query_map([&status], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "guardianId": r.get::<_, String>(1)?,
                "fullName": r.get::<_, String>(2)?,
                "className": r.get::<_, String>(3)?,
                "address": r.get::<_, Option<String>>(4)?,
                "zone": r.get::<_, String>(5)?,
                "status": r.get::<_, String>(6)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "students": rows }))
}

/// Administrative status flip (suspension and reinstatement). Activation
/// through this path is deliberately absent for enrollment-pending students:
/// the verification gate is the only route from inactive to billable.
fn students_set_status(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let _actor = acting_user(params)?;
    let student_id = required_str(params, "studentId")?;
    let status = required_str(params, "status")?;
    if !STUDENT_STATUSES.contains(&status.as_str()) {
        return Err(EngineError::BadInput(format!(
            "status must be one of inactive, active, suspended; got {status}"
        )));
    }
    let n = conn.execute(
        "UPDATE students SET status = ? WHERE id = ?",
        (&status, &student_id),
    )?;
    if n == 0 {
        return Err(EngineError::NotFound("student"));
    }
    Ok(json!({ "studentId": student_id, "status": status }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "guardians.create" => Some(with_db(state, req, |c| guardian_create(c, &req.params))),
        "staff.create" => Some(with_db(state, req, |c| staff_create(c, &req.params))),
        "staff.list" => Some(with_db(state, req, |c| staff_list(c, &req.params))),
        "students.list" => Some(with_db(state, req, |c| students_list(c, &req.params))),
        "students.setStatus" => Some(with_db(state, req, |c| students_set_status(c, &req.params))),
        _ => None,
    }
}
