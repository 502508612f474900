use rusqlite::Connection;
use serde_json::{json, Value};

use crate::attendance;
use crate::error::EngineError;
use crate::ipc::helpers::{acting_user, required_bool, required_str, with_db};
use crate::ipc::types::{AppState, Request};

fn mark(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let _actor = acting_user(params)?;
    let student_id = required_str(params, "studentId")?;
    let date = required_str(params, "date")?;
    let period = required_str(params, "period")?;
    let Some(period) = attendance::Period::parse(&period) else {
        return Err(EngineError::BadInput(format!(
            "period must be morning or evening; got {period}"
        )));
    };
    let present = required_bool(params, "present")?;

    let record = attendance::mark_presence(conn, &student_id, &date, period, present)?;
    Ok(json!({
        "studentId": record.student_id,
        "date": record.date,
        "presentMorning": record.present_morning,
        "presentEvening": record.present_evening,
    }))
}

fn day_open(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let vehicle_id = required_str(params, "vehicleId")?;
    let date = required_str(params, "date")?;
    let rows = attendance::day_open(conn, &vehicle_id, &date)?;
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            json!({
                "studentId": row.student.id,
                "fullName": row.student.full_name,
                "guardianId": row.student.guardian_id,
                "className": row.student.class_name,
                "presentMorning": row.present_morning,
                "presentEvening": row.present_evening,
            })
        })
        .collect();
    Ok(json!({ "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(with_db(state, req, |c| mark(c, &req.params))),
        "attendance.dayOpen" => Some(with_db(state, req, |c| day_open(c, &req.params))),
        _ => None,
    }
}
