use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::EngineError;
use crate::ipc::helpers::{acting_user, optional_str, required_i64, required_str, with_db};
use crate::ipc::types::{AppState, Request};
use crate::registry;

fn route_create(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let name = required_str(params, "name")?;
    let zones: Vec<String> = params
        .get("zones")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|z| z.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    if zones.is_empty() || zones.len() > 2 {
        return Err(EngineError::BadInput(
            "a route serves one or two zones".to_string(),
        ));
    }

    let group_a = params.get("groupA").cloned().unwrap_or(json!({}));
    let group_b = params.get("groupB").cloned().unwrap_or(json!({}));
    let times = |g: &Value, key: &str| -> Option<String> {
        g.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
    };

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO routes(id, name, zone_primary, zone_secondary,
            a_morning_departure, a_morning_arrival, a_evening_departure, a_evening_arrival,
            b_morning_departure, b_morning_arrival, b_evening_departure, b_evening_arrival)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &name,
            &zones[0],
            zones.get(1),
            times(&group_a, "morningDeparture"),
            times(&group_a, "morningArrival"),
            times(&group_a, "eveningDeparture"),
            times(&group_a, "eveningArrival"),
            times(&group_b, "morningDeparture"),
            times(&group_b, "morningArrival"),
            times(&group_b, "eveningDeparture"),
            times(&group_b, "eveningArrival"),
        ),
    )?;
    Ok(json!({ "routeId": id }))
}

fn vehicle_create(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let number = required_str(params, "number")?;
    let capacity = required_i64(params, "capacity")?;
    if capacity <= 0 {
        return Err(EngineError::BadInput("capacity must be positive".to_string()));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO vehicles(id, number, capacity) VALUES(?, ?, ?)",
        (&id, &number, capacity),
    )?;
    Ok(json!({ "vehicleId": id }))
}

fn vehicle_list(conn: &Connection) -> Result<Value, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT id, number, capacity, driver_id, supervisor_id, route_id
         FROM vehicles ORDER BY number",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "number": r.get::<_, String>(1)?,
                "capacity": r.get::<_, i64>(2)?,
                "driverId": r.get::<_, Option<String>>(3)?,
                "supervisorId": r.get::<_, Option<String>>(4)?,
                "routeId": r.get::<_, Option<String>>(5)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "vehicles": rows }))
}

/// Assignment params carry the assignee under `key`; JSON null (or the key
/// absent) means unassign, which never conflict-checks.
fn assignee(params: &Value, key: &str) -> Option<String> {
    optional_str(params, key)
}

fn assign_driver(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let _actor = acting_user(params)?;
    let vehicle_id = required_str(params, "vehicleId")?;
    let driver_id = assignee(params, "driverId");
    registry::assign_driver(conn, &vehicle_id, driver_id.as_deref())?;
    Ok(json!({ "vehicleId": vehicle_id, "driverId": driver_id }))
}

fn assign_supervisor(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let _actor = acting_user(params)?;
    let vehicle_id = required_str(params, "vehicleId")?;
    let supervisor_id = assignee(params, "supervisorId");
    registry::assign_supervisor(conn, &vehicle_id, supervisor_id.as_deref())?;
    Ok(json!({ "vehicleId": vehicle_id, "supervisorId": supervisor_id }))
}

fn assign_route(conn: &Connection, params: &Value) -> Result<Value, EngineError> {
    let _actor = acting_user(params)?;
    let vehicle_id = required_str(params, "vehicleId")?;
    let route_id = assignee(params, "routeId");
    registry::assign_route(conn, &vehicle_id, route_id.as_deref())?;
    Ok(json!({ "vehicleId": vehicle_id, "routeId": route_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "routes.create" => Some(with_db(state, req, |c| route_create(c, &req.params))),
        "fleet.vehicleCreate" => Some(with_db(state, req, |c| vehicle_create(c, &req.params))),
        "fleet.vehicleList" => Some(with_db(state, req, |c| vehicle_list(c))),
        "fleet.assignDriver" => Some(with_db(state, req, |c| assign_driver(c, &req.params))),
        "fleet.assignSupervisor" => {
            Some(with_db(state, req, |c| assign_supervisor(c, &req.params)))
        }
        "fleet.assignRoute" => Some(with_db(state, req, |c| assign_route(c, &req.params))),
        _ => None,
    }
}
