use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_busfleetd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn busfleetd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
    expected_code: &str,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    let error = value.get("error").cloned().expect("error object");
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some(expected_code),
        "wrong code for {}: {}",
        method,
        error
    );
    error
}

fn admin() -> Value {
    json!({ "id": "adm-1", "role": "admin" })
}

#[test]
fn driver_and_supervisor_seats_are_exclusive_across_vehicles() {
    let workspace = temp_dir("busfleet-exclusivity");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let d1 = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "staff.create",
        json!({ "fullName": "Hassan Berrada", "role": "driver", "salary": 3200 }),
    )["staffId"]
        .as_str()
        .expect("staffId")
        .to_string();
    let d2 = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "staff.create",
        json!({ "fullName": "Omar Lahlou", "role": "driver", "salary": 3100 }),
    )["staffId"]
        .as_str()
        .expect("staffId")
        .to_string();
    let s1 = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "staff.create",
        json!({ "fullName": "Salma Idrissi", "role": "supervisor" }),
    )["staffId"]
        .as_str()
        .expect("staffId")
        .to_string();

    let v1 = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "fleet.vehicleCreate",
        json!({ "number": "12", "capacity": 40 }),
    )["vehicleId"]
        .as_str()
        .expect("vehicleId")
        .to_string();
    let v2 = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "fleet.vehicleCreate",
        json!({ "number": "7", "capacity": 30 }),
    )["vehicleId"]
        .as_str()
        .expect("vehicleId")
        .to_string();

    // First assignment lands.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "fleet.assignDriver",
        json!({ "actingUser": admin(), "vehicleId": v1, "driverId": d1 }),
    );

    // Same driver on a second vehicle is a conflict naming the occupier.
    let error = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "fleet.assignDriver",
        json!({ "actingUser": admin(), "vehicleId": v2, "driverId": d1 }),
        "conflict",
    );
    assert_eq!(
        error["details"]["occupiedBy"].as_str(),
        Some("12"),
        "conflict names the occupying vehicle"
    );

    // Re-saving the same vehicle with its own driver is not a conflict.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "fleet.assignDriver",
        json!({ "actingUser": admin(), "vehicleId": v1, "driverId": d1 }),
    );

    // Unassignment never conflict-checks; afterwards the driver is free.
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "fleet.assignDriver",
        json!({ "actingUser": admin(), "vehicleId": v1, "driverId": null }),
    );
    assert!(res["driverId"].is_null());
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "fleet.assignDriver",
        json!({ "actingUser": admin(), "vehicleId": v2, "driverId": d1 }),
    );

    // Supervisor seats follow the same rule, independently of driver seats.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "fleet.assignSupervisor",
        json!({ "actingUser": admin(), "vehicleId": v1, "supervisorId": s1 }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "13",
        "fleet.assignSupervisor",
        json!({ "actingUser": admin(), "vehicleId": v2, "supervisorId": s1 }),
        "conflict",
    );
    assert_eq!(error["details"]["occupiedBy"].as_str(), Some("12"));

    // A supervisor cannot sit in a driver seat.
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "14",
        "fleet.assignDriver",
        json!({ "actingUser": admin(), "vehicleId": v1, "driverId": s1 }),
        "not_found",
    );

    // The second driver still assigns freely.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "fleet.assignDriver",
        json!({ "actingUser": admin(), "vehicleId": v1, "driverId": d2 }),
    );

    let vehicles = request_ok(&mut stdin, &mut reader, "16", "fleet.vehicleList", json!({}));
    let rows = vehicles["vehicles"].as_array().expect("vehicles array");
    assert_eq!(rows.len(), 2);
    for row in rows {
        match row["number"].as_str() {
            Some("12") => {
                assert_eq!(row["driverId"].as_str(), Some(d2.as_str()));
                assert_eq!(row["supervisorId"].as_str(), Some(s1.as_str()));
            }
            Some("7") => {
                assert_eq!(row["driverId"].as_str(), Some(d1.as_str()));
                assert!(row["supervisorId"].is_null());
            }
            other => panic!("unexpected vehicle number {other:?}"),
        }
    }
}

#[test]
fn route_assignment_is_not_exclusive() {
    let workspace = temp_dir("busfleet-route-assign");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let route = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "routes.create",
        json!({
            "name": "Agdal loop",
            "zones": ["Agdal", "Hay Riad"],
            "groupA": { "morningDeparture": "07:10", "morningArrival": "07:55",
                        "eveningDeparture": "16:30", "eveningArrival": "17:15" },
            "groupB": { "morningDeparture": "08:10", "morningArrival": "08:55",
                        "eveningDeparture": "17:30", "eveningArrival": "18:15" }
        }),
    )["routeId"]
        .as_str()
        .expect("routeId")
        .to_string();

    let v1 = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "fleet.vehicleCreate",
        json!({ "number": "3", "capacity": 20 }),
    )["vehicleId"]
        .as_str()
        .expect("vehicleId")
        .to_string();
    let v2 = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "fleet.vehicleCreate",
        json!({ "number": "4", "capacity": 20 }),
    )["vehicleId"]
        .as_str()
        .expect("vehicleId")
        .to_string();

    // Two vehicles may run the same route.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "fleet.assignRoute",
        json!({ "actingUser": admin(), "vehicleId": v1, "routeId": route }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "fleet.assignRoute",
        json!({ "actingUser": admin(), "vehicleId": v2, "routeId": route }),
    );

    // A route needs one or two zones, nothing else.
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "routes.create",
        json!({ "name": "bad", "zones": [] }),
        "bad_params",
    );
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "routes.create",
        json!({ "name": "bad", "zones": ["a", "b", "c"] }),
        "bad_params",
    );
}
