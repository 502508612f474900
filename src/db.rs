use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("busfleet.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS guardians(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            phone TEXT,
            address TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS staff(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL,
            salary REAL,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_staff_role ON staff(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            guardian_id TEXT NOT NULL,
            full_name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            address TEXT,
            zone TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(guardian_id) REFERENCES guardians(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_guardian ON students(guardian_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_status ON students(status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS routes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            zone_primary TEXT NOT NULL,
            zone_secondary TEXT,
            a_morning_departure TEXT,
            a_morning_arrival TEXT,
            a_evening_departure TEXT,
            a_evening_arrival TEXT,
            b_morning_departure TEXT,
            b_morning_arrival TEXT,
            b_evening_departure TEXT,
            b_evening_arrival TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vehicles(
            id TEXT PRIMARY KEY,
            number TEXT NOT NULL,
            capacity INTEGER NOT NULL,
            driver_id TEXT,
            supervisor_id TEXT,
            route_id TEXT,
            FOREIGN KEY(driver_id) REFERENCES staff(id),
            FOREIGN KEY(supervisor_id) REFERENCES staff(id),
            FOREIGN KEY(route_id) REFERENCES routes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_vehicles_driver ON vehicles(driver_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_vehicles_supervisor ON vehicles(supervisor_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            vehicle_id TEXT NOT NULL,
            status TEXT NOT NULL,
            fee REAL NOT NULL,
            start_date TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(vehicle_id) REFERENCES vehicles(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_vehicle ON enrollments(vehicle_id)",
        [],
    )?;

    // Requests are never deleted; the table doubles as the audit trail.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS requests(
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            requester_id TEXT NOT NULL,
            requester_role TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            decision_comment TEXT,
            verification_code TEXT,
            payload TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_requests_requester ON requests(requester_id)",
        [],
    )?;

    // present_* are tri-state: NULL means unset for that period.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            present_morning INTEGER,
            present_evening INTEGER,
            PRIMARY KEY(student_id, date),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id TEXT PRIMARY KEY,
            destination_id TEXT NOT NULL,
            destination_role TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            category TEXT NOT NULL,
            read_flag INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_destination ON notifications(destination_id)",
        [],
    )?;

    Ok(conn)
}
