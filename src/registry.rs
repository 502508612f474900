use rusqlite::{Connection, OptionalExtension};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffSeat {
    Driver,
    Supervisor,
}

impl StaffSeat {
    fn role(self) -> &'static str {
        match self {
            StaffSeat::Driver => "driver",
            StaffSeat::Supervisor => "supervisor",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RosterStudent {
    pub id: String,
    pub full_name: String,
    pub guardian_id: String,
    pub class_name: String,
}

/// Assign (or unassign with `None`) a driver seat. The conflict scan and the
/// write happen inside one transaction so two concurrent assignments of the
/// same person cannot both land.
pub fn assign_driver(
    conn: &Connection,
    vehicle_id: &str,
    driver_id: Option<&str>,
) -> Result<(), EngineError> {
    assign_seat(conn, vehicle_id, driver_id, StaffSeat::Driver)
}

pub fn assign_supervisor(
    conn: &Connection,
    vehicle_id: &str,
    supervisor_id: Option<&str>,
) -> Result<(), EngineError> {
    assign_seat(conn, vehicle_id, supervisor_id, StaffSeat::Supervisor)
}

fn assign_seat(
    conn: &Connection,
    vehicle_id: &str,
    staff_id: Option<&str>,
    seat: StaffSeat,
) -> Result<(), EngineError> {
    let tx = conn.unchecked_transaction()?;

    if let Some(staff_id) = staff_id {
        let role: Option<String> = tx
            .query_row("SELECT role FROM staff WHERE id = ?", [staff_id], |r| {
                r.get(0)
            })
            .optional()?;
        match role {
            Some(r) if r == seat.role() => {}
            _ => return Err(EngineError::NotFound(seat.role())),
        }

        // The vehicle being edited is excluded from its own scan, so
        // re-saving an unchanged assignment succeeds.
        let occupied: Option<String> = tx
            .query_row(
                match seat {
                    StaffSeat::Driver => {
                        "SELECT number FROM vehicles WHERE driver_id = ? AND id <> ?"
                    }
                    StaffSeat::Supervisor => {
                        "SELECT number FROM vehicles WHERE supervisor_id = ? AND id <> ?"
                    }
                },
                (staff_id, vehicle_id),
                |r| r.get(0),
            )
            .optional()?;
        if let Some(number) = occupied {
            return Err(EngineError::Conflict {
                occupied_by: number,
            });
        }
    }

    let updated = tx.execute(
        match seat {
            StaffSeat::Driver => "UPDATE vehicles SET driver_id = ? WHERE id = ?",
            StaffSeat::Supervisor => "UPDATE vehicles SET supervisor_id = ? WHERE id = ?",
        },
        (staff_id, vehicle_id),
    )?;
    if updated == 0 {
        return Err(EngineError::NotFound("vehicle"));
    }
    tx.commit()?;
    Ok(())
}

/// Route assignment carries no exclusivity rule; several vehicles may run
/// the same route.
pub fn assign_route(
    conn: &Connection,
    vehicle_id: &str,
    route_id: Option<&str>,
) -> Result<(), EngineError> {
    if let Some(route_id) = route_id {
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM routes WHERE id = ?", [route_id], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(EngineError::NotFound("route"));
        }
    }
    let updated = conn.execute(
        "UPDATE vehicles SET route_id = ? WHERE id = ?",
        (route_id, vehicle_id),
    )?;
    if updated == 0 {
        return Err(EngineError::NotFound("vehicle"));
    }
    Ok(())
}

/// The roster: students bound to the vehicle through an active enrollment.
pub fn students_on_vehicle(
    conn: &Connection,
    vehicle_id: &str,
) -> Result<Vec<RosterStudent>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.full_name, s.guardian_id, s.class_name
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE e.vehicle_id = ? AND e.status = 'active'
         ORDER BY s.full_name",
    )?;
    let rows = stmt
        .query_map([vehicle_id], |r| {
            Ok(RosterStudent {
                id: r.get(0)?,
                full_name: r.get(1)?,
                guardian_id: r.get(2)?,
                class_name: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
