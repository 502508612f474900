use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};

use crate::error::EngineError;
use crate::notify;
use crate::registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Morning,
    Evening,
}

impl Period {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Self::Morning),
            "evening" => Some(Self::Evening),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Period::Morning => "morning",
            Period::Evening => "evening",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub date: String,
    pub present_morning: Option<bool>,
    pub present_evening: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct DayRow {
    pub student: registry::RosterStudent,
    pub present_morning: Option<bool>,
    pub present_evening: Option<bool>,
}

/// Record one period for one (student, date). The other period is never
/// touched; both start unset on a fresh row. Re-marking overwrites the
/// prior value without history (last-write-wins by design). Marking an
/// absence notifies the guardian; marking presence stays quiet.
pub fn mark_presence(
    conn: &Connection,
    student_id: &str,
    date: &str,
    period: Period,
    present: bool,
) -> Result<AttendanceRecord, EngineError> {
    let date = parse_date(date)?;

    let student: Option<(String, String)> = conn
        .query_row(
            "SELECT full_name, guardian_id FROM students WHERE id = ?",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((full_name, guardian_id)) = student else {
        return Err(EngineError::NotFound("student"));
    };

    // Only students on a roster (active enrollment) are markable.
    let enrolled: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE student_id = ? AND status = 'active'",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    if enrolled.is_none() {
        return Err(EngineError::NotOnRoster);
    }

    conn.execute(
        match period {
            Period::Morning => {
                "INSERT INTO attendance_records(student_id, date, present_morning)
                 VALUES(?, ?, ?)
                 ON CONFLICT(student_id, date) DO UPDATE SET
                   present_morning = excluded.present_morning"
            }
            Period::Evening => {
                "INSERT INTO attendance_records(student_id, date, present_evening)
                 VALUES(?, ?, ?)
                 ON CONFLICT(student_id, date) DO UPDATE SET
                   present_evening = excluded.present_evening"
            }
        },
        (student_id, &date, present),
    )?;

    let record = read_record(conn, student_id, &date)?;

    if !present {
        notify::best_effort(
            conn,
            &guardian_id,
            "guardian",
            "Absence recorded",
            &format!(
                "{full_name} was marked absent for the {} period on {date}.",
                period.label()
            ),
            notify::CATEGORY_ATTENDANCE,
        );
    }
    Ok(record)
}

fn read_record(
    conn: &Connection,
    student_id: &str,
    date: &str,
) -> Result<AttendanceRecord, EngineError> {
    let (present_morning, present_evening) = conn.query_row(
        "SELECT present_morning, present_evening FROM attendance_records
         WHERE student_id = ? AND date = ?",
        (student_id, date),
        |r| {
            Ok((
                r.get::<_, Option<bool>>(0)?,
                r.get::<_, Option<bool>>(1)?,
            ))
        },
    )?;
    Ok(AttendanceRecord {
        student_id: student_id.to_string(),
        date: date.to_string(),
        present_morning,
        present_evening,
    })
}

/// Operator view for one vehicle and date: the roster with whatever marks
/// exist so far.
pub fn day_open(
    conn: &Connection,
    vehicle_id: &str,
    date: &str,
) -> Result<Vec<DayRow>, EngineError> {
    let date = parse_date(date)?;
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM vehicles WHERE id = ?", [vehicle_id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(EngineError::NotFound("vehicle"));
    }

    let roster = registry::students_on_vehicle(conn, vehicle_id)?;
    let mut rows = Vec::with_capacity(roster.len());
    for student in roster {
        let marks: Option<(Option<bool>, Option<bool>)> = conn
            .query_row(
                "SELECT present_morning, present_evening FROM attendance_records
                 WHERE student_id = ? AND date = ?",
                (&student.id, &date),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let (present_morning, present_evening) = marks.unwrap_or((None, None));
        rows.push(DayRow {
            student,
            present_morning,
            present_evening,
        });
    }
    Ok(rows)
}

fn parse_date(s: &str) -> Result<String, EngineError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.to_string())
        .map_err(|_| EngineError::BadInput(format!("date must be YYYY-MM-DD, got {s}")))
}
