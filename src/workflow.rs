use chrono::{NaiveDate, Utc};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::fees;
use crate::notify;

/// Explicit caller identity. The engine reads no ambient session state;
/// every mutating call names who is acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub role: String,
}

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_AWAITING_PAYMENT: &str = "awaitingPayment";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_REJECTED: &str = "rejected";

/// Kind-specific request payload, stored serialized on the request row.
/// Adding a kind is a compile-checked change: `decide` matches exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RequestPayload {
    #[serde(rename_all = "camelCase")]
    Enrollment {
        student_id: String,
        zone: String,
        transport: String,
        subscription: String,
        sibling_index: usize,
        quoted_fee: f64,
    },
    #[serde(rename_all = "camelCase")]
    SalaryIncrease {
        staff_id: String,
        current_salary: f64,
        requested_salary: f64,
    },
    #[serde(rename_all = "camelCase")]
    Leave {
        staff_id: String,
        start_date: String,
        end_date: String,
    },
    #[serde(rename_all = "camelCase")]
    Relocation {
        student_id: String,
        new_address: String,
    },
}

impl RequestPayload {
    fn kind(&self) -> &'static str {
        match self {
            RequestPayload::Enrollment { .. } => "enrollment",
            RequestPayload::SalaryIncrease { .. } => "salaryIncrease",
            RequestPayload::Leave { .. } => "leave",
            RequestPayload::Relocation { .. } => "relocation",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentChild {
    pub full_name: String,
    pub class_name: String,
    pub zone: String,
    pub transport: String,
    pub subscription: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentSubmission {
    pub guardian_id: String,
    pub children: Vec<EnrollmentChild>,
}

#[derive(Debug, Clone)]
pub enum SubmitInput {
    Enrollment(EnrollmentSubmission),
    SalaryIncrease {
        current_salary: f64,
        requested_salary: f64,
    },
    Leave {
        start_date: String,
        end_date: String,
    },
    Relocation {
        student_id: String,
        new_address: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedRequest {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_fee: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResult {
    pub status: String,
    pub enrollment_id: String,
    pub student_id: String,
    pub fee: f64,
}

/// Create request row(s) in `pending`. Enrollment submissions are a
/// household batch: one request and one inactive student per child, fees
/// tiered by position in the batch. Notifies all administrators plus a
/// confirmation to the requester.
pub fn submit(
    conn: &Connection,
    actor: &Actor,
    input: SubmitInput,
) -> Result<Vec<SubmittedRequest>, EngineError> {
    let kind = match &input {
        SubmitInput::Enrollment(_) => "enrollment",
        SubmitInput::SalaryIncrease { .. } => "salaryIncrease",
        SubmitInput::Leave { .. } => "leave",
        SubmitInput::Relocation { .. } => "relocation",
    };
    let submitted = match input {
        SubmitInput::Enrollment(batch) => submit_enrollment(conn, actor, batch)?,
        SubmitInput::SalaryIncrease {
            current_salary,
            requested_salary,
        } => {
            if current_salary <= 0.0 || requested_salary <= 0.0 {
                return Err(EngineError::BadInput(
                    "salaries must be positive".to_string(),
                ));
            }
            let exists: Option<i64> = conn
                .query_row("SELECT 1 FROM staff WHERE id = ?", [&actor.id], |r| {
                    r.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Err(EngineError::NotFound("staff"));
            }
            let payload = RequestPayload::SalaryIncrease {
                staff_id: actor.id.clone(),
                current_salary,
                requested_salary,
            };
            vec![insert_request(conn, actor, &payload)?]
        }
        SubmitInput::Leave {
            start_date,
            end_date,
        } => {
            let start = parse_date(&start_date)?;
            let end = parse_date(&end_date)?;
            if end < start {
                return Err(EngineError::BadInput(
                    "leave end date precedes start date".to_string(),
                ));
            }
            let payload = RequestPayload::Leave {
                staff_id: actor.id.clone(),
                start_date,
                end_date,
            };
            vec![insert_request(conn, actor, &payload)?]
        }
        SubmitInput::Relocation {
            student_id,
            new_address,
        } => {
            if new_address.trim().is_empty() {
                return Err(EngineError::BadInput(
                    "relocation requires a new address".to_string(),
                ));
            }
            let exists: Option<i64> = conn
                .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
                    r.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Err(EngineError::NotFound("student"));
            }
            let payload = RequestPayload::Relocation {
                student_id,
                new_address,
            };
            vec![insert_request(conn, actor, &payload)?]
        }
    };

    notify::admins_best_effort(
        conn,
        "New request submitted",
        &format!("A {kind} request awaits review."),
        notify::CATEGORY_REQUEST,
    );
    notify::best_effort(
        conn,
        &actor.id,
        &actor.role,
        "Request received",
        "Your request was recorded and awaits review.",
        notify::CATEGORY_REQUEST,
    );
    Ok(submitted)
}

fn submit_enrollment(
    conn: &Connection,
    actor: &Actor,
    batch: EnrollmentSubmission,
) -> Result<Vec<SubmittedRequest>, EngineError> {
    if batch.children.is_empty() {
        return Err(EngineError::BadInput(
            "enrollment requires at least one child".to_string(),
        ));
    }
    for c in &batch.children {
        if c.full_name.trim().is_empty() || c.zone.trim().is_empty() {
            return Err(EngineError::BadInput(
                "each child requires a name and a zone".to_string(),
            ));
        }
    }
    let guardian: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM guardians WHERE id = ?",
            [&batch.guardian_id],
            |r| r.get(0),
        )
        .optional()?;
    if guardian.is_none() {
        return Err(EngineError::NotFound("guardian"));
    }

    // Quote every child before writing anything: a missing pricing tier
    // must fail the whole batch, never half of it.
    let mut units = Vec::with_capacity(batch.children.len());
    for c in &batch.children {
        units.push(fees::quote_for(&c.transport, &c.subscription)?);
    }

    let tx = conn.unchecked_transaction()?;
    let now = Utc::now().to_rfc3339();
    let mut out = Vec::with_capacity(batch.children.len());
    for (idx0, (child, unit)) in batch.children.iter().zip(units).enumerate() {
        let sibling_index = idx0 + 1;
        let fee = fees::sibling_price(unit, sibling_index);
        let student_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO students(id, guardian_id, full_name, class_name, address, zone, status, created_at)
             VALUES(?, ?, ?, ?, ?, ?, 'inactive', ?)",
            (
                &student_id,
                &batch.guardian_id,
                &child.full_name,
                &child.class_name,
                &child.address,
                &child.zone,
                &now,
            ),
        )?;
        let payload = RequestPayload::Enrollment {
            student_id: student_id.clone(),
            zone: child.zone.clone(),
            transport: child.transport.clone(),
            subscription: child.subscription.clone(),
            sibling_index,
            quoted_fee: fee,
        };
        let request_id = insert_request_tx(&tx, actor, &payload, &now)?;
        out.push(SubmittedRequest {
            request_id,
            student_id: Some(student_id),
            quoted_fee: Some(fee),
        });
    }
    tx.commit()?;
    Ok(out)
}

fn insert_request(
    conn: &Connection,
    actor: &Actor,
    payload: &RequestPayload,
) -> Result<SubmittedRequest, EngineError> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;
    let request_id = insert_request_tx(&tx, actor, payload, &now)?;
    tx.commit()?;
    Ok(SubmittedRequest {
        request_id,
        student_id: None,
        quoted_fee: None,
    })
}

fn insert_request_tx(
    tx: &rusqlite::Transaction<'_>,
    actor: &Actor,
    payload: &RequestPayload,
    now: &str,
) -> Result<String, EngineError> {
    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO requests(id, kind, requester_id, requester_role, status, created_at, payload)
         VALUES(?, ?, ?, ?, 'pending', ?, ?)",
        (
            &id,
            payload.kind(),
            &actor.id,
            &actor.role,
            now,
            serde_json::to_string(payload)?,
        ),
    )?;
    Ok(id)
}

struct RequestRow {
    status: String,
    payload: RequestPayload,
    requester_id: String,
    requester_role: String,
}

fn load_request(conn: &Connection, request_id: &str) -> Result<RequestRow, EngineError> {
    let row = conn
        .query_row(
            "SELECT status, payload, requester_id, requester_role FROM requests WHERE id = ?",
            [request_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((status, payload, requester_id, requester_role)) = row else {
        return Err(EngineError::NotFound("request"));
    };
    Ok(RequestRow {
        status,
        payload: serde_json::from_str(&payload)?,
        requester_id,
        requester_role,
    })
}

/// Decide a pending request. The status check and the write are one guarded
/// UPDATE (compare-and-set on `pending`), so a second concurrent decision
/// loses cleanly with `InvalidStateTransition` and mutates nothing.
pub fn decide(
    conn: &Connection,
    _actor: &Actor,
    request_id: &str,
    outcome: Outcome,
    comment: Option<&str>,
    approved_salary: Option<f64>,
) -> Result<DecideResult, EngineError> {
    let row = load_request(conn, request_id)?;

    // A request that already left pending fails here before any argument
    // validation, so a stale client always sees the refresh signal. The
    // guarded UPDATEs below re-check under the write for races.
    if row.status != STATUS_PENDING {
        return Err(EngineError::InvalidStateTransition {
            status: row.status,
            expected: STATUS_PENDING,
        });
    }

    if outcome == Outcome::Rejected {
        let comment = comment.map(str::trim).unwrap_or("");
        if comment.is_empty() {
            return Err(EngineError::BadInput(
                "rejection requires a comment".to_string(),
            ));
        }
        let n = conn.execute(
            "UPDATE requests SET status = 'rejected', decision_comment = ?
             WHERE id = ? AND status = 'pending'",
            (comment, request_id),
        )?;
        if n == 0 {
            return Err(EngineError::InvalidStateTransition {
                status: row.status,
                expected: STATUS_PENDING,
            });
        }
        notify::best_effort(
            conn,
            &row.requester_id,
            &row.requester_role,
            "Request rejected",
            &format!("Your request was rejected: {comment}"),
            notify::CATEGORY_DECISION,
        );
        return Ok(DecideResult {
            status: STATUS_REJECTED.to_string(),
            verification_code: None,
        });
    }

    match row.payload {
        RequestPayload::Enrollment { .. } => {
            // Approval does not activate the student; it opens the payment
            // window and binds a single-use verification code.
            let code = issue_code();
            let n = conn.execute(
                "UPDATE requests SET status = 'awaitingPayment', verification_code = ?, decision_comment = ?
                 WHERE id = ? AND status = 'pending'",
                (&code, comment, request_id),
            )?;
            if n == 0 {
                return Err(EngineError::InvalidStateTransition {
                    status: row.status,
                    expected: STATUS_PENDING,
                });
            }
            notify::best_effort(
                conn,
                &row.requester_id,
                &row.requester_role,
                "Enrollment approved, payment required",
                "Your enrollment was approved. Complete payment to receive the verification code.",
                notify::CATEGORY_DECISION,
            );
            Ok(DecideResult {
                status: STATUS_AWAITING_PAYMENT.to_string(),
                verification_code: Some(code),
            })
        }
        RequestPayload::SalaryIncrease {
            staff_id,
            requested_salary,
            ..
        } => {
            // The administrator may confirm a figure different from the one
            // requested.
            let new_salary = approved_salary.unwrap_or(requested_salary);
            if new_salary <= 0.0 {
                return Err(EngineError::BadInput(
                    "approved salary must be positive".to_string(),
                ));
            }
            let tx = conn.unchecked_transaction()?;
            let n = tx.execute(
                "UPDATE requests SET status = 'approved', decision_comment = ?
                 WHERE id = ? AND status = 'pending'",
                (comment, request_id),
            )?;
            if n == 0 {
                return Err(EngineError::InvalidStateTransition {
                    status: row.status,
                    expected: STATUS_PENDING,
                });
            }
            // The staff row must actually take the new figure; approving a
            // request whose subject vanished would leave a half-applied
            // decision on the books.
            let applied = tx.execute(
                "UPDATE staff SET salary = ? WHERE id = ?",
                (new_salary, &staff_id),
            )?;
            if applied == 0 {
                return Err(EngineError::NotFound("staff"));
            }
            tx.commit()?;
            notify::best_effort(
                conn,
                &row.requester_id,
                &row.requester_role,
                "Salary increase approved",
                &format!("Your new salary is {new_salary:.2}."),
                notify::CATEGORY_DECISION,
            );
            Ok(DecideResult {
                status: STATUS_APPROVED.to_string(),
                verification_code: None,
            })
        }
        RequestPayload::Relocation {
            student_id,
            new_address,
        } => {
            // Only the free-text address moves; the structured zone stays
            // untouched until an administrator reassigns it.
            let tx = conn.unchecked_transaction()?;
            let n = tx.execute(
                "UPDATE requests SET status = 'approved', decision_comment = ?
                 WHERE id = ? AND status = 'pending'",
                (comment, request_id),
            )?;
            if n == 0 {
                return Err(EngineError::InvalidStateTransition {
                    status: row.status,
                    expected: STATUS_PENDING,
                });
            }
            tx.execute(
                "UPDATE students SET address = ? WHERE id = ?",
                (&new_address, &student_id),
            )?;
            tx.commit()?;
            notify::best_effort(
                conn,
                &row.requester_id,
                &row.requester_role,
                "Relocation approved",
                "The student's address was updated.",
                notify::CATEGORY_DECISION,
            );
            Ok(DecideResult {
                status: STATUS_APPROVED.to_string(),
                verification_code: None,
            })
        }
        RequestPayload::Leave { .. } => {
            let n = conn.execute(
                "UPDATE requests SET status = 'approved', decision_comment = ?
                 WHERE id = ? AND status = 'pending'",
                (comment, request_id),
            )?;
            if n == 0 {
                return Err(EngineError::InvalidStateTransition {
                    status: row.status,
                    expected: STATUS_PENDING,
                });
            }
            notify::best_effort(
                conn,
                &row.requester_id,
                &row.requester_role,
                "Leave approved",
                "Your leave request was approved.",
                notify::CATEGORY_DECISION,
            );
            Ok(DecideResult {
                status: STATUS_APPROVED.to_string(),
                verification_code: None,
            })
        }
    }
}

/// Short, human-relayable code. Staff communicate it out-of-band after
/// manual payment collection.
fn issue_code() -> String {
    format!("{:04}", rand::rng().random_range(0..10_000u32))
}

/// Consume the verification code and activate the enrollment. The status
/// check, code comparison, and code clearing are one guarded UPDATE, so a
/// code can never be redeemed twice even when two attempts race. This is
/// the only path by which a student becomes active.
pub fn redeem(
    conn: &Connection,
    _actor: &Actor,
    request_id: &str,
    submitted_code: &str,
    vehicle_id: &str,
) -> Result<RedeemResult, EngineError> {
    let row = load_request(conn, request_id)?;
    let RequestPayload::Enrollment {
        student_id,
        quoted_fee,
        ..
    } = row.payload
    else {
        return Err(EngineError::BadInput(
            "not an enrollment request".to_string(),
        ));
    };

    let vehicle: Option<i64> = conn
        .query_row("SELECT 1 FROM vehicles WHERE id = ?", [vehicle_id], |r| {
            r.get(0)
        })
        .optional()?;
    if vehicle.is_none() {
        return Err(EngineError::NotFound("vehicle"));
    }

    let tx = conn.unchecked_transaction()?;
    let n = tx.execute(
        "UPDATE requests SET status = 'approved', verification_code = NULL
         WHERE id = ? AND status = 'awaitingPayment' AND verification_code = ?",
        (request_id, submitted_code),
    )?;
    if n == 0 {
        // Mismatch, replay of a consumed code, or a request that never
        // reached the payment window. Retries are unlimited by design.
        return Err(EngineError::InvalidCode);
    }
    tx.execute(
        "UPDATE students SET status = 'active' WHERE id = ?",
        [&student_id],
    )?;
    let enrollment_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO enrollments(id, student_id, vehicle_id, status, fee, start_date)
         VALUES(?, ?, ?, 'active', ?, ?)",
        (
            &enrollment_id,
            &student_id,
            vehicle_id,
            quoted_fee,
            Utc::now().date_naive().to_string(),
        ),
    )?;
    tx.commit()?;

    notify::best_effort(
        conn,
        &row.requester_id,
        &row.requester_role,
        "Enrollment active",
        "Payment verified. The student is now enrolled and boardable.",
        notify::CATEGORY_ENROLLMENT,
    );
    notify::admins_best_effort(
        conn,
        "Enrollment activated",
        "A paid enrollment was verified and activated.",
        notify::CATEGORY_ENROLLMENT,
    );
    Ok(RedeemResult {
        status: STATUS_APPROVED.to_string(),
        enrollment_id,
        student_id,
        fee: quoted_fee,
    })
}

fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| EngineError::BadInput(format!("invalid date: {s}")))
}
