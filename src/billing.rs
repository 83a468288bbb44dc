//! Billing and payment state.
//!
//! All money math happens server-side: item totals and the subtotal
//! are recomputed from quantity and unit price, and any client-sent
//! totals are ignored. Invoice numbers come from a single-row counter
//! incremented in the same transaction as the bill insert, so
//! concurrent creations always receive distinct numbers.
//!
//! Payment status transitions are unrestricted, and marking a bill
//! paid stamps `payment_date` on every call rather than only the
//! first. Callers that need the original settlement time must read it
//! before re-stamping.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::{self, get_patient, Caller};
use crate::error::WorkflowError;
use crate::models::enums::{PaymentMethod, PaymentStatus, Role};
use crate::models::{Bill, BillItem};

// ─── Request / view types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct BillRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub items: Vec<BillItemInput>,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub discount: f64,
    pub payment_method: Option<PaymentMethod>,
}

/// Line item as received from the boundary. Any `total` the client
/// sends is dropped during deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct BillItemInput {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BillView {
    #[serde(flatten)]
    pub bill: Bill,
    pub patient_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueStats {
    pub total_revenue: f64,
    pub paid_bills: i64,
    pub monthly: Vec<MonthlyRevenue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRevenue {
    pub month: String,
    pub revenue: f64,
    pub count: i64,
}

// ─── Operations ───────────────────────────────────────────────────────────────

/// Create a bill. Admin-only; the patient must exist.
pub fn create_bill(
    conn: &Connection,
    caller: &Caller,
    request: &BillRequest,
) -> Result<BillView, WorkflowError> {
    if caller.role != Role::Admin {
        return Err(WorkflowError::Forbidden(
            "Only administrators may create bills".into(),
        ));
    }
    let patient = get_patient(conn, request.patient_id)?;

    if request.items.is_empty() {
        return Err(WorkflowError::Validation(
            "at least one bill item is required".into(),
        ));
    }
    for (index, item) in request.items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(WorkflowError::Validation(format!(
                "items[{index}]: description is required"
            )));
        }
    }

    let items: Vec<BillItem> = request
        .items
        .iter()
        .map(|item| BillItem {
            description: item.description.trim().to_string(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.quantity * item.unit_price,
        })
        .collect();
    let subtotal: f64 = items.iter().map(|item| item.total).sum();
    // Total may go negative when the discount exceeds subtotal + tax;
    // stored as-is.
    let total_amount = subtotal + request.tax - request.discount;

    let now = Utc::now();
    let bill_id = Uuid::new_v4();

    let tx = conn.unchecked_transaction()?;
    tx.execute("UPDATE invoice_counter SET value = value + 1 WHERE id = 1", [])?;
    let seq: i64 = tx.query_row("SELECT value FROM invoice_counter WHERE id = 1", [], |row| {
        row.get(0)
    })?;
    let invoice_number = format!("INV-{}-{seq}", now.timestamp_millis());

    tx.execute(
        "INSERT INTO bills
            (id, patient_id, appointment_id, items, subtotal, tax, discount, total_amount,
             payment_status, payment_method, payment_date, invoice_number, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL, ?11, ?12)",
        params![
            bill_id.to_string(),
            patient.id.to_string(),
            request.appointment_id.map(|id| id.to_string()),
            serde_json::to_string(&items).unwrap_or_else(|_| "[]".into()),
            subtotal,
            request.tax,
            request.discount,
            total_amount,
            PaymentStatus::Pending.as_str(),
            request.payment_method.map(|m| m.as_str()),
            invoice_number,
            now.to_rfc3339(),
        ],
    )?;
    tx.commit()?;

    tracing::info!(bill_id = %bill_id, invoice = %invoice_number, "bill created");
    get_bill_unchecked(conn, bill_id)
}

/// Record a payment-state change. Open to any authenticated caller,
/// so a patient can settle their own bill. Any transition is
/// accepted; transitioning to `paid` stamps `payment_date` with the
/// current time on every call.
pub fn record_payment(
    conn: &Connection,
    _caller: &Caller,
    bill_id: Uuid,
    request: &PaymentRequest,
) -> Result<BillView, WorkflowError> {
    let current = get_bill_unchecked(conn, bill_id)?;

    let payment_date = if request.payment_status == PaymentStatus::Paid {
        Some(Utc::now())
    } else {
        current.bill.payment_date
    };
    let payment_method = request.payment_method.or(current.bill.payment_method);

    conn.execute(
        "UPDATE bills SET payment_status = ?1, payment_method = ?2, payment_date = ?3
         WHERE id = ?4",
        params![
            request.payment_status.as_str(),
            payment_method.map(|m| m.as_str()),
            payment_date.map(|d| d.to_rfc3339()),
            bill_id.to_string(),
        ],
    )?;

    get_bill_unchecked(conn, bill_id)
}

// ─── Queries ──────────────────────────────────────────────────────────────────

const VIEW_SQL: &str = "
    SELECT b.id, b.patient_id, b.appointment_id, b.items, b.subtotal, b.tax, b.discount,
           b.total_amount, b.payment_status, b.payment_method, b.payment_date,
           b.invoice_number, b.created_at, pu.name
    FROM bills b
    JOIN patients p ON b.patient_id = p.id
    JOIN users pu ON p.user_id = pu.id";

type ViewRow = (
    String,
    String,
    Option<String>,
    String,
    f64,
    f64,
    f64,
    f64,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

fn read_view_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ViewRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
    ))
}

fn view_from_row(row: ViewRow) -> Result<BillView, WorkflowError> {
    let (
        id,
        patient_id,
        appointment_id,
        items,
        subtotal,
        tax,
        discount,
        total_amount,
        payment_status,
        payment_method,
        payment_date,
        invoice_number,
        created_at,
        patient_name,
    ) = row;

    let bill = Bill {
        id: directory::parse_uuid(&id, "bills.id").map_err(WorkflowError::Storage)?,
        patient_id: directory::parse_uuid(&patient_id, "bills.patient_id")
            .map_err(WorkflowError::Storage)?,
        appointment_id: appointment_id
            .map(|a| directory::parse_uuid(&a, "bills.appointment_id"))
            .transpose()
            .map_err(WorkflowError::Storage)?,
        items: directory::json_col(&items, "bills.items").map_err(WorkflowError::Storage)?,
        subtotal,
        tax,
        discount,
        total_amount,
        payment_status: payment_status.parse().map_err(WorkflowError::Storage)?,
        payment_method: payment_method
            .map(|m| m.parse())
            .transpose()
            .map_err(WorkflowError::Storage)?,
        payment_date: payment_date
            .map(|d| directory::parse_timestamp(&d, "bills.payment_date"))
            .transpose()
            .map_err(WorkflowError::Storage)?,
        invoice_number,
        created_at: directory::parse_timestamp(&created_at, "bills.created_at")
            .map_err(WorkflowError::Storage)?,
    };

    Ok(BillView { bill, patient_name })
}

fn get_bill_unchecked(conn: &Connection, bill_id: Uuid) -> Result<BillView, WorkflowError> {
    let sql = format!("{VIEW_SQL} WHERE b.id = ?1");
    let row = conn
        .query_row(&sql, params![bill_id.to_string()], read_view_row)
        .optional()?;
    let row = row.ok_or_else(|| WorkflowError::not_found("Bill"))?;
    view_from_row(row)
}

/// Bill by id. Staff read anything; patients only their own.
pub fn get_bill(
    conn: &Connection,
    caller: &Caller,
    bill_id: Uuid,
) -> Result<BillView, WorkflowError> {
    let view = get_bill_unchecked(conn, bill_id)?;
    match caller.role {
        Role::Admin | Role::Doctor => Ok(view),
        Role::Patient => {
            let own = directory::find_patient_by_user(conn, caller.user_id)?;
            match own {
                Some(p) if p.id == view.bill.patient_id => Ok(view),
                _ => Err(WorkflowError::Forbidden(
                    "Not authorized to view this bill".into(),
                )),
            }
        }
    }
}

/// List bills, newest first. Staff see all, patients their own.
pub fn list_bills(conn: &Connection, caller: &Caller) -> Result<Vec<BillView>, WorkflowError> {
    let order = " ORDER BY b.created_at DESC";
    let rows = match caller.role {
        Role::Admin | Role::Doctor => {
            let sql = format!("{VIEW_SQL}{order}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], read_view_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        Role::Patient => {
            let patient = match directory::find_patient_by_user(conn, caller.user_id)? {
                Some(p) => p,
                None => return Ok(Vec::new()),
            };
            let sql = format!("{VIEW_SQL} WHERE b.patient_id = ?1{order}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![patient.id.to_string()], read_view_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    rows.into_iter().map(view_from_row).collect()
}

/// Revenue over paid bills, with per-month buckets in ascending
/// month order. Admin-only.
pub fn revenue_stats(conn: &Connection, caller: &Caller) -> Result<RevenueStats, WorkflowError> {
    if caller.role != Role::Admin {
        return Err(WorkflowError::Forbidden(
            "Only administrators may view revenue".into(),
        ));
    }

    let (total_revenue, paid_bills): (f64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(total_amount), 0), COUNT(*)
         FROM bills WHERE payment_status = 'paid'",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT strftime('%Y-%m', created_at) AS month,
                COALESCE(SUM(total_amount), 0), COUNT(*)
         FROM bills
         WHERE payment_status = 'paid'
         GROUP BY month
         ORDER BY month ASC",
    )?;
    let monthly = stmt
        .query_map([], |row| {
            Ok(MonthlyRevenue {
                month: row.get(0)?,
                revenue: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RevenueStats {
        total_revenue,
        paid_bills,
        monthly,
    })
}
