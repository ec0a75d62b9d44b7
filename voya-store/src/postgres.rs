use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use voya_domain::{
    Allocation, AllocationBreakdown, AllocationStatus, CapacityRow, Flight, FlightStatus,
    ProviderType, RequestDetail, RequestStatus, ServiceRequest,
};

use crate::error::StoreError;
use crate::store::{Store, StoreTx};

/// Postgres-backed store. Pessimistic locks are `SELECT ... FOR UPDATE`,
/// the ledger CAS is a version-guarded UPDATE, and transient conflict
/// classes surface as typed `StoreError` variants via SQLSTATE.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await?;
        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("running database migrations");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Database(err.to_string()))?;
        Ok(())
    }
}

fn parse_provider(s: &str) -> Result<ProviderType, StoreError> {
    ProviderType::from_str(s).map_err(StoreError::Database)
}

fn parse_request_status(s: &str) -> Result<RequestStatus, StoreError> {
    match s {
        "pending" => Ok(RequestStatus::Pending),
        "approved" => Ok(RequestStatus::Approved),
        "rejected" => Ok(RequestStatus::Rejected),
        "expired" => Ok(RequestStatus::Expired),
        "cancelled" => Ok(RequestStatus::Cancelled),
        other => Err(StoreError::Database(format!("unknown request status: {}", other))),
    }
}

fn parse_flight_status(s: &str) -> Result<FlightStatus, StoreError> {
    match s {
        "scheduled" => Ok(FlightStatus::Scheduled),
        "delayed" => Ok(FlightStatus::Delayed),
        "cancelled" => Ok(FlightStatus::Cancelled),
        "departed" => Ok(FlightStatus::Departed),
        other => Err(StoreError::Database(format!("unknown flight status: {}", other))),
    }
}

fn parse_allocation_status(s: &str) -> Result<AllocationStatus, StoreError> {
    match s {
        "active" => Ok(AllocationStatus::Active),
        "released" => Ok(AllocationStatus::Released),
        other => Err(StoreError::Database(format!("unknown allocation status: {}", other))),
    }
}

fn allocation_status_str(status: AllocationStatus) -> &'static str {
    match status {
        AllocationStatus::Active => "active",
        AllocationStatus::Released => "released",
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    provider_type: String,
    item_id: Uuid,
    status: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    quantity: i32,
    currency: String,
    requested_by: String,
    detail: serde_json::Value,
    expires_at: DateTime<Utc>,
    approved_by: Option<String>,
    approval_notes: Option<String>,
    approval_terms: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl RequestRow {
    fn into_domain(self) -> Result<ServiceRequest, StoreError> {
        let detail: RequestDetail = serde_json::from_value(self.detail)
            .map_err(|err| StoreError::Database(format!("bad request detail: {}", err)))?;
        Ok(ServiceRequest {
            id: self.id,
            provider_type: parse_provider(&self.provider_type)?,
            item_id: self.item_id,
            status: parse_request_status(&self.status)?,
            start_date: self.start_date,
            end_date: self.end_date,
            quantity: self.quantity,
            currency: self.currency,
            requested_by: self.requested_by,
            detail,
            expires_at: self.expires_at,
            approved_by: self.approved_by,
            approval_notes: self.approval_notes,
            approval_terms: self.approval_terms,
            decided_at: self.decided_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    provider_type: String,
    item_id: Uuid,
    date: NaiveDate,
    total_capacity: i32,
    allocated_capacity: i32,
    blocked_capacity: i32,
    available_capacity: i32,
    version: i64,
    is_open: bool,
    base_price: f64,
    currency: String,
    updated_at: DateTime<Utc>,
}

impl LedgerRow {
    fn into_domain(self) -> Result<CapacityRow, StoreError> {
        Ok(CapacityRow {
            provider_type: parse_provider(&self.provider_type)?,
            item_id: self.item_id,
            date: self.date,
            total_capacity: self.total_capacity,
            allocated_capacity: self.allocated_capacity,
            blocked_capacity: self.blocked_capacity,
            available_capacity: self.available_capacity,
            version: self.version,
            is_open: self.is_open,
            base_price: self.base_price,
            currency: self.currency,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    flight_number: String,
    status: String,
    active: bool,
    total_seats: i32,
    available_seats: i32,
    departure_at: DateTime<Utc>,
    booking_deadline_at: Option<DateTime<Utc>>,
    group_booking: bool,
    min_group_size: Option<i32>,
    max_group_size: Option<i32>,
    economy_fare: Option<f64>,
    business_fare: Option<f64>,
    first_fare: Option<f64>,
}

impl FlightRow {
    fn into_domain(self) -> Result<Flight, StoreError> {
        Ok(Flight {
            id: self.id,
            flight_number: self.flight_number,
            status: parse_flight_status(&self.status)?,
            active: self.active,
            total_seats: self.total_seats,
            available_seats: self.available_seats,
            departure_at: self.departure_at,
            booking_deadline_at: self.booking_deadline_at,
            group_booking: self.group_booking,
            min_group_size: self.min_group_size,
            max_group_size: self.max_group_size,
            economy_fare: self.economy_fare,
            business_fare: self.business_fare,
            first_fare: self.first_fare,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AllocationRow {
    id: Uuid,
    request_id: Uuid,
    provider_type: String,
    item_id: Uuid,
    status: String,
    allocated_price: f64,
    commission: f64,
    currency: String,
    breakdown: serde_json::Value,
    approved_by: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
    released_by: Option<String>,
    release_reason: Option<String>,
}

impl AllocationRow {
    fn into_domain(self) -> Result<Allocation, StoreError> {
        let breakdown: AllocationBreakdown = serde_json::from_value(self.breakdown)
            .map_err(|err| StoreError::Database(format!("bad allocation breakdown: {}", err)))?;
        Ok(Allocation {
            id: self.id,
            request_id: self.request_id,
            provider_type: parse_provider(&self.provider_type)?,
            item_id: self.item_id,
            status: parse_allocation_status(&self.status)?,
            allocated_price: self.allocated_price,
            commission: self.commission,
            currency: self.currency,
            breakdown,
            approved_by: self.approved_by,
            expires_at: self.expires_at,
            created_at: self.created_at,
            released_at: self.released_at,
            released_by: self.released_by,
            release_reason: self.release_reason,
        })
    }
}

const REQUEST_COLUMNS: &str = "id, provider_type, item_id, status, start_date, end_date, quantity, currency, requested_by, detail, expires_at, approved_by, approval_notes, approval_terms, decided_at, created_at";

const LEDGER_COLUMNS: &str = "provider_type, item_id, date, total_capacity, allocated_capacity, blocked_capacity, available_capacity, version, is_open, base_price, currency, updated_at";

const FLIGHT_COLUMNS: &str = "id, flight_number, status, active, total_seats, available_seats, departure_at, booking_deadline_at, group_booking, min_group_size, max_group_size, economy_fare, business_fare, first_fare";

const ALLOCATION_COLUMNS: &str = "id, request_id, provider_type, item_id, status, allocated_price, commission, currency, breakdown, approved_by, expires_at, created_at, released_at, released_by, release_reason";

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_request(&mut self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError> {
        let sql = format!(
            "SELECT {} FROM service_requests WHERE id = $1 FOR UPDATE",
            REQUEST_COLUMNS
        );
        let row: Option<RequestRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(RequestRow::into_domain).transpose()
    }

    async fn mark_request_approved(
        &mut self,
        id: Uuid,
        approver: &str,
        notes: Option<&str>,
        terms: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE service_requests SET status = 'approved', approved_by = $2, approval_notes = $3, approval_terms = $4, decided_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(approver)
        .bind(notes)
        .bind(terms)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn ledger_row_for_update(
        &mut self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<CapacityRow>, StoreError> {
        let sql = format!(
            "SELECT {} FROM capacity_ledger WHERE provider_type = $1 AND item_id = $2 AND date = $3 FOR UPDATE",
            LEDGER_COLUMNS
        );
        let row: Option<LedgerRow> = sqlx::query_as(&sql)
            .bind(provider_type.as_str())
            .bind(item_id)
            .bind(date)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(LedgerRow::into_domain).transpose()
    }

    async fn insert_ledger_row(&mut self, row: &CapacityRow) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO capacity_ledger ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())",
            LEDGER_COLUMNS
        );
        sqlx::query(&sql)
            .bind(row.provider_type.as_str())
            .bind(row.item_id)
            .bind(row.date)
            .bind(row.total_capacity)
            .bind(row.allocated_capacity)
            .bind(row.blocked_capacity)
            .bind(row.available_capacity)
            .bind(row.version)
            .bind(row.is_open)
            .bind(row.base_price)
            .bind(&row.currency)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn debit_ledger(
        &mut self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
        quantity: i32,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE capacity_ledger SET allocated_capacity = allocated_capacity + $4, available_capacity = available_capacity - $4, version = version + 1, updated_at = NOW() WHERE provider_type = $1 AND item_id = $2 AND date = $3 AND version = $5",
        )
        .bind(provider_type.as_str())
        .bind(item_id)
        .bind(date)
        .bind(quantity)
        .bind(expected_version)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn credit_ledger(
        &mut self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE capacity_ledger SET allocated_capacity = allocated_capacity - $4, available_capacity = available_capacity + $4, version = version + 1, updated_at = NOW() WHERE provider_type = $1 AND item_id = $2 AND date = $3 AND allocated_capacity >= $4",
        )
        .bind(provider_type.as_str())
        .bind(item_id)
        .bind(date)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn lock_flight(&mut self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        let sql = format!("SELECT {} FROM flights WHERE id = $1 FOR UPDATE", FLIGHT_COLUMNS);
        let row: Option<FlightRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(FlightRow::into_domain).transpose()
    }

    async fn debit_seats(&mut self, flight_id: Uuid, count: i32) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE flights SET available_seats = available_seats - $2 WHERE id = $1 AND available_seats >= $2",
        )
        .bind(flight_id)
        .bind(count)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn credit_seats(&mut self, flight_id: Uuid, count: i32) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE flights SET available_seats = LEAST(available_seats + $2, total_seats) WHERE id = $1",
        )
        .bind(flight_id)
        .bind(count)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn count_rooms(&mut self, hotel_item_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE hotel_item_id = $1")
            .bind(hotel_item_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn count_available_rooms(
        &mut self,
        hotel_item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        occupancy: i32,
    ) -> Result<i64, StoreError> {
        // Half-open overlap: existing.check_in < new.check_out AND
        // existing.check_out > new.check_in.
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM rooms r
            WHERE r.hotel_item_id = $1
              AND r.active AND r.available
              AND r.max_occupancy >= $4
              AND NOT EXISTS (
                  SELECT 1 FROM room_reservations rr
                  WHERE rr.room_id = r.id
                    AND rr.status IN ('pending', 'confirmed', 'checked_in')
                    AND rr.check_in < $3
                    AND rr.check_out > $2
              )
            "#,
        )
        .bind(hotel_item_id)
        .bind(check_in)
        .bind(check_out)
        .bind(occupancy)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn insert_allocation(&mut self, allocation: &Allocation) -> Result<(), StoreError> {
        let breakdown = serde_json::to_value(&allocation.breakdown)
            .map_err(|err| StoreError::Database(format!("bad breakdown: {}", err)))?;
        let sql = format!(
            "INSERT INTO allocations ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            ALLOCATION_COLUMNS
        );
        sqlx::query(&sql)
            .bind(allocation.id)
            .bind(allocation.request_id)
            .bind(allocation.provider_type.as_str())
            .bind(allocation.item_id)
            .bind(allocation_status_str(allocation.status))
            .bind(allocation.allocated_price)
            .bind(allocation.commission)
            .bind(&allocation.currency)
            .bind(breakdown)
            .bind(&allocation.approved_by)
            .bind(allocation.expires_at)
            .bind(allocation.created_at)
            .bind(allocation.released_at)
            .bind(allocation.released_by.as_deref())
            .bind(allocation.release_reason.as_deref())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_allocation(&mut self, id: Uuid) -> Result<Option<Allocation>, StoreError> {
        let sql = format!(
            "SELECT {} FROM allocations WHERE id = $1 FOR UPDATE",
            ALLOCATION_COLUMNS
        );
        let row: Option<AllocationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(AllocationRow::into_domain).transpose()
    }

    async fn mark_allocation_released(
        &mut self,
        id: Uuid,
        released_by: &str,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE allocations SET status = 'released', released_at = NOW(), released_by = $2, release_reason = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(released_by)
        .bind(reason)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError> {
        let sql = format!("SELECT {} FROM service_requests WHERE id = $1", REQUEST_COLUMNS);
        let row: Option<RequestRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RequestRow::into_domain).transpose()
    }

    async fn get_allocation(&self, id: Uuid) -> Result<Option<Allocation>, StoreError> {
        let sql = format!("SELECT {} FROM allocations WHERE id = $1", ALLOCATION_COLUMNS);
        let row: Option<AllocationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AllocationRow::into_domain).transpose()
    }

    async fn availability(
        &self,
        provider_type: ProviderType,
        item_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CapacityRow>, StoreError> {
        let sql = format!(
            "SELECT {} FROM capacity_ledger WHERE provider_type = $1 AND item_id = $2 AND date BETWEEN $3 AND $4 ORDER BY date",
            LEDGER_COLUMNS
        );
        let rows: Vec<LedgerRow> = sqlx::query_as(&sql)
            .bind(provider_type.as_str())
            .bind(item_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(LedgerRow::into_domain).collect()
    }
}
