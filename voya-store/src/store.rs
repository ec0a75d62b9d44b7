use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use voya_domain::{Allocation, CapacityRow, Flight, ProviderType, ServiceRequest};

use crate::error::StoreError;

/// One open transaction against the backing store.
///
/// Lock ordering convention: the request (or allocation) row is locked
/// first, then ledger/flight rows; ledger rows are always taken in
/// ascending date order. The retry policy upstream is the safety net for
/// the deadlocks this does not prevent, not a substitute for it.
#[async_trait]
pub trait StoreTx: Send {
    /// SELECT ... FOR UPDATE on the request row.
    async fn lock_request(&mut self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError>;

    async fn mark_request_approved(
        &mut self,
        id: Uuid,
        approver: &str,
        notes: Option<&str>,
        terms: Option<&str>,
    ) -> Result<(), StoreError>;

    /// SELECT ... FOR UPDATE on one ledger row; None when the date has no
    /// inventory yet.
    async fn ledger_row_for_update(
        &mut self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<CapacityRow>, StoreError>;

    async fn insert_ledger_row(&mut self, row: &CapacityRow) -> Result<(), StoreError>;

    /// Compare-and-swap debit: `allocated += qty, available -= qty,
    /// version += 1 WHERE version = expected_version`. Returns false when
    /// zero rows matched, meaning a concurrent writer won the race.
    async fn debit_ledger(
        &mut self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
        quantity: i32,
        expected_version: i64,
    ) -> Result<bool, StoreError>;

    /// Credit capacity back on release. Returns false when the row does not
    /// hold enough allocated units to give back.
    async fn credit_ledger(
        &mut self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<bool, StoreError>;

    async fn lock_flight(&mut self, id: Uuid) -> Result<Option<Flight>, StoreError>;

    /// Conditional seat debit: `available_seats -= count WHERE
    /// available_seats >= count`. False means the race was lost.
    async fn debit_seats(&mut self, flight_id: Uuid, count: i32) -> Result<bool, StoreError>;

    /// Seat credit clamped at total_seats, guarding against double release.
    async fn credit_seats(&mut self, flight_id: Uuid, count: i32) -> Result<(), StoreError>;

    async fn count_rooms(&mut self, hotel_item_id: Uuid) -> Result<i64, StoreError>;

    /// Rooms of the hotel that are active, available, fit the party and
    /// have no blocking reservation overlapping [check_in, check_out).
    async fn count_available_rooms(
        &mut self,
        hotel_item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        occupancy: i32,
    ) -> Result<i64, StoreError>;

    async fn insert_allocation(&mut self, allocation: &Allocation) -> Result<(), StoreError>;

    /// SELECT ... FOR UPDATE on the allocation row.
    async fn lock_allocation(&mut self, id: Uuid) -> Result<Option<Allocation>, StoreError>;

    async fn mark_allocation_released(
        &mut self,
        id: Uuid,
        released_by: &str,
        reason: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Handle to the backing store. Read paths take no locks.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx + 'static;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn get_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError>;

    async fn get_allocation(&self, id: Uuid) -> Result<Option<Allocation>, StoreError>;

    /// Ledger rows for [start, end], ascending by date. Missing dates are
    /// simply absent from the result.
    async fn availability(
        &self,
        provider_type: ProviderType,
        item_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CapacityRow>, StoreError>;
}
