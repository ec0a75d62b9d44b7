use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use voya_domain::{
    Allocation, AllocationStatus, CapacityRow, Flight, ProviderType, RequestStatus, Room,
    RoomReservation, ServiceRequest,
};

use crate::error::StoreError;
use crate::store::{Store, StoreTx};

type LedgerKey = (ProviderType, Uuid, NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Request(Uuid),
    Flight(Uuid),
    Allocation(Uuid),
    Ledger(ProviderType, Uuid, NaiveDate),
}

#[derive(Default)]
struct Tables {
    requests: HashMap<Uuid, ServiceRequest>,
    ledger: HashMap<LedgerKey, CapacityRow>,
    flights: HashMap<Uuid, Flight>,
    rooms: HashMap<Uuid, Room>,
    reservations: Vec<RoomReservation>,
    allocations: HashMap<Uuid, Allocation>,
}

/// In-memory store with the same transactional contract as Postgres:
/// per-row pessimistic locks held for the transaction's duration, version
/// CAS on ledger writes, and full rollback through an undo log. Backs the
/// test suite and the no-database dev mode.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<StdMutex<Tables>>,
    row_locks: Arc<StdMutex<HashMap<RowKey, Arc<AsyncMutex<()>>>>>,
    lock_wait: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            tables: Arc::new(StdMutex::new(Tables::default())),
            row_locks: Arc::new(StdMutex::new(HashMap::new())),
            lock_wait: Duration::from_secs(2),
        }
    }

    /// Shorter lock-wait bound, handy for exercising the timeout path.
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn put_request(&self, request: ServiceRequest) {
        self.tables.lock().unwrap().requests.insert(request.id, request);
    }

    pub fn put_flight(&self, flight: Flight) {
        self.tables.lock().unwrap().flights.insert(flight.id, flight);
    }

    pub fn put_room(&self, room: Room) {
        self.tables.lock().unwrap().rooms.insert(room.id, room);
    }

    pub fn put_reservation(&self, reservation: RoomReservation) {
        self.tables.lock().unwrap().reservations.push(reservation);
    }

    pub fn put_ledger_row(&self, row: CapacityRow) {
        let key = (row.provider_type, row.item_id, row.date);
        self.tables.lock().unwrap().ledger.insert(key, row);
    }

    pub fn ledger_snapshot(
        &self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
    ) -> Option<CapacityRow> {
        self.tables
            .lock()
            .unwrap()
            .ledger
            .get(&(provider_type, item_id, date))
            .cloned()
    }

    pub fn flight_snapshot(&self, id: Uuid) -> Option<Flight> {
        self.tables.lock().unwrap().flights.get(&id).cloned()
    }

    pub fn request_snapshot(&self, id: Uuid) -> Option<ServiceRequest> {
        self.tables.lock().unwrap().requests.get(&id).cloned()
    }

    pub fn allocation_snapshot(&self, id: Uuid) -> Option<Allocation> {
        self.tables.lock().unwrap().allocations.get(&id).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

enum Undo {
    Request(ServiceRequest),
    Ledger(LedgerKey, Option<CapacityRow>),
    Flight(Flight),
    Allocation(Uuid, Option<Allocation>),
}

pub struct MemoryTx {
    store: MemoryStore,
    held: HashSet<RowKey>,
    guards: Vec<OwnedMutexGuard<()>>,
    undo: Vec<Undo>,
}

impl MemoryTx {
    fn new(store: MemoryStore) -> Self {
        MemoryTx {
            store,
            held: HashSet::new(),
            guards: Vec::new(),
            undo: Vec::new(),
        }
    }

    /// Take the per-row lock, waiting up to the store's lock-wait bound.
    /// Re-acquiring a key this transaction already holds is a no-op.
    async fn acquire(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains(&key) {
            return Ok(());
        }
        let lock = {
            let mut locks = self.store.row_locks.lock().unwrap();
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        match tokio::time::timeout(self.store.lock_wait, lock.lock_owned()).await {
            Ok(guard) => {
                self.guards.push(guard);
                self.held.insert(key);
                Ok(())
            }
            Err(_) => Err(StoreError::LockTimeout),
        }
    }

    fn apply_undo(tables: &mut Tables, undo: &mut Vec<Undo>) {
        while let Some(entry) = undo.pop() {
            match entry {
                Undo::Request(prev) => {
                    tables.requests.insert(prev.id, prev);
                }
                Undo::Ledger(key, Some(prev)) => {
                    tables.ledger.insert(key, prev);
                }
                Undo::Ledger(key, None) => {
                    tables.ledger.remove(&key);
                }
                Undo::Flight(prev) => {
                    tables.flights.insert(prev.id, prev);
                }
                Undo::Allocation(id, Some(prev)) => {
                    tables.allocations.insert(id, prev);
                }
                Undo::Allocation(id, None) => {
                    tables.allocations.remove(&id);
                }
            }
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        // Commit clears the undo log; anything left means the transaction
        // was abandoned and must leave no trace.
        if !self.undo.is_empty() {
            let mut tables = self.store.tables.lock().unwrap();
            Self::apply_undo(&mut tables, &mut self.undo);
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_request(&mut self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError> {
        self.acquire(RowKey::Request(id)).await?;
        Ok(self.store.tables.lock().unwrap().requests.get(&id).cloned())
    }

    async fn mark_request_approved(
        &mut self,
        id: Uuid,
        approver: &str,
        notes: Option<&str>,
        terms: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        let request = tables
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::Database(format!("request {} missing", id)))?;
        self.undo.push(Undo::Request(request.clone()));
        request.status = RequestStatus::Approved;
        request.approved_by = Some(approver.to_string());
        request.approval_notes = notes.map(str::to_string);
        request.approval_terms = terms.map(str::to_string);
        request.decided_at = Some(Utc::now());
        Ok(())
    }

    async fn ledger_row_for_update(
        &mut self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<CapacityRow>, StoreError> {
        self.acquire(RowKey::Ledger(provider_type, item_id, date)).await?;
        let key = (provider_type, item_id, date);
        Ok(self.store.tables.lock().unwrap().ledger.get(&key).cloned())
    }

    async fn insert_ledger_row(&mut self, row: &CapacityRow) -> Result<(), StoreError> {
        self.acquire(RowKey::Ledger(row.provider_type, row.item_id, row.date))
            .await?;
        let key = (row.provider_type, row.item_id, row.date);
        let mut tables = self.store.tables.lock().unwrap();
        if tables.ledger.contains_key(&key) {
            return Err(StoreError::Database(format!(
                "ledger row already exists for {}",
                row.date
            )));
        }
        self.undo.push(Undo::Ledger(key, None));
        tables.ledger.insert(key, row.clone());
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
        let key = (provider_type, item_id, date);
        let mut tables = self.store.tables.lock().unwrap();
        let row = match tables.ledger.get_mut(&key) {
            Some(row) if row.version == expected_version => row,
            _ => return Ok(false),
        };
        self.undo.push(Undo::Ledger(key, Some(row.clone())));
        row.allocated_capacity += quantity;
        row.available_capacity -= quantity;
        row.version += 1;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn credit_ledger(
        &mut self,
        provider_type: ProviderType,
        item_id: Uuid,
        date: NaiveDate,
        quantity: i32,
    ) -> Result<bool, StoreError> {
        let key = (provider_type, item_id, date);
        let mut tables = self.store.tables.lock().unwrap();
        let row = match tables.ledger.get_mut(&key) {
            Some(row) if row.allocated_capacity >= quantity => row,
            _ => return Ok(false),
        };
        self.undo.push(Undo::Ledger(key, Some(row.clone())));
        row.allocated_capacity -= quantity;
        row.available_capacity += quantity;
        row.version += 1;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn lock_flight(&mut self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        self.acquire(RowKey::Flight(id)).await?;
        Ok(self.store.tables.lock().unwrap().flights.get(&id).cloned())
    }

    async fn debit_seats(&mut self, flight_id: Uuid, count: i32) -> Result<bool, StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        let flight = match tables.flights.get_mut(&flight_id) {
            Some(flight) if flight.available_seats >= count => flight,
            _ => return Ok(false),
        };
        self.undo.push(Undo::Flight(flight.clone()));
        flight.available_seats -= count;
        Ok(true)
    }

    async fn credit_seats(&mut self, flight_id: Uuid, count: i32) -> Result<(), StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        let flight = tables
            .flights
            .get_mut(&flight_id)
            .ok_or_else(|| StoreError::Database(format!("flight {} missing", flight_id)))?;
        self.undo.push(Undo::Flight(flight.clone()));
        flight.available_seats = (flight.available_seats + count).min(flight.total_seats);
        Ok(())
    }

    async fn count_rooms(&mut self, hotel_item_id: Uuid) -> Result<i64, StoreError> {
        let tables = self.store.tables.lock().unwrap();
        Ok(tables
            .rooms
            .values()
            .filter(|room| room.hotel_item_id == hotel_item_id)
            .count() as i64)
    }

    async fn count_available_rooms(
        &mut self,
        hotel_item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        occupancy: i32,
    ) -> Result<i64, StoreError> {
        let tables = self.store.tables.lock().unwrap();
        let free = tables
            .rooms
            .values()
            .filter(|room| {
                room.hotel_item_id == hotel_item_id
                    && room.active
                    && room.available
                    && room.max_occupancy >= occupancy
            })
            .filter(|room| {
                !tables
                    .reservations
                    .iter()
                    .any(|r| r.room_id == room.id && r.blocks(check_in, check_out))
            })
            .count();
        Ok(free as i64)
    }

    async fn insert_allocation(&mut self, allocation: &Allocation) -> Result<(), StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        if tables.allocations.contains_key(&allocation.id) {
            return Err(StoreError::Database(format!(
                "allocation {} already exists",
                allocation.id
            )));
        }
        self.undo.push(Undo::Allocation(allocation.id, None));
        tables.allocations.insert(allocation.id, allocation.clone());
        Ok(())
    }

    async fn lock_allocation(&mut self, id: Uuid) -> Result<Option<Allocation>, StoreError> {
        self.acquire(RowKey::Allocation(id)).await?;
        Ok(self.store.tables.lock().unwrap().allocations.get(&id).cloned())
    }

    async fn mark_allocation_released(
        &mut self,
        id: Uuid,
        released_by: &str,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        let allocation = tables
            .allocations
            .get_mut(&id)
            .ok_or_else(|| StoreError::Database(format!("allocation {} missing", id)))?;
        self.undo.push(Undo::Allocation(id, Some(allocation.clone())));
        allocation.status = AllocationStatus::Released;
        allocation.released_at = Some(Utc::now());
        allocation.released_by = Some(released_by.to_string());
        allocation.release_reason = reason.map(str::to_string);
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.undo.clear();
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        let mut tables = self.store.tables.lock().unwrap();
        Self::apply_undo(&mut tables, &mut self.undo);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(MemoryTx::new(self.clone()))
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError> {
        Ok(self.tables.lock().unwrap().requests.get(&id).cloned())
    }

    async fn get_allocation(&self, id: Uuid) -> Result<Option<Allocation>, StoreError> {
        Ok(self.tables.lock().unwrap().allocations.get(&id).cloned())
    }

    async fn availability(
        &self,
        provider_type: ProviderType,
        item_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CapacityRow>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<CapacityRow> = tables
            .ledger
            .values()
            .filter(|row| {
                row.provider_type == provider_type
                    && row.item_id == item_id
                    && row.date >= start
                    && row.date <= end
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.date);
        Ok(rows)
    }
}
