use async_trait::async_trait;
use tracing::debug;

use voya_domain::{Allocation, RequestDetail, ServiceRequest};
use voya_store::StoreTx;

use crate::error::ApprovalError;
use crate::ledger::LedgerStrategy;
use crate::strategy::{ApprovalOptions, ReservationOutcome, ReservationStrategy};

/// Hotel strategy: a room-count gate in front of the capacity ledger.
///
/// Rooms have no counter; sufficiency is the number of rooms with no
/// reservation overlapping [check_in, check_out). The per-night debit and
/// pricing still run through the ledger so there is exactly one place
/// doing day-by-day bookkeeping.
pub struct RoomCalendarStrategy {
    ledger: LedgerStrategy,
}

impl RoomCalendarStrategy {
    pub fn new(ledger: LedgerStrategy) -> Self {
        RoomCalendarStrategy { ledger }
    }

    async fn check_rooms<T: StoreTx>(
        &self,
        tx: &mut T,
        request: &ServiceRequest,
    ) -> Result<(), ApprovalError> {
        let RequestDetail::Rooms { rooms_requested, occupancy } = request.detail else {
            // No room detail: plain per-night hotel capacity, ledger only.
            return Ok(());
        };

        // The ledger debits request.quantity; a detail asking for a
        // different room count would silently over- or under-book.
        if rooms_requested != request.quantity {
            return Err(ApprovalError::InvalidState(format!(
                "rooms_requested {} does not match request quantity {}",
                rooms_requested, request.quantity
            )));
        }

        let total = tx.count_rooms(request.item_id).await?;
        if total == 0 {
            return Err(ApprovalError::HotelNotFound(request.item_id));
        }

        let free = tx
            .count_available_rooms(request.item_id, request.start_date, request.end_date, occupancy)
            .await?;
        debug!(
            hotel = %request.item_id,
            free,
            requested = rooms_requested,
            "room calendar gate"
        );
        if free < i64::from(rooms_requested) {
            return Err(ApprovalError::InsufficientRooms {
                requested: rooms_requested,
                available: free,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<T: StoreTx + 'static> ReservationStrategy<T> for RoomCalendarStrategy {
    async fn validate(&self, tx: &mut T, request: &ServiceRequest) -> Result<(), ApprovalError> {
        self.check_rooms(tx, request).await?;
        self.ledger.validate(tx, request).await
    }

    async fn reserve(
        &self,
        tx: &mut T,
        request: &ServiceRequest,
        options: &ApprovalOptions,
    ) -> Result<ReservationOutcome, ApprovalError> {
        self.ledger.reserve(tx, request, options).await
    }

    async fn release(&self, tx: &mut T, allocation: &Allocation) -> Result<(), ApprovalError> {
        self.ledger.release(tx, allocation).await
    }
}
