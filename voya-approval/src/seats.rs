use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use voya_domain::{
    Allocation, AllocationBreakdown, CabinClass, Flight, FlightStatus, RequestDetail,
    SeatAllocation, ServiceRequest,
};
use voya_store::StoreTx;

use crate::error::ApprovalError;
use crate::strategy::{ApprovalOptions, ReservationOutcome, ReservationStrategy};

/// Single-counter seat pool for flights. The reserve step is one
/// conditional decrement; a lost race fails the call without internal
/// retry, a higher layer decides whether to try again.
pub struct SeatCounterStrategy {
    default_fare: f64,
}

impl SeatCounterStrategy {
    pub fn new(default_fare: f64) -> Self {
        SeatCounterStrategy { default_fare }
    }

    fn cabin(request: &ServiceRequest) -> Option<CabinClass> {
        match &request.detail {
            RequestDetail::Flight { cabin_class } => *cabin_class,
            _ => None,
        }
    }

    fn check_bookable(flight: &Flight, count: i32) -> Result<(), ApprovalError> {
        if !flight.active {
            return Err(ApprovalError::InvalidState(format!(
                "flight {} is inactive",
                flight.flight_number
            )));
        }
        if flight.status != FlightStatus::Scheduled {
            return Err(ApprovalError::InvalidState(format!(
                "flight {} is not scheduled",
                flight.flight_number
            )));
        }
        let now = Utc::now();
        if flight.departure_at <= now {
            return Err(ApprovalError::InvalidState(format!(
                "flight {} has already departed",
                flight.flight_number
            )));
        }
        if let Some(deadline) = flight.booking_deadline_at {
            if deadline <= now {
                return Err(ApprovalError::InvalidState(format!(
                    "booking deadline for flight {} has passed",
                    flight.flight_number
                )));
            }
        }
        if flight.available_seats < count {
            return Err(ApprovalError::InsufficientSeats {
                requested: count,
                available: flight.available_seats,
            });
        }
        if flight.group_booking {
            let min = flight.min_group_size.unwrap_or(1);
            let max = flight.max_group_size.unwrap_or(i32::MAX);
            if count < min || count > max {
                return Err(ApprovalError::InvalidState(format!(
                    "group booking size {} outside [{}, {}]",
                    count, min, max
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: StoreTx + 'static> ReservationStrategy<T> for SeatCounterStrategy {
    async fn validate(&self, tx: &mut T, request: &ServiceRequest) -> Result<(), ApprovalError> {
        let flight = tx
            .lock_flight(request.item_id)
            .await?
            .ok_or(ApprovalError::FlightNotFound(request.item_id))?;
        Self::check_bookable(&flight, request.quantity)
    }

    async fn reserve(
        &self,
        tx: &mut T,
        request: &ServiceRequest,
        options: &ApprovalOptions,
    ) -> Result<ReservationOutcome, ApprovalError> {
        let flight = tx
            .lock_flight(request.item_id)
            .await?
            .ok_or(ApprovalError::FlightNotFound(request.item_id))?;

        let reserved = tx.debit_seats(flight.id, request.quantity).await?;
        if !reserved {
            warn!(flight_id = %flight.id, requested = request.quantity, "seat debit lost the race");
            return Err(ApprovalError::SeatReservationFailed { flight_id: flight.id });
        }

        let cabin = Self::cabin(request).unwrap_or(CabinClass::Economy);
        let unit_price = options
            .pricing
            .as_ref()
            .and_then(|p| p.unit_price)
            .unwrap_or_else(|| flight.fare_for(Some(cabin), self.default_fare));

        let breakdown = AllocationBreakdown::Seats {
            seats: SeatAllocation {
                flight_id: flight.id,
                seats: request.quantity,
                cabin_class: cabin,
                unit_price,
            },
        };
        let total_price = breakdown.total_price();
        Ok(ReservationOutcome {
            breakdown,
            total_price,
            currency: request.currency.clone(),
        })
    }

    async fn release(&self, tx: &mut T, allocation: &Allocation) -> Result<(), ApprovalError> {
        let AllocationBreakdown::Seats { seats } = &allocation.breakdown else {
            return Err(ApprovalError::ReleaseFailed(
                "allocation carries no seat breakdown".to_string(),
            ));
        };
        tx.credit_seats(seats.flight_id, seats.seats).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn flight() -> Flight {
        Flight {
            id: Uuid::new_v4(),
            flight_number: "VY42".to_string(),
            status: FlightStatus::Scheduled,
            active: true,
            total_seats: 180,
            available_seats: 10,
            departure_at: Utc::now() + Duration::days(10),
            booking_deadline_at: Some(Utc::now() + Duration::days(9)),
            group_booking: false,
            min_group_size: None,
            max_group_size: None,
            economy_fare: Some(100.0),
            business_fare: None,
            first_fare: None,
        }
    }

    #[test]
    fn bookable_flight_passes() {
        assert!(SeatCounterStrategy::check_bookable(&flight(), 4).is_ok());
    }

    #[test]
    fn seat_shortfall_is_a_capacity_conflict() {
        let err = SeatCounterStrategy::check_bookable(&flight(), 11).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_CAPACITY");
    }

    #[test]
    fn cancelled_flight_is_not_bookable() {
        let mut f = flight();
        f.status = FlightStatus::Cancelled;
        let err = SeatCounterStrategy::check_bookable(&f, 1).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[test]
    fn passed_deadline_blocks_booking() {
        let mut f = flight();
        f.booking_deadline_at = Some(Utc::now() - Duration::hours(1));
        assert!(SeatCounterStrategy::check_bookable(&f, 1).is_err());
    }

    #[test]
    fn group_bounds_are_enforced() {
        let mut f = flight();
        f.group_booking = true;
        f.min_group_size = Some(5);
        f.max_group_size = Some(8);
        assert!(SeatCounterStrategy::check_bookable(&f, 4).is_err());
        assert!(SeatCounterStrategy::check_bookable(&f, 5).is_ok());
        assert!(SeatCounterStrategy::check_bookable(&f, 9).is_err());
    }
}
