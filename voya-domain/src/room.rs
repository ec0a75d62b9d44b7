use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A room is an indivisible per-night unit: no counter, availability is
/// derived from interval overlap against existing reservations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub hotel_item_id: Uuid,
    pub room_number: String,
    pub active: bool,
    pub available: bool,
    pub max_occupancy: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl ReservationStatus {
    /// Statuses that keep a room occupied for overlap purposes.
    pub fn blocks_room(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Confirmed | ReservationStatus::CheckedIn
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomReservation {
    pub id: Uuid,
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: ReservationStatus,
}

impl RoomReservation {
    /// Half-open interval rule: [a, b) and [c, d) overlap iff a < d && c < b.
    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        self.check_in < check_out && self.check_out > check_in
    }

    pub fn blocks(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        self.status.blocks_room() && self.overlaps(check_in, check_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn reservation(check_in: NaiveDate, check_out: NaiveDate, status: ReservationStatus) -> RoomReservation {
        RoomReservation {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            check_in,
            check_out,
            status,
        }
    }

    #[test]
    fn back_to_back_stays_do_not_overlap() {
        let existing = reservation(d(10), d(13), ReservationStatus::Confirmed);
        // new guest checks in the day the old one checks out
        assert!(!existing.blocks(d(13), d(15)));
        assert!(!existing.blocks(d(8), d(10)));
    }

    #[test]
    fn contained_stay_overlaps() {
        let existing = reservation(d(10), d(20), ReservationStatus::CheckedIn);
        assert!(existing.blocks(d(12), d(14)));
        assert!(existing.blocks(d(9), d(11)));
        assert!(existing.blocks(d(19), d(25)));
    }

    #[test]
    fn cancelled_reservation_does_not_block() {
        let existing = reservation(d(10), d(20), ReservationStatus::Cancelled);
        assert!(!existing.blocks(d(12), d(14)));
    }
}
