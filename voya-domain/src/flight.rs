use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightStatus {
    Scheduled,
    Delayed,
    Cancelled,
    Departed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CabinClass {
    Economy,
    Business,
    First,
}

/// Seat-pool inventory: one counter per flight, mutated only through
/// conditional atomic updates so the count can never go negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub status: FlightStatus,
    pub active: bool,
    pub total_seats: i32,
    pub available_seats: i32,
    pub departure_at: DateTime<Utc>,
    pub booking_deadline_at: Option<DateTime<Utc>>,
    pub group_booking: bool,
    pub min_group_size: Option<i32>,
    pub max_group_size: Option<i32>,
    pub economy_fare: Option<f64>,
    pub business_fare: Option<f64>,
    pub first_fare: Option<f64>,
}

impl Flight {
    /// Fare for the requested cabin, falling back to the next lower cabin
    /// and finally to the supplied default when nothing is configured.
    pub fn fare_for(&self, cabin: Option<CabinClass>, default_fare: f64) -> f64 {
        let chain: &[Option<f64>] = match cabin.unwrap_or(CabinClass::Economy) {
            CabinClass::First => &[self.first_fare, self.business_fare, self.economy_fare],
            CabinClass::Business => &[self.business_fare, self.economy_fare],
            CabinClass::Economy => &[self.economy_fare],
        };
        chain.iter().flatten().copied().next().unwrap_or(default_fare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight() -> Flight {
        Flight {
            id: Uuid::new_v4(),
            flight_number: "VY101".to_string(),
            status: FlightStatus::Scheduled,
            active: true,
            total_seats: 180,
            available_seats: 180,
            departure_at: Utc::now() + chrono::Duration::days(30),
            booking_deadline_at: None,
            group_booking: false,
            min_group_size: None,
            max_group_size: None,
            economy_fare: Some(120.0),
            business_fare: None,
            first_fare: Some(900.0),
        }
    }

    #[test]
    fn fare_falls_back_to_lower_cabin() {
        let f = flight();
        // business unset, falls through to economy
        assert_eq!(f.fare_for(Some(CabinClass::Business), 250.0), 120.0);
        assert_eq!(f.fare_for(Some(CabinClass::First), 250.0), 900.0);
    }

    #[test]
    fn fare_uses_default_when_unconfigured() {
        let mut f = flight();
        f.economy_fare = None;
        assert_eq!(f.fare_for(None, 250.0), 250.0);
    }
}
