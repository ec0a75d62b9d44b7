pub mod allocation;
pub mod flight;
pub mod ledger;
pub mod request;
pub mod room;

pub use allocation::{Allocation, AllocationBreakdown, AllocationStatus, DayAllocation, SeatAllocation};
pub use flight::{CabinClass, Flight, FlightStatus};
pub use ledger::{CapacityRow, ProvisionDefaults};
pub use request::{ApprovalBlock, ProviderType, RequestDetail, RequestStatus, ServiceRequest};
pub use room::{ReservationStatus, Room, RoomReservation};
