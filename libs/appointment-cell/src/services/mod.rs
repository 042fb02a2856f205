pub mod availability;
pub mod directory;
pub mod refresh;
pub mod timestamp;

pub use availability::{compute_slots, SlotAvailabilityCalculator};
pub use directory::{AppointmentDirectory, HttpAppointmentDirectory};
pub use refresh::{RefreshOutcome, SlotBoard, SlotRefreshCoordinator};
pub use timestamp::{ParseStrategy, TimestampParser};
