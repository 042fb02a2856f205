pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::{
    AppointmentError, AppointmentRecord, AppointmentStatus, SlotComputation,
    TimeOfDay, WorkingWindow,
};
pub use services::*;
