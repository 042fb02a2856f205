use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{
    normalize_duration, AppointmentError, AppointmentRecord, BlockingInterval,
    SlotComputation, TimeOfDay, WorkingWindow,
};
use crate::services::timestamp::TimestampParser;

/// Turns a doctor's appointments for one day into bookable start times.
///
/// Pure: no I/O and no state between calls, so identical inputs always give
/// identical output.
#[derive(Debug, Clone, Default)]
pub struct SlotAvailabilityCalculator {
    window: WorkingWindow,
    parser: TimestampParser,
}

impl SlotAvailabilityCalculator {
    pub fn new(window: WorkingWindow, parser: TimestampParser) -> Self {
        Self { window, parser }
    }

    /// Computes slots from a raw backend payload. A payload that is not a JSON
    /// array is an error; array elements that do not decode are skipped.
    pub fn compute_from_json(
        &self,
        payload: &Value,
        requested_duration: Option<i64>,
    ) -> Result<SlotComputation, AppointmentError> {
        let items = payload.as_array().ok_or_else(|| {
            AppointmentError::MalformedCollection(json_kind(payload).to_string())
        })?;

        let mut undecodable = 0;
        let records: Vec<AppointmentRecord> = items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Invalid appointment data skipped: {} ({})", item, e);
                    undecodable += 1;
                    None
                }
            })
            .collect();

        let mut computation = self.compute(&records, requested_duration);
        computation.skipped_records += undecodable;
        Ok(computation)
    }

    /// Parses each record into a blocking interval. Returns the intervals and
    /// the number of records whose timestamp could not be read.
    pub fn blocking_intervals(&self, appointments: &[AppointmentRecord]) -> (Vec<BlockingInterval>, usize) {
        let mut skipped = 0;
        let intervals = appointments
            .iter()
            .filter_map(|appointment| {
                let Some(start) = self.parser.parse(&appointment.appointment_date_time) else {
                    warn!(
                        "Invalid appointment datetime skipped: '{}'",
                        appointment.appointment_date_time
                    );
                    skipped += 1;
                    return None;
                };

                let start = start.minutes();
                Some(BlockingInterval {
                    start,
                    end: start.saturating_add(appointment.duration_minutes()),
                    status: appointment.status(),
                })
            })
            .collect();

        (intervals, skipped)
    }

    pub fn compute(
        &self,
        appointments: &[AppointmentRecord],
        requested_duration: Option<i64>,
    ) -> SlotComputation {
        let duration = normalize_duration(requested_duration);
        let (intervals, skipped_records) = self.blocking_intervals(appointments);
        let parsed_records = intervals.len();

        let active: Vec<BlockingInterval> = intervals
            .into_iter()
            .filter(|interval| interval.status.is_active())
            .collect();

        debug!(
            "Computing {}-minute slots against {} active of {} parsed appointments",
            duration,
            active.len(),
            parsed_records
        );

        let closing = self.window.day_end.minutes();
        let mut available_slots: Vec<TimeOfDay> = self
            .window
            .grid()
            .filter(|slot| {
                let start = slot.minutes();
                let end = start.saturating_add(duration);
                if end > closing {
                    return false;
                }

                match active.iter().find(|blocker| blocker.overlaps(start, end)) {
                    Some(blocker) => {
                        debug!(
                            "Slot {} ({}-{}) conflicts with {} appointment at {} ({}-{})",
                            slot,
                            start,
                            end,
                            blocker.status,
                            TimeOfDay::from_minutes(blocker.start),
                            blocker.start,
                            blocker.end
                        );
                        false
                    }
                    None => true,
                }
            })
            .collect();

        let mut fallback = false;
        if available_slots.is_empty() {
            if active.is_empty() {
                warn!(
                    "No slots generated for {} minutes without any active appointments, using default grid",
                    duration
                );
                available_slots = self.window.grid().collect();
                fallback = true;
            } else {
                debug!("No available time slots, day is fully booked");
            }
        }

        SlotComputation {
            available_slots,
            duration_minutes: duration,
            fallback,
            parsed_records,
            skipped_records,
            active_appointments: active.len(),
        }
    }
}

/// Slots for the standard clinic window with the default timestamp parser.
pub fn compute_slots(appointments: &[AppointmentRecord], requested_duration: Option<i64>) -> SlotComputation {
    SlotAvailabilityCalculator::default().compute(appointments, requested_duration)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
