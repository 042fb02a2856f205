use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{normalize_duration, AppointmentError, SlotComputation, TimeOfDay};
use crate::services::availability::SlotAvailabilityCalculator;
use crate::services::directory::AppointmentDirectory;

/// What the booking form currently shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotBoard {
    pub generation: u64,
    pub doctor_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub duration_minutes: u32,
    pub available_slots: Vec<TimeOfDay>,
    pub selected_time: Option<TimeOfDay>,
    pub error_message: Option<String>,
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied(SlotBoard),
    /// A newer refresh started while this one was in flight.
    Stale { generation: u64, latest: u64 },
}

/// Re-fetches and recomputes slots whenever doctor, date, or duration change.
///
/// Every refresh takes a generation number before it starts fetching; its
/// result is only written to the board if no newer refresh has started since.
pub struct SlotRefreshCoordinator {
    directory: Arc<dyn AppointmentDirectory>,
    calculator: SlotAvailabilityCalculator,
    generation: AtomicU64,
    board: RwLock<SlotBoard>,
}

impl SlotRefreshCoordinator {
    pub fn new(directory: Arc<dyn AppointmentDirectory>) -> Self {
        Self::with_calculator(directory, SlotAvailabilityCalculator::default())
    }

    pub fn with_calculator(
        directory: Arc<dyn AppointmentDirectory>,
        calculator: SlotAvailabilityCalculator,
    ) -> Self {
        Self {
            directory,
            calculator,
            generation: AtomicU64::new(0),
            board: RwLock::new(SlotBoard::default()),
        }
    }

    /// Starts a new cycle and returns its generation.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest_generation() == generation
    }

    pub async fn snapshot(&self) -> SlotBoard {
        self.board.read().await.clone()
    }

    pub async fn refresh(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        requested_duration: Option<i64>,
        auth_token: Option<&str>,
    ) -> RefreshOutcome {
        let generation = self.begin();
        debug!(
            "Refresh {} for doctor {} on {} ({:?} minutes)",
            generation, doctor_id, date, requested_duration
        );

        let result = match self
            .directory
            .appointments_for_doctor_on_date(doctor_id, date, auth_token)
            .await
        {
            Ok(payload) => self.calculator.compute_from_json(&payload, requested_duration),
            Err(e) => Err(e),
        };

        self.apply(generation, doctor_id, date, requested_duration, result).await
    }

    /// Writes a finished cycle to the board unless a newer one has started.
    pub async fn apply(
        &self,
        generation: u64,
        doctor_id: &str,
        date: NaiveDate,
        requested_duration: Option<i64>,
        result: Result<SlotComputation, AppointmentError>,
    ) -> RefreshOutcome {
        let mut board = self.board.write().await;

        let latest = self.latest_generation();
        if generation != latest {
            debug!("Discarding stale slot result {} (latest is {})", generation, latest);
            return RefreshOutcome::Stale { generation, latest };
        }

        board.generation = generation;
        board.doctor_id = Some(doctor_id.to_string());
        board.date = Some(date);

        match result {
            Ok(computation) => {
                if let Some(selected) = board.selected_time {
                    if !computation.contains(selected) {
                        info!("Selected time {} no longer available, clearing it", selected);
                        board.selected_time = None;
                    }
                }
                board.duration_minutes = computation.duration_minutes;
                board.available_slots = computation.available_slots;
                board.fallback = computation.fallback;
                board.error_message = None;
            }
            Err(e) => {
                warn!("Slot refresh {} failed: {}", generation, e);
                board.duration_minutes = normalize_duration(requested_duration);
                board.available_slots.clear();
                board.selected_time = None;
                board.fallback = false;
                board.error_message = Some(e.user_message());
            }
        }

        RefreshOutcome::Applied(board.clone())
    }

    /// Picks a start time from the currently displayed slots.
    pub async fn select_time(&self, time: TimeOfDay) -> Result<(), AppointmentError> {
        let mut board = self.board.write().await;
        if !board.available_slots.contains(&time) {
            return Err(AppointmentError::SlotNotAvailable(time));
        }
        board.selected_time = Some(time);
        Ok(())
    }
}
