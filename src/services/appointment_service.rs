// src/services/appointment_service.rs

use chrono::{Local, NaiveDate, TimeZone};
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ClientError,
    models::{Appointment, AppointmentDraft, AppointmentStatus, StatusUpdate},
    notice::Notice,
    services::Resource,
    slots::{DaySelector, SlotDuration, TimeSlot, compute_day_slots, day_bounds},
};

#[derive(Clone)]
pub struct AppointmentService {
    resource: Resource<Appointment>,
}

impl AppointmentService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            resource: Resource::new(client, "appointments"),
        }
    }

    pub async fn list(&self) -> Result<Vec<Appointment>, ClientError> {
        self.resource.list().await
    }

    /// Appointments starting inside the workday of `date`.
    pub async fn for_date<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> Result<Vec<Appointment>, ClientError> {
        let all = self.list().await?;
        let Some((start, end)) = day_bounds(date, tz) else {
            return Ok(Vec::new());
        };
        Ok(all
            .into_iter()
            .filter(|a| a.start_time >= start && a.start_time <= end)
            .collect())
    }

    /// Fetch the list and lay out the day grid in local time.
    pub async fn day_view(&self, day: DaySelector, duration: SlotDuration) -> Result<Vec<TimeSlot>, ClientError> {
        let appointments = self.list().await?;
        let date = day.resolve(Local::now().date_naive());
        Ok(compute_day_slots(&appointments, date, &Local, duration))
    }

    /// Submit a candidate appointment. Overlap checking is the backend's job;
    /// a clash comes back as `ClientError::Conflict`.
    pub async fn create(&self, draft: &AppointmentDraft) -> Result<Appointment, ClientError> {
        draft.validate()?;
        match self.resource.create(draft).await {
            Ok(created) => {
                tracing::info!(appointment = %created.id, "appointment booked");
                Ok(created)
            }
            Err(e) => {
                if e.is_conflict() {
                    tracing::info!(start = %draft.start_time, "appointment slot rejected as overlapping");
                }
                Err(e)
            }
        }
    }

    pub async fn complete(&self, id: Uuid) -> Result<Appointment, ClientError> {
        self.set_status(id, AppointmentStatus::Completed).await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Appointment, ClientError> {
        self.set_status(id, AppointmentStatus::Canceled).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        self.resource.delete(id).await
    }

    async fn set_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, ClientError> {
        self.resource.update(id, &StatusUpdate { status }).await
    }
}

/// Notice for a failed booking; overlaps get their own wording.
pub fn booking_notice(err: &ClientError) -> Notice {
    if err.is_conflict() {
        Notice::error("That time overlaps another appointment. Pick a different slot.")
    } else {
        Notice::from_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_gets_specific_notice() {
        let conflict = booking_notice(&ClientError::Conflict("CONFLICT".into(), "overlap".into()));
        let other = booking_notice(&ClientError::Server(500, "x".into()));
        assert!(conflict.message.contains("overlaps"));
        assert_ne!(conflict, other);
    }
}
