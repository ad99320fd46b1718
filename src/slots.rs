//! Day-view schedule grid.
//!
//! Partitions the 08:00-18:00 workday into booked blocks (one per
//! appointment) and open blocks of at most the configured slot length.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};

use crate::models::{Appointment, AppointmentDraft};

pub const DAY_START_HOUR: u32 = 8;
pub const DAY_END_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySelector {
    Today,
    Tomorrow,
    On(NaiveDate),
}

impl DaySelector {
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            DaySelector::Today => today,
            DaySelector::Tomorrow => today.succ_opt().unwrap_or(today),
            DaySelector::On(date) => date,
        }
    }
}

impl FromStr for DaySelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(DaySelector::Today),
            "tomorrow" => Ok(DaySelector::Tomorrow),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
                .map(DaySelector::On)
                .map_err(|_| format!("expected today, tomorrow or YYYY-MM-DD, got {s:?}")),
        }
    }
}

/// Length of an open block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotDuration {
    Fifteen,
    #[default]
    Thirty,
    Sixty,
}

impl SlotDuration {
    pub fn minutes(self) -> u32 {
        match self {
            SlotDuration::Fifteen => 15,
            SlotDuration::Thirty => 30,
            SlotDuration::Sixty => 60,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(i64::from(self.minutes()))
    }
}

impl TryFrom<u32> for SlotDuration {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            15 => Ok(SlotDuration::Fifteen),
            30 => Ok(SlotDuration::Thirty),
            60 => Ok(SlotDuration::Sixty),
            m => Err(format!("slot duration must be 15, 30 or 60 minutes, got {m}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub appointment: Option<Appointment>,
}

impl TimeSlot {
    fn open(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end, appointment: None }
    }

    fn booked(appointment: &Appointment) -> Self {
        Self {
            start: appointment.start_time,
            end: appointment.end_time,
            appointment: Some(appointment.clone()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.appointment.is_none()
    }

    /// Form values for a click on this block: open blocks start a new
    /// appointment of the configured length, booked blocks do nothing.
    pub fn prefill(&self, duration: SlotDuration) -> Option<AppointmentDraft> {
        if !self.is_open() {
            return None;
        }
        Some(AppointmentDraft {
            patient_id: None,
            start_time: self.start,
            end_time: self.start + duration.as_duration(),
            notes: None,
        })
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"));
        match &self.appointment {
            None => write!(f, "{range} open"),
            Some(a) => {
                let who = a.patient.as_ref().map(|p| p.display()).unwrap_or_default();
                write!(f, "{range} booked {who}")
            }
        }
    }
}

/// `[08:00, 18:00]` of `date` in `tz`, as UTC instants.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let at = |hour: u32| {
        date.and_hms_opt(hour, 0, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest())
            .map(|dt| dt.with_timezone(&Utc))
    };
    Some((at(DAY_START_HOUR)?, at(DAY_END_HOUR)?))
}

/// Slots for `day` in the machine's local time zone.
pub fn slots_for(appointments: &[Appointment], day: DaySelector, duration: SlotDuration) -> Vec<TimeSlot> {
    let date = day.resolve(Local::now().date_naive());
    compute_day_slots(appointments, date, &Local, duration)
}

pub fn compute_day_slots<Tz: TimeZone>(
    appointments: &[Appointment],
    date: NaiveDate,
    tz: &Tz,
    duration: SlotDuration,
) -> Vec<TimeSlot> {
    let Some((day_start, day_end)) = day_bounds(date, tz) else {
        tracing::warn!(%date, "workday bounds do not exist in this time zone");
        return Vec::new();
    };

    // out-of-window appointments are dropped, not clipped
    let mut booked: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.start_time >= day_start && a.start_time <= day_end)
        .collect();
    booked.sort_by_key(|a| a.start_time);

    let step = duration.as_duration();
    let mut queue = booked.into_iter().peekable();
    let mut cursor = day_start;
    let mut slots = Vec::new();

    while cursor < day_end {
        let next_start = queue.peek().map(|a| a.start_time);
        match next_start {
            Some(start) if start <= cursor => {
                let Some(appt) = queue.next() else { break };
                if appt.start_time < cursor {
                    // data is not reconciled here; the grid will overlap
                    tracing::warn!(
                        appointment = %appt.id,
                        "appointment overlaps the previous block"
                    );
                }
                slots.push(TimeSlot::booked(appt));
                cursor = appt.end_time;
            }
            _ => {
                let mut end = (cursor + step).min(day_end);
                if let Some(start) = next_start {
                    end = end.min(start);
                }
                slots.push(TimeSlot::open(cursor, end));
                cursor = end;
            }
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::FixedOffset;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date().and_hms_opt(h, m, 0).unwrap())
    }

    fn appt(start: DateTime<Utc>, end: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            status: AppointmentStatus::Scheduled,
            patient: None,
            notes: None,
        }
    }

    fn assert_tiles(slots: &[TimeSlot], start: DateTime<Utc>, end: DateTime<Utc>) {
        assert_eq!(slots.first().unwrap().start, start);
        assert_eq!(slots.last().unwrap().end, end);
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap at {}", pair[0].end);
        }
    }

    #[test]
    fn empty_day_hourly() {
        let slots = compute_day_slots(&[], date(), &Utc, SlotDuration::Sixty);
        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(TimeSlot::is_open));
        assert!(slots.iter().all(|s| s.end - s.start == Duration::hours(1)));
        assert_tiles(&slots, at(8, 0), at(18, 0));
    }

    #[test]
    fn single_booking_half_hour_grid() {
        let booked = appt(at(9, 0), at(9, 30));
        let slots = compute_day_slots(&[booked.clone()], date(), &Utc, SlotDuration::Thirty);

        // open blocks never exceed the slot length, so 08-09 is two blocks
        assert_eq!(slots[0], TimeSlot::open(at(8, 0), at(8, 30)));
        assert_eq!(slots[1], TimeSlot::open(at(8, 30), at(9, 0)));
        assert_eq!(slots[2].appointment.as_ref(), Some(&booked));
        assert_eq!((slots[2].start, slots[2].end), (at(9, 0), at(9, 30)));
        assert_eq!(slots[3], TimeSlot::open(at(9, 30), at(10, 0)));
        assert_eq!(slots[4], TimeSlot::open(at(10, 0), at(10, 30)));
        assert_eq!(slots.last().unwrap(), &TimeSlot::open(at(17, 30), at(18, 0)));
        assert_eq!(slots.len(), 20);
        assert_tiles(&slots, at(8, 0), at(18, 0));
    }

    #[test]
    fn open_block_clipped_to_next_booking() {
        let slots = compute_day_slots(&[appt(at(8, 20), at(8, 50))], date(), &Utc, SlotDuration::Sixty);
        assert_eq!(slots[0], TimeSlot::open(at(8, 0), at(8, 20)));
        assert!(!slots[1].is_open());
        assert_eq!(slots[2], TimeSlot::open(at(8, 50), at(9, 50)));
        assert_eq!(slots.last().unwrap().end, at(18, 0));
        assert!(slots.iter().filter(|s| s.is_open()).all(|s| s.end - s.start <= Duration::hours(1)));
        assert_tiles(&slots, at(8, 0), at(18, 0));
    }

    #[test]
    fn back_to_back_bookings_are_separate_blocks() {
        let a = appt(at(10, 0), at(10, 45));
        let b = appt(at(10, 45), at(11, 15));
        let slots = compute_day_slots(&[b, a], date(), &Utc, SlotDuration::Fifteen);
        let booked: Vec<_> = slots.iter().filter(|s| !s.is_open()).collect();
        assert_eq!(booked.len(), 2);
        assert_eq!(booked[0].start, at(10, 0));
        assert_eq!(booked[1].start, at(10, 45));
        assert_tiles(&slots, at(8, 0), at(18, 0));
    }

    #[test]
    fn out_of_window_appointments_are_excluded() {
        let early = appt(at(7, 30), at(8, 30));
        let late = appt(at(18, 30), at(19, 0));
        let other_day = appt(at(9, 0) + Duration::days(1), at(10, 0) + Duration::days(1));
        let slots = compute_day_slots(&[early, late, other_day], date(), &Utc, SlotDuration::Sixty);
        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(TimeSlot::is_open));
    }

    #[test]
    fn overlapping_appointments_are_not_reconciled() {
        let a = appt(at(9, 0), at(10, 0));
        let b = appt(at(9, 30), at(10, 30));
        let slots = compute_day_slots(&[a, b], date(), &Utc, SlotDuration::Thirty);
        let booked: Vec<_> = slots.iter().filter(|s| !s.is_open()).collect();
        assert_eq!(booked.len(), 2);
        assert!(booked[0].end > booked[1].start);
    }

    #[test]
    fn local_time_zone_shifts_bounds() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let slots = compute_day_slots(&[], date(), &tz, SlotDuration::Sixty);
        assert_eq!(slots.first().unwrap().start, at(6, 0));
        assert_eq!(slots.last().unwrap().end, at(16, 0));
    }

    #[test]
    fn prefill_only_for_open_blocks() {
        let slots = compute_day_slots(&[appt(at(9, 0), at(9, 30))], date(), &Utc, SlotDuration::Thirty);
        let draft = slots[1].prefill(SlotDuration::Thirty).unwrap();
        assert_eq!(draft.start_time, at(8, 30));
        assert_eq!(draft.end_time, at(9, 0));
        assert_eq!(slots[2].prefill(SlotDuration::Thirty), None);
    }

    #[test]
    fn selectors_and_durations_parse() {
        assert_eq!("Today".parse::<DaySelector>().unwrap(), DaySelector::Today);
        assert_eq!(
            "2026-03-02".parse::<DaySelector>().unwrap().resolve(date()),
            date()
        );
        assert_eq!(DaySelector::Tomorrow.resolve(date()), date().succ_opt().unwrap());
        assert!("next week".parse::<DaySelector>().is_err());

        assert_eq!(SlotDuration::try_from(15).unwrap(), SlotDuration::Fifteen);
        assert!(SlotDuration::try_from(45).is_err());
        assert_eq!(SlotDuration::default().minutes(), 30);
    }
}
