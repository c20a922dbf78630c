use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bookable time slot for an activity on a given day
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub booked: i32,
}

impl AvailabilitySlot {
    /// Seats still free
    pub fn remaining(&self) -> i32 {
        (self.capacity - self.booked).max(0)
    }

    pub fn can_fit(&self, participants: i32) -> bool {
        participants <= self.remaining()
    }
}

/// Input for opening a slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
}

impl NewSlot {
    pub fn validate(&self, today: NaiveDate) -> Result<(), String> {
        if self.start_time >= self.end_time {
            return Err("start_time must be before end_time".to_string());
        }
        if self.capacity < 1 {
            return Err("capacity must be at least 1".to_string());
        }
        if self.date < today {
            return Err("cannot open availability in the past".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(capacity: i32, booked: i32) -> AvailabilitySlot {
        AvailabilitySlot {
            id: Uuid::new_v4(),
            activity_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            capacity,
            booked,
        }
    }

    #[test]
    fn test_remaining_seats() {
        assert_eq!(slot(10, 4).remaining(), 6);
        assert!(slot(10, 4).can_fit(6));
        assert!(!slot(10, 4).can_fit(7));
        assert_eq!(slot(5, 5).remaining(), 0);
    }

    #[test]
    fn test_new_slot_validation() {
        let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let valid = NewSlot {
            date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            capacity: 8,
        };
        assert!(valid.validate(today).is_ok());

        let reversed = NewSlot {
            start_time: valid.end_time,
            end_time: valid.start_time,
            ..valid.clone()
        };
        assert!(reversed.validate(today).is_err());

        let past = NewSlot {
            date: NaiveDate::from_ymd_opt(2029, 12, 31).unwrap(),
            ..valid
        };
        assert!(past.validate(today).is_err());
    }
}
