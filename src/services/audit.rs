use crate::error::{AppError, AppResult};
use crate::models::{Booking, BookingStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "booking_created", "booking_status_changed", "payment_event", ...
    pub booking_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub details: serde_json::Value,
}

struct DailyFile {
    date: NaiveDate,
    file: File,
}

fn open_for(directory: &Path, date: NaiveDate) -> AppResult<File> {
    let path = directory.join(format!("audit_{}.log", date.format("%Y-%m-%d")));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))
}

/// Append-only JSON-lines audit trail, one file per UTC day
pub struct AuditTrailService {
    log_directory: PathBuf,
    current: Mutex<DailyFile>,
}

impl AuditTrailService {
    /// Create a new audit trail service
    pub fn new(log_directory: PathBuf) -> AppResult<Self> {
        // Ensure directory exists
        std::fs::create_dir_all(&log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        let date = chrono::Utc::now().date_naive();
        let file = open_for(&log_directory, date)?;

        info!("Audit trail initialized in {:?}", log_directory);

        Ok(Self {
            log_directory,
            current: Mutex::new(DailyFile { date, file }),
        })
    }

    /// Path of the file entries for `date` go to
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.log_directory
            .join(format!("audit_{}.log", date.format("%Y-%m-%d")))
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;

        let mut current = self.current.lock().await;
        let today = chrono::Utc::now().date_naive();
        if current.date != today {
            current.file = open_for(&self.log_directory, today)?;
            current.date = today;
        }

        writeln!(current.file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;

        current
            .file
            .flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Log booking creation
    pub async fn log_booking_created(&self, booking: &Booking) -> AppResult<()> {
        let entry = AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "booking_created".to_string(),
            booking_id: Some(booking.id),
            user_id: Some(booking.user_id),
            details: serde_json::json!({
                "activity_id": booking.activity_id.to_string(),
                "date": booking.date.to_string(),
                "participants": booking.participants,
                "total_price": booking.total_price.to_string(),
                "payment_intent_id": booking.payment_intent_id,
            }),
        };

        self.log(entry).await
    }

    /// Log a status change; `actor` is None when the payment gateway drove it
    pub async fn log_status_changed(
        &self,
        booking: &Booking,
        previous: BookingStatus,
        actor: Option<Uuid>,
    ) -> AppResult<()> {
        let entry = AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "booking_status_changed".to_string(),
            booking_id: Some(booking.id),
            user_id: actor,
            details: serde_json::json!({
                "from": previous.as_str(),
                "to": booking.status,
            }),
        };

        self.log(entry).await
    }

    /// Log a processed payment webhook event
    pub async fn log_payment_event(
        &self,
        event_id: &str,
        event_type: &str,
        payment_intent_id: Option<&str>,
        bookings_updated: usize,
    ) -> AppResult<()> {
        let entry = AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "payment_event".to_string(),
            booking_id: None,
            user_id: None,
            details: serde_json::json!({
                "event_id": event_id,
                "type": event_type,
                "payment_intent_id": payment_intent_id,
                "bookings_updated": bookings_updated,
            }),
        };

        self.log(entry).await
    }
}
