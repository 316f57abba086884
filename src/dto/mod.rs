use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod action;
pub mod events;
pub mod health;
pub mod session;
pub mod validation;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

fn format_epoch_millis(millis: u64) -> String {
    format_system_time(UNIX_EPOCH + Duration::from_millis(millis))
}
