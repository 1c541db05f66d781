//! Daily overdue sweep.
//!
//! Sleeps until the configured hour (UTC), runs the sweep, and repeats until
//! the cancellation token fires.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::{
    models::system_log::{AuditAction, NewSystemLog},
    services::Services,
};

/// Next occurrence of `hour:00` UTC strictly after `now`
pub fn next_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run the sweep every day at `hour` UTC until `cancel` is triggered
pub async fn run(services: Services, hour: u32, cancel: CancellationToken) {
    tracing::info!(hour_utc = hour, "Overdue scheduler started");

    loop {
        let now = Utc::now();
        let next = next_run(now, hour);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next_run = %next, "Overdue sweep scheduled");

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Overdue scheduler stopping");
                break;
            }
            _ = tokio::time::sleep(wait) => {
                match services.borrows.run_overdue_sweep(Utc::now()).await {
                    Ok(sweep) => {
                        services
                            .audit
                            .record(NewSystemLog::new(AuditAction::OverdueSweep).details(json!({
                                "marked_overdue": sweep.marked_overdue,
                                "reminders_sent": sweep.reminders_sent,
                                "expired_reservations": sweep.expired_reservations,
                            })))
                            .await;
                    }
                    Err(e) => tracing::error!(error = %e, "Overdue sweep failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 1, 30, 0).unwrap();
        assert_eq!(next_run(now, 3), Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap();
        assert_eq!(next_run(now, 3), Utc.with_ymd_and_hms(2024, 5, 11, 3, 0, 0).unwrap());

        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(next_run(now, 0), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_clamps_hour() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 1, 0, 0).unwrap();
        assert_eq!(next_run(now, 99), Utc.with_ymd_and_hms(2024, 5, 10, 23, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_next_run_is_in_the_future() {
        let now = Utc::now();
        for hour in 0..24 {
            let next = next_run(now, hour);
            assert!(next > now);
            assert!(next - now <= Duration::days(1));
        }
    }
}
