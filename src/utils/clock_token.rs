use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache;
use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;
use uuid::Uuid;

use crate::engine::attendance::ClockAction;
use crate::engine::geofence::GeofenceCheck;

/// Server-held intermediate state of the two-phase clock flow: the check
/// phase issues a token scoped to (employee, action, date) and the confirm
/// phase consumes it. Single use; expiry comes from the cache TTL, so a
/// stale check result cannot be replayed later with old coordinates.
#[derive(Debug, Clone)]
pub struct PendingClockAction {
    pub employee_id: u64,
    pub action: ClockAction,
    pub date: NaiveDate,
    pub geofence: GeofenceCheck,
    pub issued_at: DateTime<Utc>,
}

fn token_ttl_secs() -> u64 {
    env::var("CLOCK_TOKEN_TTL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(120)
}

static TOKEN_CACHE: Lazy<Cache<String, PendingClockAction>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(token_ttl_secs()))
        .build()
});

/// Issues a confirm token for a passed check.
pub async fn issue(
    employee_id: u64,
    action: ClockAction,
    date: NaiveDate,
    geofence: GeofenceCheck,
) -> String {
    let token = Uuid::new_v4().to_string();
    let pending = PendingClockAction {
        employee_id,
        action,
        date,
        geofence,
        issued_at: Utc::now(),
    };
    TOKEN_CACHE.insert(token.clone(), pending).await;
    token
}

/// Consumes a token. Returns None when the token is unknown or expired, or
/// when it was issued to a different employee, action, or date; the caller
/// treats all of those as a dead token and re-runs the check phase.
pub async fn take(
    token: &str,
    employee_id: u64,
    action: ClockAction,
    date: NaiveDate,
) -> Option<PendingClockAction> {
    let pending = TOKEN_CACHE.remove(&token.to_string()).await?;
    if pending.employee_id != employee_id || pending.action != action || pending.date != date {
        return None;
    }
    Some(pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsite_check() -> GeofenceCheck {
        GeofenceCheck {
            matched: false,
            location_id: None,
            label: "1.00000, 2.00000".to_string(),
            distance_m: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[actix_web::test]
    async fn token_is_single_use() {
        let token = issue(1000, ClockAction::ClockIn, today(), offsite_check()).await;

        let first = take(&token, 1000, ClockAction::ClockIn, today()).await;
        assert!(first.is_some());

        let second = take(&token, 1000, ClockAction::ClockIn, today()).await;
        assert!(second.is_none());
    }

    #[actix_web::test]
    async fn token_is_scoped_to_employee_action_and_date() {
        let token = issue(1000, ClockAction::ClockIn, today(), offsite_check()).await;
        assert!(take(&token, 2000, ClockAction::ClockIn, today()).await.is_none());

        let token = issue(1000, ClockAction::ClockIn, today(), offsite_check()).await;
        assert!(take(&token, 1000, ClockAction::ClockOut, today()).await.is_none());

        let token = issue(1000, ClockAction::ClockIn, today(), offsite_check()).await;
        let other_day = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert!(take(&token, 1000, ClockAction::ClockIn, other_day).await.is_none());
    }

    #[actix_web::test]
    async fn unknown_token_is_refused() {
        assert!(
            take("no-such-token", 1000, ClockAction::ClockIn, today())
                .await
                .is_none()
        );
    }
}
