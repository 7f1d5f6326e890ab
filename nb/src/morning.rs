//! Daily morning trigger
//!
//! Sleeps until the configured UTC hour, then asks the controller to prompt
//! every known chat for today's goals.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use tracing::{debug, error, info};

use crate::controller::SessionController;

/// Cron schedule firing daily at `hour:00 UTC`
///
/// Returns None for an hour outside 0..=23.
pub fn daily_schedule(hour: u32) -> Option<Cron> {
    debug!(%hour, "daily_schedule: called");
    if hour > 23 {
        return None;
    }
    let expr = format!("0 {} * * *", hour);
    match expr.parse::<Cron>() {
        Ok(cron) => Some(cron),
        Err(e) => {
            error!(%expr, error = %e, "Failed to parse morning schedule");
            None
        }
    }
}

/// First occurrence of `schedule` strictly after `now`
pub fn next_fire(schedule: &Cron, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.find_next_occurrence(&now, false).ok()
}

/// Run the trigger until the task is aborted
pub async fn run(controller: Arc<SessionController>, hour: u32) {
    debug!(%hour, "morning::run: called");
    let Some(schedule) = daily_schedule(hour) else {
        error!(%hour, "Invalid morning hour; morning prompts disabled");
        return;
    };
    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        // Never schedule at or before the last firing, even if the wall clock lags
        let from = match last_fired {
            Some(last) => Utc::now().max(last),
            None => Utc::now(),
        };
        let Some(next) = next_fire(&schedule, from) else {
            error!(%hour, "No next morning occurrence; morning prompts disabled");
            return;
        };

        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        info!(next = %next.to_rfc3339(), wait_secs = wait.as_secs(), "Next morning prompt scheduled");
        tokio::time::sleep(wait).await;

        let delivered = controller.morning_tick().await;
        info!(delivered, "Morning prompt sent");
        last_fired = Some(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::MORNING_PROMPT;
    use crate::testing::TestHarness;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn fourteen() -> Cron {
        daily_schedule(14).unwrap()
    }

    #[test]
    fn test_next_fire_later_today() {
        assert_eq!(next_fire(&fourteen(), at(9, 30)), Some(at(14, 0)));
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        let tomorrow = Utc.with_ymd_and_hms(2026, 3, 11, 14, 0, 0).unwrap();
        assert_eq!(next_fire(&fourteen(), at(15, 0)), Some(tomorrow));
        // Exactly on the hour counts as already fired
        assert_eq!(next_fire(&fourteen(), at(14, 0)), Some(tomorrow));
    }

    #[test]
    fn test_next_fire_midnight_and_month_end() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 0).unwrap();
        let midnight = daily_schedule(0).unwrap();
        assert_eq!(next_fire(&midnight, now), Some(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_daily_schedule_rejects_bad_hour() {
        assert!(daily_schedule(24).is_none());
        assert!(daily_schedule(23).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_prompts_known_chats() {
        let h = TestHarness::new(Duration::from_secs(25 * 60));
        h.controller.handle_text(5, "/start").await;
        h.messenger.clear().await;

        let trigger = tokio::spawn(run(h.controller.clone(), 14));
        tokio::time::sleep(Duration::from_secs(24 * 3600 + 60)).await;
        trigger.abort();

        let texts = h.messenger.texts_for(5).await;
        assert!(!texts.is_empty());
        assert!(texts.iter().all(|t| t == MORNING_PROMPT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_bad_hour() {
        let h = TestHarness::new(Duration::from_secs(60));
        // Returns instead of looping
        run(h.controller.clone(), 99).await;
    }
}
