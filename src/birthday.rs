//! Daily birthday announcements.

use crate::{
    log_error, log_internal,
    logging::PrintColor,
    persistent_state::{BirthdayRecord, PersistentState},
    scheduler::Job,
};
use chrono::{Datelike, NaiveDate};
use serenity::all::{ChannelId, Http, UserId};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct BirthdayJob {
    http: Arc<Http>,
    pstate: Arc<RwLock<PersistentState>>,
    channel_id: ChannelId,
    in_flight: Mutex<()>,
}

/// Members whose birthday is `today` and who have not been wished yet today.
pub fn due_birthdays(records: &[BirthdayRecord], today: NaiveDate) -> Vec<UserId> {
    records
        .iter()
        .filter(|b| b.day == today.day() && b.month == today.month())
        .filter(|b| b.last_wished != Some(today))
        .map(|b| b.user_id)
        .collect()
}

impl BirthdayJob {
    pub fn new(
        http: Arc<Http>,
        pstate: Arc<RwLock<PersistentState>>,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            http,
            pstate,
            channel_id,
            in_flight: Mutex::new(()),
        }
    }

    async fn wish(&self, today: NaiveDate) {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            log_internal!("Previous birthday run still in progress, skipping");
            return;
        };

        let due = due_birthdays(&self.pstate.read().await.birthdays.0, today);
        if due.is_empty() {
            return;
        }

        if let Err(e) = self.channel_id.to_channel(&self.http).await {
            log_error!("Birthday channel {} unavailable: {}", self.channel_id, e);
            return;
        }

        for user_id in due {
            let user = match user_id.to_user(&self.http).await {
                Ok(user) => user,
                Err(e) => {
                    log_error!("Could not look up birthday user {}: {}", user_id, e);
                    continue;
                }
            };

            // Claimed before sending: any other run now sees the member as wished
            if !self.pstate.write().await.birthdays.claim_wish(user_id, today) {
                continue;
            }

            let message = format!(
                "🎉 Happy Birthday, <@{}>! Hope you have a fantastic day! 🎂",
                user.id
            );
            if let Err(e) = self.channel_id.say(&self.http, message).await {
                log_error!("Failed to wish {} a happy birthday: {}", user.color(), e);
                self.pstate
                    .write()
                    .await
                    .birthdays
                    .release_wish(user_id, today);
                continue;
            }
            log_internal!("Wished {} a happy birthday", user.color());

            if let Err(e) = self.pstate.write().await.save().await {
                log_error!("{}", e);
            }
        }
    }
}

#[serenity::async_trait]
impl Job for BirthdayJob {
    fn name(&self) -> &'static str {
        "birthday"
    }

    async fn run(&self) {
        self.wish(chrono::Local::now().date_naive()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, day: u32, month: u32, last_wished: Option<NaiveDate>) -> BirthdayRecord {
        BirthdayRecord {
            user_id: UserId::new(id),
            day,
            month,
            last_wished,
        }
    }

    #[test]
    fn only_todays_unwished_birthdays_are_due() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 29).unwrap();
        let last_year = NaiveDate::from_ymd_opt(2024, 3, 29).unwrap();
        let records = [
            record(1, 29, 3, None),
            record(2, 29, 3, Some(last_year)),
            record(3, 29, 3, Some(today)),
            record(4, 28, 3, None),
            record(5, 29, 4, None),
        ];

        assert_eq!(
            due_birthdays(&records, today),
            [UserId::new(1), UserId::new(2)]
        );
    }

    #[tokio::test]
    async fn overlapping_run_leaves_due_members_alone() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 29).unwrap();
        let mut pstate = PersistentState::default();
        pstate.birthdays.set(UserId::new(1), 29, 3).unwrap();
        let pstate = Arc::new(RwLock::new(pstate));
        let job = BirthdayJob::new(
            Arc::new(Http::new("")),
            Arc::clone(&pstate),
            ChannelId::new(1),
        );

        let guard = job.in_flight.try_lock().unwrap();
        job.wish(today).await;
        drop(guard);

        let pstate = pstate.read().await;
        assert_eq!(pstate.birthdays.get(UserId::new(1)).unwrap().last_wished, None);
        assert_eq!(due_birthdays(&pstate.birthdays.0, today), [UserId::new(1)]);
    }

    #[test]
    fn leap_day_only_due_in_leap_years() {
        let records = [record(1, 29, 2, None)];
        let leap = NaiveDate::from_ymd_opt(2028, 2, 29).unwrap();
        let not_leap = NaiveDate::from_ymd_opt(2027, 2, 28).unwrap();
        assert_eq!(due_birthdays(&records, leap), [UserId::new(1)]);
        assert!(due_birthdays(&records, not_leap).is_empty());
    }
}
