use crate::log_internal;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serenity::all::UserId;
use std::{io::ErrorKind, path::PathBuf};

const PSTATE_PATH_REL_HOME: &str = ".config/synbot/state.toml";

/// State which persists across sessions
#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct PersistentState {
    #[serde(default)]
    pub stream_links: StreamLinks,
    #[serde(default)]
    pub birthdays: Birthdays,
    #[serde(default)]
    pub timezones: Timezones,
}

/// Member to streaming-platform login, in the order the links were created.
#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct StreamLinks(pub Vec<StreamLink>);

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StreamLink {
    pub user_id: UserId,
    pub login: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LinkChange {
    Created,
    Updated,
    Unchanged,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct Birthdays(pub Vec<BirthdayRecord>);

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BirthdayRecord {
    pub user_id: UserId,
    pub day: u32,
    pub month: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_wished: Option<NaiveDate>,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct Timezones(pub Vec<TimezoneRecord>);

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimezoneRecord {
    pub user_id: UserId,
    pub timezone: String,
}

impl PersistentState {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(PSTATE_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    /// Load state from disk.  A missing state file is a fresh start, not an error.
    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log_internal!(
                    "No state at `{}`, starting empty",
                    path.to_string_lossy()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(anyhow!(
                    "Could not read state at `{}`: {}",
                    path.to_string_lossy(),
                    e
                ))
            }
        };

        let pstate: PersistentState = toml::from_str(&contents).map_err(|e| {
            anyhow!(
                "Could not parse state at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Ok(pstate)
    }

    pub async fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let pstate_str = toml::to_string_pretty(&self)
            .map_err(|e| anyhow!("Could not serialize state: {}", e))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow!(
                    "Could not create directory `{}`: {}",
                    parent.to_string_lossy(),
                    e
                )
            })?;
        }

        // Create a temporary file in the same directory.
        let tmp_path = path.with_extension("toml.new");

        tokio::fs::write(&tmp_path, pstate_str).await.map_err(|e| {
            anyhow!(
                "Could not write state to temporary file `{}`: {}",
                tmp_path.to_string_lossy(),
                e
            )
        })?;

        // Atomically rename the temporary file over the target file.
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            anyhow!(
                "Could not rename temporary file `{}` to `{}`: {}",
                tmp_path.to_string_lossy(),
                path.to_string_lossy(),
                e
            )
        })?;

        Ok(())
    }
}

/// Twitch logins are ASCII letters, digits and underscores.
pub fn is_valid_login(login: &str) -> bool {
    !login.is_empty() && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl StreamLinks {
    pub fn get(&self, user_id: UserId) -> Option<&StreamLink> {
        self.0.iter().find(|link| link.user_id == user_id)
    }

    pub fn all(&self) -> &[StreamLink] {
        &self.0
    }

    /// Link `user_id` to `login`.  Fails if another member already holds the login, compared
    /// case-insensitively.
    pub fn set(&mut self, user_id: UserId, login: &str) -> Result<LinkChange> {
        if !is_valid_login(login) {
            return Err(anyhow!("Invalid Twitch login `{}`", login));
        }

        let taken_by = self
            .0
            .iter()
            .find(|link| link.user_id != user_id && link.login.eq_ignore_ascii_case(login));
        if let Some(other) = taken_by {
            return Err(anyhow!(
                "Twitch login `{}` is already linked to <@{}>",
                login,
                other.user_id
            ));
        }

        match self.0.iter_mut().find(|link| link.user_id == user_id) {
            Some(link) if link.login.eq_ignore_ascii_case(login) => Ok(LinkChange::Unchanged),
            Some(link) => {
                link.login = login.to_owned();
                Ok(LinkChange::Updated)
            }
            None => {
                self.0.push(StreamLink {
                    user_id,
                    login: login.to_owned(),
                });
                Ok(LinkChange::Created)
            }
        }
    }

    /// Returns the removed link, if any.
    pub fn remove(&mut self, user_id: UserId) -> Option<StreamLink> {
        let index = self.0.iter().position(|link| link.user_id == user_id)?;
        Some(self.0.remove(index))
    }
}

impl Birthdays {
    pub fn get(&self, user_id: UserId) -> Option<&BirthdayRecord> {
        self.0.iter().find(|b| b.user_id == user_id)
    }

    /// Returns true if this replaced an existing birthday.
    pub fn set(&mut self, user_id: UserId, day: u32, month: u32) -> Result<bool> {
        if !is_valid_day_month(day, month) {
            return Err(anyhow!("{} {} is not a calendar date", day, month));
        }

        match self.0.iter_mut().find(|b| b.user_id == user_id) {
            Some(record) => {
                record.day = day;
                record.month = month;
                Ok(true)
            }
            None => {
                self.0.push(BirthdayRecord {
                    user_id,
                    day,
                    month,
                    last_wished: None,
                });
                Ok(false)
            }
        }
    }

    /// Record a wish for `date` unless one is already recorded.  Returns false if the member
    /// was already wished that day, or has no birthday stored.
    pub fn claim_wish(&mut self, user_id: UserId, date: NaiveDate) -> bool {
        match self.0.iter_mut().find(|b| b.user_id == user_id) {
            Some(record) if record.last_wished != Some(date) => {
                record.last_wished = Some(date);
                true
            }
            _ => false,
        }
    }

    /// Undo `claim_wish` after the wish could not be sent.
    pub fn release_wish(&mut self, user_id: UserId, date: NaiveDate) {
        if let Some(record) = self.0.iter_mut().find(|b| b.user_id == user_id) {
            if record.last_wished == Some(date) {
                record.last_wished = None;
            }
        }
    }
}

/// 2000 is a leap year, so 29 February is accepted.
pub fn is_valid_day_month(day: u32, month: u32) -> bool {
    NaiveDate::from_ymd_opt(2000, month, day).is_some()
}

impl Timezones {
    pub fn get(&self, user_id: UserId) -> Option<&TimezoneRecord> {
        self.0.iter().find(|t| t.user_id == user_id)
    }

    /// Returns true if this replaced an existing timezone.  Callers validate the timezone.
    pub fn set(&mut self, user_id: UserId, timezone: &str) -> bool {
        match self.0.iter_mut().find(|t| t.user_id == user_id) {
            Some(record) => {
                record.timezone = timezone.to_owned();
                true
            }
            None => {
                self.0.push(TimezoneRecord {
                    user_id,
                    timezone: timezone.to_owned(),
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64) -> UserId {
        UserId::new(id)
    }

    #[test]
    fn link_created_updated_unchanged() {
        let mut links = StreamLinks::default();
        assert_eq!(links.set(user(1), "Alice").unwrap(), LinkChange::Created);
        assert_eq!(links.set(user(1), "alice").unwrap(), LinkChange::Unchanged);
        assert_eq!(links.set(user(1), "alice_2").unwrap(), LinkChange::Updated);
        assert_eq!(links.get(user(1)).unwrap().login, "alice_2");
        assert_eq!(links.all().len(), 1);
    }

    #[test]
    fn login_is_unique_ignoring_case() {
        let mut links = StreamLinks::default();
        links.set(user(1), "alice").unwrap();
        assert!(links.set(user(2), "ALICE").is_err());
        assert!(links.get(user(2)).is_none());
    }

    #[test]
    fn rejects_bad_logins() {
        let mut links = StreamLinks::default();
        assert!(links.set(user(1), "").is_err());
        assert!(links.set(user(1), "has space").is_err());
        assert!(links.set(user(1), "dash-name").is_err());
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut links = StreamLinks::default();
        links.set(user(1), "a").unwrap();
        links.set(user(2), "b").unwrap();
        links.set(user(3), "c").unwrap();
        assert_eq!(links.remove(user(2)).unwrap().login, "b");
        assert!(links.remove(user(2)).is_none());
        let logins: Vec<_> = links.all().iter().map(|l| l.login.as_str()).collect();
        assert_eq!(logins, ["a", "c"]);
    }

    #[test]
    fn birthdays_validate_calendar_dates() {
        let mut birthdays = Birthdays::default();
        assert!(!birthdays.set(user(1), 29, 2).unwrap());
        assert!(birthdays.set(user(1), 31, 12).unwrap());
        assert!(birthdays.set(user(1), 31, 4).is_err());
        assert!(birthdays.set(user(1), 0, 1).is_err());
        assert!(birthdays.set(user(1), 1, 13).is_err());
        assert_eq!(birthdays.get(user(1)).unwrap().month, 12);
    }

    #[test]
    fn a_birthday_wish_is_claimed_once_per_day() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 29).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        let mut birthdays = Birthdays::default();
        birthdays.set(user(1), 29, 3).unwrap();

        assert!(birthdays.claim_wish(user(1), today));
        assert!(!birthdays.claim_wish(user(1), today));
        assert!(!birthdays.claim_wish(user(2), today));

        // A failed send hands the claim back; a stale release is ignored
        birthdays.release_wish(user(1), tomorrow);
        assert_eq!(birthdays.get(user(1)).unwrap().last_wished, Some(today));
        birthdays.release_wish(user(1), today);
        assert_eq!(birthdays.get(user(1)).unwrap().last_wished, None);
        assert!(birthdays.claim_wish(user(1), today));
    }

    #[test]
    fn state_survives_toml() {
        let mut pstate = PersistentState::default();
        pstate.stream_links.set(user(10), "alice").unwrap();
        pstate.birthdays.set(user(10), 3, 4).unwrap();
        assert!(pstate
            .birthdays
            .claim_wish(user(10), NaiveDate::from_ymd_opt(2024, 4, 3).unwrap()));
        pstate.timezones.set(user(10), "Asia/Kolkata");

        let text = toml::to_string_pretty(&pstate).unwrap();
        let back: PersistentState = toml::from_str(&text).unwrap();

        assert_eq!(back.stream_links.all(), pstate.stream_links.all());
        assert_eq!(back.birthdays.0, pstate.birthdays.0);
        assert_eq!(back.timezones.0, pstate.timezones.0);
    }

    #[test]
    fn empty_document_is_empty_state() {
        let pstate: PersistentState = toml::from_str("").unwrap();
        assert!(pstate.stream_links.all().is_empty());
        assert!(pstate.birthdays.0.is_empty());
    }
}
