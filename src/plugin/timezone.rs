use crate::{
    event::*,
    helper::{MessageHelper, UserHelper},
    plugin::*,
};
use anyhow::Result;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Utc};

/// A stored timezone: either an IANA zone name or a fixed `UTC±H[:MM]` offset.
#[derive(Debug, PartialEq)]
pub enum UserTimezone {
    Named(chrono_tz::Tz),
    Offset(FixedOffset),
}

impl UserTimezone {
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(offset) = parse_utc_offset(s) {
            return Some(Self::Offset(offset));
        }
        s.parse::<chrono_tz::Tz>().ok().map(Self::Named)
    }

    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Named(tz) => now.with_timezone(tz).naive_local(),
            Self::Offset(offset) => now.with_timezone(offset).naive_local(),
        }
    }
}

/// `UTC+5`, `UTC-3:30`, ... with hours 0-14 and minutes 00, 15, 30 or 45.
fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let rest = s.strip_prefix("UTC")?;
    let sign = match rest.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let rest = &rest[1..];

    let (hours, minutes) = match rest.split_once(':') {
        Some((hours, minutes)) => (hours, minutes),
        None => (rest, "00"),
    };
    if hours.is_empty() || hours.len() > 2 || !hours.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !matches!(minutes, "00" | "15" | "30" | "45") {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// e.g. `Sunday, March 29th 2025, 3:05 PM`
fn format_time(time: NaiveDateTime) -> String {
    format!(
        "{}, {} {}{} {}, {}",
        time.format("%A"),
        time.format("%B"),
        time.day(),
        ordinal_suffix(time.day()),
        time.format("%Y"),
        time.format("%-I:%M %p"),
    )
}

pub struct SetTimezone;

#[serenity::async_trait]
impl Plugin for SetTimezone {
    fn name(&self) -> &'static str {
        "settimezone"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_line(
                ctx,
                self.name(),
                " @user <timezone>",
                "set a member's timezone (mod only)",
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        if !msg.is_from_mod(ctx).await? {
            let mod_role = ctx.cfg.read().await.general.mod_role_name.clone();
            let reply = format!(
                "❌ You don't have permission to use this command. Only **{}** can set timezones.",
                mod_role
            );
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        }

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let (Some(user), Some(timezone)) = (msg.first_mention(), args.get(1)) else {
            let reply = format!(
                "❌ Usage: `{0}settimezone @User <timezone>` (e.g. `{0}settimezone @Syn Asia/Kolkata` or `UTC+5:30`)",
                prefix
            );
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        };

        if UserTimezone::parse(timezone).is_none() {
            let reply = format!(
                "❌ Invalid timezone: `{}`. Use a valid IANA name (e.g. Asia/Kolkata) or UTC offset (e.g. UTC+5:30)",
                timezone
            );
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        }

        let replaced = {
            let mut pstate = ctx.pstate.write().await;
            let replaced = pstate.timezones.set(user.id, timezone);
            pstate.save().await?;
            replaced
        };

        let name = user.nick_in_guild(ctx, msg.guild_id).await;
        let verb = if replaced { "Updated" } else { "Set" };
        let reply = format!("🌍 {} timezone for **{}** to **{}**", verb, name, timezone);
        msg.channel_id.say(ctx.http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

pub struct Time;

#[serenity::async_trait]
impl Plugin for Time {
    fn name(&self) -> &'static str {
        "time"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), " @user", "show a member's local time").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let Some(user) = msg.first_mention() else {
            let reply = format!("❌ Usage: `{}time @User`", prefix);
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        };

        let stored = ctx
            .pstate
            .read()
            .await
            .timezones
            .get(user.id)
            .map(|t| t.timezone.clone());

        let name = user.nick_in_guild(ctx, msg.guild_id).await;
        let reply = match stored {
            None => format!(
                "❌ No timezone found for **{}**. Use `{}settimezone` to set one.",
                name, prefix
            ),
            Some(stored) => match UserTimezone::parse(&stored) {
                Some(timezone) => format!(
                    "🕒 Time for **{}**: **{}** ({})",
                    name,
                    format_time(timezone.local_time(Utc::now())),
                    stored
                ),
                // Only reachable if the state file was edited by hand
                None => format!("```Failed to fetch time: unrecognized timezone `{}````", stored),
            },
        };
        msg.channel_id.say(ctx.http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn utc_offsets() {
        let offset = |secs| Some(UserTimezone::Offset(FixedOffset::east_opt(secs).unwrap()));
        assert_eq!(UserTimezone::parse("UTC+5:30"), offset(5 * 3600 + 1800));
        assert_eq!(UserTimezone::parse("UTC-3"), offset(-3 * 3600));
        assert_eq!(UserTimezone::parse("UTC+14"), offset(14 * 3600));
        assert_eq!(UserTimezone::parse("UTC+0:45"), offset(45 * 60));
        assert_eq!(UserTimezone::parse("UTC-09:15"), offset(-(9 * 3600 + 15 * 60)));
    }

    #[test]
    fn rejects_bad_offsets() {
        for bad in [
            "UTC+15", "UTC+5:20", "UTC+", "UTC5", "UTC+123", "UTC+5:", "UTC+a", "utc+5",
        ] {
            assert_eq!(parse_utc_offset(bad), None, "{}", bad);
        }
    }

    #[test]
    fn iana_names() {
        assert_eq!(
            UserTimezone::parse("Asia/Kolkata"),
            Some(UserTimezone::Named(chrono_tz::Asia::Kolkata))
        );
        assert_eq!(UserTimezone::parse("Mars/Olympus_Mons"), None);
        assert_eq!(UserTimezone::parse(""), None);
    }

    #[test]
    fn local_time_applies_offset() {
        let now = Utc.with_ymd_and_hms(2025, 3, 29, 20, 0, 0).unwrap();
        let kolkata = UserTimezone::parse("Asia/Kolkata").unwrap();
        let behind = UserTimezone::parse("UTC-3").unwrap();

        let expected = NaiveDate::from_ymd_opt(2025, 3, 30)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        assert_eq!(kolkata.local_time(now), expected);
        assert_eq!(
            behind.local_time(now),
            NaiveDate::from_ymd_opt(2025, 3, 29)
                .unwrap()
                .and_hms_opt(17, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn human_format() {
        let time = NaiveDate::from_ymd_opt(2025, 3, 29)
            .unwrap()
            .and_hms_opt(15, 5, 0)
            .unwrap();
        assert_eq!(format_time(time), "Saturday, March 29th 2025, 3:05 PM");

        let time = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(format_time(time), "Wednesday, January 1st 2025, 12:00 AM");
    }

    #[test]
    fn ordinals() {
        let suffixes: Vec<_> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 31]
            .into_iter()
            .map(ordinal_suffix)
            .collect();
        assert_eq!(
            suffixes,
            ["st", "nd", "rd", "th", "th", "th", "th", "st", "nd", "rd", "st"]
        );
    }
}
