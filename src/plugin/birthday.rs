use crate::{
    event::*,
    helper::{MessageHelper, UserHelper},
    persistent_state::is_valid_day_month,
    plugin::*,
};
use anyhow::Result;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTHS.get(i as usize))
        .copied()
        .unwrap_or("???")
}

/// Day and month from `@user DD M`.
fn parse_day_month(args: &[&str]) -> Option<(u32, u32)> {
    let [_, day, month, ..] = args else {
        return None;
    };
    Some((day.parse().ok()?, month.parse().ok()?))
}

pub struct SetBirthday;

#[serenity::async_trait]
impl Plugin for SetBirthday {
    fn name(&self) -> &'static str {
        "setbirthday"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_line(
                ctx,
                self.name(),
                " @user DD M",
                "set a member's birthday (mod only)",
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
                "❌ You don't have permission to use this command. Only **{}** can set birthdays.",
                mod_role
            );
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        }

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let (Some(user), Some((day, month))) = (msg.first_mention(), parse_day_month(&args))
        else {
            let reply = format!(
                "Usage: `{0}setbirthday @MentionUser DD M` (e.g. `{0}setbirthday @Syn 29 3`)",
                prefix
            );
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        };

        if !is_valid_day_month(day, month) {
            msg.channel_id
                .say(ctx.http, "❌ Day must be between 1-31 and Month between 1-12.")
                .await?;
            return Ok(EventHandled::Yes);
        }

        let replaced = {
            let mut pstate = ctx.pstate.write().await;
            let replaced = pstate.birthdays.set(user.id, day, month)?;
            pstate.save().await?;
            replaced
        };

        let name = user.nick_in_guild(ctx, msg.guild_id).await;
        let reply = if replaced {
            format!(
                "🎉 Updated birthday for **{}** to **{} {}**",
                name,
                day,
                month_name(month)
            )
        } else {
            format!("🎉 Set birthday for {} to {} {}", name, day, month_name(month))
        };
        msg.channel_id.say(ctx.http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

pub struct Birthday;

#[serenity::async_trait]
impl Plugin for Birthday {
    fn name(&self) -> &'static str {
        "birthday"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), " @user", "show a member's birthday").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let Some(user) = msg.first_mention() else {
            let reply = format!("Usage: `{}birthday @user`", prefix);
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        };

        let record = ctx
            .pstate
            .read()
            .await
            .birthdays
            .get(user.id)
            .map(|b| (b.day, b.month));

        let name = user.nick_in_guild(ctx, msg.guild_id).await;
        let reply = match record {
            Some((day, month)) => format!(
                "🎂 **{}**'s birthday is on **{} {}**",
                name,
                day,
                month_name(month)
            ),
            None => format!(
                "❌ No birthday found for **{}**. Use `{}setbirthday` to set one.",
                name, prefix
            ),
        };
        msg.channel_id.say(ctx.http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mention_day_month() {
        assert_eq!(parse_day_month(&["<@1>", "29", "3"]), Some((29, 3)));
        assert_eq!(parse_day_month(&["<@1>", "29"]), None);
        assert_eq!(parse_day_month(&["<@1>", "twenty", "3"]), None);
        assert_eq!(parse_day_month(&["<@1>", "-1", "3"]), None);
    }

    #[test]
    fn month_names() {
        assert_eq!(month_name(1), "Jan");
        assert_eq!(month_name(12), "Dec");
        assert_eq!(month_name(0), "???");
        assert_eq!(month_name(13), "???");
    }
}
