use crate::{
    event::*,
    helper::{MessageHelper, UserHelper},
    log_warn,
    persistent_state::{is_valid_login, LinkChange},
    plugin::*,
};
use anyhow::Result;

const MEMBER_HEADER: &str = "Discord User (ID)";
const LOGIN_HEADER: &str = "Twitch Username";

/// Fixed-width `member | login` table inside a code block.
fn link_table(rows: &[(String, String)]) -> String {
    let width = rows
        .iter()
        .map(|(member, _)| member.chars().count())
        .chain(std::iter::once(MEMBER_HEADER.len()))
        .max()
        .unwrap_or(MEMBER_HEADER.len());

    let mut table = String::from("**Linked Streamers:**\n```");
    table.push_str(&format!("{:<width$} | {}\n", MEMBER_HEADER, LOGIN_HEADER));
    table.push_str(&format!("{}---{}\n", "-".repeat(width), "-".repeat(LOGIN_HEADER.len())));
    for (member, login) in rows {
        table.push_str(&format!("{:<width$} | {}\n", member, login));
    }
    table.push_str("```");
    table
}

async fn deny_non_mod(ctx: &Context<'_>, msg: &serenity::all::Message) -> Result<bool> {
    if msg.is_from_mod(ctx).await? {
        return Ok(false);
    }
    let mod_role = ctx.cfg.read().await.general.mod_role_name.clone();
    let reply = format!(
        "❌ You don't have permission to use this command. Only **{}** can set Twitch links.",
        mod_role
    );
    msg.channel_id.say(ctx.http, reply).await?;
    Ok(true)
}

pub struct SetTwitch;

#[serenity::async_trait]
impl Plugin for SetTwitch {
    fn name(&self) -> &'static str {
        "settwitch"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_line(
                ctx,
                self.name(),
                " @user <login>",
                "link a member to a Twitch channel (mod only)",
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        if deny_non_mod(ctx, msg).await? {
            return Ok(EventHandled::Yes);
        }

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let (Some(user), Some(login)) = (msg.first_mention(), args.get(1)) else {
            let reply = format!("❌ Usage: `{}settwitch @MentionUser twitch_username`", prefix);
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        };

        if !is_valid_login(login) {
            msg.channel_id
                .say(
                    ctx.http,
                    "❌ Invalid Twitch username format. Twitch usernames can only contain letters, numbers, and underscores.",
                )
                .await?;
            return Ok(EventHandled::Yes);
        }

        let change = {
            let mut pstate = ctx.pstate.write().await;
            let change = pstate.stream_links.set(user.id, login);
            if matches!(change, Ok(LinkChange::Created | LinkChange::Updated)) {
                pstate.save().await?;
            }
            change
        };

        let name = user.nick_in_guild(ctx, msg.guild_id).await;
        let reply = match change {
            Ok(LinkChange::Created) => {
                format!("✅ Set Twitch link for **{}** to **{}**.", name, login)
            }
            Ok(LinkChange::Updated) => {
                format!("✅ Updated Twitch link for **{}** to **{}**.", name, login)
            }
            Ok(LinkChange::Unchanged) => format!(
                "✅ Twitch link for **{}** is already set to **{}**.",
                name, login
            ),
            Err(e) => format!("❌ Failed to set Twitch link: {}", e),
        };
        msg.channel_id.say(ctx.http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

pub struct UnsetTwitch;

#[serenity::async_trait]
impl Plugin for UnsetTwitch {
    fn name(&self) -> &'static str {
        "unsettwitch"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            usage_line(
                ctx,
                self.name(),
                " @user",
                "remove a member's Twitch link (mod only)",
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        if deny_non_mod(ctx, msg).await? {
            return Ok(EventHandled::Yes);
        }

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        let Some(user) = msg.first_mention() else {
            let reply = format!("❌ Usage: `{}unsettwitch @MentionUser`", prefix);
            msg.channel_id.say(ctx.http, reply).await?;
            return Ok(EventHandled::Yes);
        };

        let removed = {
            let mut pstate = ctx.pstate.write().await;
            let removed = pstate.stream_links.remove(user.id);
            if removed.is_some() {
                pstate.save().await?;
            }
            removed
        };

        let name = user.nick_in_guild(ctx, msg.guild_id).await;
        let reply = match removed {
            Some(link) => format!(
                "✅ Removed Twitch link for **{}** (was **{}**).",
                name, link.login
            ),
            None => format!("❌ No Twitch link found for **{}**.", name),
        };
        msg.channel_id.say(ctx.http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

pub struct StreamLinks;

#[serenity::async_trait]
impl Plugin for StreamLinks {
    fn name(&self) -> &'static str {
        "streamlinks"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(usage_line(ctx, self.name(), "", "list members linked to Twitch channels").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let Some(guild_id) = msg.guild_id else {
            msg.channel_id.say(ctx.http, "Guild Not Found!").await?;
            return Ok(EventHandled::Yes);
        };

        let links = ctx.pstate.read().await.stream_links.all().to_vec();
        if links.is_empty() {
            msg.channel_id
                .say(ctx.http, "```No Twitch links found.```")
                .await?;
            return Ok(EventHandled::Yes);
        }

        let mut rows = Vec::with_capacity(links.len());
        for link in links {
            let member = match guild_id.member(ctx.cache_http, link.user_id).await {
                Ok(member) => format!("{} ({})", member.display_name(), link.user_id),
                Err(e) => {
                    log_warn!("Could not fetch linked member {}: {}", link.user_id, e);
                    format!("Unknown User ({})", link.user_id)
                }
            };
            rows.push((member, link.login));
        }

        msg.channel_id.say(ctx.http, link_table(&rows)).await?;
        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_to_widest_member() {
        let wide = "Unknown User (123456789012345678)";
        let rows = vec![
            ("Alice (1)".to_owned(), "alice".to_owned()),
            (wide.to_owned(), "ghost_1".to_owned()),
        ];
        let table = link_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "**Linked Streamers:**");
        assert_eq!(lines[1], format!("```Discord User (ID){} | Twitch Username", " ".repeat(16)));
        assert_eq!(lines[2], format!("{}---{}", "-".repeat(33), "-".repeat(15)));
        assert_eq!(lines[3], format!("Alice (1){} | alice", " ".repeat(24)));
        assert_eq!(lines[4], format!("{} | ghost_1", wide));
        assert_eq!(lines[5], "```");
    }

    #[test]
    fn header_sets_minimum_width() {
        let rows = vec![("A (1)".to_owned(), "a".to_owned())];
        let table = link_table(&rows);
        assert!(table.contains(&format!("\nA (1){} | a\n", " ".repeat(12))));
    }
}
