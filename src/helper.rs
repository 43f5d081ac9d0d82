//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::Result;
use serenity::all::{GuildId, User};
use std::collections::HashMap;

#[serenity::async_trait]
pub trait UserHelper {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String;
}

#[serenity::async_trait]
impl UserHelper for serenity::all::User {
    async fn nick_in_guild(&self, ctx: &Context, guild_id: Option<GuildId>) -> String {
        let nick_in_guild = match guild_id {
            Some(guild_id) => self.nick_in(ctx.cache_http, guild_id).await,
            None => None,
        };

        // May not be in a guild, e.g. DM.  Fall back to global username.
        match nick_in_guild {
            Some(nick_in_guild) => nick_in_guild,
            None => self.name.clone(),
        }
    }
}

#[serenity::async_trait]
pub trait MessageHelper {
    async fn human_format_content(&self, ctx: &Context) -> Result<String>;
    async fn is_from_owner(&self, ctx: &Context) -> bool;
    async fn is_from_mod(&self, ctx: &Context) -> Result<bool>;
    fn first_mention(&self) -> Option<&User>;
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    /// Convert discord-formatted message content, which may contain non-user-friendly markup, to a
    /// human-friendly format.
    ///
    /// Serenity provides a message.content_safe() method which uses global discord names rather
    /// than our preferred per-server names.  Thus, we're reimplementing the logic here with the
    /// preferred name.
    async fn human_format_content(&self, ctx: &Context) -> Result<String> {
        let mut content = self.content.clone();

        // Create a mapping from mention strings to their names
        let mut mention_map: HashMap<String, String> = HashMap::new();

        // Map user mentions (e.g. `<@!1234567890>`)
        for user in &self.mentions {
            let name = user.nick_in_guild(ctx, self.guild_id).await;
            mention_map.insert(format!("<@!{}>", user.id), name.clone());
            mention_map.insert(format!("<@{}>", user.id), name);
        }

        if let Some(guild) = self.guild(ctx.cache) {
            // Map role mentions (e.g. `<@&1234567890>`)
            for role_id in &self.mention_roles {
                let name = match guild.roles.get(role_id) {
                    Some(role) => format!("@{}", role.name),
                    None => "@UnknownRole".to_owned(),
                };
                mention_map.insert(format!("<@&{}>", role_id), name);
            }
        }

        // Replace all mentions with their human-facing names
        for (mention, name) in mention_map {
            content = content.replace(&mention, &name);
        }

        Ok(content)
    }

    async fn is_from_owner(&self, ctx: &Context) -> bool {
        let cfg = ctx.cfg.read().await;
        let owners = &cfg.general.bot_owners;
        let author_global_name = &self.author.name;

        owners.contains(author_global_name)
    }

    /// Whether the author holds the configured moderator role in the guild the message was sent
    /// in.  Always false outside a guild.
    async fn is_from_mod(&self, ctx: &Context) -> Result<bool> {
        let Some(guild_id) = self.guild_id else {
            return Ok(false);
        };
        let mod_role_name = ctx.cfg.read().await.general.mod_role_name.clone();

        let guild_roles = guild_id.roles(ctx.http).await?;
        let member = guild_id.member(ctx.cache_http, self.author.id).await?;

        Ok(member.roles.iter().any(|role_id| {
            guild_roles
                .get(role_id)
                .is_some_and(|role| role.name == mod_role_name)
        }))
    }

    fn first_mention(&self) -> Option<&User> {
        self.mentions.first()
    }
}
