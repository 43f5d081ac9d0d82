use super::LiveNotification;
use serenity::{
    all::{
        ChannelId, CreateEmbed, CreateEmbedAuthor, CreateMessage, GuildId, Http, Member, RoleId,
        Timestamp, UserId,
    },
    http::HttpError,
};
use std::{fmt, sync::Arc};

/// Discord caps member listing at 1000 per request.
const MEMBER_PAGE_SIZE: u64 = 1000;

const AUDIT_REASON: &str = "Twitch live status sync";

/// What a pass needs to know about a guild member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveMember {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: String,
    pub roles: Vec<RoleId>,
}

impl LiveMember {
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

impl From<&Member> for LiveMember {
    fn from(member: &Member) -> Self {
        Self {
            id: member.user.id,
            display_name: member.display_name().to_owned(),
            avatar_url: member.face(),
            roles: member.roles.clone(),
        }
    }
}

/// A chat-platform call failed.  Never fatal to a pass.
#[derive(Debug)]
pub struct ActuatorError(pub String);

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guild action failed: {}", self.0)
    }
}

impl std::error::Error for ActuatorError {}

impl From<serenity::Error> for ActuatorError {
    fn from(e: serenity::Error) -> Self {
        Self(e.to_string())
    }
}

/// Guild reads and writes a live-sync pass performs.
///
/// Grant and revoke are treated as idempotent: granting a held role or revoking a missing one
/// must not be reported as an error.
#[serenity::async_trait]
pub trait GuildActuator: Send + Sync {
    /// Guild name, or None if the bot cannot see the guild.
    async fn resolve_guild(&self, guild_id: GuildId) -> Option<String>;

    /// Role with exactly this name.
    async fn find_role(&self, guild_id: GuildId, name: &str) -> Option<RoleId>;

    /// Every member currently holding `role_id`.
    async fn role_holders(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> Result<Vec<LiveMember>, ActuatorError>;

    /// Ok(None) means the member is not in the guild, which is expected when members leave.
    async fn resolve_member(
        &self,
        guild_id: GuildId,
        member_id: UserId,
    ) -> Result<Option<LiveMember>, ActuatorError>;

    async fn grant_role(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        role_id: RoleId,
    ) -> Result<(), ActuatorError>;

    async fn revoke_role(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        role_id: RoleId,
    ) -> Result<(), ActuatorError>;

    async fn resolve_channel(&self, channel_id: ChannelId) -> bool;

    async fn send_notification(
        &self,
        channel_id: ChannelId,
        notification: &LiveNotification,
    ) -> Result<(), ActuatorError>;
}

/// [`GuildActuator`] over the Discord REST API.
pub struct SerenityActuator {
    http: Arc<Http>,
}

impl SerenityActuator {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn is_not_found(e: &serenity::Error) -> bool {
    matches!(
        e,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}

impl LiveNotification {
    pub fn to_embed(&self) -> CreateEmbed {
        let author = CreateEmbedAuthor::new(&self.author_name)
            .icon_url(&self.author_icon_url)
            .url(&self.url);

        let mut embed = CreateEmbed::new()
            .colour(self.colour)
            .author(author)
            .url(&self.url)
            .timestamp(Timestamp::now());
        for field in &self.fields {
            embed = embed.field(&field.name, &field.value, field.inline);
        }
        if let Some(image_url) = &self.image_url {
            embed = embed.image(image_url);
        }
        embed
    }
}

#[serenity::async_trait]
impl GuildActuator for SerenityActuator {
    async fn resolve_guild(&self, guild_id: GuildId) -> Option<String> {
        guild_id
            .to_partial_guild(&self.http)
            .await
            .ok()
            .map(|guild| guild.name)
    }

    async fn find_role(&self, guild_id: GuildId, name: &str) -> Option<RoleId> {
        guild_id
            .roles(&self.http)
            .await
            .ok()?
            .into_values()
            .find(|role| role.name == name)
            .map(|role| role.id)
    }

    async fn role_holders(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> Result<Vec<LiveMember>, ActuatorError> {
        let mut holders = Vec::new();
        let mut after: Option<UserId> = None;
        loop {
            let page = guild_id
                .members(&self.http, Some(MEMBER_PAGE_SIZE), after)
                .await?;
            let page_len = page.len() as u64;
            after = page.last().map(|member| member.user.id);

            holders.extend(
                page.iter()
                    .filter(|member| member.roles.contains(&role_id))
                    .map(LiveMember::from),
            );

            if page_len < MEMBER_PAGE_SIZE || after.is_none() {
                return Ok(holders);
            }
        }
    }

    async fn resolve_member(
        &self,
        guild_id: GuildId,
        member_id: UserId,
    ) -> Result<Option<LiveMember>, ActuatorError> {
        match guild_id.member(&self.http, member_id).await {
            Ok(member) => Ok(Some(LiveMember::from(&member))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn grant_role(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        role_id: RoleId,
    ) -> Result<(), ActuatorError> {
        self.http
            .add_member_role(guild_id, member_id, role_id, Some(AUDIT_REASON))
            .await
            .map_err(Into::into)
    }

    async fn revoke_role(
        &self,
        guild_id: GuildId,
        member_id: UserId,
        role_id: RoleId,
    ) -> Result<(), ActuatorError> {
        match self
            .http
            .remove_member_role(guild_id, member_id, role_id, Some(AUDIT_REASON))
            .await
        {
            // Member left between lookup and revoke; nothing left to clean up.
            Err(e) if is_not_found(&e) => Ok(()),
            result => result.map_err(Into::into),
        }
    }

    async fn resolve_channel(&self, channel_id: ChannelId) -> bool {
        channel_id.to_channel(&self.http).await.is_ok()
    }

    async fn send_notification(
        &self,
        channel_id: ChannelId,
        notification: &LiveNotification,
    ) -> Result<(), ActuatorError> {
        channel_id
            .send_message(&self.http, CreateMessage::new().embed(notification.to_embed()))
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}
