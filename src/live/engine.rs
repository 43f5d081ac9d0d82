use super::{
    ActuatorError, GuildActuator, LinkStore, LiveLink, LiveMember, LiveNotification, LiveStream,
    LiveSyncSettings, PlatformError, PlatformUser, StreamPlatform,
};
use crate::{log_internal, log_warn, logging::PrintColor, scheduler::Job};
use serenity::all::{ChannelId, GuildId, RoleId, UserId};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt,
};
use tokio::sync::{Mutex, RwLock};

/// Keeps the managed live role in line with who is broadcasting.
///
/// The live set is the engine's belief after its last completed pass.  A pass works on a copy
/// and swaps it in wholesale at the end, so readers never wait on a pass.  Overlapping passes
/// are kept apart by `in_flight`, which nothing but `run_pass` touches.
pub struct LiveSync {
    settings: LiveSyncSettings,
    platform: Box<dyn StreamPlatform>,
    actuator: Box<dyn GuildActuator>,
    links: Box<dyn LinkStore>,
    in_flight: Mutex<()>,
    live: RwLock<BTreeSet<UserId>>,
}

#[derive(Debug)]
pub enum PassError {
    /// Guild or managed role could not be found.
    Precondition(String),
    Upstream(PlatformError),
    Store(String),
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassError::Precondition(msg) => write!(f, "precondition failed: {msg}"),
            PassError::Upstream(e) => write!(f, "{e}"),
            PassError::Store(msg) => write!(f, "could not read links: {msg}"),
        }
    }
}

impl std::error::Error for PassError {}

#[derive(Debug)]
pub enum PassOutcome {
    Completed,
    /// Nobody can be live; the role was stripped from everyone and the live set emptied.
    Reset(ResetReason),
    /// The pass stopped early and left the live set untouched.
    Aborted(PassError),
    /// Another pass was still running.
    Skipped,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResetReason {
    NoLinks,
    NoPlatformUsers,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::NoLinks => write!(f, "no Twitch links stored"),
            ResetReason::NoPlatformUsers => write!(f, "no linked login exists on Twitch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedAction {
    ListRoleHolders,
    ResolveMember,
    GrantRole,
    RevokeRole,
    Notify(ChannelId),
}

impl fmt::Display for FailedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedAction::ListRoleHolders => write!(f, "listing role holders"),
            FailedAction::ResolveMember => write!(f, "member lookup"),
            FailedAction::GrantRole => write!(f, "role grant"),
            FailedAction::RevokeRole => write!(f, "role revoke"),
            FailedAction::Notify(channel_id) => write!(f, "notification to channel {}", channel_id),
        }
    }
}

/// One isolated failure inside a pass.
#[derive(Debug)]
pub struct PassFailure {
    pub member_id: Option<UserId>,
    pub action: FailedAction,
    pub error: String,
}

impl fmt::Display for PassFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.member_id {
            Some(member_id) => {
                write!(f, "{} for {} failed: {}", self.action, member_id, self.error)
            }
            None => write!(f, "{} failed: {}", self.action, self.error),
        }
    }
}

/// Everything one pass did, logged as a single summary when the pass ends.
#[derive(Debug)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub went_live: Vec<UserId>,
    pub went_offline: Vec<UserId>,
    pub granted: Vec<UserId>,
    pub revoked: Vec<UserId>,
    pub notifications_sent: usize,
    pub failures: Vec<PassFailure>,
}

impl PassReport {
    fn new(outcome: PassOutcome) -> Self {
        Self {
            outcome,
            went_live: Vec::new(),
            went_offline: Vec::new(),
            granted: Vec::new(),
            revoked: Vec::new(),
            notifications_sent: 0,
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, member_id: Option<UserId>, action: FailedAction, error: ActuatorError) {
        self.failures.push(PassFailure {
            member_id,
            action,
            error: error.0,
        });
    }

    fn log(&self) {
        match &self.outcome {
            PassOutcome::Skipped => {
                log_warn!("Live sync pass skipped, the previous pass is still running")
            }
            PassOutcome::Aborted(e) => log_warn!("Live sync pass aborted: {}", e),
            PassOutcome::Reset(reason) => log_internal!(
                "Live sync pass reset the live set ({}): {} revoked, {} failures",
                reason,
                self.revoked.len(),
                self.failures.len(),
            ),
            PassOutcome::Completed => log_internal!(
                "Live sync pass done: {} went live, {} went offline, {} granted, {} revoked, \
                 {} notifications sent, {} failures",
                self.went_live.len(),
                self.went_offline.len(),
                self.granted.len(),
                self.revoked.len(),
                self.notifications_sent,
                self.failures.len(),
            ),
        }

        for failure in &self.failures {
            crate::log_error!("Live sync: {}", failure);
        }
    }
}

/// A member who should be live this pass.
struct Candidate<'a> {
    login: &'a str,
    stream: Option<&'a LiveStream>,
}

/// Result of the cleanup sweep.
#[derive(Default)]
struct Sweep {
    /// Members the sweep took the role from.
    revoked: BTreeSet<UserId>,
    /// Members still holding the role afterwards.  None if holders could not be listed.
    holders: Option<BTreeSet<UserId>>,
}

/// Keep the first link per member and per login (case-insensitive), in stored order.
fn dedupe_links(links: Vec<LiveLink>) -> Vec<LiveLink> {
    let mut members = HashSet::new();
    let mut logins = HashSet::new();
    let mut kept = Vec::with_capacity(links.len());
    for link in links {
        let login = link.platform_login.to_ascii_lowercase();
        if members.contains(&link.member_id) || logins.contains(&login) {
            log_warn!(
                "Ignoring duplicate Twitch link {} -> {}",
                link.member_id.color(),
                link.platform_login
            );
            continue;
        }
        members.insert(link.member_id);
        logins.insert(login);
        kept.push(link);
    }
    kept
}

impl LiveSync {
    pub fn new(
        settings: LiveSyncSettings,
        platform: Box<dyn StreamPlatform>,
        actuator: Box<dyn GuildActuator>,
        links: Box<dyn LinkStore>,
    ) -> Self {
        Self {
            settings,
            platform,
            actuator,
            links,
            in_flight: Mutex::new(()),
            live: RwLock::new(BTreeSet::new()),
        }
    }

    /// Members believed live after the last completed pass.  Does not wait for a running pass.
    pub async fn live_set(&self) -> BTreeSet<UserId> {
        self.live.read().await.clone()
    }

    /// Run one pass.  Never fails: every error is contained in the report.
    pub async fn run_pass(&self) -> PassReport {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            let report = PassReport::new(PassOutcome::Skipped);
            report.log();
            return report;
        };

        let mut live = self.live.read().await.clone();
        let mut report = PassReport::new(PassOutcome::Completed);
        report.outcome = match self.reconcile(&mut live, &mut report).await {
            Ok(outcome) => {
                *self.live.write().await = live;
                outcome
            }
            // Aborted passes leave the previous live set in place
            Err(e) => PassOutcome::Aborted(e),
        };
        report.log();
        report
    }

    async fn reconcile(
        &self,
        live: &mut BTreeSet<UserId>,
        report: &mut PassReport,
    ) -> Result<PassOutcome, PassError> {
        let guild_id = self.settings.guild_id;

        // Preconditions
        let guild_name = self.actuator.resolve_guild(guild_id).await.ok_or_else(|| {
            PassError::Precondition(format!("guild {} not found", guild_id))
        })?;
        let role_id = self
            .actuator
            .find_role(guild_id, &self.settings.role_name)
            .await
            .ok_or_else(|| {
                PassError::Precondition(format!(
                    "role \"{}\" not found in {}",
                    self.settings.role_name, guild_name
                ))
            })?;
        let channels = self.notification_channels().await;

        // Fetching
        let links = self
            .links
            .live_links()
            .await
            .map_err(|e| PassError::Store(e.to_string()))?;
        if links.is_empty() {
            self.sweep(guild_id, role_id, &BTreeSet::new(), report).await;
            live.clear();
            return Ok(PassOutcome::Reset(ResetReason::NoLinks));
        }
        let links = dedupe_links(links);

        let logins: Vec<String> = links.iter().map(|l| l.platform_login.clone()).collect();
        // An outage is not "nobody exists on Twitch": abort and keep the live set instead of
        // resetting, or every live member would lose the role until Twitch recovers.
        let users = self
            .platform
            .resolve_users(&logins)
            .await
            .map_err(PassError::Upstream)?;
        if users.is_empty() {
            self.sweep(guild_id, role_id, &BTreeSet::new(), report).await;
            live.clear();
            return Ok(PassOutcome::Reset(ResetReason::NoPlatformUsers));
        }
        let users_by_login: HashMap<String, &PlatformUser> = users
            .iter()
            .map(|user| (user.login.to_ascii_lowercase(), user))
            .collect();

        let mut platform_user_ids = Vec::new();
        for link in &links {
            if let Some(user) = users_by_login.get(&link.platform_login.to_ascii_lowercase()) {
                if !platform_user_ids.contains(&user.platform_user_id) {
                    platform_user_ids.push(user.platform_user_id.clone());
                }
            }
        }
        // Only an auth failure gets here; failed batches are already left out.  Same as above,
        // keep the live set rather than treating everyone as offline.
        let streams = self
            .platform
            .query_live_streams(&platform_user_ids)
            .await
            .map_err(PassError::Upstream)?;
        let streams_by_user: HashMap<&str, &LiveStream> = streams
            .iter()
            .map(|stream| (stream.platform_user_id.as_str(), stream))
            .collect();

        // Diffing
        let mut candidates = BTreeMap::new();
        for link in &links {
            let Some(user) = users_by_login.get(&link.platform_login.to_ascii_lowercase()) else {
                log_warn!(
                    "Twitch user `{}` linked to {} does not exist",
                    link.platform_login,
                    link.member_id.color()
                );
                continue;
            };
            if let Some(stream) = streams_by_user.get(user.platform_user_id.as_str()) {
                candidates.insert(
                    link.member_id,
                    Candidate {
                        login: &link.platform_login,
                        stream: Some(*stream),
                    },
                );
            }
        }

        let mut next_live: BTreeSet<UserId> = candidates.keys().copied().collect();
        let went_live: Vec<UserId> = next_live.difference(live).copied().collect();
        let went_offline: Vec<UserId> = live.difference(&next_live).copied().collect();
        let still_live: Vec<UserId> = next_live.intersection(live).copied().collect();
        report.went_live = went_live.clone();
        report.went_offline = went_offline.clone();

        // Converging
        let sweep = self.sweep(guild_id, role_id, &next_live, report).await;

        for member_id in &went_live {
            let candidate = &candidates[member_id];
            if !self
                .go_live(guild_id, role_id, *member_id, candidate, &channels, report)
                .await
            {
                next_live.remove(member_id);
            }
        }

        for member_id in &went_offline {
            self.go_offline(guild_id, role_id, *member_id, &sweep, report)
                .await;
        }

        if let Some(holders) = &sweep.holders {
            for member_id in still_live.iter().filter(|id| !holders.contains(id)) {
                self.restore_role(guild_id, role_id, *member_id, report)
                    .await;
            }
        }

        *live = next_live;
        Ok(PassOutcome::Completed)
    }

    /// Configured notification channels that currently exist.
    async fn notification_channels(&self) -> Vec<ChannelId> {
        let mut channels = Vec::new();
        for channel_id in &self.settings.notification_channels {
            if self.actuator.resolve_channel(*channel_id).await {
                channels.push(*channel_id);
            } else {
                log_warn!("Live notification channel {} not found", channel_id);
            }
        }
        if channels.is_empty() {
            log_warn!("No valid live notification channels, announcements will not be sent");
        }
        channels
    }

    /// Take the role from every holder not in `keep`.
    async fn sweep(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        keep: &BTreeSet<UserId>,
        report: &mut PassReport,
    ) -> Sweep {
        let holders = match self.actuator.role_holders(guild_id, role_id).await {
            Ok(holders) => holders,
            Err(e) => {
                report.fail(None, FailedAction::ListRoleHolders, e);
                return Sweep::default();
            }
        };

        let mut revoked = BTreeSet::new();
        let mut still_holding = BTreeSet::new();
        for holder in holders {
            if keep.contains(&holder.id) {
                still_holding.insert(holder.id);
                continue;
            }
            match self.actuator.revoke_role(guild_id, holder.id, role_id).await {
                Ok(()) => {
                    log_internal!(
                        "Removed \"{}\" from {} (cleanup)",
                        self.settings.role_name,
                        holder.display_name
                    );
                    revoked.insert(holder.id);
                    report.revoked.push(holder.id);
                }
                Err(e) => {
                    still_holding.insert(holder.id);
                    report.fail(Some(holder.id), FailedAction::RevokeRole, e);
                }
            }
        }

        Sweep {
            revoked,
            holders: Some(still_holding),
        }
    }

    /// Returns false if the member must not count as live after this pass.
    async fn go_live(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        member_id: UserId,
        candidate: &Candidate<'_>,
        channels: &[ChannelId],
        report: &mut PassReport,
    ) -> bool {
        let member = match self.actuator.resolve_member(guild_id, member_id).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                log_warn!("Live member {} is not in the guild", member_id.color());
                return false;
            }
            Err(e) => {
                report.fail(Some(member_id), FailedAction::ResolveMember, e);
                return false;
            }
        };

        if !member.has_role(role_id) {
            if let Err(e) = self.actuator.grant_role(guild_id, member_id, role_id).await {
                report.fail(Some(member_id), FailedAction::GrantRole, e);
                return false;
            }
            log_internal!(
                "Added \"{}\" to {}",
                self.settings.role_name,
                member.display_name
            );
            report.granted.push(member_id);
        }

        self.announce(&member, candidate, channels, report).await;
        true
    }

    async fn announce(
        &self,
        member: &LiveMember,
        candidate: &Candidate<'_>,
        channels: &[ChannelId],
        report: &mut PassReport,
    ) {
        if channels.is_empty() {
            return;
        }

        let notification = LiveNotification::compose(member, candidate.login, candidate.stream);
        for channel_id in channels {
            match self
                .actuator
                .send_notification(*channel_id, &notification)
                .await
            {
                Ok(()) => report.notifications_sent += 1,
                Err(e) => report.fail(Some(member.id), FailedAction::Notify(*channel_id), e),
            }
        }
    }

    async fn go_offline(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        member_id: UserId,
        sweep: &Sweep,
        report: &mut PassReport,
    ) {
        let member = match self.actuator.resolve_member(guild_id, member_id).await {
            Ok(Some(member)) => member,
            // Left the guild, nothing to clean up
            Ok(None) => return,
            Err(e) => {
                report.fail(Some(member_id), FailedAction::ResolveMember, e);
                return;
            }
        };

        if member.has_role(role_id) {
            match self.actuator.revoke_role(guild_id, member_id, role_id).await {
                Ok(()) => {
                    log_internal!(
                        "Removed \"{}\" from {}",
                        self.settings.role_name,
                        member.display_name
                    );
                    report.revoked.push(member_id);
                }
                Err(e) => report.fail(Some(member_id), FailedAction::RevokeRole, e),
            }
        } else if !sweep.revoked.contains(&member_id) {
            log_warn!(
                "{} went offline without holding \"{}\", state mismatch?",
                member.display_name,
                self.settings.role_name
            );
        }
    }

    /// Re-grant the role to a member who stayed live but lost it outside of the engine.  No
    /// announcement: they were already announced when they went live.
    async fn restore_role(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        member_id: UserId,
        report: &mut PassReport,
    ) {
        let member = match self.actuator.resolve_member(guild_id, member_id).await {
            Ok(Some(member)) => member,
            Ok(None) => return,
            Err(e) => {
                report.fail(Some(member_id), FailedAction::ResolveMember, e);
                return;
            }
        };
        if member.has_role(role_id) {
            return;
        }
        match self.actuator.grant_role(guild_id, member_id, role_id).await {
            Ok(()) => {
                log_internal!(
                    "Restored \"{}\" to {}",
                    self.settings.role_name,
                    member.display_name
                );
                report.granted.push(member_id);
            }
            Err(e) => report.fail(Some(member_id), FailedAction::GrantRole, e),
        }
    }
}

#[serenity::async_trait]
impl Job for LiveSync {
    fn name(&self) -> &'static str {
        "live sync"
    }

    async fn run(&self) {
        self.run_pass().await;
    }
}
