//! Event routing: platform events in, moderation calls, replies out.

use bantay_core::models::audit::AuditEntry;
use bantay_core::models::join_request::JoinRequestStatus;
use bantay_core::models::managed_group::{CreateManagedGroup, ManagedGroup};
use bantay_core::models::user_record::{
    BanStatus, PlatformUserId, UserRecord, VerificationState, ViolationKind,
};
use bantay_core::repository::{AuditLogFilter, Pagination};
use bantay_db::repository::{
    SurrealAuditLogRepository, SurrealJoinRequestRepository, SurrealManagedGroupRepository,
    SurrealUserRecordRepository,
};
use bantay_moderation::phone;
use bantay_moderation::{
    ContactOutcome, ContactPayload, GroupRegistry, JoinDecision, LanguageOutcome,
    ModerationError, ModerationService, StaticAdminSet, UserProfile, VerificationPrompt,
    ViolationOutcome,
};
use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::messenger::{Messenger, Outbound};

pub type Service = ModerationService<
    SurrealUserRecordRepository<Any>,
    SurrealAuditLogRepository<Any>,
    SurrealJoinRequestRepository<Any>,
    StaticAdminSet,
>;

pub type Groups = GroupRegistry<SurrealManagedGroupRepository<Any>, StaticAdminSet>;

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// One platform event, delivered as a JSON line.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A private message: a command or a language test answer.
    Message {
        user_id: PlatformUserId,
        username: Option<String>,
        first_name: Option<String>,
        text: String,
    },
    /// A shared contact card.
    Contact {
        user_id: PlatformUserId,
        owner_user_id: Option<PlatformUserId>,
        phone_number: String,
    },
    JoinRequest {
        user_id: PlatformUserId,
        chat_id: i64,
    },
    /// A rule violation detected in a managed group.
    Violation {
        user_id: PlatformUserId,
        kind: ViolationKind,
        #[serde(default)]
        evidence: String,
    },
    /// The bot was added to a group; `link` is the group's invite link.
    BotAdded { chat_id: i64, link: String },
}

impl InboundEvent {
    fn user_id(&self) -> Option<PlatformUserId> {
        match self {
            InboundEvent::Message { user_id, .. }
            | InboundEvent::Contact { user_id, .. }
            | InboundEvent::JoinRequest { user_id, .. }
            | InboundEvent::Violation { user_id, .. } => Some(*user_id),
            InboundEvent::BotAdded { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Verify,
    Status,
    Appeal,
    Groups,
    Help,
    Stats,
    Whitelist(PlatformUserId),
    Ban {
        user_id: PlatformUserId,
        reason: String,
    },
    Unban(PlatformUserId),
    ResetStrikes(PlatformUserId),
    ResetVerify(PlatformUserId),
    Strike {
        user_id: PlatformUserId,
        kind: ViolationKind,
        evidence: String,
    },
    AppealApprove(PlatformUserId),
    AppealDeny(PlatformUserId),
    Audit(PlatformUserId),
    GroupsAdd(CreateManagedGroup),
    GroupsRemove(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: /{0}. Try /help.")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

const DEFAULT_BAN_REASON: &str = "banned by an admin";

/// Split on whitespace, keeping `"quoted phrases"` together.
fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in input.chars() {
        match c {
            '"' => {
                if quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = !quoted;
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

fn user_arg(args: &[String], usage: &'static str) -> Result<PlatformUserId, CommandError> {
    args.first()
        .and_then(|a| a.parse().ok())
        .ok_or(CommandError::Usage(usage))
}

impl Command {
    /// Parse `/name args...`. Returns `None` for text that is not a command.
    pub fn parse(text: &str) -> Option<Result<Command, CommandError>> {
        let rest = text.trim().strip_prefix('/')?;
        let (head, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        // `/start@bantay_bot` in group chats.
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let args = split_args(tail);

        Some(Self::from_parts(&name, &args))
    }

    fn from_parts(name: &str, args: &[String]) -> Result<Command, CommandError> {
        let cmd = match name {
            "start" => Command::Start,
            "verify" => Command::Verify,
            "status" => Command::Status,
            "appeal" => Command::Appeal,
            "groups" => Command::Groups,
            "help" => Command::Help,
            "stats" => Command::Stats,
            "whitelist" => Command::Whitelist(user_arg(args, "/whitelist <user_id>")?),
            "ban" => {
                let user_id = user_arg(args, "/ban <user_id> [reason]")?;
                let reason = args[1..].join(" ");
                Command::Ban {
                    user_id,
                    reason: if reason.is_empty() {
                        DEFAULT_BAN_REASON.to_string()
                    } else {
                        reason
                    },
                }
            }
            "unban" => Command::Unban(user_arg(args, "/unban <user_id>")?),
            "resetstrikes" => Command::ResetStrikes(user_arg(args, "/resetstrikes <user_id>")?),
            "resetverify" => Command::ResetVerify(user_arg(args, "/resetverify <user_id>")?),
            "strike" => {
                const USAGE: &str = "/strike <user_id> <kind> [evidence]";
                let user_id = user_arg(args, USAGE)?;
                let kind = args
                    .get(1)
                    .and_then(|k| k.parse().ok())
                    .ok_or(CommandError::Usage(USAGE))?;
                Command::Strike {
                    user_id,
                    kind,
                    evidence: args[2..].join(" "),
                }
            }
            "appeal_approve" => Command::AppealApprove(user_arg(args, "/appeal_approve <user_id>")?),
            "appeal_deny" => Command::AppealDeny(user_arg(args, "/appeal_deny <user_id>")?),
            "audit" => Command::Audit(user_arg(args, "/audit <user_id>")?),
            "groups_add" => {
                const USAGE: &str = r#"/groups_add "Name" "Description" https://t.me/link"#;
                match args {
                    [name, description, link] => Command::GroupsAdd(CreateManagedGroup {
                        name: name.clone(),
                        description: description.clone(),
                        link: link.clone(),
                    }),
                    _ => return Err(CommandError::Usage(USAGE)),
                }
            }
            "groups_remove" => {
                const USAGE: &str = "/groups_remove <group_id>";
                let id = args
                    .first()
                    .and_then(|a| Uuid::parse_str(a).ok())
                    .ok_or(CommandError::Usage(USAGE))?;
                Command::GroupsRemove(id)
            }
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

// ---------------------------------------------------------------------------
// Reply text
// ---------------------------------------------------------------------------

const HELP: &str = "Bot commands:\n\
/start - start verification\n\
/verify - continue verification\n\
/status - show your verification and strike status\n\
/appeal - appeal a ban\n\
/groups - list the groups (verified users)\n\
/help - show this message";

const ADMIN_HELP: &str = "\n\nAdmin commands:\n\
/stats - bot statistics\n\
/whitelist <user_id>\n\
/ban <user_id> [reason]\n\
/unban <user_id>\n\
/strike <user_id> <kind> [evidence]\n\
/resetstrikes <user_id>\n\
/resetverify <user_id>\n\
/appeal_approve <user_id>\n\
/appeal_deny <user_id>\n\
/audit <user_id>\n\
/groups_add \"Name\" \"Description\" https://t.me/link\n\
/groups_remove <group_id>";

const TEXT_HINT: &str = "Send /start to begin verification or /help for commands.";

const REQUEST_CONTACT: &str = "Filipino verification: please share your own contact \
    card so we can check your Philippine phone number.";

fn format_groups(groups: &[ManagedGroup]) -> String {
    if groups.is_empty() {
        return "No groups are available at the moment.".into();
    }
    let mut text = String::from("Available Filipino groups:\n");
    for g in groups {
        text.push_str(&format!("\n- {}\n  {}\n  {}\n", g.name, g.description, g.link));
    }
    text.push_str("\nVerified users are approved automatically.");
    text
}

fn format_admin_groups(groups: &[ManagedGroup]) -> String {
    if groups.is_empty() {
        return "No groups found.".into();
    }
    groups
        .iter()
        .map(|g| {
            let chat = g
                .chat_id
                .map_or_else(|| "not set".to_string(), |id| id.to_string());
            format!("{} | {} | {} | chat {}", g.id, g.name, g.link, chat)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_audit(user_id: PlatformUserId, entries: &[AuditEntry], total: u64) -> String {
    if entries.is_empty() {
        return format!("No audit entries for {user_id}.");
    }
    let mut text = format!("Audit log for {user_id} ({total} entries):");
    for e in entries {
        text.push_str(&format!(
            "\n{} {} {} [{:?}] {}",
            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
            e.event_kind,
            e.actor,
            e.outcome,
            e.detail
        ));
    }
    text
}

/// The user-facing text for a recoverable moderation error.
fn error_reply(err: &ModerationError) -> String {
    match err {
        ModerationError::AlreadyVerified => "You are already verified. Use /groups to see the groups.".into(),
        ModerationError::InvalidPhoneFormat(raw) => format!(
            "Verification failed: {raw} is not recognized as a Philippine number. \
             Please try again with a valid PH number."
        ),
        ModerationError::ContactSpoofingDetected => {
            "Please share your own contact information.".into()
        }
        ModerationError::MaxAttemptsExceeded { attempts } => format!(
            "The language check failed {attempts} times and your verification was \
             rejected. Use /start to try again."
        ),
        ModerationError::UserBanned => "You are banned. Use /appeal to request a review.".into(),
        ModerationError::InvalidState { .. } => {
            "That is not available right now. Use /start to begin verification.".into()
        }
        ModerationError::PhoneAlreadyBound => {
            "A different phone number is already linked to your account. \
             Please contact an admin."
                .into()
        }
        ModerationError::RecordNotFound(_) => {
            "We have no record of you yet. Use /start to begin verification.".into()
        }
        ModerationError::Unauthorized { .. } => {
            "You don't have permission to use this command.".into()
        }
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router<M> {
    service: Service,
    groups: Groups,
    messenger: M,
    admins: Vec<PlatformUserId>,
}

impl<M: Messenger> Router<M> {
    /// Build the moderation stack over an already migrated database.
    pub fn new(db: Surreal<Any>, config: &ServerConfig, messenger: M) -> Self {
        let authorizer = StaticAdminSet::new(config.admin_ids.iter().copied());
        let service = ModerationService::new(
            SurrealUserRecordRepository::new(db.clone()),
            SurrealAuditLogRepository::new(db.clone()),
            SurrealJoinRequestRepository::new(db.clone()),
            authorizer.clone(),
            config.moderation.clone(),
        );
        let groups = GroupRegistry::new(SurrealManagedGroupRepository::new(db), authorizer);

        Self {
            service,
            groups,
            messenger,
            admins: config.admin_ids.clone(),
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    /// Parse and handle one JSON line.
    pub async fn handle_line(&self, line: &str) -> Result<(), ServerError> {
        let event: InboundEvent = serde_json::from_str(line)?;
        self.handle(event).await
    }

    /// Handle one event. Recoverable moderation errors become replies;
    /// store and delivery failures are returned.
    pub async fn handle(&self, event: InboundEvent) -> Result<(), ServerError> {
        let user_id = event.user_id();
        let result = match event {
            InboundEvent::Message {
                user_id,
                username,
                first_name,
                text,
            } => {
                let profile = UserProfile {
                    username,
                    first_name,
                };
                self.on_message(user_id, &profile, &text).await
            }
            InboundEvent::Contact {
                user_id,
                owner_user_id,
                phone_number,
            } => {
                let payload = ContactPayload {
                    owner_user_id,
                    phone_number,
                };
                self.on_contact(user_id, &payload).await
            }
            InboundEvent::JoinRequest { user_id, chat_id } => {
                self.on_join_request(user_id, chat_id).await
            }
            InboundEvent::Violation {
                user_id,
                kind,
                evidence,
            } => self.on_violation(user_id, kind, &evidence).await,
            InboundEvent::BotAdded { chat_id, link } => self.on_bot_added(chat_id, &link).await,
        };

        match (result, user_id) {
            (Err(ServerError::Moderation(err)), Some(user_id)) if !err.is_operational() => {
                debug!(user_id, error = %err, "Replying with moderation error");
                self.messenger.send(user_id, error_reply(&err)).await
            }
            (result, _) => result,
        }
    }

    async fn notify_admins(&self, text: &str) {
        for &admin in &self.admins {
            if let Err(e) = self.messenger.send(admin, text).await {
                warn!(admin, error = %e, "Failed to notify admin");
            }
        }
    }

    async fn on_message(
        &self,
        user_id: PlatformUserId,
        profile: &UserProfile,
        text: &str,
    ) -> Result<(), ServerError> {
        match Command::parse(text) {
            Some(Ok(command)) => self.on_command(user_id, profile, command).await,
            Some(Err(e)) => self.messenger.send(user_id, e.to_string()).await,
            None => self.on_text(user_id, text).await,
        }
    }

    async fn on_command(
        &self,
        user_id: PlatformUserId,
        profile: &UserProfile,
        command: Command,
    ) -> Result<(), ServerError> {
        info!(user_id, ?command, "Command received");
        let caller = user_id;

        match command {
            Command::Start | Command::Verify => {
                match self.service.begin_verification(user_id, profile).await {
                    Ok(VerificationPrompt::RequestContact) => {
                        self.messenger.send(user_id, REQUEST_CONTACT).await
                    }
                    Ok(VerificationPrompt::LanguageTest { question }) => {
                        self.messenger
                            .send(user_id, format!("Language check:\n{question}"))
                            .await
                    }
                    Err(ModerationError::AlreadyVerified) => {
                        let groups = self.groups.list_groups().await?;
                        self.messenger
                            .send(
                                user_id,
                                format!("You are already verified!\n\n{}", format_groups(&groups)),
                            )
                            .await
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Command::Status => {
                let record = self.service.status(user_id).await?;
                self.messenger.send(user_id, self.format_status(&record)).await
            }
            Command::Appeal => {
                self.service.file_appeal(user_id).await?;
                self.notify_admins(&format!(
                    "User {user_id} appealed their ban. Use /appeal_approve {user_id} or /appeal_deny {user_id}."
                ))
                .await;
                self.messenger
                    .send(user_id, "Your appeal was filed. An admin will review it.")
                    .await
            }
            Command::Groups => {
                let admitted = self
                    .service
                    .status(user_id)
                    .await
                    .is_ok_and(|r| r.verification_state.is_admitted() && !r.is_banned());
                if self.service.is_admin(caller) {
                    let groups = self.groups.list_groups().await?;
                    self.messenger.send(user_id, format_admin_groups(&groups)).await
                } else if admitted {
                    let groups = self.groups.list_groups().await?;
                    self.messenger.send(user_id, format_groups(&groups)).await
                } else {
                    self.messenger
                        .send(
                            user_id,
                            "You must be verified to see the groups. Use /start to begin verification.",
                        )
                        .await
                }
            }
            Command::Help => {
                let mut text = HELP.to_string();
                if self.service.is_admin(caller) {
                    text.push_str(ADMIN_HELP);
                }
                self.messenger.send(user_id, text).await
            }
            Command::Stats => {
                let stats = self.service.get_stats(caller).await?;
                let group_count = self.groups.list_groups().await?.len();
                let mut text = String::from("Bot statistics\n\nUsers by state:");
                for (state, count) in &stats.counts.by_state {
                    text.push_str(&format!("\n- {state}: {count}"));
                }
                text.push_str(&format!(
                    "\n\nTotal users: {}\nActive bans: {}\nPending appeals: {}\nGroups: {}\nPending join requests: {}",
                    stats.counts.total,
                    stats.total_bans(),
                    stats.counts.appeals_pending,
                    group_count,
                    stats.pending_join_requests,
                ));
                self.messenger.send(caller, text).await
            }
            Command::Whitelist(target) => {
                self.service.whitelist(caller, target).await?;
                self.messenger
                    .send(caller, format!("User {target} is now whitelisted."))
                    .await
            }
            Command::Ban { user_id: target, reason } => {
                self.service.manual_ban(caller, target, &reason).await?;
                self.remove_from_groups(target).await?;
                self.messenger
                    .send(caller, format!("User {target} is now banned: {reason}"))
                    .await
            }
            Command::Unban(target) => {
                self.service.unban(caller, target).await?;
                self.messenger
                    .send(caller, format!("User {target} is no longer banned."))
                    .await
            }
            Command::ResetStrikes(target) => {
                let cleared = self.service.reset_strikes(caller, target).await?;
                self.messenger
                    .send(caller, format!("Cleared {cleared} strikes for user {target}."))
                    .await
            }
            Command::ResetVerify(target) => {
                self.service.reset_verification(caller, target).await?;
                self.messenger
                    .send(caller, format!("Verification reset for user {target}."))
                    .await
            }
            Command::Strike {
                user_id: target,
                kind,
                evidence,
            } => {
                let outcome = self
                    .service
                    .issue_strike(caller, target, kind, &evidence)
                    .await?;
                self.after_violation(target, &outcome).await?;
                self.messenger
                    .send(caller, format!("Strike for {target}: {outcome:?}"))
                    .await
            }
            Command::AppealApprove(target) | Command::AppealDeny(target) => {
                let approve = matches!(command, Command::AppealApprove(_));
                self.service.resolve_appeal(caller, target, approve).await?;
                let verdict = if approve { "approved" } else { "denied" };
                self.messenger
                    .send(target, format!("Your appeal was {verdict}."))
                    .await?;
                self.messenger
                    .send(caller, format!("Appeal of user {target} {verdict}."))
                    .await
            }
            Command::Audit(target) => {
                let page = self
                    .service
                    .audit_log(
                        caller,
                        AuditLogFilter {
                            user_id: Some(target),
                            ..Default::default()
                        },
                        Pagination::default(),
                    )
                    .await?;
                self.messenger
                    .send(caller, format_audit(target, &page.items, page.total))
                    .await
            }
            Command::GroupsAdd(input) => {
                let group = self.groups.add_group(caller, input).await?;
                self.messenger
                    .send(
                        caller,
                        format!("Group {} added (id {}).", group.name, group.id),
                    )
                    .await
            }
            Command::GroupsRemove(id) => {
                let group = self.groups.remove_group(caller, id).await?;
                self.messenger
                    .send(caller, format!("Group {} removed.", group.name))
                    .await
            }
        }
    }

    fn format_status(&self, record: &UserRecord) -> String {
        let config = self.service.config();
        let active = record.active_strikes(chrono::Utc::now(), config.strike_ttl());
        let phone = record
            .phone_number
            .as_deref()
            .map_or_else(|| "not shared".to_string(), phone::display);
        let ban = match &record.ban_status {
            BanStatus::NotBanned => "not banned".to_string(),
            BanStatus::Banned(b) => format!("banned ({})", b.reason),
            BanStatus::AppealPending { ban, .. } => format!("banned ({}), appeal pending", ban.reason),
        };
        format!(
            "Status: {}\nPhone: {}\nStrikes: {}/{}\nBan: {}",
            record.verification_state, phone, active, config.strike_threshold, ban
        )
    }

    /// Plain text is a language-test answer only while one is pending.
    async fn on_text(&self, user_id: PlatformUserId, text: &str) -> Result<(), ServerError> {
        let awaiting_answer = match self.service.status(user_id).await {
            Ok(record) => matches!(
                record.verification_state,
                VerificationState::PhoneVerified | VerificationState::LanguagePassed
            ),
            Err(ModerationError::RecordNotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };
        if awaiting_answer {
            return self.on_answer(user_id, text).await;
        }
        debug!(user_id, "Plain text outside the language test");
        self.messenger.send(user_id, TEXT_HINT).await
    }

    async fn on_answer(&self, user_id: PlatformUserId, text: &str) -> Result<(), ServerError> {
        match self.service.submit_language_test(user_id, text).await? {
            LanguageOutcome::Verified { pending_chats } => {
                let groups = self.groups.list_groups().await?;
                self.messenger
                    .send(
                        user_id,
                        format!("VERIFIED! Maligayang pagdating!\n\n{}", format_groups(&groups)),
                    )
                    .await?;
                self.notify_admins(&format!("New verified user: {user_id}")).await;
                for chat_id in pending_chats {
                    self.approve_join(user_id, chat_id).await?;
                }
                Ok(())
            }
            LanguageOutcome::Retry {
                attempts_left,
                question,
            } => {
                self.messenger
                    .send(
                        user_id,
                        format!(
                            "That answer did not pass. {attempts_left} attempt(s) left.\n{question}"
                        ),
                    )
                    .await
            }
        }
    }

    async fn on_contact(
        &self,
        user_id: PlatformUserId,
        payload: &ContactPayload,
    ) -> Result<(), ServerError> {
        match self.service.submit_contact(user_id, payload).await {
            Ok(ContactOutcome::PhoneVerified { phone_number, next }) => {
                let mut text = format!(
                    "Your number {} is verified.",
                    phone::display(&phone_number)
                );
                if let VerificationPrompt::LanguageTest { question } = next {
                    text.push_str(&format!(" One last step, the language check:\n{question}"));
                }
                self.messenger.send(user_id, text).await
            }
            Ok(ContactOutcome::Unchanged { state }) => {
                self.messenger
                    .send(user_id, format!("Nothing to do; your status is {state}."))
                    .await
            }
            Err(ModerationError::ContactSpoofingDetected) => {
                self.notify_admins(&format!(
                    "Contact spoofing attempt by user {user_id} (card owner {:?})",
                    payload.owner_user_id
                ))
                .await;
                Err(ModerationError::ContactSpoofingDetected.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn approve_join(&self, user_id: PlatformUserId, chat_id: i64) -> Result<(), ServerError> {
        let status = match self
            .messenger
            .deliver(Outbound::ApproveJoin { user_id, chat_id })
            .await
        {
            Ok(()) => JoinRequestStatus::Approved,
            Err(e) => {
                error!(user_id, chat_id, error = %e, "Join approval failed");
                JoinRequestStatus::Error
            }
        };
        self.service
            .mark_join_request(user_id, chat_id, status)
            .await?;
        Ok(())
    }

    async fn on_join_request(&self, user_id: PlatformUserId, chat_id: i64) -> Result<(), ServerError> {
        match self.service.handle_join_request(user_id, chat_id).await? {
            JoinDecision::Approve => self.approve_join(user_id, chat_id).await,
            JoinDecision::Decline => {
                self.messenger
                    .deliver(Outbound::DeclineJoin { user_id, chat_id })
                    .await
            }
            JoinDecision::AwaitVerification => {
                self.messenger
                    .send(
                        user_id,
                        "Thanks for your interest! Please complete verification with /start; \
                         your request will be approved once you are verified.",
                    )
                    .await
            }
        }
    }

    async fn on_violation(
        &self,
        user_id: PlatformUserId,
        kind: ViolationKind,
        evidence: &str,
    ) -> Result<(), ServerError> {
        match self.service.report_violation(user_id, kind, evidence).await {
            Ok(outcome) => self.after_violation(user_id, &outcome).await,
            Err(e @ (ModerationError::Exempt | ModerationError::InvalidState { .. })) => {
                info!(user_id, reason = %e, "Violation not recorded");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn after_violation(
        &self,
        user_id: PlatformUserId,
        outcome: &ViolationOutcome,
    ) -> Result<(), ServerError> {
        match outcome {
            ViolationOutcome::StrikeRecorded { active, threshold } => {
                self.messenger
                    .send(
                        user_id,
                        format!("Warning: strike {active} of {threshold}. Please follow the group rules."),
                    )
                    .await
            }
            ViolationOutcome::Banned { reason, .. } => {
                self.remove_from_groups(user_id).await?;
                self.notify_admins(&format!("User {user_id} was banned automatically: {reason}"))
                    .await;
                self.messenger
                    .send(
                        user_id,
                        format!("You have been banned: {reason}. Use /appeal to request a review."),
                    )
                    .await
            }
            ViolationOutcome::AlreadyBanned => Ok(()),
        }
    }

    async fn remove_from_groups(&self, user_id: PlatformUserId) -> Result<(), ServerError> {
        for chat_id in self.groups.chat_ids().await? {
            if let Err(e) = self
                .messenger
                .deliver(Outbound::RemoveFromChat { user_id, chat_id })
                .await
            {
                error!(user_id, chat_id, error = %e, "Failed to remove banned user from chat");
            }
        }
        Ok(())
    }

    async fn on_bot_added(&self, chat_id: i64, link: &str) -> Result<(), ServerError> {
        match self.groups.bind_chat_id(link, chat_id).await {
            Ok(group) => {
                self.notify_admins(&format!(
                    "Bot added to group {} (chat {chat_id}); matched stored group.",
                    group.name
                ))
                .await;
                Ok(())
            }
            Err(ModerationError::RecordNotFound(_)) => {
                warn!(chat_id, link, "Bot added to an unregistered group");
                self.notify_admins(&format!(
                    "Bot added to chat {chat_id} ({link}); no matching stored group."
                ))
                .await;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
