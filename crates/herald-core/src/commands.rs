//! Inbound event routing.
//!
//! Every `IncomingEvent` maps to exactly one handler: text commands through the
//! closed `Command` registry, everything else by content type.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    broadcast::{BroadcastDispatcher, Payload},
    config::Config,
    errors::Error,
    graph::FollowGraphService,
    messaging::{
        port::Notifier,
        types::{IncomingEvent, InlineResult, KeyboardOption, Sender},
    },
    responses,
    security::{is_admin, RateLimiter},
    store::UserStore,
    utils::{AuditEvent, AuditLogger},
    Result,
};

/// Recognized command keywords.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Update,
    Add,
    Remove,
    Send,
    SendAll,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::Update,
        Command::Add,
        Command::Remove,
        Command::Send,
        Command::SendAll,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Update => "update",
            Command::Add => "add",
            Command::Remove => "remove",
            Command::Send => "send",
            Command::SendAll => "send_all",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Split `/cmd@botname rest...` into a lowercase command name and the trimmed rest.
pub fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Whitespace-separated usernames with one leading `@` stripped. Empty tokens are dropped.
pub fn parse_usernames(args: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in args.split_whitespace() {
        let name = token.strip_prefix('@').unwrap_or(token);
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

pub struct CommandRouter {
    graph: FollowGraphService,
    dispatcher: BroadcastDispatcher,
    notifier: Arc<dyn Notifier>,
    admin: Option<String>,
    inline_query_min_len: usize,
    button_label_max_length: usize,
    rate_limiter: Mutex<RateLimiter>,
    audit: Option<AuditLogger>,
}

impl CommandRouter {
    pub fn new(cfg: &Config, store: Arc<dyn UserStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            graph: FollowGraphService::new(store),
            dispatcher: BroadcastDispatcher::new(notifier.clone(), cfg.broadcast_concurrency),
            notifier,
            admin: cfg.admin_username.clone(),
            inline_query_min_len: cfg.inline_query_min_len,
            button_label_max_length: cfg.button_label_max_length,
            rate_limiter: Mutex::new(RateLimiter::new(
                cfg.rate_limit_enabled,
                cfg.rate_limit_requests,
                cfg.rate_limit_window,
            )),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn graph(&self) -> &FollowGraphService {
        &self.graph
    }

    /// Handle one inbound event.
    ///
    /// Validation problems are answered to the sender and count as handled.
    /// Store and transport failures are returned to the caller.
    pub async fn handle(&self, event: IncomingEvent) -> Result<()> {
        let sender = event.sender().username.clone();
        let kind = event.kind();

        let result = match event {
            IncomingEvent::Command { sender, name, args } => {
                self.on_command(&sender, &name, &args).await
            }
            IncomingEvent::Contact { sender, user_id } => {
                self.on_contact(&sender, user_id.as_deref()).await
            }
            IncomingEvent::Photo { sender, file_id } => {
                let payload = Payload::Photo {
                    file_id,
                    caption: Some(responses::PHOTO_CAPTION.to_string()),
                };
                self.broadcast_to_followers(&sender.username, payload, None)
                    .await
            }
            IncomingEvent::Document { sender, file_id } => {
                self.broadcast_to_followers(&sender.username, Payload::Document { file_id }, None)
                    .await
            }
            IncomingEvent::Sticker { sender, file_id } => {
                let payload = Payload::Sticker {
                    announcement: responses::BEFORE_STICKER.to_string(),
                    file_id,
                };
                self.broadcast_to_followers(&sender.username, payload, None)
                    .await
            }
            IncomingEvent::InlineQuery {
                sender,
                query_id,
                query,
            } => self.on_inline_query(&sender, &query_id, &query).await,
            IncomingEvent::InlineChosen { sender, result_id } => {
                self.follow_many(&sender, &[result_id]).await.map(|_| ())
            }
            IncomingEvent::Selection {
                sender,
                callback_id,
                token,
            } => self.on_selection(&sender, &callback_id, &token).await,
        };

        match result {
            Err(Error::Validation(msg)) => {
                self.reply(&sender, &msg).await;
                Ok(())
            }
            Err(e) => {
                self.audit(AuditEvent::error(&sender, &e.to_string(), Some(kind)));
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    async fn on_command(&self, sender: &Sender, name: &str, args: &str) -> Result<()> {
        let Some(cmd) = Command::parse(name) else {
            debug!(username = %sender.username, command = name, "ignoring unknown command");
            return Ok(());
        };

        match cmd {
            Command::Start => {
                self.graph
                    .register_or_refresh(&sender.username, &sender.profile)
                    .await?;
                self.reply(&sender.username, responses::HELP).await;
                Ok(())
            }

            Command::Update => {
                self.graph
                    .register_or_refresh(&sender.username, &sender.profile)
                    .await?;
                self.graph.recount(&sender.username).await?;
                self.reply(&sender.username, responses::PROFILE_UPDATED)
                    .await;
                Ok(())
            }

            Command::Add => {
                let names = parse_usernames(args);
                if names.is_empty() {
                    return Err(Error::Validation(responses::EMPTY_ADD.to_string()));
                }
                let added = self.follow_many(sender, &names).await?;
                let text = if added.is_empty() {
                    responses::NOTHING_NEW.to_string()
                } else {
                    responses::now_following(&added)
                };
                self.reply(&sender.username, &text).await;
                Ok(())
            }

            Command::Remove => {
                if args.trim().is_empty() {
                    return self.offer_removal(&sender.username).await;
                }
                let names = parse_usernames(args);
                if names.is_empty() {
                    return Err(Error::Validation(responses::EMPTY_REMOVE.to_string()));
                }
                let removed = self.unfollow_many(&sender.username, &names).await?;
                let text = if removed.is_empty() {
                    responses::NOT_FOLLOWING.to_string()
                } else {
                    responses::no_longer_following(&removed)
                };
                self.reply(&sender.username, &text).await;
                Ok(())
            }

            Command::Send => {
                let text = args.trim();
                if text.is_empty() {
                    return Err(Error::Validation(responses::EMPTY_SEND.to_string()));
                }
                self.broadcast_to_followers(
                    &sender.username,
                    Payload::Text(responses::follower_message(text)),
                    Some(text),
                )
                .await
            }

            Command::SendAll => {
                if !is_admin(&sender.username, self.admin.as_deref()) {
                    debug!(username = %sender.username, "send_all from non-admin ignored");
                    return Ok(());
                }
                let text = args.trim();
                if text.is_empty() {
                    return Err(Error::Validation(responses::EMPTY_SEND_ALL.to_string()));
                }
                let recipients = self.graph.resolver().all_users().await?;
                let report = self
                    .dispatcher
                    .broadcast(
                        Payload::Text(responses::important_message(text)),
                        recipients,
                    )
                    .await;
                self.audit(AuditEvent::broadcast(
                    &sender.username,
                    "send_all",
                    Some(text),
                    report.delivered,
                    report.failed,
                ));
                Ok(())
            }
        }
    }

    async fn on_contact(&self, sender: &Sender, user_id: Option<&str>) -> Result<()> {
        let Some(followee) = user_id.filter(|id| !id.is_empty()) else {
            return Err(Error::Validation(responses::EMPTY_CONTACT.to_string()));
        };

        let added = self.follow_many(sender, &[followee.to_string()]).await?;
        if !added.is_empty() {
            if let Err(e) = self
                .notifier
                .send_text(followee, responses::NEW_FOLLOWER)
                .await
            {
                warn!(followee, error = %e, "new follower notice not delivered");
            }
        }
        Ok(())
    }

    async fn on_inline_query(&self, sender: &Sender, query_id: &str, query: &str) -> Result<()> {
        let query = query.trim();
        if query.chars().count() < self.inline_query_min_len {
            return self.notifier.answer_inline_query(query_id, Vec::new()).await;
        }

        let results = self
            .graph
            .resolver()
            .search_by_name(query)
            .await?
            .into_iter()
            .filter(|r| r.username != sender.username)
            .map(|r| InlineResult {
                title: r.display_name(),
                id: r.username,
            })
            .collect();
        self.notifier.answer_inline_query(query_id, results).await
    }

    async fn on_selection(&self, sender: &Sender, callback_id: &str, token: &str) -> Result<()> {
        let removed = self
            .unfollow_many(&sender.username, &[token.to_string()])
            .await?;

        let text = if removed.is_empty() {
            responses::NOT_FOLLOWING.to_string()
        } else {
            let label = match self.graph.get(token).await? {
                Some(r) => r.display_name(),
                None => token.to_string(),
            };
            responses::removed(&label)
        };
        self.notifier.answer_callback(callback_id, Some(&text)).await
    }

    /// Interactive remove: list current followees as selectable options.
    async fn offer_removal(&self, username: &str) -> Result<()> {
        let followees = self.graph.followees(username).await?;
        if followees.is_empty() {
            self.reply(username, responses::NOBODY_TO_REMOVE).await;
            return Ok(());
        }

        let options = followees
            .iter()
            .map(|f| KeyboardOption::new(&f.label, f.username.clone(), self.button_label_max_length))
            .collect();
        self.notifier
            .send_keyboard(username, responses::REMOVE_PROMPT, options)
            .await
    }

    /// Follow each name in order; returns the ones that became new edges.
    async fn follow_many(&self, sender: &Sender, names: &[String]) -> Result<Vec<String>> {
        if names.iter().any(|n| *n == sender.username) {
            return Err(Error::Validation(responses::SELF_FOLLOW.to_string()));
        }
        self.graph
            .ensure_registered(&sender.username, &sender.profile)
            .await?;

        let mut added = Vec::new();
        for name in names {
            if self.graph.follow(&sender.username, name).await? {
                added.push(name.clone());
            }
        }
        if !added.is_empty() {
            self.audit(AuditEvent::follow(&sender.username, &added));
        }
        Ok(added)
    }

    async fn unfollow_many(&self, username: &str, names: &[String]) -> Result<Vec<String>> {
        let removed = match self.graph.unfollow(username, names).await {
            Ok(removed) => removed,
            // No record means an empty follow list.
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        if !removed.is_empty() {
            self.audit(AuditEvent::unfollow(username, &removed));
        }
        Ok(removed)
    }

    async fn broadcast_to_followers(
        &self,
        username: &str,
        payload: Payload,
        content: Option<&str>,
    ) -> Result<()> {
        self.check_rate(username).await?;

        let recipients = self.graph.resolver().follower_names(username).await?;
        if recipients.is_empty() {
            debug!(username, kind = payload.kind(), "no followers; nothing to broadcast");
            return Ok(());
        }

        let kind = payload.kind();
        let report = self.dispatcher.broadcast(payload, recipients).await;
        self.audit(AuditEvent::broadcast(
            username,
            kind,
            content,
            report.delivered,
            report.failed,
        ));
        Ok(())
    }

    async fn check_rate(&self, username: &str) -> Result<()> {
        let (ok, retry_after) = self.rate_limiter.lock().await.check(username);
        if ok {
            return Ok(());
        }
        let retry = retry_after.unwrap_or_default().as_secs_f64();
        Err(Error::Validation(responses::rate_limited(retry)))
    }

    /// Best-effort text reply to the sender.
    async fn reply(&self, username: &str, text: &str) {
        if let Err(e) = self.notifier.send_text(username, text).await {
            warn!(username, error = %e, "reply not delivered");
        }
    }

    fn audit(&self, event: AuditEvent) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.write(event) {
            warn!(error = %e, "failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{FakeNotifier, FlakyStore, Sent};
    use std::time::Duration;

    const ADMIN: &str = "1000";

    fn cfg() -> Config {
        Config {
            admin_username: Some(ADMIN.to_string()),
            rate_limit_enabled: false,
            ..Config::default()
        }
    }

    struct Harness {
        router: CommandRouter,
        store: Arc<MemoryStore>,
        notifier: Arc<FakeNotifier>,
    }

    fn harness_with(cfg: Config, notifier: FakeNotifier) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);
        let router = CommandRouter::new(&cfg, store.clone(), notifier.clone());
        Harness {
            router,
            store,
            notifier,
        }
    }

    fn harness() -> Harness {
        harness_with(cfg(), FakeNotifier::default())
    }

    fn sender(username: &str) -> Sender {
        Sender::new(username, username, "user")
    }

    fn cmd(username: &str, text: &str) -> IncomingEvent {
        let (name, args) = parse_command(text);
        IncomingEvent::Command {
            sender: sender(username),
            name,
            args,
        }
    }

    impl Harness {
        async fn run(&self, username: &str, text: &str) {
            self.router.handle(cmd(username, text)).await.unwrap();
        }

        async fn follow_set(&self, username: &str) -> Vec<String> {
            self.store
                .get(username)
                .await
                .unwrap()
                .map(|r| r.follow.into_iter().collect())
                .unwrap_or_default()
        }
    }

    #[test]
    fn parse_command_strips_bot_suffix_and_lowercases() {
        assert_eq!(
            parse_command("/Add@herald_bot @bob  carol"),
            ("add".to_string(), "@bob  carol".to_string())
        );
        assert_eq!(parse_command("/remove"), ("remove".to_string(), String::new()));
    }

    #[test]
    fn usernames_drop_one_at_sign_and_duplicates() {
        assert_eq!(
            parse_usernames("@bob carol @bob @ "),
            vec!["bob".to_string(), "carol".to_string()]
        );
        assert!(parse_usernames("   ").is_empty());
    }

    #[test]
    fn command_registry_is_closed() {
        for c in Command::ALL {
            assert_eq!(Command::parse(c.name()), Some(c));
        }
        assert_eq!(Command::parse("help"), None);
        assert_eq!(Command::parse("send_all"), Some(Command::SendAll));
    }

    #[tokio::test]
    async fn add_follows_unregistered_users_without_error() {
        let h = harness();
        h.run("alice", "/add bob @carol").await;

        assert_eq!(h.follow_set("alice").await, vec!["bob", "carol"]);
        assert!(h.store.get("bob").await.unwrap().is_none());
        assert!(h.store.get("carol").await.unwrap().is_none());
        assert_eq!(
            h.notifier.texts_to("alice"),
            vec!["Now following: bob, carol".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_add_replies_with_usage_and_changes_nothing() {
        let h = harness();
        h.run("alice", "/add").await;
        h.run("alice", "/add @").await;
        assert_eq!(
            h.notifier.texts_to("alice"),
            vec![responses::EMPTY_ADD.to_string(), responses::EMPTY_ADD.to_string()]
        );
        assert!(h.store.get("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn following_yourself_is_rejected() {
        let h = harness();
        h.run("alice", "/add @alice bob").await;

        assert_eq!(
            h.notifier.texts_to("alice"),
            vec![responses::SELF_FOLLOW.to_string()]
        );
        assert!(h.store.get("alice").await.unwrap().is_none());

        h.router
            .handle(IncomingEvent::InlineChosen {
                sender: sender("alice"),
                result_id: "alice".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(h.notifier.texts_to("alice").len(), 2);
        assert!(h.follow_set("alice").await.is_empty());
    }

    #[tokio::test]
    async fn remove_with_empty_follow_list_sends_no_keyboard() {
        let h = harness();
        h.run("alice", "/start").await;
        h.run("alice", "/remove").await;

        let sent = h.notifier.sent();
        assert!(!sent.iter().any(|s| matches!(s, Sent::Keyboard(..))));
        assert_eq!(
            h.notifier.texts_to("alice").last().map(String::as_str),
            Some(responses::NOBODY_TO_REMOVE)
        );
    }

    #[tokio::test]
    async fn interactive_remove_offers_followees_then_unfollows_selection() {
        let h = harness();
        h.run("bob", "/start").await;
        h.run("alice", "/add bob ghost").await;
        h.run("alice", "/remove").await;

        let keyboard = h
            .notifier
            .sent()
            .into_iter()
            .find_map(|s| match s {
                Sent::Keyboard(to, prompt, options) => Some((to, prompt, options)),
                _ => None,
            })
            .unwrap();
        assert_eq!(keyboard.0, "alice");
        assert_eq!(keyboard.1, responses::REMOVE_PROMPT);
        let tokens: Vec<&str> = keyboard.2.iter().map(|o| o.token.as_str()).collect();
        assert_eq!(tokens, vec!["bob", "ghost"]);
        assert_eq!(keyboard.2[0].label, "BOB USER");

        h.router
            .handle(IncomingEvent::Selection {
                sender: sender("alice"),
                callback_id: "cb1".to_string(),
                token: "bob".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(h.follow_set("alice").await, vec!["ghost"]);
        let bob = h.store.get("bob").await.unwrap().unwrap();
        assert!(!bob.followers.contains("alice"));
        assert!(h
            .notifier
            .sent()
            .contains(&Sent::Callback("cb1".to_string(), Some("Removed BOB USER".to_string()))));
    }

    #[tokio::test]
    async fn remove_by_name_unlinks_both_sides() {
        let h = harness();
        h.run("bob", "/start").await;
        h.run("alice", "/add bob").await;
        h.run("alice", "/remove @bob").await;
        h.run("alice", "/remove @bob").await;

        assert!(h.follow_set("alice").await.is_empty());
        let bob = h.store.get("bob").await.unwrap().unwrap();
        assert!(bob.followers.is_empty());
        let replies = h.notifier.texts_to("alice");
        assert_eq!(replies[replies.len() - 2], "No longer following: bob");
        assert_eq!(replies[replies.len() - 1], responses::NOT_FOLLOWING);
    }

    #[tokio::test]
    async fn send_reaches_current_followers_only() {
        let h = harness();
        h.run("alice", "/start").await;
        h.run("bob", "/add alice").await;
        h.run("carol", "/add alice").await;
        h.run("carol", "/remove alice").await;
        h.run("alice", "/send hello world").await;

        assert_eq!(
            h.notifier.texts_to("bob"),
            vec![
                "Now following: alice".to_string(),
                "Somebody told me, that \"hello world\"".to_string()
            ]
        );
        assert!(!h
            .notifier
            .texts_to("carol")
            .iter()
            .any(|t| t.starts_with("Somebody told me")));
    }

    #[tokio::test]
    async fn send_without_followers_is_silent() {
        let h = harness();
        h.run("alice", "/start").await;
        let before = h.notifier.sent().len();
        h.run("alice", "/send hello").await;
        assert_eq!(h.notifier.sent().len(), before);
    }

    #[tokio::test]
    async fn empty_send_replies_with_usage() {
        let h = harness();
        h.run("alice", "/send   ").await;
        assert_eq!(h.notifier.texts_to("alice"), vec![responses::EMPTY_SEND]);
    }

    #[tokio::test]
    async fn send_all_from_non_admin_is_silent_noop() {
        let h = harness();
        h.run("alice", "/start").await;
        h.run("bob", "/start").await;
        let before = h.notifier.sent().len();
        h.run("alice", "/send_all attention").await;
        assert_eq!(h.notifier.sent().len(), before);
    }

    #[tokio::test]
    async fn send_all_from_admin_reaches_every_user() {
        let h = harness();
        for u in ["alice", "bob", ADMIN] {
            h.run(u, "/start").await;
        }
        h.run(ADMIN, "/send_all maintenance at 9").await;

        let msg = "Important message for all the users - \"maintenance at 9\"".to_string();
        for u in ["alice", "bob", ADMIN] {
            assert!(h.notifier.texts_to(u).contains(&msg), "{u}");
        }
    }

    #[tokio::test]
    async fn contact_share_follows_and_notifies_only_on_new_edge() {
        let h = harness();
        h.run("bob", "/start").await;
        let contact = || IncomingEvent::Contact {
            sender: sender("alice"),
            user_id: Some("bob".to_string()),
        };
        h.router.handle(contact()).await.unwrap();
        h.router.handle(contact()).await.unwrap();

        assert_eq!(h.follow_set("alice").await, vec!["bob"]);
        let notices: Vec<String> = h
            .notifier
            .texts_to("bob")
            .into_iter()
            .filter(|t| t == responses::NEW_FOLLOWER)
            .collect();
        assert_eq!(notices.len(), 1);
    }

    #[tokio::test]
    async fn contact_without_account_is_reported() {
        let h = harness();
        h.router
            .handle(IncomingEvent::Contact {
                sender: sender("alice"),
                user_id: None,
            })
            .await
            .unwrap();
        assert_eq!(h.notifier.texts_to("alice"), vec![responses::EMPTY_CONTACT]);
        assert!(h.store.get("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn media_is_broadcast_with_fixed_wrappers() {
        let h = harness();
        h.run("alice", "/start").await;
        h.run("bob", "/add alice").await;

        for event in [
            IncomingEvent::Photo {
                sender: sender("alice"),
                file_id: "p".to_string(),
            },
            IncomingEvent::Document {
                sender: sender("alice"),
                file_id: "d".to_string(),
            },
            IncomingEvent::Sticker {
                sender: sender("alice"),
                file_id: "s".to_string(),
            },
        ] {
            h.router.handle(event).await.unwrap();
        }

        let to_bob: Vec<Sent> = h
            .notifier
            .sent()
            .into_iter()
            .filter(|s| s.recipient() == Some("bob"))
            .skip(1) // "/add" confirmation
            .collect();
        assert_eq!(
            to_bob,
            vec![
                Sent::Photo(
                    "bob".to_string(),
                    "p".to_string(),
                    Some(responses::PHOTO_CAPTION.to_string())
                ),
                Sent::Document("bob".to_string(), "d".to_string()),
                Sent::Text("bob".to_string(), responses::BEFORE_STICKER.to_string()),
                Sent::Sticker("bob".to_string(), "s".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn inline_search_requires_min_length_and_follows_on_choice() {
        let h = harness();
        h.run("bob", "/start").await;
        h.run("alice", "/start").await;

        h.router
            .handle(IncomingEvent::InlineQuery {
                sender: sender("alice"),
                query_id: "q1".to_string(),
                query: "bo".to_string(),
            })
            .await
            .unwrap();
        h.router
            .handle(IncomingEvent::InlineQuery {
                sender: sender("alice"),
                query_id: "q2".to_string(),
                query: "bob".to_string(),
            })
            .await
            .unwrap();

        let answers: Vec<Sent> = h
            .notifier
            .sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Inline(..)))
            .collect();
        assert_eq!(
            answers,
            vec![
                Sent::Inline("q1".to_string(), vec![]),
                Sent::Inline(
                    "q2".to_string(),
                    vec![InlineResult {
                        id: "bob".to_string(),
                        title: "BOB USER".to_string()
                    }]
                ),
            ]
        );

        h.router
            .handle(IncomingEvent::InlineChosen {
                sender: sender("alice"),
                result_id: "bob".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(h.follow_set("alice").await, vec!["bob"]);
        let bob = h.store.get("bob").await.unwrap().unwrap();
        assert!(bob.followers.contains("alice"));
    }

    #[tokio::test]
    async fn start_twice_keeps_follow_list() {
        let h = harness();
        h.run("alice", "/start").await;
        h.run("alice", "/add bob").await;
        h.run("alice", "/start").await;
        h.run("alice", "/update").await;
        assert_eq!(h.follow_set("alice").await, vec!["bob"]);
        assert!(h
            .notifier
            .texts_to("alice")
            .contains(&responses::PROFILE_UPDATED.to_string()));
    }

    #[tokio::test]
    async fn rate_limited_broadcast_is_reported_to_sender() {
        let h = harness_with(
            Config {
                rate_limit_enabled: true,
                rate_limit_requests: 1,
                rate_limit_window: Duration::from_secs(60),
                ..cfg()
            },
            FakeNotifier::default(),
        );
        h.run("alice", "/start").await;
        h.run("bob", "/add alice").await;
        h.run("alice", "/send one").await;
        h.run("alice", "/send two").await;

        let bob_msgs: Vec<String> = h
            .notifier
            .texts_to("bob")
            .into_iter()
            .filter(|t| t.starts_with("Somebody told me"))
            .collect();
        assert_eq!(bob_msgs.len(), 1);
        assert!(h
            .notifier
            .texts_to("alice")
            .iter()
            .any(|t| t.starts_with("⏳ Rate limited")));
    }

    #[tokio::test]
    async fn failing_follower_does_not_block_others() {
        let h = harness_with(cfg(), FakeNotifier::failing_for(&["f3"]));
        h.run("star", "/start").await;
        for f in ["f1", "f2", "f3", "f4", "f5"] {
            // f3 never sees its confirmation; the follow still lands.
            h.run(f, "/add star").await;
        }
        h.run("star", "/send hi").await;

        for f in ["f1", "f2", "f4", "f5"] {
            assert!(h
                .notifier
                .texts_to(f)
                .contains(&"Somebody told me, that \"hi\"".to_string()));
        }
    }

    #[tokio::test]
    async fn store_outage_is_returned_not_swallowed() {
        let inner = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyStore::new(inner.clone()));
        let notifier = Arc::new(FakeNotifier::default());
        let router = CommandRouter::new(&cfg(), flaky.clone(), notifier.clone());

        router.handle(cmd("alice", "/start")).await.unwrap();
        flaky.fail_updates(true);
        let err = router.handle(cmd("alice", "/add bob")).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert!(inner.get("alice").await.unwrap().unwrap().follow.is_empty());
    }
}
