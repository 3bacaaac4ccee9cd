//! Page state for each screen of the client.
//!
//! A page fetches on `load`, keeps the result in a [`Loadable`], and renders
//! itself as text. Actions (like, follow, send, ...) issue one request and
//! patch the already-fetched state only after that request succeeds. A
//! failed action leaves the state alone and records a page-local error.

use std::{collections::HashSet, fmt::Write as _};

use chrono::{DateTime, Utc};
use shared::{
    domain::{ConversationId, NotificationId, PostId, ProfileId, Session, UserId},
    protocol::{
        Conversation, FollowStatus, LikeStatus, Message, Notification, Post, Profile,
        ProfileUpdate, RegisterResponse, User, UserSummary, UserUpdate,
    },
};
use tracing::debug;

use crate::{
    error::{ClientError, ClientResult},
    session::SessionStore,
    validation::{
        validate_login, validate_message, validate_post, validate_profile_update,
        validate_registration, validate_user_update, RegistrationInput,
    },
    SocialApi,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    Idle,
    Loading,
    Failed(String),
    Loaded(T),
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> Loadable<T> {
    pub fn from_result(result: ClientResult<T>) -> Self {
        match result {
            Ok(value) => Self::Loaded(value),
            Err(err) => Self::Failed(err.display_message()),
        }
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn user_label(summary: Option<&UserSummary>, fallback: UserId) -> String {
    match summary {
        Some(user) => format!("@{}", user.username),
        None => format!("user #{}", fallback.0),
    }
}

fn render_list<T>(
    out: &mut String,
    state: &Loadable<Vec<T>>,
    empty: &str,
    mut render_item: impl FnMut(&mut String, &T),
) {
    match state {
        Loadable::Idle => {}
        Loadable::Loading => out.push_str("Loading...\n"),
        Loadable::Failed(message) => {
            let _ = writeln!(out, "Error: {message}");
        }
        Loadable::Loaded(items) if items.is_empty() => {
            let _ = writeln!(out, "{empty}");
        }
        Loadable::Loaded(items) => {
            for item in items {
                render_item(out, item);
            }
        }
    }
}

fn render_page_error(out: &mut String, error: &Option<String>) {
    if let Some(error) = error {
        let _ = writeln!(out, "! {error}");
    }
}

/// Records a failed action on the page and hands the error back to the caller.
fn record_failure<T>(page_error: &mut Option<String>, result: ClientResult<T>) -> ClientResult<T> {
    match result {
        Ok(value) => {
            *page_error = None;
            Ok(value)
        }
        Err(err) => {
            *page_error = Some(err.display_message());
            Err(err)
        }
    }
}

/// Refuses an action on a page whose data failed to load.
fn ensure_not_failed<T>(
    state: &Loadable<T>,
    what: &'static str,
    page_error: &mut Option<String>,
) -> ClientResult<()> {
    if let Loadable::Failed(_) = state {
        let err = ClientError::NotLoaded(what);
        *page_error = Some(err.display_message());
        return Err(err);
    }
    Ok(())
}

fn patch_counter(count: &mut u64, before: bool, after: bool, reported: Option<u64>) {
    if let Some(reported) = reported {
        *count = reported;
    } else if after && !before {
        *count = count.saturating_add(1);
    } else if before && !after {
        *count = count.saturating_sub(1);
    }
}

/// Applies a like/unlike response to the matching post. Returns `false` when
/// the post is not in the list.
pub fn apply_like_status(posts: &mut [Post], post_id: PostId, status: LikeStatus) -> bool {
    let Some(post) = posts.iter_mut().find(|post| post.id == post_id) else {
        return false;
    };
    patch_counter(
        &mut post.likes_count,
        post.liked,
        status.liked,
        status.likes_count,
    );
    post.liked = status.liked;
    true
}

pub fn apply_follow_status(profile: &mut Profile, status: FollowStatus) {
    patch_counter(
        &mut profile.followers_count,
        profile.following,
        status.following,
        status.followers_count,
    );
    profile.following = status.following;
}

fn render_post(out: &mut String, post: &Post) {
    let marker = if post.liked { "♥" } else { "♡" };
    let _ = writeln!(
        out,
        "[{}] {} · {}\n    {}\n    {} {}",
        post.id.0,
        post.author_label(),
        timestamp(&post.created_at),
        post.content,
        marker,
        post.likes_count
    );
}

#[derive(Debug, Default)]
pub struct FeedPage {
    pub author: Option<UserId>,
    pub posts: Loadable<Vec<Post>>,
    pub error: Option<String>,
}

impl FeedPage {
    pub fn new(author: Option<UserId>) -> Self {
        Self {
            author,
            ..Self::default()
        }
    }

    pub async fn load(&mut self, api: &dyn SocialApi) {
        self.posts = Loadable::Loading;
        self.posts = Loadable::from_result(api.list_posts(self.author).await);
    }

    pub async fn submit_post(&mut self, api: &dyn SocialApi, content: &str) -> ClientResult<Post> {
        ensure_not_failed(&self.posts, "feed", &mut self.error)?;
        let result = match validate_post(content) {
            Ok(new_post) => api.create_post(&new_post).await,
            Err(errors) => Err(errors.into()),
        };
        let post = record_failure(&mut self.error, result)?;
        if let Some(posts) = self.posts.loaded_mut() {
            posts.insert(0, post.clone());
        }
        Ok(post)
    }

    fn is_liked(&self, post_id: PostId) -> bool {
        self.posts
            .loaded()
            .and_then(|posts| posts.iter().find(|post| post.id == post_id))
            .map(|post| post.liked)
            .unwrap_or(false)
    }

    pub async fn set_like(
        &mut self,
        api: &dyn SocialApi,
        post_id: PostId,
        like: bool,
    ) -> ClientResult<LikeStatus> {
        ensure_not_failed(&self.posts, "feed", &mut self.error)?;
        let result = if like {
            api.like(post_id).await
        } else {
            api.unlike(post_id).await
        };
        let status = record_failure(&mut self.error, result)?;
        if let Some(posts) = self.posts.loaded_mut() {
            if !apply_like_status(posts, post_id, status) {
                debug!(post_id = post_id.0, "liked post is not on this page");
            }
        }
        Ok(status)
    }

    pub async fn toggle_like(
        &mut self,
        api: &dyn SocialApi,
        post_id: PostId,
    ) -> ClientResult<LikeStatus> {
        let like = !self.is_liked(post_id);
        self.set_like(api, post_id, like).await
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.author {
            Some(author) => {
                let _ = writeln!(out, "== Posts by user #{} ==", author.0);
            }
            None => out.push_str("== Feed ==\n"),
        }
        render_page_error(&mut out, &self.error);
        render_list(&mut out, &self.posts, "No posts yet.", render_post);
        out
    }
}

/// People listing. `following` is seeded from the `following` flag on each
/// listed user; a backend that omits the flag leaves it empty until this page
/// follows someone.
#[derive(Debug, Default)]
pub struct UsersPage {
    pub viewer: Option<UserId>,
    pub users: Loadable<Vec<User>>,
    pub following: HashSet<UserId>,
    pub error: Option<String>,
}

impl UsersPage {
    pub fn new(viewer: Option<UserId>) -> Self {
        Self {
            viewer,
            ..Self::default()
        }
    }

    pub async fn load(&mut self, api: &dyn SocialApi) {
        self.users = Loadable::Loading;
        self.users = Loadable::from_result(api.list_users().await);
        if let Some(users) = self.users.loaded() {
            self.following = users
                .iter()
                .filter(|user| user.following)
                .map(|user| user.id)
                .collect();
        }
    }

    pub async fn set_follow(
        &mut self,
        api: &dyn SocialApi,
        user_id: UserId,
        follow: bool,
    ) -> ClientResult<FollowStatus> {
        ensure_not_failed(&self.users, "user list", &mut self.error)?;
        let result = if follow {
            api.follow(user_id).await
        } else {
            api.unfollow(user_id).await
        };
        let status = record_failure(&mut self.error, result)?;
        if status.following {
            self.following.insert(user_id);
        } else {
            self.following.remove(&user_id);
        }
        Ok(status)
    }

    pub async fn toggle_follow(
        &mut self,
        api: &dyn SocialApi,
        user_id: UserId,
    ) -> ClientResult<FollowStatus> {
        let follow = !self.following.contains(&user_id);
        self.set_follow(api, user_id, follow).await
    }

    pub fn render(&self) -> String {
        let mut out = String::from("== People ==\n");
        render_page_error(&mut out, &self.error);
        render_list(&mut out, &self.users, "No users found.", |out, user| {
            let mut tags = Vec::new();
            if Some(user.id) == self.viewer {
                tags.push("you");
            }
            if self.following.contains(&user.id) {
                tags.push("following");
            }
            let suffix = if tags.is_empty() {
                String::new()
            } else {
                format!(" ({})", tags.join(", "))
            };
            let _ = writeln!(out, "[{}] @{}{}", user.id.0, user.username, suffix);
        });
        out
    }
}

#[derive(Debug, Default)]
pub struct ProfilePage {
    pub profile: Loadable<Profile>,
    pub posts: Loadable<Vec<Post>>,
    pub error: Option<String>,
}

impl ProfilePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the profile, then that user's posts.
    pub async fn load(&mut self, api: &dyn SocialApi, profile_id: ProfileId) {
        self.profile = Loadable::Loading;
        self.profile = Loadable::from_result(api.get_profile(profile_id).await);
        self.posts = match self.profile.loaded() {
            Some(profile) => {
                let author = profile.user_id;
                Loadable::from_result(api.list_posts(Some(author)).await)
            }
            None => Loadable::Idle,
        };
    }

    pub async fn set_follow(
        &mut self,
        api: &dyn SocialApi,
        follow: bool,
    ) -> ClientResult<FollowStatus> {
        let Some(user_id) = self.profile.loaded().map(|profile| profile.user_id) else {
            let err = ClientError::NotLoaded("profile");
            self.error = Some(err.display_message());
            return Err(err);
        };
        let result = if follow {
            api.follow(user_id).await
        } else {
            api.unfollow(user_id).await
        };
        let status = record_failure(&mut self.error, result)?;
        if let Some(profile) = self.profile.loaded_mut() {
            apply_follow_status(profile, status);
        }
        Ok(status)
    }

    pub async fn toggle_follow(&mut self, api: &dyn SocialApi) -> ClientResult<FollowStatus> {
        let follow = !self
            .profile
            .loaded()
            .map(|profile| profile.following)
            .unwrap_or(false);
        self.set_follow(api, follow).await
    }

    pub async fn save(
        &mut self,
        api: &dyn SocialApi,
        profile_id: ProfileId,
        update: ProfileUpdate,
    ) -> ClientResult<Profile> {
        ensure_not_failed(&self.profile, "profile", &mut self.error)?;
        let result = match validate_profile_update(update) {
            Ok(update) => api.update_profile(profile_id, &update).await,
            Err(errors) => Err(errors.into()),
        };
        let profile = record_failure(&mut self.error, result)?;
        self.profile = Loadable::Loaded(profile.clone());
        Ok(profile)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        match &self.profile {
            Loadable::Idle => out.push_str("== Profile ==\n"),
            Loadable::Loading => out.push_str("== Profile ==\nLoading...\n"),
            Loadable::Failed(message) => {
                let _ = writeln!(out, "== Profile ==\nError: {message}");
            }
            Loadable::Loaded(profile) => {
                let handle = profile
                    .username
                    .as_deref()
                    .map(|name| format!("@{name}"))
                    .unwrap_or_else(|| format!("user #{}", profile.user_id.0));
                let title = profile.display_name.as_deref().unwrap_or(&handle);
                let _ = writeln!(out, "== {title} ({handle}) ==");
                if let Some(bio) = profile.bio.as_deref().filter(|bio| !bio.is_empty()) {
                    let _ = writeln!(out, "{bio}");
                }
                if let Some(website) = profile.website.as_deref().filter(|w| !w.is_empty()) {
                    let _ = writeln!(out, "Web: {website}");
                }
                let _ = writeln!(
                    out,
                    "{} followers · {} following{}",
                    profile.followers_count,
                    profile.following_count,
                    if profile.following {
                        " · you follow them"
                    } else {
                        ""
                    }
                );
            }
        }
        render_page_error(&mut out, &self.error);
        if self.profile.is_loaded() {
            out.push_str("-- Posts --\n");
            render_list(&mut out, &self.posts, "No posts yet.", render_post);
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct AccountPage {
    pub user: Loadable<User>,
    pub error: Option<String>,
}

impl AccountPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&mut self, api: &dyn SocialApi, user_id: UserId) {
        self.user = Loadable::Loading;
        self.user = Loadable::from_result(api.get_user(user_id).await);
    }

    pub async fn save(
        &mut self,
        api: &dyn SocialApi,
        user_id: UserId,
        update: UserUpdate,
    ) -> ClientResult<User> {
        ensure_not_failed(&self.user, "account", &mut self.error)?;
        let result = match validate_user_update(update) {
            Ok(update) => api.update_user(user_id, &update).await,
            Err(errors) => Err(errors.into()),
        };
        let user = record_failure(&mut self.error, result)?;
        self.user = Loadable::Loaded(user.clone());
        Ok(user)
    }

    pub fn render(&self) -> String {
        let mut out = String::from("== Account ==\n");
        render_page_error(&mut out, &self.error);
        match &self.user {
            Loadable::Idle => {}
            Loadable::Loading => out.push_str("Loading...\n"),
            Loadable::Failed(message) => {
                let _ = writeln!(out, "Error: {message}");
            }
            Loadable::Loaded(user) => {
                let _ = writeln!(out, "[{}] @{}", user.id.0, user.username);
                if let Some(email) = &user.email {
                    let _ = writeln!(out, "Email: {email}");
                }
                if let Some(created_at) = &user.created_at {
                    let _ = writeln!(out, "Joined: {}", timestamp(created_at));
                }
            }
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct NotificationsPage {
    pub notifications: Loadable<Vec<Notification>>,
    pub error: Option<String>,
}

impl NotificationsPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&mut self, api: &dyn SocialApi) {
        self.notifications = Loadable::Loading;
        self.notifications = Loadable::from_result(api.list_notifications().await);
    }

    pub fn unread_count(&self) -> usize {
        self.notifications
            .loaded()
            .map(|items| items.iter().filter(|item| !item.read).count())
            .unwrap_or(0)
    }

    pub async fn mark_read(
        &mut self,
        api: &dyn SocialApi,
        notification_id: NotificationId,
    ) -> ClientResult<Notification> {
        ensure_not_failed(&self.notifications, "notification list", &mut self.error)?;
        let result = api.mark_notification_read(notification_id).await;
        let updated = record_failure(&mut self.error, result)?;
        if let Some(items) = self.notifications.loaded_mut() {
            if let Some(slot) = items.iter_mut().find(|item| item.id == notification_id) {
                *slot = updated.clone();
            }
        }
        Ok(updated)
    }

    pub fn render(&self) -> String {
        let mut out = String::from("== Notifications ==\n");
        if self.notifications.is_loaded() {
            let _ = writeln!(out, "{} unread", self.unread_count());
        }
        render_page_error(&mut out, &self.error);
        render_list(
            &mut out,
            &self.notifications,
            "You're all caught up.",
            |out, item| {
                let actor = item
                    .actor
                    .as_ref()
                    .map(|actor| format!("@{}", actor.username))
                    .unwrap_or_else(|| "Someone".to_string());
                let marker = if item.read { " " } else { "*" };
                let _ = write!(
                    out,
                    "{marker} [{}] {actor} {}",
                    item.id.0,
                    item.kind.verb()
                );
                if let Some(post_id) = item.post_id {
                    let _ = write!(out, " (post {})", post_id.0);
                }
                let _ = writeln!(out, " · {}", timestamp(&item.created_at));
            },
        );
        out
    }
}

#[derive(Debug, Default)]
pub struct ConversationsPage {
    pub viewer: Option<UserId>,
    pub conversations: Loadable<Vec<Conversation>>,
    pub error: Option<String>,
}

impl ConversationsPage {
    pub fn new(viewer: Option<UserId>) -> Self {
        Self {
            viewer,
            ..Self::default()
        }
    }

    pub async fn load(&mut self, api: &dyn SocialApi) {
        self.conversations = Loadable::Loading;
        self.conversations = Loadable::from_result(api.list_conversations().await);
    }

    pub async fn start(
        &mut self,
        api: &dyn SocialApi,
        recipient_id: UserId,
    ) -> ClientResult<Conversation> {
        ensure_not_failed(&self.conversations, "conversation list", &mut self.error)?;
        let result = api.create_conversation(recipient_id).await;
        let conversation = record_failure(&mut self.error, result)?;
        if let Some(items) = self.conversations.loaded_mut() {
            if !items.iter().any(|item| item.id == conversation.id) {
                items.insert(0, conversation.clone());
            }
        }
        Ok(conversation)
    }

    fn title(&self, conversation: &Conversation) -> String {
        let names: Vec<String> = conversation
            .participants
            .iter()
            .filter(|user| Some(user.id) != self.viewer)
            .map(|user| format!("@{}", user.username))
            .collect();
        if names.is_empty() {
            format!("conversation #{}", conversation.id.0)
        } else {
            names.join(", ")
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("== Messages ==\n");
        render_page_error(&mut out, &self.error);
        render_list(
            &mut out,
            &self.conversations,
            "No conversations yet.",
            |out, conversation| {
                let _ = writeln!(out, "[{}] {}", conversation.id.0, self.title(conversation));
                if let Some(last) = &conversation.last_message {
                    let _ = writeln!(out, "    {}", last.body);
                }
            },
        );
        out
    }
}

#[derive(Debug)]
pub struct ConversationPage {
    pub conversation_id: ConversationId,
    pub viewer: Option<UserId>,
    pub messages: Loadable<Vec<Message>>,
    pub error: Option<String>,
}

impl ConversationPage {
    pub fn new(conversation_id: ConversationId, viewer: Option<UserId>) -> Self {
        Self {
            conversation_id,
            viewer,
            messages: Loadable::Idle,
            error: None,
        }
    }

    pub async fn load(&mut self, api: &dyn SocialApi) {
        self.messages = Loadable::Loading;
        self.messages = Loadable::from_result(api.list_messages(self.conversation_id).await);
    }

    pub async fn send(&mut self, api: &dyn SocialApi, body: &str) -> ClientResult<Message> {
        ensure_not_failed(&self.messages, "conversation", &mut self.error)?;
        let result = match validate_message(body) {
            Ok(message) => api.send_message(self.conversation_id, &message).await,
            Err(errors) => Err(errors.into()),
        };
        let message = record_failure(&mut self.error, result)?;
        if let Some(messages) = self.messages.loaded_mut() {
            messages.push(message.clone());
        }
        Ok(message)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== Conversation #{} ==", self.conversation_id.0);
        render_page_error(&mut out, &self.error);
        render_list(&mut out, &self.messages, "No messages yet.", |out, message| {
            let sender = if Some(message.sender_id) == self.viewer {
                "you".to_string()
            } else {
                user_label(message.sender.as_ref(), message.sender_id)
            };
            let _ = writeln!(
                out,
                "{} {}: {}",
                timestamp(&message.created_at),
                sender,
                message.body
            );
        });
        out
    }
}

/// Saves a freshly issued session, signing the client back out if the store
/// refuses it.
async fn persist_session(
    api: &dyn SocialApi,
    store: &dyn SessionStore,
    session: &Session,
    form_error: &mut Option<String>,
) -> ClientResult<()> {
    if let Err(err) = store.save(session) {
        api.set_session(None).await;
        *form_error = Some(err.display_message());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub error: Option<String>,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            error: None,
        }
    }

    /// Validates, signs in, and persists the session. The store is untouched
    /// on failure, and a session that could not be saved is dropped from the
    /// client again.
    pub async fn submit(
        &mut self,
        api: &dyn SocialApi,
        store: &dyn SessionStore,
    ) -> ClientResult<Session> {
        let result = match validate_login(&self.username, &self.password) {
            Ok(request) => api.login(&request).await,
            Err(errors) => Err(errors.into()),
        };
        let session = record_failure(&mut self.error, result)?;
        persist_session(api, store, &session, &mut self.error).await?;
        Ok(session)
    }
}

#[derive(Debug, Default)]
pub struct RegisterForm {
    pub input: RegistrationInput,
    pub error: Option<String>,
}

impl RegisterForm {
    pub fn new(input: RegistrationInput) -> Self {
        Self { input, error: None }
    }

    /// Registers the account. When the backend hands back a token the new
    /// session is persisted as well.
    pub async fn submit(
        &mut self,
        api: &dyn SocialApi,
        store: &dyn SessionStore,
    ) -> ClientResult<(RegisterResponse, Option<Session>)> {
        let result = match validate_registration(&self.input) {
            Ok(request) => api.register(&request).await,
            Err(errors) => Err(errors.into()),
        };
        let response = record_failure(&mut self.error, result)?;
        let session = response.token.as_ref().map(|token| Session {
            token: token.clone(),
            user_id: response.user.id,
        });
        if let Some(session) = &session {
            persist_session(api, store, session, &mut self.error).await?;
        }
        Ok((response, session))
    }
}

/// Drops the session from both the client and the store.
pub async fn sign_out(api: &dyn SocialApi, store: &dyn SessionStore) -> ClientResult<()> {
    api.set_session(None).await;
    store.clear()
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
