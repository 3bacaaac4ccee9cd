use super::*;

use async_trait::async_trait;
use chrono::TimeZone;
use shared::{
    domain::NotificationKind,
    protocol::{LoginRequest, NewMessage, NewPost, RegisterRequest},
};
use tokio::sync::Mutex;

use crate::session::MemorySessionStore;

struct ReadOnlyStore;

impl SessionStore for ReadOnlyStore {
    fn load(&self) -> ClientResult<Option<Session>> {
        Ok(None)
    }

    fn save(&self, _session: &Session) -> ClientResult<()> {
        Err(ClientError::Session("read-only file system".into()))
    }

    fn clear(&self) -> ClientResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct StubApi {
    session: Mutex<Option<Session>>,
    posts: Vec<Post>,
    users: Vec<User>,
    profile: Option<Profile>,
    notifications: Vec<Notification>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    like_response: Option<LikeStatus>,
    follow_response: Option<FollowStatus>,
    register_token: Option<String>,
    fail_with: Mutex<Option<(u16, String)>>,
    calls: Mutex<Vec<String>>,
}

impl StubApi {
    async fn fail_next_calls(&self, status: u16, message: &str) {
        *self.fail_with.lock().await = Some((status, message.to_string()));
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn check(&self, call: impl Into<String>) -> ClientResult<()> {
        self.calls.lock().await.push(call.into());
        match self.fail_with.lock().await.clone() {
            Some((status, message)) => Err(ClientError::Status { status, message }),
            None => Ok(()),
        }
    }
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0)
        .single()
        .expect("valid timestamp")
}

fn post(id: i64, content: &str, likes_count: u64, liked: bool) -> Post {
    Post {
        id: PostId(id),
        user_id: UserId(7),
        content: content.into(),
        created_at: at(0),
        user: Some(UserSummary {
            id: UserId(7),
            username: "alice".into(),
        }),
        likes_count,
        liked,
    }
}

fn user(id: i64, username: &str) -> User {
    User {
        id: UserId(id),
        username: username.into(),
        email: None,
        created_at: None,
        following: false,
    }
}

fn profile(followers_count: u64, following: bool) -> Profile {
    Profile {
        id: ProfileId(4),
        user_id: UserId(9),
        username: Some("bob".into()),
        display_name: Some("Bob".into()),
        bio: Some("Gardener".into()),
        avatar_url: None,
        website: None,
        followers_count,
        following_count: 3,
        following,
    }
}

fn notification(id: i64, kind: NotificationKind, read: bool) -> Notification {
    Notification {
        id: NotificationId(id),
        kind,
        actor: Some(UserSummary {
            id: UserId(9),
            username: "bob".into(),
        }),
        post_id: None,
        read,
        created_at: at(5),
    }
}

fn message(id: i64, sender: i64, body: &str) -> Message {
    Message {
        id: shared::domain::MessageId(id),
        conversation_id: ConversationId(3),
        sender_id: UserId(sender),
        body: body.into(),
        created_at: at(1),
        sender: None,
    }
}

fn conversation(id: i64) -> Conversation {
    Conversation {
        id: ConversationId(id),
        participants: vec![
            UserSummary {
                id: UserId(7),
                username: "alice".into(),
            },
            UserSummary {
                id: UserId(9),
                username: "bob".into(),
            },
        ],
        last_message: None,
        updated_at: None,
    }
}

#[async_trait]
impl SocialApi for StubApi {
    async fn current_session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    async fn set_session(&self, session: Option<Session>) {
        *self.session.lock().await = session;
    }

    async fn login(&self, request: &LoginRequest) -> ClientResult<Session> {
        self.check(format!("login {}", request.username)).await?;
        let session = Session {
            token: "tok".into(),
            user_id: UserId(7),
        };
        self.set_session(Some(session.clone())).await;
        Ok(session)
    }

    async fn register(&self, request: &RegisterRequest) -> ClientResult<RegisterResponse> {
        self.check(format!("register {}", request.username)).await?;
        Ok(RegisterResponse {
            user: user(12, &request.username),
            token: self.register_token.clone(),
        })
    }

    async fn list_posts(&self, author: Option<UserId>) -> ClientResult<Vec<Post>> {
        self.check(format!("list_posts {author:?}")).await?;
        Ok(self.posts.clone())
    }

    async fn create_post(&self, new_post: &NewPost) -> ClientResult<Post> {
        self.check(format!("create_post {}", new_post.content)).await?;
        Ok(post(100, &new_post.content, 0, false))
    }

    async fn like(&self, post_id: PostId) -> ClientResult<LikeStatus> {
        self.check(format!("like {}", post_id.0)).await?;
        Ok(self.like_response.unwrap_or(LikeStatus {
            liked: true,
            likes_count: None,
        }))
    }

    async fn unlike(&self, post_id: PostId) -> ClientResult<LikeStatus> {
        self.check(format!("unlike {}", post_id.0)).await?;
        Ok(self.like_response.unwrap_or(LikeStatus {
            liked: false,
            likes_count: None,
        }))
    }

    async fn follow(&self, user_id: UserId) -> ClientResult<FollowStatus> {
        self.check(format!("follow {}", user_id.0)).await?;
        Ok(self.follow_response.unwrap_or(FollowStatus {
            following: true,
            followers_count: None,
        }))
    }

    async fn unfollow(&self, user_id: UserId) -> ClientResult<FollowStatus> {
        self.check(format!("unfollow {}", user_id.0)).await?;
        Ok(FollowStatus {
            following: false,
            followers_count: None,
        })
    }

    async fn list_users(&self) -> ClientResult<Vec<User>> {
        self.check("list_users").await?;
        Ok(self.users.clone())
    }

    async fn get_user(&self, user_id: UserId) -> ClientResult<User> {
        self.check(format!("get_user {}", user_id.0)).await?;
        Ok(user(user_id.0, "alice"))
    }

    async fn update_user(&self, user_id: UserId, update: &UserUpdate) -> ClientResult<User> {
        self.check(format!("update_user {}", user_id.0)).await?;
        let mut updated = user(user_id.0, "alice");
        if let Some(username) = &update.username {
            updated.username = username.clone();
        }
        updated.email = update.email.clone();
        Ok(updated)
    }

    async fn get_profile(&self, profile_id: ProfileId) -> ClientResult<Profile> {
        self.check(format!("get_profile {}", profile_id.0)).await?;
        self.profile.clone().ok_or(ClientError::Status {
            status: 404,
            message: "Profile not found".into(),
        })
    }

    async fn update_profile(
        &self,
        profile_id: ProfileId,
        update: &ProfileUpdate,
    ) -> ClientResult<Profile> {
        self.check(format!("update_profile {}", profile_id.0)).await?;
        let mut updated = self.profile.clone().unwrap_or_else(|| profile(0, false));
        if let Some(bio) = &update.bio {
            updated.bio = Some(bio.clone());
        }
        Ok(updated)
    }

    async fn list_conversations(&self) -> ClientResult<Vec<Conversation>> {
        self.check("list_conversations").await?;
        Ok(self.conversations.clone())
    }

    async fn create_conversation(&self, recipient_id: UserId) -> ClientResult<Conversation> {
        self.check(format!("create_conversation {}", recipient_id.0))
            .await?;
        Ok(conversation(recipient_id.0 + 100))
    }

    async fn list_messages(&self, conversation_id: ConversationId) -> ClientResult<Vec<Message>> {
        self.check(format!("list_messages {}", conversation_id.0))
            .await?;
        Ok(self.messages.clone())
    }

    async fn send_message(
        &self,
        conversation_id: ConversationId,
        new_message: &NewMessage,
    ) -> ClientResult<Message> {
        self.check(format!("send_message {}", conversation_id.0))
            .await?;
        Ok(message(50, 7, &new_message.body))
    }

    async fn list_notifications(&self) -> ClientResult<Vec<Notification>> {
        self.check("list_notifications").await?;
        Ok(self.notifications.clone())
    }

    async fn mark_notification_read(
        &self,
        notification_id: NotificationId,
    ) -> ClientResult<Notification> {
        self.check(format!("mark_read {}", notification_id.0))
            .await?;
        Ok(notification(
            notification_id.0,
            NotificationKind::Like,
            true,
        ))
    }
}

#[tokio::test]
async fn feed_renders_posts() {
    let api = StubApi {
        posts: vec![post(1, "first!", 2, true), post(2, "second", 0, false)],
        ..StubApi::default()
    };
    let mut page = FeedPage::new(None);

    page.load(&api).await;
    let text = page.render();

    assert!(text.starts_with("== Feed ==\n"));
    assert!(text.contains("[1] @alice · 2024-05-01 10:00"));
    assert!(text.contains("first!"));
    assert!(text.contains("♥ 2"));
    assert!(text.contains("♡ 0"));
}

#[tokio::test]
async fn feed_renders_empty_and_error_states() {
    let api = StubApi::default();
    let mut page = FeedPage::new(Some(UserId(7)));
    assert_eq!(page.render(), "== Posts by user #7 ==\n");

    page.load(&api).await;
    assert!(page.render().contains("No posts yet."));

    api.fail_next_calls(500, "Server exploded").await;
    page.load(&api).await;
    assert!(page.render().contains("Error: Server exploded"));
    assert_eq!(api.calls().await[0], "list_posts Some(UserId(7))");
}

#[tokio::test]
async fn toggle_like_patches_only_the_target_post() {
    let api = StubApi {
        posts: vec![post(1, "a", 2, false), post(2, "b", 5, false)],
        ..StubApi::default()
    };
    let mut page = FeedPage::new(None);
    page.load(&api).await;

    page.toggle_like(&api, PostId(1)).await.expect("like");

    let posts = page.posts.loaded().expect("loaded");
    assert!(posts[0].liked);
    assert_eq!(posts[0].likes_count, 3);
    assert!(!posts[1].liked);
    assert_eq!(posts[1].likes_count, 5);

    page.toggle_like(&api, PostId(1)).await.expect("unlike");
    let posts = page.posts.loaded().expect("loaded");
    assert!(!posts[0].liked);
    assert_eq!(posts[0].likes_count, 2);
    assert_eq!(api.calls().await[1..], ["like 1", "unlike 1"]);
}

#[tokio::test]
async fn reported_like_count_wins_over_local_arithmetic() {
    let api = StubApi {
        posts: vec![post(1, "a", 2, false)],
        like_response: Some(LikeStatus {
            liked: true,
            likes_count: Some(40),
        }),
        ..StubApi::default()
    };
    let mut page = FeedPage::new(None);
    page.load(&api).await;

    page.set_like(&api, PostId(1), true).await.expect("like");

    assert_eq!(page.posts.loaded().expect("loaded")[0].likes_count, 40);
}

#[test]
fn like_patch_saturates_and_ignores_unknown_posts() {
    let mut posts = vec![post(1, "a", 0, true)];
    let unliked = LikeStatus {
        liked: false,
        likes_count: None,
    };

    assert!(apply_like_status(&mut posts, PostId(1), unliked));
    assert_eq!(posts[0].likes_count, 0);
    assert!(!apply_like_status(&mut posts, PostId(99), unliked));

    // repeated like without a state change leaves the count alone
    let liked = LikeStatus {
        liked: true,
        likes_count: None,
    };
    apply_like_status(&mut posts, PostId(1), liked);
    apply_like_status(&mut posts, PostId(1), liked);
    assert_eq!(posts[0].likes_count, 1);
}

#[tokio::test]
async fn failed_like_leaves_posts_untouched() {
    let api = StubApi {
        posts: vec![post(1, "a", 2, false)],
        ..StubApi::default()
    };
    let mut page = FeedPage::new(None);
    page.load(&api).await;
    api.fail_next_calls(401, "Invalid token").await;

    let err = page
        .toggle_like(&api, PostId(1))
        .await
        .expect_err("must fail");

    assert!(err.requires_reauth());
    let posts = page.posts.loaded().expect("still loaded");
    assert!(!posts[0].liked);
    assert_eq!(posts[0].likes_count, 2);
    assert!(page.render().contains("! Invalid token"));
}

#[tokio::test]
async fn invalid_post_is_never_sent() {
    let api = StubApi::default();
    let mut page = FeedPage::new(None);
    page.load(&api).await;

    let err = page.submit_post(&api, "   ").await.expect_err("blank");

    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(page.error.as_deref(), Some("content: can't be blank"));
    assert_eq!(api.calls().await, ["list_posts None"]);
}

#[tokio::test]
async fn new_post_is_prepended_and_clears_error() {
    let api = StubApi {
        posts: vec![post(1, "older", 0, false)],
        ..StubApi::default()
    };
    let mut page = FeedPage::new(None);
    page.load(&api).await;
    page.error = Some("stale".into());

    page.submit_post(&api, "  fresh post ").await.expect("post");

    let posts = page.posts.loaded().expect("loaded");
    assert_eq!(posts[0].content, "fresh post");
    assert_eq!(posts[1].content, "older");
    assert_eq!(page.error, None);
}

#[tokio::test]
async fn users_page_tracks_follows() {
    let api = StubApi {
        users: vec![user(7, "alice"), user(9, "bob")],
        ..StubApi::default()
    };
    let mut page = UsersPage::new(Some(UserId(7)));
    page.load(&api).await;

    page.toggle_follow(&api, UserId(9)).await.expect("follow");
    let text = page.render();
    assert!(text.contains("[7] @alice (you)"));
    assert!(text.contains("[9] @bob (following)"));

    page.toggle_follow(&api, UserId(9)).await.expect("unfollow");
    assert!(page.render().contains("[9] @bob\n"));
    assert_eq!(api.calls().await[1..], ["follow 9", "unfollow 9"]);
}

#[tokio::test]
async fn profile_page_loads_profile_then_posts() {
    let api = StubApi {
        profile: Some(profile(10, false)),
        posts: vec![post(1, "bob's post", 0, false)],
        ..StubApi::default()
    };
    let mut page = ProfilePage::new();

    page.load(&api, ProfileId(4)).await;

    assert_eq!(
        api.calls().await,
        ["get_profile 4", "list_posts Some(UserId(9))"]
    );
    let text = page.render();
    assert!(text.starts_with("== Bob (@bob) ==\nGardener\n"));
    assert!(text.contains("10 followers · 3 following"));
    assert!(text.contains("-- Posts --"));
    assert!(text.contains("bob's post"));
}

#[tokio::test]
async fn profile_follow_patches_counter() {
    let api = StubApi {
        profile: Some(profile(10, false)),
        ..StubApi::default()
    };
    let mut page = ProfilePage::new();
    page.load(&api, ProfileId(4)).await;

    page.toggle_follow(&api).await.expect("follow");
    let loaded = page.profile.loaded().expect("loaded");
    assert!(loaded.following);
    assert_eq!(loaded.followers_count, 11);
    assert!(page.render().contains("11 followers · 3 following · you follow them"));

    page.toggle_follow(&api).await.expect("unfollow");
    assert_eq!(page.profile.loaded().expect("loaded").followers_count, 10);
}

#[tokio::test]
async fn missing_profile_renders_error_and_blocks_follow() {
    let api = StubApi::default();
    let mut page = ProfilePage::new();
    page.load(&api, ProfileId(4)).await;

    assert!(page.render().contains("Error: Profile not found"));
    assert_eq!(page.posts, Loadable::Idle);

    let err = page.toggle_follow(&api).await.expect_err("not loaded");
    assert!(matches!(err, ClientError::NotLoaded("profile")));
    assert_eq!(api.calls().await, ["get_profile 4"]);
}

#[tokio::test]
async fn profile_save_validates_then_replaces() {
    let api = StubApi {
        profile: Some(profile(1, false)),
        ..StubApi::default()
    };
    let mut page = ProfilePage::new();
    page.load(&api, ProfileId(4)).await;

    let err = page
        .save(
            &api,
            ProfileId(4),
            ProfileUpdate {
                website: Some("javascript:alert(1)".into()),
                ..ProfileUpdate::default()
            },
        )
        .await
        .expect_err("invalid");
    assert!(matches!(err, ClientError::Validation(_)));

    page.save(
        &api,
        ProfileId(4),
        ProfileUpdate {
            bio: Some("Beekeeper".into()),
            ..ProfileUpdate::default()
        },
    )
    .await
    .expect("save");
    assert_eq!(
        page.profile.loaded().and_then(|p| p.bio.as_deref()),
        Some("Beekeeper")
    );
    assert_eq!(api.calls().await.last().map(String::as_str), Some("update_profile 4"));
}

#[tokio::test]
async fn account_page_saves_user_update() {
    let api = StubApi::default();
    let mut page = AccountPage::new();
    page.load(&api, UserId(7)).await;
    assert!(page.render().contains("[7] @alice"));

    page.save(
        &api,
        UserId(7),
        UserUpdate {
            email: Some(" alice@new.example.com ".into()),
            ..UserUpdate::default()
        },
    )
    .await
    .expect("save");

    assert!(page.render().contains("Email: alice@new.example.com"));
}

#[tokio::test]
async fn notifications_mark_read_replaces_entry() {
    let api = StubApi {
        notifications: vec![
            notification(1, NotificationKind::Like, false),
            notification(2, NotificationKind::Follow, false),
        ],
        ..StubApi::default()
    };
    let mut page = NotificationsPage::new();
    page.load(&api).await;
    assert_eq!(page.unread_count(), 2);

    page.mark_read(&api, NotificationId(1)).await.expect("mark");

    assert_eq!(page.unread_count(), 1);
    let text = page.render();
    assert!(text.contains("1 unread"));
    assert!(text.contains("  [1] @bob liked your post"));
    assert!(text.contains("* [2] @bob started following you"));
}

#[tokio::test]
async fn empty_notifications_render_caught_up() {
    let api = StubApi::default();
    let mut page = NotificationsPage::new();
    page.load(&api).await;

    assert_eq!(
        page.render(),
        "== Notifications ==\n0 unread\nYou're all caught up.\n"
    );
}

#[tokio::test]
async fn starting_a_conversation_inserts_it_once() {
    let api = StubApi {
        conversations: vec![conversation(109)],
        ..StubApi::default()
    };
    let mut page = ConversationsPage::new(Some(UserId(7)));
    page.load(&api).await;

    // stub answers with id recipient + 100, already listed
    page.start(&api, UserId(9)).await.expect("start");
    assert_eq!(page.conversations.loaded().expect("loaded").len(), 1);

    page.start(&api, UserId(11)).await.expect("start");
    let items = page.conversations.loaded().expect("loaded");
    assert_eq!(items[0].id, ConversationId(111));
    assert!(page.render().contains("[109] @bob"));
}

#[tokio::test]
async fn sending_a_message_appends_it() {
    let api = StubApi {
        messages: vec![message(1, 9, "hi alice")],
        ..StubApi::default()
    };
    let mut page = ConversationPage::new(ConversationId(3), Some(UserId(7)));
    page.load(&api).await;

    page.send(&api, " hi bob ").await.expect("send");

    let text = page.render();
    assert!(text.starts_with("== Conversation #3 ==\n"));
    assert!(text.contains("2024-05-01 10:01 user #9: hi alice"));
    assert!(text.contains("you: hi bob"));
    assert_eq!(api.calls().await[1], "send_message 3");
}

#[tokio::test]
async fn login_form_saves_session() {
    let api = StubApi::default();
    let store = MemorySessionStore::new();
    let mut form = LoginForm::new("alice", "secret");

    let session = form.submit(&api, &store).await.expect("login");

    assert_eq!(store.load().expect("load"), Some(session.clone()));
    assert_eq!(api.current_session().await, Some(session));
}

#[tokio::test]
async fn failed_login_leaves_store_untouched() {
    let api = StubApi::default();
    api.fail_next_calls(401, "Invalid username or password").await;
    let store = MemorySessionStore::new();
    let mut form = LoginForm::new("alice", "wrong");

    form.submit(&api, &store).await.expect_err("must fail");

    assert_eq!(form.error.as_deref(), Some("Invalid username or password"));
    assert_eq!(store.load().expect("load"), None);
}

#[tokio::test]
async fn blank_login_is_not_sent() {
    let api = StubApi::default();
    let store = MemorySessionStore::new();
    let mut form = LoginForm::new("", "");

    form.submit(&api, &store).await.expect_err("must fail");

    assert!(api.calls().await.is_empty());
    assert_eq!(
        form.error.as_deref(),
        Some("username: can't be blank; password: can't be blank")
    );
}

#[tokio::test]
async fn register_without_token_does_not_sign_in() {
    let api = StubApi::default();
    let store = MemorySessionStore::new();
    let mut form = RegisterForm::new(RegistrationInput {
        username: "carol".into(),
        email: "carol@example.com".into(),
        password: "secret1".into(),
        password_confirmation: "secret1".into(),
    });

    let (response, session) = form.submit(&api, &store).await.expect("register");

    assert_eq!(response.user.username, "carol");
    assert_eq!(session, None);
    assert_eq!(store.load().expect("load"), None);
}

#[tokio::test]
async fn register_with_token_persists_session() {
    let api = StubApi {
        register_token: Some("fresh".into()),
        ..StubApi::default()
    };
    let store = MemorySessionStore::new();
    let mut form = RegisterForm::new(RegistrationInput {
        username: "carol".into(),
        email: "carol@example.com".into(),
        password: "secret1".into(),
        password_confirmation: "secret1".into(),
    });

    let (_, session) = form.submit(&api, &store).await.expect("register");

    let expected = Session {
        token: "fresh".into(),
        user_id: UserId(12),
    };
    assert_eq!(session, Some(expected.clone()));
    assert_eq!(store.load().expect("load"), Some(expected));
}

#[tokio::test]
async fn sign_out_clears_client_and_store() {
    let session = Session {
        token: "tok".into(),
        user_id: UserId(7),
    };
    let api = StubApi::default();
    api.set_session(Some(session.clone())).await;
    let store = MemorySessionStore::with_session(session);

    sign_out(&api, &store).await.expect("sign out");

    assert_eq!(api.current_session().await, None);
    assert_eq!(store.load().expect("load"), None);
}

#[tokio::test]
async fn failed_feed_refuses_like_and_post() {
    let api = StubApi {
        posts: vec![post(1, "a", 2, false)],
        ..StubApi::default()
    };
    api.fail_next_calls(500, "boom").await;
    let mut page = FeedPage::new(None);
    page.load(&api).await;
    *api.fail_with.lock().await = None;

    let err = page
        .set_like(&api, PostId(1), true)
        .await
        .expect_err("feed failed to load");
    assert!(matches!(err, ClientError::NotLoaded("feed")));
    let err = page.submit_post(&api, "hello").await.expect_err("feed failed");
    assert!(matches!(err, ClientError::NotLoaded("feed")));

    assert_eq!(api.calls().await, ["list_posts None"]);
    assert_eq!(page.posts, Loadable::Failed("boom".into()));
    assert!(page.render().contains("! The feed has not been loaded yet."));
}

#[tokio::test]
async fn failed_user_list_refuses_follow() {
    let api = StubApi::default();
    api.fail_next_calls(500, "boom").await;
    let mut page = UsersPage::new(Some(UserId(7)));
    page.load(&api).await;
    *api.fail_with.lock().await = None;

    let err = page
        .toggle_follow(&api, UserId(9))
        .await
        .expect_err("users failed to load");

    assert!(matches!(err, ClientError::NotLoaded("user list")));
    assert!(page.following.is_empty());
    assert_eq!(api.calls().await, ["list_users"]);
}

#[tokio::test]
async fn failed_notifications_refuse_mark_read() {
    let api = StubApi::default();
    api.fail_next_calls(503, "boom").await;
    let mut page = NotificationsPage::new();
    page.load(&api).await;
    *api.fail_with.lock().await = None;

    let err = page
        .mark_read(&api, NotificationId(1))
        .await
        .expect_err("notifications failed to load");

    assert!(matches!(err, ClientError::NotLoaded("notification list")));
    assert_eq!(api.calls().await, ["list_notifications"]);
}

#[tokio::test]
async fn failed_conversation_list_refuses_start() {
    let api = StubApi::default();
    api.fail_next_calls(500, "boom").await;
    let mut page = ConversationsPage::new(Some(UserId(7)));
    page.load(&api).await;
    *api.fail_with.lock().await = None;

    let err = page
        .start(&api, UserId(9))
        .await
        .expect_err("conversations failed to load");

    assert!(matches!(err, ClientError::NotLoaded("conversation list")));
    assert_eq!(api.calls().await, ["list_conversations"]);
}

#[tokio::test]
async fn failed_conversation_refuses_send() {
    let api = StubApi::default();
    api.fail_next_calls(404, "Conversation not found").await;
    let mut page = ConversationPage::new(ConversationId(3), Some(UserId(7)));
    page.load(&api).await;
    *api.fail_with.lock().await = None;

    let err = page.send(&api, "hi").await.expect_err("not loaded");

    assert!(matches!(err, ClientError::NotLoaded("conversation")));
    assert_eq!(api.calls().await, ["list_messages 3"]);
}

#[tokio::test]
async fn failed_account_refuses_save() {
    let api = StubApi::default();
    api.fail_next_calls(404, "User not found").await;
    let mut page = AccountPage::new();
    page.load(&api, UserId(7)).await;
    *api.fail_with.lock().await = None;

    let err = page
        .save(
            &api,
            UserId(7),
            UserUpdate {
                username: Some("alicia".into()),
                ..UserUpdate::default()
            },
        )
        .await
        .expect_err("not loaded");

    assert!(matches!(err, ClientError::NotLoaded("account")));
    assert_eq!(api.calls().await, ["get_user 7"]);
}

#[tokio::test]
async fn users_page_seeds_follows_from_listing() {
    let mut bob = user(9, "bob");
    bob.following = true;
    let api = StubApi {
        users: vec![user(7, "alice"), bob],
        ..StubApi::default()
    };
    let mut page = UsersPage::new(Some(UserId(7)));
    page.load(&api).await;

    assert!(page.render().contains("[9] @bob (following)"));

    page.toggle_follow(&api, UserId(9)).await.expect("unfollow");
    assert_eq!(api.calls().await[1..], ["unfollow 9"]);
    assert!(page.following.is_empty());
}

#[tokio::test]
async fn unsaved_login_signs_the_client_back_out() {
    let api = StubApi::default();
    let mut form = LoginForm::new("alice", "secret");

    let err = form
        .submit(&api, &ReadOnlyStore)
        .await
        .expect_err("store refuses");

    assert!(matches!(err, ClientError::Session(_)));
    assert_eq!(api.current_session().await, None);
    assert_eq!(
        form.error.as_deref(),
        Some("Could not access the saved session: read-only file system")
    );
}

#[tokio::test]
async fn unsaved_registration_signs_the_client_back_out() {
    let api = StubApi {
        register_token: Some("fresh".into()),
        ..StubApi::default()
    };
    api.set_session(Some(Session {
        token: "fresh".into(),
        user_id: UserId(12),
    }))
    .await;
    let mut form = RegisterForm::new(RegistrationInput {
        username: "carol".into(),
        email: "carol@example.com".into(),
        password: "secret1".into(),
        password_confirmation: "secret1".into(),
    });

    form.submit(&api, &ReadOnlyStore)
        .await
        .expect_err("store refuses");

    assert_eq!(api.current_session().await, None);
    assert!(form.error.is_some());
}
