use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{CACHE_CONTROL, HeaderValue},
    Client, Method, RequestBuilder,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ConversationId, NotificationId, PostId, ProfileId, Session, UserId},
    error::{ApiErrorBody, ApiException},
    protocol::{
        AuthResponse, Conversation, FollowRequest, FollowStatus, LikeRequest, LikeStatus,
        LoginRequest, Message, NewConversation, NewMessage, NewPost, Notification, Post, Profile,
        ProfileUpdate, RegisterRequest, RegisterResponse, User, UserUpdate,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub mod error;
pub mod session;
pub mod validation;
pub mod views;

pub use error::{ClientError, ClientResult, ErrorCategory};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_PLAIN_ERROR_CHARS: usize = 200;

/// Every backend call the pages make. One request per call, no retries.
#[async_trait]
pub trait SocialApi: Send + Sync {
    async fn current_session(&self) -> Option<Session>;
    async fn set_session(&self, session: Option<Session>);

    async fn login(&self, request: &LoginRequest) -> ClientResult<Session>;
    async fn register(&self, request: &RegisterRequest) -> ClientResult<RegisterResponse>;

    async fn list_posts(&self, author: Option<UserId>) -> ClientResult<Vec<Post>>;
    async fn create_post(&self, post: &NewPost) -> ClientResult<Post>;
    async fn like(&self, post_id: PostId) -> ClientResult<LikeStatus>;
    async fn unlike(&self, post_id: PostId) -> ClientResult<LikeStatus>;

    async fn follow(&self, user_id: UserId) -> ClientResult<FollowStatus>;
    async fn unfollow(&self, user_id: UserId) -> ClientResult<FollowStatus>;

    async fn list_users(&self) -> ClientResult<Vec<User>>;
    async fn get_user(&self, user_id: UserId) -> ClientResult<User>;
    async fn update_user(&self, user_id: UserId, update: &UserUpdate) -> ClientResult<User>;

    async fn get_profile(&self, profile_id: ProfileId) -> ClientResult<Profile>;
    async fn update_profile(
        &self,
        profile_id: ProfileId,
        update: &ProfileUpdate,
    ) -> ClientResult<Profile>;

    async fn list_conversations(&self) -> ClientResult<Vec<Conversation>>;
    async fn create_conversation(&self, recipient_id: UserId) -> ClientResult<Conversation>;
    async fn list_messages(&self, conversation_id: ConversationId) -> ClientResult<Vec<Message>>;
    async fn send_message(
        &self,
        conversation_id: ConversationId,
        message: &NewMessage,
    ) -> ClientResult<Message>;

    async fn list_notifications(&self) -> ClientResult<Vec<Notification>>;
    async fn mark_notification_read(
        &self,
        notification_id: NotificationId,
    ) -> ClientResult<Notification>;
}

pub struct SocialClient {
    http: Client,
    base_url: Url,
    session: RwLock<Option<Session>>,
}

impl SocialClient {
    pub fn new(server_url: &str) -> ClientResult<Self> {
        Self::with_timeout(server_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> ClientResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(server_url)?,
            session: RwLock::new(None),
        })
    }

    pub fn with_session(self, session: Option<Session>) -> Self {
        Self {
            session: RwLock::new(session),
            ..self
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn public_request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        Ok(self.http.request(method, self.endpoint(path)?))
    }

    async fn authed_request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = {
            let guard = self.session.read().await;
            guard
                .as_ref()
                .map(|session| session.token.clone())
                .ok_or(ClientError::NotSignedIn)?
        };
        Ok(self
            .http
            .request(method, self.endpoint(path)?)
            .bearer_auth(token))
    }

    async fn list_request(&self, path: &str) -> ClientResult<RequestBuilder> {
        Ok(self
            .authed_request(Method::GET, path)
            .await?
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store")))
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let request = builder.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        debug!(%method, %path, "sending request");

        let response = self.http.execute(request).await.map_err(|err| {
            warn!(%method, %path, error = %err, "request failed");
            ClientError::Network(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let fallback = status.canonical_reason().unwrap_or("Request failed");
            let err = error_from_response(status.as_u16(), &text, fallback);
            warn!(%method, %path, status = status.as_u16(), error = %err, "request rejected");
            return Err(err.into());
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            warn!(%method, %path, error = %err, "undecodable response body");
            ClientError::Decode(err.to_string())
        })
    }
}

/// Ensures the base path ends with `/` so relative joins keep any prefix
/// such as `/api`.
fn normalize_base_url(server_url: &str) -> ClientResult<Url> {
    let mut url = Url::parse(server_url.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn error_from_response(status: u16, text: &str, fallback: &str) -> ApiException {
    if let Ok(body) = serde_json::from_str::<ApiErrorBody>(text) {
        if body.summary().is_some() {
            return ApiException::from_body(status, &body, fallback);
        }
    }
    let text = text.trim();
    if !text.is_empty()
        && !text.starts_with('<')
        && !text.starts_with('{')
        && text.chars().count() <= MAX_PLAIN_ERROR_CHARS
    {
        return ApiException::new(status, text);
    }
    ApiException::new(status, fallback)
}

#[async_trait]
impl SocialApi for SocialClient {
    async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    async fn login(&self, request: &LoginRequest) -> ClientResult<Session> {
        let body: AuthResponse = self
            .execute(self.public_request(Method::POST, "/login")?.json(request))
            .await?;
        let session = Session {
            token: body.token,
            user_id: body.user_id,
        };
        self.set_session(Some(session.clone())).await;
        info!(user_id = session.user_id.0, "signed in");
        Ok(session)
    }

    async fn register(&self, request: &RegisterRequest) -> ClientResult<RegisterResponse> {
        let body: RegisterResponse = self
            .execute(self.public_request(Method::POST, "/users")?.json(request))
            .await?;
        if let Some(token) = &body.token {
            self.set_session(Some(Session {
                token: token.clone(),
                user_id: body.user.id,
            }))
            .await;
        }
        info!(user_id = body.user.id.0, "registered");
        Ok(body)
    }

    async fn list_posts(&self, author: Option<UserId>) -> ClientResult<Vec<Post>> {
        let mut builder = self.list_request("/posts").await?;
        if let Some(author) = author {
            builder = builder.query(&[("user_id", author.0)]);
        }
        self.execute(builder).await
    }

    async fn create_post(&self, post: &NewPost) -> ClientResult<Post> {
        self.execute(self.authed_request(Method::POST, "/posts").await?.json(post))
            .await
    }

    async fn like(&self, post_id: PostId) -> ClientResult<LikeStatus> {
        self.execute(
            self.authed_request(Method::POST, "/likes")
                .await?
                .json(&LikeRequest { post_id }),
        )
        .await
    }

    async fn unlike(&self, post_id: PostId) -> ClientResult<LikeStatus> {
        self.execute(
            self.authed_request(Method::DELETE, "/likes")
                .await?
                .json(&LikeRequest { post_id }),
        )
        .await
    }

    async fn follow(&self, user_id: UserId) -> ClientResult<FollowStatus> {
        self.execute(
            self.authed_request(Method::POST, "/follows")
                .await?
                .json(&FollowRequest {
                    followed_id: user_id,
                }),
        )
        .await
    }

    async fn unfollow(&self, user_id: UserId) -> ClientResult<FollowStatus> {
        self.execute(
            self.authed_request(Method::DELETE, "/follows")
                .await?
                .json(&FollowRequest {
                    followed_id: user_id,
                }),
        )
        .await
    }

    async fn list_users(&self) -> ClientResult<Vec<User>> {
        self.execute(self.list_request("/users").await?).await
    }

    async fn get_user(&self, user_id: UserId) -> ClientResult<User> {
        self.execute(
            self.authed_request(Method::GET, &format!("/users/{}", user_id.0))
                .await?,
        )
        .await
    }

    async fn update_user(&self, user_id: UserId, update: &UserUpdate) -> ClientResult<User> {
        self.execute(
            self.authed_request(Method::PUT, &format!("/users/{}", user_id.0))
                .await?
                .json(update),
        )
        .await
    }

    async fn get_profile(&self, profile_id: ProfileId) -> ClientResult<Profile> {
        self.execute(
            self.authed_request(Method::GET, &format!("/profiles/{}", profile_id.0))
                .await?,
        )
        .await
    }

    async fn update_profile(
        &self,
        profile_id: ProfileId,
        update: &ProfileUpdate,
    ) -> ClientResult<Profile> {
        self.execute(
            self.authed_request(Method::PUT, &format!("/profiles/{}", profile_id.0))
                .await?
                .json(update),
        )
        .await
    }

    async fn list_conversations(&self) -> ClientResult<Vec<Conversation>> {
        self.execute(self.list_request("/conversations").await?)
            .await
    }

    async fn create_conversation(&self, recipient_id: UserId) -> ClientResult<Conversation> {
        self.execute(
            self.authed_request(Method::POST, "/conversations")
                .await?
                .json(&NewConversation { recipient_id }),
        )
        .await
    }

    async fn list_messages(&self, conversation_id: ConversationId) -> ClientResult<Vec<Message>> {
        self.execute(
            self.list_request(&format!("/conversations/{}/messages", conversation_id.0))
                .await?,
        )
        .await
    }

    async fn send_message(
        &self,
        conversation_id: ConversationId,
        message: &NewMessage,
    ) -> ClientResult<Message> {
        self.execute(
            self.authed_request(
                Method::POST,
                &format!("/conversations/{}/messages", conversation_id.0),
            )
            .await?
            .json(message),
        )
        .await
    }

    async fn list_notifications(&self) -> ClientResult<Vec<Notification>> {
        self.execute(self.list_request("/notifications").await?)
            .await
    }

    async fn mark_notification_read(
        &self,
        notification_id: NotificationId,
    ) -> ClientResult<Notification> {
        self.execute(
            self.authed_request(
                Method::PUT,
                &format!("/notifications/{}/mark_as_read", notification_id.0),
            )
            .await?,
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
