use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(PostId);
id_newtype!(ConversationId);
id_newtype!(MessageId);
id_newtype!(NotificationId);
id_newtype!(ProfileId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Follow,
    Message,
    Mention,
    #[serde(other)]
    Other,
}

impl NotificationKind {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Like => "liked your post",
            Self::Follow => "started following you",
            Self::Message => "sent you a message",
            Self::Mention => "mentioned you",
            Self::Other => "did something",
        }
    }
}

/// Bearer token and user id of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
}
