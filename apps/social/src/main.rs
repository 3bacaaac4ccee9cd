use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    validation::RegistrationInput,
    views::{
        sign_out, AccountPage, ConversationPage, ConversationsPage, FeedPage, Loadable, LoginForm,
        NotificationsPage, ProfilePage, RegisterForm, UsersPage,
    },
    ClientError, FileSessionStore, SessionStore, SocialApi, SocialClient,
};
use shared::{
    domain::{ConversationId, NotificationId, PostId, ProfileId, Session, UserId},
    protocol::{ProfileUpdate, UserUpdate},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "social", about = "Terminal client for the social network backend")]
struct Cli {
    /// Backend base URL, e.g. http://127.0.0.1:3000
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Where the signed-in session is stored
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,
    /// Request timeout in seconds (at least 1)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "SOCIAL_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        password_confirmation: Option<String>,
    },
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "SOCIAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    Feed {
        /// Only show posts by this user
        #[arg(long)]
        user: Option<i64>,
    },
    Post {
        content: String,
    },
    Like {
        post_id: i64,
    },
    Unlike {
        post_id: i64,
    },
    Users,
    Follow {
        user_id: i64,
    },
    Unfollow {
        user_id: i64,
    },
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    Account {
        #[command(subcommand)]
        action: AccountCommand,
    },
    Conversations,
    Conversation {
        #[command(subcommand)]
        action: ConversationCommand,
    },
    Messages {
        conversation_id: i64,
    },
    Send {
        conversation_id: i64,
        text: String,
    },
    Notifications,
    Read {
        notification_id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show {
        profile_id: i64,
    },
    Edit {
        profile_id: i64,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
        #[arg(long)]
        website: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Show {
        user_id: i64,
    },
    Edit {
        user_id: i64,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConversationCommand {
    Start { user_id: i64 },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn action_error(err: ClientError) -> anyhow::Error {
    if err.requires_reauth() {
        anyhow!(
            "{} (run `social login` to sign in again)",
            err.display_message()
        )
    } else {
        anyhow!(err.display_message())
    }
}

/// Prints the page, then turns a failed load into a non-zero exit.
fn show<T>(rendered: String, state: &Loadable<T>) -> Result<()> {
    print!("{rendered}");
    match state {
        Loadable::Failed(message) => bail!("{message}"),
        _ => Ok(()),
    }
}

/// Refuses to run an action against a page that failed to load.
fn require_loaded<T>(rendered: impl FnOnce() -> String, state: &Loadable<T>) -> Result<()> {
    if let Loadable::Failed(message) = state {
        print!("{}", rendered());
        bail!("{message}");
    }
    Ok(())
}

fn finish<T>(rendered: String, outcome: Result<T, ClientError>) -> Result<()> {
    print!("{rendered}");
    outcome.map(|_| ()).map_err(action_error)
}

struct App {
    client: SocialClient,
    store: FileSessionStore,
}

impl App {
    fn new(settings: &Settings) -> Result<Self> {
        let session_path = match &settings.session_file {
            Some(path) => path.clone(),
            None => FileSessionStore::default_path()?,
        };
        let store = FileSessionStore::new(session_path);
        let session = store.load().context("failed to read saved session")?;
        let client = SocialClient::with_timeout(
            &settings.server_url,
            Duration::from_secs(settings.request_timeout_secs),
        )
        .with_context(|| format!("failed to set up client for {}", settings.server_url))?
        .with_session(session);
        Ok(Self { client, store })
    }

    async fn session(&self) -> Result<Session> {
        self.client
            .current_session()
            .await
            .ok_or_else(|| anyhow!("not signed in (run `social login` first)"))
    }

    async fn run(&self, command: Command) -> Result<()> {
        let api: &dyn SocialApi = &self.client;
        debug!(server = %self.client.base_url(), "running command");

        match command {
            Command::Register {
                username,
                email,
                password,
                password_confirmation,
            } => {
                let password_confirmation =
                    password_confirmation.unwrap_or_else(|| password.clone());
                let mut form = RegisterForm::new(RegistrationInput {
                    username,
                    email,
                    password,
                    password_confirmation,
                });
                let (response, session) = form
                    .submit(api, &self.store)
                    .await
                    .map_err(|err| anyhow!(err.display_message()))?;
                println!(
                    "Registered @{} (user #{}).",
                    response.user.username, response.user.id.0
                );
                match session {
                    Some(_) => println!("Signed in."),
                    None => println!("Run `social login` to sign in."),
                }
                Ok(())
            }
            Command::Login { username, password } => {
                let mut form = LoginForm::new(username, password);
                let session = form
                    .submit(api, &self.store)
                    .await
                    .map_err(|err| anyhow!(err.display_message()))?;
                println!("Signed in as user #{}.", session.user_id.0);
                Ok(())
            }
            Command::Logout => {
                sign_out(api, &self.store).await.map_err(action_error)?;
                println!("Signed out.");
                Ok(())
            }
            Command::Whoami => {
                match self.client.current_session().await {
                    Some(session) => println!(
                        "Signed in as user #{} (session at {}).",
                        session.user_id.0,
                        self.store.path().display()
                    ),
                    None => println!("Not signed in."),
                }
                Ok(())
            }
            Command::Feed { user } => {
                self.session().await?;
                let mut page = FeedPage::new(user.map(UserId));
                page.load(api).await;
                show(page.render(), &page.posts)
            }
            Command::Post { content } => {
                self.session().await?;
                let mut page = FeedPage::new(None);
                page.load(api).await;
                require_loaded(|| page.render(), &page.posts)?;
                let outcome = page.submit_post(api, &content).await;
                finish(page.render(), outcome)
            }
            Command::Like { post_id } => self.run_like(api, PostId(post_id), true).await,
            Command::Unlike { post_id } => self.run_like(api, PostId(post_id), false).await,
            Command::Users => {
                let session = self.session().await?;
                let mut page = UsersPage::new(Some(session.user_id));
                page.load(api).await;
                show(page.render(), &page.users)
            }
            Command::Follow { user_id } => self.run_follow(api, UserId(user_id), true).await,
            Command::Unfollow { user_id } => self.run_follow(api, UserId(user_id), false).await,
            Command::Profile { action } => self.run_profile(api, action).await,
            Command::Account { action } => self.run_account(api, action).await,
            Command::Conversations => {
                let session = self.session().await?;
                let mut page = ConversationsPage::new(Some(session.user_id));
                page.load(api).await;
                show(page.render(), &page.conversations)
            }
            Command::Conversation {
                action: ConversationCommand::Start { user_id },
            } => {
                let session = self.session().await?;
                let mut page = ConversationsPage::new(Some(session.user_id));
                page.load(api).await;
                require_loaded(|| page.render(), &page.conversations)?;
                let outcome = page.start(api, UserId(user_id)).await;
                finish(page.render(), outcome)
            }
            Command::Messages { conversation_id } => {
                let session = self.session().await?;
                let mut page =
                    ConversationPage::new(ConversationId(conversation_id), Some(session.user_id));
                page.load(api).await;
                show(page.render(), &page.messages)
            }
            Command::Send {
                conversation_id,
                text,
            } => {
                let session = self.session().await?;
                let mut page =
                    ConversationPage::new(ConversationId(conversation_id), Some(session.user_id));
                page.load(api).await;
                require_loaded(|| page.render(), &page.messages)?;
                let outcome = page.send(api, &text).await;
                finish(page.render(), outcome)
            }
            Command::Notifications => {
                self.session().await?;
                let mut page = NotificationsPage::new();
                page.load(api).await;
                show(page.render(), &page.notifications)
            }
            Command::Read { notification_id } => {
                self.session().await?;
                let mut page = NotificationsPage::new();
                page.load(api).await;
                require_loaded(|| page.render(), &page.notifications)?;
                let outcome = page.mark_read(api, NotificationId(notification_id)).await;
                finish(page.render(), outcome)
            }
        }
    }

    async fn run_like(&self, api: &dyn SocialApi, post_id: PostId, like: bool) -> Result<()> {
        self.session().await?;
        let mut page = FeedPage::new(None);
        page.load(api).await;
        require_loaded(|| page.render(), &page.posts)?;
        let outcome = page.set_like(api, post_id, like).await;
        finish(page.render(), outcome)
    }

    async fn run_follow(&self, api: &dyn SocialApi, user_id: UserId, follow: bool) -> Result<()> {
        let session = self.session().await?;
        let mut page = UsersPage::new(Some(session.user_id));
        page.load(api).await;
        require_loaded(|| page.render(), &page.users)?;
        let outcome = page.set_follow(api, user_id, follow).await;
        finish(page.render(), outcome)
    }

    async fn run_profile(&self, api: &dyn SocialApi, action: ProfileCommand) -> Result<()> {
        self.session().await?;
        let mut page = ProfilePage::new();
        match action {
            ProfileCommand::Show { profile_id } => {
                page.load(api, ProfileId(profile_id)).await;
                show(page.render(), &page.profile)
            }
            ProfileCommand::Edit {
                profile_id,
                display_name,
                bio,
                avatar_url,
                website,
            } => {
                page.load(api, ProfileId(profile_id)).await;
                require_loaded(|| page.render(), &page.profile)?;
                let update = ProfileUpdate {
                    display_name,
                    bio,
                    avatar_url,
                    website,
                };
                let outcome = page.save(api, ProfileId(profile_id), update).await;
                finish(page.render(), outcome)
            }
        }
    }

    async fn run_account(&self, api: &dyn SocialApi, action: AccountCommand) -> Result<()> {
        self.session().await?;
        let mut page = AccountPage::new();
        match action {
            AccountCommand::Show { user_id } => {
                page.load(api, UserId(user_id)).await;
                show(page.render(), &page.user)
            }
            AccountCommand::Edit {
                user_id,
                username,
                email,
            } => {
                page.load(api, UserId(user_id)).await;
                require_loaded(|| page.render(), &page.user)?;
                let outcome = page
                    .save(api, UserId(user_id), UserUpdate { username, email })
                    .await;
                finish(page.render(), outcome)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings =
        load_settings().with_overrides(cli.server_url, cli.session_file, cli.timeout_secs);
    debug!(?settings, "loaded settings");

    let app = App::new(&settings)?;
    app.run(cli.command).await
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
