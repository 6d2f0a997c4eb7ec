use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use campus_cli::fixture::Fixture;
use campus_cli::tracing_setup::init_tracing;
use campus_core::models::{AppState, FeedMode, Post};
use campus_core::store::MemoryStore;
use campus_core::{CoreConfig, CoreEvent, CoreRuntime};

#[derive(Parser)]
#[command(name = "campus-cli")]
#[command(about = "Inspect a campus session against a fixture-backed store")]
struct Cli {
    /// JSON fixture with the identity and seed documents
    #[arg(long, short = 'f')]
    fixture: PathBuf,

    /// Where preferences are kept (defaults to the platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved scope
    Scope,

    /// Ranked feed for the fixture identity
    Feed {
        /// latest | for-you (defaults to the saved preference)
        #[arg(long, short = 'm')]
        mode: Option<String>,
    },

    /// Persist the default feed mode
    SetFeedMode { mode: String },

    /// Story tray entities
    Stories,

    /// Conversations by latest activity
    Conversations,

    /// Notices, newest first
    Notices,

    /// Groups in scope
    Groups,

    /// Department channels visible to the fixture identity
    Channels,

    /// React to a post as the fixture identity
    React {
        post_id: String,
        reaction_type: String,
    },

    /// Remove the fixture identity's reaction from a post
    Unreact { post_id: String },

    /// Deliver a message while backgrounded and show the local notifications raised
    Notify {
        conversation_id: String,
        sender_id: String,
        text: String,
    },

    /// Snapshot delivery counters
    Stats,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn data_dir(cli: &Cli) -> PathBuf {
    cli.data_dir
        .clone()
        .or_else(|| dirs::data_local_dir().map(|dir| dir.join("campus")))
        .unwrap_or_else(|| PathBuf::from("campus_data"))
}

async fn run(cli: Cli) -> Result<()> {
    let fixture = Fixture::load(&cli.fixture)?;
    let store = Arc::new(MemoryStore::new());
    fixture.seed(&store)?;

    let mut runtime = CoreRuntime::new(CoreConfig::new(data_dir(&cli)), store)?;
    let events = runtime.set_identity(Some(fixture.identity.clone()))?;
    if let Some(CoreEvent::SessionTerminated { user_id }) = events.first() {
        print_json(&json!({"terminated": true, "userId": user_id}), cli.pretty)?;
        std::process::exit(2);
    }
    runtime.process_pending();

    match cli.command {
        Commands::Scope => {
            let identity = runtime.signed_in()?;
            print_json(
                &json!({
                    "userId": identity.id,
                    "scope": runtime.scope().to_string(),
                    "collegeId": runtime.scope().college_id(),
                    "approved": identity.approved,
                }),
                cli.pretty,
            )?;
        }
        Commands::Feed { mode } => {
            let mode = match mode {
                Some(mode) => parse_mode(&mode)?,
                None => runtime.feed_mode(),
            };
            let posts: Vec<_> = runtime.current_feed(mode).iter().map(feed_item).collect();
            print_json(&json!({"mode": mode.label(), "posts": posts}), cli.pretty)?;
        }
        Commands::SetFeedMode { mode } => {
            let mode = parse_mode(&mode)?;
            runtime.set_feed_mode(mode);
            print_json(&json!({"mode": mode.label()}), cli.pretty)?;
        }
        Commands::Stories => print_json(&runtime.story_entities(), cli.pretty)?,
        Commands::Conversations => print_json(&runtime.conversations(), cli.pretty)?,
        Commands::Notices => print_json(&runtime.notices(), cli.pretty)?,
        Commands::Groups => print_json(&runtime.groups(), cli.pretty)?,
        Commands::Channels => print_json(&runtime.department_channels(), cli.pretty)?,
        Commands::React {
            post_id,
            reaction_type,
        } => {
            let user_id = runtime.signed_in()?.id.clone();
            let outcome = runtime
                .intents()
                .react(&post_id, &reaction_type, &user_id)
                .await?;
            runtime.process_pending();
            print_reactions(&runtime, &post_id, format!("{:?}", outcome), cli.pretty)?;
        }
        Commands::Unreact { post_id } => {
            let user_id = runtime.signed_in()?.id.clone();
            let outcome = runtime.intents().unreact(&post_id, &user_id).await?;
            runtime.process_pending();
            print_reactions(&runtime, &post_id, format!("{:?}", outcome), cli.pretty)?;
        }
        Commands::Notify {
            conversation_id,
            sender_id,
            text,
        } => {
            runtime.on_local_notification(|n| {
                tracing::info!("notify: {} in {}: {}", n.sender_name, n.conversation_id, n.text);
            });
            runtime.set_app_state(AppState::Background);
            runtime
                .intents()
                .send_message(&conversation_id, &sender_id, &text)
                .await?;
            let notifications: Vec<_> = runtime
                .process_pending()
                .into_iter()
                .filter_map(|event| match event {
                    CoreEvent::LocalNotification(n) => Some(n),
                    _ => None,
                })
                .collect();
            print_json(&notifications, cli.pretty)?;
        }
        Commands::Stats => print_json(&runtime.stats().summary(), cli.pretty)?,
    }

    runtime.shutdown();
    Ok(())
}

fn parse_mode(value: &str) -> Result<FeedMode> {
    FeedMode::parse(value)
        .ok_or_else(|| anyhow!("unknown feed mode '{}' (latest | for-you)", value))
}

fn feed_item(post: &Post) -> serde_json::Value {
    json!({
        "id": post.id,
        "authorId": post.author_id,
        "groupId": post.group_id,
        "postedAt": posted_at(post.timestamp),
        "content": post.content,
        "reactions": post.reactions.counts(),
        "comments": post.comments.len(),
    })
}

fn posted_at(timestamp: u64) -> Option<String> {
    chrono::DateTime::<chrono::Utc>::from_timestamp(timestamp as i64, 0).map(|d| d.to_rfc3339())
}

fn print_reactions(
    runtime: &CoreRuntime,
    post_id: &str,
    outcome: String,
    pretty: bool,
) -> Result<()> {
    let data_store = runtime.data_store();
    let store = data_store.borrow();
    let post = store
        .post(post_id)
        .with_context(|| format!("post {} is not in scope", post_id))?;
    let output = json!({"outcome": outcome, "reactions": post.reactions.counts()});
    print_json(&output, pretty)
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}
