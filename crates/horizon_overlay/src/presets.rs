//! Ready-made overlays and the built-in tag set.

use crate::overlay::{Line, Overlay, Tag};
use horizon_host::{ClientDirectory, ClientKey};
use std::sync::Arc;

/// Names of the tags [`builtin_tag`] knows how to build.
pub const BUILTIN_TAGS: &[&str] = &["player", "client", "online", "max_players", "time", "date"];

/// Host data the built-in tags read from.
#[derive(Clone)]
pub struct TagSources {
    pub clients: Arc<dyn ClientDirectory>,
    pub max_players: usize,
}

impl TagSources {
    pub fn new(clients: Arc<dyn ClientDirectory>, max_players: usize) -> Self {
        Self {
            clients,
            max_players,
        }
    }
}

/// Builds the built-in tag called `name`.
pub fn builtin_tag(name: &str, sources: &TagSources) -> Option<Tag> {
    let tag = match name {
        "player" => {
            let clients = sources.clients.clone();
            Tag::new("player", "Player name", move |client: &ClientKey| {
                clients
                    .display_name(client)
                    .unwrap_or_else(|| "unknown".to_string())
            })
        }
        "client" => Tag::new("client", "Client key", |client: &ClientKey| *client),
        "online" => {
            let clients = sources.clients.clone();
            Tag::new("online", "Online player count", move |_: &ClientKey| {
                clients.online_count()
            })
        }
        "max_players" => {
            let max_players = sources.max_players;
            Tag::new("max_players", "Maximum player count", move |_: &ClientKey| {
                max_players
            })
        }
        "time" => Tag::new("time", "Current time", |_: &ClientKey| {
            chrono::Local::now().format("%H:%M:%S")
        }),
        "date" => Tag::new("date", "Current date", |_: &ClientKey| {
            chrono::Local::now().format("%Y-%m-%d")
        }),
        _ => return None,
    };
    Some(tag)
}

/// An empty overlay with default settings.
pub fn basic(id: impl Into<String>, title: impl Into<String>, owner: impl Into<String>) -> Overlay {
    Overlay::new(id, title, owner)
}

/// An overlay whose lines are given top to bottom; the first line gets the
/// highest score and the last line a score of 1.
pub fn with_lines<I, S>(
    id: impl Into<String>,
    title: impl Into<String>,
    owner: impl Into<String>,
    templates: I,
) -> Overlay
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let templates: Vec<String> = templates.into_iter().map(Into::into).collect();
    let count = templates.len() as i32;
    Overlay::builder(id, title, owner)
        .lines(
            templates
                .into_iter()
                .zip((1..=count).rev())
                .map(|(template, score)| Line::new(template, score)),
        )
        .build()
}

/// An overlay pre-loaded with the per-player tags `{player}` and `{client}`.
pub fn player_info(
    id: impl Into<String>,
    title: impl Into<String>,
    owner: impl Into<String>,
    sources: &TagSources,
) -> Overlay {
    with_builtin_tags(basic(id, title, owner), &["player", "client"], sources)
}

/// An overlay pre-loaded with the server tags `{online}`, `{max_players}`,
/// `{time}` and `{date}`.
pub fn server_info(
    id: impl Into<String>,
    title: impl Into<String>,
    owner: impl Into<String>,
    sources: &TagSources,
) -> Overlay {
    with_builtin_tags(
        basic(id, title, owner),
        &["online", "max_players", "time", "date"],
        sources,
    )
}

fn with_builtin_tags(overlay: Overlay, names: &[&str], sources: &TagSources) -> Overlay {
    for tag in names.iter().filter_map(|name| builtin_tag(name, sources)) {
        overlay.add_tag(tag);
    }
    overlay
}
