//! Overlay definitions and per-client rendering.
//!
//! An [`Overlay`] is shared by every client that views it. It never stores
//! anything per client; the viewing client is only passed in at render time
//! so tag providers can compute client-specific values.

use horizon_host::ClientKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Refresh interval used when nothing else is configured (one second at 20 TPS).
pub const DEFAULT_REFRESH_INTERVAL: u64 = 20;

/// One row template of an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Text with optional `{tag}` placeholders
    pub template: String,
    /// Score sent with the row; higher scores sit higher on the sidebar
    pub score: i32,
    /// Invisible lines stay stored but are skipped when rendering
    pub visible: bool,
}

impl Line {
    pub fn new(template: impl Into<String>, score: i32) -> Self {
        Self {
            template: template.into(),
            score,
            visible: true,
        }
    }

    pub fn hidden(template: impl Into<String>, score: i32) -> Self {
        Self {
            visible: false,
            ..Self::new(template, score)
        }
    }
}

/// Computes a tag's value for the viewing client.
pub type TagProvider = Arc<dyn Fn(&ClientKey) -> String + Send + Sync>;

/// A named placeholder whose value is computed at render time.
#[derive(Clone)]
pub struct Tag {
    name: String,
    description: String,
    provider: TagProvider,
}

impl Tag {
    pub fn new<F, V>(name: impl Into<String>, description: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&ClientKey) -> V + Send + Sync + 'static,
        V: ToString,
    {
        Self {
            name: name.into(),
            description: description.into(),
            provider: Arc::new(move |client| provider(client).to_string()),
        }
    }

    /// A tag that always renders the same text.
    pub fn fixed(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(name, "Fixed text", move |_| value.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The literal placeholder this tag replaces, e.g. `{player}`.
    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.name)
    }

    pub fn value(&self, client: &ClientKey) -> String {
        (self.provider)(client)
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("provider", &"[provider]")
            .finish()
    }
}

/// A rendered row ready for the display renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedLine {
    pub text: String,
    pub score: i32,
}

#[derive(Debug)]
struct OverlayState {
    title: String,
    lines: Vec<Line>,
    tags: Vec<Tag>,
    priority: i32,
    auto_refresh: bool,
    refresh_interval: u64,
    auto_display: bool,
}

/// A named sidebar definition.
///
/// The id and owner are fixed at construction. Everything else can be
/// changed while clients are viewing it; changes show up on the next render.
#[derive(Debug)]
pub struct Overlay {
    id: String,
    owner: String,
    state: RwLock<OverlayState>,
}

impl Overlay {
    /// Creates an overlay with default settings (priority 0, auto-refresh
    /// every [`DEFAULT_REFRESH_INTERVAL`] ticks, auto-display on).
    pub fn new(id: impl Into<String>, title: impl Into<String>, owner: impl Into<String>) -> Self {
        OverlayBuilder::new(id, title, owner).build()
    }

    pub fn builder(
        id: impl Into<String>,
        title: impl Into<String>,
        owner: impl Into<String>,
    ) -> OverlayBuilder {
        OverlayBuilder::new(id, title, owner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn title(&self) -> String {
        self.state.read().title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state.write().title = title.into();
    }

    pub fn priority(&self) -> i32 {
        self.state.read().priority
    }

    pub fn set_priority(&self, priority: i32) {
        self.state.write().priority = priority;
    }

    pub fn auto_refresh(&self) -> bool {
        self.state.read().auto_refresh
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.state.write().auto_refresh = enabled;
    }

    /// Ticks between refreshes while auto-refresh is on.
    pub fn refresh_interval(&self) -> u64 {
        self.state.read().refresh_interval
    }

    pub fn set_refresh_interval(&self, ticks: u64) {
        self.state.write().refresh_interval = ticks;
    }

    pub fn auto_display(&self) -> bool {
        self.state.read().auto_display
    }

    pub fn set_auto_display(&self, enabled: bool) {
        self.state.write().auto_display = enabled;
    }

    pub fn lines(&self) -> Vec<Line> {
        self.state.read().lines.clone()
    }

    pub fn add_line(&self, line: Line) {
        self.state.write().lines.push(line);
    }

    pub fn set_lines(&self, lines: Vec<Line>) {
        self.state.write().lines = lines;
    }

    pub fn clear_lines(&self) {
        self.state.write().lines.clear();
    }

    /// Shows or hides the line at `index`. Returns `false` if out of range.
    pub fn set_line_visible(&self, index: usize, visible: bool) -> bool {
        match self.state.write().lines.get_mut(index) {
            Some(line) => {
                line.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Adds a tag, replacing any existing tag with the same name.
    ///
    /// Returns `true` if the name was new.
    pub fn add_tag(&self, tag: Tag) -> bool {
        let mut state = self.state.write();
        match state.tags.iter_mut().find(|existing| existing.name == tag.name) {
            Some(existing) => {
                *existing = tag;
                false
            }
            None => {
                state.tags.push(tag);
                true
            }
        }
    }

    pub fn remove_tag(&self, name: &str) -> bool {
        let mut state = self.state.write();
        let before = state.tags.len();
        state.tags.retain(|tag| tag.name != name);
        state.tags.len() != before
    }

    pub fn tag(&self, name: &str) -> Option<Tag> {
        self.state
            .read()
            .tags
            .iter()
            .find(|tag| tag.name == name)
            .cloned()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.state
            .read()
            .tags
            .iter()
            .map(|tag| tag.name.clone())
            .collect()
    }

    /// Renders every visible line for `client`, in stored order.
    ///
    /// Each `{name}` placeholder naming a registered tag is replaced by the
    /// tag's value; unknown placeholders are left as written. Substituted
    /// values are never scanned again. A tag is evaluated at most once per
    /// call, and only if some visible line uses it.
    pub fn render(&self, client: &ClientKey) -> Vec<RenderedLine> {
        // Snapshot so providers run without the overlay locked.
        let (lines, tags) = {
            let state = self.state.read();
            (state.lines.clone(), state.tags.clone())
        };

        let mut values: HashMap<String, String> = HashMap::new();
        lines
            .iter()
            .filter(|line| line.visible)
            .map(|line| RenderedLine {
                text: substitute(&line.template, |name| {
                    if let Some(value) = values.get(name) {
                        return Some(value.clone());
                    }
                    let tag = tags.iter().find(|tag| tag.name == name)?;
                    let value = tag.value(client);
                    values.insert(name.to_string(), value.clone());
                    Some(value)
                }),
                score: line.score,
            })
            .collect()
    }
}

/// Single left-to-right pass over `template`, replacing `{name}` tokens that
/// `lookup` knows about.
fn substitute(template: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(['{', '}']) {
            Some(close) if after[close..].starts_with('}') => {
                let name = &after[..close];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Builder for [`Overlay`].
#[derive(Debug)]
pub struct OverlayBuilder {
    id: String,
    owner: String,
    state: OverlayState,
}

impl OverlayBuilder {
    pub fn new(id: impl Into<String>, title: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            state: OverlayState {
                title: title.into(),
                lines: Vec::new(),
                tags: Vec::new(),
                priority: 0,
                auto_refresh: true,
                refresh_interval: DEFAULT_REFRESH_INTERVAL,
                auto_display: true,
            },
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.state.priority = priority;
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.state.auto_refresh = enabled;
        self
    }

    pub fn refresh_interval(mut self, ticks: u64) -> Self {
        self.state.refresh_interval = ticks;
        self
    }

    pub fn auto_display(mut self, enabled: bool) -> Self {
        self.state.auto_display = enabled;
        self
    }

    pub fn line(mut self, template: impl Into<String>, score: i32) -> Self {
        self.state.lines.push(Line::new(template, score));
        self
    }

    pub fn lines(mut self, lines: impl IntoIterator<Item = Line>) -> Self {
        self.state.lines.extend(lines);
        self
    }

    /// Adds a tag; a later tag with the same name replaces the earlier one.
    pub fn tag(mut self, tag: Tag) -> Self {
        self.state.tags.retain(|existing| existing.name != tag.name);
        self.state.tags.push(tag);
        self
    }

    pub fn build(self) -> Overlay {
        Overlay {
            id: self.id,
            owner: self.owner,
            state: RwLock::new(self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_tag(name: &str, value: &'static str, calls: &Arc<AtomicUsize>) -> Tag {
        let calls = calls.clone();
        Tag::new(name, "counted", move |_: &ClientKey| {
            calls.fetch_add(1, Ordering::SeqCst);
            value
        })
    }

    #[test]
    fn test_tags_are_substituted() {
        let player_calls = Arc::new(AtomicUsize::new(0));
        let hp_calls = Arc::new(AtomicUsize::new(0));
        let overlay = Overlay::builder("stats", "Stats", "test")
            .line("{player} has {hp} HP", 1)
            .tag(counting_tag("player", "Alice", &player_calls))
            .tag(counting_tag("hp", "20", &hp_calls))
            .build();

        let rendered = overlay.render(&ClientKey::new());

        assert_eq!(
            rendered,
            vec![RenderedLine {
                text: "Alice has 20 HP".to_string(),
                score: 1
            }]
        );
        assert_eq!(player_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hp_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tags_evaluated_once_per_render() {
        let calls = Arc::new(AtomicUsize::new(0));
        let overlay = Overlay::builder("twice", "T", "test")
            .line("{name} / {name}", 2)
            .line("again {name}", 1)
            .line("unused", 0)
            .tag(counting_tag("name", "Bob", &calls))
            .tag(counting_tag("idle", "x", &calls))
            .build();

        let rendered = overlay.render(&ClientKey::new());
        assert_eq!(rendered[0].text, "Bob / Bob");
        assert_eq!(rendered[1].text, "again Bob");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        overlay.render(&ClientKey::new());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_and_malformed_placeholders_are_literal() {
        let overlay = Overlay::builder("odd", "Odd", "test")
            .line("{missing} {{player}} {player", 1)
            .tag(Tag::fixed("player", "Eve"))
            .build();

        let rendered = overlay.render(&ClientKey::new());
        assert_eq!(rendered[0].text, "{missing} {Eve} {player");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let overlay = Overlay::builder("nested", "N", "test")
            .line("{a}", 1)
            .tag(Tag::fixed("a", "{b}"))
            .tag(Tag::fixed("b", "boom"))
            .build();

        assert_eq!(overlay.render(&ClientKey::new())[0].text, "{b}");
    }

    #[test]
    fn test_invisible_lines_are_skipped_not_dropped() {
        let overlay = Overlay::builder("vis", "V", "test")
            .line("top", 3)
            .lines([Line::hidden("secret", 2)])
            .line("bottom", 1)
            .build();

        let texts: Vec<String> = overlay
            .render(&ClientKey::new())
            .into_iter()
            .map(|line| line.text)
            .collect();
        assert_eq!(texts, vec!["top", "bottom"]);
        assert_eq!(overlay.lines().len(), 3);

        assert!(overlay.set_line_visible(1, true));
        assert!(!overlay.set_line_visible(9, true));
        assert_eq!(overlay.render(&ClientKey::new()).len(), 3);
    }

    #[test]
    fn test_tag_names_stay_unique() {
        let overlay = Overlay::new("tags", "Tags", "test");
        assert!(overlay.add_tag(Tag::fixed("x", "1")));
        assert!(!overlay.add_tag(Tag::fixed("x", "2")));
        assert_eq!(overlay.tag_names(), vec!["x"]);
        assert_eq!(overlay.tag("x").unwrap().value(&ClientKey::new()), "2");
        assert_eq!(overlay.tag("x").unwrap().placeholder(), "{x}");

        assert!(overlay.remove_tag("x"));
        assert!(!overlay.remove_tag("x"));
    }

    #[test]
    fn test_builder_defaults() {
        let overlay = Overlay::new("defaults", "Defaults", "core");
        assert_eq!(overlay.priority(), 0);
        assert!(overlay.auto_refresh());
        assert_eq!(overlay.refresh_interval(), DEFAULT_REFRESH_INTERVAL);
        assert!(overlay.auto_display());
        assert_eq!(overlay.owner(), "core");
    }

    #[test]
    fn test_provider_sees_viewing_client() {
        let overlay = Overlay::builder("who", "Who", "test")
            .line("{client}", 1)
            .tag(Tag::new("client", "Client key", |client: &ClientKey| *client))
            .build();

        let client = ClientKey::new();
        assert_eq!(overlay.render(&client)[0].text, client.to_string());
    }
}
