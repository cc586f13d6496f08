//! Serializable overlay definitions for configuration files.
//!
//! A definition lists its lines top to bottom and names the built-in tags it
//! uses. Custom tag providers cannot be expressed in configuration, so only
//! built-in tags survive [`OverlayDefinition::from_overlay`].

use crate::error::OverlayError;
use crate::overlay::{Line, Overlay};
use crate::presets::{builtin_tag, TagSources, BUILTIN_TAGS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_owner() -> String {
    "config".to_string()
}

fn default_true() -> bool {
    true
}

/// One `[[overlay]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayDefinition {
    pub id: String,
    pub title: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
    /// Falls back to the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u64>,
    #[serde(default = "default_true")]
    pub auto_display: bool,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl OverlayDefinition {
    pub fn validate(&self) -> Result<(), OverlayError> {
        if self.id.trim().is_empty() {
            return Err(OverlayError::EmptyId);
        }

        if self.refresh_interval == Some(0) {
            return Err(OverlayError::InvalidRefreshInterval {
                id: self.id.clone(),
            });
        }

        let mut seen = HashSet::new();
        for tag in &self.tags {
            if !seen.insert(tag.as_str()) {
                return Err(OverlayError::DuplicateTag {
                    id: self.id.clone(),
                    tag: tag.clone(),
                });
            }
            if !BUILTIN_TAGS.contains(&tag.as_str()) {
                return Err(OverlayError::UnknownTag {
                    id: self.id.clone(),
                    tag: tag.clone(),
                });
            }
        }

        Ok(())
    }

    /// Validates and builds the overlay.
    pub fn into_overlay(
        &self,
        sources: &TagSources,
        default_refresh_interval: u64,
    ) -> Result<Overlay, OverlayError> {
        self.validate()?;

        let count = self.lines.len() as i32;
        let mut builder = Overlay::builder(&self.id, &self.title, &self.owner)
            .priority(self.priority)
            .auto_refresh(self.auto_refresh)
            .refresh_interval(self.refresh_interval.unwrap_or(default_refresh_interval))
            .auto_display(self.auto_display)
            .lines(
                self.lines
                    .iter()
                    .zip((1..=count).rev())
                    .map(|(template, score)| Line::new(template.as_str(), score)),
            );

        for name in &self.tags {
            if let Some(tag) = builtin_tag(name, sources) {
                builder = builder.tag(tag);
            }
        }

        Ok(builder.build())
    }

    /// Captures an overlay so it can be written back to configuration.
    ///
    /// Invisible lines and non-built-in tags are dropped.
    pub fn from_overlay(overlay: &Overlay) -> Self {
        Self {
            id: overlay.id().to_string(),
            title: overlay.title(),
            owner: overlay.owner().to_string(),
            priority: overlay.priority(),
            auto_refresh: overlay.auto_refresh(),
            refresh_interval: Some(overlay.refresh_interval()),
            auto_display: overlay.auto_display(),
            lines: overlay
                .lines()
                .into_iter()
                .filter(|line| line.visible)
                .map(|line| line.template)
                .collect(),
            tags: overlay
                .tag_names()
                .into_iter()
                .filter(|name| BUILTIN_TAGS.contains(&name.as_str()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Tag;
    use horizon_host::{ClientKey, ConnectedClients};
    use std::sync::Arc;

    fn sources() -> TagSources {
        TagSources::new(Arc::new(ConnectedClients::new()), 20)
    }

    fn parse(toml_text: &str) -> OverlayDefinition {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn test_minimal_definition_gets_defaults() {
        let definition = parse(
            r#"
            id = "lobby"
            title = "Lobby"
            lines = ["Welcome {player}", "Online: {online}"]
            tags = ["player", "online"]
            "#,
        );

        assert_eq!(definition.owner, "config");
        assert!(definition.auto_refresh);
        assert!(definition.auto_display);

        let overlay = definition.into_overlay(&sources(), 40).unwrap();
        assert_eq!(overlay.refresh_interval(), 40);
        let scores: Vec<i32> = overlay.lines().iter().map(|line| line.score).collect();
        assert_eq!(scores, vec![2, 1]);
        assert_eq!(overlay.render(&ClientKey::new())[1].text, "Online: 0");
    }

    #[test]
    fn test_validation_errors() {
        let mut definition = parse("id = \"x\"\ntitle = \"X\"");
        assert!(definition.validate().is_ok());

        definition.refresh_interval = Some(0);
        assert_eq!(
            definition.validate(),
            Err(OverlayError::InvalidRefreshInterval { id: "x".into() })
        );

        definition.refresh_interval = None;
        definition.tags = vec!["time".into(), "time".into()];
        assert_eq!(
            definition.validate(),
            Err(OverlayError::DuplicateTag {
                id: "x".into(),
                tag: "time".into()
            })
        );

        definition.tags = vec!["tps".into()];
        assert!(matches!(
            definition.into_overlay(&sources(), 20),
            Err(OverlayError::UnknownTag { .. })
        ));

        definition.id = "  ".into();
        assert_eq!(definition.validate(), Err(OverlayError::EmptyId));
    }

    #[test]
    fn test_from_overlay_keeps_builtin_tags_only() {
        let overlay = Overlay::builder("saved", "Saved", "core")
            .priority(4)
            .line("{player}", 2)
            .lines([Line::hidden("hidden", 1)])
            .tag(builtin_tag("player", &sources()).unwrap())
            .tag(Tag::fixed("motd", "hi"))
            .build();

        let definition = OverlayDefinition::from_overlay(&overlay);
        assert_eq!(definition.lines, vec!["{player}"]);
        assert_eq!(definition.tags, vec!["player"]);
        assert_eq!(definition.priority, 4);
        assert!(definition.validate().is_ok());

        let text = toml::to_string(&definition).unwrap();
        assert_eq!(parse(&text), definition);
    }
}
