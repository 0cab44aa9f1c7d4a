use serde::{Deserialize, Serialize};
use std::fmt;

/// Collection-scoped identifier of one translatable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Payload format sent to the translation service. Titles go out as text,
/// item bodies as html.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Html,
    Text,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Html => "html",
            ContentFormat::Text => "text",
        }
    }
}

/// The visual representations the title may be mounted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleMount {
    Primary,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
}

impl Progress {
    pub const fn new(current: u32, total: u32) -> Self {
        Self { current, total }
    }

    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        ((self.current as f32) / (self.total as f32) * 100.0).clamp(0.0, 100.0)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.current, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_formats_as_fraction() {
        let progress = Progress::new(3, 10);
        assert_eq!(progress.to_string(), "3/10");
        assert_eq!(progress.percentage(), 30.0);
        assert_eq!(Progress::default().percentage(), 0.0);
    }

    #[test]
    fn item_id_serializes_transparently() {
        let id = ItemId::from("msg-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"msg-7\"");
        assert_eq!(ContentFormat::Html.as_str(), "html");
    }
}
