use std::fmt;
use std::time::Duration;

use droidpilot_core_types::NormalizedPoint;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Actions the model may request through `do(action=...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionName {
    Tap,
    Type,
    Swipe,
    Launch,
    Back,
    Home,
    Wait,
    LongPress,
    DoubleTap,
    TakeOver,
    Note,
    CallApi,
    Interact,
    /// Anything the executor does not know; kept verbatim for error messages.
    Other(String),
}

impl ActionName {
    /// Case-, space-, underscore- and dash-insensitive lookup.
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|ch| !matches!(ch, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "tap" | "click" => Self::Tap,
            "type" | "typename" | "input" => Self::Type,
            "swipe" => Self::Swipe,
            "launch" | "openapp" => Self::Launch,
            "back" => Self::Back,
            "home" => Self::Home,
            "wait" => Self::Wait,
            "longpress" => Self::LongPress,
            "doubletap" => Self::DoubleTap,
            "takeover" => Self::TakeOver,
            "note" => Self::Note,
            "callapi" => Self::CallApi,
            "interact" => Self::Interact,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Tap => "Tap",
            Self::Type => "Type",
            Self::Swipe => "Swipe",
            Self::Launch => "Launch",
            Self::Back => "Back",
            Self::Home => "Home",
            Self::Wait => "Wait",
            Self::LongPress => "Long Press",
            Self::DoubleTap => "Double Tap",
            Self::TakeOver => "Take_over",
            Self::Note => "Note",
            Self::CallApi => "Call_API",
            Self::Interact => "Interact",
            Self::Other(name) => name,
        }
    }

    /// Actions that are never executed automatically and hand control to a human.
    pub fn requires_human(&self) -> bool {
        matches!(
            self,
            Self::TakeOver | Self::Note | Self::CallApi | Self::Interact
        )
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What a model reply asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    Do { action: ActionName },
    Finish,
    Unknown { reason: String },
}

/// Insertion-ordered call parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionFields(Vec<(String, String)>);

impl ActionFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value; overwriting keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.0.iter().position(|(existing, _)| existing == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ActionFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Result of parsing one model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAction {
    pub kind: ActionKind,
    pub fields: ActionFields,
    /// The text span the call was extracted from.
    pub raw: String,
}

impl ParsedAction {
    pub fn unknown(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Unknown {
                reason: reason.into(),
            },
            fields: ActionFields::new(),
            raw: raw.into(),
        }
    }

    pub fn is_do(&self) -> bool {
        matches!(self.kind, ActionKind::Do { .. })
    }

    pub fn is_finish(&self) -> bool {
        matches!(self.kind, ActionKind::Finish)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, ActionKind::Unknown { .. })
    }

    pub fn action_name(&self) -> Option<&ActionName> {
        match &self.kind {
            ActionKind::Do { action } => Some(action),
            _ => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key)
    }

    /// The `message` field; empty when absent.
    pub fn message(&self) -> &str {
        self.fields.get("message").unwrap_or_default()
    }

    /// Parse an `"x,y"` field into a point on the normalized grid.
    pub fn point(&self, key: &str) -> Option<NormalizedPoint> {
        let value = self.fields.get(key)?;
        let mut parts = value
            .trim_matches(|ch| ch == '[' || ch == ']')
            .split(',')
            .map(|part| part.trim().parse::<f64>());
        let x = parts.next()?.ok()?;
        let y = parts.next()?.ok()?;
        if parts.next().is_some() || x < 0.0 || y < 0.0 {
            return None;
        }
        Some(NormalizedPoint::new(x.round() as u32, y.round() as u32))
    }

    /// Parse durations such as `"2 seconds"`, `"1.5s"` or `"500ms"`.
    pub fn duration(&self, key: &str) -> Option<Duration> {
        parse_duration(self.fields.get(key)?)
    }
}

fn parse_duration(value: &str) -> Option<Duration> {
    let lowered = value.trim().to_ascii_lowercase();
    let split = lowered
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(lowered.len());
    let (number, unit) = lowered.split_at(split);
    let number: f64 = number.parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    let millis = match unit.trim() {
        "ms" | "millisecond" | "milliseconds" => number,
        "" | "s" | "sec" | "secs" | "second" | "seconds" | "秒" => number * 1000.0,
        _ => return None,
    };
    Some(Duration::from_millis(millis.round() as u64))
}
