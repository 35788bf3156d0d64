use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A keyboard key, identified by its normalized lowercase name
/// (`"c"`, `"5"`, `"escape"`, `"space"`, `"return"`, `"left"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key(String);

impl Key {
    pub const ESCAPE: &'static str = "escape";
    pub const RETURN: &'static str = "return";
    pub const SPACE: &'static str = "space";
    pub const LEFT: &'static str = "left";
    pub const RIGHT: &'static str = "right";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(normalize(name.as_ref()))
    }

    pub fn escape() -> Self {
        Self(Self::ESCAPE.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric value of a single digit key.
    pub fn digit(&self) -> Option<i32> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_digit(10).map(|d| d as i32),
            _ => None,
        }
    }
}

fn normalize(name: &str) -> String {
    if name == " " {
        return Key::SPACE.to_owned();
    }
    let lower = name.trim().to_lowercase();
    let canonical = match lower.as_str() {
        "esc" => Key::ESCAPE,
        "enter" | "kp_enter" | "numpadenter" => Key::RETURN,
        "spacebar" => Key::SPACE,
        "arrowleft" => Key::LEFT,
        "arrowright" => Key::RIGHT,
        "arrowup" => "up",
        "arrowdown" => "down",
        _ => return lower,
    };
    canonical.to_owned()
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Key> for String {
    fn from(value: Key) -> Self {
        value.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keys a stimulus is waiting for. An empty set accepts any key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeySet(Vec<Key>);

impl KeySet {
    pub fn any() -> Self {
        Self(Vec::new())
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.0.is_empty() || self.0.contains(key)
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }
}

impl<K: Into<Key>> FromIterator<K> for KeySet {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Key>, const N: usize> From<[K; N]> for KeySet {
    fn from(keys: [K; N]) -> Self {
        keys.into_iter().collect()
    }
}

/// A key press, stamped with the time since the surface opened.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub key: Key,
    pub at: Duration,
}

impl KeyPress {
    pub fn new(key: impl Into<Key>, at: Duration) -> Self {
        Self {
            key: key.into(),
            at,
        }
    }
}
