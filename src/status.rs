use std::fmt;

const UNAVAILABLE_MARKERS: [&str; 2] = ["not available", "unavailable"];

/// Human-readable wait time phrase read from the contact page, e.g.
/// `Wait time: 15 minutes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitTimeStatus(String);

impl WaitTimeStatus {
    /// Returns `None` when nothing but whitespace was read.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unavailable(&self) -> bool {
        let lower = self.0.to_lowercase();
        UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m))
    }
}

impl fmt::Display for WaitTimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
