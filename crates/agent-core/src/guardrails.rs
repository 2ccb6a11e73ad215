use std::collections::HashSet;

use crate::action::{ActionName, ParsedAction};

/// Keywords that mark a screen as needing a human (credentials, payments).
pub const DEFAULT_SENSITIVE_KEYWORDS: &[&str] =
    &["password", "payment", "pay now", "cvv", "密码", "支付"];

/// Refuses taps and typing on screens whose UI snapshot mentions a
/// sensitive keyword.
#[derive(Debug, Clone)]
pub struct SensitiveScreenGuard {
    keywords: Vec<String>,
}

impl Default for SensitiveScreenGuard {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_KEYWORDS.iter().copied())
    }
}

impl SensitiveScreenGuard {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut normalized = Vec::new();
        for keyword in keywords {
            push_keyword(&mut normalized, &mut seen, keyword.as_ref());
        }
        Self {
            keywords: normalized,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// First keyword found in `ui_text`, case-insensitively.
    pub fn find_keyword(&self, ui_text: &str) -> Option<&str> {
        let haystack = ui_text.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| haystack.contains(keyword.as_str()))
            .map(String::as_str)
    }

    /// Reason for a take-over when `action` would tap or type on a sensitive screen.
    pub fn check(&self, action: &ParsedAction, ui_text: &str) -> Option<String> {
        match action.action_name()? {
            ActionName::Tap | ActionName::Type => {}
            _ => return None,
        }
        self.find_keyword(ui_text)
            .map(|keyword| format!("sensitive screen detected ({keyword}); manual input required"))
    }
}

fn push_keyword(list: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return;
    }
    let lowered = trimmed.to_lowercase();
    if seen.insert(lowered.clone()) {
        list.push(lowered);
    }
}
