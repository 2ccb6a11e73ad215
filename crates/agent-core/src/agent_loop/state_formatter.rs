//! Screen state formatter for model consumption.
//!
//! Turns one observation (foreground app, UI dump, optional screenshot)
//! into the user turn appended to the conversation.

use droidpilot_core_types::ScreenCapture;
use serde_json::json;

use super::config::AgentLoopConfig;
use crate::model::{ContentPart, ConversationTurn};

/// Everything gathered at the start of a step.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub current_app: String,
    /// Untruncated UI dump; sensitive-keyword checks run on this.
    pub ui_snapshot: String,
    pub screenshot: Option<std::sync::Arc<ScreenCapture>>,
}

/// Formats observations into user turns.
#[derive(Debug, Clone)]
pub struct StateFormatter {
    ui_char_budget: usize,
    head_fraction: f64,
    min_tail_fraction: f64,
}

impl StateFormatter {
    pub fn new(config: &AgentLoopConfig) -> Self {
        Self {
            ui_char_budget: config.ui_char_budget,
            head_fraction: config.ui_head_fraction.clamp(0.0, 1.0),
            min_tail_fraction: config.ui_min_tail_fraction.clamp(0.0, 1.0),
        }
    }

    /// Build the user turn for a step. The goal is prefixed on the first step.
    pub fn format_user_turn(&self, goal: Option<&str>, observation: &Observation) -> ConversationTurn {
        let state = json!({
            "current_app": observation.current_app,
            "ui": self.truncate_ui(&observation.ui_snapshot),
        })
        .to_string();

        let text = match goal {
            Some(goal) => format!("Task: {goal}\n\n{state}"),
            None => state,
        };

        match &observation.screenshot {
            Some(capture) => ConversationTurn::user_parts(vec![
                ContentPart::text(text),
                ContentPart::png(&capture.data),
            ]),
            None => ConversationTurn::user(text),
        }
    }

    /// Cut the UI dump to the character budget, keeping most of the head and
    /// at least a minimum slice of the tail where dialogs and buttons live.
    pub fn truncate_ui(&self, ui: &str) -> String {
        let total = ui.chars().count();
        let budget = self.ui_char_budget;
        if total <= budget {
            return ui.to_string();
        }

        let min_tail = (budget as f64 * self.min_tail_fraction).ceil() as usize;
        let head_target = (budget as f64 * self.head_fraction).floor() as usize;
        let head = head_target.min(budget.saturating_sub(min_tail));
        let tail = budget - head;

        let head_end = byte_offset(ui, head);
        let tail_start = byte_offset(ui, total - tail);
        format!(
            "{}\n...[{} chars omitted]...\n{}",
            &ui[..head_end],
            total - head - tail,
            &ui[tail_start..]
        )
    }
}

/// Byte offset of the `chars`-th character.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TurnContent;
    use std::sync::Arc;

    fn formatter(budget: usize) -> StateFormatter {
        let mut config = AgentLoopConfig::default();
        config.ui_char_budget = budget;
        config.ui_head_fraction = 0.75;
        config.ui_min_tail_fraction = 0.2;
        StateFormatter::new(&config)
    }

    #[test]
    fn test_short_ui_is_unchanged() {
        assert_eq!(formatter(100).truncate_ui("short"), "short");
    }

    #[test]
    fn test_truncation_keeps_head_and_tail() {
        let ui: String = ('a'..='z').cycle().take(200).collect();
        let out = formatter(100).truncate_ui(&ui);
        assert!(out.starts_with(&ui[..75]));
        assert!(out.ends_with(&ui[175..]));
        assert!(out.contains("[100 chars omitted]"));
    }

    #[test]
    fn test_tail_minimum_wins_over_head_fraction() {
        let config = AgentLoopConfig {
            ui_char_budget: 10,
            ui_head_fraction: 1.0,
            ui_min_tail_fraction: 0.25,
            ..AgentLoopConfig::default()
        };
        let out = StateFormatter::new(&config).truncate_ui("0123456789ABCDEFGHIJ");
        assert!(out.starts_with("0123456\n"));
        assert!(out.ends_with("\nHIJ"));
    }

    #[test]
    fn test_truncation_is_char_boundary_safe() {
        let ui = "设置".repeat(100);
        let out = formatter(10).truncate_ui(&ui);
        assert!(out.starts_with("设置设置设置设"));
    }

    #[test]
    fn test_first_turn_carries_goal_and_image() {
        let observation = Observation {
            current_app: "com.android.settings".to_string(),
            ui_snapshot: "Wi-Fi".to_string(),
            screenshot: Some(Arc::new(ScreenCapture::new(1, 1, vec![1, 2, 3]))),
        };
        let turn = formatter(100).format_user_turn(Some("turn on wifi"), &observation);
        assert_eq!(turn.content.image_count(), 1);
        let text = turn.content.text();
        assert!(text.starts_with("Task: turn on wifi\n\n"));
        assert!(text.contains(r#""current_app":"com.android.settings""#));
        assert!(text.contains(r#""ui":"Wi-Fi""#));
    }

    #[test]
    fn test_later_turn_without_screenshot_is_text() {
        let observation = Observation {
            current_app: "launcher".to_string(),
            ..Observation::default()
        };
        let turn = formatter(100).format_user_turn(None, &observation);
        match turn.content {
            TurnContent::Text(text) => assert!(text.starts_with('{')),
            other => panic!("expected text content, got {other:?}"),
        }
    }
}
