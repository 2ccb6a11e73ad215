//! Conversation history with a token budget.
//!
//! The first turn is always the system prompt and is never evicted. Only the
//! most recent user turn may carry image parts; older screenshots are
//! reduced to their text as soon as a newer one arrives.

use serde::{Deserialize, Serialize};

use crate::model::{ConversationRole, ConversationTurn};

/// Limits applied by [`ConversationHistory::trim`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryBudget {
    /// Estimated token ceiling for the whole conversation.
    /// Default: 24000
    pub max_tokens: usize,

    /// Default: 0.35
    pub tokens_per_char: f64,

    /// Flat cost charged per image part.
    /// Default: 1200
    pub image_token_cost: usize,

    /// Non-system turns are capped at twice this value.
    /// Default: 10
    pub max_turns: usize,
}

impl Default for HistoryBudget {
    fn default() -> Self {
        Self {
            max_tokens: 24_000,
            tokens_per_char: 0.35,
            image_token_cost: 1_200,
            max_turns: 10,
        }
    }
}

impl HistoryBudget {
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn turn_tokens(&self, turn: &ConversationTurn) -> usize {
        let chars = turn.content.text_chars() as f64;
        let text_tokens = (chars * self.tokens_per_char).ceil() as usize;
        text_tokens + turn.content.image_count() * self.image_token_cost
    }
}

/// Ordered turns exchanged with the model during one run.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::system(system_prompt)],
        }
    }

    pub fn system_prompt(&self) -> String {
        self.turns[0].content.text()
    }

    /// Append a turn. A system turn replaces the existing system prompt.
    pub fn push(&mut self, turn: ConversationTurn) {
        if turn.role == ConversationRole::System {
            self.turns[0] = turn;
            return;
        }
        if turn.role == ConversationRole::User && turn.content.image_count() > 0 {
            for earlier in self.turns.iter_mut() {
                earlier.content.strip_images();
            }
        }
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn non_system_turns(&self) -> &[ConversationTurn] {
        &self.turns[1..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// A history always holds its system turn.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn estimated_tokens(&self, budget: &HistoryBudget) -> usize {
        self.turns.iter().map(|turn| budget.turn_tokens(turn)).sum()
    }

    /// Enforce the budget. Returns the number of turns removed.
    pub fn trim(&mut self, budget: &HistoryBudget) -> usize {
        let before = self.turns.len();

        let latest_user = self
            .turns
            .iter()
            .rposition(|turn| turn.role == ConversationRole::User);
        for (index, turn) in self.turns.iter_mut().enumerate() {
            if Some(index) != latest_user {
                turn.content.strip_images();
            }
        }

        while self.turns.len() > 2 && self.estimated_tokens(budget) > budget.max_tokens {
            let removed = self.turns.remove(1);
            let paired_reply = removed.role == ConversationRole::User
                && self.turns.len() > 2
                && self.turns[1].role == ConversationRole::Assistant;
            if paired_reply {
                self.turns.remove(1);
            }
        }

        let max_non_system = budget.max_turns.saturating_mul(2);
        let non_system = self.turns.len() - 1;
        if non_system > max_non_system {
            self.turns.drain(1..1 + non_system - max_non_system);
        }

        let removed = before - self.turns.len();
        if removed > 0 {
            tracing::debug!(
                target: "agent_core::history",
                removed,
                remaining = self.turns.len(),
                tokens = self.estimated_tokens(budget),
                "trimmed conversation history"
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentPart;

    fn budget(max_tokens: usize) -> HistoryBudget {
        HistoryBudget {
            max_tokens,
            tokens_per_char: 1.0,
            image_token_cost: 100,
            max_turns: 10,
        }
    }

    fn screenshot_turn(text: &str) -> ConversationTurn {
        ConversationTurn::user_parts(vec![ContentPart::text(text), ContentPart::png(&[1, 2])])
    }

    /// Five screenshot/reply steps plus a final screenshot, with every
    /// screenshot still carrying its image.
    fn history_with_images() -> ConversationHistory {
        let mut history = ConversationHistory::new("system");
        for step in 0..5 {
            history.turns.push(screenshot_turn(&format!("screen {step}")));
            history.push(ConversationTurn::assistant(format!(
                "do(action=\"Tap\", element=[{step},{step}])"
            )));
        }
        history.turns.push(screenshot_turn("screen 5"));
        history
    }

    #[test]
    fn test_token_estimate_rounds_up_and_counts_images() {
        let budget = HistoryBudget {
            tokens_per_char: 0.35,
            image_token_cost: 1200,
            ..HistoryBudget::default()
        };
        let mut history = ConversationHistory::new("abc");
        history.push(screenshot_turn("abcd"));
        // ceil(3 * 0.35) + ceil(4 * 0.35) + 1200
        assert_eq!(history.estimated_tokens(&budget), 2 + 2 + 1200);
    }

    #[test]
    fn test_push_with_image_strips_older_images() {
        let mut history = ConversationHistory::new("sys");
        history.push(screenshot_turn("step 1"));
        history.push(ConversationTurn::assistant("do(action=\"Back\")"));
        history.push(screenshot_turn("step 2"));

        let images: Vec<usize> = history
            .turns()
            .iter()
            .map(|turn| turn.content.image_count())
            .collect();
        assert_eq!(images, vec![0, 0, 0, 1]);
        assert_eq!(history.turns()[1].content.text(), "step 1");
    }

    #[test]
    fn test_trim_removes_user_assistant_pairs_oldest_first() {
        let mut history = ConversationHistory::new("s");
        for step in 0..4 {
            history.push(ConversationTurn::user(format!("user{step}")));
            history.push(ConversationTurn::assistant(format!("asst{step}")));
        }
        // Each non-system turn costs 5 tokens, the system turn 1.
        assert_eq!(history.estimated_tokens(&budget(1000)), 41);

        let removed = history.trim(&budget(25));
        assert_eq!(removed, 4);
        let texts: Vec<String> = history
            .non_system_turns()
            .iter()
            .map(|turn| turn.content.text())
            .collect();
        assert_eq!(texts, vec!["user2", "asst2", "user3", "asst3"]);
        assert_eq!(history.turns()[0].role, ConversationRole::System);
    }

    #[test]
    fn test_trim_never_drops_below_system_plus_one() {
        let mut history = ConversationHistory::new("system prompt");
        history.push(ConversationTurn::user("a very long observation"));
        history.push(ConversationTurn::assistant("reply"));

        history.trim(&budget(1));
        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].role, ConversationRole::System);
        assert_eq!(history.turns()[1].content.text(), "reply");
    }

    #[test]
    fn test_trim_caps_turn_count() {
        let mut history = ConversationHistory::new("s");
        for step in 0..6 {
            history.push(ConversationTurn::user(format!("u{step}")));
            history.push(ConversationTurn::assistant(format!("a{step}")));
        }
        history.trim(&budget(100_000).with_max_turns(2));
        assert_eq!(history.non_system_turns().len(), 4);
        assert_eq!(history.non_system_turns()[0].content.text(), "u4");
    }

    #[test]
    fn test_trim_keeps_only_latest_user_image() {
        let mut history = ConversationHistory::new("s");
        history.push(screenshot_turn("old"));
        // Bypass push so two images coexist before trimming.
        history.turns.push(screenshot_turn("new"));
        history.trim(&budget(100_000));
        assert_eq!(history.turns()[1].content.image_count(), 0);
        assert_eq!(history.turns()[2].content.image_count(), 1);
    }

    #[test]
    fn test_second_trim_removes_nothing() {
        let budget = budget(300);
        let mut history = history_with_images();

        assert!(history.trim(&budget) > 0);
        let trimmed = history.turns().to_vec();

        assert_eq!(history.trim(&budget), 0);
        assert_eq!(history.turns(), trimmed.as_slice());
    }

    #[test]
    fn test_trim_fits_budget_unless_only_one_turn_is_left() {
        for max_tokens in [1, 60, 120, 200, 309, 10_000] {
            let budget = budget(max_tokens);
            let mut history = history_with_images();
            history.trim(&budget);

            assert!(
                history.estimated_tokens(&budget) <= budget.max_tokens || history.len() == 2,
                "max_tokens {max_tokens}: {} tokens in {} turns",
                history.estimated_tokens(&budget),
                history.len()
            );
            assert_eq!(history.turns()[0].role, ConversationRole::System);
            let images: usize = history
                .turns()
                .iter()
                .map(|turn| turn.content.image_count())
                .sum();
            assert!(images <= 1);
        }
    }

    #[test]
    fn test_system_turn_is_replaced_not_appended() {
        let mut history = ConversationHistory::new("first");
        history.push(ConversationTurn::system("second"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.system_prompt(), "second");
    }
}
