use once_cell::sync::Lazy;
use regex::Regex;

const MIN_PLAUSIBLE: u32 = 2;
const MAX_PLAUSIBLE: u32 = 20;

static EXPLICIT_COUNT: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:about|around|approximately|roughly|~)\s*(\d{1,3})\s*(?:more\s+)?(?:steps?|actions?)\b",
        r"(?i)\b(\d{1,3})\s*(?:steps?|actions?)\s+(?:in total|total|overall)",
        r"(?:大约|大概|约)\s*(\d{1,3})\s*(?:个)?(?:步骤|步)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("explicit count regex"))
    .collect()
});

static PLAN_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(what i need to do|i need to|steps to take|my plan|the plan|我需要|需要做的|计划)")
        .expect("preamble regex")
});

static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:step\s*)?\d{1,2}\s*[.)、:：]\s*\S").expect("numbered line regex")
});

static ACTION_VERB_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:tap|click|type|enter|input|swipe|scroll|open|launch|press|search|select|go back)\b")
        .expect("verb regex")
});

static ACTION_VERB_ZH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"点击|输入|滑动|打开|返回|搜索|选择").expect("verb regex"));

/// Guess how many steps the task will take from the model's reasoning text.
///
/// Heuristics are tried in order and the first one landing in `[2, 20]`
/// wins: an explicit "about N steps", a numbered list after a plan preamble,
/// any numbered list, then a count of action verbs. Returns 0 when nothing
/// plausible is found. The value is only a hint for progress reporting.
pub fn estimate_total_steps(thinking: &str) -> u32 {
    let candidates = [
        explicit_count(thinking),
        preamble_list_count(thinking),
        numbered_line_count(thinking),
        action_verb_count(thinking),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|count| (MIN_PLAUSIBLE..=MAX_PLAUSIBLE).contains(count))
        .unwrap_or(0)
}

fn explicit_count(text: &str) -> Option<u32> {
    EXPLICIT_COUNT.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

fn preamble_list_count(text: &str) -> Option<u32> {
    let preamble = PLAN_PREAMBLE.find(text)?;
    count_numbered(&text[preamble.end()..])
}

fn numbered_line_count(text: &str) -> Option<u32> {
    count_numbered(text)
}

fn count_numbered(text: &str) -> Option<u32> {
    let count = NUMBERED_LINE.find_iter(text).count();
    (count > 0).then_some(count as u32)
}

fn action_verb_count(text: &str) -> Option<u32> {
    let count = ACTION_VERB_EN.find_iter(text).count() + ACTION_VERB_ZH.find_iter(text).count();
    (count > 0).then_some(count as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_count() {
        assert_eq!(estimate_total_steps("This should take about 5 steps."), 5);
        assert_eq!(estimate_total_steps("大约 4 步可以完成"), 4);
    }

    #[test]
    fn test_explicit_count_out_of_range_falls_through() {
        let text = "It takes about 50 steps.\n1. open app\n2. tap search\n3. type query";
        assert_eq!(estimate_total_steps(text), 3);
    }

    #[test]
    fn test_numbered_list_after_preamble() {
        let text = "1. unrelated note\nWhat I need to do:\n1. Open Settings\n2. Tap Wi-Fi\n3. Toggle it on\n4. Confirm";
        assert_eq!(estimate_total_steps(text), 4);
    }

    #[test]
    fn test_action_verbs() {
        let text = "First open the app, then tap the text box and type the query.";
        assert_eq!(estimate_total_steps(text), 3);
    }

    #[test]
    fn test_nothing_plausible_returns_zero() {
        assert_eq!(estimate_total_steps(""), 0);
        assert_eq!(estimate_total_steps("Everything looks fine."), 0);
        assert_eq!(estimate_total_steps("Just tap it."), 0);
    }
}
