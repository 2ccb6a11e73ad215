use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{ActionFields, ActionKind, ActionName, ParsedAction};

/// Start of a `do(` / `finish(` call that is not the tail of a longer identifier.
static CALL_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_])(do|finish)\s*\(").expect("call start regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallName {
    Do,
    Finish,
}

impl CallName {
    /// Key a bare positional argument is bound to.
    fn positional_key(self) -> &'static str {
        match self {
            CallName::Do => "action",
            CallName::Finish => "message",
        }
    }
}

/// Extract the action directive from a model reply.
///
/// The last `do(`/`finish(` occurrence wins, not counting occurrences inside
/// the arguments of an earlier call. If that call is cut off or malformed the
/// result is `Unknown`; earlier calls are never used instead. Never panics.
pub fn parse_action(text: &str) -> ParsedAction {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParsedAction::unknown(text, "empty reply");
    }
    if trimmed.contains('\u{FFFD}') {
        return ParsedAction::unknown(trimmed, "reply contains replacement characters");
    }
    if looks_truncated(trimmed) {
        return ParsedAction::unknown(trimmed, "reply appears truncated");
    }

    let candidates: Vec<(usize, CallName)> = CALL_START
        .captures_iter(trimmed)
        .filter_map(|caps| {
            let name = caps.get(1)?;
            let call = if name.as_str() == "do" {
                CallName::Do
            } else {
                CallName::Finish
            };
            Some((name.start(), call))
        })
        .collect();

    if candidates.is_empty() {
        return ParsedAction::unknown(trimmed, "no do()/finish() call found");
    }

    // Markers inside a call that already parsed (quoted in a finish message,
    // say) are skipped; the last remaining marker decides the outcome.
    let mut outcome = Err(String::new());
    let mut consumed = 0;
    for (start, call) in candidates {
        if start < consumed {
            continue;
        }
        outcome = parse_call(trimmed, start, call);
        match &outcome {
            Ok(action) => consumed = start + action.raw.len(),
            Err(reason) => {
                tracing::trace!(target: "agent_core::action", start, %reason, "call rejected");
            }
        }
    }
    outcome.unwrap_or_else(|reason| ParsedAction::unknown(trimmed, reason))
}

fn looks_truncated(text: &str) -> bool {
    text.ends_with("...") || text.ends_with('…')
}

fn parse_call(text: &str, start: usize, call: CallName) -> Result<ParsedAction, String> {
    let mut cursor = Cursor::new(text, start);
    cursor.skip_ident();
    cursor.skip_ws();
    if !cursor.eat('(') {
        return Err("expected '('".to_string());
    }

    let fields = parse_arguments(&mut cursor, call)?;
    let raw = text[start..cursor.pos].to_string();
    finish_action(call, fields, raw)
}

fn finish_action(call: CallName, mut fields: ActionFields, raw: String) -> Result<ParsedAction, String> {
    match call {
        CallName::Do => {
            let name = fields
                .remove("action")
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| "do() call without an action parameter".to_string())?;
            Ok(ParsedAction {
                kind: ActionKind::Do {
                    action: ActionName::parse(&name),
                },
                fields,
                raw,
            })
        }
        CallName::Finish => {
            if !fields.contains_key("message") {
                fields.insert("message", "");
            }
            Ok(ParsedAction {
                kind: ActionKind::Finish,
                fields,
                raw,
            })
        }
    }
}

fn parse_arguments(cursor: &mut Cursor<'_>, call: CallName) -> Result<ActionFields, String> {
    let mut fields = ActionFields::new();
    loop {
        cursor.skip_ws();
        match cursor.peek() {
            None => return Err("unterminated call".to_string()),
            Some(')') => {
                cursor.bump();
                return Ok(fields);
            }
            Some('"' | '\'') => {
                // Positional string, e.g. finish("done").
                let value = read_value(cursor)?;
                fields.insert(call.positional_key(), value);
            }
            Some(_) => {
                let key = cursor.read_key();
                if key.is_empty() {
                    return Err(format!("expected parameter name at offset {}", cursor.pos));
                }
                cursor.skip_ws();
                if !(cursor.eat('=') || cursor.eat(':')) {
                    return Err(format!("expected '=' after parameter {key}"));
                }
                cursor.skip_ws();
                let value = read_value(cursor)?;
                fields.insert(key, value);
            }
        }

        cursor.skip_ws();
        match cursor.peek() {
            Some(',') => {
                cursor.bump();
            }
            Some(')') => {
                cursor.bump();
                return Ok(fields);
            }
            None => return Err("unterminated call".to_string()),
            Some(other) => return Err(format!("unexpected '{other}' after parameter value")),
        }
    }
}

fn read_value(cursor: &mut Cursor<'_>) -> Result<String, String> {
    match cursor.peek() {
        Some(quote @ ('"' | '\'')) => {
            cursor.bump();
            read_quoted(cursor, quote)
        }
        Some('[') => read_bracketed(cursor),
        Some(_) => read_bare(cursor),
        None => Err("missing parameter value".to_string()),
    }
}

/// Quoted string with backslash escapes. An unescaped quote only closes the
/// string when the next non-space character ends the value, which tolerates
/// models that forget to escape inner quotes.
fn read_quoted(cursor: &mut Cursor<'_>, quote: char) -> Result<String, String> {
    let mut value = String::new();
    while let Some(ch) = cursor.bump() {
        match ch {
            '\\' => match cursor.bump() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(escaped @ ('\\' | '"' | '\'')) => value.push(escaped),
                Some(other) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            ch if ch == quote => {
                if matches!(cursor.peek_past_ws(), None | Some(',' | ')')) {
                    return Ok(value);
                }
                value.push(ch);
            }
            other => value.push(other),
        }
    }
    Err("unterminated string literal".to_string())
}

/// `[x, y]` style lists. Returns the inner text with whitespace removed.
fn read_bracketed(cursor: &mut Cursor<'_>) -> Result<String, String> {
    cursor.bump();
    let mut depth = 1usize;
    let mut inner = String::new();
    while let Some(ch) = cursor.bump() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(inner);
                }
            }
            _ => {}
        }
        if !ch.is_whitespace() {
            inner.push(ch);
        }
    }
    Err("unterminated list".to_string())
}

fn read_bare(cursor: &mut Cursor<'_>) -> Result<String, String> {
    let start = cursor.pos;
    let mut depth = 0usize;
    while let Some(ch) = cursor.peek() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => break,
            ')' => depth -= 1,
            ',' if depth == 0 => break,
            _ => {}
        }
        cursor.bump();
    }
    if cursor.peek().is_none() {
        return Err("unterminated call".to_string());
    }
    Ok(cursor.src[start..cursor.pos].trim().to_string())
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_past_ws(&self) -> Option<char> {
        self.src[self.pos..].chars().find(|ch| !ch.is_whitespace())
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_ident(&mut self) {
        while self
            .peek()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            self.bump();
        }
    }

    fn read_key(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
        {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }
}
