use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref HANDLE_RE: Regex =
        Regex::new(r"@([A-Za-z0-9_](?:[A-Za-z0-9_.\-]*[A-Za-z0-9_])?)").expect("valid handle regex");
    static ref LEADING_RUN_RE: Regex = Regex::new(
        r"^[ \t]*(?:@[A-Za-z0-9_](?:[A-Za-z0-9_.\-]*[A-Za-z0-9_])?[ \t,]*)+"
    )
    .expect("valid leading run regex");
    static ref FENCE_RE: Regex = Regex::new(r"^ {0,3}(```|~~~)").expect("valid fence regex");
    static ref INLINE_CODE_RE: Regex = Regex::new(r"`[^`]*`").expect("valid inline code regex");
}

/// Handles found in a text body, split by where they appear.
///
/// A handle in the run of mentions that opens a line is *addressed*; every other
/// occurrence is *mentioned*. The same handle can land in both sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleMentions {
    pub addressed: BTreeSet<String>,
    pub mentioned: BTreeSet<String>,
}

impl HandleMentions {
    pub fn is_empty(&self) -> bool {
        self.addressed.is_empty() && self.mentioned.is_empty()
    }

    pub fn all(&self) -> BTreeSet<String> {
        self.addressed.union(&self.mentioned).cloned().collect()
    }
}

pub fn scan_handles(text: &str, ignore_code_blocks: bool) -> HandleMentions {
    let mut found = HandleMentions::default();
    let mut in_fence = false;

    for raw_line in text.lines() {
        if ignore_code_blocks {
            if FENCE_RE.is_match(raw_line) {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
        }

        let line = if ignore_code_blocks {
            // Same length, so match offsets stay valid.
            INLINE_CODE_RE
                .replace_all(raw_line, |caps: &regex::Captures| " ".repeat(caps[0].len()))
                .into_owned()
        } else {
            raw_line.to_string()
        };

        let leading_end = LEADING_RUN_RE.find(&line).map(|m| m.end()).unwrap_or(0);

        for caps in HANDLE_RE.captures_iter(&line) {
            let (Some(whole), Some(handle)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let preceded_by_word = line[..whole.start()]
                .chars()
                .next_back()
                .map(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '@')
                .unwrap_or(false);
            if preceded_by_word {
                continue;
            }
            if whole.end() <= leading_end {
                found.addressed.insert(handle.as_str().to_string());
            } else {
                found.mentioned.insert(handle.as_str().to_string());
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(handles: &[&str]) -> BTreeSet<String> {
        handles.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn leading_run_is_addressed() {
        let found = scan_handles("@alice @bob, @carol please review", true);
        assert_eq!(found.addressed, set(&["alice", "bob", "carol"]));
        assert!(found.mentioned.is_empty());
    }

    #[test]
    fn later_mentions_are_not_addressed() {
        let found = scan_handles("@member, what do you think? cc: @guest", true);
        assert_eq!(found.addressed, set(&["member"]));
        assert_eq!(found.mentioned, set(&["guest"]));
    }

    #[test]
    fn each_line_has_its_own_leading_run() {
        let found = scan_handles("Hello\n  @dave can you look?\nthanks @erin.", true);
        assert_eq!(found.addressed, set(&["dave"]));
        assert_eq!(found.mentioned, set(&["erin"]));
    }

    #[test]
    fn same_handle_can_be_addressed_and_mentioned() {
        let found = scan_handles("@frank ping\nsee what @frank wrote", true);
        assert_eq!(found.addressed, set(&["frank"]));
        assert_eq!(found.mentioned, set(&["frank"]));
        assert_eq!(found.all(), set(&["frank"]));
    }

    #[test]
    fn email_addresses_are_not_mentions() {
        let found = scan_handles("write to admin@example.com", true);
        assert!(found.is_empty());
    }

    #[test]
    fn trailing_punctuation_is_not_part_of_handle() {
        let found = scan_handles("Thanks @john.doe. And @jane-!", true);
        assert_eq!(found.mentioned, set(&["john.doe", "jane"]));
    }

    #[test]
    fn code_is_skipped_when_configured() {
        let text = "see `@inline`\n```\n@fenced\n```\n@after";
        let found = scan_handles(text, true);
        assert_eq!(found.addressed, set(&["after"]));
        assert!(found.mentioned.is_empty());

        let found = scan_handles(text, false);
        assert_eq!(found.all(), set(&["inline", "fenced", "after"]));
    }
}
