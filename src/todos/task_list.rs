use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TASK_ITEM_RE: Regex =
        Regex::new(r"(?m)^([ \t]*(?:[-*+]|\d+[.)])[ \t]+)\[[ xX]\]").expect("valid task item regex");
}

/// Text with every task-list checkbox unchecked and trailing whitespace removed.
fn normalize(text: &str) -> String {
    let unchecked = TASK_ITEM_RE.replace_all(text, "${1}[ ]");
    unchecked
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// True when `new` differs from `old` at most by checkbox states and trailing whitespace.
pub fn only_task_states_changed(old: &str, new: &str) -> bool {
    normalize(old) == normalize(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASKS: &str = "- [ ] Task 1\n- [ ] Task 2 @mention";

    #[test]
    fn checking_boxes_is_a_task_only_change() {
        assert!(only_task_states_changed(
            TASKS,
            "- [x] Task 1\n- [X] Task 2 @mention"
        ));
        assert!(only_task_states_changed(
            TASKS,
            "- [x] Task 1\n- [X] Task 2 @mention\n"
        ));
        assert!(only_task_states_changed(
            "1. [ ] first\n2) [x] second",
            "1. [x] first\n2) [ ] second"
        ));
    }

    #[test]
    fn editing_text_is_a_real_change() {
        assert!(!only_task_states_changed(
            TASKS,
            "- [x] Task 1\n- [X] Task 2 @mention @other"
        ));
        assert!(!only_task_states_changed(TASKS, "- [x] Task 1"));
    }

    #[test]
    fn brackets_outside_list_items_are_text() {
        assert!(!only_task_states_changed("see [ ] here", "see [x] here"));
    }
}
