//! Bounded conversation memory.
//!
//! Every node in the hierarchy owns one [`ConversationContext`]. It is only
//! ever appended to; once `max_length` turns are held, the oldest turn is
//! evicted first.

use crate::core::message::{Role, Turn};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::Write;
use unicode_segmentation::UnicodeSegmentation;

/// FIFO log of turns with a fixed capacity.
///
/// # Examples
///
/// ```
/// use director_rs::core::{ConversationContext, Turn};
///
/// let mut ctx = ConversationContext::new(2);
/// ctx.push(Turn::user("one"));
/// ctx.push(Turn::assistant("two"));
/// ctx.push(Turn::user("three"));
/// assert_eq!(ctx.len(), 2);
/// assert_eq!(ctx.turns().next().unwrap().text, "two");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationContext {
    turns: VecDeque<Turn>,
    max_length: usize,
}

impl ConversationContext {
    /// Creates an empty context holding at most `max_length` turns.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        let max_length = max_length.max(1);
        Self {
            turns: VecDeque::with_capacity(max_length),
            max_length,
        }
    }

    /// Appends a turn, evicting the oldest while over capacity.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_length {
            self.turns.pop_front();
        }
    }

    /// Appends a user message followed by the reply to it.
    ///
    /// Evicts whole exchanges: the oldest turn kept is never a reply whose
    /// question was dropped, unless the capacity is a single turn.
    pub fn push_exchange(&mut self, user: &str, reply: &str) {
        self.push(Turn::user(user));
        self.push(Turn::assistant(reply));
        if self.turns.len() > 1
            && self.turns.front().is_some_and(|t| t.role == Role::Assistant)
        {
            self.turns.pop_front();
        }
    }

    /// Drops every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Turns from oldest to newest.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Copies the turns into a contiguous slice-friendly vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Number of turns held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }

    /// Renders the last `n` turns, each truncated to `width` graphemes.
    #[must_use]
    pub fn summary(&self, n: usize, width: usize) -> String {
        let skip = self.turns.len().saturating_sub(n);
        let mut output = String::new();
        for turn in self.turns.iter().skip(skip) {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let _ = writeln!(output, "{speaker}: {}", truncate_graphemes(&turn.text, width));
        }
        output
    }
}

/// Truncates to at most `max` grapheme clusters, appending "..." when cut.
#[must_use]
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    if graphemes.len() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return graphemes[..max].concat();
    }
    format!("{}...", graphemes[..max - 3].concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction() {
        let mut ctx = ConversationContext::new(3);
        for i in 0..5 {
            ctx.push(Turn::user(i.to_string()));
        }
        let texts: Vec<_> = ctx.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_push_exchange_order() {
        let mut ctx = ConversationContext::new(10);
        ctx.push_exchange("hi", "hello");
        let turns = ctx.to_vec();
        assert_eq!(turns[0], Turn::user("hi"));
        assert_eq!(turns[1], Turn::assistant("hello"));
    }

    #[test]
    fn test_odd_capacity_keeps_whole_exchanges() {
        let mut ctx = ConversationContext::new(3);
        ctx.push_exchange("one", "reply one");
        ctx.push_exchange("two", "reply two");
        assert_eq!(ctx.len(), 2);
        let first = ctx.turns().next().unwrap();
        assert_eq!(first.role, Role::User);
        assert_eq!(first.text, "two");

        let mut ctx = ConversationContext::new(15);
        for i in 0..20 {
            ctx.push_exchange(&format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(ctx.len(), 14);
        assert_eq!(ctx.turns().next().unwrap().text, "q13");
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let mut ctx = ConversationContext::new(0);
        ctx.push_exchange("a", "b");
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.max_length(), 1);
    }

    #[test]
    fn test_clear() {
        let mut ctx = ConversationContext::new(4);
        ctx.push_exchange("a", "b");
        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_summary_tail_and_truncation() {
        let mut ctx = ConversationContext::new(10);
        ctx.push_exchange("first question", "first answer");
        ctx.push_exchange("second question is rather long", "ok");
        let summary = ctx.summary(2, 12);
        assert_eq!(summary, "User: second qu...\nAssistant: ok\n");
    }

    #[test]
    fn test_truncate_graphemes_multibyte() {
        assert_eq!(truncate_graphemes("héllo wörld", 8), "héllo...");
        assert_eq!(truncate_graphemes("🏋️🏋️🏋️", 2), "🏋️🏋️");
        assert_eq!(truncate_graphemes("short", 10), "short");
    }
}
