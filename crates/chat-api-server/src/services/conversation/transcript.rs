use chrono::{DateTime, SubsecRound, Utc};

use super::types::{Role, Session, Turn};

/// Append-only, chronologically ordered list of turns for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a transcript from stored turns, restoring chronological order.
    /// The sort is stable so turns sharing a timestamp keep their stored order.
    pub fn from_turns(mut turns: Vec<Turn>) -> Self {
        turns.sort_by_key(|t| t.timestamp);
        Self { turns }
    }

    /// Appends a turn. A timestamp earlier than the last turn is clamped
    /// forward so the ordering invariant holds.
    pub fn push(&mut self, role: Role, content: impl Into<String>, at: DateTime<Utc>) -> &Turn {
        let timestamp = match self.turns.last() {
            Some(last) if last.timestamp > at => last.timestamp,
            _ => at,
        };
        self.turns.push(Turn::new(role, content, timestamp));
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn render(&self) -> String {
        render_transcript(&self.turns)
    }
}

/// `Human: ...` / `AI: ...` lines joined by newlines, in transcript order.
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A session together with its transcript. Appending a turn touches the session.
#[derive(Debug, Clone)]
pub struct Conversation {
    session: Session,
    transcript: Transcript,
}

impl Conversation {
    pub fn new(session: Session, turns: Vec<Turn>) -> Self {
        Self {
            session,
            transcript: Transcript::from_turns(turns),
        }
    }

    /// Appends a turn stamped no earlier than `session.last_updated`, then sets
    /// `last_updated` to that stamp. Timestamps are truncated to microseconds,
    /// the precision the relational store keeps.
    pub fn append(&mut self, role: Role, content: impl Into<String>, at: DateTime<Utc>) -> &Turn {
        let at = at.trunc_subsecs(6).max(self.session.last_updated);
        let turn = self.transcript.push(role, content, at);
        self.session.touch(turn.timestamp);
        turn
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Turns appended after the first `from` turns.
    pub fn turns_since(&self, from: usize) -> &[Turn] {
        let turns = self.transcript.turns();
        &turns[from.min(turns.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn turn(role: Role, content: &str, secs: i64) -> Turn {
        Turn::new(role, content, at(secs))
    }

    #[test]
    fn test_render_empty_transcript() {
        assert_eq!(Transcript::new().render(), "");
    }

    #[test]
    fn test_render_alternating_lines() {
        let transcript = Transcript::from_turns(vec![
            turn(Role::Human, "hi", 1),
            turn(Role::Assistant, "hello", 2),
        ]);
        assert_eq!(transcript.render(), "Human: hi\nAI: hello");
    }

    #[test]
    fn test_from_turns_restores_chronological_order() {
        let transcript = Transcript::from_turns(vec![
            turn(Role::Assistant, "second", 2),
            turn(Role::Human, "first", 1),
            turn(Role::Human, "third", 3),
        ]);
        let contents: Vec<_> = transcript.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[test]
    fn test_push_clamps_out_of_order_timestamp() {
        let mut transcript = Transcript::from_turns(vec![turn(Role::Human, "a", 10)]);
        let earlier = at(5);

        let pushed = transcript.push(Role::Assistant, "b", earlier).timestamp;

        assert_eq!(pushed, at(10));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last().unwrap().content, "b");
    }

    #[test]
    fn test_append_sets_last_updated_to_last_turn() {
        let start = Utc::now().trunc_subsecs(6);
        let mut conversation = Conversation::new(Session::new("owner", start), Vec::new());

        for n in 1..=5 {
            conversation.append(Role::Human, format!("msg {}", n), start + Duration::milliseconds(n * 10));
            let last = conversation.transcript().last().unwrap().timestamp;
            assert_eq!(conversation.session().last_updated, last);
        }
        assert_eq!(conversation.transcript().len(), 5);
    }

    #[test]
    fn test_append_never_predates_session() {
        let start = Utc::now().trunc_subsecs(6);
        let mut conversation = Conversation::new(Session::new("owner", start), Vec::new());

        let stamped = conversation
            .append(Role::Human, "late clock", start - Duration::seconds(30))
            .timestamp;

        assert_eq!(stamped, start);
        assert_eq!(conversation.session().last_updated, start);
    }

    #[test]
    fn test_turns_since_returns_new_turns_only() {
        let start = Utc::now();
        let prior = vec![turn(Role::Human, "old", 0)];
        let mut conversation = Conversation::new(Session::new("owner", start), prior);

        conversation.append(Role::Human, "q", start);
        conversation.append(Role::Assistant, "a", start);

        let fresh: Vec<_> = conversation.turns_since(1).iter().map(|t| t.content.as_str()).collect();
        assert_eq!(fresh, ["q", "a"]);
        assert!(conversation.turns_since(10).is_empty());
    }
}
