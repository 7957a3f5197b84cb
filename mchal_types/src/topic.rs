//! Topics and topic filters, and the wildcard-matching algorithm.
//!
//! A [`Topic`] is a concrete, wildcard-free sequence of tokens — what gets
//! published. A [`TopicFilter`] is a subscription pattern that may contain
//! wildcard tokens. Because the wildcard token values are configured per
//! bus instance (defaults `+`/`#`, but both configurable and required to
//! be distinct and non-empty), the match predicate takes the wildcard
//! tokens as parameters rather than assuming fixed text values.

use thiserror::Error;

use crate::token::Token;
use crate::CapabilityAddress;

/// A malformed topic or topic filter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopicError {
    /// A topic or filter with zero tokens.
    #[error("topic must have at least one token")]
    Empty,
    /// A concrete (published/retained) topic contained a wildcard token.
    #[error("published topic may not contain a wildcard token")]
    WildcardInPublishedTopic,
    /// The multi-level wildcard appeared somewhere other than the final
    /// token of a filter.
    #[error("multi-level wildcard must be the final token of a filter")]
    MultiWildcardNotFinal,
    /// A control topic did not have exactly seven tokens, or a token
    /// expected to be text was not.
    #[error("invalid control topic shape")]
    InvalidControlShape,
}

/// A concrete, published topic: an ordered, non-empty sequence of tokens
/// containing no wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(Vec<Token>);

impl Topic {
    /// Build a topic from tokens, without wildcard validation. Used
    /// internally and by callers (such as [`CapabilityAddress::base_topic`])
    /// that are known by construction not to contain wildcards.
    pub fn new(tokens: Vec<Token>) -> Self {
        Topic(tokens)
    }

    /// Build a topic from plain string segments, one token per segment.
    pub fn from_strs<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        Topic(segments.into_iter().map(Token::text).collect())
    }

    /// Validate that this topic is non-empty and (given the bus's
    /// configured wildcard tokens) contains no wildcard token — required
    /// before publish or before storing as retained.
    pub fn validate_publishable(&self, single: &Token, multi: &Token) -> Result<(), TopicError> {
        if self.0.is_empty() {
            return Err(TopicError::Empty);
        }
        if self.0.iter().any(|t| t == single || t == multi) {
            return Err(TopicError::WildcardInPublishedTopic);
        }
        Ok(())
    }

    /// Borrow the token sequence.
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    /// Append a token, returning a new topic (used to build reply-to and
    /// derived capability topics).
    pub fn join(&self, tail: impl IntoIterator<Item = Token>) -> Topic {
        let mut v = self.0.clone();
        v.extend(tail);
        Topic(v)
    }

    /// Parse this topic as a capability control topic
    /// `hal/cap/<domain>/<kind>/<name>/control/<verb>`. Fails with
    /// [`TopicError::InvalidControlShape`] if the topic does not have
    /// exactly seven tokens or any token is not text, per the control
    /// dispatch rule.
    pub fn parse_control(&self) -> Result<(CapabilityAddress, String), TopicError> {
        if self.0.len() != 7 {
            return Err(TopicError::InvalidControlShape);
        }
        let texts: Vec<&str> = self
            .0
            .iter()
            .map(Token::as_text)
            .collect::<Option<Vec<_>>>()
            .ok_or(TopicError::InvalidControlShape)?;
        if texts[0] != "hal" || texts[1] != "cap" || texts[5] != "control" {
            return Err(TopicError::InvalidControlShape);
        }
        Ok((
            CapabilityAddress::new(texts[2], texts[3], texts[4]),
            texts[6].to_string(),
        ))
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{t}")?;
        }
        Ok(())
    }
}

/// A subscription pattern: an ordered, non-empty sequence of tokens that
/// may include wildcard tokens (themselves ordinary [`Token::Text`]
/// values whose content happens to equal the bus's configured wildcard
/// strings).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter(Vec<Token>);

impl TopicFilter {
    /// Build a filter from tokens and validate wildcard placement: the
    /// multi-level wildcard, if present, must be the final token.
    pub fn new(tokens: Vec<Token>, single: &Token, multi: &Token) -> Result<Self, TopicError> {
        if tokens.is_empty() {
            return Err(TopicError::Empty);
        }
        let _ = single;
        if let Some(pos) = tokens.iter().position(|t| t == multi) {
            if pos != tokens.len() - 1 {
                return Err(TopicError::MultiWildcardNotFinal);
            }
        }
        Ok(TopicFilter(tokens))
    }

    /// Build a filter from plain string segments, one token per segment.
    pub fn from_strs<'a>(
        segments: impl IntoIterator<Item = &'a str>,
        single: &Token,
        multi: &Token,
    ) -> Result<Self, TopicError> {
        TopicFilter::new(segments.into_iter().map(Token::text).collect(), single, multi)
    }

    /// Borrow the token sequence.
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    /// Does this filter match the given concrete topic, per the matching
    /// algorithm: single-wildcard consumes exactly one token, multi-
    /// wildcard (final position only) consumes zero or more remaining
    /// tokens, any other token matches by value equality.
    pub fn matches(&self, topic: &Topic, single: &Token, multi: &Token) -> bool {
        let pattern = &self.0;
        let published = topic.tokens();

        let mut pi = 0usize; // pattern index
        let mut ti = 0usize; // topic index
        while pi < pattern.len() {
            let ptok = &pattern[pi];
            if ptok == multi {
                // Only legal as the final pattern token (enforced at
                // construction); matches everything remaining.
                return true;
            }
            if ti >= published.len() {
                return false;
            }
            if ptok == single || ptok == &published[ti] {
                pi += 1;
                ti += 1;
                continue;
            }
            return false;
        }
        ti == published.len()
    }
}

impl std::fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{t}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus() -> Token {
        Token::text("+")
    }
    fn hash() -> Token {
        Token::text("#")
    }

    fn topic(segs: &[&str]) -> Topic {
        Topic::from_strs(segs.iter().copied())
    }

    fn filter(segs: &[&str]) -> TopicFilter {
        TopicFilter::from_strs(segs.iter().copied(), &plus(), &hash()).unwrap()
    }

    #[test]
    fn exact_match() {
        assert!(filter(&["a"]).matches(&topic(&["a"]), &plus(), &hash()));
        assert!(!filter(&["a"]).matches(&topic(&["b"]), &plus(), &hash()));
    }

    #[test]
    fn single_wildcard_consumes_one_token() {
        let f = filter(&["a", "+", "c"]);
        assert!(f.matches(&topic(&["a", "b", "c"]), &plus(), &hash()));
        assert!(!f.matches(&topic(&["a", "c"]), &plus(), &hash()));
        assert!(!f.matches(&topic(&["a", "b", "c", "d"]), &plus(), &hash()));
    }

    #[test]
    fn multi_wildcard_matches_zero_or_more_trailing() {
        let f = filter(&["a", "#"]);
        assert!(f.matches(&topic(&["a"]), &plus(), &hash()));
        assert!(f.matches(&topic(&["a", "b"]), &plus(), &hash()));
        assert!(f.matches(&topic(&["a", "b", "c"]), &plus(), &hash()));
        assert!(!f.matches(&topic(&["b"]), &plus(), &hash()));
    }

    #[test]
    fn bare_hash_matches_any_nonempty_topic() {
        let f = filter(&["#"]);
        assert!(f.matches(&topic(&["a"]), &plus(), &hash()));
        assert!(f.matches(&topic(&["a", "b", "c"]), &plus(), &hash()));
    }

    #[test]
    fn multi_wildcard_must_be_final() {
        let err = TopicFilter::new(
            vec![Token::text("a"), hash(), Token::text("c")],
            &plus(),
            &hash(),
        )
        .unwrap_err();
        assert_eq!(err, TopicError::MultiWildcardNotFinal);
    }

    #[test]
    fn publish_rejects_wildcard_tokens() {
        let t = topic(&["a", "+"]);
        assert_eq!(
            t.validate_publishable(&plus(), &hash()).unwrap_err(),
            TopicError::WildcardInPublishedTopic
        );
    }

    #[test]
    fn scenario_s4_wildcard_replay_shapes() {
        // a/#, a/+/#, a/+ against a, a/b, a/b/c, a/x
        let topics = [topic(&["a"]), topic(&["a", "b"]), topic(&["a", "b", "c"]), topic(&["a", "x"])];
        let a_hash = filter(&["a", "#"]);
        let matched: Vec<_> = topics.iter().filter(|t| a_hash.matches(t, &plus(), &hash())).collect();
        assert_eq!(matched.len(), 4);

        let a_plus_hash = filter(&["a", "+", "#"]);
        let matched: Vec<_> = topics
            .iter()
            .filter(|t| a_plus_hash.matches(t, &plus(), &hash()))
            .collect();
        assert_eq!(matched.len(), 3); // a/b, a/b/c, a/x

        let a_plus = filter(&["a", "+"]);
        let matched: Vec<_> = topics.iter().filter(|t| a_plus.matches(t, &plus(), &hash())).collect();
        assert_eq!(matched.len(), 2); // a/b, a/x
    }

    #[test]
    fn parse_control_topic() {
        let t = topic(&["hal", "cap", "io", "switch", "rail1", "control", "set"]);
        let (addr, verb) = t.parse_control().unwrap();
        assert_eq!(addr.domain, "io");
        assert_eq!(addr.kind, "switch");
        assert_eq!(addr.name, "rail1");
        assert_eq!(verb, "set");
    }

    #[test]
    fn parse_control_rejects_short_topic() {
        let t = topic(&["hal", "cap", "io"]);
        assert_eq!(t.parse_control().unwrap_err(), TopicError::InvalidControlShape);
    }
}
