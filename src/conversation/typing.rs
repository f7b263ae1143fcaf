//! Typing indicator resolution
//!
//! Collapses the overlapping typing/streaming signals into one decision so
//! the generic "..." indicator and a live partial bubble never show at the
//! same time.

use crate::conversation::store::ConversationState;

/// What the typing affordance should display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingIndicator {
    /// Nothing
    Hidden,
    /// Generic animated indicator
    Generic,
    /// Named processing stage shown in place of the generic indicator
    Contextual(String),
}

impl TypingIndicator {
    /// Returns true for anything but [`TypingIndicator::Hidden`]
    pub fn is_visible(&self) -> bool {
        !matches!(self, TypingIndicator::Hidden)
    }
}

/// Decides whether the generic typing indicator is shown
///
/// True when the assistant is typing or streaming, the streaming buffer is
/// still empty, and no streaming message is already present to render its
/// own placeholder bubble.
///
/// # Examples
///
/// ```
/// use coachline::conversation::{should_show_typing_indicator, MessageStore};
///
/// let mut store = MessageStore::new();
/// store.set_typing(true);
/// assert!(should_show_typing_indicator(store.state()));
///
/// store.begin_streaming("m1");
/// store.append_streaming_token("On it");
/// assert!(!should_show_typing_indicator(store.state()));
/// ```
pub fn should_show_typing_indicator(state: &ConversationState) -> bool {
    if !(state.is_typing || state.is_streaming) {
        return false;
    }
    if !state.streaming_buffer.is_empty() {
        return false;
    }
    let placeholder_rendered = state
        .streaming_message_id
        .as_deref()
        .is_some_and(|id| state.message(id).is_some());
    !placeholder_rendered
}

/// Resolver producing the full [`TypingIndicator`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TypingStateResolver;

impl TypingStateResolver {
    /// Resolves the indicator for `state`
    ///
    /// A contextual status replaces the generic indicator whenever the
    /// generic indicator would be shown.
    pub fn resolve(state: &ConversationState) -> TypingIndicator {
        if !should_show_typing_indicator(state) {
            return TypingIndicator::Hidden;
        }
        match &state.contextual_status {
            Some(status) if !status.trim().is_empty() => TypingIndicator::Contextual(status.clone()),
            _ => TypingIndicator::Generic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::message::Message;
    use crate::conversation::store::MessageStore;

    #[test]
    fn test_hidden_when_idle() {
        let store = MessageStore::new();
        assert!(!should_show_typing_indicator(store.state()));
        assert_eq!(
            TypingStateResolver::resolve(store.state()),
            TypingIndicator::Hidden
        );
    }

    #[test]
    fn test_shown_while_typing_without_content() {
        let mut store = MessageStore::new();
        store.set_typing(true);
        assert!(should_show_typing_indicator(store.state()));
        assert_eq!(
            TypingStateResolver::resolve(store.state()),
            TypingIndicator::Generic
        );
    }

    #[test]
    fn test_suppressed_by_non_empty_buffer_even_when_streaming() {
        let mut store = MessageStore::new();
        store.begin_streaming("m1");
        store.append_streaming_token("x");
        assert!(store.state().is_streaming);
        assert!(!should_show_typing_indicator(store.state()));
    }

    #[test]
    fn test_shown_when_streaming_target_not_yet_appended() {
        let mut store = MessageStore::new();
        store.begin_streaming("pending");
        assert!(should_show_typing_indicator(store.state()));
    }

    #[test]
    fn test_suppressed_when_placeholder_bubble_present() {
        let mut store = MessageStore::new();
        store.append_message(Message::assistant("").with_id("m1"));
        store.set_typing(true);
        store.begin_streaming("m1");
        assert!(!should_show_typing_indicator(store.state()));
    }

    #[test]
    fn test_contextual_status_replaces_generic() {
        let mut store = MessageStore::new();
        store.set_typing(true);
        store.set_contextual_status(Some("Analyzing your workout...".to_string()));
        let indicator = TypingStateResolver::resolve(store.state());
        assert_eq!(
            indicator,
            TypingIndicator::Contextual("Analyzing your workout...".to_string())
        );
        assert!(indicator.is_visible());
    }

    #[test]
    fn test_contextual_status_ignored_when_hidden() {
        let mut store = MessageStore::new();
        store.set_contextual_status(Some("stale".to_string()));
        assert_eq!(
            TypingStateResolver::resolve(store.state()),
            TypingIndicator::Hidden
        );
    }
}
