use crate::models::comment::ReactionKind;

/// Label reported back to the caller and carried in broadcast payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Liked,
    Unliked,
    Disliked,
    Undisliked,
}

impl ReactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionAction::Liked => "liked",
            ReactionAction::Unliked => "unliked",
            ReactionAction::Disliked => "disliked",
            ReactionAction::Undisliked => "undisliked",
        }
    }
}

/// Compute the next reaction state for a toggle.
///
/// The state per (comment, user) pair is a single tagged value, so switching
/// from like to dislike replaces the value in one step and a transient
/// double-membership is impossible. Toggling the same kind twice returns to
/// the prior state.
pub fn toggle(
    current: Option<ReactionKind>,
    wanted: ReactionKind,
) -> (Option<ReactionKind>, ReactionAction) {
    match (current, wanted) {
        (Some(ReactionKind::Like), ReactionKind::Like) => (None, ReactionAction::Unliked),
        (Some(ReactionKind::Dislike), ReactionKind::Dislike) => (None, ReactionAction::Undisliked),
        (_, ReactionKind::Like) => (Some(ReactionKind::Like), ReactionAction::Liked),
        (_, ReactionKind::Dislike) => (Some(ReactionKind::Dislike), ReactionAction::Disliked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_like_toggle_cycle() {
        let (state, action) = toggle(None, ReactionKind::Like);
        assert_eq!(state, Some(ReactionKind::Like));
        assert_eq!(action, ReactionAction::Liked);

        let (state, action) = toggle(state, ReactionKind::Like);
        assert_eq!(state, None);
        assert_eq!(action, ReactionAction::Unliked);
    }

    #[test]
    fn test_dislike_toggle_cycle() {
        let (state, action) = toggle(None, ReactionKind::Dislike);
        assert_eq!(state, Some(ReactionKind::Dislike));
        assert_eq!(action, ReactionAction::Disliked);

        let (state, action) = toggle(state, ReactionKind::Dislike);
        assert_eq!(state, None);
        assert_eq!(action, ReactionAction::Undisliked);
    }

    #[test]
    fn test_dislike_replaces_like() {
        let (state, action) = toggle(Some(ReactionKind::Like), ReactionKind::Dislike);
        assert_eq!(state, Some(ReactionKind::Dislike));
        assert_eq!(action, ReactionAction::Disliked);
    }

    #[test]
    fn test_like_replaces_dislike() {
        let (state, action) = toggle(Some(ReactionKind::Dislike), ReactionKind::Like);
        assert_eq!(state, Some(ReactionKind::Like));
        assert_eq!(action, ReactionAction::Liked);
    }

    proptest! {
        /// Any toggle sequence leaves the pair in exactly zero or one
        /// reaction; like and dislike can never both be held.
        #[test]
        fn prop_single_reaction_after_any_sequence(kinds in proptest::collection::vec(any::<bool>(), 0..50)) {
            let mut state: Option<ReactionKind> = None;
            for like in kinds {
                let wanted = if like { ReactionKind::Like } else { ReactionKind::Dislike };
                let (next, _) = toggle(state, wanted);
                state = next;
            }
            // The tagged representation admits only None/Like/Dislike, and a
            // toggle of the held kind always clears it.
            if let Some(kind) = state {
                let (cleared, _) = toggle(state, kind);
                prop_assert_eq!(cleared, None);
            }
        }

        /// Toggling the same kind twice is an identity.
        #[test]
        fn prop_double_toggle_is_identity(start_like in proptest::option::of(any::<bool>()), like in any::<bool>()) {
            let start = start_like.map(|l| if l { ReactionKind::Like } else { ReactionKind::Dislike });
            let wanted = if like { ReactionKind::Like } else { ReactionKind::Dislike };
            let (mid, _) = toggle(start, wanted);
            let (end, _) = toggle(mid, wanted);
            // Two toggles of the same intent land back on a state with the
            // same membership for `wanted` as the start.
            prop_assert_eq!(end == Some(wanted), start == Some(wanted));
        }
    }
}
