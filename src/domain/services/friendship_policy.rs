//! Friendship transition rules.
//!
//! Decides whether an actor may apply an action to the relationship they have
//! with a target, given the current row (if any). Storage is not touched here.

use crate::domain::entities::{Friendship, FriendshipStatus};

/// A transition requested by the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FriendshipAction {
    SendRequest,
    Accept,
    Reject,
    Cancel,
    Unfriend,
    Block,
    Unblock,
}

impl FriendshipAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendRequest => "send_request",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::Unfriend => "unfriend",
            Self::Block => "block",
            Self::Unblock => "unblock",
        }
    }

    /// Status the row must still have for a deleting transition to apply.
    pub fn expected_status_for_delete(&self) -> Option<FriendshipStatus> {
        match self {
            Self::Reject | Self::Cancel => Some(FriendshipStatus::Pending),
            Self::Unfriend => Some(FriendshipStatus::Accepted),
            Self::Unblock => Some(FriendshipStatus::Blocked),
            Self::SendRequest | Self::Accept | Self::Block => None,
        }
    }
}

/// Why a transition is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FriendshipViolation {
    #[error("You cannot target yourself")]
    SelfTarget,

    #[error("Friend request already sent")]
    AlreadySent,

    #[error("This user has already sent you a friend request")]
    IncomingPending,

    #[error("You are already friends")]
    AlreadyFriends,

    #[error("This relationship is blocked")]
    Blocked,

    #[error("No pending friend request")]
    NoPendingRequest,

    #[error("Only the recipient can answer a friend request")]
    NotAddressee,

    #[error("Only the sender can cancel a friend request")]
    NotRequester,

    #[error("You are not friends with this user")]
    NotFriends,

    #[error("This user is not blocked")]
    NotBlocked,

    #[error("This block was issued by the other user")]
    BlockedByOther,
}

/// Pure friendship state machine.
pub struct FriendshipPolicy;

impl FriendshipPolicy {
    /// Check `action` by `actor` against `target`, where `existing` is the pair's row.
    pub fn check(
        actor: i64,
        target: i64,
        existing: Option<&Friendship>,
        action: FriendshipAction,
    ) -> Result<(), FriendshipViolation> {
        if actor == target {
            return Err(FriendshipViolation::SelfTarget);
        }

        let status = existing.map(|f| f.status).unwrap_or_default();

        match action {
            FriendshipAction::SendRequest => match (status, existing) {
                (FriendshipStatus::None, _) => Ok(()),
                (FriendshipStatus::Pending, Some(f)) if f.is_requester(actor) => {
                    Err(FriendshipViolation::AlreadySent)
                }
                (FriendshipStatus::Pending, _) => Err(FriendshipViolation::IncomingPending),
                (FriendshipStatus::Accepted, _) => Err(FriendshipViolation::AlreadyFriends),
                (FriendshipStatus::Blocked, _) => Err(FriendshipViolation::Blocked),
            },

            FriendshipAction::Accept | FriendshipAction::Reject => {
                let f = Self::pending(existing)?;
                if f.is_addressee(actor) {
                    Ok(())
                } else {
                    Err(FriendshipViolation::NotAddressee)
                }
            }

            FriendshipAction::Cancel => {
                let f = Self::pending(existing)?;
                if f.is_requester(actor) {
                    Ok(())
                } else {
                    Err(FriendshipViolation::NotRequester)
                }
            }

            FriendshipAction::Unfriend => match status {
                FriendshipStatus::Accepted => Ok(()),
                _ => Err(FriendshipViolation::NotFriends),
            },

            // Any state. An existing block is kept as is, see `block_keeps_existing`.
            FriendshipAction::Block => Ok(()),

            FriendshipAction::Unblock => match existing {
                Some(f) if f.is_blocked_by(actor) => Ok(()),
                Some(f) if f.status == FriendshipStatus::Blocked => {
                    Err(FriendshipViolation::BlockedByOther)
                }
                _ => Err(FriendshipViolation::NotBlocked),
            },
        }
    }

    /// Whether a permitted block leaves the row untouched. A block is never
    /// rewritten, so only the user who issued it can lift it.
    pub fn block_keeps_existing(existing: Option<&Friendship>) -> bool {
        matches!(existing, Some(f) if f.status == FriendshipStatus::Blocked)
    }

    fn pending(existing: Option<&Friendship>) -> Result<&Friendship, FriendshipViolation> {
        match existing {
            Some(f) if f.status == FriendshipStatus::Pending => Ok(f),
            _ => Err(FriendshipViolation::NoPendingRequest),
        }
    }
}
