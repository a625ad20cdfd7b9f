//! Per-party visibility of a message.
//!
//! A message row carries a (trashed, deleted) flag pair for each party. Each
//! pair decodes to a [`BoxState`]; the two parties move independently. Once
//! both parties have deleted a message, nobody can see it any more and the
//! row (with its attachments) is purged.

use serde::{Deserialize, Serialize};

use crate::models::Party;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxState {
    Active,
    Trashed,
    Deleted,
}

impl BoxState {
    pub fn from_flags(trashed: bool, deleted: bool) -> Self {
        match (trashed, deleted) {
            (_, true) => Self::Deleted,
            (true, false) => Self::Trashed,
            (false, false) => Self::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxAction {
    Trash,
    Restore,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The flags changed.
    Applied,
    /// The party was already in the target state.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("message was already deleted by this party")]
    AlreadyDeleted,
}

/// The four mailbox flags of one message row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxFlags {
    pub trashed_by_sender: bool,
    pub trashed_by_receiver: bool,
    pub deleted_by_sender: bool,
    pub deleted_by_receiver: bool,
}

impl MailboxFlags {
    pub fn state(&self, party: Party) -> BoxState {
        match party {
            Party::Sender => BoxState::from_flags(self.trashed_by_sender, self.deleted_by_sender),
            Party::Receiver => {
                BoxState::from_flags(self.trashed_by_receiver, self.deleted_by_receiver)
            }
        }
    }

    fn pair_mut(&mut self, party: Party) -> (&mut bool, &mut bool) {
        match party {
            Party::Sender => (&mut self.trashed_by_sender, &mut self.deleted_by_sender),
            Party::Receiver => (&mut self.trashed_by_receiver, &mut self.deleted_by_receiver),
        }
    }

    /// Apply `action` on behalf of `party`.
    ///
    /// Deleting keeps the trashed flag as it was; the deleted flag alone
    /// decides that the party no longer sees the message.
    pub fn apply(&mut self, party: Party, action: MailboxAction) -> Result<Transition, TransitionError> {
        let current = self.state(party);
        let (trashed, deleted) = self.pair_mut(party);

        match (action, current) {
            (MailboxAction::Delete, BoxState::Deleted) => Ok(Transition::Unchanged),
            (MailboxAction::Delete, _) => {
                *deleted = true;
                Ok(Transition::Applied)
            }
            (_, BoxState::Deleted) => Err(TransitionError::AlreadyDeleted),
            (MailboxAction::Trash, BoxState::Trashed) => Ok(Transition::Unchanged),
            (MailboxAction::Trash, BoxState::Active) => {
                *trashed = true;
                Ok(Transition::Applied)
            }
            (MailboxAction::Restore, BoxState::Active) => Ok(Transition::Unchanged),
            (MailboxAction::Restore, BoxState::Trashed) => {
                *trashed = false;
                Ok(Transition::Applied)
            }
        }
    }

    /// Both parties deleted the message: the row can be removed.
    pub fn is_purgeable(&self) -> bool {
        self.deleted_by_sender && self.deleted_by_receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_message_is_active_for_both_parties() {
        let flags = MailboxFlags::default();
        assert_eq!(flags.state(Party::Sender), BoxState::Active);
        assert_eq!(flags.state(Party::Receiver), BoxState::Active);
        assert!(!flags.is_purgeable());
    }

    #[test]
    fn trash_and_restore_only_touch_the_acting_party() {
        let mut flags = MailboxFlags::default();

        assert_eq!(flags.apply(Party::Receiver, MailboxAction::Trash), Ok(Transition::Applied));
        assert!(flags.trashed_by_receiver);
        assert_eq!(flags.state(Party::Sender), BoxState::Active);

        assert_eq!(flags.apply(Party::Receiver, MailboxAction::Trash), Ok(Transition::Unchanged));

        assert_eq!(flags.apply(Party::Receiver, MailboxAction::Restore), Ok(Transition::Applied));
        assert_eq!(flags, MailboxFlags::default());

        assert_eq!(flags.apply(Party::Sender, MailboxAction::Restore), Ok(Transition::Unchanged));
    }

    #[test]
    fn delete_works_from_active_and_trashed() {
        let mut flags = MailboxFlags::default();
        flags.apply(Party::Sender, MailboxAction::Delete).unwrap();
        assert_eq!(flags.state(Party::Sender), BoxState::Deleted);

        flags.apply(Party::Receiver, MailboxAction::Trash).unwrap();
        flags.apply(Party::Receiver, MailboxAction::Delete).unwrap();
        assert_eq!(flags.state(Party::Receiver), BoxState::Deleted);
        assert!(flags.trashed_by_receiver);
    }

    #[test]
    fn deleted_party_cannot_trash_or_restore() {
        let mut flags = MailboxFlags {
            deleted_by_receiver: true,
            ..Default::default()
        };
        assert_eq!(
            flags.apply(Party::Receiver, MailboxAction::Trash),
            Err(TransitionError::AlreadyDeleted)
        );
        assert_eq!(
            flags.apply(Party::Receiver, MailboxAction::Restore),
            Err(TransitionError::AlreadyDeleted)
        );
        assert_eq!(flags.apply(Party::Receiver, MailboxAction::Delete), Ok(Transition::Unchanged));
    }

    #[test]
    fn purgeable_only_when_both_parties_deleted() {
        let mut flags = MailboxFlags::default();
        flags.apply(Party::Sender, MailboxAction::Delete).unwrap();
        assert!(!flags.is_purgeable());
        flags.apply(Party::Receiver, MailboxAction::Delete).unwrap();
        assert!(flags.is_purgeable());
    }

    #[test]
    fn deleted_flag_wins_over_trashed_flag() {
        assert_eq!(BoxState::from_flags(true, true), BoxState::Deleted);
        assert_eq!(BoxState::from_flags(false, true), BoxState::Deleted);
        assert_eq!(BoxState::from_flags(true, false), BoxState::Trashed);
        assert_eq!(BoxState::from_flags(false, false), BoxState::Active);
    }
}
