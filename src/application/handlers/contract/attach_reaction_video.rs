//! AttachReactionVideoHandler - Licensee selects the reaction video.

use std::sync::Arc;

use super::commit::{commit_with_retry, ContractUpdate, Staged};
use crate::domain::contract::{ContractError, Party};
use crate::domain::foundation::{ContractId, Timestamp, UserId, VideoId};
use crate::ports::ContractRepository;

#[derive(Debug, Clone)]
pub struct AttachReactionVideoCommand {
    pub contract_id: ContractId,
    pub requested_by: UserId,
    pub reaction_video_id: VideoId,
}

/// Handler for filling in the reaction video.
///
/// Attaching changes the contract's triple, so the store may refuse it as
/// a duplicate of another blocking contract.
pub struct AttachReactionVideoHandler {
    contracts: Arc<dyn ContractRepository>,
}

impl AttachReactionVideoHandler {
    pub fn new(contracts: Arc<dyn ContractRepository>) -> Self {
        Self { contracts }
    }

    pub async fn handle(
        &self,
        cmd: AttachReactionVideoCommand,
    ) -> Result<ContractUpdate, ContractError> {
        let (committed, _) =
            commit_with_retry(self.contracts.as_ref(), cmd.contract_id, |contract| {
                contract.check_party(&cmd.requested_by, Party::Licensee, "choose the reaction video for")?;
                let transition =
                    contract.attach_reaction_video(cmd.reaction_video_id.clone(), Timestamp::now())?;
                Ok((Staged::from_transition(transition), ()))
            })
            .await?;

        if committed.is_applied() {
            tracing::info!(
                contract_id = %cmd.contract_id,
                reaction_video_id = %cmd.reaction_video_id,
                "Reaction video attached"
            );
        }
        Ok(committed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::{Contract, ContractStatus};

    use super::super::test_support::{contract_in, licensee, seeded_store};

    fn without_video(status: ContractStatus) -> Contract {
        let mut contract = contract_in(status);
        contract.reaction_video_id = None;
        contract
    }

    fn attach(id: ContractId, video: &str) -> AttachReactionVideoCommand {
        AttachReactionVideoCommand {
            contract_id: id,
            requested_by: licensee(),
            reaction_video_id: VideoId::new(video).unwrap(),
        }
    }

    #[tokio::test]
    async fn fills_missing_video_once() {
        let (store, id) = seeded_store(without_video(ContractStatus::PendingPayment));
        let handler = AttachReactionVideoHandler::new(store.clone());

        let first = handler.handle(attach(id, "react-9")).await.unwrap();
        let replay = handler.handle(attach(id, "react-9")).await.unwrap();

        assert!(first.changed);
        assert!(!replay.changed);
        assert_eq!(
            store.contract(&id).unwrap().reaction_video_id,
            Some(VideoId::new("react-9").unwrap())
        );
    }

    #[tokio::test]
    async fn a_different_video_cannot_replace_the_first() {
        let (store, id) = seeded_store(without_video(ContractStatus::PendingReview));
        let handler = AttachReactionVideoHandler::new(store);

        handler.handle(attach(id, "react-9")).await.unwrap();
        let err = handler.handle(attach(id, "react-10")).await.unwrap_err();

        assert_eq!(err, ContractError::ReactionVideoAlreadySet(id));
    }

    #[tokio::test]
    async fn attaching_onto_a_blocked_triple_is_duplicate() {
        let (store, id) = seeded_store(without_video(ContractStatus::PendingReview));
        let other = contract_in(ContractStatus::PendingReview);
        let other_id = other.id;
        store.put(other);
        let handler = AttachReactionVideoHandler::new(store.clone());

        let err = handler.handle(attach(id, "react-1")).await.unwrap_err();

        assert_eq!(err, ContractError::duplicate(other_id));
        assert_eq!(store.contract(&id).unwrap().reaction_video_id, None);
    }
}
