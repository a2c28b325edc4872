// Draw engine: eligibility, random selection, and committing the result.

use std::collections::HashSet;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::participant::{Participant, ParticipantId};
use crate::store::{AssignmentUpdate, ParticipantRepository, StoreError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    /// Nobody is left for this actor under the current exclusions.
    #[error("No participant is available for you to draw.")]
    Exhausted,

    /// The acting participant is not part of the snapshot.
    #[error("participant {0} is not in the current participant list")]
    UnknownActor(ParticipantId),
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("participant store is not configured")]
    NotConfigured,

    /// The store refused the write because the actor already drew someone
    /// else or the target was claimed by another drawer.
    #[error("draw conflict: {0}")]
    Conflict(String),

    #[error("participant {0} cannot draw themself")]
    SelfAssignment(ParticipantId),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CommitError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotConfigured => CommitError::NotConfigured,
            StoreError::Conflict(detail) => CommitError::Conflict(detail),
            other => CommitError::Store(other),
        }
    }
}

pub type CommitResult = Result<(), CommitError>;

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Ids of every participant already drawn by someone.
///
/// An assignment with a target id claims exactly that participant. An
/// assignment recorded by name only claims every participant carrying
/// that name, so duplicate names can never be drawn twice.
pub fn taken_targets(all: &[Participant]) -> HashSet<ParticipantId> {
    let mut taken = HashSet::new();
    let mut taken_names = HashSet::new();

    for p in all.iter().filter(|p| p.has_secret_assigned) {
        match (p.assigned_target_id, p.assigned_target_name.as_deref()) {
            (Some(id), _) => {
                taken.insert(id);
            }
            (None, Some(name)) => {
                taken_names.insert(name);
            }
            (None, None) => {}
        }
    }

    taken.extend(
        all.iter()
            .filter(|p| taken_names.contains(p.name.as_str()))
            .map(|p| p.id),
    );
    taken
}

/// Everyone `actor` may draw: not themself and not already taken.
/// Snapshot order is preserved.
///
/// An actor who has already drawn still gets a normal answer; blocking a
/// second draw is up to the caller.
pub fn eligible_targets<'a>(all: &'a [Participant], actor: &Participant) -> Vec<&'a Participant> {
    let taken = taken_targets(all);
    all.iter()
        .filter(|p| p.id != actor.id && !taken.contains(&p.id))
        .collect()
}

/// Pick one eligible target uniformly at random. Nothing is written.
pub fn draw<'a, R>(
    all: &'a [Participant],
    actor: &Participant,
    rng: &mut R,
) -> Result<&'a Participant, DrawError>
where
    R: Rng + ?Sized,
{
    if !all.iter().any(|p| p.id == actor.id) {
        return Err(DrawError::UnknownActor(actor.id));
    }

    let eligible = eligible_targets(all, actor);
    if eligible.is_empty() {
        debug!(actor = %actor.id, "no eligible targets left");
        return Err(DrawError::Exhausted);
    }

    let index = rng.random_range(0..eligible.len());
    debug!(actor = %actor.id, candidates = eligible.len(), "target drawn");
    Ok(eligible[index])
}

// ---------------------------------------------------------------------------
// Proposal and commit
// ---------------------------------------------------------------------------

/// A drawn target that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub actor: Participant,
    pub target: Participant,
}

/// `draw`, packaged as an owned proposal ready for `commit`.
pub fn propose<R>(all: &[Participant], actor: &Participant, rng: &mut R) -> Result<Proposal, DrawError>
where
    R: Rng + ?Sized,
{
    let target = draw(all, actor, rng)?;
    Ok(Proposal {
        actor: actor.clone(),
        target: target.clone(),
    })
}

/// Persist a proposal: the actor becomes assigned to the proposed target.
///
/// Not retried here. Committing the same proposal again after a success is
/// a no-op at the store. Callers reload the snapshot afterwards.
pub async fn commit(repository: &ParticipantRepository, proposal: &Proposal) -> CommitResult {
    let actor = proposal.actor.id;
    if actor == proposal.target.id {
        return Err(CommitError::SelfAssignment(actor));
    }

    let update = AssignmentUpdate::for_target(&proposal.target);
    repository.try_update_participant(actor, &update).await?;

    info!(participant = %actor, "draw committed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
