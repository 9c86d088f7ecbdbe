use sp_base::{ChainId, Slot, XtId};
use sp_wire::CircMessage;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::time::Instant;

/// Why an xT aborted (§3, §4.3): a participant voted no, or the instance
/// timer fired before every participant voted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    Vote,
    Timeout,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Vote => write!(f, "vote"),
            AbortReason::Timeout => write!(f, "timeout"),
        }
    }
}

/// `decision ∈ {Undecided, Commit, Abort}` (§3). `Abort` carries the reason
/// it happened, which the history keeps for observability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Undecided,
    Commit,
    Abort(AbortReason),
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Decision::Undecided)
    }

    pub fn as_commit_bool(&self) -> Option<bool> {
        match self {
            Decision::Commit => Some(true),
            Decision::Abort(_) => Some(false),
            Decision::Undecided => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Undecided => write!(f, "undecided"),
            Decision::Commit => write!(f, "commit"),
            Decision::Abort(reason) => write!(f, "abort({reason})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartInstanceError {
    DuplicateInstance,
    EmptyParticipants,
}

impl fmt::Display for StartInstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartInstanceError::DuplicateInstance => write!(f, "xT instance already started"),
            StartInstanceError::EmptyParticipants => write!(f, "xT request names no participating chains"),
        }
    }
}

impl std::error::Error for StartInstanceError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteError {
    UnknownInstance,
    NonParticipant,
    DuplicateVote,
}

impl fmt::Display for VoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteError::UnknownInstance => write!(f, "no live xT instance for this id"),
            VoteError::NonParticipant => write!(f, "voting chain did not participate in this xT"),
            VoteError::DuplicateVote => write!(f, "chain has already voted on this xT"),
        }
    }
}

impl std::error::Error for VoteError {}

/// Live state for one in-flight xT (§3 XTInstance). Owned by exactly one
/// slot and mutated only while holding its per-instance lock.
pub(crate) struct InstanceState {
    pub xt_id: XtId,
    pub slot: Slot,
    pub sequence_number: u64,
    pub participants: BTreeSet<ChainId>,
    pub votes: BTreeMap<ChainId, bool>,
    pub decision: Decision,
    pub started_at: Instant,
    pub deadline: Instant,
    pub circ_messages: BTreeMap<ChainId, VecDeque<CircMessage>>,
}

impl InstanceState {
    pub fn new(xt_id: XtId, slot: Slot, sequence_number: u64, participants: BTreeSet<ChainId>, deadline: Instant) -> Self {
        InstanceState {
            xt_id,
            slot,
            sequence_number,
            participants,
            votes: BTreeMap::new(),
            decision: Decision::Undecided,
            started_at: Instant::now(),
            deadline,
            circ_messages: BTreeMap::new(),
        }
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            xt_id: self.xt_id,
            slot: self.slot,
            sequence_number: self.sequence_number,
            participants: self.participants.clone(),
            votes: self.votes.clone(),
            decision: self.decision,
        }
    }
}

/// A read-only view of an instance's state, handed back by `Engine::snapshot`
/// and `Engine::history` — never mutable, since the live instance may be
/// concurrently decided the moment after it's taken.
#[derive(Clone, Debug)]
pub struct InstanceSnapshot {
    pub xt_id: XtId,
    pub slot: Slot,
    pub sequence_number: u64,
    pub participants: BTreeSet<ChainId>,
    pub votes: BTreeMap<ChainId, bool>,
    pub decision: Decision,
}
