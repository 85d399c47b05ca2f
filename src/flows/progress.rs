// Explicit state machines for flows and signature rounds
//
// Flows record every stage they pass through, so a finished (or failed)
// run can be inspected without a live network.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Stage of an initiating flow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStage {
    Building,
    Verifying,
    Signing,
    CollectingSignatures,
    Notarising,
    Done,
    Failed(String),
}

impl FlowStage {
    /// Check if transition to another stage is valid
    pub fn can_transition_to(&self, target: &FlowStage) -> bool {
        match (self, target) {
            (Self::Building, Self::Verifying) => true,
            (Self::Verifying, Self::Signing) => true,
            (Self::Signing, Self::CollectingSignatures) => true,
            (Self::CollectingSignatures, Self::Notarising) => true,
            (Self::Notarising, Self::Done) => true,
            (Self::Done, _) | (Self::Failed(_), _) => false,
            (_, Self::Failed(_)) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// Records the stages a flow has passed through
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    flow: &'static str,
    history: Vec<FlowStage>,
}

impl ProgressTracker {
    pub fn new(flow: &'static str) -> Self {
        Self {
            flow,
            history: vec![FlowStage::Building],
        }
    }

    pub fn stage(&self) -> &FlowStage {
        // history always holds the initial stage
        &self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[FlowStage] {
        &self.history
    }

    /// Move to the next stage; out-of-order moves are ignored
    pub fn advance(&mut self, next: FlowStage) {
        if !self.stage().can_transition_to(&next) {
            debug!(flow = self.flow, from = ?self.stage(), to = ?next, "ignoring invalid stage change");
            return;
        }
        info!(flow = self.flow, stage = ?next, "flow progress");
        self.history.push(next);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.advance(FlowStage::Failed(reason.into()));
    }
}

/// State of one signature request, seen from either side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectorState {
    /// The partially signed transition is with the responder
    Sent,
    /// The responder is re-running validation and resolving inputs
    Validating,
    Signed,
    Rejected,
    Done,
}

impl CollectorState {
    pub fn can_transition_to(&self, target: &CollectorState) -> bool {
        matches!(
            (self, target),
            (Self::Sent, Self::Validating)
                | (Self::Validating, Self::Signed)
                | (Self::Validating, Self::Rejected)
                | (Self::Signed, Self::Done)
                | (Self::Rejected, Self::Done)
        )
    }
}

/// One signature round: SENT -> VALIDATING -> SIGNED | REJECTED -> DONE
#[derive(Clone, Debug)]
pub struct SignatureRound {
    history: Vec<CollectorState>,
}

impl SignatureRound {
    pub fn new() -> Self {
        Self {
            history: vec![CollectorState::Sent],
        }
    }

    pub fn state(&self) -> CollectorState {
        self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[CollectorState] {
        &self.history
    }

    /// Returns false, leaving the state unchanged, when the move is not allowed
    pub fn advance(&mut self, next: CollectorState) -> bool {
        if !self.state().can_transition_to(&next) {
            return false;
        }
        self.history.push(next);
        true
    }

    /// Record a terminal outcome and close the round
    pub fn finish(&mut self, outcome: CollectorState) {
        if self.state() == CollectorState::Sent {
            self.advance(CollectorState::Validating);
        }
        self.advance(outcome);
        self.advance(CollectorState::Done);
    }
}

impl Default for SignatureRound {
    fn default() -> Self {
        Self::new()
    }
}
