//! The previously realized state of an environment.
//!
//! A planning request either has no baseline (first creation) or carries the
//! last realized message of the same environment. [`Previous`] makes that
//! choice explicit so every stage handles the first-creation case.

use crate::error::{InvariantError, Result, StoreError};
use crate::message::OutboundMessage;
use crate::workflow::WorkflowGraph;

use super::state::TargetState;
use super::types::Bootstrapping;

/// Last realized state of an environment.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousState {
    /// The realized target state.
    pub state: TargetState,
    /// The graph that realized it.
    pub workflow: WorkflowGraph,
    /// Externally visible endpoint, once known.
    pub endpoint: Option<String>,
    /// Serialized copy of the message this state was read from.
    pub snapshot: String,
}

/// Baseline for a planning request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Previous {
    /// The environment does not exist yet.
    #[default]
    Absent,
    /// The environment was realized before.
    Present(Box<PreviousState>),
}

impl PreviousState {
    /// Reads the previous state out of a realized message.
    ///
    /// The snapshot drops the message's own nested snapshot so the chain of
    /// embedded messages stays one level deep.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be serialized.
    pub fn from_message(message: &OutboundMessage) -> Result<Self> {
        let mut flattened = message.clone();
        flattened.previous = None;
        let snapshot = serde_json::to_string(&flattened)
            .map_err(|e| StoreError::serialization(format!("Failed to snapshot message: {e}")))?;

        Ok(Self {
            state: message.state.clone(),
            workflow: message.workflow.clone(),
            endpoint: message.endpoint.clone(),
            snapshot,
        })
    }

    /// Checks that a request keeps the environment's bootstrapping mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested mode differs from the recorded one.
    pub fn check_bootstrapping(
        &self,
        requested: &Bootstrapping,
    ) -> std::result::Result<(), InvariantError> {
        if self.state.bootstrapping == *requested {
            Ok(())
        } else {
            Err(InvariantError::BootstrappingChanged {
                previous: self.state.bootstrapping.to_string(),
                requested: requested.to_string(),
            })
        }
    }
}

impl Previous {
    /// Builds a baseline from an optional realized message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be snapshotted.
    pub fn from_message(message: Option<&OutboundMessage>) -> Result<Self> {
        match message {
            None => Ok(Self::Absent),
            Some(message) => Ok(Self::Present(Box::new(PreviousState::from_message(message)?))),
        }
    }

    /// Returns the previous target state, if any.
    #[must_use]
    pub fn state(&self) -> Option<&TargetState> {
        match self {
            Self::Absent => None,
            Self::Present(previous) => Some(&previous.state),
        }
    }

    /// Returns true if the environment already exists.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}
