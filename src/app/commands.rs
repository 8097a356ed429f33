//! Inbound commands to the node.
//!
//! The transport delivers raw strings; only an exact match is acted upon.

/// Literal written by the client to request a zero-point calibration.
pub const START_CALIBRATION: &str = "START_CAL";

/// Value the command attribute is reset to once a write has been consumed.
pub const READY_ACK: &str = "READY";

/// Commands the [`NodeService`](super::service::NodeService) understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    /// Begin the stabilize → pulse calibration sequence.
    StartCalibration,
}

impl NodeCommand {
    /// Exact, case-sensitive match.  Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            START_CALIBRATION => Some(Self::StartCalibration),
            _ => None,
        }
    }
}
