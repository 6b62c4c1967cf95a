use thiserror::Error;

use crate::ids::NodeId;
use crate::route::RouteId;

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("anchor not found: {0}")]
    AnchorNotFound(NodeId),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("route not found: {0}")]
    RouteNotFound(RouteId),

    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("duplicate id: {0}")]
    DuplicateId(NodeId),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("orphaned route {route_id}: {link} points at missing node {node_id}")]
    OrphanedRoute {
        route_id: RouteId,
        node_id: NodeId,
        link: &'static str,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TreeError {
    /// Wrap any displayable transport error, keeping the full context chain.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::TransportFailure(format!("{err:#}"))
    }

    /// Stable short code, used as a structured log field and in reports.
    pub fn kind_code(&self) -> &'static str {
        match self {
            Self::AnchorNotFound(_) => "anchor_not_found",
            Self::NodeNotFound(_) => "node_not_found",
            Self::RouteNotFound(_) => "route_not_found",
            Self::InvalidPosition(_) => "invalid_position",
            Self::DuplicateId(_) => "duplicate_id",
            Self::TransportFailure(_) => "transport_failure",
            Self::OrphanedRoute { .. } => "orphaned_route",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the caller may retry the same call unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransportFailure(_))
    }
}
