use thiserror::Error;

/// Errors surfaced to callers before or while a simulation run is set up. Violations of
/// engine invariants during the tick loop are programming errors and panic instead.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("unknown {kind} id '{id}'")]
    NotFound { kind: &'static str, id: String },

    #[error("no path between node '{from}' and node '{to}' at time {departure}")]
    NoPathFound {
        from: String,
        to: String,
        departure: u32,
    },

    #[error("{} plan(s) failed pre-run validation", .0.len())]
    RoutingConsistency(Vec<RoutingViolation>),

    #[error("agent '{agent}': activity #{index} has no resolvable end condition")]
    IncompletePlan { agent: String, index: usize },

    #[error("invalid configuration: {0}")]
    ConfigurationError(String),
}

/// One validation finding for one agent. Findings are collected over the whole population
/// and reported as a batch, so a single broken plan does not hide the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingViolation {
    pub agent: String,
    pub message: String,
}

impl RoutingViolation {
    pub fn new(agent: impl Into<String>, message: impl Into<String>) -> Self {
        RoutingViolation {
            agent: agent.into(),
            message: message.into(),
        }
    }
}
