//! Transactional workflow engine for the proposal lifecycle
//!
//! Every mutating action funnels through [`Workflow`], which authorizes the
//! actor, validates the transition, and runs the acceptance path as a single
//! atomic unit of work. Domain events are broadcast only after a durable
//! commit.

pub mod acceptance;
pub mod events;
pub mod lifecycle;

pub use acceptance::AcceptanceOutcome;
pub use events::DomainEvent;
pub use lifecycle::Workflow;
