//! Agent runtime: the [`Orchestrator`] turn loop and its supporting modules.
//!
//! - [`orchestrator::Orchestrator`]: two-phase Detect/Respond turns. Start here.
//! - [`config::OrchestratorConfig`]: system prompt, history window, tool data
//!   capacity, execution order, error utterance.
//! - [`session`]: per-session history, memoized catalog and tool data, plus
//!   the cloneable [`SessionHandle`] for administrative hooks.
//! - [`catalog`]: the [`DiscoveryAggregator`] and the merged [`Catalog`].
//! - [`router`]: name resolution with priority Local > Workflow > Protocol.
//! - [`events`]: [`EventHandler`] trait, [`TurnEvent`] enum and
//!   [`ToolNotification`]s.

pub mod catalog;
pub mod config;
pub mod events;
pub mod orchestrator;
pub mod router;
pub mod session;

pub use catalog::{Catalog, DiscoveryAggregator};
pub use config::{ExecutionOrder, OrchestratorConfig};
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
    NotificationSender, Phase, ToolNotification, TurnEvent, TurnOutcome,
};
pub use orchestrator::{Orchestrator, Turn};
pub use router::{Route, Router};
pub use session::{Session, SessionHandle};
