//! Execution runtime for conversational-automation flow definitions.
//!
//! A [`Session`](session::Session) drives one or more [`Run`](run::Run)s
//! through a tree of nodes, each node holding ordered actions, an optional
//! router and a set of exits. Traversal pauses when a router wait needs
//! external input and is reactivated by a [`Resume`](resumes::Resume).
//! Every state change is recorded as an ordered [`Event`](events::Event)
//! and every contact mutation goes through a describable
//! [`Modifier`](modifiers::Modifier).

pub mod actions;
pub mod assets;
pub mod contact;
pub mod definition;
pub mod engine;
pub mod envs;
pub mod events;
pub mod inputs;
pub mod localization;
pub mod modifiers;
pub mod results;
pub mod resumes;
pub mod routers;
pub mod run;
pub mod services;
pub mod session;
pub mod template;
pub mod waits;

pub use engine::{Engine, EngineBuilder, EngineError, Sprint};
pub use session::{Session, SessionStatus};
