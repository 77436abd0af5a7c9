//! stackpause orchestrator: suspend and resume a multi-tier stack.
//!
//! The orchestrator sequences the fleet, readiness and collection layers
//! in dependency order and owns the session document for the lifetime
//! of one command.
//!
//! # Phases
//!
//! ```text
//! Idle ──suspend──▶ Suspending ──▶ Suspended
//!   │                  backup, then scale down
//!   └──resume───▶ Resuming ──▶ Running
//!                    image server + repository
//!                    coordination ─▶ gate
//!                    search ───────▶ gate
//!                    settle, restore, replace leaders
//!                    web
//! ```
//!
//! A failure at any step aborts the rest. Nothing is rolled back.
//!
//! # Components
//!
//! - **`orchestrator`**: the state machine and command surface
//! - **`command`**: operator commands and their dispatch
//! - **`error`**: the aggregated error and its operator-facing kind

pub mod command;
pub mod error;
pub mod orchestrator;

pub use command::Command;
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Collaborators, Orchestrator, OrchestratorPhase, SETTLE_DELAY};
