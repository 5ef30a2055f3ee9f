//! Fixed-priority arbiter model and its self-checking harness.
//!
//! The harness clocks a [`ClockedArbiter`] against a stimulus driver, a
//! grant monitor and a reference checker, each running as its own task and
//! meeting at every simulated clock edge.
//!
//! # Modules
//!
//! - [`arbiter`] -- [`ClockedArbiter`] trait, [`FixedPriorityArbiter`] and
//!   the [`priority_select`] rule.
//! - [`clock`] -- Simulated clock with reset timing.
//! - [`config`] -- Configuration loading from `arbiter-config.yaml` into
//!   strongly-typed structs.
//! - [`coverage`] -- Functional coverage over monitor samples.
//! - [`driver`] -- Stimulus driver process.
//! - [`harness`] -- The per-edge loop that wires everything together.
//! - [`monitor`] -- Grant monitor process.
//! - [`operator`] -- Run bounds and operator stop.
//! - [`queue`] -- Sample queue between monitor and checker.
//! - [`scoreboard`] -- Reference checker.
//! - [`stimulus`] -- Random and scripted request sources.
//! - [`tick`] -- Tick broadcast with per-subscriber settle.
//!
//! [`ClockedArbiter`]: arbiter::ClockedArbiter
//! [`FixedPriorityArbiter`]: arbiter::FixedPriorityArbiter
//! [`priority_select`]: arbiter::priority_select

pub mod arbiter;
pub mod clock;
pub mod config;
pub mod coverage;
pub mod driver;
pub mod harness;
pub mod monitor;
pub mod operator;
pub mod queue;
pub mod scoreboard;
pub mod stimulus;
pub mod tick;
