//! # Prometheus Gang Shim
//!
//! Per-application control logic of a workload shim that sits between a
//! container-orchestration platform and an external gang scheduler.
//!
//! Each application runs a table-driven state machine. Periodic scheduling
//! passes push applications forward one step at a time; callbacks hand slow
//! work (remote submission, placeholder pods) to background tasks that report
//! back through an ordered event dispatcher.
//!
//! ## Core Problem Solved
//!
//! Gang workloads must not start until a quorum of their members has
//! resources reserved:
//!
//! - **Reservation First**: while an application is `Reserving`, only its
//!   placeholder tasks are advanced; regular tasks wait for `Running`
//! - **Exact Quorum**: reservation completes when every task group has exactly
//!   `minMember` bound placeholders
//! - **Graceful Degradation**: a failed reservation cleans up and falls back to
//!   `Running` instead of wedging the application
//! - **Restart Recovery**: applications that already hold allocations skip
//!   reservation entirely
//!
//! ## Lifecycle
//!
//! ```text
//! New ──Submit──▶ Submitted ──Accept──▶ Accepted ──TryReserve──▶ Reserving
//!  │                                        │                        │
//!  └─Recover─▶ Recovering ──Accept──▶       └──Run──▶ Running ◀──Run─┘
//!                                                       │
//!                                                       └──Complete──▶ Completed
//! ```
//!
//! Failure, rejection and kill paths lead to `Failed`, `Rejected` and
//! `Killed`. See [`core::state::APPLICATION_TRANSITIONS`] for the full table.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_gang_shim::builders::ShimBuilder;
//! use prometheus_gang_shim::config::ShimConfig;
//! use prometheus_gang_shim::core::ApplicationMetadata;
//! use prometheus_gang_shim::infra::{
//!     InMemoryPodClient, InMemorySchedulerApi, PodPlaceholderManager,
//! };
//!
//! let shim = ShimBuilder::new(ShimConfig::from_env()?)
//!     .with_scheduler_api(Arc::new(InMemorySchedulerApi::new().with_auto_accept()))
//!     .with_placeholder_manager(Arc::new(PodPlaceholderManager::new(Arc::new(
//!         InMemoryPodClient::new(),
//!     ))))
//!     .build()?;
//! shim.start()?;
//!
//! shim.registry().add_application(ApplicationMetadata {
//!     app_id: "app-0001".into(),
//!     queue: "root.default".into(),
//!     ..Default::default()
//! });
//! let schedule = shim.schedule_loop().spawn();
//! ```
//!
//! For complete flows, see `tests/gang_scheduling_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Application lifecycle, gang reservation and event dispatch.
pub mod core;
/// Configuration for the shim runtime.
pub mod config;
/// Bootstrap of a shim from configuration.
pub mod builders;
/// In-memory and logging backends for the collaborator contracts.
pub mod infra;
/// Tokio runtime adapters: background spawner and the scheduling loop.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
