//! # Procflow
//!
//! Procflow is a lightweight, embeddable business-process engine written
//! in Rust. It executes processes deployed as JSON models: a hierarchical
//! execution tree advanced by atomic operations, a transactional command
//! pipeline with optimistic-lock retry, and an asynchronous job executor
//! for timers, async continuations, and retries.
//!
//! ## Core Features
//!
//! - **Synchronous-to-the-wait-state execution**: starting or resuming an
//!   instance runs in the caller until every leaf parks or completes
//! - **Transactional commands**: every mutation commits atomically, and a
//!   revision conflict re-runs the whole command
//! - **Background jobs**: timers, async continuations, fixed-backoff
//!   retries, and a dead-letter state
//! - **Pluggable storage**: in-memory (testing) and PostgreSQL (production)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use procflow::{EngineBuilder, ProcessModel, Vars};
//!
//! let engine = EngineBuilder::new().build()?;
//! engine.launch();
//!
//! let model = ProcessModel::from_json(json_str)?;
//! let definition_id = engine.deploy(&model)?;
//! let pid = engine.start_process_by_id(&definition_id, &Vars::new())?;
//! ```

mod builder;
mod command;
mod common;
mod config;
mod engine;
mod error;
mod events;
mod job;
mod model;
mod runtime;
mod store;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use command::{Command, CommandContext};
pub use common::Vars;
pub use config::{Config, JobExecutorConfig, PostgresConfig, StoreConfig, StoreType};
pub use engine::Engine;
pub use error::ProcflowError;
pub use events::{ActivityEvent, EngineEvent, Event, JobEvent, Message, ProcessEvent, TaskEvent, VariableEvent};
pub use job::{JobHandler, JobHandlers};
pub use model::*;
pub use runtime::{Channel, ChannelEvent, ChannelOptions, ConditionEvaluator, TruthyConditionEvaluator};
pub use store::{
    DbCollection, MemStore, PageData, PostgresStore, Store,
    data::{EventSubscription, Execution, Job, ProcessDefinitionData, Task, Variable},
    query::{Cond, Query},
};

/// Result type alias for Procflow operations.
pub type Result<T> = std::result::Result<T, ProcflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
