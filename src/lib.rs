pub mod api;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod export;

pub use collaborators::{CollaboratorError, Collaborators, SimCall, Simulator};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Address, Amount, Delegator, EventRecord, PoolConfig, PoolEvent, TimeMs};
pub use engine::{PoolEngine, PoolError};
pub use error::AppError;
