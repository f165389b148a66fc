pub mod catalog;
pub mod connection;
pub mod engine;
pub mod error;
pub mod ident;
pub mod sql;
pub mod value;

pub use engine::{Engine, TableData};
pub use error::{EngineError, EngineResult};
pub use sql::join::JoinSpecification;
