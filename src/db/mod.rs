//! Database layer using sqlx with PostgreSQL

pub mod connection;
pub mod enum_repo;
pub mod executor;
pub mod search_history;

pub use connection::*;
pub use enum_repo::PgEnumStore;
pub use executor::PgQueryExecutor;
pub use search_history::SearchHistoryRepository;
