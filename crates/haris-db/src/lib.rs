//! Relational role resolution for Haris
//!
//! Resolves role sets for usernames from a user/role cross-reference table
//! and supports direct credential authentication against the user table.
//! Implementations exist for SQLite and PostgreSQL.

pub mod postgres;
pub mod realm;
pub mod repository;
pub mod traits;

pub use postgres::PostgresStore;
pub use realm::DbRealm;
pub use repository::SqliteStore;
pub use traits::RoleRepository;
