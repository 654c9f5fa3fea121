//! Storage engine drivers implementing [`crate::executor::SqlExecutor`] and
//! [`crate::executor::SchemaSync`].

#[cfg(feature = "rusqlite")]
pub mod rusqlite;

#[cfg(feature = "rusqlite")]
pub use self::rusqlite::RusqliteDriver;
