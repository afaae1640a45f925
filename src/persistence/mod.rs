//! Persistence (§6): an in-process `rusqlite`-backed implementation of
//! `Persistence`, used as the default for local runs and by integration
//! tests — mirroring the teacher's `DbSignalStorage` (`src/signals/db_storage.rs`).

mod sqlite;

pub use sqlite::SqlitePersistence;
