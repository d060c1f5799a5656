pub mod blob;
pub mod manager;
pub mod model;
pub mod path_normalizer;
pub mod storage;
pub mod upload;

pub use blob::LocalBlobStore;
pub use manager::{CreateItem, ManagerOptions, VfsManager};
pub use model::{ItemKind, StoragePointer, VfsError};
pub use storage::postgres_backend::PostgresBackend;
