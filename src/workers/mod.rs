pub mod share_purge;

pub use share_purge::SharePurgeWorker;
