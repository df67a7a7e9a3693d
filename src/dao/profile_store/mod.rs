pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{Achievement, HistoryEntryEntity, ProfileEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for player profiles.
///
/// Mutations return `false` (or `None`) when no profile matches the name, so
/// settlement of anonymous players stays a no-op instead of an error.
pub trait ProfileStore: Send + Sync {
    fn find_profile(&self, name: String) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>>;
    /// Insert a new profile, failing with [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict) when the name is taken.
    fn create_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn update_profile(
        &self,
        name: String,
        status: Option<String>,
        country: Option<String>,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Profiles sorted by trophies, highest first.
    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>>;
    fn apply_trophy_delta(&self, name: String, delta: i32) -> BoxFuture<'static, StorageResult<bool>>;
    fn increment_win_counter(&self, name: String) -> BoxFuture<'static, StorageResult<bool>>;
    fn set_achievement_flag(
        &self,
        name: String,
        flag: Achievement,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Append to the history and return the updated consecutive-win streak.
    fn append_history(
        &self,
        name: String,
        entry: HistoryEntryEntity,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
