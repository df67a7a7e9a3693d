//! Process-local profile store used for development and tests.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    models::{Achievement, HistoryEntryEntity, ProfileEntity},
    profile_store::ProfileStore,
    storage::{StorageError, StorageResult},
};

/// Profile store keeping every profile in a shared hash map.
#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<String, ProfileEntity>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `update` against the named profile, returning `None` if it does not exist.
    async fn with_profile_mut<T>(
        &self,
        name: &str,
        update: impl FnOnce(&mut ProfileEntity) -> T,
    ) -> Option<T> {
        let mut guard = self.profiles.write().await;
        guard.get_mut(name).map(update)
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn find_profile(&self, name: String) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.profiles.read().await.get(&name).cloned()) })
    }

    fn create_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.profiles.write().await;
            if guard.contains_key(&profile.name) {
                return Err(StorageError::conflict(profile.name));
            }
            guard.insert(profile.name.clone(), profile);
            Ok(())
        })
    }

    fn update_profile(
        &self,
        name: String,
        status: Option<String>,
        country: Option<String>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let updated = store
                .with_profile_mut(&name, |profile| {
                    if let Some(status) = status {
                        profile.status = status;
                    }
                    if let Some(country) = country {
                        profile.country = country;
                    }
                })
                .await;
            Ok(updated.is_some())
        })
    }

    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.profiles.read().await;
            let mut profiles: Vec<ProfileEntity> = guard.values().cloned().collect();
            profiles.sort_by(|a, b| {
                b.total_trophies
                    .cmp(&a.total_trophies)
                    .then_with(|| a.name.cmp(&b.name))
            });
            profiles.truncate(limit);
            Ok(profiles)
        })
    }

    fn apply_trophy_delta(&self, name: String, delta: i32) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let applied = store
                .with_profile_mut(&name, |profile| profile.apply_trophy_delta(delta))
                .await;
            Ok(applied.is_some())
        })
    }

    fn increment_win_counter(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let applied = store
                .with_profile_mut(&name, |profile| profile.wins = profile.wins.saturating_add(1))
                .await;
            Ok(applied.is_some())
        })
    }

    fn set_achievement_flag(
        &self,
        name: String,
        flag: Achievement,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let applied = store
                .with_profile_mut(&name, |profile| profile.achievements.unlock(flag))
                .await;
            Ok(applied.is_some())
        })
    }

    fn append_history(
        &self,
        name: String,
        entry: HistoryEntryEntity,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .with_profile_mut(&name, |profile| profile.push_history(entry))
                .await)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::MatchResult;

    fn profile(name: &str, trophies: u32) -> ProfileEntity {
        let mut profile = ProfileEntity::new(name, String::new(), "FR".into());
        profile.total_trophies = trophies;
        profile
    }

    #[tokio::test]
    async fn create_rejects_taken_names() {
        let store = InMemoryProfileStore::new();
        store.create_profile(profile("ada", 0)).await.unwrap();
        let err = store.create_profile(profile("ada", 0)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { name } if name == "ada"));
    }

    #[tokio::test]
    async fn leaderboard_is_sorted_and_limited() {
        let store = InMemoryProfileStore::new();
        for (name, trophies) in [("low", 3), ("high", 40), ("mid", 12)] {
            store.create_profile(profile(name, trophies)).await.unwrap();
        }

        let top = store.leaderboard(2).await.unwrap();
        let names: Vec<_> = top.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["high", "mid"]);
    }

    #[tokio::test]
    async fn mutations_on_unknown_profiles_report_no_match() {
        let store = InMemoryProfileStore::new();
        assert!(!store.apply_trophy_delta("ghost".into(), 5).await.unwrap());
        assert!(!store.increment_win_counter("ghost".into()).await.unwrap());
        let streak = store
            .append_history(
                "ghost".into(),
                HistoryEntryEntity {
                    opponent: "ada".into(),
                    result: MatchResult::Won,
                    played_at: SystemTime::now(),
                },
            )
            .await
            .unwrap();
        assert_eq!(streak, None);
    }

    #[tokio::test]
    async fn update_only_touches_provided_fields() {
        let store = InMemoryProfileStore::new();
        store.create_profile(profile("ada", 0)).await.unwrap();
        assert!(
            store
                .update_profile("ada".into(), Some("ready".into()), None)
                .await
                .unwrap()
        );

        let stored = store.find_profile("ada".into()).await.unwrap().unwrap();
        assert_eq!(stored.status, "ready");
        assert_eq!(stored.country, "FR");
    }
}
