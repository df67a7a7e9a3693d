use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoProfileDocument, by_name, history_document, new_profile_document},
};
use crate::dao::{
    models::{Achievement, HistoryEntryEntity, MatchResult, ProfileEntity},
    profile_store::ProfileStore,
    storage::StorageResult,
};

const PROFILE_COLLECTION_NAME: &str = "profile";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed [`ProfileStore`].
#[derive(Clone)]
pub struct MongoProfileStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoProfileStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let name_index = IndexModel::builder()
            .keys(doc! { "profileName": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("profile_name_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();

        self.raw_collection()
            .await
            .create_index(name_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PROFILE_COLLECTION_NAME,
                index: "profileName",
                source,
            })?;

        let trophies_index = IndexModel::builder()
            .keys(doc! { "totalTrophies": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("profile_trophies_idx".to_owned()))
                    .build(),
            )
            .build();

        self.raw_collection()
            .await
            .create_index(trophies_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PROFILE_COLLECTION_NAME,
                index: "totalTrophies",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoProfileDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoProfileDocument>(PROFILE_COLLECTION_NAME)
    }

    async fn raw_collection(&self) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(PROFILE_COLLECTION_NAME)
    }

    async fn find_profile(&self, name: String) -> MongoResult<Option<ProfileEntity>> {
        let document = self
            .collection()
            .await
            .find_one(by_name(&name))
            .await
            .map_err(|source| MongoDaoError::LoadProfile { name, source })?;

        Ok(document.map(Into::into))
    }

    async fn create_profile(&self, profile: ProfileEntity) -> MongoResult<()> {
        let document = new_profile_document(&profile);
        match self.raw_collection().await.insert_one(document).await {
            Ok(_) => Ok(()),
            Err(source) if is_duplicate_key(&source) => Err(MongoDaoError::DuplicateProfile {
                name: profile.name,
            }),
            Err(source) => Err(MongoDaoError::SaveProfile {
                name: profile.name,
                source,
            }),
        }
    }

    /// Run an update against a single profile and report whether it matched.
    async fn update_named(
        &self,
        name: String,
        operation: &'static str,
        update: impl Into<mongodb::options::UpdateModifications>,
    ) -> MongoResult<bool> {
        let result = self
            .raw_collection()
            .await
            .update_one(by_name(&name), update)
            .await
            .map_err(|source| MongoDaoError::UpdateProfile {
                name,
                operation,
                source,
            })?;
        Ok(result.matched_count > 0)
    }

    async fn update_profile(
        &self,
        name: String,
        status: Option<String>,
        country: Option<String>,
    ) -> MongoResult<bool> {
        let mut set = Document::new();
        if let Some(status) = status {
            set.insert("status", status);
        }
        if let Some(country) = country {
            set.insert("country", country);
        }
        if set.is_empty() {
            return self.find_profile(name).await.map(|found| found.is_some());
        }

        self.update_named(name, "profile data", doc! { "$set": set })
            .await
    }

    async fn leaderboard(&self, limit: usize) -> MongoResult<Vec<ProfileEntity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let documents: Vec<MongoProfileDocument> = self
            .collection()
            .await
            .find(doc! {})
            .sort(doc! { "totalTrophies": -1, "profileName": 1 })
            .limit(limit)
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn apply_trophy_delta(&self, name: String, delta: i32) -> MongoResult<bool> {
        // Aggregation pipeline so the zero floor is applied server-side.
        let pipeline = vec![doc! {
            "$set": {
                "totalTrophies": {
                    "$max": [0, { "$add": [{ "$ifNull": ["$totalTrophies", 0] }, i64::from(delta)] }]
                }
            }
        }];
        self.update_named(name, "trophies", pipeline).await
    }

    async fn increment_win_counter(&self, name: String) -> MongoResult<bool> {
        self.update_named(name, "wins", doc! { "$inc": { "wins": 1_i64 } })
            .await
    }

    async fn set_achievement_flag(&self, name: String, flag: Achievement) -> MongoResult<bool> {
        let mut set = Document::new();
        set.insert(format!("achievements.{}", flag.field_name()), true);
        self.update_named(name, "achievements", doc! { "$set": set })
            .await
    }

    async fn append_history(
        &self,
        name: String,
        entry: HistoryEntryEntity,
    ) -> MongoResult<Option<u32>> {
        let streak_update = match entry.result {
            MatchResult::Won => doc! { "$inc": { "winStreak": 1_i64 } },
            MatchResult::Lost | MatchResult::Draw => doc! { "$set": { "winStreak": 0_i64 } },
        };
        let mut update = streak_update;
        update.insert("$push", doc! { "history": history_document(&entry) });

        let document = self
            .collection()
            .await
            .find_one_and_update(by_name(&name), update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateProfile {
                name,
                operation: "history",
                source,
            })?;

        Ok(document.map(|doc| doc.win_streak()))
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl ProfileStore for MongoProfileStore {
    fn find_profile(&self, name: String) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_profile(name).await.map_err(Into::into) })
    }

    fn create_profile(&self, profile: ProfileEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_profile(profile).await.map_err(Into::into) })
    }

    fn update_profile(
        &self,
        name: String,
        status: Option<String>,
        country: Option<String>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_profile(name, status, country)
                .await
                .map_err(Into::into)
        })
    }

    fn leaderboard(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.leaderboard(limit).await.map_err(Into::into) })
    }

    fn apply_trophy_delta(&self, name: String, delta: i32) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .apply_trophy_delta(name, delta)
                .await
                .map_err(Into::into)
        })
    }

    fn increment_win_counter(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.increment_win_counter(name).await.map_err(Into::into) })
    }

    fn set_achievement_flag(
        &self,
        name: String,
        flag: Achievement,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_achievement_flag(name, flag)
                .await
                .map_err(Into::into)
        })
    }

    fn append_history(
        &self,
        name: String,
        entry: HistoryEntryEntity,
    ) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move { store.append_history(name, entry).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
