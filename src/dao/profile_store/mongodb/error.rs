use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("profile `{name}` already exists")]
    DuplicateProfile { name: String },
    #[error("failed to save profile `{name}`")]
    SaveProfile {
        name: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load profile `{name}`")]
    LoadProfile {
        name: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to update {operation} for profile `{name}`")]
    UpdateProfile {
        name: String,
        operation: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load leaderboard")]
    Leaderboard {
        #[source]
        source: MongoError,
    },
}
