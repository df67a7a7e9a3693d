use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Database used when none is configured, matching the historical deployment.
const DEFAULT_DATABASE: &str = "quiz";

#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DATABASE)
            .to_owned();
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options.app_name.get_or_insert_with(|| "quiz-duel-back".to_owned());

        Ok(Self {
            options,
            database_name,
        })
    }
}
