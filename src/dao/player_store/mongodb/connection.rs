use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tracing::debug;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

const APP_NAME: &str = "bravo-back";
// The storage supervisor retries the whole connect with its own backoff.
const PING_ATTEMPTS: u32 = 3;
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Driver options with our defaults filled in where the URI left them unset.
fn client_options(config: &MongoConfig) -> ClientOptions {
    let mut options = config.options.clone();
    options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
    options
        .server_selection_timeout
        .get_or_insert(SERVER_SELECTION_TIMEOUT);
    options
}

/// Build a client and wait until the server answers a ping.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(client_options(config))
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempt = 1;
    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok((client, database)),
            Err(source) if attempt >= PING_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                debug!(attempt, error = %err, "MongoDB ping failed; retrying");
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uri_settings_win_over_defaults() {
        let config = MongoConfig::from_uri(
            "mongodb://localhost:27017/?appName=custom&serverSelectionTimeoutMS=500",
            None,
        )
        .await
        .unwrap();

        let options = client_options(&config);
        assert_eq!(options.app_name.as_deref(), Some("custom"));
        assert_eq!(
            options.server_selection_timeout,
            Some(Duration::from_millis(500))
        );
    }

    #[tokio::test]
    async fn defaults_fill_unset_options() {
        let config = MongoConfig::from_uri("mongodb://localhost:27017", Some("players_test"))
            .await
            .unwrap();

        let options = client_options(&config);
        assert_eq!(options.app_name.as_deref(), Some(APP_NAME));
        assert_eq!(options.server_selection_timeout, Some(SERVER_SELECTION_TIMEOUT));
        assert_eq!(config.database_name, "players_test");
    }
}
