use serde::Deserialize;
use snafu::{Location, ResultExt as _, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth;
use surrealdb::opt::IntoQuery;
use surrealdb::Surreal;
use url::Url;

/// Builder for parameterised SurrealQL statements.
pub mod query;

pub use query::{Query, QueryError};

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

const SETUP: &str = include_str!("../../schema.surrealql");

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("cannot connect to the database `{url}` at {location}: {source}"))]
    Connect {
        url: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("cannot sign in as `{username}` at {location}: {source}"))]
    SignIn {
        username: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("cannot select namespace `{namespace}` / database `{database}` at {location}: {source}"))]
    Namespace {
        namespace: String,
        database: String,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to apply the schema at {location}: {source}"))]
    Setup {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(rename = "surreal_url")]
    pub url: Url,
    #[serde(rename = "surreal_ns")]
    pub namespace: String,
    #[serde(rename = "surreal_db")]
    pub database: String,
    #[serde(rename = "surreal_user")]
    pub username: Option<String>,
    #[serde(rename = "surreal_pass")]
    pub password: Option<String>,
}

impl DatabaseConfig {
    fn credentials(&self) -> Option<auth::Root<'_>> {
        let username = self.username.as_deref()?;
        let password = self.password.as_deref().unwrap_or("");

        Some(auth::Root { username, password })
    }
}

/// Represents a database wrapper.
///
/// Cloning is cheap; every clone shares the same underlying connection.
#[derive(Debug, Clone)]
pub struct Database {
    database: Surreal<Any>,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.as_str();
        let database = surrealdb::engine::any::connect(url)
            .await
            .context(ConnectSnafu { url })?;

        if let Some(credentials) = config.credentials() {
            let username = credentials.username;
            database
                .signin(credentials)
                .await
                .context(SignInSnafu { username })?;
        }

        Self::prepare(database, &config.namespace, &config.database).await
    }

    /// An embedded, process-local database. Nothing is persisted across restarts.
    pub async fn memory() -> Result<Self> {
        let database = surrealdb::engine::any::connect("mem://")
            .await
            .context(ConnectSnafu { url: "mem://" })?;

        Self::prepare(database, "listing_views", "listing_views").await
    }

    async fn prepare(database: Surreal<Any>, namespace: &str, name: &str) -> Result<Self> {
        database
            .use_ns(namespace)
            .use_db(name)
            .await
            .context(NamespaceSnafu { namespace, database: name })?;

        database
            .query(SETUP)
            .await
            .and_then(|response| response.check())
            .context(SetupSnafu)?;

        tracing::info!(namespace, database = name, "database ready");

        Ok(Self { database })
    }

    /// Create a builder to execute arbitrary SQL code on the database.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let listing: Option<Listing> = db
    ///     .sql("SELECT * FROM type::thing('listings', $id)")
    ///     .bind(("id", "l1"))
    ///     .fetch()
    ///     .await?;
    /// ```
    ///
    /// The `fetch` method can deserialize the result into either a single value (`Option<T>`) or a collection of values (`Vec<T>`).
    pub fn sql(&self, query: impl IntoQuery) -> Query<'_> {
        Query::new(self.database.query(query))
    }
}
