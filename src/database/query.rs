use serde::de::DeserializeOwned;
use snafu::{Location, ResultExt as _, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::QueryResult;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueryError {
    #[snafu(display("failed to query the database at {location}: {source}"))]
    Execute {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to deserialize the database response at {location}: {source}"))]
    Deserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A pending SurrealQL query. Parameters are bound with [Query::bind], which takes any
/// serializable `(name, value)` pair.
///
/// # Example
/// ```rust,ignore
/// let deleted: Vec<ListingRow> = database.sql("SELECT * FROM listings WHERE deleted_at != NONE")
///     .fetch()
///     .await?;
/// ```
#[derive(Debug)]
pub struct Query<'a> {
    query: surrealdb::method::Query<'a, Any>,
}

impl<'a> Query<'a> {
    pub(super) fn new(query: surrealdb::method::Query<'a, Any>) -> Self {
        Self { query }
    }

    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute the query and return a [surrealdb::Response], one entry per statement.
    pub async fn execute(self) -> Result<surrealdb::Response, QueryError> {
        let response = self.query.await.context(ExecuteSnafu)?;
        tracing::trace!(?response, "executed query");
        Ok(response)
    }

    /// Execute the query and deserialize the result of the first statement.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<T, QueryError>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        statements.take::<T>(0).context(DeserializeSnafu)
    }
}
