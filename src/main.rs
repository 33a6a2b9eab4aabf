use dotenvy::dotenv;
use snafu::ResultExt as _;
use tokio::net::TcpListener;

use listing_views::api::{create_router, App};
use listing_views::config::Config;
use listing_views::database::Database;
use listing_views::error::{ApplicationError, BindAddressSnafu, ConnectDatabaseSnafu, WebServerSnafu};
use listing_views::logger;
use listing_views::store::SurrealStore;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config)?;

    let database = Database::connect(&config.database)
        .await
        .context(ConnectDatabaseSnafu)?;
    let store = SurrealStore::new(database);

    let app = App::new(store, config.authenticator(), config.policy());
    let router = create_router(app);

    let listener = TcpListener::bind(config.host)
        .await
        .context(BindAddressSnafu { address: config.host })?;
    tracing::info!(address = %config.host, "listening for view events");

    axum::serve(listener, router).await.context(WebServerSnafu)
}
