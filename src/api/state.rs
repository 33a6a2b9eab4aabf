use std::sync::Arc;

use crate::auth::Authenticator;
use crate::service::{AnalyticsAggregator, RecorderPolicy, ViewRecorder};
use crate::store::Store;

/// Shared state handed to every handler.
#[derive(Debug)]
pub struct App<S> {
    pub recorder: ViewRecorder<S, S>,
    pub analytics: AnalyticsAggregator<S>,
    pub store: S,
    pub authenticator: Authenticator,
}

impl<S: Store> App<S> {
    pub fn new(store: S, authenticator: Authenticator, policy: RecorderPolicy) -> Arc<Self> {
        Arc::new(App {
            recorder: ViewRecorder::new(store.clone(), store.clone(), policy),
            analytics: AnalyticsAggregator::new(store.clone()),
            store,
            authenticator,
        })
    }
}
