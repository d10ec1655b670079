use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::db::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
}
