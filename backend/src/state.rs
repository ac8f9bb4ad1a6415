use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    repositories::UserRepository,
    services::{UserService, UsersService},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub users: Arc<dyn UserService>,
}

impl AppState {
    /// Wires the production services on top of `pool`.
    pub fn new(pool: PgPool) -> Self {
        let users = Arc::new(UsersService::new(UserRepository::new(pool.clone())));
        Self { pool, users }
    }

    /// Replaces the user service, e.g. with a mock in handler tests.
    pub fn with_user_service(pool: PgPool, users: Arc<dyn UserService>) -> Self {
        Self { pool, users }
    }
}
