//! User service.
//!
//! Translates API requests into repository calls. Handlers depend on the
//! [`UserService`] trait so they can be exercised with `MockUserService`.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::user::{CreateUserRequest, NewUser, User};
use crate::repositories::UserRepository;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserService: Send + Sync {
    /// Creates a user, failing when the repository rejects the payload.
    async fn create_or_fail(&self, request: CreateUserRequest) -> Result<User, AppError>;
}

#[derive(Debug, Clone)]
pub struct UsersService {
    users: UserRepository,
}

impl UsersService {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserService for UsersService {
    async fn create_or_fail(&self, request: CreateUserRequest) -> Result<User, AppError> {
        self.users
            .create_or_fail(&NewUser::from(request), None)
            .await
    }
}
