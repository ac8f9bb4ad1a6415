//! User repository.
//!
//! [`UserRepository`] is the generic [`Repository`] bound to the `users` table,
//! extended with lookups by email and a race-safe find-or-create.

use sqlx::PgConnection;

use crate::error::AppError;
use crate::models::user::{NewUser, User, UserChanges};
use crate::repositories::repository::{Entity, EntityFields, Repository, SqlValue};

const TABLE_NAME: &str = "users";
const EMAIL_COLUMN: &str = "email";
const NAME_COLUMN: &str = "name";
const SELECT_COLUMNS: &[&str] = &["id", "email", "name", "created_at", "updated_at"];

/// SHARE ROW EXCLUSIVE conflicts with itself and with every row-modifying lock
/// (ROW EXCLUSIVE taken by INSERT/UPDATE/DELETE), but not with ACCESS SHARE.
/// Plain SELECTs keep running while a second find-or-create, or any other
/// writer, waits until the holder's transaction ends. Weaker modes such as
/// SHARE UPDATE EXCLUSIVE or ROW EXCLUSIVE would let two callers through.
const LOCK_USERS_TABLE: &str = "LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE";

pub type UserRepository = Repository<User>;

impl Entity for User {
    const TABLE: &'static str = TABLE_NAME;
    const COLUMNS: &'static [&'static str] = SELECT_COLUMNS;
    type New = NewUser;
    type Changes = UserChanges;
}

impl EntityFields for NewUser {
    fn fields(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            (EMAIL_COLUMN, SqlValue::from(self.email.as_str())),
            (NAME_COLUMN, SqlValue::from(self.name.as_str())),
        ]
    }
}

impl EntityFields for UserChanges {
    fn fields(&self) -> Vec<(&'static str, SqlValue)> {
        let mut fields = Vec::new();
        if let Some(id) = self.id {
            fields.push(("id", SqlValue::from(id)));
        }
        if let Some(email) = &self.email {
            fields.push((EMAIL_COLUMN, SqlValue::from(email.as_str())));
        }
        if let Some(name) = &self.name {
            fields.push((NAME_COLUMN, SqlValue::from(name.as_str())));
        }
        if let Some(created_at) = self.created_at {
            fields.push(("created_at", SqlValue::from(created_at)));
        }
        fields
    }
}

impl Repository<User> {
    pub async fn find_by_email(
        &self,
        email: &str,
        tx: Option<&mut PgConnection>,
    ) -> Result<Option<User>, AppError> {
        let mut builder = Self::select_where(EMAIL_COLUMN);
        builder.push_bind(email.to_owned()).push(" LIMIT 1");
        self.fetch_optional(tx, builder).await
    }

    /// Returns the user with `new_user.email`, creating it when absent.
    ///
    /// The lookup and insert run in one transaction (the caller's when given)
    /// holding [`LOCK_USERS_TABLE`], so concurrent callers with the same email
    /// observe a single row. An existing user is returned untouched; the
    /// candidate name is ignored in that case.
    pub async fn find_or_create_or_fail(
        &self,
        new_user: &NewUser,
        tx: Option<&mut PgConnection>,
    ) -> Result<User, AppError> {
        let repo = self.clone();
        let new_user = new_user.clone();
        self.with_transaction(tx, move |conn| {
            Box::pin(async move {
                sqlx::query(LOCK_USERS_TABLE).execute(&mut *conn).await?;

                if let Some(existing) = repo
                    .find_by_email(&new_user.email, Some(&mut *conn))
                    .await?
                {
                    tracing::debug!(user_id = existing.id, "find_or_create matched existing user");
                    return Ok(existing);
                }

                let created = repo.create_or_fail(&new_user, Some(conn)).await?;
                tracing::info!(user_id = created.id, "find_or_create inserted user");
                Ok(created)
            })
        })
        .await
    }
}
