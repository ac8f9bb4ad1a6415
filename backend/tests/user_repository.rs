use std::collections::HashSet;

use users_backend::{error::AppError, models::user::NewUser, repositories::UserRepository};

mod support;

use support::{
    count_users_with_email, integration_guard, reset_users, test_pool, unique_email, UserFactory,
};

#[tokio::test]
async fn find_by_email_matches_exact_address() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    reset_users(&pool).await;
    let repo = UserRepository::new(pool);
    let factory = UserFactory::new(repo.clone());

    let user = factory.create().await;
    let found = repo.find_by_email(&user.email, None).await.expect("find by email");
    assert_eq!(found, Some(user));

    let missing = repo
        .find_by_email(&unique_email(), None)
        .await
        .expect("find by missing email");
    assert!(missing.is_none());
}

#[tokio::test]
async fn find_or_create_returns_existing_user_unchanged() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    reset_users(&pool).await;
    let repo = UserRepository::new(pool.clone());
    let factory = UserFactory::new(repo.clone());

    let existing = factory
        .create_with(NewUser::new("a@example.com", "A"))
        .await;
    let result = repo
        .find_or_create_or_fail(&NewUser::new("a@example.com", "X"), None)
        .await
        .expect("find or create");

    assert_eq!(result, existing);
    assert_eq!(result.name, "A");
    assert_eq!(count_users_with_email(&pool, "a@example.com").await, 1);
}

#[tokio::test]
async fn find_or_create_inserts_missing_user() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    reset_users(&pool).await;
    let repo = UserRepository::new(pool.clone());

    let result = repo
        .find_or_create_or_fail(&NewUser::new("new@example.com", "Y"), None)
        .await
        .expect("find or create");

    assert_eq!(result.email, "new@example.com");
    assert_eq!(result.name, "Y");
    let stored = repo.find(result.id, None).await.expect("find");
    assert_eq!(stored, Some(result));
}

#[tokio::test]
async fn find_or_create_rejects_invalid_user() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    reset_users(&pool).await;
    let repo = UserRepository::new(pool);

    let err = repo
        .find_or_create_or_fail(&NewUser::new("", ""), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn concurrent_find_or_create_yields_one_row() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    reset_users(&pool).await;
    let repo = UserRepository::new(pool.clone());

    let email = unique_email();
    let mut handles = Vec::new();
    for attempt in 0..8 {
        let repo = repo.clone();
        let candidate = NewUser::new(email.clone(), format!("caller-{}", attempt));
        handles.push(tokio::spawn(async move {
            repo.find_or_create_or_fail(&candidate, None).await
        }));
    }

    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for handle in handles {
        let user = handle
            .await
            .expect("join find_or_create task")
            .expect("every caller gets the user");
        ids.insert(user.id);
        names.insert(user.name);
    }

    assert_eq!(ids.len(), 1);
    assert_eq!(names.len(), 1);
    assert_eq!(count_users_with_email(&pool, &email).await, 1);
}

#[tokio::test]
async fn find_or_create_joins_caller_transaction() {
    let _guard = integration_guard().await;
    let pool = test_pool().await;
    reset_users(&pool).await;
    let repo = UserRepository::new(pool.clone());

    let email = unique_email();
    let mut tx = pool.begin().await.expect("begin");
    let created = repo
        .find_or_create_or_fail(&NewUser::new(email.clone(), "Z"), Some(&mut *tx))
        .await
        .expect("find or create in caller transaction");
    let seen_inside = repo
        .find_by_email(&email, Some(&mut *tx))
        .await
        .expect("find inside transaction");
    assert_eq!(seen_inside, Some(created));

    tx.rollback().await.expect("rollback");
    assert_eq!(count_users_with_email(&pool, &email).await, 0);
}
