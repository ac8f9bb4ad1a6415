#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    error::ErrorResponse,
    handlers::health::HealthResponse,
    models::user::{CreateUserRequest, UserResponse},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(create_user_doc, health_doc),
    components(schemas(CreateUserRequest, UserResponse, ErrorResponse, HealthResponse)),
    tags(
        (name = "Users", description = "User accounts"),
        (name = "Health", description = "Service probes")
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid payload or duplicate email", body = ErrorResponse),
        (status = 422, description = "Malformed request body")
    ),
    tag = "Users"
)]
fn create_user_doc() {}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "Health"
)]
fn health_doc() {}
