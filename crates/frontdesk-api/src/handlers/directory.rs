//! Customer and tag listings.

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use frontdesk_core::{Customer, Page, Tag};

use crate::auth::AuthStaff;
use crate::error::ApiResult;
use crate::handlers::PageQuery;
use crate::AppState;

/// `GET /api/v1/customers`
pub async fn list_customers(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<Customer>>> {
    Ok(Json(state.abilities(staff).get_customers(&page.into()).await?))
}

/// `GET /api/v1/customers/:id`
pub async fn get_customer(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.abilities(staff).get_customer(id).await?))
}

/// `GET /api/v1/tags`
pub async fn list_tags(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<Tag>>> {
    Ok(Json(state.abilities(staff).get_tags(&page.into()).await?))
}
