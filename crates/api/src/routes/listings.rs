//! Listing route handlers.
//!
//! Customers browse every listing; sellers see and manage their own.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, Loose, required, text};
use crate::middleware::{RequireCustomer, RequireSeller};
use crate::models::{Listing, ListingView};
use crate::services::listings::ListingInput;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub name: Option<Loose>,
    pub price: Option<Loose>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<Loose>,
}

#[derive(Debug, Serialize)]
pub struct CreateListingResponse {
    pub detail: &'static str,
    #[serde(flatten)]
    pub listing: ListingView,
}

#[derive(Debug, Deserialize)]
pub struct DeleteListingRequest {
    pub id: Option<Loose>,
}

fn views(listings: &[Listing]) -> Vec<ListingView> {
    listings.iter().map(ListingView::from).collect()
}

/// GET /get_all_listings
pub async fn all(
    State(state): State<AppState>,
    RequireCustomer(_): RequireCustomer,
) -> Result<Json<Vec<ListingView>>> {
    let listings = state.listings().all().await?;
    Ok(Json(views(&listings)))
}

/// GET /get_my_listings
pub async fn mine(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
) -> Result<Json<Vec<ListingView>>> {
    let listings = state.listings().owned_by(seller.id).await?;
    Ok(Json(views(&listings)))
}

/// POST /create_listing
pub async fn create(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
    ApiJson(body): ApiJson<CreateListingRequest>,
) -> Result<Response> {
    let (Some(name), Some(price), Some(image_url)) =
        (text(body.name), text(body.price), text(body.image_url))
    else {
        return Err(AppError::bad_request(
            "Missing required fields: name, price, or imageUrl.",
        ));
    };

    let listing = state
        .listings()
        .create(
            seller.id,
            ListingInput {
                name,
                price,
                image_url,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateListingResponse {
            detail: "Listing created successfully.",
            listing: ListingView::from(&listing),
        }),
    )
        .into_response())
}

/// DELETE /delete_listing
pub async fn delete(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
    ApiJson(body): ApiJson<DeleteListingRequest>,
) -> Result<StatusCode> {
    let id = required(body.id, "Missing 'id' field.")?;
    state.listings().delete(seller.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
