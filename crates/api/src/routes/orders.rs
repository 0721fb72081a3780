//! Order route handler.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::{ApiJson, Loose};
use crate::middleware::RequireCustomer;
use crate::services::orders::{OrderInput, OrderLineInput, OrderReceipt};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub id: Option<Loose>,
    pub quantity: Option<Loose>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub address: Option<Loose>,
    pub zip: Option<Loose>,
    pub phone: Option<Loose>,
    pub card: Option<Loose>,
    pub exp: Option<Loose>,
    pub csc: Option<Loose>,
    pub items: Option<Vec<OrderLineRequest>>,
}

impl From<PlaceOrderRequest> for OrderInput {
    fn from(req: PlaceOrderRequest) -> Self {
        let text = |value: Option<Loose>| value.map(Loose::into_inner);
        Self {
            address: text(req.address),
            zip: text(req.zip),
            phone: text(req.phone),
            card: text(req.card),
            exp: text(req.exp),
            csc: text(req.csc),
            items: req.items.map(|items| {
                items
                    .into_iter()
                    .map(|line| OrderLineInput {
                        id: text(line.id),
                        quantity: text(line.quantity),
                    })
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub detail: &'static str,
    #[serde(flatten)]
    pub receipt: OrderReceipt,
}

/// POST /place_order
///
/// Field presence and validity are checked by the order service, which
/// reports the first problem in the order address, zip, phone, card, items.
pub async fn place(
    State(state): State<AppState>,
    RequireCustomer(buyer): RequireCustomer,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<Response> {
    let placed = state.orders().place(buyer.id, body.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            detail: "Order placed successfully.",
            receipt: OrderReceipt::from(&placed),
        }),
    )
        .into_response())
}
