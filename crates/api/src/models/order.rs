//! Order domain types.

use chrono::{DateTime, Utc};

use secure_commerce_core::{AccountId, ListingId, OrderId, OrderItemId, PhoneNumber, PostalCode, Price};

/// A buyer's purchase record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Purchasing customer.
    pub buyer_id: AccountId,
    /// Shipping address.
    pub address: String,
    /// Shipping postal code.
    pub postal_code: PostalCode,
    /// Contact phone number.
    pub contact_number: PhoneNumber,
    /// Sum of every line's price times quantity at order time.
    pub total: Price,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub listing_id: ListingId,
    pub quantity: u32,
}

/// Fields needed to place an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub buyer_id: AccountId,
    pub address: String,
    pub postal_code: PostalCode,
    pub contact_number: PhoneNumber,
    pub total: Price,
}

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderItem {
    pub listing_id: ListingId,
    pub quantity: u32,
}
