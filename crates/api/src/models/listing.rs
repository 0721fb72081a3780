//! Listing domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use secure_commerce_core::{AccountId, ImageUrl, ListingId, Price};

/// A seller's product offering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Unique listing ID.
    pub id: ListingId,
    /// Display name, unique across listings.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Product image.
    pub image_url: ImageUrl,
    /// Owning seller.
    pub seller_id: AccountId,
    /// Seller's first name, shown to buyers.
    pub seller_name: String,
    /// When the listing was created.
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a listing.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub name: String,
    pub price: Price,
    pub image_url: ImageUrl,
    pub seller_id: AccountId,
}

/// The listing shape returned to clients.
///
/// `quantity` is always zero; clients use it as the starting cart count.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListingView {
    pub id: ListingId,
    pub name: String,
    pub price: String,
    #[serde(rename = "imageUrl")]
    pub image_url: ImageUrl,
    pub quantity: u32,
    pub seller: String,
}

impl From<&Listing> for ListingView {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id,
            name: listing.name.clone(),
            price: listing.price.to_string(),
            image_url: listing.image_url.clone(),
            quantity: 0,
            seller: listing.seller_name.clone(),
        }
    }
}
