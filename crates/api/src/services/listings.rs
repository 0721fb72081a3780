//! Seller listings.

use secure_commerce_core::{AccountId, ImageUrl, ListingId, Price, clean_text};

use super::ServiceError;
use super::image_probe::ImageProbe;
use crate::db::{RepositoryError, Repositories};
use crate::models::{Listing, NewListing};

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 50;

/// Raw listing fields, already checked for presence.
#[derive(Debug, Clone)]
pub struct ListingInput {
    pub name: String,
    /// Whole dollars as sent by the client.
    pub price: String,
    pub image_url: String,
}

/// Listing operations. Callers have already been role-checked.
pub struct ListingService<'a> {
    repos: &'a Repositories,
    probe: &'a dyn ImageProbe,
}

impl<'a> ListingService<'a> {
    /// Create a listing service.
    #[must_use]
    pub const fn new(repos: &'a Repositories, probe: &'a dyn ImageProbe) -> Self {
        Self { repos, probe }
    }

    /// Every listing from every seller.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the query fails.
    pub async fn all(&self) -> Result<Vec<Listing>, ServiceError> {
        Ok(self.repos.listings.list_all().await?)
    }

    /// The listings owned by `seller`.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the query fails.
    pub async fn owned_by(&self, seller: AccountId) -> Result<Vec<Listing>, ServiceError> {
        Ok(self.repos.listings.list_by_seller(seller).await?)
    }

    /// Validate and store a new listing for `seller`.
    ///
    /// The image URL is checked last, since that check makes a network call.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` naming the first bad field, or when
    /// the name is already taken.
    pub async fn create(
        &self,
        seller: AccountId,
        input: ListingInput,
    ) -> Result<Listing, ServiceError> {
        let name = clean_text(&input.name, NAME_MIN, NAME_MAX, "name").map_err(|_| {
            ServiceError::invalid(
                "Product name must be 2-50 characters with no invalid characters.",
            )
        })?;

        let dollars = input
            .price
            .trim()
            .parse::<i64>()
            .map_err(|_| ServiceError::invalid("Price must be a valid integer."))?;
        let price = Price::listing(dollars)
            .map_err(|_| ServiceError::invalid("Price must be between 1 and 1,000,000."))?;

        let image_url = ImageUrl::parse(&input.image_url)
            .map_err(|_| ServiceError::invalid("Invalid image URL."))?;
        if !self.probe.is_live_image(&image_url).await {
            return Err(ServiceError::invalid("Invalid image URL."));
        }

        let listing = self
            .repos
            .listings
            .create(NewListing {
                name,
                price,
                image_url,
                seller_id: seller,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    ServiceError::invalid("A listing with this name already exists.")
                }
                other => other.into(),
            })?;

        tracing::info!(listing_id = %listing.id, seller_id = %seller, "listing created");
        Ok(listing)
    }

    /// Delete one of `seller`'s listings.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if no such listing exists and
    /// `ServiceError::PermissionDenied` if another seller owns it.
    pub async fn delete(&self, seller: AccountId, id: &str) -> Result<(), ServiceError> {
        let not_found = || ServiceError::not_found("Listing not found.");
        let id = id.trim().parse::<i32>().map(ListingId::new).map_err(|_| not_found())?;

        let listing = self
            .repos
            .listings
            .find_by_id(id)
            .await?
            .ok_or_else(not_found)?;
        if listing.seller_id != seller {
            tracing::info!(listing_id = %id, seller_id = %seller, "refused to delete another seller's listing");
            return Err(ServiceError::PermissionDenied);
        }

        if !self.repos.listings.delete(id).await? {
            return Err(not_found());
        }
        tracing::info!(listing_id = %id, seller_id = %seller, "listing deleted");
        Ok(())
    }
}
