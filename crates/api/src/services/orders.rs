//! Order placement.
//!
//! Every field is validated and every line resolved before anything is
//! written; the order row and its lines are then stored in one
//! all-or-nothing repository call. Card details are checked for shape and
//! expiry and then discarded.

use std::collections::HashMap;

use serde::Serialize;

use secure_commerce_core::{
    AccountId, ListingId, OrderId, PaymentCard, PhoneNumber, PostalCode, Price, clean_text,
};

use super::ServiceError;
use super::clock::Clock;
use crate::db::{RepositoryError, Repositories};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem};

const ADDRESS_MAX: usize = 400;

/// One requested line, as sent by the client.
#[derive(Debug, Clone, Default)]
pub struct OrderLineInput {
    pub id: Option<String>,
    pub quantity: Option<String>,
}

/// Raw checkout fields. Absent fields are `None`.
#[derive(Debug, Clone, Default)]
pub struct OrderInput {
    pub address: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub card: Option<String>,
    pub exp: Option<String>,
    pub csc: Option<String>,
    pub items: Option<Vec<OrderLineInput>>,
}

/// A stored order and its lines.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Confirmation returned to the buyer.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub total: String,
}

impl From<&PlacedOrder> for OrderReceipt {
    fn from(placed: &PlacedOrder) -> Self {
        Self {
            order_id: placed.order.id,
            total: placed.order.total.to_string(),
        }
    }
}

/// Places orders for customers.
pub struct OrderService<'a> {
    repos: &'a Repositories,
    clock: &'a dyn Clock,
}

impl<'a> OrderService<'a> {
    /// Create an order service.
    #[must_use]
    pub const fn new(repos: &'a Repositories, clock: &'a dyn Clock) -> Self {
        Self { repos, clock }
    }

    /// Validate a checkout and store it as one order.
    ///
    /// Fields are checked in the order address, zip, phone, card, items; the
    /// first problem is reported.
    ///
    /// # Errors
    ///
    /// - `ServiceError::BadRequest` for a missing field
    /// - `ServiceError::Invalid` for a malformed field or line
    /// - `ServiceError::NotFound` if any line names a missing listing
    /// - `ServiceError::Failed` if the order could not be stored
    pub async fn place(
        &self,
        buyer: AccountId,
        input: OrderInput,
    ) -> Result<PlacedOrder, ServiceError> {
        let address = present(input.address.as_deref())
            .ok_or_else(|| ServiceError::bad_request("Missing 'address' field."))?;
        let address = clean_text(address, 1, ADDRESS_MAX, "address").map_err(|_| {
            ServiceError::invalid("Address must be upto 400 characters with no invalid characters.")
        })?;

        let zip: String = input
            .zip
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(|c| *c != ' ')
            .collect();
        if zip.is_empty() {
            return Err(ServiceError::bad_request("Missing 'zip code' field."));
        }
        let postal_code =
            PostalCode::parse(&zip).map_err(|_| ServiceError::invalid("Invalid zip code."))?;

        let phone = present(input.phone.as_deref())
            .ok_or_else(|| ServiceError::bad_request("Missing 'phone number' field."))?;
        let contact_number =
            PhoneNumber::parse(phone).map_err(|_| ServiceError::invalid("Invalid phone number."))?;

        let (Some(card), Some(exp), Some(csc)) = (
            present(input.card.as_deref()),
            present(input.exp.as_deref()),
            present(input.csc.as_deref()),
        ) else {
            return Err(ServiceError::bad_request(
                "Missing required fields: card, exp, or csc.",
            ));
        };
        let card = PaymentCard::parse(card, csc, exp, self.clock.today())
            .map_err(|_| ServiceError::invalid("Invalid card."))?;

        let lines = match input.items {
            Some(items) if !items.is_empty() => items
                .iter()
                .map(parse_line)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(ServiceError::bad_request("Missing 'items' field.")),
        };

        let total = self.price_lines(&lines).await?;
        let (order, items) = self
            .repos
            .orders
            .place(
                NewOrder {
                    buyer_id: buyer,
                    address,
                    postal_code,
                    contact_number,
                    total,
                },
                &lines,
            )
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ServiceError::not_found("Item not found."),
                other => ServiceError::failed("Failed to place order.")(other),
            })?;

        tracing::info!(
            order_id = %order.id,
            buyer_id = %buyer,
            lines = items.len(),
            total = %order.total,
            card = %card.last_four(),
            "order placed"
        );
        Ok(PlacedOrder { order, items })
    }

    /// Sum of current unit price times quantity over all lines.
    async fn price_lines(&self, lines: &[NewOrderItem]) -> Result<Price, ServiceError> {
        let mut ids: Vec<ListingId> = lines.iter().map(|line| line.listing_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let prices: HashMap<ListingId, Price> = self
            .repos
            .listings
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|listing| (listing.id, listing.price))
            .collect();

        lines
            .iter()
            .map(|line| {
                prices
                    .get(&line.listing_id)
                    .map(|price| price.times(line.quantity))
                    .ok_or_else(|| ServiceError::not_found("Item not found."))
            })
            .sum()
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse one line: the id must be an integer, then the quantity must be an
/// integer, then the quantity must be positive.
fn parse_line(line: &OrderLineInput) -> Result<NewOrderItem, ServiceError> {
    let malformed = || ServiceError::invalid("Invalid item or quantity.");

    let listing_id = line
        .id
        .as_deref()
        .and_then(|id| id.trim().parse::<i32>().ok())
        .map(ListingId::new)
        .ok_or_else(malformed)?;

    let quantity = match line.quantity.as_deref() {
        None => 0,
        Some(q) => q.trim().parse::<i64>().map_err(|_| malformed())?,
    };
    if quantity <= 0 {
        return Err(ServiceError::invalid("Invalid quantity."));
    }
    // Stored as a 32-bit signed column
    let quantity = i32::try_from(quantity).map_err(|_| malformed())?.unsigned_abs();

    Ok(NewOrderItem {
        listing_id,
        quantity,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secure_commerce_core::Role;

    use super::*;
    use crate::models::Account;
    use crate::services::listings::ListingInput;
    use crate::services::testing::Fixture;

    fn line(id: impl ToString, quantity: impl ToString) -> OrderLineInput {
        OrderLineInput {
            id: Some(id.to_string()),
            quantity: Some(quantity.to_string()),
        }
    }

    fn checkout(items: Vec<OrderLineInput>) -> OrderInput {
        OrderInput {
            address: Some("1 Main St, Ottawa".to_owned()),
            zip: Some("K1A 0B1".to_owned()),
            phone: Some("6139954422".to_owned()),
            card: Some("4111111111111111".to_owned()),
            exp: Some("12/99".to_owned()),
            csc: Some("123".to_owned()),
            items: Some(items),
        }
    }

    async fn setup(fx: &Fixture) -> (Account, ListingId, ListingId) {
        let seller = fx.account("s@example.com", Role::Seller).await;
        let buyer = fx.account("b@example.com", Role::Customer).await;
        let mut ids = Vec::new();
        for (name, price) in [("Widget", "100"), ("Gadget", "25")] {
            let listing = fx
                .listings()
                .create(
                    seller.id,
                    ListingInput {
                        name: name.to_owned(),
                        price: price.to_owned(),
                        image_url: "https://cdn.example.com/item.png".to_owned(),
                    },
                )
                .await
                .unwrap();
            ids.push(listing.id);
        }
        (buyer, ids[0], ids[1])
    }

    fn message(result: Result<PlacedOrder, ServiceError>) -> String {
        match result {
            Err(
                ServiceError::BadRequest(m) | ServiceError::Invalid(m) | ServiceError::NotFound(m),
            ) => m,
            other => panic!("expected a client error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_total_is_sum_of_lines() {
        let fx = Fixture::new();
        let (buyer, widget, gadget) = setup(&fx).await;

        let placed = fx
            .orders()
            .place(buyer.id, checkout(vec![line(widget, 2), line(gadget, 3)]))
            .await
            .unwrap();

        assert_eq!(placed.order.total, Price::listing(275).unwrap());
        assert_eq!(placed.items.len(), 2);
        assert_eq!(placed.order.postal_code.as_str(), "K1A0B1");
        assert_eq!(placed.order.contact_number.as_str(), "+16139954422");
        assert_eq!(OrderReceipt::from(&placed).total, "$275");
    }

    #[tokio::test]
    async fn test_missing_listing_writes_nothing() {
        let fx = Fixture::new();
        let (buyer, widget, _) = setup(&fx).await;

        let result = fx
            .orders()
            .place(buyer.id, checkout(vec![line(widget, 1), line(9999, 1)]))
            .await;
        assert_eq!(message(result), "Item not found.");
        assert_eq!(fx.repos.orders.count_orders().await.unwrap(), 0);
        assert_eq!(fx.repos.orders.count_order_items().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_quantities_write_nothing() {
        let fx = Fixture::new();
        let (buyer, widget, gadget) = setup(&fx).await;

        for (quantity, expected) in [
            ("0", "Invalid quantity."),
            ("-2", "Invalid quantity."),
            ("two", "Invalid item or quantity."),
            ("1.5", "Invalid item or quantity."),
            ("2147483648", "Invalid item or quantity."),
            ("99999999999999999999", "Invalid item or quantity."),
        ] {
            let result = fx
                .orders()
                .place(buyer.id, checkout(vec![line(widget, 1), line(gadget, quantity)]))
                .await;
            assert_eq!(message(result), expected);
        }

        let no_quantity = OrderLineInput {
            id: Some(widget.to_string()),
            quantity: None,
        };
        let result = fx.orders().place(buyer.id, checkout(vec![no_quantity])).await;
        assert_eq!(message(result), "Invalid quantity.");
        assert_eq!(fx.repos.orders.count_orders().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back() {
        let fx = Fixture::new();
        let (buyer, widget, gadget) = setup(&fx).await;
        fx.store.set_fail_order_writes(true);

        let result = fx
            .orders()
            .place(buyer.id, checkout(vec![line(widget, 1), line(gadget, 1)]))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Failed { message: "Failed to place order.", .. })
        ));
        assert_eq!(fx.repos.orders.count_orders().await.unwrap(), 0);
        assert_eq!(fx.repos.orders.count_order_items().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_field_messages_in_order() {
        let fx = Fixture::new();
        let (buyer, widget, _) = setup(&fx).await;
        let base = || checkout(vec![line(widget, 1)]);
        let orders = fx.orders();

        let cases: Vec<(OrderInput, &str)> = vec![
            (OrderInput { address: None, ..base() }, "Missing 'address' field."),
            (
                OrderInput { address: Some("<script>x</script>".to_owned()), ..base() },
                "Address must be upto 400 characters with no invalid characters.",
            ),
            (
                OrderInput { address: Some("a".repeat(401)), ..base() },
                "Address must be upto 400 characters with no invalid characters.",
            ),
            (OrderInput { zip: Some("  ".to_owned()), ..base() }, "Missing 'zip code' field."),
            (OrderInput { zip: Some("12345".to_owned()), ..base() }, "Invalid zip code."),
            (OrderInput { phone: None, ..base() }, "Missing 'phone number' field."),
            (OrderInput { phone: Some("2125551234".to_owned()), ..base() }, "Invalid phone number."),
            (OrderInput { csc: None, ..base() }, "Missing required fields: card, exp, or csc."),
            (OrderInput { card: Some("4111".to_owned()), ..base() }, "Invalid card."),
            (OrderInput { exp: Some("01/20".to_owned()), ..base() }, "Invalid card."),
            (OrderInput { items: Some(Vec::new()), ..base() }, "Missing 'items' field."),
            (OrderInput { items: None, ..base() }, "Missing 'items' field."),
            (
                OrderInput { items: Some(vec![line("abc", 1)]), ..base() },
                "Invalid item or quantity.",
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(message(orders.place(buyer.id, input).await), expected);
        }
        assert_eq!(fx.repos.orders.count_orders().await.unwrap(), 0);
    }
}
