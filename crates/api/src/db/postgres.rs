//! `PostgreSQL` repository implementation.
//!
//! Queries are checked at runtime (`sqlx::query_as`) and read into private
//! row types, which are converted into domain records. A row that fails
//! conversion is reported as [`RepositoryError::DataCorruption`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use secure_commerce_core::{
    AccountId, Email, FeedbackId, ImageUrl, ListingId, OrderId, OrderItemId, OtpCode, OtpId,
    PhoneNumber, PostalCode, Price, Role,
};

use super::{
    AccountRepository, FeedbackRepository, ListingRepository, OrderRepository, OtpRepository,
    RepositoryError, StoreHealth, TokenBlacklist, conflict_on_unique,
};
use crate::models::{
    Account, Feedback, Listing, NewAccount, NewListing, NewOrder, NewOrderItem, Order, OrderItem,
    Otp,
};

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, user_type, first_name, last_name, \
                               contact_number, address, is_active, created_at";

const LISTING_SELECT: &str = "SELECT l.id, l.name, l.price, l.image_url, l.seller_id, \
                              a.first_name AS seller_name, l.created_at \
                              FROM listings l JOIN accounts a ON a.id = l.seller_id";

const ORDER_COLUMNS: &str = "id, buyer_id, address, zip, contact_number, price, created_at";

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i32,
    email: String,
    password_hash: String,
    user_type: i16,
    first_name: String,
    last_name: String,
    contact_number: Option<String>,
    address: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role = Role::try_from(row.user_type)
            .map_err(|e| RepositoryError::DataCorruption(format!("account {}: {e}", row.id)))?;

        Ok(Self {
            id: AccountId::new(row.id),
            email: Email::from_trusted(row.email),
            password_hash: row.password_hash,
            role,
            first_name: row.first_name,
            last_name: row.last_name,
            contact_number: row.contact_number.map(PhoneNumber::from_trusted),
            address: row.address,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OtpRow {
    id: i32,
    account_id: i32,
    code: i16,
    used: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<OtpRow> for Otp {
    type Error = RepositoryError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let code = u16::try_from(row.code)
            .ok()
            .and_then(|code| OtpCode::new(code).ok())
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!("otp {}: code out of range", row.id))
            })?;

        Ok(Self {
            id: OtpId::new(row.id),
            account_id: AccountId::new(row.account_id),
            code,
            used: row.used,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: i32,
    name: String,
    price: Decimal,
    image_url: String,
    seller_id: i32,
    seller_name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = RepositoryError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.price)
            .map_err(|e| RepositoryError::DataCorruption(format!("listing {}: {e}", row.id)))?;

        Ok(Self {
            id: ListingId::new(row.id),
            name: row.name,
            price,
            image_url: ImageUrl::from_trusted(row.image_url),
            seller_id: AccountId::new(row.seller_id),
            seller_name: row.seller_name,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    buyer_id: i32,
    address: String,
    zip: String,
    contact_number: String,
    price: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let total = Price::new(row.price)
            .map_err(|e| RepositoryError::DataCorruption(format!("order {}: {e}", row.id)))?;

        Ok(Self {
            id: OrderId::new(row.id),
            buyer_id: AccountId::new(row.buyer_id),
            address: row.address,
            postal_code: PostalCode::from_trusted(row.zip),
            contact_number: PhoneNumber::from_trusted(row.contact_number),
            total,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    listing_id: i32,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("order item {}: negative quantity", row.id))
        })?;

        Ok(Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            listing_id: ListingId::new(row.listing_id),
            quantity,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FeedbackRow {
    id: i32,
    account_id: i32,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: FeedbackId::new(row.id),
            account_id: AccountId::new(row.account_id),
            message: row.message,
            created_at: row.created_at,
        }
    }
}

/// A foreign key violation means a referenced row is gone.
fn missing_on_foreign_key(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(e)
}

fn quantity_param(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::Conflict(format!("quantity {quantity} is too large")))
}

/// Repositories backed by a `PostgreSQL` pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn create(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO accounts (email, password_hash, user_type, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(account.email.as_str())
        .bind(&account.password_hash)
        .bind(account.role.code())
        .bind(&account.first_name)
        .bind(&account.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?;

        row.try_into()
    }
}

#[async_trait]
impl OtpRepository for PgStore {
    async fn replace_for_account(
        &self,
        account_id: AccountId,
        code: OtpCode,
        created_at: DateTime<Utc>,
    ) -> Result<Otp, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM otps WHERE account_id = $1")
            .bind(account_id.as_i32())
            .execute(&mut *tx)
            .await?;

        let code = i16::try_from(code.value())
            .map_err(|_| RepositoryError::Conflict("otp code out of range".to_owned()))?;
        let row = sqlx::query_as::<_, OtpRow>(
            "INSERT INTO otps (account_id, code, created_at) VALUES ($1, $2, $3) \
             RETURNING id, account_id, code, used, created_at",
        )
        .bind(account_id.as_i32())
        .bind(code)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(missing_on_foreign_key)?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Otp>, RepositoryError> {
        let row = sqlx::query_as::<_, OtpRow>(
            "SELECT id, account_id, code, used, created_at FROM otps \
             WHERE account_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(account_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn redeem(
        &self,
        id: OtpId,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE otps SET used = TRUE WHERE id = $1 AND account_id = $2 AND used = FALSE",
        )
        .bind(id.as_i32())
        .bind(account_id.as_i32())
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() != 1 {
            return Ok(false);
        }

        let updated = sqlx::query("UPDATE accounts SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(account_id.as_i32())
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        // Dropping `tx` on any early return above leaves the code unused.
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM otps WHERE created_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ListingRepository for PgStore {
    async fn list_all(&self) -> Result<Vec<Listing>, RepositoryError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!("{LISTING_SELECT} ORDER BY l.id"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_seller(&self, seller_id: AccountId) -> Result<Vec<Listing>, RepositoryError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{LISTING_SELECT} WHERE l.seller_id = $1 ORDER BY l.id"
        ))
        .bind(seller_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_id(&self, id: ListingId) -> Result<Option<Listing>, RepositoryError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!("{LISTING_SELECT} WHERE l.id = $1"))
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_many(&self, ids: &[ListingId]) -> Result<Vec<Listing>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ListingId::as_i32).collect();
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "{LISTING_SELECT} WHERE l.id = ANY($1) ORDER BY l.id"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create(&self, listing: NewListing) -> Result<Listing, RepositoryError> {
        let row = sqlx::query_as::<_, ListingRow>(
            "WITH inserted AS ( \
                 INSERT INTO listings (name, price, image_url, seller_id) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, name, price, image_url, seller_id, created_at \
             ) \
             SELECT i.id, i.name, i.price, i.image_url, i.seller_id, \
                    a.first_name AS seller_name, i.created_at \
             FROM inserted i JOIN accounts a ON a.id = i.seller_id",
        )
        .bind(&listing.name)
        .bind(listing.price.amount())
        .bind(listing.image_url.as_str())
        .bind(listing.seller_id.as_i32())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match conflict_on_unique(e, "listing name") {
            RepositoryError::Database(e) => missing_on_foreign_key(e),
            other => other,
        })?;

        row.try_into()
    }

    async fn delete(&self, id: ListingId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn place(
        &self,
        order: NewOrder,
        items: &[NewOrderItem],
    ) -> Result<(Order, Vec<OrderItem>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order_row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (buyer_id, address, zip, contact_number, price) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.buyer_id.as_i32())
        .bind(&order.address)
        .bind(order.postal_code.as_str())
        .bind(order.contact_number.as_str())
        .bind(order.total.amount())
        .fetch_one(&mut *tx)
        .await
        .map_err(missing_on_foreign_key)?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItemRow>(
                "INSERT INTO order_items (order_id, listing_id, quantity) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, order_id, listing_id, quantity",
            )
            .bind(order_row.id)
            .bind(item.listing_id.as_i32())
            .bind(quantity_param(item.quantity)?)
            .fetch_one(&mut *tx)
            .await
            .map_err(missing_on_foreign_key)?;
            lines.push(OrderItem::try_from(row)?);
        }

        // Dropping `tx` on any early return above rolls everything back.
        tx.commit().await?;
        Ok((order_row.try_into()?, lines))
    }

    async fn find_with_items(
        &self,
        id: OrderId,
    ) -> Result<Option<(Order, Vec<OrderItem>)>, RepositoryError> {
        let Some(order_row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, listing_id, quantity FROM order_items \
             WHERE order_id = $1 ORDER BY id",
        )
        .bind(id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some((order_row.try_into()?, items)))
    }

    async fn count_orders(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.unsigned_abs())
    }

    async fn count_order_items(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.unsigned_abs())
    }
}

#[async_trait]
impl FeedbackRepository for PgStore {
    async fn create(
        &self,
        account_id: AccountId,
        message: &str,
    ) -> Result<Feedback, RepositoryError> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            "INSERT INTO feedback (account_id, message) VALUES ($1, $2) \
             RETURNING id, account_id, message, created_at",
        )
        .bind(account_id.as_i32())
        .bind(message)
        .fetch_one(&self.pool)
        .await
        .map_err(missing_on_foreign_key)?;

        Ok(row.into())
    }
}

#[async_trait]
impl TokenBlacklist for PgStore {
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2) \
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;

        Ok(revoked)
    }

    async fn prune_expired(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
