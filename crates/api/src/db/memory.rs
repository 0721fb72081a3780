//! In-process repository implementation.
//!
//! Backs the integration tests and the `SHOP_IN_MEMORY=1` development mode.
//! All tables sit behind one lock, so every operation, order placement
//! included, is atomic with respect to the others.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use secure_commerce_core::{
    AccountId, Email, FeedbackId, ListingId, OrderId, OrderItemId, OtpCode, OtpId,
};

use super::{
    AccountRepository, FeedbackRepository, ListingRepository, OrderRepository, OtpRepository,
    RepositoryError, StoreHealth, TokenBlacklist,
};
use crate::models::{
    Account, Feedback, Listing, NewAccount, NewListing, NewOrder, NewOrderItem, Order, OrderItem,
    Otp,
};

#[derive(Default)]
struct Tables {
    next_id: i32,
    accounts: BTreeMap<AccountId, Account>,
    otps: BTreeMap<OtpId, Otp>,
    listings: BTreeMap<ListingId, Listing>,
    orders: BTreeMap<OrderId, Order>,
    order_items: BTreeMap<OrderItemId, OrderItem>,
    feedback: Vec<Feedback>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Repository implementation holding every table in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_order_writes: AtomicBool,
    fail_password_writes: AtomicBool,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent order placement fail after its order row has
    /// been staged, as a lost connection mid-transaction would.
    pub fn set_fail_order_writes(&self, fail: bool) {
        self.fail_order_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent password reset fail after its code has been
    /// claimed, as a lost connection mid-transaction would.
    pub fn set_fail_password_writes(&self, fail: bool) {
        self.fail_password_writes.store(fail, Ordering::SeqCst);
    }

    /// Make [`StoreHealth::ping`] report the store as unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every code stored for an account, oldest first.
    pub async fn otps_for(&self, account_id: AccountId) -> Vec<Otp> {
        self.tables
            .lock()
            .await
            .otps
            .values()
            .filter(|otp| otp.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Every stored feedback message, oldest first.
    pub async fn feedback(&self) -> Vec<Feedback> {
        self.tables.lock().await.feedback.clone()
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .accounts
            .values()
            .find(|account| &account.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.tables.lock().await.accounts.get(&id).cloned())
    }

    async fn exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .accounts
            .values()
            .any(|account| &account.email == email))
    }

    async fn create(&self, new: NewAccount) -> Result<Account, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.accounts.values().any(|a| a.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let account = Account {
            id: AccountId::new(tables.next_id()),
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            first_name: new.first_name,
            last_name: new.last_name,
            contact_number: None,
            address: None,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

#[async_trait]
impl OtpRepository for MemoryStore {
    async fn replace_for_account(
        &self,
        account_id: AccountId,
        code: OtpCode,
        created_at: DateTime<Utc>,
    ) -> Result<Otp, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.accounts.contains_key(&account_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.otps.retain(|_, otp| otp.account_id != account_id);

        let otp = Otp {
            id: OtpId::new(tables.next_id()),
            account_id,
            code,
            used: false,
            created_at,
        };
        tables.otps.insert(otp.id, otp.clone());
        Ok(otp)
    }

    async fn find_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Otp>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .otps
            .values()
            .filter(|otp| otp.account_id == account_id)
            .max_by_key(|otp| (otp.created_at, otp.id))
            .cloned())
    }

    async fn redeem(
        &self,
        id: OtpId,
        account_id: AccountId,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let claimable = tables
            .otps
            .get(&id)
            .is_some_and(|otp| otp.account_id == account_id && !otp.used);
        if !claimable {
            return Ok(false);
        }
        if !tables.accounts.contains_key(&account_id) {
            return Err(RepositoryError::NotFound);
        }
        if self.fail_password_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(
                "password write failed".to_owned(),
            )));
        }

        if let Some(otp) = tables.otps.get_mut(&id) {
            otp.used = true;
        }
        if let Some(account) = tables.accounts.get_mut(&account_id) {
            password_hash.clone_into(&mut account.password_hash);
        }
        Ok(true)
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let count = tables.otps.len();
        tables.otps.retain(|_, otp| otp.created_at >= before);
        Ok((count - tables.otps.len()) as u64)
    }
}

#[async_trait]
impl ListingRepository for MemoryStore {
    async fn list_all(&self) -> Result<Vec<Listing>, RepositoryError> {
        Ok(self.tables.lock().await.listings.values().cloned().collect())
    }

    async fn list_by_seller(&self, seller_id: AccountId) -> Result<Vec<Listing>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .listings
            .values()
            .filter(|listing| listing.seller_id == seller_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ListingId) -> Result<Option<Listing>, RepositoryError> {
        Ok(self.tables.lock().await.listings.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[ListingId]) -> Result<Vec<Listing>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .listings
            .values()
            .filter(|listing| ids.contains(&listing.id))
            .cloned()
            .collect())
    }

    async fn create(&self, new: NewListing) -> Result<Listing, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.listings.values().any(|l| l.name == new.name) {
            return Err(RepositoryError::Conflict("listing name already exists".to_owned()));
        }
        let seller_name = tables
            .accounts
            .get(&new.seller_id)
            .map(|seller| seller.first_name.clone())
            .ok_or(RepositoryError::NotFound)?;

        let listing = Listing {
            id: ListingId::new(tables.next_id()),
            name: new.name,
            price: new.price,
            image_url: new.image_url,
            seller_id: new.seller_id,
            seller_name,
            created_at: Utc::now(),
        };
        tables.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn delete(&self, id: ListingId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.listings.remove(&id).is_none() {
            return Ok(false);
        }
        tables.order_items.retain(|_, item| item.listing_id != id);
        Ok(true)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn place(
        &self,
        new: NewOrder,
        items: &[NewOrderItem],
    ) -> Result<(Order, Vec<OrderItem>), RepositoryError> {
        let mut tables = self.tables.lock().await;
        if items
            .iter()
            .any(|item| !tables.listings.contains_key(&item.listing_id))
        {
            return Err(RepositoryError::NotFound);
        }

        // Stage everything, then commit in one step.
        let order = Order {
            id: OrderId::new(tables.next_id()),
            buyer_id: new.buyer_id,
            address: new.address,
            postal_code: new.postal_code,
            contact_number: new.contact_number,
            total: new.total,
            created_at: Utc::now(),
        };
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            lines.push(OrderItem {
                id: OrderItemId::new(tables.next_id()),
                order_id: order.id,
                listing_id: item.listing_id,
                quantity: item.quantity,
            });
        }

        if self.fail_order_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(
                "order item write failed".to_owned(),
            )));
        }

        tables.orders.insert(order.id, order.clone());
        for line in &lines {
            tables.order_items.insert(line.id, line.clone());
        }
        Ok((order, lines))
    }

    async fn find_with_items(
        &self,
        id: OrderId,
    ) -> Result<Option<(Order, Vec<OrderItem>)>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(&id).map(|order| {
            let items = tables
                .order_items
                .values()
                .filter(|item| item.order_id == id)
                .cloned()
                .collect();
            (order.clone(), items)
        }))
    }

    async fn count_orders(&self) -> Result<u64, RepositoryError> {
        Ok(self.tables.lock().await.orders.len() as u64)
    }

    async fn count_order_items(&self) -> Result<u64, RepositoryError> {
        Ok(self.tables.lock().await.order_items.len() as u64)
    }
}

#[async_trait]
impl FeedbackRepository for MemoryStore {
    async fn create(
        &self,
        account_id: AccountId,
        message: &str,
    ) -> Result<Feedback, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.accounts.contains_key(&account_id) {
            return Err(RepositoryError::NotFound);
        }
        let feedback = Feedback {
            id: FeedbackId::new(tables.next_id()),
            account_id,
            message: message.to_owned(),
            created_at: Utc::now(),
        };
        tables.feedback.push(feedback.clone());
        Ok(feedback)
    }
}

#[async_trait]
impl TokenBlacklist for MemoryStore {
    async fn revoke(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        tables.revoked.retain(|_, expiry| *expiry >= now);
        tables.revoked.insert(jti, expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.tables.lock().await.revoked.contains_key(&jti))
    }

    async fn prune_expired(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let count = tables.revoked.len();
        tables.revoked.retain(|_, expiry| *expiry >= before);
        Ok((count - tables.revoked.len()) as u64)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}
