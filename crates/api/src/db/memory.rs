//! In-memory implementation of every repository trait.
//!
//! One mutex guards the whole store, so each trait method (settlement
//! included) is atomic with respect to every other. Used by the test
//! suites and for running the API without a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use cartline_core::{
    CartItemId, CartLine, Email, OrderDraft, OrderId, OrderItemId, OrderStatus, ProductId, UserId,
};

use super::{
    CartRepository, OrderRepository, RefreshTokenRepository, RepositoryError, UserRepository,
};
use crate::models::{
    NewProduct, NewUser, Order, OrderItem, Product, RefreshTokenRecord, SettlementOutcome,
    SettlementRequest, User, UserCredentials,
};

#[derive(Debug, Clone)]
struct CartItem {
    id: CartItemId,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserCredentials>,
    refresh_tokens: HashMap<UserId, RefreshTokenRecord>,
    products: HashMap<ProductId, Product>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    payment_events: HashSet<String>,
}

impl State {
    fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        self.cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .map(|item| {
                let product = self.products.get(&item.product_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart item {} references missing product",
                        item.id
                    ))
                })?;
                Ok(CartLine {
                    cart_item_id: item.id,
                    product_id: item.product_id,
                    product_name: product.name.clone(),
                    unit_price: product.price,
                    quantity: item.quantity,
                    stock: product.quantity,
                })
            })
            .collect()
    }
}

/// Shared in-memory store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a product to the catalog.
    pub fn insert_product(&self, product: NewProduct) -> Product {
        let product = Product {
            id: ProductId::generate(),
            name: product.name,
            description: product.description,
            price: product.price,
            quantity: product.quantity,
        };
        self.lock().products.insert(product.id, product.clone());
        product
    }

    /// Current state of a product.
    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.lock().products.get(&id).cloned()
    }

    /// Number of orders across all users.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let mut state = self.lock();
        if state
            .users
            .values()
            .any(|creds| creds.user.email == new_user.email)
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            role: new_user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(
            user.id,
            UserCredentials {
                user: user.clone(),
                password_hash: new_user.password_hash.clone(),
            },
        );
        Ok(user)
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|creds| &creds.user.email == email)
            .cloned())
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock().users.get(&id).map(|creds| creds.user.clone()))
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryStore {
    async fn insert(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<RefreshTokenRecord, RepositoryError> {
        let mut state = self.lock();
        if state.refresh_tokens.contains_key(&user_id) {
            return Err(RepositoryError::Conflict(
                "refresh token already exists".to_owned(),
            ));
        }

        let now = Utc::now();
        let record = RefreshTokenRecord {
            user_id,
            token_hash: token_hash.to_owned(),
            created_at: now,
            updated_at: now,
        };
        state.refresh_tokens.insert(user_id, record.clone());
        Ok(record)
    }

    async fn find_by_user_id(
        &self,
        user_id: UserId,
    ) -> Result<Option<RefreshTokenRecord>, RepositoryError> {
        Ok(self.lock().refresh_tokens.get(&user_id).cloned())
    }

    async fn replace(
        &self,
        user_id: UserId,
        token_hash: &str,
    ) -> Result<RefreshTokenRecord, RepositoryError> {
        let mut state = self.lock();
        let record = state
            .refresh_tokens
            .get_mut(&user_id)
            .ok_or(RepositoryError::NotFound)?;
        token_hash.clone_into(&mut record.token_hash);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.lock().refresh_tokens.remove(&user_id).is_some())
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn lines_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        self.lock().cart_lines(user_id)
    }

    async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError> {
        let mut state = self.lock();
        let product = state
            .products
            .get(&product_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;

        if quantity > product.quantity {
            return Err(RepositoryError::InsufficientStock(product_id));
        }
        if state
            .cart_items
            .iter()
            .any(|item| item.user_id == user_id && item.product_id == product_id)
        {
            return Err(RepositoryError::Conflict(
                "Product is already in cart".to_owned(),
            ));
        }

        let item = CartItem {
            id: CartItemId::generate(),
            user_id,
            product_id,
            quantity,
        };
        state.cart_items.push(item.clone());

        Ok(CartLine {
            cart_item_id: item.id,
            product_id,
            product_name: product.name,
            unit_price: product.price,
            quantity,
            stock: product.quantity,
        })
    }

    async fn get_item(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        Ok(self
            .lock()
            .cart_lines(user_id)?
            .into_iter()
            .find(|line| line.cart_item_id == cart_item_id))
    }

    async fn update_quantity(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartLine, RepositoryError> {
        let mut state = self.lock();
        let mut line = state
            .cart_lines(user_id)?
            .into_iter()
            .find(|line| line.cart_item_id == cart_item_id)
            .ok_or(RepositoryError::NotFound)?;

        if quantity > line.stock {
            return Err(RepositoryError::InsufficientStock(line.product_id));
        }

        if let Some(item) = state
            .cart_items
            .iter_mut()
            .find(|item| item.id == cart_item_id)
        {
            item.quantity = quantity;
        }

        line.quantity = quantity;
        Ok(line)
    }

    async fn remove_item(
        &self,
        user_id: UserId,
        cart_item_id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        let before = state.cart_items.len();
        state
            .cart_items
            .retain(|item| !(item.id == cart_item_id && item.user_id == user_id));
        Ok(state.cart_items.len() < before)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn list_for_user(
        &self,
        user_id: UserId,
        status: OrderStatus,
    ) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .rev()
            .filter(|order| order.user_id == user_id && order.status == status)
            .cloned()
            .collect())
    }

    async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|order| order.id == order_id && order.user_id == user_id)
            .cloned())
    }

    async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementOutcome, RepositoryError> {
        let mut state = self.lock();

        if state.payment_events.contains(&request.event_id) {
            return Ok(SettlementOutcome::AlreadyProcessed);
        }
        if state
            .orders
            .iter()
            .any(|order| order.checkout_session_id == request.checkout_session_id)
        {
            state.payment_events.insert(request.event_id.clone());
            return Ok(SettlementOutcome::AlreadyProcessed);
        }

        let lines = state.cart_lines(request.user_id)?;
        if lines.is_empty() {
            state.payment_events.insert(request.event_id.clone());
            return Ok(SettlementOutcome::EmptyCart);
        }

        let draft = OrderDraft::from_cart(&lines).map_err(|e| {
            RepositoryError::DataCorruption(format!("cart cannot be settled: {e}"))
        })?;

        // Check every line before touching anything so a failure leaves
        // the store unchanged
        for line in &draft.lines {
            let stock = state
                .products
                .get(&line.product_id)
                .map_or(0, |product| product.quantity);
            if stock < line.quantity {
                return Err(RepositoryError::InsufficientStock(line.product_id));
            }
        }

        for line in &draft.lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.quantity -= line.quantity;
            }
        }

        let order_id = OrderId::generate();
        let order = Order {
            id: order_id,
            user_id: request.user_id,
            checkout_session_id: request.checkout_session_id.clone(),
            total: draft.total,
            status: OrderStatus::Delivering,
            items: draft
                .lines
                .iter()
                .map(|line| OrderItem {
                    id: OrderItemId::generate(),
                    order_id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            created_at: Utc::now(),
        };

        let settled: HashSet<CartItemId> = lines.iter().map(|line| line.cart_item_id).collect();
        state.cart_items.retain(|item| !settled.contains(&item.id));
        state.orders.push(order.clone());
        state.payment_events.insert(request.event_id.clone());

        Ok(SettlementOutcome::Settled(order))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartline_core::{CurrencyCode, Price, UserRole};
    use rust_decimal::Decimal;

    use super::*;

    fn product(store: &MemoryStore, price: &str, quantity: i32) -> Product {
        store.insert_product(NewProduct {
            name: "Widget".to_string(),
            description: None,
            price: Price::new(price.parse().unwrap(), CurrencyCode::USD),
            quantity,
        })
    }

    fn request(user_id: UserId, event_id: &str, session: &str) -> SettlementRequest {
        SettlementRequest {
            event_id: event_id.to_string(),
            event_type: "checkout.session.completed".to_string(),
            checkout_session_id: session.to_string(),
            user_id,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let new_user = NewUser {
            name: "Ada".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            password_hash: "hash".to_string(),
            role: UserRole::Customer,
        };
        UserRepository::create(&store, &new_user).await.unwrap();
        assert!(matches!(
            UserRepository::create(&store, &new_user).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_single_row() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();

        assert!(matches!(
            store.replace(user_id, "a").await,
            Err(RepositoryError::NotFound)
        ));
        store.insert(user_id, "a").await.unwrap();
        assert!(matches!(
            store.insert(user_id, "b").await,
            Err(RepositoryError::Conflict(_))
        ));
        store.replace(user_id, "b").await.unwrap();
        assert_eq!(
            store.find_by_user_id(user_id).await.unwrap().unwrap().token_hash,
            "b"
        );
        assert!(store.delete(user_id).await.unwrap());
        assert!(!store.delete(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_item_rules() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        let widget = product(&store, "5.00", 2);

        assert!(matches!(
            store.add_item(user_id, ProductId::generate(), 1).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            store.add_item(user_id, widget.id, 3).await,
            Err(RepositoryError::InsufficientStock(_))
        ));
        store.add_item(user_id, widget.id, 2).await.unwrap();
        assert!(matches!(
            store.add_item(user_id, widget.id, 1).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_remove_are_owner_scoped() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let stranger = UserId::generate();
        let widget = product(&store, "5.00", 4);
        let line = store.add_item(owner, widget.id, 1).await.unwrap();

        assert!(
            store
                .get_item(stranger, line.cart_item_id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            store.update_quantity(stranger, line.cart_item_id, 2).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(!store.remove_item(stranger, line.cart_item_id).await.unwrap());

        assert!(matches!(
            store.update_quantity(owner, line.cart_item_id, 5).await,
            Err(RepositoryError::InsufficientStock(_))
        ));
        let updated = store
            .update_quantity(owner, line.cart_item_id, 4)
            .await
            .unwrap();
        assert_eq!(updated.quantity, 4);
        assert_eq!(
            store
                .get_item(owner, line.cart_item_id)
                .await
                .unwrap()
                .unwrap()
                .quantity,
            4
        );

        assert!(store.remove_item(owner, line.cart_item_id).await.unwrap());
        assert!(store.lines_for_user(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settle_creates_order_and_clears_cart() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        let widget = product(&store, "10.00", 5);
        store.add_item(user_id, widget.id, 2).await.unwrap();

        let outcome = store.settle(&request(user_id, "evt_1", "cs_1")).await.unwrap();
        let SettlementOutcome::Settled(order) = outcome else {
            panic!("expected a settled order, got {outcome:?}");
        };

        assert_eq!(order.total.amount, Decimal::new(2000, 2));
        assert_eq!(order.items.len(), 1);
        assert_eq!(store.product(widget.id).unwrap().quantity, 3);
        assert!(store.lines_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settle_replay_is_noop() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        let widget = product(&store, "10.00", 5);
        store.add_item(user_id, widget.id, 2).await.unwrap();

        store.settle(&request(user_id, "evt_1", "cs_1")).await.unwrap();
        assert_eq!(
            store.settle(&request(user_id, "evt_1", "cs_1")).await.unwrap(),
            SettlementOutcome::AlreadyProcessed
        );
        // A different event for the same checkout session is also a replay
        assert_eq!(
            store.settle(&request(user_id, "evt_2", "cs_1")).await.unwrap(),
            SettlementOutcome::AlreadyProcessed
        );
        assert_eq!(store.order_count(), 1);
        assert_eq!(store.product(widget.id).unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_settle_insufficient_stock_rolls_back() {
        let store = MemoryStore::new();
        let user_id = UserId::generate();
        let plenty = product(&store, "1.00", 10);
        let scarce = product(&store, "1.00", 1);
        store.add_item(user_id, plenty.id, 2).await.unwrap();
        store.add_item(user_id, scarce.id, 1).await.unwrap();

        // Someone else buys the last unit first
        store.state.lock().unwrap().products.get_mut(&scarce.id).unwrap().quantity = 0;

        assert!(matches!(
            store.settle(&request(user_id, "evt_1", "cs_1")).await,
            Err(RepositoryError::InsufficientStock(id)) if id == scarce.id
        ));
        assert_eq!(store.product(plenty.id).unwrap().quantity, 10);
        assert_eq!(store.lines_for_user(user_id).await.unwrap().len(), 2);
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_settle_empty_cart() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .settle(&request(UserId::generate(), "evt_1", "cs_1"))
                .await
                .unwrap(),
            SettlementOutcome::EmptyCart
        );
        assert_eq!(store.order_count(), 0);
    }
}
