use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    CartLineItem,
    abort::AbortToken,
    checkout::{
        AFTER_CHECKOUT_ROUTE, CheckoutError, CheckoutForm, CreateOrderRequest,
        ORDER_FAILED_FALLBACK, PlacedOrder, validate,
    },
    ports::{CartStore, OrderStore, StoreError},
    pricing::PriceBreakdown,
    selection::SelectionModel,
};

/// One customer's cart screen: the fetched cart, the checkout selection and
/// the stores it talks to.
///
/// Every mutation goes to the cart store and is followed by a refetch, after
/// which the selection is reconciled against the new snapshot. Requests are
/// tied to the session's [`AbortToken`]; [`CartSession::close`] drops the ones
/// still in flight.
pub struct CartSession {
    owner_email: String,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    selection: SelectionModel,
    loading: bool,
    abort: AbortToken,
}

impl CartSession {
    pub fn new(
        owner_email: impl Into<String>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            owner_email: owner_email.into(),
            carts,
            orders,
            selection: SelectionModel::default(),
            loading: false,
            abort: AbortToken::new(),
        }
    }

    pub fn owner_email(&self) -> &str {
        &self.owner_email
    }

    pub fn cart(&self) -> &[CartLineItem] {
        self.selection.snapshot()
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn abort_token(&self) -> &AbortToken {
        &self.abort
    }

    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        self.loading = true;
        let result = self
            .abort
            .guard(self.carts.list(&self.owner_email))
            .await
            .map_err(StoreError::from)
            .and_then(|fetched| fetched);
        self.loading = false;

        self.selection.reconcile(result?);
        Ok(())
    }

    pub fn toggle(&mut self, id: Uuid) -> bool {
        self.selection.toggle(id)
    }

    pub fn select_all(&mut self) {
        self.selection.select_all();
    }

    pub async fn add(&mut self, menu_item_id: Uuid) -> Result<(), StoreError> {
        self.abort.guard(self.carts.add(menu_item_id, 1)).await??;
        self.refresh().await
    }

    pub async fn increment(&mut self, id: Uuid) -> Result<(), StoreError> {
        let Some(quantity) = self.quantity_of(id) else {
            return Ok(());
        };
        self.set_quantity(id, quantity + 1).await
    }

    /// Never takes a line below one; use [`CartSession::remove`] for that.
    pub async fn decrement(&mut self, id: Uuid) -> Result<(), StoreError> {
        match self.quantity_of(id) {
            Some(quantity) if quantity > 1 => self.set_quantity(id, quantity - 1).await,
            _ => Ok(()),
        }
    }

    pub async fn remove(&mut self, id: Uuid) -> Result<(), StoreError> {
        let removed = self.abort.guard(self.carts.remove(id)).await?;
        // The cart may have changed server-side even when removal failed.
        let refreshed = self.refresh().await;
        removed?;
        refreshed
    }

    pub fn pricing(&self) -> PriceBreakdown {
        PriceBreakdown::from_subtotal(self.selection.compute_subtotal())
    }

    /// Places an order for the selected lines. Invalid forms and empty
    /// selections fail before any request is sent. A rejected order leaves the
    /// selection untouched so the customer can retry.
    pub async fn checkout(&mut self, form: CheckoutForm) -> Result<PlacedOrder, CheckoutError> {
        let errors = validate(&form);
        if !errors.is_empty() {
            return Err(CheckoutError::Invalid(errors));
        }
        if self.selection.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }

        let request = CreateOrderRequest::from_selection(&self.selection, form);
        let result = self
            .abort
            .guard(self.orders.create(&request))
            .await
            .map_err(StoreError::from)
            .and_then(|created| created);

        match result {
            Ok(order) => {
                info!("Order {} placed for {}", order.id, self.owner_email);
                self.selection.clear();
                // Ordered lines are gone server-side; the order stands even if
                // the refetch fails.
                if let Err(e) = self.refresh().await {
                    warn!("Cart refresh after order {} failed: {e}", order.id);
                }
                Ok(PlacedOrder {
                    order,
                    redirect_to: AFTER_CHECKOUT_ROUTE,
                })
            }
            Err(e) => {
                warn!("Order submission for {} failed: {e}", self.owner_email);
                let message = e.server_message().unwrap_or(ORDER_FAILED_FALLBACK);
                Err(CheckoutError::Rejected(message.to_string()))
            }
        }
    }

    /// Aborts every request this session still has in flight.
    pub fn close(&self) {
        self.abort.abort();
    }

    async fn set_quantity(&mut self, id: Uuid, quantity: i32) -> Result<(), StoreError> {
        self.abort
            .guard(self.carts.set_quantity(id, quantity))
            .await??;
        self.refresh().await
    }

    fn quantity_of(&self, id: Uuid) -> Option<i32> {
        self.cart()
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.quantity)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use chrono::Utc;

    use super::*;
    use crate::storefront::{
        OrderCustomer, OrderRecord, OrderStatus,
        fixtures::{line, valid_form},
        ports::StoreResult,
    };

    #[derive(Default)]
    struct MemoryCarts {
        lines: Mutex<Vec<CartLineItem>>,
    }

    impl MemoryCarts {
        fn with(lines: Vec<CartLineItem>) -> Arc<Self> {
            Arc::new(Self {
                lines: Mutex::new(lines),
            })
        }
    }

    impl CartStore for MemoryCarts {
        fn list<'a>(&'a self, _owner_email: &'a str) -> StoreResult<'a, Vec<CartLineItem>> {
            let lines = self.lines.lock().unwrap().clone();
            Box::pin(async move { Ok(lines) })
        }

        fn add<'a>(&'a self, menu_item_id: Uuid, quantity: i32) -> StoreResult<'a, CartLineItem> {
            let mut item = line(4.5, quantity);
            item.menu_item_id = menu_item_id;
            self.lines.lock().unwrap().push(item.clone());
            Box::pin(async move { Ok(item) })
        }

        fn set_quantity<'a>(&'a self, id: Uuid, quantity: i32) -> StoreResult<'a, CartLineItem> {
            let mut lines = self.lines.lock().unwrap();
            let updated = lines.iter_mut().find(|item| item.id == id).map(|item| {
                item.quantity = quantity;
                item.clone()
            });
            Box::pin(async move {
                updated.ok_or(StoreError::Rejected {
                    status: 404,
                    message: Some("Resource not found".into()),
                })
            })
        }

        fn remove<'a>(&'a self, id: Uuid) -> StoreResult<'a, ()> {
            self.lines.lock().unwrap().retain(|item| item.id != id);
            Box::pin(async { Ok(()) })
        }
    }

    struct RecordingOrders {
        calls: AtomicUsize,
        reject_with: Option<StoreError>,
        clears: Option<Arc<MemoryCarts>>,
    }

    impl RecordingOrders {
        fn accepting() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reject_with: None,
                clears: None,
            })
        }

        /// Accepts orders and drops the ordered lines from `carts`.
        fn clearing(carts: Arc<MemoryCarts>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reject_with: None,
                clears: Some(carts),
            })
        }

        fn rejecting(error: StoreError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reject_with: Some(error),
                clears: None,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl OrderStore for RecordingOrders {
        fn create<'a>(&'a self, request: &'a CreateOrderRequest) -> StoreResult<'a, OrderRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let (None, Some(carts)) = (&self.reject_with, &self.clears) {
                carts
                    .lines
                    .lock()
                    .unwrap()
                    .retain(|item| !request.cart_item_ids.contains(&item.id));
            }
            Box::pin(async move {
                if let Some(error) = &self.reject_with {
                    return Err(error.clone());
                }
                Ok(OrderRecord {
                    id: Uuid::new_v4(),
                    customer: OrderCustomer {
                        name: request.customer.name.clone(),
                        email: request.customer.email.clone(),
                        phone_number: request.customer.phone_number.clone(),
                        address: request.customer.address(),
                    },
                    items: Vec::new(),
                    subtotal: 0.0,
                    shipping: 0.0,
                    tax: 0.0,
                    total: request.total,
                    payment_method: "cash_on_delivery".into(),
                    order_date: Utc::now(),
                    status: OrderStatus::Pending,
                })
            })
        }

        fn list_for<'a>(&'a self, _email: &'a str) -> StoreResult<'a, Vec<OrderRecord>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn cancel<'a>(&'a self, _id: Uuid) -> StoreResult<'a, OrderRecord> {
            Box::pin(async {
                Err(StoreError::Rejected {
                    status: 404,
                    message: None,
                })
            })
        }
    }

    async fn session_with(
        lines: Vec<CartLineItem>,
        orders: Arc<RecordingOrders>,
    ) -> (CartSession, Arc<MemoryCarts>) {
        let carts = MemoryCarts::with(lines);
        let mut session = CartSession::new("guest@bistro.test", carts.clone(), orders);
        session.refresh().await.unwrap();
        (session, carts)
    }

    #[tokio::test]
    async fn removing_a_line_prunes_it_from_the_selection() {
        let lines = vec![line(10.0, 2), line(5.0, 1)];
        let (gone, kept) = (lines[0].id, lines[1].id);
        let (mut session, _) = session_with(lines, RecordingOrders::accepting()).await;
        session.select_all();

        session.remove(gone).await.unwrap();

        assert!(!session.selection().is_selected(gone));
        assert!(session.selection().is_selected(kept));
        assert_eq!(session.cart().len(), 1);
    }

    #[tokio::test]
    async fn quantity_changes_refresh_the_subtotal() {
        let lines = vec![line(10.0, 2)];
        let id = lines[0].id;
        let (mut session, _) = session_with(lines, RecordingOrders::accepting()).await;
        session.toggle(id);

        session.increment(id).await.unwrap();
        assert_eq!(session.selection().compute_subtotal(), 30.0);

        session.decrement(id).await.unwrap();
        session.decrement(id).await.unwrap();
        session.decrement(id).await.unwrap();
        assert_eq!(session.cart()[0].quantity, 1);
        assert_eq!(session.selection().compute_subtotal(), 10.0);
    }

    #[tokio::test]
    async fn invalid_form_makes_no_request() {
        let lines = vec![line(10.0, 2)];
        let id = lines[0].id;
        let orders = RecordingOrders::accepting();
        let (mut session, _) = session_with(lines, orders.clone()).await;
        session.toggle(id);

        let form = CheckoutForm {
            name: String::new(),
            ..valid_form()
        };
        let err = session.checkout(form).await.unwrap_err();

        match err {
            CheckoutError::Invalid(errors) => assert_eq!(errors["name"], "Name is required"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(orders.calls(), 0);
        assert!(session.selection().is_selected(id));
    }

    #[tokio::test]
    async fn empty_selection_cannot_check_out() {
        let orders = RecordingOrders::accepting();
        let (mut session, _) = session_with(vec![line(10.0, 1)], orders.clone()).await;

        let err = session.checkout(valid_form()).await.unwrap_err();
        assert_eq!(err, CheckoutError::EmptySelection);
        assert_eq!(orders.calls(), 0);
    }

    #[tokio::test]
    async fn successful_checkout_clears_selection_once() {
        let lines = vec![line(10.0, 2), line(5.0, 1)];
        let ids: Vec<Uuid> = lines.iter().map(|item| item.id).collect();
        let orders = RecordingOrders::accepting();
        let (mut session, _) = session_with(lines, orders.clone()).await;
        for id in &ids {
            session.toggle(*id);
        }

        let placed = session.checkout(valid_form()).await.unwrap();

        assert_eq!(orders.calls(), 1);
        assert_eq!(placed.redirect_to, "/dashboard/cart");
        assert_eq!(placed.order.total, 32.99);
        assert!(session.selection().is_empty());
    }

    #[tokio::test]
    async fn checkout_refetches_the_cart_without_ordered_lines() {
        let lines = vec![line(10.0, 2), line(5.0, 1), line(3.0, 1)];
        let (ordered, left) = (vec![lines[0].id, lines[1].id], lines[2].id);
        let carts = MemoryCarts::with(lines);
        let orders = RecordingOrders::clearing(carts.clone());
        let mut session = CartSession::new("guest@bistro.test", carts, orders);
        session.refresh().await.unwrap();
        for id in &ordered {
            session.toggle(*id);
        }

        session.checkout(valid_form()).await.unwrap();

        assert_eq!(session.cart().len(), 1);
        assert_eq!(session.cart()[0].id, left);
        session.select_all();
        assert_eq!(session.selection().selected_ids().len(), 1);
        assert!(session.selection().is_selected(left));
    }

    #[tokio::test]
    async fn rejected_checkout_surfaces_server_message_and_keeps_selection() {
        let lines = vec![line(10.0, 2)];
        let id = lines[0].id;
        let orders = RecordingOrders::rejecting(StoreError::Rejected {
            status: 400,
            message: Some("Cart changed, please review your order".into()),
        });
        let (mut session, _) = session_with(lines, orders).await;
        session.toggle(id);

        let err = session.checkout(valid_form()).await.unwrap_err();

        assert_eq!(
            err,
            CheckoutError::Rejected("Cart changed, please review your order".into())
        );
        assert!(session.selection().is_selected(id));
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_generic_message() {
        let lines = vec![line(10.0, 2)];
        let id = lines[0].id;
        let orders = RecordingOrders::rejecting(StoreError::Transport("timed out".into()));
        let (mut session, _) = session_with(lines, orders).await;
        session.toggle(id);

        let err = session.checkout(valid_form()).await.unwrap_err();
        assert_eq!(err, CheckoutError::Rejected(ORDER_FAILED_FALLBACK.into()));
    }

    #[tokio::test]
    async fn closed_session_aborts_requests() {
        let (mut session, _) = session_with(vec![line(10.0, 1)], RecordingOrders::accepting()).await;
        session.close();

        let err = session.refresh().await.unwrap_err();
        assert!(matches!(err, StoreError::Aborted(_)));
        assert!(!session.is_loading());
    }
}
