use std::sync::Arc;

use super::database::ClientStore;
use super::i18n::contains_buy_marker;
use super::interpreter::{purchase_candidate, SuggestedPlan};
use crate::models::{Message, PendingPurchase, ProgramSelection, Role};

/// Storage key read by the checkout surface.
pub const PENDING_PURCHASE_KEY: &str = "pending_purchase";
/// Price used when a suggested plan does not carry one.
pub const FALLBACK_PLAN_PRICE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Checkout,
    PlanSelection,
}

/// Host application navigation. `state` travels with the route so the
/// destination does not have to go back to storage.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route, state: Option<PendingPurchase>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandoffOutcome {
    /// The message does not offer a purchase.
    NoAffordance,
    Checkout(PendingPurchase),
    /// No usable plan was attached; the full plan picker was opened instead.
    PlanSelection,
}

pub struct PurchaseHandoff {
    store: Arc<dyn ClientStore>,
    navigator: Arc<dyn Navigator>,
}

impl PurchaseHandoff {
    pub fn new(store: Arc<dyn ClientStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { store, navigator }
    }

    pub fn offers_purchase(message: &Message) -> bool {
        message.role == Role::Assistant && !message.is_error && contains_buy_marker(&message.content)
    }

    /// Act on the buy affordance of `message`, using the first plan suggested
    /// in that same message.
    pub async fn invoke(&self, message: &Message) -> HandoffOutcome {
        if !Self::offers_purchase(message) {
            return HandoffOutcome::NoAffordance;
        }

        let Some(purchase) = purchase_candidate(&message.results)
            .as_ref()
            .and_then(build_pending_purchase)
        else {
            tracing::info!("No purchasable plan attached; opening plan selection");
            self.navigator.navigate(Route::PlanSelection, None);
            return HandoffOutcome::PlanSelection;
        };

        self.persist(&purchase).await;
        self.navigator
            .navigate(Route::Checkout, Some(purchase.clone()));
        HandoffOutcome::Checkout(purchase)
    }

    async fn persist(&self, purchase: &PendingPurchase) {
        let json = match serde_json::to_string(purchase) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize pending purchase: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(PENDING_PURCHASE_KEY, &json).await {
            tracing::error!("Failed to persist pending purchase: {:#}", e);
        }
    }

    /// Read side used by the checkout surface after a reload. Malformed
    /// records are ignored and cleared.
    pub async fn load_pending(&self) -> Option<PendingPurchase> {
        let json = match self.store.get(PENDING_PURCHASE_KEY).await {
            Ok(json) => json?,
            Err(e) => {
                tracing::warn!("Failed to read pending purchase: {:#}", e);
                return None;
            }
        };
        match PendingPurchase::from_stored(&json) {
            Ok(purchase) => Some(purchase),
            Err(e) => {
                tracing::warn!("Ignoring stored purchase: {}", e);
                if let Err(e) = self.store.remove(PENDING_PURCHASE_KEY).await {
                    tracing::warn!("Failed to clear stored purchase: {:#}", e);
                }
                None
            }
        }
    }
}

pub fn build_pending_purchase(plan: &SuggestedPlan) -> Option<PendingPurchase> {
    let id = plan.id.clone().filter(|id| id.is_valid())?;
    Some(PendingPurchase::for_program(ProgramSelection {
        id,
        name_en: plan.names.name_en.clone().or_else(|| plan.names.name.clone()),
        name_ar: plan.names.name_ar.clone(),
        price: plan.price.unwrap_or(FALLBACK_PLAN_PRICE),
    }))
}
