use std::collections::BTreeSet;

use uuid::Uuid;

use super::CartLineItem;

/// Which lines of the latest cart snapshot proceed to checkout.
///
/// Every selected id refers to a line of `snapshot`; [`SelectionModel::reconcile`]
/// prunes ids whose line disappeared and [`SelectionModel::toggle`] ignores ids
/// that are not part of the snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionModel {
    snapshot: Vec<CartLineItem>,
    selected_ids: BTreeSet<Uuid>,
}

impl SelectionModel {
    pub fn new(snapshot: Vec<CartLineItem>) -> Self {
        Self {
            snapshot,
            selected_ids: BTreeSet::new(),
        }
    }

    /// Starts from a previously carried selection, keeping only ids present in
    /// `snapshot`.
    pub fn with_selected(
        snapshot: Vec<CartLineItem>,
        selected: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        let mut model = Self::new(Vec::new());
        model.selected_ids = selected.into_iter().collect();
        model.reconcile(snapshot);
        model
    }

    pub fn snapshot(&self) -> &[CartLineItem] {
        &self.snapshot
    }

    pub fn selected_ids(&self) -> &BTreeSet<Uuid> {
        &self.selected_ids
    }

    pub fn is_selected(&self, id: Uuid) -> bool {
        self.selected_ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected_ids.is_empty()
    }

    /// Flips the selection of `id`. Returns whether the line is selected
    /// afterwards; unknown ids stay unselected.
    pub fn toggle(&mut self, id: Uuid) -> bool {
        if !self.snapshot.iter().any(|item| item.id == id) {
            return false;
        }
        if !self.selected_ids.remove(&id) {
            self.selected_ids.insert(id);
            return true;
        }
        false
    }

    pub fn select_all(&mut self) {
        self.selected_ids = self.snapshot.iter().map(|item| item.id).collect();
    }

    pub fn clear(&mut self) {
        self.selected_ids.clear();
    }

    /// Adopts a freshly fetched cart and drops selected ids it no longer holds.
    pub fn reconcile(&mut self, snapshot: Vec<CartLineItem>) {
        let present: BTreeSet<Uuid> = snapshot.iter().map(|item| item.id).collect();
        self.selected_ids.retain(|id| present.contains(id));
        self.snapshot = snapshot;
    }

    /// Selected lines, in cart order.
    pub fn selected_items(&self) -> Vec<&CartLineItem> {
        self.snapshot
            .iter()
            .filter(|item| self.selected_ids.contains(&item.id))
            .collect()
    }

    pub fn compute_subtotal(&self) -> f64 {
        self.selected_items()
            .into_iter()
            .map(CartLineItem::line_total)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storefront::fixtures::line;

    #[test]
    fn toggle_twice_restores_the_selection() {
        let cart = vec![line(10.0, 2), line(5.0, 1)];
        let (first, second) = (cart[0].id, cart[1].id);
        let mut model = SelectionModel::new(cart);
        model.toggle(second);
        let before = model.clone();

        assert!(model.toggle(first));
        assert!(!model.toggle(first));
        assert_eq!(model, before);
    }

    #[test]
    fn toggle_ignores_ids_outside_the_snapshot() {
        let mut model = SelectionModel::new(vec![line(10.0, 1)]);
        assert!(!model.toggle(Uuid::new_v4()));
        assert!(model.is_empty());
    }

    #[test]
    fn reconcile_prunes_removed_lines() {
        let cart = vec![line(10.0, 2), line(5.0, 1), line(3.0, 4)];
        let (a, b, c) = (cart[0].id, cart[1].id, cart[2].id);
        let mut model = SelectionModel::new(cart.clone());
        model.select_all();

        let remaining: Vec<_> = cart.into_iter().filter(|item| item.id != b).collect();
        model.reconcile(remaining);

        let selected: Vec<Uuid> = model.selected_ids().iter().copied().collect();
        assert!(selected.contains(&a));
        assert!(selected.contains(&c));
        assert!(!selected.contains(&b));
        assert!(
            model
                .selected_ids()
                .iter()
                .all(|id| model.snapshot().iter().any(|item| item.id == *id))
        );
    }

    #[test]
    fn reconcile_never_adds_ids() {
        let cart = vec![line(10.0, 2), line(5.0, 1)];
        let mut model = SelectionModel::new(cart.clone());
        model.toggle(cart[0].id);
        let before = model.selected_ids().clone();

        let mut refreshed = cart;
        refreshed.push(line(7.5, 1));
        model.reconcile(refreshed);

        assert!(model.selected_ids().is_subset(&before));
    }

    #[test]
    fn with_selected_drops_stale_ids() {
        let cart = vec![line(10.0, 1)];
        let kept = cart[0].id;
        let model = SelectionModel::with_selected(cart, [kept, Uuid::new_v4()]);
        assert_eq!(model.selected_ids().len(), 1);
        assert!(model.is_selected(kept));
    }

    #[test]
    fn empty_selection_costs_nothing() {
        let model = SelectionModel::new(vec![line(10.0, 2)]);
        assert_eq!(model.compute_subtotal(), 0.0);
    }

    #[test]
    fn subtotal_covers_selected_lines_only() {
        let cart = vec![line(10.0, 2), line(5.0, 1), line(99.0, 3)];
        let mut model = SelectionModel::new(cart.clone());
        model.toggle(cart[0].id);
        model.toggle(cart[1].id);
        assert_eq!(model.compute_subtotal(), 25.0);
    }
}
