use std::collections::BTreeMap;

/// Map of non-negative numeric balances keyed by an enumerated type.
///
/// Backs currencies, stats and statistics. Every write clamps the stored
/// value into `0..=f64::MAX`, so a caller never observes a negative or
/// infinite balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Counters<K: Ord> {
    values: BTreeMap<K, f64>,
}

impl<K: Ord> Default for Counters<K> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> Counters<K> {
    /// Build counters from raw values, clamping each of them.
    pub fn from_values(values: impl IntoIterator<Item = (K, f64)>) -> Self {
        let mut counters = Self::default();
        counters.replace_all(values);
        counters
    }

    /// Current value, `0` when never set.
    pub fn get(&self, key: K) -> f64 {
        self.values.get(&key).copied().unwrap_or(0.0)
    }

    /// Overwrite the value for `key`.
    pub fn set(&mut self, key: K, value: f64) {
        self.values.insert(key, clamp(value));
    }

    /// Increase `key` by `amount`, returning the new value.
    pub fn add(&mut self, key: K, amount: f64) -> f64 {
        let next = clamp(self.get(key) + amount);
        self.values.insert(key, next);
        next
    }

    /// Decrease `key` by `amount`, bottoming out at zero. Returns the new value.
    pub fn remove(&mut self, key: K, amount: f64) -> f64 {
        let next = clamp(self.get(key) - amount);
        self.values.insert(key, next);
        next
    }

    /// Drop every value and take the provided ones instead.
    pub fn replace_all(&mut self, values: impl IntoIterator<Item = (K, f64)>) {
        self.values = values
            .into_iter()
            .map(|(key, value)| (key, clamp(value)))
            .collect();
    }

    /// Iterate over explicitly stored values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.values.iter().map(|(key, value)| (*key, *value))
    }

    /// Number of explicitly stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value was ever stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// NaN collapses to zero; overflow saturates.
fn clamp(value: f64) -> f64 {
    if value.is_nan() || value <= 0.0 {
        0.0
    } else {
        value.min(f64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::player::keys::CurrencyType;

    #[test]
    fn removing_more_than_held_clamps_to_zero() {
        let mut currencies = Counters::default();
        currencies.set(CurrencyType::Gold, 100.0);

        let balance = currencies.remove(CurrencyType::Gold, 150.0);

        assert_eq!(balance, 0.0);
        assert_eq!(currencies.get(CurrencyType::Gold), 0.0);
    }

    #[test]
    fn negative_writes_are_clamped() {
        let mut currencies = Counters::default();
        currencies.set(CurrencyType::Gold, -5.0);
        assert_eq!(currencies.get(CurrencyType::Gold), 0.0);

        currencies.set(CurrencyType::Gold, 10.0);
        assert_eq!(currencies.add(CurrencyType::Gold, -25.0), 0.0);
        assert_eq!(currencies.add(CurrencyType::Gold, f64::NAN), 0.0);
    }

    #[test]
    fn overflowing_add_saturates_instead_of_reaching_infinity() {
        let mut currencies = Counters::default();
        currencies.set(CurrencyType::Gold, f64::MAX);

        let balance = currencies.add(CurrencyType::Gold, f64::MAX);

        assert_eq!(balance, f64::MAX);
        assert!(currencies.get(CurrencyType::Gold).is_finite());

        currencies.set(CurrencyType::Gold, f64::INFINITY);
        assert_eq!(currencies.get(CurrencyType::Gold), f64::MAX);
        currencies.set(CurrencyType::Gold, f64::NEG_INFINITY);
        assert_eq!(currencies.get(CurrencyType::Gold), 0.0);
    }

    #[test]
    fn replace_all_discards_previous_values() {
        let mut currencies = Counters::from_values([(CurrencyType::Gold, 40.0)]);
        currencies.replace_all(Vec::new());
        assert!(currencies.is_empty());
        assert_eq!(currencies.get(CurrencyType::Gold), 0.0);
    }
}
