use std::collections::BTreeMap;
use std::rc::Rc;

use log::info;
use udcn_core::Name;

use super::{make_strategy, MulticastStrategy, Strategy};
use crate::config::StrategyChoiceConfig;
use crate::error::ForwarderError;

/// Per-namespace strategy selection. The root namespace always has one.
pub struct StrategyChoice {
    entries: BTreeMap<Name, Rc<dyn Strategy>>,
}

impl StrategyChoice {
    /// Root namespace served by the multicast strategy
    pub fn new() -> Self {
        let mut entries: BTreeMap<Name, Rc<dyn Strategy>> = BTreeMap::new();
        entries.insert(Name::new(), Rc::new(MulticastStrategy));
        Self { entries }
    }

    pub fn from_config(choices: &[StrategyChoiceConfig]) -> Result<Self, ForwarderError> {
        let mut choice = Self::new();
        for entry in choices {
            let prefix = Name::from_str(&entry.prefix)?;
            choice.insert(&prefix, &entry.name)?;
        }
        Ok(choice)
    }

    pub fn insert(&mut self, prefix: &Name, strategy_name: &str) -> Result<(), ForwarderError> {
        let strategy = make_strategy(strategy_name)?;
        info!("Strategy for {} set to {}", prefix, strategy.name());
        self.entries.insert(prefix.clone(), strategy);
        Ok(())
    }

    /// Remove the choice for `prefix`. The root choice cannot be removed.
    pub fn erase(&mut self, prefix: &Name) -> bool {
        if prefix.is_empty() {
            return false;
        }
        self.entries.remove(prefix).is_some()
    }

    /// Strategy of the longest configured prefix of `name`
    pub fn find_effective_strategy(&self, name: &Name) -> Rc<dyn Strategy> {
        name.prefixes()
            .find_map(|prefix| self.entries.get(&prefix).cloned())
            .unwrap_or_else(|| Rc::new(MulticastStrategy))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StrategyChoice {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{BEST_ROUTE, MULTICAST};

    fn name(uri: &str) -> Name {
        Name::from_str(uri).unwrap()
    }

    #[test]
    fn test_longest_prefix_selection() {
        let mut choice = StrategyChoice::new();
        choice.insert(&name("/video"), BEST_ROUTE).unwrap();

        assert_eq!(choice.find_effective_strategy(&name("/video/1")).name(), BEST_ROUTE);
        assert_eq!(choice.find_effective_strategy(&name("/audio/1")).name(), MULTICAST);
    }

    #[test]
    fn test_root_cannot_be_erased() {
        let mut choice = StrategyChoice::new();
        choice.insert(&Name::new(), BEST_ROUTE).unwrap();
        assert!(!choice.erase(&Name::new()));
        assert_eq!(choice.find_effective_strategy(&name("/a")).name(), BEST_ROUTE);
    }

    #[test]
    fn test_from_config() {
        let choices = vec![
            StrategyChoiceConfig {
                prefix: "/".to_string(),
                name: "best-route".to_string(),
            },
            StrategyChoiceConfig {
                prefix: "/live".to_string(),
                name: "multicast".to_string(),
            },
        ];
        let choice = StrategyChoice::from_config(&choices).unwrap();
        assert_eq!(choice.len(), 2);
        assert_eq!(choice.find_effective_strategy(&name("/live/x")).name(), MULTICAST);
        assert_eq!(choice.find_effective_strategy(&name("/x")).name(), BEST_ROUTE);

        let bad = vec![StrategyChoiceConfig {
            prefix: "/".to_string(),
            name: "flood".to_string(),
        }];
        assert!(StrategyChoice::from_config(&bad).is_err());
    }
}
