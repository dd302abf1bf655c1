use log::info;
use crate::constraints::{ApplianceConstraint, ConstraintBook};
use crate::models::ApplianceLabel;

/// Dense per-house appliance table.
///
/// Every appliance is mapped exactly once at house-load time; downstream
/// containers key on the dense index. Constraint records are written against
/// free-form names ("Washing Machine") while labels may carry indexed
/// duplicates ("Washing Machine (1)"), so the constraint key is resolved
/// here, not on the scheduling hot path.
#[derive(Debug)]
pub struct ApplianceIndex {
    display_names: Vec<String>,
    constraint_keys: Vec<Option<String>>,
}

impl ApplianceIndex {
    /// Builds the index for one house
    ///
    /// # Arguments
    ///
    /// * 'labels' - appliance labels in power-column order
    /// * 'constraints' - the house constraint book
    pub fn build(labels: &[ApplianceLabel], constraints: &ConstraintBook) -> ApplianceIndex {
        let keys = constraints.keys();
        let mut constraint_keys: Vec<Option<String>> = Vec::with_capacity(labels.len());

        for label in labels {
            let resolved = resolve_name(&label.name, &keys);
            if let Some(key) = &resolved {
                if *key != label.name {
                    info!("appliance name mapping: {} -> {}", label.name, key);
                }
            }
            constraint_keys.push(resolved);
        }

        ApplianceIndex {
            display_names: labels.iter().map(|l| l.name.clone()).collect(),
            constraint_keys,
        }
    }

    pub fn len(&self) -> usize {
        self.display_names.len()
    }

    pub fn display_name(&self, appliance: usize) -> &str {
        &self.display_names[appliance]
    }

    /// Constraint record of an appliance, None when the house declares none
    pub fn constraint<'a>(
        &self,
        appliance: usize,
        constraints: &'a ConstraintBook,
    ) -> Option<&'a ApplianceConstraint> {
        self.constraint_keys[appliance]
            .as_deref()
            .and_then(|key| constraints.get(key))
    }

    pub fn has_constraint(&self, appliance: usize) -> bool {
        self.constraint_keys[appliance].is_some()
    }
}

/// Resolves an appliance display name against the constraint keys:
/// exact match, then indexed-suffix match, then substring, then shared
/// keyword. Keys arrive sorted, so ties always break the same way.
fn resolve_name(name: &str, keys: &[&str]) -> Option<String> {
    if keys.contains(&name) {
        return Some(name.to_string());
    }

    // "Washing Machine" vs "Washing Machine (1)", either side indexed
    for key in keys {
        if key.starts_with(&format!("{} (", name)) || name.starts_with(&format!("{} (", key)) {
            return Some(key.to_string());
        }
    }

    let name_lower = name.to_lowercase();
    for key in keys {
        let key_lower = key.to_lowercase();
        if key_lower.contains(&name_lower) || (name_lower.contains(&key_lower) && key.len() >= 4) {
            return Some(key.to_string());
        }
    }

    let name_words: Vec<&str> = name_lower.split_whitespace().filter(|w| w.len() >= 3).collect();
    for key in keys {
        let key_lower = key.to_lowercase();
        let key_words: Vec<&str> = key_lower.split_whitespace().collect();
        if name_words.iter().any(|w| key_words.contains(w)) {
            return Some(key.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Shiftability;

    fn label(name: &str) -> ApplianceLabel {
        ApplianceLabel {
            id: name.to_string(),
            name: name.to_string(),
            shiftability: Shiftability::Shiftable,
            pmin_w: None,
            tmin_min: None,
        }
    }

    fn book(names: &[&str]) -> ConstraintBook {
        let mut book = ConstraintBook::default();
        for name in names {
            book.insert(name, ApplianceConstraint::default());
        }
        book
    }

    #[test]
    fn test_exact_match_wins() {
        let book = book(&["Washing Machine", "Dishwasher"]);
        let index = ApplianceIndex::build(&[label("Dishwasher")], &book);
        assert!(index.constraint(0, &book).is_some());
    }

    #[test]
    fn test_indexed_duplicate_resolves() {
        let book = book(&["Washing Machine"]);
        let index = ApplianceIndex::build(&[label("Washing Machine (1)")], &book);
        assert!(index.constraint(0, &book).is_some());
    }

    #[test]
    fn test_substring_match() {
        let book = book(&["Computer Site"]);
        let index = ApplianceIndex::build(&[label("Computer")], &book);
        assert!(index.constraint(0, &book).is_some());
    }

    #[test]
    fn test_keyword_match() {
        let book = book(&["Tumble Dryer"]);
        let index = ApplianceIndex::build(&[label("Dryer Unit")], &book);
        assert!(index.constraint(0, &book).is_some());
    }

    #[test]
    fn test_unrelated_name_unresolved() {
        let book = book(&["Washing Machine"]);
        let index = ApplianceIndex::build(&[label("Television")], &book);
        assert!(index.constraint(0, &book).is_none());
        assert!(!index.has_constraint(0));
    }

    #[test]
    fn test_tie_breaks_on_sorted_key_order() {
        let book = book(&["Washing Machine (1)", "Washing Machine (2)"]);
        let index = ApplianceIndex::build(&[label("Washing Machine")], &book);
        // BTreeMap keys come out sorted; the first indexed duplicate wins
        let constraint_key = index.constraint_keys[0].as_deref();
        assert_eq!(constraint_key, Some("Washing Machine (1)"));
    }
}
