//! Reconciliation Planning
//!
//! Computes which labels have to be created, updated and deleted to bring a
//! repository's labels to the desired state. Planning is pure: it never talks
//! to GitHub.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::github::LabelSet;

/// Desired labels: name to color, in specification order
pub type LabelSpec = IndexMap<String, String>;

/// Target state of a single label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelChange {
    /// Label name after the action
    pub name: String,

    /// Label color after the action
    pub color: String,
}

impl LabelChange {
    pub fn new<N: Into<String>, C: Into<String>>(name: N, color: C) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Planned actions for one repository
///
/// Every map is keyed by the name the label currently has on GitHub (or the
/// new name for creates).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    pub create: IndexMap<String, LabelChange>,
    pub update: IndexMap<String, LabelChange>,
    pub delete: IndexMap<String, LabelChange>,
}

impl ActionSet {
    /// Whether nothing has to be done
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Total number of planned actions
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}

/// How labels missing from the specification are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create and update labels, keep extra ones
    Update,

    /// Like `Update`, but also delete labels not in the specification
    Replace,
}

impl Mode {
    /// Plan the actions converging `current` to `desired`
    pub fn plan(self, current: &LabelSet, desired: &LabelSpec) -> ActionSet {
        let mut actions = plan_upserts(current, desired);
        if self == Mode::Replace {
            actions.delete = plan_deletes(current, desired, &actions.update);
        }
        actions
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Update => f.write_str("update"),
            Mode::Replace => f.write_str("replace"),
        }
    }
}

/// Creates and updates, in the iteration order of `desired`
fn plan_upserts(current: &LabelSet, desired: &LabelSpec) -> ActionSet {
    // GitHub treats label names case-insensitively
    let index: HashMap<String, (&String, &String)> = current
        .iter()
        .map(|(name, color)| (name.to_lowercase(), (name, color)))
        .collect();

    let mut actions = ActionSet::default();
    for (name, color) in desired {
        match index.get(&name.to_lowercase()) {
            None => {
                actions
                    .create
                    .insert(name.clone(), LabelChange::new(name, color));
            }
            Some((current_name, _)) if *current_name != name => {
                actions
                    .update
                    .insert((*current_name).clone(), LabelChange::new(name, color));
            }
            Some((_, current_color)) if *current_color != color => {
                actions
                    .update
                    .insert(name.clone(), LabelChange::new(name, color));
            }
            Some(_) => {}
        }
    }
    actions
}

/// Labels whose exact name is not desired, except those being renamed
fn plan_deletes(
    current: &LabelSet,
    desired: &LabelSpec,
    updates: &IndexMap<String, LabelChange>,
) -> IndexMap<String, LabelChange> {
    current
        .iter()
        .filter(|(name, _)| !desired.contains_key(*name) && !updates.contains_key(*name))
        .map(|(name, color)| (name.clone(), LabelChange::new(name, color)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(n, c)| (n.to_string(), c.to_string()))
            .collect()
    }

    fn changes(pairs: &[(&str, &str, &str)]) -> IndexMap<String, LabelChange> {
        pairs
            .iter()
            .map(|(key, n, c)| (key.to_string(), LabelChange::new(*n, *c)))
            .collect()
    }

    /// Apply actions the way the run processor does: creates, updates, deletes
    fn apply(current: &LabelSet, actions: &ActionSet) -> LabelSet {
        let mut result = current.clone();
        for change in actions.create.values() {
            result.insert(change.name.clone(), change.color.clone());
        }
        for (old_name, change) in &actions.update {
            result.shift_remove(old_name);
            result.insert(change.name.clone(), change.color.clone());
        }
        for old_name in actions.delete.keys() {
            result.shift_remove(old_name);
        }
        result
    }

    fn sorted(set: &LabelSet) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = set.iter().map(|(n, c)| (n.clone(), c.clone())).collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn test_replace_creates_and_deletes() {
        let current = labels(&[("bug", "ff0000"), ("wontfix", "ffffff")]);
        let desired = labels(&[("bug", "ff0000"), ("enhancement", "00ff00")]);

        let actions = Mode::Replace.plan(&current, &desired);

        assert_eq!(
            actions.create,
            changes(&[("enhancement", "enhancement", "00ff00")])
        );
        assert!(actions.update.is_empty());
        assert_eq!(actions.delete, changes(&[("wontfix", "wontfix", "ffffff")]));
    }

    #[test]
    fn test_update_mode_keeps_extra_labels() {
        let current = labels(&[("bug", "ff0000"), ("wontfix", "ffffff")]);
        let desired = labels(&[("bug", "ff0000"), ("enhancement", "00ff00")]);

        let actions = Mode::Update.plan(&current, &desired);

        assert_eq!(
            actions.create,
            changes(&[("enhancement", "enhancement", "00ff00")])
        );
        assert!(actions.update.is_empty());
        assert!(actions.delete.is_empty());
    }

    #[test]
    fn test_case_only_rename_is_single_update() {
        let current = labels(&[("Bug", "ff0000")]);
        let desired = labels(&[("bug", "ff0000")]);

        for mode in [Mode::Update, Mode::Replace] {
            let actions = mode.plan(&current, &desired);
            assert_eq!(actions.update, changes(&[("Bug", "bug", "ff0000")]));
            assert!(actions.create.is_empty());
            assert!(actions.delete.is_empty(), "{mode} must not delete a renamed label");
        }
    }

    #[test]
    fn test_rename_with_color_change_is_one_update() {
        let current = labels(&[("BUG", "ff0000")]);
        let desired = labels(&[("bug", "00ff00")]);

        let actions = Mode::Replace.plan(&current, &desired);

        assert_eq!(actions.len(), 1);
        assert_eq!(actions.update, changes(&[("BUG", "bug", "00ff00")]));
    }

    #[test]
    fn test_color_change_is_keyed_by_name() {
        let current = labels(&[("bug", "ff0000")]);
        let desired = labels(&[("bug", "FF0000")]);

        let actions = Mode::Update.plan(&current, &desired);

        // Colors are compared exactly as supplied
        assert_eq!(actions.update, changes(&[("bug", "bug", "FF0000")]));
    }

    #[test]
    fn test_converged_repository_needs_nothing() {
        let current = labels(&[("bug", "ff0000"), ("docs", "0075ca")]);
        let actions = Mode::Replace.plan(&current, &current.clone());
        assert!(actions.is_empty());
        assert_eq!(actions.len(), 0);
    }

    #[test]
    fn test_replace_with_empty_spec_deletes_everything() {
        let current = labels(&[("bug", "ff0000"), ("docs", "0075ca")]);
        let actions = Mode::Replace.plan(&current, &LabelSpec::new());
        assert_eq!(
            actions.delete,
            changes(&[("bug", "bug", "ff0000"), ("docs", "docs", "0075ca")])
        );
    }

    #[test]
    fn test_creates_follow_spec_order() {
        let desired = labels(&[("zeta", "000000"), ("alpha", "111111"), ("mid", "222222")]);
        let actions = Mode::Update.plan(&LabelSet::new(), &desired);
        let order: Vec<_> = actions.create.keys().cloned().collect();
        assert_eq!(order, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Update.to_string(), "update");
        assert_eq!(Mode::Replace.to_string(), "replace");
    }

    /// Label sets whose names are unique ignoring case, as on GitHub
    fn label_set() -> impl Strategy<Value = LabelSet> {
        prop::collection::btree_map("[a-z]{1,5}", ("[0-9a-f]{6}", any::<bool>()), 0..8).prop_map(
            |entries| {
                entries
                    .into_iter()
                    .map(|(name, (color, shout))| {
                        let name = if shout { name.to_uppercase() } else { name };
                        (name, color)
                    })
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_replace_converges_to_spec(current in label_set(), desired in label_set()) {
            let actions = Mode::Replace.plan(&current, &desired);
            let result = apply(&current, &actions);
            prop_assert_eq!(sorted(&result), sorted(&desired));
        }

        #[test]
        fn prop_update_never_deletes(current in label_set(), desired in label_set()) {
            prop_assert!(Mode::Update.plan(&current, &desired).delete.is_empty());
        }

        #[test]
        fn prop_planning_is_idempotent(
            current in label_set(),
            desired in label_set(),
            replace in any::<bool>(),
        ) {
            let mode = if replace { Mode::Replace } else { Mode::Update };
            let result = apply(&current, &mode.plan(&current, &desired));
            prop_assert!(mode.plan(&result, &desired).is_empty());
        }
    }
}
