//! Consolidated shopping-list state for a plan.
//!
//! A [`Ledger`] holds one entry per (normalized name, unit) in each of two
//! partitions, regular items and seasonings. Recipes are applied to it as
//! signed deltas so a replacement can subtract one recipe and add another
//! without recomputing the whole plan.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::model::Recipe;
use crate::quantity::{is_excluded, is_seasoning, normalize_name, parse_quantity, Amount, KeyScheme};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Add,
    Subtract,
}

impl Sign {
    fn factor(self) -> i64 {
        match self {
            Sign::Add => 1,
            Sign::Subtract => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Items,
    Seasonings,
}

impl Partition {
    pub fn of(name: &str) -> Self {
        if is_seasoning(name) {
            Partition::Seasonings
        } else {
            Partition::Items
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct LedgerKey {
    name: String,
    unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// First spelling seen for this key.
    pub display_name: String,
    pub amount: Amount,
    /// Unit as keyed by the ledger's scheme.
    pub unit: String,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListEntry {
    pub item: String,
    pub quantity: String,
    #[serde(default)]
    pub checked: bool,
}

/// Serialized ledger: the shape persisted with a plan and shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShoppingList {
    pub items: Vec<ShoppingListEntry>,
    pub seasonings: Vec<ShoppingListEntry>,
}

impl ShoppingList {
    /// Sets `checked` on every entry whose normalized name matches, in both
    /// partitions. Returns whether anything matched.
    pub fn set_checked(&mut self, name: &str, checked: bool) -> bool {
        let wanted = normalize_name(name);
        let mut matched = false;
        for entry in self.items.iter_mut().chain(self.seasonings.iter_mut()) {
            if normalize_name(&entry.item) == wanted {
                entry.checked = checked;
                matched = true;
            }
        }
        matched
    }

    pub fn unchecked_items(&self) -> impl Iterator<Item = &ShoppingListEntry> {
        self.items.iter().filter(|entry| !entry.checked)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.seasonings.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    scheme: KeyScheme,
    items: BTreeMap<LedgerKey, LedgerEntry>,
    seasonings: BTreeMap<LedgerKey, LedgerEntry>,
}

impl Ledger {
    pub fn new(scheme: KeyScheme) -> Self {
        Self { scheme, items: BTreeMap::new(), seasonings: BTreeMap::new() }
    }

    /// Fresh ledger for a set of scheduled recipes, each applied at its
    /// `servings`.
    pub fn from_schedule(recipes: &[Recipe], scheme: KeyScheme) -> Self {
        let mut ledger = Self::new(scheme);
        for recipe in recipes {
            ledger.apply_recipe(recipe, recipe.servings, Sign::Add);
        }
        ledger
    }

    /// Rebuilds a ledger from its persisted form, keeping each entry in the
    /// list it was stored in along with its checked flag.
    pub fn from_serialized(list: &ShoppingList, scheme: KeyScheme) -> Self {
        let mut ledger = Self::new(scheme);
        for (partition, entries) in [(Partition::Items, &list.items), (Partition::Seasonings, &list.seasonings)] {
            for stored in entries {
                let parsed = parse_quantity(&stored.quantity);
                let Some(amount) = parsed.amount else {
                    warn!(item = %stored.item, quantity = %stored.quantity, "dropping stored shopping-list entry without an amount");
                    continue;
                };
                let key = LedgerKey { name: normalize_name(&stored.item), unit: scheme.unit_key(&parsed.unit) };
                let target = ledger.partition_mut(partition);
                match target.get_mut(&key) {
                    Some(existing) => {
                        existing.amount = existing.amount.checked_add(&amount).unwrap_or(existing.amount);
                        existing.checked |= stored.checked;
                    }
                    None => {
                        target.insert(
                            key.clone(),
                            LedgerEntry {
                                display_name: stored.item.clone(),
                                amount,
                                unit: key.unit,
                                checked: stored.checked,
                            },
                        );
                    }
                }
            }
        }
        ledger.prune();
        ledger
    }

    pub fn scheme(&self) -> KeyScheme {
        self.scheme
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.seasonings.is_empty()
    }

    pub fn entries(&self, partition: Partition) -> impl Iterator<Item = &LedgerEntry> {
        match partition {
            Partition::Items => self.items.values(),
            Partition::Seasonings => self.seasonings.values(),
        }
    }

    fn partition_mut(&mut self, partition: Partition) -> &mut BTreeMap<LedgerKey, LedgerEntry> {
        match partition {
            Partition::Items => &mut self.items,
            Partition::Seasonings => &mut self.seasonings,
        }
    }

    /// Adds or subtracts `servings` times every ingredient of `recipe`.
    ///
    /// Subtracting an ingredient the ledger doesn't hold is a no-op.
    /// Quantities without a number count as zero. Entries left at or below
    /// zero are removed once the whole recipe has been applied.
    pub fn apply_recipe(&mut self, recipe: &Recipe, servings: u32, sign: Sign) {
        let factor = i64::from(servings) * sign.factor();
        let scheme = self.scheme;

        for ingredient in &recipe.ingredients {
            let name = ingredient.item.trim();
            if name.is_empty() {
                warn!(recipe = %recipe.id, quantity = %ingredient.quantity, "skipping ingredient without a name");
                continue;
            }
            if is_excluded(name) {
                continue;
            }

            let parsed = parse_quantity(&ingredient.quantity);
            let base = parsed.amount.unwrap_or_else(|| {
                debug!(recipe = %recipe.id, item = name, quantity = %ingredient.quantity, "quantity has no amount, counting it as zero");
                Amount::zero()
            });
            let delta = base.scale(factor);
            let key = LedgerKey { name: normalize_name(name), unit: scheme.unit_key(&parsed.unit) };

            let entries = self.partition_mut(Partition::of(name));
            match entries.get_mut(&key) {
                Some(entry) => match entry.amount.checked_add(&delta) {
                    Some(total) => entry.amount = total,
                    None => warn!(item = name, "ledger amount overflowed, keeping previous value"),
                },
                None if sign == Sign::Add => {
                    entries.insert(
                        key.clone(),
                        LedgerEntry { display_name: name.to_string(), amount: delta, unit: key.unit, checked: false },
                    );
                }
                None => {}
            }
        }

        self.prune();
    }

    fn prune(&mut self) {
        self.items.retain(|_, entry| entry.amount.is_positive());
        self.seasonings.retain(|_, entry| entry.amount.is_positive());
    }

    /// Carries user check marks over from `previous`, matched by normalized
    /// name regardless of unit. Names absent from `previous` end up
    /// unchecked.
    pub fn preserve_checked(&mut self, previous: &Ledger) {
        let mut lookup: HashMap<String, bool> = HashMap::new();
        for entry in previous.items.values().chain(previous.seasonings.values()) {
            *lookup.entry(normalize_name(&entry.display_name)).or_insert(false) |= entry.checked;
        }
        for entry in self.items.values_mut().chain(self.seasonings.values_mut()) {
            entry.checked = lookup.get(&normalize_name(&entry.display_name)).copied().unwrap_or(false);
        }
    }

    pub fn serialize(&self) -> ShoppingList {
        ShoppingList { items: self.render(&self.items), seasonings: self.render(&self.seasonings) }
    }

    fn render(&self, entries: &BTreeMap<LedgerKey, LedgerEntry>) -> Vec<ShoppingListEntry> {
        let mut rendered: Vec<ShoppingListEntry> = entries
            .values()
            .map(|entry| ShoppingListEntry {
                item: entry.display_name.clone(),
                quantity: format!("{} {}", entry.amount, self.scheme.render_unit(&entry.unit, entry.amount))
                    .trim()
                    .to_string(),
                checked: entry.checked,
            })
            .collect();
        rendered.sort_by(|a, b| {
            a.item
                .to_lowercase()
                .cmp(&b.item.to_lowercase())
                .then_with(|| a.quantity.cmp(&b.quantity))
        });
        rendered
    }
}
