use anyhow::{Context, Result};
use reqwest::Url;

use crate::ledger::ShoppingList;
use crate::quantity::normalize_name;

/// Cart link for everything still to buy: unchecked regular items, plus the
/// unchecked seasonings named in `promoted`. Seasonings are otherwise
/// assumed to be in the pantry.
pub fn build_cart_link(base_url: &str, list: &ShoppingList, promoted: &[String]) -> Result<Url> {
    let promoted: Vec<String> = promoted.iter().map(|name| normalize_name(name)).collect();
    let seasonings = list
        .seasonings
        .iter()
        .filter(|entry| !entry.checked && promoted.contains(&normalize_name(&entry.item)));

    let params: Vec<(&str, String)> = list
        .unchecked_items()
        .chain(seasonings)
        .map(|entry| {
            let value = if entry.quantity.is_empty() {
                entry.item.clone()
            } else {
                format!("{}:{}", entry.item, entry.quantity)
            };
            ("item", value)
        })
        .collect();

    Url::parse_with_params(base_url, &params).with_context(|| format!("Invalid checkout URL '{}'", base_url))
}
