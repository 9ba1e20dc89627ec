use std::collections::{hash_map::Entry, HashMap};

use serde::Serialize;

use crate::constants::SHOPPING_LIST_HEADER;

/// One ingredient line of a cart recipe, before aggregation.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Groups by (name, unit) and sums amounts.
///
/// Groups keep the order in which they first appear. The cart query sorts
/// its lines by name, case-insensitively in the database collation, then unit.
pub fn aggregate(lines: impl IntoIterator<Item = CartLine>) -> Vec<ShoppingListItem> {
    let mut items: Vec<ShoppingListItem> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for line in lines {
        let amount = i64::from(line.amount);
        match index.entry((line.name, line.measurement_unit)) {
            Entry::Occupied(entry) => items[*entry.get()].total += amount,
            Entry::Vacant(entry) => {
                let (name, measurement_unit) = entry.key().clone();
                entry.insert(items.len());
                items.push(ShoppingListItem {
                    name,
                    measurement_unit,
                    total: amount,
                });
            }
        }
    }

    items
}

pub fn render_line(item: &ShoppingListItem) -> String {
    format!("{}: {}/{}.", item.name, item.total, item.measurement_unit)
}

pub fn render(items: &[ShoppingListItem]) -> String {
    let mut text = format!("{SHOPPING_LIST_HEADER}\n\n");
    for item in items {
        text.push_str(&render_line(item));
        text.push('\n');
    }
    text
}
