//! Presentation helpers: grouping items by category, source labels and
//! human-readable dates.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::feed::NormalizedItem;
use crate::taxonomy::DEFAULT_FALLBACK_LABEL;
use crate::util::domain;

/// Label for items whose source has neither a title nor a usable URL.
pub const UNKNOWN_SOURCE: &str = "Unknown source";

/// Items sharing one category, in merged (newest first) order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup<'a> {
    pub name: String,
    pub items: Vec<&'a NormalizedItem>,
}

/// Groups `items` by category.
///
/// An item appears once under each of its categories. Blank category names
/// are filed under [`DEFAULT_FALLBACK_LABEL`]. Groups are sorted by name,
/// case-insensitively, with `fallback` always last.
pub fn group_by_category<'a>(items: &'a [NormalizedItem], fallback: &str) -> Vec<CategoryGroup<'a>> {
    let mut groups: Vec<CategoryGroup<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let fallback_only = [fallback.to_string()];
        let categories = if item.categories.is_empty() {
            &fallback_only[..]
        } else {
            &item.categories[..]
        };

        for category in categories {
            let key = match category.trim() {
                "" => DEFAULT_FALLBACK_LABEL,
                name => name,
            };
            let slot = *index.entry(key.to_string()).or_insert_with(|| {
                groups.push(CategoryGroup {
                    name: key.to_string(),
                    items: Vec::new(),
                });
                groups.len() - 1
            });
            let group = &mut groups[slot];
            // An item listing the same category twice is shown once
            if !group.items.last().is_some_and(|last| std::ptr::eq(*last, item)) {
                group.items.push(item);
            }
        }
    }

    groups.sort_by(|a, b| {
        (a.name == fallback)
            .cmp(&(b.name == fallback))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
    groups
}

/// Display name for the feed an item came from.
pub fn source_label(item: &NormalizedItem) -> String {
    if let Some(title) = item.source.title.as_deref().map(str::trim) {
        if !title.is_empty() {
            return title.to_string();
        }
    }
    item.source
        .url
        .as_deref()
        .map(domain)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

/// Age of `date` relative to `now`, in words.
///
/// Dates in the future read as "just now". Anything a week or older is shown
/// as an absolute date such as `3 Feb 2024`. `None` yields an empty string.
pub fn relative_date(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(date) = date else {
        return String::new();
    };

    let secs = (now - date).num_seconds().max(0);
    let mins = secs / 60;
    let hours = mins / 60;
    let days = hours / 24;

    if secs < 60 {
        return "just now".to_string();
    }
    if mins < 60 {
        return plural(mins, "a minute ago", "minutes");
    }
    if hours < 24 {
        return plural(hours, "an hour ago", "hours");
    }
    if (now.date_naive() - date.date_naive()).num_days() == 1 {
        return "yesterday".to_string();
    }
    if days < 7 {
        return plural(days, "a day ago", "days");
    }
    date.format("%-d %b %Y").to_string()
}

fn plural(n: i64, one: &str, unit: &str) -> String {
    if n == 1 {
        one.to_string()
    } else {
        format!("{n} {unit} ago")
    }
}
