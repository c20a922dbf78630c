//! In-memory browse filtering over the active activity listing.
//!
//! The listing is small enough that search, price/age windows, audience
//! buckets, sorting and pagination are applied after a single fetch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::activity::ActivitySummary;

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Audience buckets derived from an activity's age range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Kids,
    Teens,
    Family,
}

impl Audience {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "kids" => Ok(Audience::Kids),
            "teens" => Ok(Audience::Teens),
            "family" => Ok(Audience::Family),
            _ => Err(format!("Invalid audience: {}", s)),
        }
    }

    pub fn matches(&self, min_age: i32, max_age: i32) -> bool {
        match self {
            Audience::Kids => min_age <= 12,
            Audience::Teens => max_age >= 13 && min_age <= 18,
            Audience::Family => min_age <= 5,
        }
    }
}

/// Sort orders offered on the browse page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivitySort {
    /// Most reviewed first
    #[default]
    Popularity,
    /// Cheapest first
    Price,
    /// Best rated first
    Rating,
    /// Most recently listed first
    Newest,
}

impl ActivitySort {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "" | "popularity" => Ok(ActivitySort::Popularity),
            "price" => Ok(ActivitySort::Price),
            "rating" => Ok(ActivitySort::Rating),
            "newest" => Ok(ActivitySort::Newest),
            _ => Err(format!("Invalid sort: {}", s)),
        }
    }
}

/// Browse filter; every criterion is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub search: Option<String>,
    pub location: Option<String>,
    pub category_slug: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub audience: Option<Audience>,
    #[serde(default)]
    pub sort: ActivitySort,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// One page of filtered results
#[derive(Debug, Clone, Serialize)]
pub struct ActivityPage {
    pub items: Vec<ActivitySummary>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Case-insensitive match over title, description and location
pub fn matches_search(summary: &ActivitySummary, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let activity = &summary.activity;
    contains_ci(&activity.title, &needle)
        || contains_ci(&activity.description, &needle)
        || contains_ci(&activity.location, &needle)
}

impl ActivityFilter {
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err("min_price must not exceed max_price".to_string());
            }
        }
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err("min_age must not exceed max_age".to_string());
            }
        }
        if self.page == Some(0) {
            return Err("page starts at 1".to_string());
        }
        if self.per_page == Some(0) {
            return Err("per_page must be at least 1".to_string());
        }
        Ok(())
    }

    /// Whether a single listing passes every criterion
    pub fn matches(&self, summary: &ActivitySummary) -> bool {
        let activity = &summary.activity;

        if let Some(search) = &self.search {
            if !matches_search(summary, search) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            let needle = location.trim().to_lowercase();
            if !needle.is_empty() && !contains_ci(&activity.location, &needle) {
                return false;
            }
        }
        if let Some(slug) = &self.category_slug {
            if summary.category_slug.as_deref() != Some(slug.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if activity.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if activity.price > max {
                return false;
            }
        }
        // Age window: the activity must accept someone inside the requested range
        if let Some(min_age) = self.min_age {
            if activity.max_age < min_age {
                return false;
            }
        }
        if let Some(max_age) = self.max_age {
            if activity.min_age > max_age {
                return false;
            }
        }
        if let Some(audience) = self.audience {
            if !audience.matches(activity.min_age, activity.max_age) {
                return false;
            }
        }
        true
    }

    /// Filter, sort and paginate
    pub fn apply(&self, listing: Vec<ActivitySummary>) -> ActivityPage {
        let mut matched: Vec<ActivitySummary> =
            listing.into_iter().filter(|s| self.matches(s)).collect();

        sort_summaries(&mut matched, self.sort);

        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = self.page.unwrap_or(1).max(1);
        let total = matched.len();
        let total_pages = total.div_ceil(per_page as usize) as u32;

        let start = (page as usize - 1) * per_page as usize;
        let items = matched
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();

        ActivityPage {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

/// Stable sort; ties keep listing order
pub fn sort_summaries(items: &mut [ActivitySummary], sort: ActivitySort) {
    match sort {
        ActivitySort::Popularity => items.sort_by(|a, b| b.review_count.cmp(&a.review_count)),
        ActivitySort::Price => items.sort_by(|a, b| a.activity.price.cmp(&b.activity.price)),
        ActivitySort::Rating => items.sort_by(|a, b| b.rating().total_cmp(&a.rating())),
        ActivitySort::Newest => {
            items.sort_by(|a, b| b.activity.created_at.cmp(&a.activity.created_at))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::fixtures::{activity, summary};

    fn listing() -> Vec<ActivitySummary> {
        vec![
            summary(activity("Forest Hike", 40, 6, 99), 4.2, 10),
            summary(activity("Toddler Nature Walk", 15, 2, 6), 4.9, 3),
            summary(activity("Teen Climbing Camp", 120, 13, 17), 3.8, 25),
            summary(activity("Sunset Kayak", 80, 16, 70), 0.0, 0),
        ]
    }

    fn titles(page: &ActivityPage) -> Vec<&str> {
        page.items.iter().map(|s| s.activity.title.as_str()).collect()
    }

    #[test]
    fn test_default_sort_is_popularity() {
        let page = ActivityFilter::default().apply(listing());
        assert_eq!(
            titles(&page),
            vec!["Teen Climbing Camp", "Forest Hike", "Toddler Nature Walk", "Sunset Kayak"]
        );
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_sort_by_price_and_rating() {
        let filter = ActivityFilter {
            sort: ActivitySort::Price,
            ..Default::default()
        };
        assert_eq!(titles(&filter.apply(listing()))[0], "Toddler Nature Walk");

        let filter = ActivityFilter {
            sort: ActivitySort::Rating,
            ..Default::default()
        };
        let page = filter.apply(listing());
        assert_eq!(titles(&page)[0], "Toddler Nature Walk");
        assert_eq!(titles(&page)[3], "Sunset Kayak");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let filter = ActivityFilter {
            search: Some("KAYAK".into()),
            ..Default::default()
        };
        assert_eq!(titles(&filter.apply(listing())), vec!["Sunset Kayak"]);

        // Matches description too
        let filter = ActivityFilter {
            search: Some("whole family".into()),
            ..Default::default()
        };
        assert_eq!(filter.apply(listing()).total, 4);
    }

    #[test]
    fn test_audience_buckets() {
        assert!(Audience::Kids.matches(6, 99));
        assert!(!Audience::Kids.matches(13, 17));
        assert!(Audience::Teens.matches(13, 17));
        assert!(!Audience::Teens.matches(2, 6));
        assert!(Audience::Family.matches(2, 6));
        assert!(!Audience::Family.matches(6, 99));

        let filter = ActivityFilter {
            audience: Some(Audience::Family),
            ..Default::default()
        };
        assert_eq!(titles(&filter.apply(listing())), vec!["Toddler Nature Walk"]);
    }

    #[test]
    fn test_price_and_age_windows() {
        let filter = ActivityFilter {
            max_price: Some(Decimal::new(50, 0)),
            min_age: Some(5),
            sort: ActivitySort::Price,
            ..Default::default()
        };
        assert_eq!(
            titles(&filter.apply(listing())),
            vec!["Toddler Nature Walk", "Forest Hike"]
        );
    }

    #[test]
    fn test_pagination() {
        let filter = ActivityFilter {
            page: Some(2),
            per_page: Some(3),
            ..Default::default()
        };
        let page = filter.apply(listing());
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(titles(&page), vec!["Sunset Kayak"]);

        let filter = ActivityFilter {
            page: Some(5),
            per_page: Some(3),
            ..Default::default()
        };
        assert!(filter.apply(listing()).items.is_empty());
    }

    #[test]
    fn test_filter_validation() {
        let filter = ActivityFilter {
            min_price: Some(Decimal::new(100, 0)),
            max_price: Some(Decimal::new(10, 0)),
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        let filter = ActivityFilter {
            page: Some(0),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
        assert!(ActivityFilter::default().validate().is_ok());
    }

    #[test]
    fn test_parse_sort_and_audience() {
        assert_eq!(ActivitySort::from_str("PRICE"), Ok(ActivitySort::Price));
        assert_eq!(ActivitySort::from_str(""), Ok(ActivitySort::Popularity));
        assert!(ActivitySort::from_str("distance").is_err());
        assert_eq!(Audience::from_str("Teens"), Ok(Audience::Teens));
    }
}
