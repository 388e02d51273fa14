//! Standard filter table
//!
//! The filters offered in the library picker. Categories group alternative
//! facets of one axis (playtime bands, rating bands, release windows,
//! installation state).

use chrono::Datelike;

use crate::domain::Item;
use crate::error::Result;

use super::catalog::{FilterCatalog, PredicateError};

pub const CATEGORY_GAMEPLAY: &str = "gameplay";
pub const CATEGORY_RATINGS: &str = "ratings";
pub const CATEGORY_RELEASE: &str = "release";
pub const CATEGORY_INSTALLATION: &str = "installation";

/// Upper bound (exclusive) of the "started" playtime band, in hours
pub const STARTED_MAX_HOURS: f64 = 10.0;

/// Lower bound of the "heavily played" band, in hours
pub const HEAVY_MIN_HOURS: f64 = 50.0;

/// Minimum critic score for "highly rated"
pub const HIGHLY_RATED_MIN: u8 = 85;

/// Minimum critic score for "well rated"
pub const WELL_RATED_MIN: u8 = 70;

/// Minimum critic score for "mixed reviews"
pub const MIXED_MIN: u8 = 50;

/// Releases strictly before this year count as classics
pub const CLASSIC_BEFORE: i32 = 2005;

/// Build the standard catalog relative to the current year
pub fn standard_catalog() -> Result<FilterCatalog> {
    standard_catalog_for_year(chrono::Utc::now().year())
}

/// Build the standard catalog with a fixed reference year.
///
/// The release-window filters compare against `current_year`, captured once
/// here so every predicate stays pure.
pub fn standard_catalog_for_year(current_year: i32) -> Result<FilterCatalog> {
    let mut builder = FilterCatalog::builder();

    builder
        .register("unplayed", CATEGORY_GAMEPLAY, "Unplayed", |item: &Item| {
            Ok(playtime(item)? == 0.0)
        })?
        .register("started", CATEGORY_GAMEPLAY, "Started", |item: &Item| {
            let hours = playtime(item)?;
            Ok(hours > 0.0 && hours < STARTED_MAX_HOURS)
        })?
        .register("well-played", CATEGORY_GAMEPLAY, "Well played", |item: &Item| {
            let hours = playtime(item)?;
            Ok((STARTED_MAX_HOURS..HEAVY_MIN_HOURS).contains(&hours))
        })?
        .register("heavily-played", CATEGORY_GAMEPLAY, "Heavily played", |item: &Item| {
            Ok(playtime(item)? >= HEAVY_MIN_HOURS)
        })?
        .register("completed", CATEGORY_GAMEPLAY, "Completed", |item: &Item| {
            Ok(item.completed)
        })?;

    builder
        .register("highly-rated", CATEGORY_RATINGS, "Highly rated", |item: &Item| {
            Ok(rating(item)?.is_some_and(|r| r >= HIGHLY_RATED_MIN))
        })?
        .register("well-rated", CATEGORY_RATINGS, "Well rated", |item: &Item| {
            Ok(rating(item)?.is_some_and(|r| (WELL_RATED_MIN..HIGHLY_RATED_MIN).contains(&r)))
        })?
        .register("mixed-reviews", CATEGORY_RATINGS, "Mixed reviews", |item: &Item| {
            Ok(rating(item)?.is_some_and(|r| (MIXED_MIN..WELL_RATED_MIN).contains(&r)))
        })?
        .register("poorly-rated", CATEGORY_RATINGS, "Poorly rated", |item: &Item| {
            Ok(rating(item)?.is_some_and(|r| r < MIXED_MIN))
        })?
        .register("unrated", CATEGORY_RATINGS, "Unrated", |item: &Item| {
            Ok(rating(item)?.is_none())
        })?;

    builder
        .register("new-release", CATEGORY_RELEASE, "New release", move |item: &Item| {
            Ok(item.release_year.is_some_and(|y| y >= current_year - 1))
        })?
        .register("recent", CATEGORY_RELEASE, "Last five years", move |item: &Item| {
            Ok(item.release_year.is_some_and(|y| y >= current_year - 5))
        })?
        .register("classic", CATEGORY_RELEASE, "Classic", |item: &Item| {
            Ok(item.release_year.is_some_and(|y| y < CLASSIC_BEFORE))
        })?;

    builder
        .register("installed", CATEGORY_INSTALLATION, "Installed", |item: &Item| {
            Ok(item.installed)
        })?
        .register("not-installed", CATEGORY_INSTALLATION, "Not installed", |item: &Item| {
            Ok(!item.installed)
        })?;

    Ok(builder.build())
}

/// Playtime in hours; a missing value means never launched
fn playtime(item: &Item) -> std::result::Result<f64, PredicateError> {
    match item.playtime_hours {
        None => Ok(0.0),
        Some(h) if h.is_finite() && h >= 0.0 => Ok(h),
        Some(h) => Err(PredicateError::new(format!("invalid playtime {h}"))),
    }
}

fn rating(item: &Item) -> std::result::Result<Option<u8>, PredicateError> {
    match item.rating {
        Some(r) if r > 100 => Err(PredicateError::new(format!("rating {r} out of range"))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::catalog::PredicateResult;

    fn catalog() -> FilterCatalog {
        standard_catalog_for_year(2026).unwrap()
    }

    fn eval(catalog: &FilterCatalog, id: &str, item: &Item) -> PredicateResult {
        catalog.get(id).unwrap().evaluate(item)
    }

    #[test]
    fn test_categories() {
        let catalog = catalog();
        assert_eq!(
            catalog.categories(),
            [CATEGORY_GAMEPLAY, CATEGORY_RATINGS, CATEGORY_RELEASE, CATEGORY_INSTALLATION]
        );
        assert_eq!(catalog.ids_in_category(CATEGORY_INSTALLATION).len(), 2);
        assert_eq!(catalog.len(), 15);
    }

    #[test]
    fn test_playtime_bands() {
        let catalog = catalog();
        let never = Item::new("1", "A", "steam");
        let short = Item::new("2", "B", "steam").with_playtime(3.0);
        let long = Item::new("3", "C", "steam").with_playtime(120.0);

        assert_eq!(eval(&catalog, "unplayed", &never), Ok(true));
        assert_eq!(eval(&catalog, "started", &short), Ok(true));
        assert_eq!(eval(&catalog, "well-played", &short), Ok(false));
        assert_eq!(eval(&catalog, "heavily-played", &long), Ok(true));
    }

    #[test]
    fn test_invalid_attributes_are_errors() {
        let catalog = catalog();
        let negative = Item::new("1", "A", "steam").with_playtime(-1.0);
        let mut overflow = Item::new("2", "B", "steam");
        overflow.rating = Some(140);

        assert!(eval(&catalog, "started", &negative).is_err());
        assert!(eval(&catalog, "highly-rated", &overflow).is_err());
        assert_eq!(eval(&catalog, "installed", &overflow), Ok(false));
    }

    #[test]
    fn test_rating_and_release_bands() {
        let catalog = catalog();
        let hit = Item::new("1", "A", "steam").with_rating(95).with_release_year(2026);
        let old = Item::new("2", "B", "gog").with_rating(40).with_release_year(1998);

        assert_eq!(eval(&catalog, "highly-rated", &hit), Ok(true));
        assert_eq!(eval(&catalog, "poorly-rated", &old), Ok(true));
        assert_eq!(eval(&catalog, "new-release", &hit), Ok(true));
        assert_eq!(eval(&catalog, "recent", &old), Ok(false));
        assert_eq!(eval(&catalog, "classic", &old), Ok(true));
        assert_eq!(eval(&catalog, "unrated", &Item::new("3", "C", "gog")), Ok(true));
    }
}
