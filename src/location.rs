//! Location resolution.
//!
//! Resolves free-form user input or raw coordinates to a canonical
//! `Location`, consulting the alias table before ever calling out to the
//! geocoder. Alias-cache-first and idempotent: resolving the same input
//! twice in a row does one geocoder round trip at most.

use sqlx::PgPool;

use crate::db::models::Location;
use crate::db::queries;
use crate::errors::AppError;
use crate::geocode::GeocoderClient;
use crate::normalize::normalize;

/// Resolve a free-form location string (city name, "city, country", etc.)
/// to a canonical `Location`, creating one if this is the first time it's
/// been seen.
pub async fn resolve(
    pool: &PgPool,
    geocoder: &GeocoderClient,
    input: &str,
) -> Result<Location, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(
            "location query must not be empty".to_string(),
        ));
    }
    let alias = normalize(trimmed);

    if let Some(location) = queries::get_location_by_alias(pool, &alias).await? {
        return Ok(location);
    }

    let place = geocoder.forward(trimmed).await?;
    let location = get_or_create_location(pool, &place).await?;

    // A duplicate-key violation on `alias` is
    // treated as success, not surfaced — the alias already points at the
    // winning location either way.
    queries::create_alias(pool, &alias, location.id).await?;

    // The canonical name itself also earns an alias, so a later query that
    // spells it out exactly hits the alias cache instead of re-geocoding.
    let canonical_alias = normalize(&location.canonical_name);
    if canonical_alias != alias {
        queries::create_alias(pool, &canonical_alias, location.id).await?;
    }

    Ok(location)
}

/// Resolve raw coordinates to a canonical `Location`. Reverse-geocodes to a
/// name, then hands off to [`resolve`] so coordinate lookups get the same
/// alias-cache treatment as free-form ones — a repeat lookup at the same
/// coordinates shortcuts through the alias table rather than reverse
/// geocoding again.
pub async fn resolve_coords(
    pool: &PgPool,
    geocoder: &GeocoderClient,
    latitude: f64,
    longitude: f64,
) -> Result<Location, AppError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::InvalidInput(format!(
            "coordinates out of range: ({latitude}, {longitude})"
        )));
    }

    if let Some(location) = queries::get_location_by_coordinates(pool, latitude, longitude).await?
    {
        return Ok(location);
    }

    let place = geocoder.reverse(latitude, longitude).await?;
    let name = format!("{}, {}", place.canonical_name, place.country_code);
    resolve(pool, geocoder, &name).await
}

async fn get_or_create_location(
    pool: &PgPool,
    place: &crate::geocode::GeocodedPlace,
) -> Result<Location, AppError> {
    if let Some(location) =
        queries::get_location_by_name(pool, &place.canonical_name, &place.country_code).await?
    {
        return Ok(location);
    }

    let location = queries::create_location(
        pool,
        &place.canonical_name,
        &place.country_code,
        place.latitude,
        place.longitude,
        None,
    )
    .await?;
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_input() {
        // normalize() itself never fails; the emptiness guard lives in
        // resolve() before any DB or network call happens.
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        assert!(!(-90.0..=90.0).contains(&91.0_f64));
        assert!(!(-180.0..=180.0).contains(&200.0_f64));
    }
}
