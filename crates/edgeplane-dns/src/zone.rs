//! Zone membership rules
//!
//! A name belongs to the longest configured zone that equals it or is a
//! dot-separated suffix of it.

use edgeplane_db::{entities::domain, store::ZoneStore};
use sea_orm::DbErr;

/// Lower-case and drop the trailing root dot
pub fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Whether `fqdn` is the zone apex or inside the zone
pub fn in_zone(fqdn: &str, zone: &str) -> bool {
    let fqdn = normalize(fqdn);
    let zone = normalize(zone);
    fqdn == zone || fqdn.ends_with(&format!(".{}", zone))
}

/// Full name of a zone-relative record name (`@` is the apex)
pub fn fqdn(relative_name: &str, zone: &str) -> String {
    let zone = normalize(zone);
    if relative_name.is_empty() || relative_name == "@" {
        zone
    } else {
        format!("{}.{}", normalize(relative_name), zone)
    }
}

/// Zone-relative name of `fqdn`, or `None` when it lies outside the zone
pub fn relative_name(fqdn: &str, zone: &str) -> Option<String> {
    let fqdn = normalize(fqdn);
    let zone = normalize(zone);
    if fqdn == zone {
        return Some("@".to_string());
    }
    fqdn.strip_suffix(&format!(".{}", zone))
        .map(|prefix| prefix.to_string())
}

/// Pick the zone owning `fqdn` out of `zones`
pub fn resolve_zone<'a>(fqdn: &str, zones: &'a [domain::Model]) -> Option<&'a domain::Model> {
    let fqdn = normalize(fqdn);

    // Walk from the full name toward the last label
    let mut current = fqdn.as_str();
    loop {
        if let Some(zone) = zones.iter().find(|z| normalize(&z.domain) == current) {
            return Some(zone);
        }
        match current.find('.') {
            Some(pos) => current = &current[pos + 1..],
            None => return None,
        }
    }
}

/// Resolve the zone of `fqdn` against the active zones in the database
pub async fn find_zone_for<C>(db: &C, fqdn: &str) -> Result<Option<domain::Model>, DbErr>
where
    C: ZoneStore + ?Sized,
{
    let zones = db.list_active_zones().await?;
    Ok(resolve_zone(fqdn, &zones).cloned())
}
