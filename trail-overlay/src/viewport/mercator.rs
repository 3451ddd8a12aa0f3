//! Projection Web Mercator (EPSG:3857)
//!
//! Les vues cartographiques exposent leur emprise en Web Mercator;
//! Overpass attend des degrés WGS84.

/// Rayon équatorial WGS84 (m), sphère Web Mercator
const R: f64 = 6_378_137.0;

/// Latitude maximale représentable en Web Mercator
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Convertit (lon, lat) en degrés vers Web Mercator (x, y) en mètres
pub fn lon_lat_to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();

    let x = R * lon.to_radians();
    let y = R * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    (x, y)
}

/// Convertit Web Mercator (x, y) en (lon, lat) en degrés
pub fn web_mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / R).to_degrees();
    let lat = (2.0 * (y / R).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();

    (lon, lat)
}
