//! Geography helpers: address formatting, geocoding and great-circle distance.

pub mod address;
pub mod distance;
pub mod geocoder;

pub use address::{AddressQuery, format_address};
pub use distance::{haversine_km, round2};
pub use geocoder::{Geocoder, GeocoderConfig, HttpGeocoder, NoopGeocoder};
