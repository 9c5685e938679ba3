pub mod clock_token;
pub mod location_cache;
pub mod notify;
