pub mod assets;
pub mod cache_warmer;
pub mod db;
pub mod error;
pub mod http;
pub mod signing;
pub mod telemetry;
