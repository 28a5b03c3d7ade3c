pub mod aqi;
pub mod crypto;
pub mod db;
pub mod decoder;
pub mod logging;
pub mod mesh;
pub mod mqtt;
pub mod pipeline;
pub mod reading;
