// src/config/mod.rs
pub mod realestate;

pub use realestate::RealEstateConfig;
