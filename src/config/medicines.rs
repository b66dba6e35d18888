//! Pharmacy catalogue configuration.

use std::env;

pub const DEFAULT_MEDICINE_SEARCH_URL: &str =
    "https://v-gateway.vezeetaservices.com/inventory/api/V2/ProductShapes";

/// Settings for the medicine search tool
#[derive(Debug, Clone)]
pub struct MedicineSearchConfig {
    pub endpoint: String,
}

impl Default for MedicineSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_MEDICINE_SEARCH_URL.to_string(),
        }
    }
}

impl MedicineSearchConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("MEDICINE_SEARCH_URL")
                .unwrap_or_else(|_| DEFAULT_MEDICINE_SEARCH_URL.to_string()),
        }
    }
}
