//! Medicine lookup against the Vezeeta pharmacy catalogue.

use crate::config::MedicineSearchConfig;
use crate::services::resilient_client::{RequestSpec, ResilientClient};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

/// Query accepted by [`MedicineSearchService::search`]
#[derive(Debug, Clone)]
pub struct MedicineQuery {
    pub medicine_name: String,
    pub from_index: i64,
    pub size: i64,
    pub is_trending: bool,
    pub pharmacy_type_id: i64,
}

impl MedicineQuery {
    fn to_params(&self) -> Vec<(String, String)> {
        vec![
            ("query".into(), self.medicine_name.clone()),
            ("from".into(), self.from_index.to_string()),
            ("size".into(), self.size.to_string()),
            ("isTrending".into(), self.is_trending.to_string()),
            ("pharmacyTypeId".into(), self.pharmacy_type_id.to_string()),
            ("version".into(), "2".into()),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogueResponse {
    total_count: Option<Value>,
    from: Option<Value>,
    size: Option<Value>,
    #[serde(default)]
    product_shapes: Option<Vec<ProductShape>>,
}

// Field spellings follow the upstream payload
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductShape {
    id: Option<Value>,
    product_name_en: Option<String>,
    product_name_ar: Option<String>,
    new_price: Option<Value>,
    currency_en: Option<String>,
    category: Option<Value>,
    product_shape_type_name: Option<String>,
    product_shape_type_name_ar: Option<String>,
    stock_quantity: Option<Value>,
    max_available_quantity: Option<Value>,
    stock_level_id: Option<Value>,
    main_image_url: Option<String>,
    #[serde(default, rename = "activeIngrediant")]
    active_ingredients: Option<Vec<ActiveIngredient>>,
    #[serde(default, rename = "productAvaialabilities")]
    availability: Option<Availability>,
}

#[derive(Debug, Default, Deserialize)]
struct ActiveIngredient {
    name: Option<String>,
    country: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Availability {
    #[serde(rename = "avialableInPharmaciesCount")]
    available_in_pharmacies_count: Option<Value>,
}

impl ProductShape {
    fn into_medicine(self) -> Value {
        let active_ingredients: Vec<Value> = self
            .active_ingredients
            .unwrap_or_default()
            .into_iter()
            .filter(|i| i.lang.as_deref() == Some("en"))
            .map(|i| json!({"name_en": i.name, "country": i.country}))
            .collect();

        let available = self
            .availability
            .and_then(|a| a.available_in_pharmacies_count)
            .unwrap_or_else(|| json!(0));

        json!({
            "id": self.id,
            "name_en": self.product_name_en,
            "name_ar": self.product_name_ar,
            "price": self.new_price,
            "currency": self.currency_en,
            "category": self.category,
            "shape_type": self.product_shape_type_name,
            "shape_type_ar": self.product_shape_type_name_ar,
            "stock_quantity": self.stock_quantity,
            "max_available_quantity": self.max_available_quantity,
            "stock_level_id": self.stock_level_id,
            "image_url": self.main_image_url,
            "active_ingredients": active_ingredients,
            "available_in_pharmacies": available,
        })
    }
}

/// Client for the public pharmacy catalogue
pub struct MedicineSearchService {
    config: MedicineSearchConfig,
    http: Arc<ResilientClient>,
}

impl MedicineSearchService {
    pub fn new(config: MedicineSearchConfig, http: Arc<ResilientClient>) -> Self {
        Self { config, http }
    }

    /// Search by medicine name; failures come back as an `{"error": ...}` object
    pub async fn search(&self, query: &MedicineQuery) -> Value {
        match self.fetch(query).await {
            Ok(catalogue) => summarize(query, catalogue),
            Err(details) => {
                warn!(error = %details, "Medicine search failed");
                json!({
                    "error": "Failed to search medicines",
                    "details": details,
                    "query": query.medicine_name,
                })
            }
        }
    }

    async fn fetch(&self, query: &MedicineQuery) -> Result<CatalogueResponse, String> {
        let spec = RequestSpec::get(self.config.endpoint.as_str())
            .with_query(query.to_params())
            .with_header("accept", "application/json, text/plain, */*")
            .with_header("accept-language", "en-us")
            .with_header("cache-control", "no-cache")
            .with_header("origin", "https://www.vezeeta.com")
            .with_header("referer", "https://www.vezeeta.com/");

        let response = self
            .http
            .execute(spec)
            .await
            .map_err(|e| e.user_message())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("Catalogue responded with status {status}"));
        }

        response
            .json::<CatalogueResponse>()
            .await
            .map_err(|e| format!("Invalid catalogue response: {}", e.without_url()))
    }
}

fn summarize(query: &MedicineQuery, catalogue: CatalogueResponse) -> Value {
    let medicines: Vec<Value> = catalogue
        .product_shapes
        .unwrap_or_default()
        .into_iter()
        .map(ProductShape::into_medicine)
        .collect();

    json!({
        "search_query": query.medicine_name,
        "total_count": catalogue.total_count.unwrap_or_else(|| json!(0)),
        "from": catalogue.from.unwrap_or_else(|| json!(query.from_index)),
        "size": catalogue.size.unwrap_or_else(|| json!(query.size)),
        "medicines": medicines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> MedicineQuery {
        MedicineQuery {
            medicine_name: "panadol".into(),
            from_index: 1,
            size: 30,
            is_trending: false,
            pharmacy_type_id: 0,
        }
    }

    #[test]
    fn test_query_params() {
        let params = query().to_params();
        assert!(params.contains(&("query".into(), "panadol".into())));
        assert!(params.contains(&("isTrending".into(), "false".into())));
        assert!(params.contains(&("version".into(), "2".into())));
    }

    #[test]
    fn test_summarize_maps_products() {
        let catalogue: CatalogueResponse = serde_json::from_value(json!({
            "totalCount": 1,
            "productShapes": [{
                "id": 42,
                "productNameEn": "Panadol Extra",
                "newPrice": 55.5,
                "currencyEn": "EGP",
                "activeIngrediant": [
                    {"name": "Paracetamol", "country": "UK", "lang": "en"},
                    {"name": "باراسيتامول", "lang": "ar"}
                ],
                "productAvaialabilities": {"avialableInPharmaciesCount": 12}
            }]
        }))
        .unwrap();

        let result = summarize(&query(), catalogue);
        assert_eq!(result["search_query"], "panadol");
        assert_eq!(result["total_count"], 1);
        assert_eq!(result["from"], 1);
        assert_eq!(result["size"], 30);

        let medicine = &result["medicines"][0];
        assert_eq!(medicine["id"], 42);
        assert_eq!(medicine["name_en"], "Panadol Extra");
        assert_eq!(medicine["currency"], "EGP");
        assert!(medicine["name_ar"].is_null());
        assert_eq!(medicine["available_in_pharmacies"], 12);
        assert_eq!(
            medicine["active_ingredients"],
            json!([{"name_en": "Paracetamol", "country": "UK"}])
        );
    }

    #[test]
    fn test_summarize_empty_catalogue() {
        let result = summarize(&query(), CatalogueResponse::default());
        assert_eq!(result["total_count"], 0);
        assert_eq!(result["medicines"], json!([]));
    }
}
