//! Input checks run before anything is persisted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "validation failed ({})", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    fn min_len(&mut self, field: &'static str, value: &str, min: usize, message: &str) {
        if value.trim().chars().count() < min {
            self.0.push(FieldError {
                field,
                message: message.to_string(),
            });
        }
    }

    fn push(&mut self, field: &'static str, message: &str) {
        self.0.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollectionRequestInput {
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Stored when the form leaves `state` out.
pub const UNSPECIFIED_STATE: &str = "N/A";

impl CollectionRequestInput {
    pub fn state_or_default(&self) -> &str {
        self.state.as_deref().unwrap_or(UNSPECIFIED_STATE)
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.min_len("address", &self.address, 5, "Address must be at least 5 characters.");
        errors.min_len("city", &self.city, 2, "City is required.");
        errors.min_len("postal_code", &self.postal_code, 4, "Valid zip code is required.");
        if matches!(self.scheduled_date, Some(date) if date < now) {
            errors.push("scheduled_date", "Pickup date cannot be in the past.");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DumpingReportInput {
    pub description: String,
    pub location: String,
    pub waste_type: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl DumpingReportInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.min_len("description", &self.description, 10, "Description must be at least 10 characters.");
        errors.min_len("location", &self.location, 5, "Location must be at least 5 characters.");
        errors.min_len("waste_type", &self.waste_type, 1, "Please select a waste type.");
        if matches!(self.latitude, Some(lat) if !(-90.0..=90.0).contains(&lat)) {
            errors.push("latitude", "Latitude must be between -90 and 90.");
        }
        if matches!(self.longitude, Some(lon) if !(-180.0..=180.0).contains(&lon)) {
            errors.push("longitude", "Longitude must be between -180 and 180.");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListingInput {
    pub title: String,
    pub description: String,
    pub device_type: String,
    pub condition: String,
    pub price: f64,
    #[serde(default)]
    pub is_free: bool,
    pub location: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ListingInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.min_len("title", &self.title, 3, "Title must be at least 3 characters.");
        errors.min_len("description", &self.description, 10, "Description must be at least 10 characters.");
        errors.min_len("device_type", &self.device_type, 1, "Please select a device type.");
        errors.min_len("condition", &self.condition, 1, "Please select the condition.");
        errors.min_len("location", &self.location, 3, "Location is required.");
        if !self.price.is_finite() || self.price < 0.0 {
            errors.push("price", "Price cannot be negative.");
        } else if self.is_free && self.price != 0.0 {
            errors.push("price", "Free listings must have a price of 0.");
        }
        errors.into_result()
    }
}

/// Categories offered when registering a device.
pub const ITEM_CATEGORIES: [&str; 6] = ["Mobile", "Computer", "Laptop", "Printer", "Accessories", "Other"];

/// Conditions offered when registering a device.
pub const ITEM_CONDITIONS: [&str; 3] = ["Working", "Damaged", "Not Working"];

/// Where an automatic listing says the device is.
pub const UNSPECIFIED_LOCATION: &str = "Not specified";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemInput {
    pub name: String,
    pub category: String,
    pub brand: String,
    #[serde(default)]
    pub model: Option<String>,
    pub condition: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ItemInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.min_len("name", &self.name, 2, "Item name must be at least 2 characters.");
        if !ITEM_CATEGORIES.contains(&self.category.as_str()) {
            errors.push("category", "Please select a category.");
        }
        errors.min_len("brand", &self.brand, 1, "Brand is required.");
        if !ITEM_CONDITIONS.contains(&self.condition.as_str()) {
            errors.push("condition", "Please select the condition.");
        }
        errors.into_result()
    }

    /// Devices that still work, or only partly, are offered for free.
    pub fn is_reusable(&self) -> bool {
        matches!(self.condition.as_str(), "Working" | "Damaged")
    }

    /// The free listing that goes with a reusable device. Without a description
    /// the listing is described by brand, model and category.
    pub fn free_listing(&self) -> Option<ListingInput> {
        if !self.is_reusable() {
            return None;
        }
        let description = match self.description.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => [Some(self.brand.as_str()), self.model.as_deref(), Some(self.category.as_str())]
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        };
        Some(ListingInput {
            title: self.name.trim().to_string(),
            description,
            device_type: self.category.clone(),
            condition: self.condition.clone(),
            price: 0.0,
            is_free: true,
            location: UNSPECIFIED_LOCATION.to_string(),
            image_url: self.image_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request() -> CollectionRequestInput {
        CollectionRequestInput {
            address: "12 Harbour Road".to_string(),
            city: "Leeds".to_string(),
            state: None,
            postal_code: "LS11".to_string(),
            scheduled_date: None,
            notes: None,
        }
    }

    #[test]
    fn a_complete_collection_request_passes() {
        assert!(request().validate(Utc::now()).is_ok());
    }

    #[test]
    fn short_fields_and_past_dates_are_reported_together() {
        let now = Utc::now();
        let input = CollectionRequestInput {
            address: "1 A".to_string(),
            postal_code: "12".to_string(),
            scheduled_date: Some(now - Duration::days(1)),
            ..request()
        };
        let errors = input.validate(now).unwrap_err();
        let fields: Vec<_> = errors.0.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["address", "postal_code", "scheduled_date"]);
    }

    #[test]
    fn whitespace_does_not_count_towards_length() {
        let input = DumpingReportInput {
            description: "          ".to_string(),
            location: "Canal St".to_string(),
            waste_type: "batteries".to_string(),
            latitude: None,
            longitude: None,
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.0.len(), 1);
        assert_eq!(errors.0[0].field, "description");
    }

    #[test]
    fn free_listings_must_be_zero_priced() {
        let input = ListingInput {
            title: "Old laptop".to_string(),
            description: "Works, battery is tired".to_string(),
            device_type: "laptop".to_string(),
            condition: "fair".to_string(),
            price: 25.0,
            is_free: true,
            location: "Bristol".to_string(),
            image_url: None,
        };
        assert_eq!(input.validate().unwrap_err().0[0].field, "price");

        let negative = ListingInput { price: -1.0, is_free: false, ..input };
        assert_eq!(negative.validate().unwrap_err().0[0].message, "Price cannot be negative.");
    }

    fn item(condition: &str) -> ItemInput {
        ItemInput {
            name: "Galaxy S9".to_string(),
            category: "Mobile".to_string(),
            brand: "Samsung".to_string(),
            model: None,
            condition: condition.to_string(),
            description: None,
            image_url: None,
        }
    }

    #[test]
    fn items_need_a_known_category_and_condition() {
        assert!(item("Working").validate().is_ok());

        let input = ItemInput {
            name: "X".to_string(),
            category: "Fridge".to_string(),
            brand: " ".to_string(),
            ..item("Broken")
        };
        let fields: Vec<_> = input.validate().unwrap_err().0.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "category", "brand", "condition"]);
    }

    #[test]
    fn only_reusable_items_get_a_free_listing() {
        assert!(item("Not Working").free_listing().is_none());

        let listing = item("Damaged").free_listing().unwrap();
        assert_eq!(listing.title, "Galaxy S9");
        assert_eq!(listing.description, "Samsung Mobile");
        assert_eq!(listing.price, 0.0);
        assert!(listing.is_free);
        assert_eq!(listing.location, UNSPECIFIED_LOCATION);

        let described = ItemInput {
            model: Some("SM-G960".to_string()),
            description: Some("  Cracked back glass  ".to_string()),
            ..item("Working")
        };
        assert_eq!(described.free_listing().unwrap().description, "Cracked back glass");
        let undescribed = ItemInput {
            description: None,
            ..described
        };
        assert_eq!(undescribed.free_listing().unwrap().description, "Samsung SM-G960 Mobile");
    }
}
