//! Medication inventory.

use std::collections::HashMap;

use medisync_api::ApiError;
use medisync_core::events::{EntityKind, EventBroadcaster};
use medisync_core::model::{Medication, MedicationDraft, MedicationView, StockAction};
use medisync_core::{generate_id, now_utc};
use medisync_storage::{
    Collection, DynStore, Filter, Query, StorageError, decode, decode_all, encode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::{ApiResult, bool_param, merge_update};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationFilters {
    pub category: Option<String>,
    pub name: Option<String>,
    pub low_stock: Option<String>,
    pub expired: Option<String>,
}

/// Body of `PUT /api/pharmacy/{id}/stock`.
#[derive(Debug, Default, Deserialize)]
pub struct StockChange {
    pub action: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StockValue {
    pub total: f64,
    pub average: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyDashboard {
    pub total_count: usize,
    pub low_stock_items: usize,
    pub expired_items: usize,
    pub category_data: Vec<CategoryCount>,
    pub stock_value: StockValue,
}

#[derive(Clone)]
pub struct PharmacyService {
    store: DynStore,
    events: EventBroadcaster,
}

impl PharmacyService {
    pub fn new(store: DynStore, events: EventBroadcaster) -> Self {
        Self { store, events }
    }

    pub async fn create(&self, draft: MedicationDraft) -> ApiResult<MedicationView> {
        let now = now_utc();
        let medication = draft.into_medication(generate_id(), now, now)?;
        self.store
            .insert(Collection::Medications, encode(&medication)?)
            .await?;
        info!(medication_id = %medication.id, name = %medication.name, "medication added");
        Ok(self.publish(EntityKind::Medication, medication, true))
    }

    pub async fn list(&self, filters: &MedicationFilters) -> ApiResult<Vec<MedicationView>> {
        let now = now_utc();
        let mut query = Query::new()
            .filter_opt(
                non_empty(filters.category.as_deref()).map(|c| Filter::eq("category", c)),
            )
            .filter_opt(
                non_empty(filters.name.as_deref())
                    .map(|n| Filter::contains_any(["name", "genericName"], n)),
            )
            .sort_asc("name");
        if bool_param("lowStock", filters.low_stock.as_deref())? == Some(true) {
            query = query.filter(Filter::field_lte("currentStock", "reorderLevel"));
        }
        if bool_param("expired", filters.expired.as_deref())? == Some(true) {
            query = query.filter(Filter::before("expiryDate", now));
        }

        let medications: Vec<Medication> =
            decode_all(self.store.find(Collection::Medications, &query).await?)?;
        Ok(medications.into_iter().map(|m| m.view(now)).collect())
    }

    pub async fn get(&self, id: &str) -> ApiResult<MedicationView> {
        Ok(self.load(id).await?.view(now_utc()))
    }

    /// Merge `patch` and re-validate. Stock only moves through
    /// [`PharmacyService::update_stock`].
    pub async fn update(&self, id: &str, patch: Value) -> ApiResult<MedicationView> {
        if patch.get("currentStock").is_some() {
            return Err(ApiError::bad_request(
                "Stock cannot be changed here, use the stock endpoint",
            ));
        }
        let current = self.load(id).await?;
        let mut doc = encode(&current)?;
        merge_update(&mut doc, patch, &["updatedAt"])?;
        let draft: MedicationDraft = serde_json::from_value(doc)
            .map_err(|e| ApiError::bad_request(format!("Invalid medication update: {e}")))?;
        let updated = draft.into_medication(current.id.clone(), current.created_at, now_utc())?;

        self.store
            .replace(Collection::Medications, id, encode(&updated)?)
            .await?;
        Ok(self.publish(EntityKind::Medication, updated, false))
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.store.delete(Collection::Medications, id).await?;
        info!(medication_id = %id, "medication removed");
        self.events.publish_deleted(EntityKind::Medication, id);
        Ok(())
    }

    /// Add or subtract stock atomically. A subtraction that would go below
    /// zero fails and leaves the stored stock untouched.
    pub async fn update_stock(&self, id: &str, change: StockChange) -> ApiResult<MedicationView> {
        let (Some(action), Some(quantity)) = (
            non_empty(change.action.as_deref()),
            change.quantity,
        ) else {
            return Err(ApiError::bad_request(
                "Please provide quantity and action (add or subtract)",
            ));
        };
        let action = action
            .parse::<StockAction>()
            .map_err(|_| ApiError::bad_request("Action must be either 'add' or 'subtract'"))?;
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| ApiError::bad_request("Quantity must be a positive number"))?;

        let medication = self.adjust_stock(id, action, quantity).await?;
        info!(
            medication_id = %id,
            action = %action,
            quantity,
            stock = medication.current_stock,
            "stock updated"
        );
        if medication.is_low_stock() {
            warn!(medication_id = %id, stock = medication.current_stock, "medication below reorder level");
        }
        Ok(self.publish(EntityKind::Medication, medication, false))
    }

    /// Stock adjustment shared with prescription dispensing.
    pub(crate) async fn adjust_stock(
        &self,
        id: &str,
        action: StockAction,
        quantity: u32,
    ) -> ApiResult<Medication> {
        let doc = self
            .store
            .modify(
                Collection::Medications,
                id,
                Box::new(move |doc: &mut Value| {
                    let mut medication: Medication = decode(doc.clone())?;
                    medication
                        .apply_stock(action, quantity, now_utc())
                        .map_err(|e| StorageError::precondition(e.to_string()))?;
                    *doc = encode(&medication)?;
                    Ok(())
                }),
            )
            .await?;
        Ok(decode(doc)?)
    }

    pub(crate) fn publish_stock_change(&self, medication: Medication) {
        self.publish(EntityKind::Medication, medication, false);
    }

    pub async fn dashboard(&self) -> ApiResult<PharmacyDashboard> {
        let now = now_utc();
        let medications: Vec<Medication> = decode_all(
            self.store
                .find(Collection::Medications, &Query::new())
                .await?,
        )?;

        let mut categories: HashMap<&str, usize> = HashMap::new();
        for medication in &medications {
            *categories.entry(medication.category.as_str()).or_default() += 1;
        }
        let mut category_data: Vec<CategoryCount> = categories
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();
        category_data.sort_by(|a, b| b.count.cmp(&a.count).then(a.category.cmp(&b.category)));

        let total: f64 = medications.iter().map(Medication::stock_value).sum();
        let average = if medications.is_empty() {
            0.0
        } else {
            total / medications.len() as f64
        };

        Ok(PharmacyDashboard {
            total_count: medications.len(),
            low_stock_items: medications.iter().filter(|m| m.is_low_stock()).count(),
            expired_items: medications.iter().filter(|m| m.is_expired(now)).count(),
            category_data,
            stock_value: StockValue { total, average },
        })
    }

    async fn load(&self, id: &str) -> ApiResult<Medication> {
        Ok(decode(self.store.require(Collection::Medications, id).await?)?)
    }

    fn publish(&self, kind: EntityKind, medication: Medication, created: bool) -> MedicationView {
        let view = medication.view(now_utc());
        match serde_json::to_value(&view) {
            Ok(data) if created => {
                self.events.publish_created(kind, data);
            }
            Ok(data) => {
                self.events.publish_updated(kind, data);
            }
            Err(e) => warn!(error = %e, "failed to serialize medication event"),
        }
        view
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(name: &str, category: &str, stock: i64, reorder: i64, expiry: &str) -> MedicationDraft {
        serde_json::from_value(json!({
            "name": name,
            "genericName": format!("{name} generic"),
            "category": category,
            "dosageForm": "tablet",
            "strength": "500mg",
            "manufacturer": "Acme",
            "currentStock": stock,
            "reorderLevel": reorder,
            "expiryDate": expiry,
            "batchNumber": "B-1",
            "unitPrice": 2.5,
            "location": "Shelf A"
        }))
        .unwrap()
    }

    fn service() -> PharmacyService {
        PharmacyService::new(medisync_db_memory::create_store(), EventBroadcaster::new())
    }

    #[tokio::test]
    async fn stock_add_and_underflow() {
        let service = service();
        let med = service
            .create(draft("Paracetamol", "Analgesic", 10, 5, "2099-01-01"))
            .await
            .unwrap();
        let id = med.medication.id.clone();

        let added = service
            .update_stock(&id, StockChange { action: Some("add".into()), quantity: Some(5) })
            .await
            .unwrap();
        assert_eq!(added.medication.current_stock, 15);
        assert!(added.medication.updated_at >= med.medication.updated_at);

        let err = service
            .update_stock(&id, StockChange { action: Some("subtract".into()), quantity: Some(20) })
            .await
            .unwrap_err();
        assert_eq!(err.public_message(), "Not enough stock available");
        assert_eq!(service.get(&id).await.unwrap().medication.current_stock, 15);
    }

    #[tokio::test]
    async fn stock_requests_are_validated() {
        let service = service();
        let id = service
            .create(draft("Ibuprofen", "Analgesic", 10, 5, "2099-01-01"))
            .await
            .unwrap()
            .medication
            .id;

        let missing = service
            .update_stock(&id, StockChange { action: None, quantity: Some(1) })
            .await
            .unwrap_err();
        assert_eq!(
            missing.public_message(),
            "Please provide quantity and action (add or subtract)"
        );
        let bad_action = service
            .update_stock(&id, StockChange { action: Some("remove".into()), quantity: Some(1) })
            .await
            .unwrap_err();
        assert_eq!(bad_action.public_message(), "Action must be either 'add' or 'subtract'");
        assert!(service
            .update_stock(&id, StockChange { action: Some("add".into()), quantity: Some(0) })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let service = service();
        service
            .create(draft("Amoxicillin", "Antibiotic", 1, 1, "2099-01-01"))
            .await
            .unwrap();
        let err = service
            .create(draft("amoxicillin", "Antibiotic", 1, 1, "2099-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_rejects_direct_stock_edits() {
        let service = service();
        let id = service
            .create(draft("Cetirizine", "Antihistamine", 3, 1, "2099-01-01"))
            .await
            .unwrap()
            .medication
            .id;
        assert!(service.update(&id, json!({"currentStock": 99})).await.is_err());
        let updated = service.update(&id, json!({"location": "Shelf B"})).await.unwrap();
        assert_eq!(updated.medication.location, "Shelf B");
        assert_eq!(updated.medication.current_stock, 3);
    }

    #[tokio::test]
    async fn filters_and_dashboard() {
        let service = service();
        service
            .create(draft("Aspirin", "Analgesic", 2, 5, "2099-01-01"))
            .await
            .unwrap();
        service
            .create(draft("Morphine", "Analgesic", 50, 5, "2000-01-01"))
            .await
            .unwrap();
        service
            .create(draft("Zinc", "Supplement", 10, 1, "2099-01-01"))
            .await
            .unwrap();

        let low = service
            .list(&MedicationFilters { low_stock: Some("true".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert!(low[0].low_stock);

        let expired = service
            .list(&MedicationFilters { expired: Some("true".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(expired[0].medication.name, "Morphine");

        let by_name = service
            .list(&MedicationFilters { name: Some("ZINC gen".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);

        let all = service.list(&MedicationFilters::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|m| m.medication.name.as_str()).collect();
        assert_eq!(names, ["Aspirin", "Morphine", "Zinc"]);

        let dashboard = service.dashboard().await.unwrap();
        assert_eq!(dashboard.total_count, 3);
        assert_eq!(dashboard.low_stock_items, 1);
        assert_eq!(dashboard.expired_items, 1);
        assert_eq!(dashboard.category_data[0].category, "Analgesic");
        assert_eq!(dashboard.category_data[0].count, 2);
        assert!((dashboard.stock_value.total - 155.0).abs() < f64::EPSILON);
    }
}
