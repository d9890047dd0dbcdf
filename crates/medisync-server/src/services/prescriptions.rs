//! Prescription listing and dispensing.

use medisync_core::model::{Prescription, PrescriptionStatus, StockAction, User};
use medisync_core::now_utc;
use medisync_storage::{
    Collection, DynStore, Filter, Query, StorageError, decode, decode_all, encode,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use super::{ApiResult, PharmacyService, enum_filter};

#[derive(Debug, Default, Deserialize)]
pub struct PrescriptionFilters {
    pub status: Option<String>,
    pub patient: Option<String>,
}

#[derive(Clone)]
pub struct PrescriptionService {
    store: DynStore,
    pharmacy: PharmacyService,
}

impl PrescriptionService {
    pub fn new(store: DynStore, pharmacy: PharmacyService) -> Self {
        Self { store, pharmacy }
    }

    pub async fn list(&self, filters: &PrescriptionFilters) -> ApiResult<Vec<Prescription>> {
        let query = Query::new()
            .filter_opt(enum_filter::<PrescriptionStatus>(
                "status",
                filters.status.as_deref(),
            )?)
            .filter_opt(
                filters
                    .patient
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| Filter::eq("patient", p)),
            )
            .sort_asc("prescribed");
        Ok(decode_all(
            self.store.find(Collection::Prescriptions, &query).await?,
        )?)
    }

    /// Mark a pending prescription dispensed, drawing its quantity from the
    /// linked medication's stock first.
    pub async fn dispense(&self, id: &str, by: &User) -> ApiResult<Prescription> {
        let mut preview: Prescription =
            decode(self.store.require(Collection::Prescriptions, id).await?)?;
        preview.dispense(&by.id, now_utc())?;

        let drawn = match preview.stock_draw() {
            Some((medication_id, quantity)) => {
                let medication = self
                    .pharmacy
                    .adjust_stock(medication_id, StockAction::Subtract, quantity)
                    .await?;
                self.pharmacy.publish_stock_change(medication);
                Some((medication_id.to_string(), quantity))
            }
            None => None,
        };

        let dispensed_by = by.id.clone();
        let result = self
            .store
            .modify(
                Collection::Prescriptions,
                id,
                Box::new(move |doc: &mut Value| {
                    let mut prescription: Prescription = decode(doc.clone())?;
                    prescription
                        .dispense(&dispensed_by, now_utc())
                        .map_err(|e| StorageError::precondition(e.to_string()))?;
                    *doc = encode(&prescription)?;
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(doc) => {
                info!(prescription_id = %id, dispensed_by = %by.id, "prescription dispensed");
                Ok(decode(doc)?)
            }
            Err(err) => {
                // Someone else dispensed it in between; return the stock.
                if let Some((medication_id, quantity)) = drawn {
                    match self
                        .pharmacy
                        .adjust_stock(&medication_id, StockAction::Add, quantity)
                        .await
                    {
                        Ok(medication) => self.pharmacy.publish_stock_change(medication),
                        Err(restore) => error!(
                            medication_id = %medication_id,
                            quantity,
                            error = %restore,
                            "failed to restore stock after aborted dispense"
                        ),
                    }
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medisync_api::ApiError;
    use medisync_core::events::EventBroadcaster;
    use medisync_core::model::{Role, UserStatus};
    use serde_json::json;

    fn pharmacist() -> User {
        User {
            id: "ph1".into(),
            name: "Phil".into(),
            email: "phil@h.org".into(),
            password_hash: "x".into(),
            role: Role::Pharmacy,
            department: None,
            status: UserStatus::Active,
            created_at: now_utc(),
        }
    }

    async fn setup(stock: u32, quantity: u32) -> (PrescriptionService, DynStore) {
        let store = medisync_db_memory::create_store();
        let pharmacy = PharmacyService::new(store.clone(), EventBroadcaster::new());
        let medication = pharmacy
            .create(
                serde_json::from_value(json!({
                    "name": "Amoxicillin",
                    "genericName": "Amoxicillin",
                    "category": "Antibiotic",
                    "dosageForm": "capsule",
                    "strength": "250mg",
                    "manufacturer": "Acme",
                    "currentStock": stock,
                    "reorderLevel": 5,
                    "expiryDate": "2099-01-01",
                    "batchNumber": "B1",
                    "unitPrice": 1.0,
                    "location": "A1"
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        let now = medisync_core::format_rfc3339(now_utc()).unwrap();
        store
            .insert(
                Collection::Prescriptions,
                json!({
                    "id": "rx1",
                    "patient": "p1",
                    "prescribedBy": "d1",
                    "medication": "Amoxicillin",
                    "medicationId": medication.medication.id,
                    "quantity": quantity,
                    "dosage": "1 capsule",
                    "frequency": "3x daily",
                    "duration": "7 days",
                    "notes": null,
                    "prescribed": now,
                    "status": "pending",
                    "dispensedAt": null,
                    "dispensedBy": null,
                    "createdAt": now
                }),
            )
            .await
            .unwrap();
        (PrescriptionService::new(store.clone(), pharmacy), store)
    }

    async fn stock(store: &DynStore) -> u64 {
        let docs = store
            .find(Collection::Medications, &Query::new())
            .await
            .unwrap();
        docs[0]["currentStock"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn dispensing_draws_stock_once() {
        let (service, store) = setup(30, 21).await;
        let rx = service.dispense("rx1", &pharmacist()).await.unwrap();
        assert_eq!(rx.status, PrescriptionStatus::Dispensed);
        assert_eq!(rx.dispensed_by.as_deref(), Some("ph1"));
        assert_eq!(stock(&store).await, 9);

        let again = service.dispense("rx1", &pharmacist()).await.unwrap_err();
        assert!(matches!(again, ApiError::BadRequest(_)));
        assert_eq!(stock(&store).await, 9);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_prescription_pending() {
        let (service, store) = setup(5, 21).await;
        let err = service.dispense("rx1", &pharmacist()).await.unwrap_err();
        assert_eq!(err.public_message(), "Not enough stock available");
        assert_eq!(stock(&store).await, 5);

        let pending = service
            .list(&PrescriptionFilters {
                status: Some("pending".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }
}
