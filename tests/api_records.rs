//! Integration tests for medical records
//!
//! Covers:
//! - /measurement-attributes definitions per clinic
//! - /records with measurements, authorship rules and deletion
//! - /patients/{id}/records history

mod common;

#[cfg(test)]
mod records_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    async fn attribute(app: &TestApp, token: &str, name: &str, unit: &str) -> i64 {
        let response = app
            .server
            .post("/measurement-attributes")
            .add_header(authorization(), bearer(token))
            .json(&json!({ "name": name, "unit": unit }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        body["id"].as_i64().unwrap()
    }

    async fn record(app: &TestApp, token: &str, body: Value) -> axum_test::TestResponse {
        app.server
            .post("/records")
            .add_header(authorization(), bearer(token))
            .json(&body)
            .await
    }

    // ============================================================
    // Measurement attributes
    // ============================================================

    #[sqlx::test]
    async fn test_attribute_names_are_unique_per_clinic(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let id = attribute(&app, &owner.token, "Weight", "kg").await;

        let response = app
            .server
            .post("/measurement-attributes")
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "name": "weight" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "DUPLICATE_ATTRIBUTE");

        app.server
            .delete(&format!("/measurement-attributes/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        // a deleted name can be defined again
        attribute(&app, &owner.token, "Weight", "lb").await;

        let list: Value = app
            .server
            .get("/measurement-attributes")
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["unit"], "lb");
        Ok(())
    }

    #[sqlx::test]
    async fn test_attribute_roles(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let desk = app.staff_member(&owner, "desk@example.com", "RECEPTIONIST").await;
        let doctor = app.staff_member(&owner, "doctor@example.com", "DOCTOR").await;

        app.server
            .post("/measurement-attributes")
            .add_header(authorization(), bearer(&desk))
            .json(&json!({ "name": "Height" }))
            .await
            .assert_status_forbidden();

        let id = attribute(&app, &doctor, "Height", "cm").await;

        app.server
            .delete(&format!("/measurement-attributes/{}", id))
            .add_header(authorization(), bearer(&doctor))
            .await
            .assert_status_forbidden();

        let response = app
            .server
            .delete("/measurement-attributes/9999")
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "ATTRIBUTE_NOT_FOUND");
        Ok(())
    }

    // ============================================================
    // Records
    // ============================================================

    #[sqlx::test]
    async fn test_create_record_with_measurements(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let weight = attribute(&app, &owner.token, "Weight", "kg").await;
        let pressure = attribute(&app, &owner.token, "Blood pressure", "mmHg").await;

        let response = record(
            &app,
            &owner.token,
            json!({
                "patient_id": patient,
                "diagnosis": "Seasonal flu",
                "treatment": "Rest",
                "measurements": [
                    { "attribute_id": weight, "value": "64.5" },
                    { "attribute_id": pressure, "value": "120/80" }
                ]
            }),
        )
        .await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        assert_eq!(created["staff_id"], owner.staff_id);
        assert_eq!(created["diagnosis"], "Seasonal flu");
        let measurements = created["measurements"].as_array().unwrap();
        assert_eq!(measurements.len(), 2);
        assert_eq!(measurements[0]["name"], "Blood pressure");
        assert_eq!(measurements[1]["value"], "64.5");
        assert_eq!(measurements[1]["unit"], "kg");

        let id = created["id"].as_i64().unwrap();
        let fetched: Value = app
            .server
            .get(&format!("/records/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(fetched["measurements"].as_array().unwrap().len(), 2);
        Ok(())
    }

    #[sqlx::test]
    async fn test_record_measurement_rules(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let other = app.owner("other@example.com", "Other Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let weight = attribute(&app, &owner.token, "Weight", "kg").await;
        let foreign = attribute(&app, &other.token, "Glucose", "mg/dL").await;

        let response = record(
            &app,
            &owner.token,
            json!({
                "patient_id": patient,
                "diagnosis": "Check-up",
                "measurements": [
                    { "attribute_id": weight, "value": "60" },
                    { "attribute_id": weight, "value": "61" }
                ]
            }),
        )
        .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_ATTRIBUTE");

        // attributes of another clinic are unknown here
        let response = record(
            &app,
            &owner.token,
            json!({
                "patient_id": patient,
                "diagnosis": "Check-up",
                "measurements": [{ "attribute_id": foreign, "value": "90" }]
            }),
        )
        .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_ATTRIBUTE");

        let response = record(&app, &owner.token, json!({ "patient_id": patient, "diagnosis": "   " })).await;
        response.assert_status_bad_request();

        let response = record(&app, &owner.token, json!({ "patient_id": 9999, "diagnosis": "Check-up" })).await;
        response.assert_status_not_found();
        Ok(())
    }

    #[sqlx::test]
    async fn test_only_author_or_manager_edits(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let author = app.staff_member(&owner, "author@example.com", "DOCTOR").await;
        let colleague = app.staff_member(&owner, "colleague@example.com", "DOCTOR").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let weight = attribute(&app, &owner.token, "Weight", "kg").await;

        let created: Value = record(
            &app,
            &author,
            json!({
                "patient_id": patient,
                "diagnosis": "Sprained ankle",
                "measurements": [{ "attribute_id": weight, "value": "70" }]
            }),
        )
        .await
        .json();
        let id = created["id"].as_i64().unwrap();

        app.server
            .patch(&format!("/records/{}", id))
            .add_header(authorization(), bearer(&colleague))
            .json(&json!({ "notes": "not mine" }))
            .await
            .assert_status_forbidden();

        let response = app
            .server
            .patch(&format!("/records/{}", id))
            .add_header(authorization(), bearer(&author))
            .json(&json!({ "notes": "Ice twice a day", "measurements": [] }))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["notes"], "Ice twice a day");
        assert_eq!(updated["diagnosis"], "Sprained ankle");
        assert_eq!(updated["measurements"].as_array().unwrap().len(), 0);

        let response = app
            .server
            .patch(&format!("/records/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "diagnosis": "Ankle fracture" }))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["diagnosis"], "Ankle fracture");
        Ok(())
    }

    #[sqlx::test]
    async fn test_patient_history_and_delete(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let nurse = app.staff_member(&owner, "nurse@example.com", "NURSE").await;
        let desk = app.staff_member(&owner, "desk@example.com", "RECEPTIONIST").await;
        let patient = app.patient(&owner.token, "Anna").await;

        let first: Value = record(
            &app,
            &nurse,
            json!({ "patient_id": patient, "diagnosis": "Fever", "recorded_at": "2025-01-10T09:00:00Z" }),
        )
        .await
        .json();
        let second: Value = record(
            &app,
            &nurse,
            json!({ "patient_id": patient, "diagnosis": "Follow-up", "recorded_at": "2025-02-10T09:00:00Z" }),
        )
        .await
        .json();

        let history: Value = app
            .server
            .get(&format!("/patients/{}/records", patient))
            .add_header(authorization(), bearer(&nurse))
            .await
            .json();
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["id"], second["id"]);
        assert_eq!(history[1]["id"], first["id"]);

        // clinical data is not for the front desk
        app.server
            .get(&format!("/patients/{}/records", patient))
            .add_header(authorization(), bearer(&desk))
            .await
            .assert_status_forbidden();
        app.server
            .get(&format!("/records/{}", first["id"]))
            .add_header(authorization(), bearer(&desk))
            .await
            .assert_status_forbidden();

        // nurses write records but do not delete them
        app.server
            .delete(&format!("/records/{}", first["id"]))
            .add_header(authorization(), bearer(&nurse))
            .await
            .assert_status_forbidden();
        app.server
            .delete(&format!("/records/{}", first["id"]))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = app
            .server
            .get(&format!("/records/{}", first["id"]))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "RECORD_NOT_FOUND");

        let history: Value = app
            .server
            .get(&format!("/patients/{}/records", patient))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(history.as_array().unwrap().len(), 1);
        Ok(())
    }

    #[sqlx::test]
    async fn test_records_are_clinic_scoped(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let other = app.owner("other@example.com", "Other Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;

        let created: Value = record(&app, &owner.token, json!({ "patient_id": patient, "diagnosis": "Fever" }))
            .await
            .json();

        app.server
            .get(&format!("/records/{}", created["id"]))
            .add_header(authorization(), bearer(&other.token))
            .await
            .assert_status_not_found();

        let response = record(&app, &other.token, json!({ "patient_id": patient, "diagnosis": "Fever" })).await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "PATIENT_NOT_FOUND");
        Ok(())
    }
}
