//! Integration tests for inventory and billing
//!
//! Covers:
//! - /medicines CRUD, low stock filter and stock adjustments
//! - /invoices lifecycle: draft, items, issue (stock out), pay, cancel (restock)

mod common;

#[cfg(test)]
mod billing_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    async fn stock_of(app: &TestApp, token: &str, medicine_id: i64) -> i64 {
        let medicine: Value = app
            .server
            .get(&format!("/medicines/{}", medicine_id))
            .add_header(authorization(), bearer(token))
            .await
            .json();
        medicine["stock_quantity"].as_i64().unwrap()
    }

    async fn draft(app: &TestApp, token: &str, patient_id: i64, items: Value) -> axum_test::TestResponse {
        app.server
            .post("/invoices")
            .add_header(authorization(), bearer(token))
            .json(&json!({ "patient_id": patient_id, "items": items }))
            .await
    }

    // ============================================================
    // Medicines
    // ============================================================

    #[sqlx::test]
    async fn test_medicine_names_are_unique_ignoring_case(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        app.medicine(&owner.token, "Amoxicillin", 850, 10).await;

        let response = app
            .server
            .post("/medicines")
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "name": "AMOXICILLIN", "unit": "box", "unit_price_cents": 900 }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "DUPLICATE_MEDICINE");

        // another clinic may use the same name
        let other = app.owner("other@example.com", "Other Clinic").await;
        app.medicine(&other.token, "Amoxicillin", 850, 10).await;
        Ok(())
    }

    #[sqlx::test]
    async fn test_stock_adjustments(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let id = app.medicine(&owner.token, "Ibuprofen", 500, 5).await;

        let response = app
            .server
            .post(&format!("/medicines/{}/stock", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "delta": -4, "reason": "dispensed" }))
            .await;
        response.assert_status_ok();
        let medicine: Value = response.json();
        assert_eq!(medicine["stock_quantity"], 1);
        assert_eq!(medicine["low_stock"], true);

        let response = app
            .server
            .post(&format!("/medicines/{}/stock", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "delta": -2 }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(stock_of(&app, &owner.token, id).await, 1);

        let page: Value = app
            .server
            .get("/medicines?low_stock=true")
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(page["total"], 1);
        Ok(())
    }

    #[sqlx::test]
    async fn test_medicine_writes_need_manager(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let desk = app.staff_member(&owner, "desk@example.com", "RECEPTIONIST").await;
        let id = app.medicine(&owner.token, "Paracetamol", 300, 20).await;

        app.server
            .patch(&format!("/medicines/{}", id))
            .add_header(authorization(), bearer(&desk))
            .json(&json!({ "unit_price_cents": 1 }))
            .await
            .assert_status_forbidden();

        let response = app
            .server
            .patch(&format!("/medicines/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "unit_price_cents": 350 }))
            .await;
        response.assert_status_ok();
        let medicine: Value = response.json();
        assert_eq!(medicine["unit_price_cents"], 350);

        app.server
            .delete(&format!("/medicines/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let response = app
            .server
            .get(&format!("/medicines/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "MEDICINE_NOT_FOUND");
        Ok(())
    }

    // ============================================================
    // Invoices
    // ============================================================

    #[sqlx::test]
    async fn test_invoice_lifecycle(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let medicine = app.medicine(&owner.token, "Amoxicillin", 850, 10).await;

        let response = draft(
            &app,
            &owner.token,
            patient,
            json!([
                { "description": "Visit", "quantity": 1, "unit_price_cents": 5000 },
                { "medicine_id": medicine, "quantity": 2 }
            ]),
        )
        .await;
        response.assert_status(StatusCode::CREATED);
        let invoice: Value = response.json();
        assert_eq!(invoice["status"], "DRAFT");
        assert_eq!(invoice["invoice_number"], "INV-000001");
        assert_eq!(invoice["total_cents"], 5000 + 2 * 850);
        assert_eq!(invoice["items"][1]["description"], "Amoxicillin");
        let id = invoice["id"].as_i64().unwrap();

        // a draft is not payable
        let response = app
            .server
            .post(&format!("/invoices/{}/pay", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");

        let response = app
            .server
            .post(&format!("/invoices/{}/issue", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_ok();
        let issued: Value = response.json();
        assert_eq!(issued["status"], "ISSUED");
        assert!(!issued["issued_at"].is_null());
        assert_eq!(stock_of(&app, &owner.token, medicine).await, 8);

        // issued invoices are frozen
        let response = app
            .server
            .put(&format!("/invoices/{}/items", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "items": [{ "description": "x", "quantity": 1, "unit_price_cents": 1 }] }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVOICE_NOT_EDITABLE");

        let response = app
            .server
            .post(&format!("/invoices/{}/pay", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_ok();
        let paid: Value = response.json();
        assert_eq!(paid["status"], "PAID");

        // paid is terminal
        app.server
            .post(&format!("/invoices/{}/cancel", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::CONFLICT);
        Ok(())
    }

    #[sqlx::test]
    async fn test_issue_with_insufficient_stock_changes_nothing(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let plenty = app.medicine(&owner.token, "Plenty", 100, 50).await;
        let scarce = app.medicine(&owner.token, "Scarce", 100, 1).await;

        let invoice: Value = draft(
            &app,
            &owner.token,
            patient,
            json!([
                { "medicine_id": plenty, "quantity": 5 },
                { "medicine_id": scarce, "quantity": 3 }
            ]),
        )
        .await
        .json();
        let id = invoice["id"].as_i64().unwrap();

        let response = app
            .server
            .post(&format!("/invoices/{}/issue", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");

        // rolled back: no stock moved, invoice still a draft
        assert_eq!(stock_of(&app, &owner.token, plenty).await, 50);
        assert_eq!(stock_of(&app, &owner.token, scarce).await, 1);
        let invoice: Value = app
            .server
            .get(&format!("/invoices/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(invoice["status"], "DRAFT");
        Ok(())
    }

    #[sqlx::test]
    async fn test_cancel_issued_invoice_restocks(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let medicine = app.medicine(&owner.token, "Amoxicillin", 850, 10).await;

        let invoice: Value = draft(&app, &owner.token, patient, json!([{ "medicine_id": medicine, "quantity": 4 }]))
            .await
            .json();
        let id = invoice["id"].as_i64().unwrap();

        app.server
            .post(&format!("/invoices/{}/issue", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status_ok();
        assert_eq!(stock_of(&app, &owner.token, medicine).await, 6);

        let response = app
            .server
            .post(&format!("/invoices/{}/cancel", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_ok();
        let cancelled: Value = response.json();
        assert_eq!(cancelled["status"], "CANCELLED");
        assert_eq!(stock_of(&app, &owner.token, medicine).await, 10);
        Ok(())
    }

    #[sqlx::test]
    async fn test_replace_items_and_delete_draft(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;

        let invoice: Value = draft(
            &app,
            &owner.token,
            patient,
            json!([{ "description": "Visit", "quantity": 1, "unit_price_cents": 5000 }]),
        )
        .await
        .json();
        let id = invoice["id"].as_i64().unwrap();

        let response = app
            .server
            .put(&format!("/invoices/{}/items", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "items": [
                { "description": "Visit", "quantity": 1, "unit_price_cents": 4000 },
                { "description": "ECG", "quantity": 2, "unit_price_cents": 1500 }
            ] }))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["total_cents"], 7000);
        assert_eq!(updated["items"].as_array().unwrap().len(), 2);

        app.server
            .delete(&format!("/invoices/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.server
            .get(&format!("/invoices/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status_not_found();

        // numbering keeps going after a deletion
        let next: Value = draft(
            &app,
            &owner.token,
            patient,
            json!([{ "description": "Visit", "quantity": 1, "unit_price_cents": 5000 }]),
        )
        .await
        .json();
        assert_eq!(next["invoice_number"], "INV-000002");
        Ok(())
    }

    #[sqlx::test]
    async fn test_invoice_validation(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let nurse = app.staff_member(&owner, "nurse@example.com", "NURSE").await;

        let response = draft(&app, &owner.token, patient, json!([])).await;
        response.assert_status_bad_request();

        let response = draft(&app, &owner.token, patient, json!([{ "description": "Visit", "quantity": 0, "unit_price_cents": 10 }])).await;
        response.assert_status_bad_request();

        let response = draft(&app, &owner.token, patient, json!([{ "description": "Visit", "quantity": 1 }])).await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_INVOICE_ITEM");

        let response = draft(&app, &owner.token, patient, json!([{ "medicine_id": 9999, "quantity": 1 }])).await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "MEDICINE_NOT_FOUND");

        // billing is front office work
        let response = draft(&app, &nurse, patient, json!([{ "description": "Visit", "quantity": 1, "unit_price_cents": 10 }])).await;
        response.assert_status_forbidden();
        Ok(())
    }

    #[sqlx::test]
    async fn test_invoice_numbers_are_per_clinic(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let first = app.owner("first@example.com", "First").await;
        let second = app.owner("second@example.com", "Second").await;
        let first_patient = app.patient(&first.token, "Anna").await;
        let second_patient = app.patient(&second.token, "Bruno").await;
        let line = json!([{ "description": "Visit", "quantity": 1, "unit_price_cents": 5000 }]);

        draft(&app, &first.token, first_patient, line.clone()).await;
        draft(&app, &first.token, first_patient, line.clone()).await;
        let invoice: Value = draft(&app, &second.token, second_patient, line.clone()).await.json();
        assert_eq!(invoice["invoice_number"], "INV-000001");

        // a patient of another clinic cannot be billed
        let response = draft(&app, &second.token, first_patient, line).await;
        response.assert_status_not_found();

        let page: Value = app
            .server
            .get("/invoices?status=DRAFT")
            .add_header(authorization(), bearer(&first.token))
            .await
            .json();
        assert_eq!(page["total"], 2);
        Ok(())
    }

    #[sqlx::test]
    async fn test_amounts_are_bounded(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;

        // twice this price does not fit in an i64
        let response = draft(
            &app,
            &owner.token,
            patient,
            json!([{ "description": "Visit", "quantity": 2, "unit_price_cents": 4611686018427387904i64 }]),
        )
        .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let response = app
            .server
            .post("/medicines")
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "name": "Gold", "unit": "g", "unit_price_cents": i64::MAX }))
            .await;
        response.assert_status_bad_request();

        let page: Value = app
            .server
            .get("/invoices")
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(page["total"], 0);
        Ok(())
    }

    #[sqlx::test]
    async fn test_stock_delta_is_bounded(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let id = app.medicine(&owner.token, "Ibuprofen", 500, 5).await;

        for delta in [i64::MAX, i64::MIN, 1_000_001] {
            let response = app
                .server
                .post(&format!("/medicines/{}/stock", id))
                .add_header(authorization(), bearer(&owner.token))
                .json(&json!({ "delta": delta }))
                .await;
            response.assert_status_bad_request();
            let body: Value = response.json();
            assert_eq!(body["code"], "VALIDATION_ERROR");
        }
        assert_eq!(stock_of(&app, &owner.token, id).await, 5);

        app.server
            .post(&format!("/medicines/{}/stock", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "delta": 1_000_000 }))
            .await
            .assert_status_ok();
        assert_eq!(stock_of(&app, &owner.token, id).await, 1_000_005);
        Ok(())
    }

    #[sqlx::test]
    async fn test_issue_refuses_deleted_medicine(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let kept = app.medicine(&owner.token, "Kept", 100, 10).await;
        let removed = app.medicine(&owner.token, "Removed", 100, 10).await;

        let invoice: Value = draft(
            &app,
            &owner.token,
            patient,
            json!([
                { "medicine_id": kept, "quantity": 1 },
                { "medicine_id": removed, "quantity": 1 }
            ]),
        )
        .await
        .json();
        let id = invoice["id"].as_i64().unwrap();

        app.server
            .delete(&format!("/medicines/{}", removed))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = app
            .server
            .post(&format!("/invoices/{}/issue", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "MEDICINE_NOT_FOUND");

        // nothing was taken out of stock
        assert_eq!(stock_of(&app, &owner.token, kept).await, 10);
        let removed_stock: i64 = sqlx::query_scalar("SELECT stock_quantity FROM medicines WHERE medicine_id = ?")
            .bind(removed)
            .fetch_one(&app.state.pool)
            .await?;
        assert_eq!(removed_stock, 10);
        Ok(())
    }
}
