//! Integration tests for patients and appointments
//!
//! Covers:
//! - /patients CRUD, search and tenant isolation
//! - /appointments scheduling, conflicts and status transitions

mod common;

#[cfg(test)]
mod patient_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    // ============================================================
    // Patients
    // ============================================================

    #[sqlx::test]
    async fn test_create_and_get_patient(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;

        let response = app
            .server
            .post("/patients")
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({
                "first_name": "Mario",
                "last_name": "Rossi",
                "date_of_birth": "1980-05-17",
                "gender": "MALE",
                "email": "mario@example.com",
                "phone": "+39 02 1234567"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        let id = created["id"].as_i64().unwrap();

        let response = app
            .server
            .get(&format!("/patients/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_ok();
        let patient: Value = response.json();
        assert_eq!(patient["last_name"], "Rossi");
        assert_eq!(patient["date_of_birth"], "1980-05-17");
        Ok(())
    }

    #[sqlx::test]
    async fn test_patient_validation(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let tomorrow = (Utc::now() + Duration::days(2)).date_naive();

        let response = app
            .server
            .post("/patients")
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({
                "first_name": "Future",
                "last_name": "Baby",
                "date_of_birth": tomorrow.to_string()
            }))
            .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_DATE_OF_BIRTH");

        let response = app
            .server
            .post("/patients")
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "first_name": "  ", "last_name": "Blank" }))
            .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        Ok(())
    }

    #[sqlx::test]
    async fn test_search_patients(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        app.patient(&owner.token, "Anna").await;
        app.patient(&owner.token, "Annabel").await;
        app.patient(&owner.token, "Bruno").await;

        let page: Value = app
            .server
            .get("/patients?search=ann")
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(page["total"], 2);

        // wildcards in the term are literal
        let page: Value = app
            .server
            .get("/patients?search=%25")
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(page["total"], 0);

        let page: Value = app
            .server
            .get("/patients?page=2&page_size=2")
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(page["total"], 3);
        assert_eq!(page["page"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        Ok(())
    }

    #[sqlx::test]
    async fn test_patients_are_tenant_scoped(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let first = app.owner("first@example.com", "First").await;
        let second = app.owner("second@example.com", "Second").await;
        let id = app.patient(&first.token, "Private").await;

        let response = app
            .server
            .get(&format!("/patients/{}", id))
            .add_header(authorization(), bearer(&second.token))
            .await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "PATIENT_NOT_FOUND");

        let page: Value = app
            .server
            .get("/patients")
            .add_header(authorization(), bearer(&second.token))
            .await
            .json();
        assert_eq!(page["total"], 0);
        Ok(())
    }

    #[sqlx::test]
    async fn test_update_and_delete_patient(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let nurse = app.staff_member(&owner, "nurse@example.com", "NURSE").await;
        let id = app.patient(&owner.token, "Lucia").await;

        let response = app
            .server
            .patch(&format!("/patients/{}", id))
            .add_header(authorization(), bearer(&nurse))
            .json(&json!({ "notes": "Allergic to penicillin" }))
            .await;
        response.assert_status_ok();
        let patient: Value = response.json();
        assert_eq!(patient["notes"], "Allergic to penicillin");
        assert_eq!(patient["first_name"], "Lucia");

        // nurses are not front desk
        app.server
            .delete(&format!("/patients/{}", id))
            .add_header(authorization(), bearer(&nurse))
            .await
            .assert_status_forbidden();

        app.server
            .delete(&format!("/patients/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.server
            .get(&format!("/patients/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status_not_found();
        Ok(())
    }

    // ============================================================
    // Appointments
    // ============================================================

    async fn book(app: &TestApp, token: &str, patient_id: i64, staff_id: i64, at: chrono::DateTime<Utc>, minutes: i64) -> axum_test::TestResponse {
        app.server
            .post("/appointments")
            .add_header(authorization(), bearer(token))
            .json(&json!({
                "patient_id": patient_id,
                "staff_id": staff_id,
                "scheduled_at": at,
                "duration_minutes": minutes,
                "reason": "Check-up"
            }))
            .await
    }

    fn tomorrow_at(hour: u32) -> chrono::DateTime<Utc> {
        let day = (Utc::now() + Duration::days(1)).date_naive();
        day.and_hms_opt(hour, 0, 0).unwrap().and_utc()
    }

    #[sqlx::test]
    async fn test_book_appointment_and_detect_conflicts(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;

        let response = book(&app, &owner.token, patient, owner.staff_id, tomorrow_at(9), 30).await;
        response.assert_status(StatusCode::CREATED);
        let appointment: Value = response.json();
        assert_eq!(appointment["status"], "SCHEDULED");

        // overlapping slot
        let response = book(
            &app,
            &owner.token,
            patient,
            owner.staff_id,
            tomorrow_at(9) + Duration::minutes(15),
            30,
        )
        .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "APPOINTMENT_CONFLICT");

        // back to back is fine
        book(
            &app,
            &owner.token,
            patient,
            owner.staff_id,
            tomorrow_at(9) + Duration::minutes(30),
            30,
        )
        .await
        .assert_status(StatusCode::CREATED);
        Ok(())
    }

    #[sqlx::test]
    async fn test_cancelled_appointment_frees_the_slot(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;

        let appointment: Value = book(&app, &owner.token, patient, owner.staff_id, tomorrow_at(10), 60)
            .await
            .json();
        let id = appointment["id"].as_i64().unwrap();

        let response = app
            .server
            .post(&format!("/appointments/{}/status", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "status": "CANCELLED" }))
            .await;
        response.assert_status_ok();
        let cancelled: Value = response.json();
        assert_eq!(cancelled["status"], "CANCELLED");

        book(&app, &owner.token, patient, owner.staff_id, tomorrow_at(10), 60)
            .await
            .assert_status(StatusCode::CREATED);

        // terminal states do not move
        let response = app
            .server
            .post(&format!("/appointments/{}/status", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "status": "COMPLETED" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");

        // nor can they be edited
        let response = app
            .server
            .patch(&format!("/appointments/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "notes": "too late" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "APPOINTMENT_NOT_EDITABLE");
        Ok(())
    }

    #[sqlx::test]
    async fn test_reschedule_checks_conflicts_but_not_itself(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;

        let first: Value = book(&app, &owner.token, patient, owner.staff_id, tomorrow_at(9), 30)
            .await
            .json();
        book(&app, &owner.token, patient, owner.staff_id, tomorrow_at(11), 30)
            .await
            .assert_status(StatusCode::CREATED);
        let id = first["id"].as_i64().unwrap();

        // stretching over its own slot is fine
        let response = app
            .server
            .patch(&format!("/appointments/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "duration_minutes": 45 }))
            .await;
        response.assert_status_ok();
        let updated: Value = response.json();
        assert_eq!(updated["duration_minutes"], 45);

        // moving onto the other appointment is not
        let response = app
            .server
            .patch(&format!("/appointments/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .json(&json!({ "scheduled_at": tomorrow_at(11) }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        Ok(())
    }

    #[sqlx::test]
    async fn test_appointment_rules(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let other = app.owner("other@example.com", "Other Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;

        let response = book(&app, &owner.token, patient, owner.staff_id, tomorrow_at(9), 3).await;
        response.assert_status_bad_request();

        let response = book(&app, &owner.token, patient, owner.staff_id, tomorrow_at(9), 481).await;
        response.assert_status_bad_request();

        let response = book(&app, &owner.token, 9999, owner.staff_id, tomorrow_at(9), 30).await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "PATIENT_NOT_FOUND");

        // staff of another clinic
        let response = book(&app, &owner.token, patient, other.staff_id, tomorrow_at(9), 30).await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "STAFF_NOT_FOUND");
        Ok(())
    }

    #[sqlx::test]
    async fn test_deactivated_staff_cannot_be_booked(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let doctor = app.staff_member(&owner, "doctor@example.com", "DOCTOR").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let me: Value = app
            .server
            .get("/auth/me")
            .add_header(authorization(), bearer(&doctor))
            .await
            .json();
        let doctor_id = me["staff"]["id"].as_i64().unwrap();

        app.server
            .delete(&format!("/staff/{}", doctor_id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = book(&app, &owner.token, patient, doctor_id, tomorrow_at(9), 30).await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["code"], "STAFF_INACTIVE");
        Ok(())
    }

    #[sqlx::test]
    async fn test_list_appointments_filters(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let anna = app.patient(&owner.token, "Anna").await;
        let bruno = app.patient(&owner.token, "Bruno").await;

        book(&app, &owner.token, anna, owner.staff_id, tomorrow_at(8), 30).await;
        book(&app, &owner.token, bruno, owner.staff_id, tomorrow_at(12), 30).await;

        let page: Value = app
            .server
            .get(&format!("/appointments?patient_id={}", bruno))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["patient_id"], bruno);

        let page: Value = app
            .server
            .get("/appointments?status=SCHEDULED")
            .add_header(authorization(), bearer(&owner.token))
            .await
            .json();
        assert_eq!(page["total"], 2);
        Ok(())
    }

    #[sqlx::test]
    async fn test_delete_appointment(pool: SqlitePool) -> sqlx::Result<()> {
        let app = create_test_app(pool);
        let owner = app.owner("owner@example.com", "Sunrise Clinic").await;
        let patient = app.patient(&owner.token, "Anna").await;
        let appointment: Value = book(&app, &owner.token, patient, owner.staff_id, tomorrow_at(9), 30)
            .await
            .json();
        let id = appointment["id"].as_i64().unwrap();

        app.server
            .delete(&format!("/appointments/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = app
            .server
            .get(&format!("/appointments/{}", id))
            .add_header(authorization(), bearer(&owner.token))
            .await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["code"], "APPOINTMENT_NOT_FOUND");
        Ok(())
    }
}
