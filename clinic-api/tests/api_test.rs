use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use clinic_api::{router, Services};
use clinic_core::auth::generate_token;
use clinic_core::{ClinicContext, Config, MemoryStore};

struct TestApp {
    app: Router,
    ctx: ClinicContext,
}

impl TestApp {
    fn new() -> Self {
        let ctx = ClinicContext::with_store(Config::default(), Arc::new(MemoryStore::new()));
        TestApp {
            app: router(Services::new(ctx.clone())),
            ctx,
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Registers and logs in, returning (user id, token).
    async fn sign_up(&self, name: &str, email: &str) -> (i64, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        (id, body["data"]["token"].as_str().unwrap().to_string())
    }

    async fn admin(&self) -> (i64, String) {
        let (id, token) = self.sign_up("Admin", "admin@example.com").await;
        self.ctx.store.set_user_admin(id, true).await.unwrap();
        (id, token)
    }
}

fn doctor_fields(email: &str, phone: &str) -> Value {
    json!({
        "firstName": "Gregory",
        "lastName": "House",
        "phone": phone,
        "email": email,
        "address": "Princeton-Plainsboro",
        "specialization": "diagnostics",
        "experienceYears": 20,
        "feePerConsultation": 900,
        "workingHours": { "start": "09:00", "end": "05:00 PM" }
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_token_failures() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, body) = app.get("/users/me", "garbage").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (id, _) = app.sign_up("Pat", "pat@example.com").await;
    let expired = generate_token(&app.ctx.tokens, id, chrono::Duration::seconds(-60)).unwrap();
    let (status, body) = app.get("/users/me", &expired).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "token_expired");
}

#[tokio::test]
async fn test_registration_errors() {
    let app = TestApp::new();
    app.sign_up("Pat", "pat@example.com").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "name": "Pat", "email": "PAT@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, body) = app
        .send(Method::POST, "/auth/register", None, Some(json!({ "name": "Pat" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "pat@example.com", "password": "wrong-one" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect password");
}

#[tokio::test]
async fn test_me_hides_password_hash() {
    let app = TestApp::new();
    let (id, token) = app.sign_up("Pat", "pat@example.com").await;
    let (status, body) = app.get("/users/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);
    assert!(body["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_external_login_upserts() {
    let app = TestApp::new();
    let identity = json!({ "email": "ext@example.com", "name": "Ext", "externalId": "g-1" });

    let (status, body) = app
        .send(Method::POST, "/auth/external-register", None, Some(identity.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["isVerified"], true);
    let id = body["data"]["user"]["id"].clone();

    let (status, body) = app
        .send(Method::POST, "/auth/external-login", None, Some(identity))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["id"], id);
    assert_eq!(body["data"]["created"], false);
}

#[tokio::test]
async fn test_role_gates() {
    let app = TestApp::new();
    let (_, patient) = app.sign_up("Pat", "pat@example.com").await;

    let (status, body) = app.get("/admin/users", &patient).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, _) = app.post("/doctor/appointments", &patient, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admins pass every gate.
    let (_, admin) = app.admin().await;
    let (status, body) = app.get("/admin/users?page=1&limit=1", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["pages"], 2);
}

#[tokio::test]
async fn test_out_of_range_page_returns_empty_page() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;

    for uri in [
        "/doctors?page=9223372036854775807",
        "/admin/doctors?page=9223372036854775807&limit=9223372036854775807",
        "/admin/users?page=9223372036854775807",
    ] {
        let (status, body) = app.get(uri, &admin).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", uri, body);
        assert!(body["data"]["items"].as_array().unwrap().is_empty());
        assert_eq!(body["data"]["page"], 1_000_000);
    }
}

#[tokio::test]
async fn test_blocking_takes_effect_immediately() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (patient_id, patient) = app.sign_up("Pat", "pat@example.com").await;

    let (status, body) = app.post("/admin/users/block", &admin, json!({ "userId": patient_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User blocked successfully");

    let (status, _) = app.get("/users/me", &patient).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "pat@example.com", "password": "secret1" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/admin/users/block", &admin, json!({ "userId": patient_id })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get("/notifications", &patient).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["notifications"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_booking_flow() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (_, doctor) = app.sign_up("Greg", "greg@example.com").await;
    let (_, patient) = app.sign_up("Pat Smith", "pat@example.com").await;

    // Application goes to the admins.
    let (status, body) = app
        .post("/doctors/apply", &doctor, doctor_fields("house@example.com", "555-0100"))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["workingHours"]["end"], "17:00");
    let doctor_id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = app.get("/notifications", &admin).await;
    assert_eq!(body["data"]["notifications"][0]["type"], "apply-doctor-request");

    // Not bookable until approved.
    let slot = json!({ "doctorId": doctor_id, "date": "2030-01-15", "time": "10:00" });
    let (status, _) = app.post("/appointments/check-availability", &patient, slot.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/admin/doctors/status", &admin, json!({ "doctorId": doctor_id, "status": "approved" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let (_, body) = app.get("/doctors?specialization=diagnostics", &patient).await;
    assert_eq!(body["data"]["total"], 1);
    let (_, body) = app.get("/admin/doctors?status=pending", &admin).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, body) = app.post("/appointments/check-availability", &patient, slot.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isAvailable"], true);

    // 17:00 is the last bookable slot, 17:30 is out of hours.
    let (status, _) = app
        .post(
            "/appointments/book",
            &patient,
            json!({ "doctorId": doctor_id, "date": "2030-01-15", "time": "05:00 PM", "reason": "late" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app
        .post(
            "/appointments/book",
            &patient,
            json!({ "doctorId": doctor_id, "date": "2030-01-15", "time": "17:30", "reason": "later" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let booking = json!({ "doctorId": doctor_id, "date": "2030-01-15", "time": "10:00", "reason": "checkup" });
    let (status, body) = app.post("/appointments/book", &patient, booking.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    let appointment_id = body["data"]["id"].as_i64().unwrap();
    let (status, body) = app.post("/appointments/book", &patient, booking).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Appointment slot is already booked");

    let (_, body) = app.post("/appointments/check-availability", &patient, slot).await;
    assert_eq!(body["data"]["isAvailable"], false);
    assert_eq!(body["data"]["conflictingStatus"], "pending");

    // Doctor side.
    let (status, body) = app.post("/doctor/appointments", &doctor, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["patient"]["name"], "Pat Smith");

    let (status, _) = app
        .post(
            "/doctor/appointments/status",
            &doctor,
            json!({ "appointmentId": appointment_id, "status": "completed" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app
        .post(
            "/doctor/appointments/status",
            &doctor,
            json!({ "appointmentId": appointment_id, "status": "confirmed" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Appointment confirmed successfully");
    let (status, body) = app
        .post("/doctor/appointments/complete", &doctor, json!({ "appointmentId": appointment_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");

    // Patient side.
    let (_, body) = app.get("/appointments/mine", &patient).await;
    assert_eq!(body["data"][0]["doctor"]["name"], "Dr. Gregory House");

    let (_, body) = app.get("/notifications", &patient).await;
    let unread = body["data"]["notifications"].as_array().unwrap();
    assert_eq!(unread.len(), 2);
    assert_eq!(unread[0]["type"], "appointment-status-update");
    assert_eq!(unread[0]["onClickPath"], "/appointments");

    let (_, body) = app.post("/notifications/mark-read", &patient, json!({})).await;
    assert!(body["data"]["notifications"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["seenNotifications"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["totalSeenNotifications"], 2);
    let (_, body) = app.post("/notifications/delete-read", &patient, json!({})).await;
    assert!(body["data"]["seenNotifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_approved_identity_conflicts() {
    let app = TestApp::new();
    let (_, admin) = app.admin().await;
    let (_, first) = app.sign_up("First", "first@example.com").await;
    let (_, second) = app.sign_up("Second", "second@example.com").await;

    let (_, body) = app.post("/doctors/apply", &first, doctor_fields("dup@example.com", "111")).await;
    let first_id = body["data"]["id"].as_i64().unwrap();
    let (_, body) = app.post("/doctors/apply", &second, doctor_fields("other@example.com", "111")).await;
    let second_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .post("/admin/doctors/status", &admin, json!({ "doctorId": first_id, "status": "approved" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .post("/admin/doctors/status", &admin, json!({ "doctorId": second_id, "status": "approved" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "A doctor with this email or phone number already exists");

    let (status, _) = app
        .send(Method::DELETE, &format!("/admin/doctors/{}", first_id), Some(admin.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/doctor/profile", &first).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
