//! A users table with a table-specific record type, its identities, and the
//! database registry wiring them together.

use std::sync::Arc;

use asupersync::runtime::RuntimeBuilder;
use rowmodel::prelude::*;
use rowmodel::{Criteria, ResultSet, VALIDATION_ERROR};
use rowmodel_memory::MemoryEngine;
use rowmodel_schema::TimestampEncoding;
use serde_json::json;

fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap()
}

struct UserRecord(Record<MemoryEngine>);

impl Entity for UserRecord {
    type Engine = MemoryEngine;

    fn from_record(record: Record<MemoryEngine>) -> Self {
        UserRecord(record)
    }

    fn record(&self) -> &Record<MemoryEngine> {
        &self.0
    }

    fn record_mut(&mut self) -> &mut Record<MemoryEngine> {
        &mut self.0
    }

    fn into_record(self) -> Record<MemoryEngine> {
        self.0
    }
}

// Stand-in digest; the record type only cares that it round-trips.
fn digest(password: &str) -> String {
    format!("digest:{}", password.chars().rev().collect::<String>())
}

impl UserRecord {
    fn set_password(&mut self, password: &str) {
        self.0
            .set("passwordHash", json!(digest(password)))
            .unwrap();
    }

    fn check_password(&self, password: &str) -> bool {
        self.0
            .get_path("passwordHash")
            .and_then(Value::as_str)
            .is_some_and(|hash| hash == digest(password))
    }

    fn sign_for_token(&self) -> Value {
        self.0.render_secure()
    }

    async fn identities(
        &self,
        cx: &Cx,
        identities: &Table<MemoryEngine>,
    ) -> Outcome<ResultSet<Record<MemoryEngine>>, Error> {
        let Some(id) = self.0.id() else {
            return Outcome::Ok(ResultSet::default());
        };
        identities
            .find_where(cx, Criteria::new().eq("userId", id.clone()))
            .await
    }
}

fn users_table(db: &Database<MemoryEngine>) -> Table<MemoryEngine, UserRecord> {
    let nullable_string = || field::string().nullable();
    let timestamp = || field::date().nullable().timestamp(TimestampEncoding::Unix);

    db.table("users")
        .field("id", field::number())
        .field("email", field::string())
        .field("firstName", nullable_string())
        .field("lastName", nullable_string())
        .field("passwordHash", nullable_string())
        .field("stripeCustomerId", nullable_string())
        .field("phoneNumber", nullable_string())
        .field("countryCode", nullable_string())
        .field(
            "activationCode",
            field::string().default_with("generates a uuid v4", field::uuid_v4),
        )
        .field("accountBalance", field::number().default_value(json!(0)))
        .field("createdAt", timestamp())
        .field("updatedAt", timestamp())
        .field("deletedAt", timestamp())
        .insecure_keys([
            "passwordHash",
            "activationCode",
            "accountBalance",
            "stripeCustomerId",
            "phoneNumber",
            "countryCode",
        ])
        .entity::<UserRecord>()
        .build()
}

fn identities_table(db: &Database<MemoryEngine>) -> Table<MemoryEngine> {
    db.table("identities")
        .field("id", field::number())
        .field("userId", field::number())
        .field(
            "provider",
            field::string()
                .required()
                .valid([json!("google"), json!("facebook")]),
        )
        .field("token", field::string())
        .field("refreshToken", field::string())
        .field("expiration", field::date())
        .insecure_keys(["token", "refreshToken"])
        .build()
}

fn database() -> Database<MemoryEngine> {
    let db = Database::new(
        Arc::new(MemoryEngine::new()),
        DbConfig::new().database("users_test"),
    );
    db.register(&users_table(&db)).unwrap();
    db.register(&identities_table(&db)).unwrap();
    db
}

#[test]
fn registry_hands_out_typed_tables() {
    let db = database();
    assert_eq!(
        db.table_names(),
        vec!["identities".to_string(), "users".to_string()]
    );

    let users = db.get::<UserRecord>("users").unwrap();
    assert_eq!(users.insecure_keys().len(), 6);
    assert!(db.get::<Record<MemoryEngine>>("users").is_none());
    assert!(db.get::<Record<MemoryEngine>>("identities").is_some());
    assert!(db.records("users").is_some());
}

#[test]
fn save_fills_defaults_and_secure_render_hides_them() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let db = database();
    let users = db.get::<UserRecord>("users").unwrap();

    rt.block_on(async {
        let mut user = users.build(attrs(json!({
            "email": "ann@example.com",
            "firstName": "Ann",
            "lastName": null,
            "createdAt": 1_700_000_000
        })));
        user.set_password("hunter2");
        unwrap_outcome(user.record_mut().save(&cx).await);

        let record = user.record();
        assert_eq!(record.id(), Some(&json!(1)));
        assert_eq!(record.get()["accountBalance"], json!(0));
        assert_eq!(record.get()["createdAt"], json!("2023-11-14T22:13:20.000Z"));
        assert_eq!(record.get()["lastName"], Value::Null);

        let code = record.get()["activationCode"].as_str().unwrap();
        assert_eq!(code.len(), 36);
        assert_eq!(code.chars().nth(14), Some('4'));

        assert!(user.check_password("hunter2"));
        assert!(!user.check_password("hunter3"));

        let token = user.sign_for_token();
        assert_eq!(
            token,
            json!({
                "id": 1,
                "email": "ann@example.com",
                "firstName": "Ann",
                "lastName": null,
                "createdAt": "2023-11-14T22:13:20.000Z"
            })
        );
        assert!(record.to_json().get("passwordHash").is_some());
    });
}

#[test]
fn each_user_gets_a_distinct_activation_code() {
    let db = database();
    let users = db.get::<UserRecord>("users").unwrap();
    let mut a = users.build(attrs(json!({"email": "a@example.com"})));
    let mut b = users.build(attrs(json!({"email": "b@example.com"})));
    a.record_mut().cast().unwrap();
    b.record_mut().cast().unwrap();
    assert_ne!(
        a.attributes()["activationCode"],
        b.attributes()["activationCode"]
    );
}

#[test]
fn identities_are_found_by_user() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let db = database();
    let users = db.get::<UserRecord>("users").unwrap();
    let identities = db.get::<Record<MemoryEngine>>("identities").unwrap();

    rt.block_on(async {
        let mut user = users.build(attrs(json!({"email": "ann@example.com"})));
        unwrap_outcome(user.record_mut().save(&cx).await);
        let user_id = user.record().id().cloned().unwrap();

        for provider in ["google", "facebook"] {
            let mut identity = identities.build(attrs(json!({
                "userId": user_id,
                "provider": provider,
                "token": "secret"
            })));
            unwrap_outcome(identity.save(&cx).await);
        }
        let mut other = identities.build(attrs(json!({"userId": 99, "provider": "google"})));
        unwrap_outcome(other.save(&cx).await);

        let found = unwrap_outcome(user.identities(&cx, &identities).await);
        assert_eq!(found.len(), 2);
        let google = found
            .find(Shape::new(attrs(json!({"provider": "google"}))))
            .unwrap();
        assert!(google.render_secure().get("token").is_none());

        let unsaved = users.build(Attributes::new());
        let none = unwrap_outcome(unsaved.identities(&cx, &identities).await);
        assert!(none.is_empty());
    });
}

#[test]
fn identity_provider_must_be_known() {
    let db = database();
    let identities = db.get::<Record<MemoryEngine>>("identities").unwrap();

    let err = identities
        .validate(&attrs(json!({"userId": 1, "provider": "github"})))
        .unwrap_err();
    assert_eq!(err.code(), VALIDATION_ERROR);
    let details = err.as_validation().unwrap();
    assert_eq!(
        details.for_path("provider").unwrap().message,
        "\"provider\" must be one of [google, facebook]"
    );

    let err = identities.validate(&attrs(json!({"userId": 1}))).unwrap_err();
    assert_eq!(
        err.to_string(),
        "validation failed: \"provider\" is required"
    );
}

#[test]
fn find_one_returns_the_user_type() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let db = database();
    db.engine().seed(
        "users",
        vec![attrs(json!({"id": 5, "email": "bob@example.com", "passwordHash": digest("pw")}))],
    );
    let users = db.get::<UserRecord>("users").unwrap();

    rt.block_on(async {
        let bob = unwrap_outcome(
            users
                .find_one(&cx, &attrs(json!({"email": "bob@example.com"})), true)
                .await,
        )
        .unwrap();
        assert!(bob.check_password("pw"));
        assert!(!bob.record().is_new());

        match users
            .find_one(&cx, &attrs(json!({"email": "nobody@example.com"})), true)
            .await
        {
            Outcome::Err(e) => assert!(e.is_not_found()),
            Outcome::Ok(_) => panic!("expected NOT_FOUND"),
            Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
            Outcome::Panicked(p) => panic!("panicked: {p:?}"),
        }
    });
}
