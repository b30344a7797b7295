//! End-to-end persistence behavior against the in-memory engine.

mod fixtures;

use fixtures::{
    Address, Country, Customer, Landmark, MemEngine, Order, Tag, engine, run_test, unwrap_outcome,
};
use nestmodel::{Cx, Error, Model, Outcome, Repository, Value};
use std::sync::Arc;

fn repo<M: Model>(engine: &Arc<MemEngine>) -> Repository<M, MemEngine> {
    Repository::new(Arc::clone(engine)).expect("valid relation configuration")
}

#[test]
fn test_country_create_read_update_example() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let countries: Repository<Country, MemEngine> = repo(&engine);

        let created = unwrap_outcome(
            countries
                .create(&cx, &Country::new("Portugal", "pt", "pt_PT"))
                .await,
        );
        assert_eq!(created.id, Some(1));

        let fetched = unwrap_outcome(countries.read(&cx, 1_i64).await);
        assert_eq!(fetched, created);

        // Partial update: only id and name supplied.
        let patch = Country {
            id: Some(1),
            name: Some("Spain".into()),
            country_code: None,
            locale: None,
        };
        unwrap_outcome(countries.update(&cx, &patch).await);

        let after = unwrap_outcome(countries.read(&cx, 1_i64).await);
        assert_eq!(after.name.as_deref(), Some("Spain"));
        assert_eq!(after.country_code.as_deref(), Some("pt"));
        assert_eq!(after.locale.as_deref(), Some("pt_PT"));
    });
}

#[test]
fn test_invalid_create_writes_nothing() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let countries: Repository<Country, MemEngine> = repo(&engine);

        let invalid = Country {
            id: None,
            name: None,                        // required
            country_code: Some("PT".into()),   // fails the pattern
            locale: None,
        };
        let outcome = countries.create(&cx, &invalid).await;
        match outcome {
            Outcome::Err(Error::Validation(e)) => {
                assert!(e.violations.iter().any(|v| v.path == "name"));
                assert!(e.violations.iter().any(|v| v.path == "country_code"));
            }
            other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
        }

        // No partial write happened.
        assert_eq!(engine.row_count("countries"), 0);
        let read_back = countries.read(&cx, 1_i64).await;
        assert!(matches!(read_back, Outcome::Err(Error::NotFound(_))));
    });
}

#[test]
fn test_graph_create_roundtrips_with_generated_keys() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let customers: Repository<Customer, MemEngine> = repo(&engine);

        let draft = Customer {
            name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            address: Some(Address {
                id: None,
                street: Some("Rua Augusta".into()),
                customer_id: None,
            }),
            orders: vec![Order::new("book", 2), Order::new("pen", 1)],
            tags: vec![Tag::new("vip")],
            ..Customer::default()
        };

        let created = unwrap_outcome(customers.create(&cx, &draft).await);
        let id = created.id.expect("generated key");

        // Every node received its generated key and back-reference.
        let address = created.address.as_ref().expect("cascaded address");
        assert!(address.id.is_some());
        assert_eq!(address.customer_id, Some(id));
        assert_eq!(created.orders.len(), 2);
        assert!(created.orders.iter().all(|o| o.customer_id == Some(id)));
        assert!(created.tags[0].id.is_some());
        assert!(created.created_at.is_some());

        // Reading back returns an equal graph.
        let fetched = unwrap_outcome(customers.read(&cx, id).await);
        assert_eq!(fetched, created);
    });
}

#[test]
fn test_update_is_idempotent_aside_from_refresh_stamps() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let customers: Repository<Customer, MemEngine> = repo(&engine);

        let created = unwrap_outcome(
            customers
                .create(
                    &cx,
                    &Customer {
                        name: Some("Ada".into()),
                        orders: vec![Order::new("book", 1)],
                        ..Customer::default()
                    },
                )
                .await,
        );
        let id = created.id.unwrap();

        let snapshot = unwrap_outcome(customers.read(&cx, id).await);
        unwrap_outcome(customers.update(&cx, &snapshot).await);
        let after = unwrap_outcome(customers.read(&cx, id).await);

        // updated_at is declared to always refresh; everything else holds.
        assert_eq!(after.name, snapshot.name);
        assert_eq!(after.email, snapshot.email);
        assert_eq!(after.created_at, snapshot.created_at);
        assert_eq!(after.address, snapshot.address);
        assert_eq!(after.orders, snapshot.orders);
        assert_eq!(after.tags, snapshot.tags);
    });
}

#[test]
fn test_reference_relation_is_never_written_through() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let countries: Repository<Country, MemEngine> = repo(&engine);
        let landmarks: Repository<Landmark, MemEngine> = repo(&engine);

        let portugal = unwrap_outcome(
            countries
                .create(&cx, &Country::new("Portugal", "pt", "pt_PT"))
                .await,
        );
        let country_id = portugal.id.unwrap();

        let created = unwrap_outcome(
            landmarks
                .create(
                    &cx,
                    &Landmark {
                        id: None,
                        title: Some("Belém Tower".into()),
                        country_id: Some(country_id),
                        country: None,
                    },
                )
                .await,
        );

        // Read populates the reference...
        let mut fetched = unwrap_outcome(landmarks.read(&cx, created.id.unwrap()).await);
        assert_eq!(
            fetched.country.as_ref().and_then(|c| c.name.clone()),
            Some("Portugal".into())
        );

        // ...but mutating it in memory and updating the parent leaves the
        // persisted country untouched.
        fetched.title = Some("Torre de Belém".into());
        if let Some(country) = fetched.country.as_mut() {
            country.name = Some("Mutated".into());
        }
        unwrap_outcome(landmarks.update(&cx, &fetched).await);

        let country_after = unwrap_outcome(countries.read(&cx, country_id).await);
        assert_eq!(country_after.name.as_deref(), Some("Portugal"));
    });
}

#[test]
fn test_delete_cascade_laws() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let customers: Repository<Customer, MemEngine> = repo(&engine);
        let orders: Repository<Order, MemEngine> = repo(&engine);
        let tags: Repository<Tag, MemEngine> = repo(&engine);

        let created = unwrap_outcome(
            customers
                .create(
                    &cx,
                    &Customer {
                        name: Some("Ada".into()),
                        address: Some(Address {
                            id: None,
                            street: Some("Rua Augusta".into()),
                            customer_id: None,
                        }),
                        orders: vec![Order::new("book", 1)],
                        tags: vec![Tag::new("vip")],
                        ..Customer::default()
                    },
                )
                .await,
        );
        let id = created.id.unwrap();
        let order_id = created.orders[0].id.unwrap();
        let tag_id = created.tags[0].id.unwrap();

        let last = unwrap_outcome(customers.delete(&cx, id).await);
        assert_eq!(last.name.as_deref(), Some("Ada"));

        // delete_cascade=Cascade relations are gone with the root.
        let order_gone = orders.read(&cx, order_id).await;
        assert!(matches!(order_gone, Outcome::Err(Error::NotFound(_))));
        assert_eq!(engine.row_count("addresses"), 0);

        // delete_cascade=None targets stay readable; junction rows do not.
        let tag_alive = unwrap_outcome(tags.read(&cx, tag_id).await);
        assert_eq!(tag_alive.label.as_deref(), Some("vip"));
        assert_eq!(engine.row_count("customer_tags"), 0);
    });
}

#[test]
fn test_unique_constraint_surfaces_conflict() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let countries: Repository<Country, MemEngine> = repo(&engine);

        unwrap_outcome(
            countries
                .create(&cx, &Country::new("Portugal", "pt", "pt_PT"))
                .await,
        );
        let outcome = countries
            .create(&cx, &Country::new("Pirate Cove", "pt", "pt_PT"))
            .await;
        match outcome {
            Outcome::Err(Error::Conflict(e)) => {
                assert_eq!(e.table, "countries");
                assert_eq!(e.constraint, "country_code");
            }
            other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
        }
    });
}

#[test]
fn test_update_without_key_is_an_internal_error() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let countries: Repository<Country, MemEngine> = repo(&engine);
        let outcome = countries
            .update(&cx, &Country::new("Portugal", "pt", "pt_PT"))
            .await;
        assert!(matches!(outcome, Outcome::Err(Error::Internal(_))));
    });
}

#[test]
fn test_bulk_create_reports_indexed_violations_without_writing() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let countries: Repository<Country, MemEngine> = repo(&engine);

        let batch = vec![
            Country::new("Portugal", "pt", "pt_PT"),
            Country {
                id: None,
                name: None,
                country_code: Some("es".into()),
                locale: None,
            },
            Country {
                id: None,
                name: Some("France".into()),
                country_code: Some("FRA".into()),
                locale: None,
            },
        ];
        let outcome = countries.create_all(&cx, &batch).await;
        match outcome {
            Outcome::Err(Error::Validation(e)) => {
                let paths: Vec<&str> = e.violations.iter().map(|v| v.path.as_str()).collect();
                assert!(paths.contains(&"[1].name"));
                assert!(paths.contains(&"[2].country_code"));
            }
            other => std::panic::panic_any(format!("unexpected outcome: {other:?}")),
        }
        assert_eq!(engine.row_count("countries"), 0);
    });
}

#[test]
fn test_bulk_roundtrip() {
    let engine = Arc::new(engine());
    let cx = Cx::for_testing();
    run_test(async {
        let countries: Repository<Country, MemEngine> = repo(&engine);

        let created = unwrap_outcome(
            countries
                .create_all(
                    &cx,
                    &[
                        Country::new("Portugal", "pt", "pt_PT"),
                        Country::new("Spain", "es", "es_ES"),
                    ],
                )
                .await,
        );
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|c| c.id.is_some()));

        let all = unwrap_outcome(countries.read_all(&cx).await);
        assert_eq!(all.len(), 2);

        let ids: Vec<Value> = created.iter().map(Model::primary_key).collect();
        let removed = unwrap_outcome(countries.delete_all(&cx, ids).await);
        assert_eq!(removed.len(), 2);
        assert_eq!(engine.row_count("countries"), 0);
    });
}

#[test]
fn test_model_serialization_shape() {
    let country = Country::new("Portugal", "pt", "pt_PT");
    let json = serde_json::to_value(&country).unwrap();
    assert_eq!(json["name"], "Portugal");
    assert_eq!(json["country_code"], "pt");
    assert!(json["id"].is_null());
}
