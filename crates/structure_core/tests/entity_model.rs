use structure_core::{Client, Entity, User};

#[test]
fn new_entities_are_transient_with_unloaded_relations() {
    let client = Client::new("Acme");
    assert_eq!(client.id, 0);
    assert!(client.is_transient());
    assert_eq!(client.changed_date, None);
    assert!(client.users.is_empty());

    let user = User::new(3, "alice").with_email("alice@acme.test");
    assert!(user.is_transient());
    assert_eq!(user.client_id, 3);
    assert_eq!(user.email.as_deref(), Some("alice@acme.test"));
    assert_eq!(user.client, None);
}

#[test]
fn column_metadata_matches_bound_values() {
    let user = User::new(3, "alice");
    assert_eq!(User::COLUMNS.len(), user.column_values().len());
    assert_eq!(Client::COLUMNS.len(), Client::new("x").column_values().len());

    assert!(User::has_column("id"));
    assert!(User::has_column("changed_date"));
    assert!(User::has_column("email"));
    assert!(!User::has_column("name"));
}

#[test]
fn clear_relations_unloads_navigation_fields() {
    let mut client = Client::new("Acme");
    client.users.push(User::new(1, "alice"));
    client.clear_relations();
    assert!(client.users.is_empty());

    let mut user = User::new(1, "alice");
    user.client = Some(Client::new("Acme"));
    user.clear_relations();
    assert_eq!(user.client, None);
}

#[test]
fn serialization_uses_field_names_and_defaults_relations() {
    let mut client = Client::new("Acme");
    client.id = 5;
    client.changed_date = Some(1_700_000_000_000);

    let json = serde_json::to_value(&client).unwrap();
    assert_eq!(json["id"], 5);
    assert_eq!(json["name"], "Acme");
    assert_eq!(json["changed_date"], 1_700_000_000_000_i64);
    assert_eq!(json["users"], serde_json::json!([]));

    let decoded: User = serde_json::from_value(serde_json::json!({
        "id": 9,
        "client_id": 5,
        "user_name": "alice",
        "email": null,
        "changed_date": null
    }))
    .unwrap();
    assert_eq!(decoded.client, None);
    assert_eq!(decoded.user_name, "alice");
}
