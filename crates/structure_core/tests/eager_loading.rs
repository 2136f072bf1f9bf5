use structure_core::db::open_db_in_memory;
use structure_core::{Client, ModelContext, ModelStore, SortOrder, StoreError, User};

fn seed(ctx: &mut ModelContext<'_>) -> (Client, Vec<User>) {
    let mut client = Client::new("Acme");
    ctx.save(&mut client).unwrap();

    let mut users = vec![
        User::new(client.id, "alice").with_email("alice@acme.test"),
        User::new(client.id, "bob"),
    ];
    for user in users.iter_mut() {
        ctx.save(user).unwrap();
    }
    (client, users)
}

#[test]
fn include_populates_collection_and_omission_leaves_it_empty() {
    let mut conn = open_db_in_memory().unwrap();
    let mut ctx = ModelContext::try_new(&mut conn).unwrap();
    let (client, users) = seed(&mut ctx);

    let with_users = ctx.get::<Client>(client.id, &["Users"]).unwrap();
    assert_eq!(with_users.users, users);

    let without_users = ctx.get::<Client>(client.id, &[]).unwrap();
    assert!(without_users.users.is_empty());

    let blank_includes = ctx.get::<Client>(client.id, &["", "  "]).unwrap();
    assert!(blank_includes.users.is_empty());
}

#[test]
fn include_populates_reference() {
    let mut conn = open_db_in_memory().unwrap();
    let mut ctx = ModelContext::try_new(&mut conn).unwrap();
    let (client, users) = seed(&mut ctx);

    let user = ctx.find::<User>(users[0].id, &["client"]).unwrap().unwrap();
    let loaded_client = user.client.expect("client relation should be loaded");
    assert_eq!(loaded_client.id, client.id);
    assert_eq!(loaded_client.name, "Acme");
    assert!(loaded_client.users.is_empty());

    let plain = ctx.find::<User>(users[0].id, &[]).unwrap().unwrap();
    assert_eq!(plain.client, None);
}

#[test]
fn dotted_include_loads_nested_relations() {
    let mut conn = open_db_in_memory().unwrap();
    let mut ctx = ModelContext::try_new(&mut conn).unwrap();
    let (_, users) = seed(&mut ctx);

    let user = ctx.get::<User>(users[1].id, &["Client.Users"]).unwrap();
    let siblings = user.client.unwrap().users;
    let names: Vec<&str> = siblings.iter().map(|u| u.user_name.as_str()).collect();
    assert_eq!(names, ["alice", "bob"]);
}

#[test]
fn included_entities_do_not_leak_into_tracked_lookups() {
    let mut conn = open_db_in_memory().unwrap();
    let mut ctx = ModelContext::try_new(&mut conn).unwrap();
    let (client, _) = seed(&mut ctx);

    ctx.clear_tracked();
    let loaded = ctx.get::<Client>(client.id, &["Users"]).unwrap();
    assert_eq!(loaded.users.len(), 2);
    assert!(ctx.is_tracked::<Client>(client.id));
    let tracked = ctx.find::<Client>(client.id, &[]).unwrap().unwrap();
    assert!(tracked.users.is_empty());

    let mut loaded = loaded;
    loaded.name = "Acme Ltd".to_string();
    ctx.save(&mut loaded).unwrap();
    let cached = ctx.find::<Client>(client.id, &[]).unwrap().unwrap();
    assert_eq!(cached.name, "Acme Ltd");
    assert!(cached.users.is_empty());
}

#[test]
fn unknown_and_malformed_include_paths_fail() {
    let mut conn = open_db_in_memory().unwrap();
    let mut ctx = ModelContext::try_new(&mut conn).unwrap();
    let (client, users) = seed(&mut ctx);

    let err = ctx.get::<Client>(client.id, &["Orders"]).unwrap_err();
    assert!(matches!(
        err,
        StoreError::UnknownInclude { entity: "clients", ref path } if path == "Orders"
    ));

    let err = ctx.get::<User>(users[0].id, &["Client.Orders"]).unwrap_err();
    assert!(matches!(err, StoreError::UnknownInclude { entity: "clients", .. }));

    let err = ctx.find::<Client>(client.id, &["Users..Client"]).unwrap_err();
    assert!(matches!(err, StoreError::InvalidIncludePath(_)));
}

#[test]
fn queryable_composes_filters_ordering_and_paging() {
    let mut conn = open_db_in_memory().unwrap();
    let mut ctx = ModelContext::try_new(&mut conn).unwrap();
    for name in ["delta", "alpha", "charlie", "bravo"] {
        let mut client = Client::new(name);
        ctx.save(&mut client).unwrap();
        ctx.save(&mut User::new(client.id, format!("{name}-admin"))).unwrap();
    }

    let names: Vec<String> = ctx
        .as_queryable::<Client>(&[])
        .order_by("name", SortOrder::Ascending)
        .offset(1)
        .limit(2)
        .fetch_all()
        .unwrap()
        .into_iter()
        .map(|client| client.name)
        .collect();
    assert_eq!(names, ["bravo", "charlie"]);

    let charlie = ctx
        .as_queryable::<Client>(&["Users"])
        .filter_eq("name", "charlie".to_string())
        .single()
        .unwrap();
    assert_eq!(charlie.users.len(), 1);
    assert_eq!(charlie.users[0].user_name, "charlie-admin");

    let first = ctx
        .as_queryable::<Client>(&[])
        .order_by("name", SortOrder::Descending)
        .first()
        .unwrap()
        .unwrap();
    assert_eq!(first.name, "delta");

    assert_eq!(ctx.as_queryable::<User>(&[]).count().unwrap(), 4);
    assert_eq!(
        ctx.as_queryable::<User>(&[])
            .filter_eq("email", rusqlite::types::Value::Null)
            .count()
            .unwrap(),
        4
    );

    let err = ctx.as_queryable::<Client>(&[]).single().unwrap_err();
    assert!(matches!(err, StoreError::MultipleFound { id: None, .. }));

    let err = ctx
        .as_queryable::<Client>(&[])
        .order_by("missing", SortOrder::Ascending)
        .fetch_all()
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownColumn { .. }));
}

#[test]
fn include_loading_handles_more_keys_than_one_statement_can_bind() {
    let mut conn = open_db_in_memory().unwrap();
    let mut ctx = ModelContext::try_new(&mut conn).unwrap();
    ctx.connection()
        .execute_batch(
            "WITH RECURSIVE seq(n) AS (
                SELECT 1
                UNION ALL
                SELECT n + 1 FROM seq WHERE n < 33000
             )
             INSERT INTO clients (name) SELECT 'client-' || n FROM seq;
             INSERT INTO users (client_id, user_name) SELECT id, 'user-' || id FROM clients;",
        )
        .unwrap();

    let clients = ctx.as_queryable::<Client>(&["Users"]).fetch_all().unwrap();
    assert_eq!(clients.len(), 33_000);
    assert!(clients.iter().all(|client| client.users.len() == 1));
    let last = clients.last().unwrap();
    assert_eq!(last.users[0].user_name, format!("user-{}", last.id));

    let users = ctx.as_queryable::<User>(&["Client"]).fetch_all().unwrap();
    assert_eq!(users.len(), 33_000);
    assert!(users
        .iter()
        .all(|user| user.client.as_ref().map(|client| client.id) == Some(user.client_id)));
}
