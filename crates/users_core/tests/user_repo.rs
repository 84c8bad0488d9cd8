use rusqlite::Connection;
use users_core::{
    hash_password, Database, DbError, RepoError, RequestContext, SqliteUserRepository, TxStep,
    User, UserLookup, UserRepository,
};
use uuid::Uuid;

fn setup() -> SqliteUserRepository {
    SqliteUserRepository::new(Database::open_in_memory().unwrap())
}

fn new_user(username: &str, email: &str) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        username: username.to_string(),
        email: email.to_string(),
        hashed_password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g".to_string(),
        created_by: id,
        created_at: 1_700_000_000,
        updated_by: Some(id),
        updated_at: Some(1_700_000_000),
    }
}

fn user_count(repo: &SqliteUserRepository) -> i64 {
    repo.database()
        .with_conn(|conn: &Connection| {
            conn.query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
                .map_err(DbError::from)
        })
        .unwrap()
}

fn install_fault(repo: &SqliteUserRepository, sql: &str) {
    repo.database()
        .with_conn(|conn| conn.execute_batch(sql).map_err(DbError::from))
        .unwrap();
}

#[test]
fn create_then_get_by_id_returns_equivalent_record() {
    let repo = setup();
    let ctx = RequestContext::background();
    let user = new_user("ada", "ada@example.com");

    repo.create_user(&ctx, &user).unwrap();

    let loaded = repo.get_user_by_id(&ctx, user.id).unwrap();
    assert_eq!(loaded, user);
}

#[test]
fn lookups_by_username_and_email_share_one_record() {
    let repo = setup();
    let ctx = RequestContext::background();
    let user = new_user("grace", "grace@example.com");
    repo.create_user(&ctx, &user).unwrap();

    assert_eq!(repo.get_user_by_username(&ctx, "grace").unwrap().id, user.id);
    assert_eq!(
        repo.get_user_by_email(&ctx, "grace@example.com").unwrap().id,
        user.id
    );
}

#[test]
fn nullable_audit_fields_round_trip_as_none() {
    let repo = setup();
    let ctx = RequestContext::background();
    let mut user = new_user("linus", "linus@example.com");
    user.updated_by = None;
    user.updated_at = None;

    repo.create_user(&ctx, &user).unwrap();

    let loaded = repo.get_user_by_id(&ctx, user.id).unwrap();
    assert_eq!(loaded.updated_by, None);
    assert_eq!(loaded.updated_at, None);
}

#[test]
fn lookup_miss_is_not_found_with_key() {
    let repo = setup();
    let ctx = RequestContext::background();
    let missing = Uuid::new_v4();

    let err = repo.get_user_by_id(&ctx, missing).unwrap_err();
    match err {
        RepoError::NotFound { lookup, key } => {
            assert_eq!(lookup, UserLookup::Id);
            assert_eq!(key, missing.to_string());
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = repo.get_user_by_email(&ctx, "nobody@example.com").unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            lookup: UserLookup::Email,
            ..
        }
    ));
}

#[test]
fn validate_for_create_accepts_unused_username_and_email() {
    let repo = setup();
    let ctx = RequestContext::background();
    repo.create_user(&ctx, &new_user("ada", "ada@example.com"))
        .unwrap();

    let candidate = new_user("grace", "grace@example.com");
    assert!(repo.validate_for_create(&ctx, &candidate).unwrap());
}

#[test]
fn validate_for_create_rejects_taken_email_or_username() {
    let repo = setup();
    let ctx = RequestContext::background();
    repo.create_user(&ctx, &new_user("ada", "ada@example.com"))
        .unwrap();

    let same_email = new_user("someone", "ada@example.com");
    let same_username = new_user("ada", "someone@example.com");

    assert!(!repo.validate_for_create(&ctx, &same_email).unwrap());
    assert!(!repo.validate_for_create(&ctx, &same_username).unwrap());
    assert_eq!(user_count(&repo), 1);
}

#[test]
fn validate_for_create_fails_closed_on_lookup_error() {
    let repo = setup();
    let ctx = RequestContext::background();
    install_fault(&repo, "DROP TABLE users;");

    let err = repo
        .validate_for_create(&ctx, &new_user("ada", "ada@example.com"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Lookup {
            lookup: UserLookup::Email,
            ..
        }
    ));
}

#[test]
fn create_with_duplicate_email_is_a_conflict_and_inserts_nothing() {
    let repo = setup();
    let ctx = RequestContext::background();
    repo.create_user(&ctx, &new_user("ada", "ada@example.com"))
        .unwrap();

    let err = repo
        .create_user(&ctx, &new_user("other", "ada@example.com"))
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(user_count(&repo), 1);
}

#[test]
fn execute_fault_rolls_back_and_leaves_rows_unchanged() {
    let repo = setup();
    let ctx = RequestContext::background();
    repo.create_user(&ctx, &new_user("ada", "ada@example.com"))
        .unwrap();
    install_fault(
        &repo,
        "CREATE TRIGGER users_insert_fault BEFORE INSERT ON users
         BEGIN
             SELECT RAISE(ABORT, 'simulated store fault');
         END;",
    );
    let before = user_count(&repo);

    let err = repo
        .create_user(&ctx, &new_user("grace", "grace@example.com"))
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::Transaction {
            operation: "create_user",
            step: TxStep::Execute,
            ..
        }
    ));
    assert_eq!(user_count(&repo), before);

    // The connection is usable again after the rollback.
    assert!(repo.get_user_by_username(&ctx, "ada").is_ok());
}

#[test]
fn cancelled_request_never_reaches_the_store() {
    let repo = setup();
    let ctx = RequestContext::background();
    ctx.cancel();

    let create_err = repo
        .create_user(&ctx, &new_user("ada", "ada@example.com"))
        .unwrap_err();
    assert!(matches!(create_err, RepoError::Cancelled { .. }));

    let lookup_err = repo.get_user_by_username(&ctx, "ada").unwrap_err();
    assert!(matches!(lookup_err, RepoError::Cancelled { .. }));

    assert_eq!(user_count(&repo), 0);
}

#[test]
fn malformed_stored_uuid_is_invalid_data() {
    let repo = setup();
    let ctx = RequestContext::background();
    let hash = hash_password("pw").unwrap();
    repo.database()
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (uuid, username, email, hashed_password, created_by_uuid, created_at)
                 VALUES ('not-a-uuid', 'broken', 'broken@example.com', ?1, 'not-a-uuid', 0);",
                [hash.as_str()],
            )
            .map_err(DbError::from)
        })
        .unwrap();

    let err = repo.get_user_by_username(&ctx, "broken").unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn repository_is_shareable_across_threads() {
    let repo = setup();
    let handles: Vec<_> = (0..4)
        .map(|index| {
            let repo = repo.clone();
            std::thread::spawn(move || {
                let ctx = RequestContext::background();
                let user = new_user(&format!("user{index}"), &format!("user{index}@example.com"));
                repo.create_user(&ctx, &user).unwrap();
                repo.get_user_by_id(&ctx, user.id).unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(user_count(&repo), 4);
}

#[test]
fn ping_fails_once_the_database_is_closed() {
    let repo = setup();
    let ctx = RequestContext::background();
    repo.ping(&ctx).unwrap();

    repo.database().close().unwrap();
    let err = repo.ping(&ctx).unwrap_err();
    assert!(matches!(err, RepoError::Db(DbError::NotConnected)));
}
