use users_core::{
    Database, DbError, FollowAction, FollowEdge, RepoError, RequestContext, SqliteUserRepository,
    TxStep, UserRepository,
};
use uuid::Uuid;

fn setup() -> SqliteUserRepository {
    SqliteUserRepository::new(Database::open_in_memory().unwrap())
}

fn edge_count(repo: &SqliteUserRepository, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table};");
    repo.database()
        .with_conn(|conn| {
            conn.query_row(&sql, [], |row| row.get(0))
                .map_err(DbError::from)
        })
        .unwrap()
}

fn has_edge(repo: &SqliteUserRepository, table: &str, follower: Uuid, followed: Uuid) -> bool {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE follower = ?1 AND followed = ?2;");
    let count: i64 = repo
        .database()
        .with_conn(|conn| {
            conn.query_row(
                &sql,
                [follower.to_string(), followed.to_string()],
                |row| row.get(0),
            )
            .map_err(DbError::from)
        })
        .unwrap();
    count == 1
}

fn install_fault(repo: &SqliteUserRepository, sql: &str) {
    repo.database()
        .with_conn(|conn| conn.execute_batch(sql).map_err(DbError::from))
        .unwrap();
}

#[test]
fn user_follow_then_unfollow() {
    let repo = setup();
    let ctx = RequestContext::background();
    let (follower, followed) = (Uuid::new_v4(), Uuid::new_v4());

    repo.add_user_follower(&ctx, follower, followed).unwrap();
    assert!(has_edge(&repo, "user_user_follows", follower, followed));

    repo.remove_user_follower(&ctx, follower, followed).unwrap();
    assert!(!has_edge(&repo, "user_user_follows", follower, followed));
}

#[test]
fn source_follow_then_unfollow() {
    let repo = setup();
    let ctx = RequestContext::background();
    let (follower, source) = (Uuid::new_v4(), Uuid::new_v4());

    repo.add_source_follower(&ctx, follower, source).unwrap();
    assert!(has_edge(&repo, "user_source_follows", follower, source));

    repo.remove_source_follower(&ctx, follower, source).unwrap();
    assert!(!has_edge(&repo, "user_source_follows", follower, source));
}

#[test]
fn edges_are_directed() {
    let repo = setup();
    let ctx = RequestContext::background();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    repo.add_user_follower(&ctx, a, b).unwrap();

    assert!(has_edge(&repo, "user_user_follows", a, b));
    assert!(!has_edge(&repo, "user_user_follows", b, a));
}

#[test]
fn repeated_follow_keeps_a_single_edge() {
    let repo = setup();
    let ctx = RequestContext::background();
    let (follower, followed) = (Uuid::new_v4(), Uuid::new_v4());

    repo.add_user_follower(&ctx, follower, followed).unwrap();
    repo.add_user_follower(&ctx, follower, followed).unwrap();
    repo.add_source_follower(&ctx, follower, followed).unwrap();
    repo.add_source_follower(&ctx, follower, followed).unwrap();

    assert_eq!(edge_count(&repo, "user_user_follows"), 1);
    assert_eq!(edge_count(&repo, "user_source_follows"), 1);
}

#[test]
fn unfollow_of_missing_edge_succeeds() {
    let repo = setup();
    let ctx = RequestContext::background();

    repo.remove_user_follower(&ctx, Uuid::new_v4(), Uuid::new_v4())
        .unwrap();
    repo.remove_source_follower(&ctx, Uuid::new_v4(), Uuid::new_v4())
        .unwrap();
}

#[test]
fn each_kind_writes_only_its_own_relation() {
    let repo = setup();
    let ctx = RequestContext::background();
    let (follower, followed) = (Uuid::new_v4(), Uuid::new_v4());

    repo.add_user_follower(&ctx, follower, followed).unwrap();
    assert_eq!(edge_count(&repo, "user_source_follows"), 0);

    repo.add_source_follower(&ctx, follower, followed).unwrap();
    repo.remove_user_follower(&ctx, follower, followed).unwrap();
    assert_eq!(edge_count(&repo, "user_user_follows"), 0);
    assert_eq!(edge_count(&repo, "user_source_follows"), 1);
}

#[test]
fn apply_routes_every_kind_and_action() {
    let repo = setup();
    let ctx = RequestContext::background();
    let (follower, followed) = (Uuid::new_v4(), Uuid::new_v4());

    for edge in [FollowEdge::User, FollowEdge::Source] {
        let table = match edge {
            FollowEdge::User => "user_user_follows",
            FollowEdge::Source => "user_source_follows",
        };
        edge.apply(&repo, &ctx, FollowAction::Add, follower, followed)
            .unwrap();
        assert!(has_edge(&repo, table, follower, followed));
        edge.apply(&repo, &ctx, FollowAction::Remove, follower, followed)
            .unwrap();
        assert!(!has_edge(&repo, table, follower, followed));
    }
}

#[test]
fn follow_insert_fault_rolls_back() {
    let repo = setup();
    let ctx = RequestContext::background();
    let follower = Uuid::new_v4();
    repo.add_user_follower(&ctx, follower, Uuid::new_v4()).unwrap();
    install_fault(
        &repo,
        "CREATE TRIGGER follow_insert_fault BEFORE INSERT ON user_user_follows
         BEGIN
             SELECT RAISE(ABORT, 'simulated store fault');
         END;",
    );
    let before = edge_count(&repo, "user_user_follows");

    let err = repo
        .add_user_follower(&ctx, follower, Uuid::new_v4())
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::Transaction {
            operation: "add_user_follower",
            step: TxStep::Execute,
            ..
        }
    ));
    assert_eq!(edge_count(&repo, "user_user_follows"), before);
}

#[test]
fn follow_delete_fault_keeps_the_edge() {
    let repo = setup();
    let ctx = RequestContext::background();
    let (follower, source) = (Uuid::new_v4(), Uuid::new_v4());
    repo.add_source_follower(&ctx, follower, source).unwrap();
    install_fault(
        &repo,
        "CREATE TRIGGER follow_delete_fault BEFORE DELETE ON user_source_follows
         BEGIN
             SELECT RAISE(ABORT, 'simulated store fault');
         END;",
    );

    let err = repo
        .remove_source_follower(&ctx, follower, source)
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::Transaction {
            operation: "remove_source_follower",
            ..
        }
    ));
    assert!(has_edge(&repo, "user_source_follows", follower, source));
}

#[test]
fn expired_deadline_abandons_follow() {
    let repo = setup();
    let ctx = RequestContext::with_deadline(std::time::Instant::now());

    let err = repo
        .add_user_follower(&ctx, Uuid::new_v4(), Uuid::new_v4())
        .unwrap_err();

    assert!(matches!(err, RepoError::Cancelled { .. }));
    assert_eq!(edge_count(&repo, "user_user_follows"), 0);
}
