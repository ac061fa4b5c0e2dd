use memberstore_core::db::{
    ConnectionGuard, DataSource, DataSourceOptions, DbError, LeaseKind, PooledProvider,
    SqliteCodeClassifier, TransactionAwareProvider,
};
use memberstore_core::{FaultKind, Member, MemberRepository, SqlMemberRepository, TransactionManager};
use std::time::Duration;

struct Fixture {
    data_source: DataSource,
    tx: TransactionManager,
    repo: SqlMemberRepository<TransactionAwareProvider, SqliteCodeClassifier>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let options = DataSourceOptions {
        max_size: 4,
        busy_timeout: Duration::from_millis(100),
        ..DataSourceOptions::default()
    };
    let data_source = DataSource::open(dir.path().join("tx.db"), options).unwrap();
    let repo = SqlMemberRepository::new(
        TransactionAwareProvider::new(data_source.clone()),
        SqliteCodeClassifier,
    );
    Fixture {
        tx: TransactionManager::new(data_source.clone()),
        data_source,
        repo,
        _dir: dir,
    }
}

#[test]
fn provider_joins_the_ambient_transaction() {
    let fx = fixture();
    let provider = fx.repo.provider();

    assert_eq!(ConnectionGuard::acquire(provider).unwrap().kind(), LeaseKind::Pooled);

    let scope = fx.tx.begin().unwrap();
    assert_eq!(
        ConnectionGuard::acquire(provider).unwrap().kind(),
        LeaseKind::Transactional
    );
    scope.rollback().unwrap();

    assert!(!fx.tx.is_active());
    assert_eq!(ConnectionGuard::acquire(provider).unwrap().kind(), LeaseKind::Pooled);
}

#[test]
fn commit_persists_every_operation_in_the_scope() {
    let fx = fixture();

    let scope = fx.tx.begin().unwrap();
    fx.repo.save(&Member::new("a", 10)).unwrap();
    fx.repo.save(&Member::new("b", 20)).unwrap();
    fx.repo.update("a", 5).unwrap();
    scope.commit().unwrap();

    assert_eq!(fx.repo.find_by_id("a").unwrap().money, 5);
    assert_eq!(fx.repo.find_by_id("b").unwrap().money, 20);
}

#[test]
fn rollback_discards_every_operation_in_the_scope() {
    let fx = fixture();
    fx.repo.save(&Member::new("kept", 1)).unwrap();

    let scope = fx.tx.begin().unwrap();
    fx.repo.save(&Member::new("discarded", 2)).unwrap();
    fx.repo.delete("kept").unwrap();
    assert!(fx.repo.find_by_id("kept").unwrap_err().is_not_found());
    scope.rollback().unwrap();

    assert!(fx.repo.find_by_id("discarded").unwrap_err().is_not_found());
    assert_eq!(fx.repo.find_by_id("kept").unwrap().money, 1);
}

#[test]
fn dropping_an_unfinished_scope_rolls_back() {
    let fx = fixture();

    {
        let _scope = fx.tx.begin().unwrap();
        fx.repo.save(&Member::new("ghost", 1)).unwrap();
    }

    assert!(!fx.tx.is_active());
    assert!(fx.repo.find_by_id("ghost").unwrap_err().is_not_found());
    let state = fx.data_source.pool_state();
    assert_eq!(state.idle_connections, state.connections);
}

#[test]
fn uncommitted_writes_are_invisible_to_other_connections() {
    let fx = fixture();
    let outsider = SqlMemberRepository::new(
        PooledProvider::new(fx.data_source.clone()),
        SqliteCodeClassifier,
    );
    fx.repo.save(&Member::new("m1", 100)).unwrap();

    let scope = fx.tx.begin().unwrap();
    fx.repo.update("m1", 1).unwrap();
    assert_eq!(outsider.find_by_id("m1").unwrap().money, 100);
    scope.commit().unwrap();

    assert_eq!(outsider.find_by_id("m1").unwrap().money, 1);
}

#[test]
fn non_transactional_writer_blocks_behind_the_open_transaction() {
    let fx = fixture();
    let outsider = SqlMemberRepository::new(
        PooledProvider::new(fx.data_source.clone()),
        SqliteCodeClassifier,
    );

    let scope = fx.tx.begin().unwrap();
    let err = outsider.save(&Member::new("late", 1)).unwrap_err();
    assert_eq!(err.fault_kind(), Some(FaultKind::Transient));
    scope.rollback().unwrap();

    outsider.save(&Member::new("late", 1)).unwrap();
}

#[test]
fn second_begin_on_the_same_thread_is_rejected() {
    let fx = fixture();

    let scope = fx.tx.begin().unwrap();
    assert!(matches!(
        fx.tx.begin(),
        Err(DbError::TransactionAlreadyActive)
    ));
    scope.commit().unwrap();

    let again = fx.tx.begin().unwrap();
    again.rollback().unwrap();
}

#[test]
fn transactions_are_bound_per_thread() {
    let fx = fixture();
    fx.repo.save(&Member::new("shared", 1)).unwrap();

    let scope = fx.tx.begin().unwrap();
    fx.repo.update("shared", 2).unwrap();

    let tx = fx.tx.clone();
    let other_thread_active = std::thread::spawn(move || tx.is_active()).join().unwrap();
    assert!(!other_thread_active);

    scope.commit().unwrap();
    assert_eq!(fx.repo.find_by_id("shared").unwrap().money, 2);
}

#[test]
fn failed_rollback_still_unbinds_and_returns_the_connection() {
    let fx = fixture();

    let scope = fx.tx.begin().unwrap();
    {
        let conn = ConnectionGuard::acquire(fx.repo.provider()).unwrap();
        assert_eq!(conn.kind(), LeaseKind::Transactional);
        conn.execute_batch("COMMIT;").unwrap();
    }
    assert!(scope.rollback().is_err());

    assert!(!fx.tx.is_active());
    let state = fx.data_source.pool_state();
    assert_eq!(state.idle_connections, state.connections);
}

#[test]
fn checkout_resets_a_transaction_left_open_by_a_previous_holder() {
    let dir = tempfile::tempdir().unwrap();
    let options = DataSourceOptions {
        max_size: 1,
        ..DataSourceOptions::default()
    };
    let data_source = DataSource::open(dir.path().join("reset.db"), options).unwrap();
    let provider = PooledProvider::new(data_source.clone());

    {
        let conn = ConnectionGuard::acquire(&provider).unwrap();
        conn.execute_batch(
            "BEGIN IMMEDIATE; INSERT INTO member(member_id,money) VALUES ('leftover',1);",
        )
        .unwrap();
    }

    {
        let conn = ConnectionGuard::acquire(&provider).unwrap();
        assert!(conn.is_autocommit());
    }
    let repo = SqlMemberRepository::new(provider, SqliteCodeClassifier);
    assert!(repo.find_by_id("leftover").unwrap_err().is_not_found());
}
