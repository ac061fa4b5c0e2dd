use memberstore_core::service::member_service::TRANSFER_FAILURE_MEMBER_ID;
use memberstore_core::{
    Member, MemberRepository, MemberService, MemberStore, ProvisioningMode, RepoError,
    ServiceError, StoreConfig,
};

fn open_service(dir: &tempfile::TempDir, mode: ProvisioningMode) -> MemberService<memberstore_core::DynMemberRepository> {
    let config = StoreConfig {
        mode,
        ..StoreConfig::for_database(dir.path().join(format!("{mode}.db")))
    };
    MemberStore::open(&config).unwrap().into_service()
}

fn seed(service: &MemberService<memberstore_core::DynMemberRepository>, members: &[(&str, i64)]) {
    for (member_id, money) in members {
        service
            .repository()
            .save(&Member::new(*member_id, *money))
            .unwrap();
    }
}

fn balance(service: &MemberService<memberstore_core::DynMemberRepository>, member_id: &str) -> i64 {
    service.repository().find_by_id(member_id).unwrap().money
}

#[test]
fn account_transfer_moves_money_in_pooled_modes() {
    let dir = tempfile::tempdir().unwrap();

    for mode in [ProvisioningMode::Managed, ProvisioningMode::Template] {
        let service = open_service(&dir, mode);
        seed(&service, &[("memberA", 10_000), ("memberB", 10_000)]);

        service.account_transfer("memberA", "memberB", 2_000).unwrap();

        assert_eq!(balance(&service, "memberA"), 8_000, "{mode}");
        assert_eq!(balance(&service, "memberB"), 12_000, "{mode}");
    }
}

#[test]
fn failed_transfer_rolls_back_the_debit() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(&dir, ProvisioningMode::Managed);
    seed(
        &service,
        &[("memberA", 10_000), (TRANSFER_FAILURE_MEMBER_ID, 10_000)],
    );

    let err = service
        .account_transfer("memberA", TRANSFER_FAILURE_MEMBER_ID, 2_000)
        .unwrap_err();
    assert!(matches!(err, ServiceError::TransferAborted { .. }));

    assert_eq!(balance(&service, "memberA"), 10_000);
    assert_eq!(balance(&service, TRANSFER_FAILURE_MEMBER_ID), 10_000);
}

#[test]
fn transfer_to_missing_member_is_not_found_and_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(&dir, ProvisioningMode::Template);
    seed(&service, &[("memberA", 500)]);

    let err = service
        .account_transfer("memberA", "nobody", 100)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Repo(RepoError::NotFound(ref id)) if id == "nobody"));
    assert_eq!(balance(&service, "memberA"), 500);
}

#[test]
fn transfer_overflow_is_rejected_without_changes() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(&dir, ProvisioningMode::Managed);
    seed(&service, &[("poor", i64::MIN), ("rich", 0)]);

    let err = service.account_transfer("poor", "rich", 1).unwrap_err();
    assert!(matches!(err, ServiceError::BalanceOverflow { ref member_id } if member_id == "poor"));
    assert_eq!(balance(&service, "poor"), i64::MIN);
}

#[test]
fn driver_mode_has_no_transfers() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(&dir, ProvisioningMode::Driver);
    seed(&service, &[("memberA", 1), ("memberB", 1)]);

    let err = service.account_transfer("memberA", "memberB", 1).unwrap_err();
    assert!(matches!(err, ServiceError::TransactionsUnavailable));
}

#[test]
fn join_retries_duplicate_key_under_a_fresh_id() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(&dir, ProvisioningMode::Managed);

    let first = service.join("myId", 0).unwrap();
    assert_eq!(first.member_id, "myId");

    let second = service.join("myId", 0).unwrap();
    assert_ne!(second.member_id, "myId");
    assert!(second.member_id.starts_with("myId-"));
    assert_eq!(service.repository().find_by_id(&second.member_id).unwrap(), second);
}

#[test]
fn join_does_not_retry_other_faults() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(&dir, ProvisioningMode::Managed);

    let err = service.join("", 0).unwrap_err();
    assert!(matches!(err, ServiceError::Repo(RepoError::StoreFault(_))));
}

#[test]
fn join_in_driver_mode_cannot_recognize_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let service = open_service(&dir, ProvisioningMode::Driver);

    service.join("plain", 0).unwrap();
    let err = service.join("plain", 0).unwrap_err();
    assert!(matches!(err, ServiceError::Repo(RepoError::StoreFault(_))));
}
