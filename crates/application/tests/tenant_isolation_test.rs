//! 租户隔离：共享一套缓存/代理进程的两个租户互不可见

mod support;

use application::{Clock, Distributor};
use domain::{BanRecord, BanSubject, ChannelKind, DenyCategory, DomainError};
use support::{harness, keyspace, sender, TEST_RATE_LIMIT};

#[tokio::test]
async fn bans_do_not_leak_across_tenants() {
    let h = harness();
    let ks_one = keyspace("radio-one");
    let ks_two = keyspace("radio-two");
    let bob = sender("bob", "9.9.9.9");

    h.service
        .ledger()
        .ban(
            &ks_one,
            &BanRecord::permanent(
                BanSubject::Address("9.9.9.9".into()),
                "spam",
                "moderator",
                h.clock.now(),
            ),
        )
        .await
        .unwrap();

    // 同一地址在另一个租户不受影响
    assert!(matches!(
        h.service
            .post_public_message(&ks_one, &bob, "hi", None, None)
            .await,
        Err(DomainError::Denied(DenyCategory::Banned))
    ));
    assert!(h
        .service
        .post_public_message(&ks_two, &bob, "hi", None, None)
        .await
        .is_ok());
}

#[tokio::test]
async fn rate_windows_do_not_leak_across_tenants() {
    let h = harness();
    let ks_one = keyspace("radio-one");
    let ks_two = keyspace("radio-two");
    let alice = sender("alice", "1.2.3.4");

    for _ in 0..TEST_RATE_LIMIT {
        h.service
            .post_public_message(&ks_one, &alice, "msg", None, None)
            .await
            .unwrap();
    }
    assert!(matches!(
        h.service
            .post_public_message(&ks_one, &alice, "msg", None, None)
            .await,
        Err(DomainError::Denied(DenyCategory::RateLimited { .. }))
    ));

    // 同一地址在另一个租户的配额是独立的
    assert!(h
        .service
        .post_public_message(&ks_two, &alice, "msg", None, None)
        .await
        .is_ok());
}

#[tokio::test]
async fn published_messages_do_not_leak_across_tenants() {
    let h = harness();
    let ks_one = keyspace("radio-one");
    let ks_two = keyspace("radio-two");
    let alice = sender("alice", "1.2.3.4");

    let mut stream_two = h
        .distributor
        .subscribe(&ks_two, &[ChannelKind::PublicMessages])
        .await
        .unwrap();

    h.service
        .post_public_message(&ks_one, &alice, "only for one", None, None)
        .await
        .unwrap();

    tokio::task::yield_now().await;
    assert!(stream_two.try_recv().is_none());

    // 历史同样隔离
    assert!(h
        .service
        .list_history(&ks_two, None, None)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        h.service.list_history(&ks_one, None, None).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn settings_are_scoped_per_tenant() {
    let h = harness();
    let ks_one = keyspace("radio-one");
    let ks_two = keyspace("radio-two");

    let settings = domain::TenantSettings {
        mode: domain::ChatMode::Private,
        ..Default::default()
    };
    h.service.update_settings(&ks_one, &settings).await.unwrap();

    let alice = sender("alice", "1.2.3.4");
    // radio-one 关闭了公开聊天
    assert!(matches!(
        h.service
            .post_public_message(&ks_one, &alice, "hi", None, None)
            .await,
        Err(DomainError::Validation { .. })
    ));
    // radio-two 不受影响
    assert!(h
        .service
        .post_public_message(&ks_two, &alice, "hi", None, None)
        .await
        .is_ok());
}
