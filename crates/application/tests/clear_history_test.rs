//! 清空、删除与历史分页

mod support;

use application::Distributor;
use domain::{ChannelKind, ChatEvent};
use support::{harness, keyspace, sender};

#[tokio::test]
async fn clear_empties_history_and_emits_exactly_one_clear_event() {
    let h = harness();
    let ks = keyspace("radio-one");
    let alice = sender("alice", "1.2.3.4");

    for body in ["one", "two", "three"] {
        h.service
            .post_public_message(&ks, &alice, body, None, None)
            .await
            .unwrap();
    }

    let mut stream = h
        .distributor
        .subscribe(&ks, &[ChannelKind::PublicMessages])
        .await
        .unwrap();

    let affected = h.service.clear_chat(&ks).await.unwrap();
    assert_eq!(affected, 3);

    // 清空后的历史为空，缓存的快照也必须一并失效
    assert!(h
        .service
        .list_history(&ks, None, None)
        .await
        .unwrap()
        .is_empty());

    match stream.recv().await {
        Some(ChatEvent::Cleared { .. }) => {}
        other => panic!("expected Cleared, got {:?}", other),
    }
    // 恰好一个清空帧，没有第二个
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(stream.try_recv().is_none());
}

#[tokio::test]
async fn cleared_messages_do_not_reappear_from_cache() {
    let h = harness();
    let ks = keyspace("radio-one");
    let alice = sender("alice", "1.2.3.4");

    h.service
        .post_public_message(&ks, &alice, "hello", None, None)
        .await
        .unwrap();
    // 先读一次，填充历史快照缓存
    assert_eq!(h.service.list_history(&ks, None, None).await.unwrap().len(), 1);

    h.service.clear_chat(&ks).await.unwrap();
    assert!(h
        .service
        .list_history(&ks, None, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deleted_message_is_excluded_and_announced() {
    let h = harness();
    let ks = keyspace("radio-one");
    let alice = sender("alice", "1.2.3.4");

    let keep = h
        .service
        .post_public_message(&ks, &alice, "keep", None, None)
        .await
        .unwrap();
    let doomed = h
        .service
        .post_public_message(&ks, &alice, "drop", None, None)
        .await
        .unwrap();

    let mut stream = h
        .distributor
        .subscribe(&ks, &[ChannelKind::PublicMessages])
        .await
        .unwrap();

    h.service.delete_message(&ks, doomed.id).await.unwrap();

    match stream.recv().await {
        Some(ChatEvent::MessageDeleted { message_id }) => assert_eq!(message_id, doomed.id),
        other => panic!("expected MessageDeleted, got {:?}", other),
    }

    let history = h.service.list_history(&ks, None, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, keep.id);
}

#[tokio::test]
async fn history_paginates_by_anchor_id() {
    let h = harness();
    let ks = keyspace("radio-one");
    let alice = sender("alice", "1.2.3.4");

    for i in 0..5 {
        // 限流窗口很小，逐条间隔发送避免触发
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        h.service
            .post_public_message(&ks, &alice, &format!("m{}", i), None, None)
            .await
            .unwrap();
    }

    // 新的在前
    let first_page = h.service.list_history(&ks, Some(2), None).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].body, "m4");
    assert_eq!(first_page[1].body, "m3");

    // 以最后一条为锚点继续向前翻
    let anchor = first_page.last().unwrap().id;
    let second_page = h
        .service
        .list_history(&ks, Some(2), Some(anchor))
        .await
        .unwrap();
    assert_eq!(second_page.len(), 2);
    assert_eq!(second_page[0].body, "m2");
    assert_eq!(second_page[1].body, "m1");
}

#[tokio::test]
async fn reply_reference_may_dangle() {
    let h = harness();
    let ks = keyspace("radio-one");
    let alice = sender("alice", "1.2.3.4");

    let original = h
        .service
        .post_public_message(&ks, &alice, "original", None, None)
        .await
        .unwrap();
    let reply = h
        .service
        .post_public_message(&ks, &alice, "reply", Some(original.id), None)
        .await
        .unwrap();

    // 被引用的消息删除后，回复里的软指针原样保留
    h.service.delete_message(&ks, original.id).await.unwrap();
    let history = h.service.list_history(&ks, None, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, reply.id);
    assert_eq!(history[0].reply_to, Some(original.id));
}
