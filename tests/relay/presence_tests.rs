//! Presence, typing indicators and read receipts

use std::sync::Arc;

use pretty_assertions::assert_eq;

use chat_relay::domain::{MessageContent, UserStatus};
use chat_relay::infrastructure::bus::InMemoryEventBus;
use chat_relay::presentation::websocket::{relay, ServerEvent};

use crate::common::{assert_silent, next_event, settle, MemoryStore, TestInstance};

#[tokio::test]
async fn test_typing_stays_on_the_instance() {
    let store = MemoryStore::new();
    let typist = store.add_user("typist");
    let neighbour = store.add_user("neighbour");
    let faraway = store.add_user("faraway");
    let conversation = store.add_conversation();

    let bus_a = InMemoryEventBus::new();
    let bus_b = bus_a.linked();
    let node_a = TestInstance::start("node-a", store.clone(), Arc::new(bus_a)).await;
    let node_b = TestInstance::start("node-b", store.clone(), Arc::new(bus_b)).await;

    let (typist_session, mut typist_rx) = node_a.join(&typist, conversation.id).await;
    let (_, mut neighbour_rx) = node_a.join(&neighbour, conversation.id).await;
    let (_, mut faraway_rx) = node_b.join(&faraway, conversation.id).await;

    relay::start_typing(&node_a.state.gateway, &typist_session, conversation.id);

    assert_eq!(
        next_event(&mut neighbour_rx).await,
        ServerEvent::UserTyping {
            conversation_id: conversation.id,
            user_id: typist.id,
            username: "typist".into(),
        }
    );
    assert_silent(&mut faraway_rx).await;
    assert_silent(&mut typist_rx).await;

    relay::stop_typing(&node_a.state.gateway, &typist_session, conversation.id);
    assert_eq!(
        next_event(&mut neighbour_rx).await,
        ServerEvent::UserStopTyping {
            conversation_id: conversation.id,
            user_id: typist.id,
        }
    );
    assert_silent(&mut faraway_rx).await;
}

#[tokio::test]
async fn test_mark_as_read_is_idempotent() {
    let store = MemoryStore::new();
    let author = store.add_user("author");
    let reader = store.add_user("reader");
    let conversation = store.add_conversation();

    let node = TestInstance::start("node-a", store.clone(), Arc::new(InMemoryEventBus::new())).await;
    for text in ["a", "b"] {
        node.state
            .message_service
            .submit(conversation.id, author.id, MessageContent::text(text))
            .await
            .unwrap();
    }

    let first = node
        .state
        .presence_service
        .mark_as_read(conversation.id, reader.id)
        .await
        .unwrap();
    let after_first: Vec<_> = store
        .messages_in(conversation.id)
        .into_iter()
        .map(|m| m.status.read)
        .collect();

    let second = node
        .state
        .presence_service
        .mark_as_read(conversation.id, reader.id)
        .await
        .unwrap();
    let after_second: Vec<_> = store
        .messages_in(conversation.id)
        .into_iter()
        .map(|m| m.status.read)
        .collect();

    assert_eq!(first, 2);
    assert_eq!(second, 0);
    assert_eq!(after_first, after_second);
    assert!(store
        .messages_in(conversation.id)
        .iter()
        .all(|m| m.is_read_by(reader.id)));
}

#[tokio::test]
async fn test_connect_marks_user_online() {
    let store = MemoryStore::new();
    let user = store.add_user("online");

    let node = TestInstance::start("node-a", store.clone(), Arc::new(InMemoryEventBus::new())).await;
    let (_session, _rx) = node.connect(&user).await;
    settle().await;

    assert_eq!(store.status_writes_for(user.id, UserStatus::Online), 1);
}

#[tokio::test]
async fn test_double_disconnect_goes_offline_once() {
    let store = MemoryStore::new();
    let user = store.add_user("leaving");
    let conversation = store.add_conversation();

    let node = TestInstance::start("node-a", store.clone(), Arc::new(InMemoryEventBus::new())).await;
    let (session, _rx) = node.join(&user, conversation.id).await;

    assert!(node.state.gateway.disconnect(session.id).is_some());
    assert!(node.state.gateway.disconnect(session.id).is_none());
    settle().await;

    assert_eq!(store.status_writes_for(user.id, UserStatus::Offline), 1);
    assert!(node.state.gateway.room_members(conversation.id).is_empty());
    assert_eq!(node.state.gateway.session_count(), 0);
}

#[tokio::test]
async fn test_closed_session_receives_nothing() {
    let store = MemoryStore::new();
    let author = store.add_user("author");
    let gone = store.add_user("gone");
    let conversation = store.add_conversation();

    let node = TestInstance::start("node-a", store.clone(), Arc::new(InMemoryEventBus::new())).await;
    let (session, mut rx) = node.join(&gone, conversation.id).await;
    node.state.gateway.disconnect(session.id);

    node.state
        .message_service
        .submit(conversation.id, author.id, MessageContent::text("after close"))
        .await
        .unwrap();

    // The gateway dropped its sender, so the queue ends without events.
    let next = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .expect("queue should close");
    assert!(next.is_none());
}
