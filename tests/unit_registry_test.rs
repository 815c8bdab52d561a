mod common;

use common::{MockTransport, wait_until};
use devio::core::protocol::encode;
use devio::{ConnectionRegistry, DevioError, StaticDevice};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn test_registry() -> ConnectionRegistry {
    ConnectionRegistry::new().with_handshake_timeout(Duration::from_millis(200))
}

#[tokio::test]
async fn register_type_rejects_an_empty_type_name() {
    let registry = test_registry();
    let err = registry
        .register_type(Arc::new(StaticDevice::new("")))
        .unwrap_err();
    assert!(matches!(err, DevioError::InvalidDeviceType(_)));
}

#[tokio::test]
async fn failed_handshake_never_enters_the_live_set() {
    let registry = test_registry();
    registry
        .register_type(Arc::new(StaticDevice::new("echo")))
        .unwrap();

    let (transport, peer) = MockTransport::pair();
    peer.send_raw(&encode(["c1", "echo"])); // only 2 fields

    let err = registry.accept(Box::new(transport)).await.unwrap_err();

    assert!(matches!(err, DevioError::HandshakeFailed(_)));
    assert_eq!(registry.session_count(), 0);
    assert!(peer.is_closed());
}

#[tokio::test]
async fn unregistered_type_is_refused_without_invoking_any_handler() {
    let connected = Arc::new(AtomicBool::new(false));
    let connected_flag = Arc::clone(&connected);

    let mut registry = test_registry();
    registry
        .register_type(Arc::new(StaticDevice::new("echo").on_connect(
            move |_session| {
                let flag = Arc::clone(&connected_flag);
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            },
        )))
        .unwrap();

    let generic = Arc::new(AtomicBool::new(false));
    let generic_flag = Arc::clone(&generic);
    registry.on_connect(move |_session| {
        let flag = Arc::clone(&generic_flag);
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }
    });

    let (transport, peer) = MockTransport::pair();
    peer.send_raw(&encode(["c1", "thermostat", "{}"]));

    let err = registry.accept(Box::new(transport)).await.unwrap_err();

    assert!(matches!(err, DevioError::UnregisteredDeviceType(t) if t == "thermostat"));
    assert_eq!(registry.session_count(), 0);
    assert!(peer.is_closed());
    assert!(!connected.load(Ordering::SeqCst));
    assert!(!generic.load(Ordering::SeqCst));
}

#[tokio::test]
async fn lifecycle_hooks_run_type_specific_before_generic_and_are_isolated() {
    let order = Arc::new(std::sync::Mutex::new(Vec::<&'static str>::new()));

    let mut registry = test_registry();
    let o = Arc::clone(&order);
    registry
        .register_type(Arc::new(
            StaticDevice::new("echo")
                .on_connect({
                    let o = Arc::clone(&o);
                    move |_session| {
                        let o = Arc::clone(&o);
                        async move {
                            o.lock().unwrap().push("type_connect");
                            // A failing type-specific handler must not block
                            // the generic hook or the connection.
                            Err(anyhow::anyhow!("connect handler failed"))
                        }
                    }
                })
                .on_disconnect({
                    let o = Arc::clone(&o);
                    move |_session| {
                        let o = Arc::clone(&o);
                        async move {
                            o.lock().unwrap().push("type_disconnect");
                            Ok(())
                        }
                    }
                }),
        ))
        .unwrap();

    registry.on_connect({
        let o = Arc::clone(&order);
        move |_session| {
            let o = Arc::clone(&o);
            async move {
                o.lock().unwrap().push("generic_connect");
                Ok(())
            }
        }
    });
    registry.on_disconnect({
        let o = Arc::clone(&order);
        move |_session| {
            let o = Arc::clone(&o);
            async move {
                o.lock().unwrap().push("generic_disconnect");
                Ok(())
            }
        }
    });

    let (transport, mut peer) = MockTransport::pair();
    peer.send_raw(&encode(["c1", "echo", "{}"]));
    peer.hang_up();

    registry.accept(Box::new(transport)).await.unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec![
            "type_connect",
            "generic_connect",
            "type_disconnect",
            "generic_disconnect"
        ]
    );
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test]
async fn malformed_message_does_not_terminate_the_connection() {
    let registry = Arc::new(test_registry());
    registry
        .register_type(Arc::new(StaticDevice::new("echo").on(
            "echo",
            |payload, _session| async move { Ok(Some(("echo_response".to_string(), payload))) },
        )))
        .unwrap();

    let (transport, mut peer) = MockTransport::pair();
    peer.send_raw(&encode(["c1", "echo", "{}"]));

    let reg = Arc::clone(&registry);
    let task = tokio::spawn(async move { reg.accept(Box::new(transport)).await.unwrap() });

    // A one-field packet is logged and skipped; the next message still works.
    peer.send_raw(&encode(["just_one_field"]));
    peer.send_raw(&encode(["echo", "still alive"]));

    let response = peer.rx.recv().await.unwrap();
    assert_eq!(response, r#"[/"echo_response"/][/"still alive"/]"#);

    peer.hang_up();
    task.await.unwrap();
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test]
async fn throwing_event_handler_does_not_break_the_session() {
    let registry = Arc::new(test_registry());
    registry
        .register_type(Arc::new(
            StaticDevice::new("echo")
                .on("boom", |_payload, _session| async move {
                    Err(anyhow::anyhow!("boom"))
                })
                .on("ping", |payload, _session| async move {
                    Ok(Some(("pong".to_string(), payload)))
                }),
        ))
        .unwrap();

    let (transport, mut peer) = MockTransport::pair();
    peer.send_raw(&encode(["c1", "echo", "{}"]));

    let reg = Arc::clone(&registry);
    let task = tokio::spawn(async move { reg.accept(Box::new(transport)).await.unwrap() });

    peer.send_raw(&encode(["boom", "1"]));
    peer.send_raw(&encode(["ping", "2"]));

    // Only the ping gets a response; the boom is absorbed.
    assert_eq!(peer.rx.recv().await.unwrap(), r#"[/"pong"/][/"2"/]"#);

    peer.hang_up();
    task.await.unwrap();
}

#[tokio::test]
async fn concurrent_sessions_leave_exactly_the_connected_ones() {
    let registry = Arc::new(test_registry());
    registry
        .register_type(Arc::new(StaticDevice::new("sensor")))
        .unwrap();

    let (t1, mut p1) = MockTransport::pair();
    p1.send_raw(&encode(["c1", "sensor", "{}"]));
    let (t2, mut p2) = MockTransport::pair();
    p2.send_raw(&encode(["c2", "sensor", "{}"]));

    let r1 = Arc::clone(&registry);
    let task1 = tokio::spawn(async move { r1.accept(Box::new(t1)).await.unwrap() });
    let r2 = Arc::clone(&registry);
    let task2 = tokio::spawn(async move { r2.accept(Box::new(t2)).await.unwrap() });

    {
        let registry = Arc::clone(&registry);
        wait_until(move || registry.session_count() == 2).await;
    }
    assert!(registry.session("c1").is_some());
    assert!(registry.session("c2").is_some());

    p1.hang_up();
    task1.await.unwrap();

    assert!(registry.session("c1").is_none());
    assert!(registry.session("c2").is_some());
    assert_eq!(registry.sessions_of_type("sensor"), vec!["c2".to_string()]);

    p2.hang_up();
    task2.await.unwrap();
    assert_eq!(registry.session_count(), 0);
}

#[tokio::test]
async fn reconnect_under_a_live_id_replaces_the_stale_entry() {
    let registry = Arc::new(test_registry());
    registry
        .register_type(Arc::new(StaticDevice::new("sensor")))
        .unwrap();

    let (t1, mut p1) = MockTransport::pair();
    p1.send_raw(&encode(["c1", "sensor", json!({"gen": 1}).to_string().as_str()]));
    let r1 = Arc::clone(&registry);
    let task1 = tokio::spawn(async move { r1.accept(Box::new(t1)).await.unwrap() });
    {
        let registry = Arc::clone(&registry);
        wait_until(move || registry.session_count() == 1).await;
    }

    // Same id connects again; the registry entry must now be the new session.
    let (t2, mut p2) = MockTransport::pair();
    p2.send_raw(&encode(["c1", "sensor", json!({"gen": 2}).to_string().as_str()]));
    let r2 = Arc::clone(&registry);
    let task2 = tokio::spawn(async move { r2.accept(Box::new(t2)).await.unwrap() });
    {
        let registry = Arc::clone(&registry);
        wait_until(move || {
            registry
                .session("c1")
                .is_some_and(|s| s.data() == &json!({"gen": 2}))
        })
        .await;
    }

    // The first session going away must not remove the replacement entry.
    p1.hang_up();
    task1.await.unwrap();
    assert!(
        registry
            .session("c1")
            .is_some_and(|s| s.data() == &json!({"gen": 2}))
    );

    p2.hang_up();
    task2.await.unwrap();
    assert_eq!(registry.session_count(), 0);
}
