//! Default chat behaviour.
//!
//! The hub itself has no opinion about what joining, leaving or renaming
//! means; these callbacks supply it. [`install`] wires them into a registry.

use crate::callbacks::{CallbackError, CallbackRegistry};
use crate::connection::{ConnectionId, ConnectionInfo};
use crate::hub::{Delivery, Hub};
use std::sync::Arc;
use tracing::debug;
use webchat_protocol::{Message, OpCode};

/// Register the default chat callbacks.
pub fn install(registry: &mut CallbackRegistry) {
    registry
        .on(OpCode::Register, replay_history)
        .on(OpCode::Unregister, announce_departure)
        .on(OpCode::Message, relay)
        .on(OpCode::Notice, relay)
        .on(OpCode::Nick, change_nick);
}

/// Send the current history to a newly registered connection.
///
/// # Errors
///
/// Never fails; the signature matches [`Callback`](crate::Callback).
pub fn replay_history(
    _op: OpCode,
    hub: &mut Hub,
    conn: &ConnectionInfo,
    _message: Option<&Message>,
) -> Result<(), CallbackError> {
    let replay: Vec<_> = hub
        .history()
        .iter()
        .map(|m| Arc::new(m.restamped(OpCode::History)))
        .collect();

    for message in replay {
        if hub.send_unicast(conn.id, message) != Delivery::Delivered {
            break;
        }
    }
    Ok(())
}

/// Tell everyone a connection has left.
///
/// # Errors
///
/// Never fails; the signature matches [`Callback`](crate::Callback).
pub fn announce_departure(
    _op: OpCode,
    hub: &mut Hub,
    conn: &ConnectionInfo,
    _message: Option<&Message>,
) -> Result<(), CallbackError> {
    let who = if conn.name.is_empty() {
        "someone"
    } else {
        conn.name.as_str()
    };
    hub.send_notice(format!("{who} has left"));
    Ok(())
}

/// Broadcast the message as-is.
///
/// # Errors
///
/// Returns [`CallbackError::MissingPayload`] when dispatched without a message.
pub fn relay(
    op: OpCode,
    hub: &mut Hub,
    _conn: &ConnectionInfo,
    message: Option<&Message>,
) -> Result<(), CallbackError> {
    let message = message.ok_or(CallbackError::MissingPayload(op))?;
    hub.send_broadcast(message.clone());
    Ok(())
}

/// Announce a join or rename, then record the new display name.
///
/// # Errors
///
/// Returns [`CallbackError::LookupMiss`] if the sender is no longer
/// registered, and [`CallbackError::MissingPayload`] without a message.
pub fn change_nick(
    op: OpCode,
    hub: &mut Hub,
    _conn: &ConnectionInfo,
    message: Option<&Message>,
) -> Result<(), CallbackError> {
    let message = message.ok_or(CallbackError::MissingPayload(op))?;
    let id = ConnectionId(message.id);

    let previous = hub
        .find_connection(id)
        .map_err(|_| CallbackError::LookupMiss(id))?
        .name()
        .to_string();

    if previous.is_empty() {
        hub.send_notice(format!("{} has joined", message.from));
    } else {
        hub.send_notice(format!(
            "{previous} has changed their name to {}",
            message.from
        ));
    }

    match hub.find_connection_mut(id) {
        Ok(conn) => conn.set_name(message.from.clone()),
        // The notice itself can overflow the sender's queue.
        Err(_) => debug!(connection = %id, "Connection dropped before rename"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionHandle, Outbound};
    use crate::event_loop::{HubConfig, HubEvent, HubRunner};
    use bytes::Bytes;

    fn chat_runner() -> HubRunner {
        let mut callbacks = CallbackRegistry::new();
        install(&mut callbacks);
        HubRunner::new(HubConfig::default(), callbacks).0
    }

    fn register(runner: &mut HubRunner, id: i64) -> Outbound {
        let (conn, outbound) = ConnectionHandle::new(ConnectionId(id), None, 32);
        runner.process(HubEvent::Register(conn));
        outbound
    }

    fn send(runner: &mut HubRunner, from: i64, frame: String) {
        runner.process(HubEvent::Inbound {
            from: ConnectionId(from),
            frame: Bytes::from(frame),
        });
    }

    fn drain(outbound: &mut Outbound) -> Vec<Arc<Message>> {
        std::iter::from_fn(|| outbound.try_recv()).collect()
    }

    #[test]
    fn test_chat_is_broadcast_to_everyone() {
        let mut runner = chat_runner();
        let mut a = register(&mut runner, 1);
        let mut b = register(&mut runner, 2);

        send(&mut runner, 1, r#"{"op": 2, "from": "ann", "message": "hello", "notify": true}"#.into());

        for out in [&mut a, &mut b] {
            let got = drain(out);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].op, OpCode::Message);
            assert_eq!(got[0].id, 1);
            assert_eq!(got[0].from, "ann");
            assert!(got[0].notify);
        }
    }

    #[test]
    fn test_nick_join_then_rename() {
        let mut runner = chat_runner();
        let mut a = register(&mut runner, 1);
        let mut b = register(&mut runner, 2);

        send(&mut runner, 1, r#"{"op": 5, "from": "ann"}"#.into());
        for out in [&mut a, &mut b] {
            let got = drain(out);
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].op, OpCode::Notice);
            assert_eq!(got[0].text, "ann has joined");
        }
        assert_eq!(runner.hub().find_connection(ConnectionId(1)).unwrap().name(), "ann");

        send(&mut runner, 1, r#"{"op": 5, "from": "annie"}"#.into());
        for out in [&mut a, &mut b] {
            let got = drain(out);
            assert_eq!(got[0].text, "ann has changed their name to annie");
        }
        assert_eq!(runner.hub().find_connection(ConnectionId(1)).unwrap().name(), "annie");
    }

    #[test]
    fn test_nick_uses_sender_not_client_id() {
        let mut runner = chat_runner();
        let _a = register(&mut runner, 1);
        let _b = register(&mut runner, 2);

        send(&mut runner, 2, r#"{"id": 1, "op": 5, "from": "mallory"}"#.into());

        assert_eq!(runner.hub().find_connection(ConnectionId(1)).unwrap().name(), "");
        assert_eq!(runner.hub().find_connection(ConnectionId(2)).unwrap().name(), "mallory");
    }

    #[test]
    fn test_nick_lookup_miss() {
        let mut hub = Hub::default();
        let conn = ConnectionInfo {
            id: ConnectionId(3),
            name: String::new(),
            remote: None,
        };
        let msg = Message::new(OpCode::Nick, "").with_from("nobody").with_id(3);

        assert_eq!(
            change_nick(OpCode::Nick, &mut hub, &conn, Some(&msg)),
            Err(CallbackError::LookupMiss(ConnectionId(3)))
        );
    }

    #[test]
    fn test_history_replayed_to_new_connection_only() {
        let mut runner = chat_runner();
        let mut a = register(&mut runner, 1);

        for n in 1..=7 {
            send(&mut runner, 1, format!(r#"{{"op": 2, "message": "M{n}"}}"#));
        }
        drain(&mut a);

        let mut b = register(&mut runner, 2);

        let replay = drain(&mut b);
        let texts: Vec<_> = replay.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["M3", "M4", "M5", "M6", "M7"]);
        assert!(replay.iter().all(|m| m.op == OpCode::History));
        assert!(drain(&mut a).is_empty());

        // History itself keeps the chat opcode.
        assert!(runner.hub().history().iter().all(|m| m.op == OpCode::Message));
    }

    #[test]
    fn test_departure_notice() {
        let mut runner = chat_runner();
        let _a = register(&mut runner, 1);
        let mut b = register(&mut runner, 2);
        let _c = register(&mut runner, 3);

        send(&mut runner, 1, r#"{"op": 5, "from": "ann"}"#.into());
        drain(&mut b);

        runner.process(HubEvent::Unregister(ConnectionId(1)));
        runner.process(HubEvent::Unregister(ConnectionId(3)));

        let texts: Vec<_> = drain(&mut b).iter().map(|m| m.text.clone()).collect();
        assert_eq!(texts, ["ann has left", "someone has left"]);
    }

    #[test]
    fn test_relay_without_payload() {
        let mut hub = Hub::default();
        let conn = ConnectionInfo {
            id: ConnectionId(1),
            name: String::new(),
            remote: None,
        };
        assert_eq!(
            relay(OpCode::Message, &mut hub, &conn, None),
            Err(CallbackError::MissingPayload(OpCode::Message))
        );
    }
}
