mod common;

use std::time::Duration;

use common::{Harness, Platform};
use peerpad_netplay::{
    GamepadSource, InjectionStrategy, SessionCommand, SessionEvent, TransportEvent,
};
use peerpad_netproto::{Button, ControllerSnapshot, PeerMessage};
use tokio::time::timeout;

async fn expect_event(
    events: &mut tokio::sync::mpsc::Receiver<SessionEvent>,
    want: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if want(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn run_loop_drives_a_host_session() {
    let platform = Platform::new();
    let Harness {
        mut controller,
        commands,
        transport_tx,
        mut events,
        transport,
        ..
    } = Harness::new(&platform, InjectionStrategy::VirtualGamepad);

    let task = tokio::spawn(async move { controller.run().await });

    commands.send(SessionCommand::Create).await.unwrap();
    transport_tx
        .send(TransportEvent::Ready {
            id: "127.0.0.1:9000".into(),
        })
        .await
        .unwrap();
    let ready = expect_event(&mut events, |e| matches!(e, SessionEvent::Ready { .. })).await;
    assert_eq!(
        ready,
        SessionEvent::Ready {
            id: "127.0.0.1:9000".into()
        }
    );

    transport_tx
        .send(TransportEvent::Open {
            remote_id: "guest".into(),
        })
        .await
        .unwrap();
    expect_event(&mut events, |e| matches!(e, SessionEvent::Connected { .. })).await;

    transport_tx
        .send(TransportEvent::Data(PeerMessage::Input(
            ControllerSnapshot::from_pressed([Button::Start]),
        )))
        .await
        .unwrap();

    // The frame tick picks the input up without any further prodding.
    timeout(Duration::from_secs(5), async {
        loop {
            let pads = platform.gamepads.gamepads();
            if pads
                .get(1)
                .and_then(Option::as_ref)
                .is_some_and(|p| p.buttons[9].pressed)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("virtual pad never showed the remote input");

    // Idle sync runs while no ROM is loaded.
    timeout(Duration::from_secs(5), async {
        loop {
            if transport
                .lock()
                .sent
                .iter()
                .any(|m| matches!(m, PeerMessage::StateUpdate(_)))
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no idle state update sent");

    commands.send(SessionCommand::Close).await.unwrap();
    expect_event(&mut events, |e| *e == SessionEvent::Closed).await;
    timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(transport.lock().closes, 1);
}

#[tokio::test]
async fn run_loop_completes_launches_in_the_background() {
    let platform = Platform::new();
    let Harness {
        mut controller,
        commands,
        transport_tx: _transport_tx,
        mut events,
        transport,
        emulator,
        ..
    } = Harness::new(&platform, InjectionStrategy::VirtualGamepad);

    let task = tokio::spawn(async move { controller.run().await });

    commands
        .send(SessionCommand::LoadRom {
            name: "game.sfc".into(),
            data: bytes::Bytes::from_static(b"rom"),
        })
        .await
        .unwrap();
    let changed = expect_event(&mut events, |e| {
        matches!(e, SessionEvent::RomChanged { name: Some(_) })
    })
    .await;
    assert_eq!(
        changed,
        SessionEvent::RomChanged {
            name: Some("game.sfc".into())
        }
    );
    assert_eq!(emulator.lock().launches.len(), 1);

    drop(commands);
    expect_event(&mut events, |e| *e == SessionEvent::Closed).await;
    timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(emulator.lock().exits, 1);
    assert_eq!(transport.lock().closes, 1);
}
