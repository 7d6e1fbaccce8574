//! End-to-end tests for the relay over real loopback sockets.
//!
//! Each test starts a relay on ephemeral ports, stands in for the device
//! with a plain UDP socket, and connects browsers with `OscWsClient`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use osc_core::{
    decode_datagram, encode_datagram, OscArgument, OscBundle, OscMessage, OscPacket, TimeTag,
    MAX_BUNDLE_DEPTH,
};
use osc_web_bridge::application::{PassThrough, SetupHandshake, UdpInboundFilter};
use osc_web_bridge::domain::{HandshakeState, RelayConfig};
use osc_web_bridge::infrastructure::Relay;
use osc_ws_client::{ClientConfig, OscWsClient};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    relay: Arc<Relay>,
    device: UdpSocket,
    running: Arc<AtomicBool>,
    runner: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    async fn start(filter: Arc<dyn UdpInboundFilter>) -> Self {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = RelayConfig {
            udp_bind_addr: "127.0.0.1:0".parse().unwrap(),
            device_host: "127.0.0.1".to_string(),
            device_port: device.local_addr().unwrap().port(),
            ws_bind_addr: "127.0.0.1:0".parse().unwrap(),
            client_queue: 64,
        };
        let relay = Arc::new(Relay::bind(config, filter).await.unwrap());
        let running = Arc::new(AtomicBool::new(true));

        let runner = Arc::clone(&relay);
        let flag = Arc::clone(&running);
        let runner = tokio::spawn(async move { runner.run(flag).await });

        Self {
            relay,
            device,
            running,
            runner,
        }
    }

    /// Connects a browser whose inbound packets land in the returned channel,
    /// and waits until the relay has registered it.
    async fn connect_browser(&self) -> (OscWsClient, UnboundedReceiver<OscPacket>) {
        let expected = self.relay.connected_clients() + 1;
        let (tx, rx) = unbounded_channel();
        let config = ClientConfig {
            host: "127.0.0.1".to_string(),
            port: self.relay.local_ws_addr().port(),
        };
        let client = OscWsClient::connect(config, move |p: OscPacket| {
            let _ = tx.send(p);
        })
        .await
        .unwrap();

        timeout(WAIT, async {
            while self.relay.connected_clients() < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("relay should register the browser");

        (client, rx)
    }

    async fn device_send(&self, packet: &OscPacket) {
        self.device_send_raw(&encode_datagram(packet).unwrap()).await;
    }

    async fn device_send_raw(&self, bytes: &[u8]) {
        self.device
            .send_to(bytes, self.relay.local_udp_addr())
            .await
            .unwrap();
    }

    async fn device_recv(&self) -> OscPacket {
        let mut buf = vec![0u8; 65_536];
        let (n, _) = timeout(WAIT, self.device.recv_from(&mut buf))
            .await
            .expect("device should receive a datagram")
            .unwrap();
        decode_datagram(&buf[..n]).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

async fn recv(rx: &mut UnboundedReceiver<OscPacket>) -> OscPacket {
    timeout(WAIT, rx.recv())
        .await
        .expect("browser should receive a packet")
        .expect("handler channel closed")
}

fn analog_in(pin: u8, value: f32) -> OscPacket {
    OscMessage::new(
        format!("/bela/analogInputs/{pin}"),
        vec![OscArgument::Float(value)],
    )
    .into()
}

fn setup() -> OscPacket {
    OscMessage::empty("/osc-setup").into()
}

fn setup_reply() -> OscPacket {
    OscMessage::empty("/osc-setup-reply").into()
}

#[tokio::test]
async fn test_setup_is_answered_every_time_and_never_broadcast() {
    // Arrange
    let filter = Arc::new(SetupHandshake::new());
    let harness = Harness::start(filter.clone()).await;
    let (_browser, mut inbound) = harness.connect_browser().await;

    // Act
    harness.device_send(&setup()).await;
    let first = harness.device_recv().await;
    harness.device_send(&setup()).await;
    let second = harness.device_recv().await;
    harness.device_send(&analog_in(0, 0.5)).await;

    // Assert: two replies; the browser's first packet is the sensor reading
    assert_eq!(first, setup_reply());
    assert_eq!(second, setup_reply());
    assert_eq!(filter.state(), HandshakeState::Established);
    assert_eq!(recv(&mut inbound).await, analog_in(0, 0.5));
    assert_eq!(harness.relay.stats().replies_sent, 2);
}

#[tokio::test]
async fn test_device_packets_fan_out_to_every_browser_in_order() {
    // Arrange
    let harness = Harness::start(Arc::new(SetupHandshake::new())).await;
    let mut browsers = Vec::new();
    for _ in 0..3 {
        browsers.push(harness.connect_browser().await);
    }
    let sent: Vec<OscPacket> = (0..20).map(|i| analog_in(i % 8, i as f32 / 20.0)).collect();

    // Act
    for packet in &sent {
        harness.device_send(packet).await;
    }

    // Assert
    for (_client, inbound) in &mut browsers {
        for expected in &sent {
            assert_eq!(&recv(inbound).await, expected);
        }
    }
}

#[tokio::test]
async fn test_bundle_is_broadcast_intact() {
    let harness = Harness::start(Arc::new(SetupHandshake::new())).await;
    let (_browser, mut inbound) = harness.connect_browser().await;
    let bundle: OscPacket = OscBundle::new(
        TimeTag::new(3_900_000_000, 0),
        vec![setup(), analog_in(1, 0.125)],
    )
    .into();

    harness.device_send(&bundle).await;

    assert_eq!(recv(&mut inbound).await, bundle);
}

#[tokio::test]
async fn test_browser_packet_reaches_device_as_one_datagram() {
    // Arrange
    let harness = Harness::start(Arc::new(SetupHandshake::new())).await;
    let (browser, _inbound) = harness.connect_browser().await;
    let packet: OscPacket = OscMessage::new(
        "/bela/analogOutputs/0",
        vec![OscArgument::Float(0.75), OscArgument::Float(12.0)],
    )
    .into();

    // Act
    browser.send(&packet).await.unwrap();

    // Assert
    assert_eq!(harness.device_recv().await, packet);
}

#[tokio::test]
async fn test_malformed_datagram_does_not_disturb_the_relay() {
    // Arrange
    let harness = Harness::start(Arc::new(PassThrough)).await;
    let (_browser, mut inbound) = harness.connect_browser().await;

    // Act
    harness.device_send(&analog_in(1, 0.5)).await;
    harness.device_send_raw(b"definitely not osc").await;
    harness.device_send(&analog_in(2, 0.25)).await;

    // Assert
    assert_eq!(recv(&mut inbound).await, analog_in(1, 0.5));
    assert_eq!(recv(&mut inbound).await, analog_in(2, 0.25));
    let stats = harness.relay.stats();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.broadcasts, 2);
}

/// One message wrapped in `levels` bundles, built byte by byte.
fn nested_bundle_datagram(levels: usize) -> Vec<u8> {
    let message = b"/a\0\0,\0\0\0";
    let mut bytes = Vec::with_capacity(levels * 20 + message.len());
    for level in (1..=levels).rev() {
        let inner_len = message.len() + 20 * (level - 1);
        bytes.extend_from_slice(b"#bundle\0");
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
        bytes.extend_from_slice(&(inner_len as u32).to_be_bytes());
    }
    bytes.extend_from_slice(message);
    bytes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deeply_nested_bundle_datagram_is_rejected() {
    // Arrange
    let harness = Harness::start(Arc::new(PassThrough)).await;
    let (_browser, mut inbound) = harness.connect_browser().await;

    // Act: about 60 KB of bundle headers, then a normal reading
    harness.device_send_raw(&nested_bundle_datagram(3000)).await;
    harness.device_send(&analog_in(3, 0.5)).await;

    // Assert
    assert_eq!(recv(&mut inbound).await, analog_in(3, 0.5));
    let stats = harness.relay.stats();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.broadcasts, 1);
}

#[tokio::test]
async fn test_bundle_at_depth_limit_is_broadcast() {
    let harness = Harness::start(Arc::new(PassThrough)).await;
    let (_browser, mut inbound) = harness.connect_browser().await;
    let nested = (0..MAX_BUNDLE_DEPTH).fold(analog_in(4, 0.5), |inner, _| {
        OscBundle::new(TimeTag::IMMEDIATELY, vec![inner]).into()
    });

    harness.device_send(&nested).await;

    assert_eq!(recv(&mut inbound).await, nested);
}

#[tokio::test]
async fn test_pass_through_relay_broadcasts_setup() {
    let harness = Harness::start(Arc::new(PassThrough)).await;
    let (_browser, mut inbound) = harness.connect_browser().await;

    harness.device_send(&setup()).await;

    assert_eq!(recv(&mut inbound).await, setup());
}

#[tokio::test]
async fn test_disconnected_browser_is_removed_from_registry() {
    // Arrange
    let harness = Harness::start(Arc::new(PassThrough)).await;
    let (browser, _inbound) = harness.connect_browser().await;
    assert_eq!(harness.relay.connected_clients(), 1);

    // Act
    browser.close().await.unwrap();

    // Assert
    timeout(WAIT, async {
        while harness.relay.connected_clients() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("relay should drop the closed session");
}

#[tokio::test]
async fn test_shutdown_closes_open_browser_sessions() {
    // Arrange
    let mut harness = Harness::start(Arc::new(PassThrough)).await;
    let (browser, _inbound) = harness.connect_browser().await;

    // Act
    harness.running.store(false, Ordering::Relaxed);
    timeout(WAIT, &mut harness.runner)
        .await
        .expect("run should return after the flag clears")
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(harness.relay.connected_clients(), 0);
    timeout(WAIT, async {
        while browser.is_connected().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("browser should see the session close");
}
