//! The gateway controller.
//!
//! [`Gateway`] is the one owner of the mutable session context: the attached
//! serial link, the configured tunnel address and the relay session.  The
//! poll loop, the dispatcher's side effects and the tunnel event handlers all
//! run through `&mut Gateway` on a single task, so they never overlap and no
//! locking is needed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, trace, warn};
use yellownet_core::protocol::{decode, encode, Packet};

use crate::application::dispatcher::{route, ControlCommand, Route};
use crate::application::ports::{
    AddressApprover, LinkError, Notifier, SerialLink, TunnelConnector,
};
use crate::application::relay::{RelayOutcome, RelaySession};
use crate::domain::config::DEFAULT_POLL_TIMEOUT;
use crate::domain::console::{handshake_lines, msg_line};
use crate::domain::{SessionState, TunnelEvent};

/// Alert shown when a tunnel cannot be opened or breaks.
pub const TUNNEL_FAILURE_ALERT: &str =
    "The address requested by the device was invalid or didn't have a YellowNet server.";

/// Result of delivering an inbound tunnel message to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the serial link.
    Written,
    /// Not a packet, or an invalid one.
    Rejected,
    /// No device, device closed or busy, or the write failed.
    Skipped,
}

/// Session-context owner and packet router.
pub struct Gateway {
    link: Option<Box<dyn SerialLink>>,
    relay: RelaySession,
    configured_address: Option<String>,
    connector: Arc<dyn TunnelConnector>,
    approver: Arc<dyn AddressApprover>,
    notifier: Arc<dyn Notifier>,
    events_tx: UnboundedSender<TunnelEvent>,
    events_rx: UnboundedReceiver<TunnelEvent>,
    idle_wait: Duration,
}

impl Gateway {
    pub fn new(
        connector: Arc<dyn TunnelConnector>,
        approver: Arc<dyn AddressApprover>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            link: None,
            relay: RelaySession::new(),
            configured_address: None,
            connector,
            approver,
            notifier,
            events_tx,
            events_rx,
            idle_wait: DEFAULT_POLL_TIMEOUT,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn has_device(&self) -> bool {
        self.link.is_some()
    }

    pub fn session_state(&self) -> SessionState {
        self.relay.state()
    }

    /// The last address the device asked for (and the user approved).
    pub fn configured_address(&self) -> Option<&str> {
        self.configured_address.as_deref()
    }

    /// How long the poll loop sleeps on the tunnel channel when the device
    /// had nothing to read.
    pub fn set_idle_wait(&mut self, wait: Duration) {
        self.idle_wait = wait;
    }

    pub fn idle_wait(&self) -> Duration {
        self.idle_wait
    }

    // ── Device ────────────────────────────────────────────────────────────────

    /// Opens `link`, makes it the attached device and sends the handshake.
    ///
    /// Returns whether the handshake was sent.  A skipped handshake is not an
    /// error: the device is attached either way.
    ///
    /// # Errors
    ///
    /// Returns the link's error if it cannot be opened; nothing is attached.
    pub async fn attach_device(&mut self, mut link: Box<dyn SerialLink>) -> Result<bool, LinkError> {
        link.open().await?;
        self.link = Some(link);
        info!("device attached");
        Ok(self.send_handshake().await)
    }

    /// Drops the attached device.  Polling becomes a no-op.
    pub fn detach_device(&mut self) {
        if self.link.take().is_some() {
            info!("device detached");
        }
    }

    /// Sends `echo off` and the `gateway_init` announcement, once.
    ///
    /// Skipped with a warning (never retried) when the link is closed or
    /// busy.  A failed write also abandons the rest of the handshake.
    pub async fn send_handshake(&mut self) -> bool {
        let Some(link) = self.link.as_mut() else {
            warn!("no device attached; handshake skipped");
            return false;
        };
        if !link.is_open() || link.is_busy() {
            warn!("device connected but not ready; handshake skipped, reconnect to retry");
            return false;
        }
        for line in handshake_lines() {
            if let Err(e) = link.write_ascii(&line).await {
                warn!("handshake write failed: {e}");
                return false;
            }
        }
        debug!("handshake sent");
        true
    }

    // ── Serial → dispatcher ───────────────────────────────────────────────────

    /// Decodes one serial line and dispatches it.  Non-packets are dropped.
    pub async fn handle_line(&mut self, line: &str) {
        match decode(line) {
            Some(packet) => self.dispatch(packet).await,
            None => trace!("not a packet: {line:?}"),
        }
    }

    /// Routes a decoded packet to the control handler or the tunnel.
    pub async fn dispatch(&mut self, packet: Packet) {
        match route(packet) {
            Route::Control(command) => self.handle_control(command).await,
            Route::Relay(packet) => {
                let text = encode(&packet);
                if self.relay.send(text) {
                    debug!("relayed {}.{};{} to tunnel", packet.id, packet.method, packet.resource);
                } else {
                    debug!("no open tunnel ({}); dropped {}", self.relay.state(), packet);
                }
            }
        }
    }

    async fn handle_control(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::SetAddress(address) => {
                if self.approver.approve(&address).await {
                    self.connect(&address);
                } else {
                    info!("connection to {address} declined");
                }
            }
            ControlCommand::Unknown(resource) => {
                warn!("unknown GTW command: {resource}");
            }
        }
    }

    /// Stores `address` as the configured address and (re)connects to it.
    pub fn connect(&mut self, address: &str) {
        self.configured_address = Some(address.to_string());
        self.relay
            .connect(address, self.connector.as_ref(), &self.events_tx);
    }

    // ── Tunnel → serial ───────────────────────────────────────────────────────

    /// Handles every tunnel event already queued, without waiting.
    ///
    /// Returns the number of events handled.
    pub async fn drain_tunnel_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_tunnel_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Waits up to `limit` for the next tunnel event and handles it.
    ///
    /// Returns whether an event arrived.  Used by the poll loop when the
    /// serial read did not block, so an idle gateway sleeps instead of
    /// spinning.
    pub async fn wait_for_tunnel_event(&mut self, limit: Duration) -> bool {
        let event = tokio::select! {
            event = self.events_rx.recv() => event,
            () = tokio::time::sleep(limit) => None,
        };
        match event {
            Some(event) => {
                self.handle_tunnel_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Applies one tunnel event and carries out its consequence.
    pub async fn handle_tunnel_event(&mut self, event: TunnelEvent) {
        match self.relay.apply(event) {
            RelayOutcome::Inbound(text) => {
                self.deliver_inbound(&text).await;
            }
            RelayOutcome::Failed(reason) => {
                error!("tunnel failed: {reason}");
                self.notifier.alert(TUNNEL_FAILURE_ALERT);
            }
            RelayOutcome::Opened | RelayOutcome::Closed | RelayOutcome::Ignored => {}
        }
    }

    /// Writes a server message to the device as a `msg` line.
    ///
    /// Only valid packets are delivered, and only when the link is open and
    /// idle; anything else is dropped without retry.
    pub async fn deliver_inbound(&mut self, text: &str) -> Delivery {
        let Some(packet) = decode(text) else {
            debug!("tunnel message is not a packet; dropped");
            return Delivery::Rejected;
        };
        if let Err(e) = packet.validate() {
            debug!("invalid packet from tunnel ({e}); dropped");
            return Delivery::Rejected;
        }

        let Some(link) = self.link.as_mut() else {
            debug!("no device attached; inbound packet dropped");
            return Delivery::Skipped;
        };
        if !link.is_open() || link.is_busy() {
            debug!("device closed or busy; inbound packet dropped");
            return Delivery::Skipped;
        }

        match link.write_ascii(&msg_line(&packet)).await {
            Ok(()) => Delivery::Written,
            Err(e) => {
                warn!("write to device failed: {e}");
                Delivery::Skipped
            }
        }
    }

    /// Closes the tunnel.  Called on shutdown.
    pub fn shutdown(&mut self) {
        self.relay.close();
    }

    pub(crate) fn link_mut(&mut self) -> Option<&mut Box<dyn SerialLink>> {
        self.link.as_mut()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mock::{MockSerialLink, RecordingConnector};
    use crate::application::ports::{MockAddressApprover, MockNotifier};
    use crate::domain::TunnelEventKind;

    fn approver_answering(answer: bool) -> MockAddressApprover {
        let mut approver = MockAddressApprover::new();
        approver.expect_approve().return_const(answer);
        approver
    }

    fn quiet_notifier() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_alert().never();
        notifier
    }

    async fn gateway_with(
        approver: MockAddressApprover,
        notifier: MockNotifier,
    ) -> (Gateway, MockSerialLink, RecordingConnector) {
        let link = MockSerialLink::new();
        let connector = RecordingConnector::new();
        let mut gateway = Gateway::new(
            Arc::new(connector.clone()),
            Arc::new(approver),
            Arc::new(notifier),
        );
        gateway
            .attach_device(Box::new(link.clone()))
            .await
            .expect("mock link opens");
        (gateway, link, connector)
    }

    async fn open_session(gateway: &mut Gateway, connector: &RecordingConnector) {
        gateway.connect("server");
        connector.emit_latest(TunnelEventKind::Opened);
        gateway.drain_tunnel_events().await;
        assert_eq!(gateway.session_state(), SessionState::Open);
    }

    // ── Handshake ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_attach_sends_handshake() {
        // Arrange / Act
        let (gateway, link, _) = gateway_with(approver_answering(true), quiet_notifier()).await;

        // Assert
        assert!(gateway.has_device());
        assert_eq!(
            link.written(),
            vec!["echo off\n", "msg 0.SYS;gateway_init|hello world\n"]
        );
    }

    #[tokio::test]
    async fn test_handshake_skipped_when_busy() {
        let link = MockSerialLink::new();
        link.set_busy(true);
        let mut gateway = Gateway::new(
            Arc::new(RecordingConnector::new()),
            Arc::new(approver_answering(true)),
            Arc::new(quiet_notifier()),
        );

        let sent = gateway.attach_device(Box::new(link.clone())).await.unwrap();

        assert!(!sent);
        assert!(gateway.has_device(), "device stays attached");
        assert!(link.written().is_empty());
    }

    #[tokio::test]
    async fn test_attach_fails_when_link_cannot_open() {
        let link = MockSerialLink::new();
        link.fail_open();
        let mut gateway = Gateway::new(
            Arc::new(RecordingConnector::new()),
            Arc::new(approver_answering(true)),
            Arc::new(quiet_notifier()),
        );

        let result = gateway.attach_device(Box::new(link)).await;

        assert!(result.is_err());
        assert!(!gateway.has_device());
    }

    // ── Control packets ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_set_address_approved_connects_to_exact_address() {
        // Arrange
        let mut approver = MockAddressApprover::new();
        approver
            .expect_approve()
            .withf(|address: &str| address == "10.0.0.5")
            .times(1)
            .return_const(true);
        let (mut gateway, link, connector) = gateway_with(approver, quiet_notifier()).await;
        let handshake_len = link.written().len();

        // Act
        gateway.handle_line("1.GTW;set_address|10.0.0.5").await;

        // Assert: one connect with exactly the body, no other side effect.
        assert_eq!(connector.connects(), vec![("10.0.0.5".to_string(), 1)]);
        assert!(connector.sent().is_empty());
        assert!(connector.closed().is_empty());
        assert_eq!(link.written().len(), handshake_len);
        assert_eq!(gateway.configured_address(), Some("10.0.0.5"));
        assert_eq!(gateway.session_state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn test_set_address_declined_changes_nothing() {
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(false), quiet_notifier()).await;

        gateway.handle_line("1.GTW;set_address|10.0.0.5").await;

        assert!(connector.connects().is_empty());
        assert_eq!(gateway.configured_address(), None);
        assert_eq!(gateway.session_state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_unknown_control_command_changes_nothing() {
        let mut approver = MockAddressApprover::new();
        approver.expect_approve().never();
        let (mut gateway, _, connector) = gateway_with(approver, quiet_notifier()).await;

        gateway.handle_line("1.GTW;reboot|now").await;

        assert!(connector.connects().is_empty());
        assert_eq!(gateway.session_state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_second_set_address_replaces_session() {
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        open_session(&mut gateway, &connector).await;

        gateway.handle_line("2.GTW;set_address|other:9000").await;

        assert_eq!(connector.closed(), vec![1]);
        assert_eq!(connector.connects().last(), Some(&("other:9000".to_string(), 2)));
        assert_eq!(gateway.session_state(), SessionState::Connecting);
    }

    // ── Relay to tunnel ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_packet_relayed_verbatim_when_session_open() {
        // Arrange
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        open_session(&mut gateway, &connector).await;

        // Act
        gateway.handle_line("1.MSG;chat|hello\\|world").await;

        // Assert: canonical re-encoding, no re-escaping.
        assert_eq!(
            connector.sent(),
            vec![(1, "1.MSG;chat|hello|world".to_string())]
        );
    }

    #[tokio::test]
    async fn test_packet_dropped_without_session() {
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;

        gateway.handle_line("1.MSG;chat|hello").await;

        assert!(connector.sent().is_empty());
    }

    #[tokio::test]
    async fn test_packet_dropped_while_connecting() {
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        gateway.connect("server");

        gateway.handle_line("1.MSG;chat|hello").await;

        assert!(connector.sent().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_packet_from_device_is_still_relayed() {
        // Validity gates tunnel → device only.
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        open_session(&mut gateway, &connector).await;

        gateway.handle_line("1.MSG;chat|").await;

        assert_eq!(connector.sent(), vec![(1, "1.MSG;chat|".to_string())]);
    }

    #[tokio::test]
    async fn test_noise_line_is_dropped() {
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        open_session(&mut gateway, &connector).await;

        gateway.handle_line("Loading assets").await;

        assert!(connector.sent().is_empty());
    }

    // ── Tunnel to device ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_inbound_valid_packet_written_as_msg_line() {
        let (mut gateway, link, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        open_session(&mut gateway, &connector).await;

        connector.emit_latest(TunnelEventKind::Message("5.ASW;weather|sunny".into()));
        gateway.drain_tunnel_events().await;

        assert_eq!(
            link.written().last().map(String::as_str),
            Some("msg 5.ASW;weather|sunny\n")
        );
    }

    #[tokio::test]
    async fn test_inbound_packet_not_written_when_busy() {
        // Arrange
        let (mut gateway, link, _) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        let before = link.written().len();
        link.set_busy(true);

        // Act
        let delivery = gateway.deliver_inbound("5.ASW;weather|sunny").await;

        // Assert
        assert_eq!(delivery, Delivery::Skipped);
        assert_eq!(link.written().len(), before);
    }

    #[tokio::test]
    async fn test_inbound_packet_not_written_when_link_closed() {
        let (mut gateway, link, _) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        let before = link.written().len();
        link.set_open(false);

        assert_eq!(
            gateway.deliver_inbound("5.ASW;weather|sunny").await,
            Delivery::Skipped
        );
        assert_eq!(link.written().len(), before);
    }

    #[tokio::test]
    async fn test_inbound_invalid_packet_rejected() {
        let (mut gateway, link, _) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        let before = link.written().len();

        assert_eq!(gateway.deliver_inbound("5.ASW;weather|").await, Delivery::Rejected);
        assert_eq!(gateway.deliver_inbound("garbage").await, Delivery::Rejected);
        assert_eq!(link.written().len(), before);
    }

    #[tokio::test]
    async fn test_inbound_without_device_is_skipped() {
        let mut gateway = Gateway::new(
            Arc::new(RecordingConnector::new()),
            Arc::new(approver_answering(true)),
            Arc::new(quiet_notifier()),
        );

        assert_eq!(
            gateway.deliver_inbound("5.ASW;weather|sunny").await,
            Delivery::Skipped
        );
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_tunnel_error_alerts_user_and_closes() {
        // Arrange
        let mut notifier = MockNotifier::new();
        notifier
            .expect_alert()
            .withf(|message: &str| message == TUNNEL_FAILURE_ALERT)
            .times(1)
            .return_const(());
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), notifier).await;
        gateway.connect("nowhere");

        // Act
        connector.emit_latest(TunnelEventKind::Error("connection refused".into()));
        gateway.drain_tunnel_events().await;

        // Assert
        assert_eq!(gateway.session_state(), SessionState::Closed);
        assert_eq!(connector.connects().len(), 1, "no automatic retry");
    }

    #[tokio::test]
    async fn test_server_close_does_not_alert() {
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        open_session(&mut gateway, &connector).await;

        connector.emit_latest(TunnelEventKind::Closed);
        gateway.drain_tunnel_events().await;

        assert_eq!(gateway.session_state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_closes_tunnel() {
        let (mut gateway, _, connector) =
            gateway_with(approver_answering(true), quiet_notifier()).await;
        open_session(&mut gateway, &connector).await;

        gateway.shutdown();

        assert_eq!(connector.closed(), vec![1]);
        assert_eq!(gateway.session_state(), SessionState::Closed);
    }
}
