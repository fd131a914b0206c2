//! The IEC 104 link-layer session state machine.
//!
//! A [`Session`] owns one TCP-like connection after the point the peer is
//! known: it runs the STARTDT/STOPDT/TESTFR handshake, tracks V(S)/V(R) and
//! the sliding send window, retires acknowledged frames, and reports fatal
//! protocol errors by closing. It has no opinion on how the transport was
//! obtained — [`crate::client`] dials out and calls [`Session::connect_client`];
//! [`crate::server`] accepts and calls [`Session::server`] followed by
//! [`Session::start`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::bitops;
use crate::decoder::StreamingDecoder;
use crate::error::{Iec104Error, Result};
use crate::timer::Timer;
use crate::types::{Apci, Asdu, UFunction};

/// Default window size: number of unacknowledged I-frames the sender may
/// have outstanding.
pub const DEFAULT_K: u16 = 12;
/// Default acknowledgement threshold: frames the receiver may leave
/// unacknowledged before it must send an S-frame on its own initiative.
pub const DEFAULT_W: u16 = 8;
/// Default T0: connection establishment timeout.
pub const DEFAULT_T0: Duration = Duration::from_secs(30);
/// Default T1: outbound acknowledgement timeout.
pub const DEFAULT_T1: Duration = Duration::from_secs(15);
/// Default T2: acknowledgement hold-off, relevant only if a caller batches
/// S-frames; unused by this crate's own send/receive path (see
/// [`SessionConfig::t2`]).
pub const DEFAULT_T2: Duration = Duration::from_secs(10);
/// Default T3: idle-connection test timeout.
pub const DEFAULT_T3: Duration = Duration::from_secs(20);

/// Session-level configuration: window sizes, timer durations, and whether
/// ASDUs on this link carry an originator address octet.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Sliding window size (k): max unacknowledged outbound I-frames.
    pub k: u16,
    /// Acknowledgement threshold (w): present for parity with the reference
    /// parameter set; this crate acknowledges every I-frame individually
    /// rather than batching up to `w`.
    pub w: u16,
    /// T0: connection/handshake timeout (client role only).
    pub t0: Duration,
    /// T1: outbound acknowledgement timeout.
    pub t1: Duration,
    /// T2: acknowledgement hold-off. Declared for API completeness; never
    /// armed by this crate's one-S-frame-per-I-frame receive path.
    pub t2: Duration,
    /// T3: idle-connection test timeout.
    pub t3: Duration,
    /// Whether ASDU headers on this link carry an originator address octet.
    pub with_oa: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            w: DEFAULT_W,
            t0: DEFAULT_T0,
            t1: DEFAULT_T1,
            t2: DEFAULT_T2,
            t3: DEFAULT_T3,
            with_oa: false,
        }
    }
}

impl SessionConfig {
    /// Set the window size.
    pub fn k(mut self, k: u16) -> Self {
        self.k = k;
        self
    }

    /// Set the acknowledgement threshold.
    pub fn w(mut self, w: u16) -> Self {
        self.w = w;
        self
    }

    /// Set T0.
    pub fn t0(mut self, t0: Duration) -> Self {
        self.t0 = t0;
        self
    }

    /// Set T1.
    pub fn t1(mut self, t1: Duration) -> Self {
        self.t1 = t1;
        self
    }

    /// Set T2.
    pub fn t2(mut self, t2: Duration) -> Self {
        self.t2 = t2;
        self
    }

    /// Set T3.
    pub fn t3(mut self, t3: Duration) -> Self {
        self.t3 = t3;
        self
    }

    /// Enable the originator address octet on ASDU headers.
    pub fn with_originator_address(mut self) -> Self {
        self.with_oa = true;
        self
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Fatally closed; `fatal_error` on the session describes why.
    Closed,
    /// Client role, STARTDT sent, awaiting STARTDT confirmation.
    Connecting,
    /// Server role, accepted but no STARTDT handshake has run yet.
    Idle,
    /// Handshake complete; I-frames may flow.
    Running,
    /// Gracefully stopped via STOPDT; the transport is closed.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Client,
    Server,
}

struct Core<T> {
    writer: WriteHalf<T>,
    state: SessionState,
    send_seq: u16,
    recv_seq: u16,
    peer_ack: u16,
    unacked: BTreeMap<u16, Bytes>,
    // `Iec104Error` is not `Clone` (it wraps `std::io::Error`), so the fatal
    // cause is stored once behind an `Arc` and every later reader gets a
    // fresh `SessionClosed` error carrying the original's message.
    fatal_error: Option<Arc<Iec104Error>>,
}

impl<T: AsyncWrite + Unpin> Core<T> {
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        match self.writer.write_all(bytes).await {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
                ) =>
            {
                self.fatal_error
                    .get_or_insert_with(|| Arc::new(Iec104Error::session_closed("connection lost")));
                self.state = SessionState::Closed;
                Err(Iec104Error::session_closed("connection lost"))
            }
            Err(err) => Err(Iec104Error::Io(err)),
        }
    }

    async fn write_u_frame(&mut self, function: UFunction) -> Result<()> {
        let bytes = Apci::u_frame(function).encode_header(0);
        self.write_raw(&bytes).await
    }

    async fn write_s_frame(&mut self, recv_seq: u16) -> Result<()> {
        let bytes = Apci::s_frame(recv_seq).encode_header(0);
        self.write_raw(&bytes).await
    }

    /// Remove every unacked entry satisfied by `nr`, update `peer_ack`, and
    /// report whether the window should be signalled open.
    ///
    /// Rejects an `nr` that acknowledges a sequence number beyond the
    /// highest one actually sent (`send_seq`, the next number to assign) —
    /// the reference session trusts the peer here, but a peer claiming
    /// receipt of a frame we never sent is exactly the condition
    /// `Iec104Error::UnsentAcknowledged` exists to name.
    fn acknowledge(&mut self, nr: u16) -> Result<bool> {
        if bitops::acknowledges(self.send_seq, nr) {
            return Err(Iec104Error::UnsentAcknowledged {
                nr,
                vs: self.send_seq,
            });
        }
        let to_remove: Vec<u16> = self
            .unacked
            .keys()
            .copied()
            .filter(|seq| bitops::acknowledges(*seq, nr))
            .collect();
        if to_remove.is_empty() {
            return Ok(false);
        }
        for seq in to_remove {
            self.unacked.remove(&seq);
        }
        self.peer_ack = nr;
        Ok(true)
    }
}

fn encode_i_frame(send_seq: u16, recv_seq: u16, asdu: &Asdu, with_oa: bool) -> Bytes {
    let asdu_len = asdu.encoded_len(with_oa);
    let header = Apci::i_frame(send_seq, recv_seq).encode_header(asdu_len);
    let mut buf = BytesMut::with_capacity(header.len() + asdu_len);
    buf.extend_from_slice(&header);
    asdu.encode_to(&mut buf, with_oa);
    buf.freeze()
}

/// A live IEC 104 link-layer session.
pub struct Session<T> {
    shared: Arc<Shared<T>>,
    incoming_rx: Mutex<mpsc::UnboundedReceiver<Asdu>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    closing: AtomicBool,
}

struct Shared<T> {
    core: Mutex<Core<T>>,
    role: Role,
    config: SessionConfig,
    state_tx: watch::Sender<SessionState>,
    window: Notify,
    start_confirm: Notify,
    incoming_tx: mpsc::UnboundedSender<Asdu>,
    t1: Mutex<Timer>,
    t3: Mutex<Timer>,
}

impl<T> Shared<T>
where
    T: AsyncWrite + Unpin + Send + 'static,
{
    async fn set_state(&self, state: SessionState) {
        let mut core = self.core.lock().await;
        core.state = state;
        drop(core);
        let _ = self.state_tx.send(state);
    }

    async fn close_fatal(&self, error: Iec104Error) {
        let mut core = self.core.lock().await;
        if matches!(core.state, SessionState::Closed | SessionState::Stopped) {
            return;
        }
        core.fatal_error.get_or_insert_with(|| Arc::new(error));
        core.state = SessionState::Closed;
        drop(core);
        let _ = self.state_tx.send(SessionState::Closed);
        self.t1.lock().await.cancel();
        self.t3.lock().await.cancel();
        self.window.notify_waiters();
        self.start_confirm.notify_waiters();
    }

    async fn on_t1_timeout(&self) {
        let unacked_pending = {
            let core = self.core.lock().await;
            !core.unacked.is_empty()
        };
        if unacked_pending {
            self.close_fatal(Iec104Error::T1Timeout).await;
        }
    }

    async fn on_t3_timeout(&self) {
        let mut core = self.core.lock().await;
        if matches!(core.state, SessionState::Running) {
            let _ = core.write_u_frame(UFunction::TestFrAct).await;
        }
    }
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn new(transport: T, config: SessionConfig, role: Role) -> Self {
        let (read_half, write_half) = split(transport);
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let initial_state = match role {
            Role::Client => SessionState::Connecting,
            Role::Server => SessionState::Idle,
        };
        let (state_tx, _state_rx) = watch::channel(initial_state);

        let core = Core {
            writer: write_half,
            state: initial_state,
            send_seq: 0,
            recv_seq: 0,
            peer_ack: 0,
            unacked: BTreeMap::new(),
            fatal_error: None,
        };

        let shared = Arc::new_cyclic(|weak: &Weak<Shared<T>>| {
            let weak_for_t1 = weak.clone();
            let t1_callback: crate::timer::TimerCallback = Arc::new(move || {
                let weak = weak_for_t1.clone();
                Box::pin(async move {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_t1_timeout().await;
                    }
                })
            });
            let weak_for_t3 = weak.clone();
            let t3_callback: crate::timer::TimerCallback = Arc::new(move || {
                let weak = weak_for_t3.clone();
                Box::pin(async move {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_t3_timeout().await;
                    }
                })
            });
            Shared {
                core: Mutex::new(core),
                role,
                config,
                state_tx,
                window: Notify::new(),
                start_confirm: Notify::new(),
                incoming_tx,
                t1: Mutex::new(Timer::new("T1", config.t1, t1_callback)),
                t3: Mutex::new(Timer::new("T3", config.t3, t3_callback)),
            }
        });

        let reader_shared = Arc::clone(&shared);
        let reader_task = tokio::spawn(Self::read_loop(reader_shared, read_half));

        Self {
            shared,
            incoming_rx: Mutex::new(incoming_rx),
            reader_task: Mutex::new(Some(reader_task)),
            closing: AtomicBool::new(false),
        }
    }

    /// Open a client-role session over `transport` and run the handshake to
    /// completion (STARTDT act, wait for STARTDT con, T0-guarded).
    pub async fn connect_client(transport: T, config: SessionConfig) -> Result<Self> {
        let session = Self::new(transport, config, Role::Client);
        session.client_handshake().await?;
        Ok(session)
    }

    /// Wrap an accepted transport as a server-role session, in `IDLE` state.
    /// Call [`Session::start`] to wait for the peer's STARTDT handshake.
    pub fn server(transport: T, config: SessionConfig) -> Self {
        Self::new(transport, config, Role::Server)
    }

    /// For a client, equivalent to the handshake already run by
    /// [`Session::connect_client`]. For a server, waits until the peer has
    /// completed the STARTDT handshake (or the session closes first).
    pub async fn start(&self) -> Result<()> {
        match self.shared.role {
            Role::Client => {
                if self.state() == SessionState::Connecting {
                    self.client_handshake().await
                } else {
                    Ok(())
                }
            }
            Role::Server => self.wait_running().await,
        }
    }

    async fn client_handshake(&self) -> Result<()> {
        let notified = self.shared.start_confirm.notified();
        {
            let mut core = self.shared.core.lock().await;
            core.write_u_frame(UFunction::StartDtAct).await?;
        }
        match tokio::time::timeout(self.shared.config.t0, notified).await {
            Ok(()) => {
                if self.state() != SessionState::Running {
                    return Err(self.closed_error().await);
                }
                Ok(())
            }
            Err(_) => {
                self.shared.close_fatal(Iec104Error::T0Timeout).await;
                Err(Iec104Error::T0Timeout)
            }
        }
    }

    async fn wait_running(&self) -> Result<()> {
        let mut rx = self.shared.state_tx.subscribe();
        loop {
            let state = *rx.borrow();
            match state {
                SessionState::Running => return Ok(()),
                SessionState::Closed | SessionState::Stopped => return Err(self.closed_error().await),
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(self.closed_error().await);
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    async fn closed_error(&self) -> Iec104Error {
        let core = self.shared.core.lock().await;
        match &core.fatal_error {
            Some(err) => Iec104Error::session_closed(err.to_string()),
            None => Iec104Error::session_closed("session is not running"),
        }
    }

    /// Send an ASDU as an I-frame, waiting for the send window to be open
    /// and the session to be running.
    pub async fn send_asdu(&self, asdu: Asdu) -> Result<()> {
        self.wait_running().await?;

        loop {
            let notified = self.shared.window.notified();
            let window_open = {
                let core = self.shared.core.lock().await;
                if core.state != SessionState::Running {
                    return Err(self.closed_error().await);
                }
                bitops::distance(core.send_seq, core.peer_ack) < self.shared.config.k
            };
            if window_open {
                break;
            }
            notified.await;
        }

        let mut core = self.shared.core.lock().await;
        if core.state != SessionState::Running {
            return Err(self.closed_error().await);
        }
        let send_seq = core.send_seq;
        let recv_seq = core.recv_seq;
        let frame_bytes = encode_i_frame(send_seq, recv_seq, &asdu, self.shared.config.with_oa);
        core.write_raw(&frame_bytes).await?;
        core.unacked.insert(send_seq, frame_bytes);
        core.send_seq = bitops::increment(send_seq);
        drop(core);

        self.shared.t1.lock().await.start();
        Ok(())
    }

    /// Receive the next inbound ASDU, or an error once the session has
    /// stopped or closed (even if ASDUs remain queued — matching the
    /// reference session's "closed wins" ordering).
    pub async fn recv(&self) -> Result<Asdu> {
        {
            let core = self.shared.core.lock().await;
            if let Some(err) = &core.fatal_error {
                return Err(Iec104Error::session_closed(err.to_string()));
            }
            if matches!(core.state, SessionState::Closed | SessionState::Stopped) {
                return Err(Iec104Error::session_closed("session is not running"));
            }
        }
        let mut rx = self.incoming_rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| Iec104Error::session_closed("session is not running"))
    }

    /// Gracefully close: sends STOPDT (best effort), transitions to
    /// `Stopped`, and tears down the reader task and timers. Idempotent and
    /// safe to call concurrently with an in-flight `send_asdu`.
    pub async fn close(&self) -> Result<()> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        {
            let mut core = self.shared.core.lock().await;
            if !matches!(core.state, SessionState::Closed | SessionState::Stopped) {
                let _ = core.write_u_frame(UFunction::StopDtAct).await;
                core.state = SessionState::Stopped;
            }
        }
        let _ = self.shared.state_tx.send(SessionState::Stopped);
        self.shared.t1.lock().await.cancel();
        self.shared.t3.lock().await.cancel();
        self.shared.window.notify_waiters();
        self.shared.start_confirm.notify_waiters();
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn read_loop(shared: Arc<Shared<T>>, mut read_half: ReadHalf<T>) {
        use tokio::io::AsyncReadExt;

        let mut decoder = StreamingDecoder::new(shared.config.with_oa);
        let mut buf = [0u8; 1024];
        loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) => {
                    shared
                        .close_fatal(Iec104Error::session_closed("peer closed the connection"))
                        .await;
                    return;
                }
                Ok(n) => n,
                Err(err) => {
                    shared.close_fatal(Iec104Error::Io(err)).await;
                    return;
                }
            };

            let frames = match decoder.feed(&buf[..n]) {
                Ok(frames) => frames,
                Err(err) => {
                    shared.close_fatal(err).await;
                    return;
                }
            };

            for (apci, asdu) in frames {
                if let Err(err) = Self::handle_frame(&shared, apci, asdu).await {
                    shared.close_fatal(err).await;
                    return;
                }
                // Rearm T3 on every successfully processed frame: an active
                // peer, not just an active handshake, should suppress the
                // idle test.
                shared.t3.lock().await.start();
            }
        }
    }

    async fn handle_frame(shared: &Arc<Shared<T>>, apci: Apci, asdu: Option<Asdu>) -> Result<()> {
        match apci {
            Apci::IFrame { send_seq, recv_seq } => {
                let next_recv = {
                    let core = shared.core.lock().await;
                    core.recv_seq
                };
                if send_seq != next_recv {
                    return Err(Iec104Error::SequenceMismatch {
                        expected: next_recv,
                        actual: send_seq,
                    });
                }

                let mut core = shared.core.lock().await;
                core.recv_seq = bitops::increment(send_seq);
                let window_opened = core.acknowledge(recv_seq)?;
                let ack_seq = core.recv_seq;
                core.write_s_frame(ack_seq).await?;
                let unacked_empty = core.unacked.is_empty();
                drop(core);

                if window_opened {
                    shared.window.notify_waiters();
                    if unacked_empty {
                        shared.t1.lock().await.cancel();
                    }
                }

                if let Some(asdu) = asdu {
                    let _ = shared.incoming_tx.send(asdu);
                }
                Ok(())
            }
            Apci::SFrame { recv_seq } => {
                let mut core = shared.core.lock().await;
                let window_opened = core.acknowledge(recv_seq)?;
                let unacked_empty = core.unacked.is_empty();
                drop(core);
                if window_opened {
                    shared.window.notify_waiters();
                    if unacked_empty {
                        shared.t1.lock().await.cancel();
                    }
                }
                Ok(())
            }
            Apci::UFrame { function } => {
                match function {
                    UFunction::StartDtAct => {
                        let mut core = shared.core.lock().await;
                        core.write_u_frame(UFunction::StartDtCon).await?;
                        core.state = SessionState::Running;
                        drop(core);
                        let _ = shared.state_tx.send(SessionState::Running);
                        shared.t3.lock().await.start();
                    }
                    UFunction::StartDtCon => {
                        let mut core = shared.core.lock().await;
                        core.state = SessionState::Running;
                        drop(core);
                        let _ = shared.state_tx.send(SessionState::Running);
                        shared.start_confirm.notify_waiters();
                        shared.t3.lock().await.start();
                    }
                    UFunction::TestFrAct => {
                        let mut core = shared.core.lock().await;
                        core.write_u_frame(UFunction::TestFrCon).await?;
                    }
                    UFunction::TestFrCon => {
                        shared.t3.lock().await.start();
                    }
                    UFunction::StopDtAct => {
                        let mut core = shared.core.lock().await;
                        core.write_u_frame(UFunction::StopDtCon).await?;
                        core.state = SessionState::Stopped;
                        drop(core);
                        let _ = shared.state_tx.send(SessionState::Stopped);
                    }
                    UFunction::StopDtCon => {
                        let mut core = shared.core.lock().await;
                        core.state = SessionState::Stopped;
                        drop(core);
                        let _ = shared.state_tx.send(SessionState::Stopped);
                    }
                }
                Ok(())
            }
        }
    }
}
