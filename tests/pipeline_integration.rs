//! Simulated keyboard half driving the host pipeline over a loopback link.
//!
//! Board: scanner + encoder on `SimBoard`, sending through `Uplink`.
//! Host: `MessageDecoder` -> `KeyDispatcher` -> `KeyRouter` -> recording emitter.

use orione_driver::transport::{LoopbackTransport, MessageDecoder};
use orione_driver::{DriverConfig, EmitError, KeyAction, KeyCode, KeyEmitter, Keymap, Pipeline};
use orione_matrix::sim::{EncoderLine, SimBoard, SimColumn, SimDelay, SimLine, SimRow};
use orione_matrix::{Firmware, GpioEdge, MatrixScanner, RotaryEncoder, ScannerConfig, Uplink};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

type Board = Firmware<SimColumn, SimRow, SimDelay, SimLine, LoopbackTransport, 6, 17>;

/// Debounce settle time used when pressing keys in these tests
const SETTLE_US: u64 = 5_000;

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(KeyCode, KeyAction)>>>);

impl Recorder {
    fn take(&self) -> Vec<(KeyCode, KeyAction)> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl KeyEmitter for Recorder {
    fn emit(&mut self, key: KeyCode, action: KeyAction) -> Result<(), EmitError> {
        self.0.lock().push((key, action));
        Ok(())
    }
}

struct Rig {
    board: SimBoard,
    firmware: Board,
    host: LoopbackTransport,
    /// Board end of the link, for stalling its transmitter
    gate: LoopbackTransport,
    decoder: MessageDecoder,
    pipeline: Pipeline<Recorder>,
    out: Recorder,
    /// Firmware clock
    now_us: u64,
}

impl Rig {
    fn new(config: DriverConfig) -> Self {
        let board = SimBoard::new(6, 17);
        let scanner =
            MatrixScanner::new(board.columns(), board.rows(), SimDelay, ScannerConfig::default())
                .unwrap();
        let encoder = RotaryEncoder::new(
            board.encoder_line(EncoderLine::Clk),
            board.encoder_line(EncoderLine::Dt),
            board.encoder_line(EncoderLine::Sw),
        );
        let (fw_end, host) = LoopbackTransport::pair();
        let gate = fw_end.clone();
        let firmware = Firmware::new(scanner, Some(encoder), Uplink::new(fw_end));

        let out = Recorder::default();
        let pipeline = Pipeline::new(
            Handle::current(),
            &config,
            Keymap::builtin().unwrap(),
            out.clone(),
        );
        Self {
            board,
            firmware,
            host,
            gate,
            decoder: MessageDecoder::with_budget(16),
            pipeline,
            out,
            now_us: 0,
        }
    }

    /// Close or open a switch and let the column settle
    fn set_key(&mut self, row: usize, col: usize, closed: bool) {
        self.board.set_switch(row, col, closed);
        self.firmware
            .on_edge(GpioEdge::Column(col as u8), self.now_us)
            .unwrap();
        self.now_us += SETTLE_US;
        self.firmware.poll(self.now_us).unwrap();
        // Keep presses of the same key outside the bounce window
        self.now_us += 50_000;
        self.pump();
    }

    /// Decode everything on the link and dispatch it
    fn pump(&mut self) {
        while self.host.pending() > 0 {
            if let Some(msg) = self.decoder.poll_message(&mut self.host).unwrap() {
                self.pipeline.dispatch(&msg);
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn key_press_reaches_emitter() {
    let mut rig = Rig::new(DriverConfig::default());

    // Bouncing contact: only the settled state is sent
    rig.board.set_switch(2, 1, true);
    rig.firmware.on_edge(GpioEdge::Column(1), 0).unwrap();
    rig.board.set_switch(2, 1, false);
    rig.firmware.on_edge(GpioEdge::Column(1), 400).unwrap();
    rig.now_us = 800;
    rig.set_key(2, 1, true);
    rig.set_key(2, 1, false);

    assert_eq!(
        rig.out.take(),
        vec![(KeyCode::Q, KeyAction::Press), (KeyCode::Q, KeyAction::Release)]
    );
    assert_eq!(rig.decoder.stats().messages, 2);
}

#[tokio::test(start_paused = true)]
async fn held_key_repeats_at_rate_limit() {
    let mut rig = Rig::new(DriverConfig::default());

    rig.set_key(3, 1, true);
    tokio::time::sleep(Duration::from_millis(120)).await;
    rig.set_key(3, 1, false);

    assert_eq!(
        rig.out.take(),
        vec![
            (KeyCode::A, KeyAction::Press),
            (KeyCode::A, KeyAction::Repeat),
            (KeyCode::A, KeyAction::Repeat),
            (KeyCode::A, KeyAction::Release),
        ]
    );
    assert!(!rig.pipeline.dispatcher().is_repeating());
}

#[tokio::test(start_paused = true)]
async fn combination_switches_layer() {
    let mut config = DriverConfig::default();
    config.profile.modifiers = vec![KeyCode::ControlLeft, KeyCode::ShiftLeft, KeyCode::Digit2];
    let mut rig = Rig::new(config);

    rig.set_key(5, 0, true); // ControlLeft
    rig.set_key(4, 0, true); // ShiftLeft, same column
    rig.set_key(1, 2, true); // 2
    assert_eq!(rig.pipeline.router().active_profile(), 2);

    for (row, col) in [(1, 2), (4, 0), (5, 0)] {
        rig.set_key(row, col, false);
    }
    rig.out.take();

    // (2, 2) is W on the base layer and Up on layer 2
    rig.set_key(2, 2, true);
    rig.set_key(2, 2, false);
    assert_eq!(
        rig.out.take(),
        vec![(KeyCode::Up, KeyAction::Press), (KeyCode::Up, KeyAction::Release)]
    );
}

#[tokio::test(start_paused = true)]
async fn release_after_switch_uses_pressed_key() {
    let mut config = DriverConfig::default();
    config.profile.modifiers = vec![KeyCode::ControlLeft, KeyCode::Digit2];
    let mut rig = Rig::new(config);

    rig.set_key(2, 2, true); // W
    rig.set_key(5, 0, true);
    rig.set_key(1, 2, true);
    assert_eq!(rig.pipeline.router().active_profile(), 2);

    rig.set_key(2, 2, false);
    let events = rig.out.take();
    assert_eq!(events.last(), Some(&(KeyCode::W, KeyAction::Release)));
}

#[tokio::test(start_paused = true)]
async fn fn_layer_remaps_held_keys() {
    let mut rig = Rig::new(DriverConfig::default());

    rig.set_key(4, 9, true); // Fn
    assert!(rig.firmware.fn_layer_active());
    assert!(rig.pipeline.router().fn_layer_active());
    rig.set_key(1, 1, true); // 1 -> F1
    rig.set_key(2, 1, true); // Q, unmapped in fn
    rig.set_key(4, 9, false);
    rig.set_key(1, 1, false);
    rig.set_key(2, 1, false);
    rig.set_key(1, 1, true);
    rig.set_key(1, 1, false);

    assert!(!rig.pipeline.router().fn_layer_active());
    assert_eq!(
        rig.out.take(),
        vec![
            (KeyCode::F1, KeyAction::Press),
            (KeyCode::Q, KeyAction::Press),
            (KeyCode::F1, KeyAction::Release),
            (KeyCode::Q, KeyAction::Release),
            (KeyCode::Digit1, KeyAction::Press),
            (KeyCode::Digit1, KeyAction::Release),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn release_survives_busy_link() {
    let mut rig = Rig::new(DriverConfig::default());

    rig.set_key(3, 2, true);
    rig.gate.set_tx_busy(true);
    rig.board.set_switch(3, 2, false);
    rig.firmware
        .on_edge(GpioEdge::Column(2), rig.now_us)
        .unwrap();
    rig.now_us += SETTLE_US;
    assert!(rig.firmware.poll(rig.now_us).is_err());
    rig.pump();
    assert_eq!(rig.pipeline.dispatcher().pressed_keys().len(), 1);

    rig.gate.set_tx_busy(false);
    rig.now_us += 1_000;
    assert_eq!(rig.firmware.poll(rig.now_us).unwrap(), 1);
    rig.pump();

    assert_eq!(
        rig.out.take(),
        vec![(KeyCode::S, KeyAction::Press), (KeyCode::S, KeyAction::Release)]
    );
    assert!(!rig.pipeline.dispatcher().is_repeating());
}

#[tokio::test(start_paused = true)]
async fn encoder_rotation_and_button() {
    let mut rig = Rig::new(DriverConfig::default());

    // Clockwise detent: CLK falls while DT is high
    rig.board.set_line(EncoderLine::Dt, true);
    rig.board.set_line(EncoderLine::Clk, false);
    rig.firmware.on_edge(GpioEdge::EncoderClk, 0).unwrap();
    rig.firmware.poll(1_000).unwrap();
    rig.pump();

    // Counter-clockwise detent
    rig.board.set_line(EncoderLine::Clk, true);
    rig.firmware.on_edge(GpioEdge::EncoderClk, 10_000).unwrap();
    rig.firmware.poll(11_000).unwrap();
    rig.board.set_line(EncoderLine::Dt, false);
    rig.board.set_line(EncoderLine::Clk, false);
    rig.firmware.on_edge(GpioEdge::EncoderClk, 20_000).unwrap();
    rig.firmware.poll(21_000).unwrap();
    rig.pump();

    // Push
    rig.board.set_line(EncoderLine::Sw, false);
    rig.firmware.on_edge(GpioEdge::EncoderButton, 30_000).unwrap();
    rig.firmware.poll(80_000).unwrap();
    rig.board.set_line(EncoderLine::Sw, true);
    rig.firmware.on_edge(GpioEdge::EncoderButton, 100_000).unwrap();
    rig.firmware.poll(150_000).unwrap();
    rig.pump();

    assert_eq!(
        rig.out.take(),
        vec![
            (KeyCode::VolumeUp, KeyAction::Press),
            (KeyCode::VolumeUp, KeyAction::Release),
            (KeyCode::VolumeDown, KeyAction::Press),
            (KeyCode::VolumeDown, KeyAction::Release),
            (KeyCode::Mute, KeyAction::Press),
            (KeyCode::Mute, KeyAction::Release),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn garbage_on_link_is_skipped() {
    let mut rig = Rig::new(DriverConfig::default());

    rig.host.push_bytes(&[0x07, 0x42, 0x02]);
    rig.set_key(3, 2, true);
    rig.set_key(3, 2, false);

    assert_eq!(
        rig.out.take(),
        vec![(KeyCode::S, KeyAction::Press), (KeyCode::S, KeyAction::Release)]
    );
    assert!(rig.decoder.stats().desyncs > 0);
}

#[tokio::test(start_paused = true)]
async fn blocking_loop_ends_on_disconnect() {
    let mut rig = Rig::new(DriverConfig::default());

    rig.board.set_switch(3, 3, true);
    rig.firmware.on_edge(GpioEdge::Column(3), 0).unwrap();
    rig.firmware.poll(SETTLE_US).unwrap();
    rig.host.close();

    let shutdown = AtomicBool::new(false);
    let result = rig
        .pipeline
        .run_blocking(&mut rig.host, &mut rig.decoder, &shutdown);
    assert!(result.is_err());

    // The held key is released when the link goes away
    rig.pipeline.release_all();
    assert_eq!(
        rig.out.take(),
        vec![(KeyCode::D, KeyAction::Press), (KeyCode::D, KeyAction::Release)]
    );
}
