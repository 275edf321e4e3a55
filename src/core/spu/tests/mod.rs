//! Integration tests driving [`super::Spu`] through its register file and
//! mixer tick loop, as opposed to the leaf modules' own unit tests.

mod basic;
mod dma;
mod scenarios;

use super::environment::{AudioSink, CdAudioFifo, CdAudioSource, DmaRequestLine, IrqLine, SpuEnvironment};
use super::Spu;
use crate::core::timing::{EventHandle, TimingEventManager};

#[derive(Debug, Default)]
pub(super) struct RecordingIrq {
    pub raises: u32,
}

impl IrqLine for RecordingIrq {
    fn raise(&mut self) {
        self.raises += 1;
    }
}

#[derive(Debug, Default)]
pub(super) struct RecordingDmaRequest {
    pub asserted: bool,
}

impl DmaRequestLine for RecordingDmaRequest {
    fn set_request(&mut self, asserted: bool) {
        self.asserted = asserted;
    }
}

/// An [`AudioSink`] that never backpressures and remembers every frame, for
/// driving a deterministic number of ticks in a test.
#[derive(Debug, Default)]
pub(super) struct CapturingSink {
    pub frames: Vec<(i16, i16)>,
}

impl AudioSink for CapturingSink {
    fn begin_write(&mut self, frames_requested: usize) -> usize {
        frames_requested
    }

    fn write_frame(&mut self, left: i16, right: i16) {
        self.frames.push((left, right));
    }

    fn end_write(&mut self) {}

    fn get_buffer_size(&self) -> usize {
        usize::MAX
    }

    fn empty_buffers(&mut self) {
        self.frames.clear();
    }
}

pub(super) fn test_env() -> SpuEnvironment {
    SpuEnvironment::new(
        Box::new(RecordingIrq::default()),
        Box::new(RecordingDmaRequest::default()),
        Box::new(CapturingSink::default()),
        Box::new(CdAudioFifo::new(64)),
    )
}

pub(super) fn test_timing() -> (TimingEventManager, EventHandle) {
    let mut timing = TimingEventManager::new();
    let handle = timing.register_event("spu");
    (timing, handle)
}

const VOICE_BASE: u32 = 0x1F80_1C00;
const CONTROL_REG: u32 = 0x1F80_1DAA;

fn voice_reg(voice: usize, reg: u32) -> u32 {
    VOICE_BASE + (voice as u32) * 0x10 + reg
}

#[test]
fn enabling_spu_round_trips_control_register() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env);
    assert_eq!(spu.read_register(CONTROL_REG), 0x8000);
}

#[test]
fn unmapped_register_reads_as_ffff_and_ignores_writes() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    let addr = 0x1F80_1E00; // just past the register window
    spu.write_register(addr, 0x1234, &mut timing, handle, &mut env);
    assert_eq!(spu.read_register(addr), 0xFFFF);
}

#[test]
fn voice_volume_register_round_trips_through_fixed_and_sweep() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(voice_reg(0, 0x0), 0x2000, &mut timing, handle, &mut env);
    assert_eq!(spu.read_register(voice_reg(0, 0x0)), 0x2000);

    spu.write_register(voice_reg(0, 0x2), 0x8000 | 0x1F, &mut timing, handle, &mut env);
    assert_eq!(spu.read_register(voice_reg(0, 0x2)), 0x8000 | 0x1F);
}

#[test]
fn key_on_is_debounced_within_two_spu_ticks() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x4), 0x1000, &mut timing, handle, &mut env);
    spu.write_register(0x1F80_1C88, 0x0001, &mut timing, handle, &mut env); // key on voice 0
    assert!(spu.voice_on(0));

    spu.write_register(0x1F80_1C8C, 0x0001, &mut timing, handle, &mut env); // key off voice 0, same tick window
    assert!(spu.voice_on(0), "debounce should have dropped the immediate key-off");
}
