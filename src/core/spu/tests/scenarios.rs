//! End-to-end mixer scenarios driven entirely through the register file and
//! RAM, exercising the same path real software would.

use super::{test_env, test_timing};
use crate::core::spu::Spu;

const CONTROL_REG: u32 = 0x1F80_1DAA;

fn voice_reg(voice: usize, reg: u32) -> u32 {
    0x1F80_1C00 + (voice as u32) * 0x10 + reg
}

fn write_block(spu: &mut Spu, word_addr: u16, shift_filter: u8, flags: u8, nibbles: &[u8]) {
    let base = (word_addr as u32) * 8;
    spu.write_ram(base, shift_filter);
    spu.write_ram(base + 1, flags);
    for (i, pair) in nibbles.chunks(2).enumerate() {
        let lo = pair[0] & 0x0F;
        let hi = pair.get(1).copied().unwrap_or(0) & 0x0F;
        spu.write_ram(base + 2 + i as u32, lo | (hi << 4));
    }
}

#[test]
fn s1_voice_never_keyed_on_stays_silent() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env);
    for _ in 0..64 {
        let (l, r) = spu.execute_tick(&mut env);
        assert_eq!((l, r), (0, 0));
    }
}

#[test]
fn s2_attack_envelope_ramps_level_upward_from_zero() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x0), 0x3FFF, &mut timing, handle, &mut env); // left volume
    spu.write_register(voice_reg(0, 0x2), 0x3FFF, &mut timing, handle, &mut env); // right volume
    spu.write_register(voice_reg(0, 0x4), 0x1000, &mut timing, handle, &mut env); // native sample rate
    spu.write_register(voice_reg(0, 0x8), 0x7F00, &mut timing, handle, &mut env); // fast linear attack
    write_block(&mut spu, 0, 0x04, 0x00, &[15; 28]); // max positive nibbles, no loop flags
    spu.write_register(0x1F80_1C88, 0x0001, &mut timing, handle, &mut env); // key on voice 0

    assert!(spu.voice_on(0));
    let mut saw_growth = false;
    let mut last = 0i32;
    for _ in 0..64 {
        let (l, _) = spu.execute_tick(&mut env);
        if (l as i32) > last {
            saw_growth = true;
        }
        last = l as i32;
    }
    assert!(saw_growth, "attack phase should raise the output level above zero");
}

#[test]
fn s3_loop_repeat_keeps_the_voice_on_and_rewinds_to_the_repeat_address() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x0), 0x3FFF, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x2), 0x3FFF, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x4), 0x4000, &mut timing, handle, &mut env); // fast playback
    spu.write_register(voice_reg(0, 0x8), 0x7F00, &mut timing, handle, &mut env);
    // Block 0: loop_start (0x04). Block 1: loop_end | loop_repeat (0x03).
    write_block(&mut spu, 0, 0x00, 0x04, &[1; 28]);
    write_block(&mut spu, 1, 0x00, 0x03, &[1; 28]);
    spu.write_register(0x1F80_1C88, 0x0001, &mut timing, handle, &mut env);

    for _ in 0..256 {
        spu.execute_tick(&mut env);
    }
    assert!(spu.voice_on(0), "loop_repeat must keep the voice playing past loop_end");
    assert_ne!(spu.endx() & 1, 0, "ENDX must latch once the repeating block is consumed");
}

#[test]
fn s4_loop_end_without_repeat_silences_the_voice_and_sets_endx() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x0), 0x3FFF, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x2), 0x3FFF, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x4), 0x4000, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x8), 0x7F00, &mut timing, handle, &mut env);
    write_block(&mut spu, 0, 0x00, 0x01, &[1; 28]); // loop_end, no repeat
    spu.write_register(0x1F80_1C88, 0x0001, &mut timing, handle, &mut env);

    for _ in 0..256 {
        spu.execute_tick(&mut env);
    }
    assert!(!spu.voice_on(0));
    assert_ne!(spu.endx() & 1, 0);
}

fn run_voice_with_reverb_routing(route_to_reverb: bool) -> Vec<(i16, i16)> {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env); // reverb_master_enable left clear
    if route_to_reverb {
        spu.write_register(0x1F80_1D98, 0x0001, &mut timing, handle, &mut env); // route voice 0 to reverb
    }
    spu.write_register(0x1F80_1D84, 0x7FFF, &mut timing, handle, &mut env); // vLOUT
    spu.write_register(0x1F80_1D86, 0x7FFF, &mut timing, handle, &mut env); // vROUT
    spu.write_register(voice_reg(0, 0x0), 0x3FFF, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x2), 0x3FFF, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x4), 0x4000, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x8), 0x7F00, &mut timing, handle, &mut env);
    write_block(&mut spu, 0, 0x00, 0x00, &[1; 28]);
    spu.write_register(0x1F80_1C88, 0x0001, &mut timing, handle, &mut env);

    (0..64).map(|_| spu.execute_tick(&mut env)).collect()
}

#[test]
fn s5_reverb_master_disable_makes_routing_a_no_op() {
    let routed = run_voice_with_reverb_routing(true);
    let not_routed = run_voice_with_reverb_routing(false);
    assert_eq!(routed, not_routed, "a disabled reverb master must never change the mix");
}
