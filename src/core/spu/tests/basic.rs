use super::{test_env, test_timing, voice_reg, CONTROL_REG};
use crate::core::spu::reverb::ReverbReg;
use crate::core::spu::{Spu, RAM_SIZE};

#[test]
fn ram_access_wraps_at_the_19_bit_boundary() {
    let mut spu = Spu::new();
    spu.write_ram(RAM_SIZE as u32, 0xAB);
    assert_eq!(spu.read_ram(0), 0xAB);
}

#[test]
fn reverb_window_round_trips_through_register_offsets() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    let addr = 0x1F80_1DC0 + (ReverbReg::VIir as u32) * 2;
    spu.write_register(addr, 0x1234, &mut timing, handle, &mut env);
    assert_eq!(spu.read_register(addr), 0x1234);
}

#[test]
fn reverb_base_address_and_volume_registers_are_outside_the_flat_window() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(0x1F80_1DA2, 0x0100, &mut timing, handle, &mut env); // mBASE
    spu.write_register(0x1F80_1D84, 0x4000, &mut timing, handle, &mut env); // vLOUT
    spu.write_register(0x1F80_1D86, 0x4000, &mut timing, handle, &mut env); // vROUT
    assert_eq!(spu.read_register(0x1F80_1DA2), 0x0100);
    assert_eq!(spu.read_register(0x1F80_1D84), 0x4000);
    assert_eq!(spu.read_register(0x1F80_1D86), 0x4000);
}

#[test]
fn main_volume_register_selects_sweep_mode() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(0x1F80_1D80, 0x8000 | 0x7F, &mut timing, handle, &mut env); // main left
    assert_eq!(spu.read_register(0x1F80_1D80), 0x8000 | 0x7F);
}

#[test]
fn control_write_disabling_irq9_clears_the_flag() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x80C0, &mut timing, handle, &mut env); // enable + irq9_enable
    spu.write_register(voice_reg(0, 0x4), 0x1000, &mut timing, handle, &mut env);
    spu.write_register(0x1F80_1DA4, 0, &mut timing, handle, &mut env); // irq address 0
    spu.write_register(0x1F80_1DA6, 0, &mut timing, handle, &mut env);
    spu.write_register(0x1F80_1DA8, 0, &mut timing, handle, &mut env); // triggers the IRQ
    assert!(spu.irq9_flag());

    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env); // irq9_enable cleared
    assert!(!spu.irq9_flag());
}

#[test]
fn capture_position_advances_and_wraps_every_0x400_bytes() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env);
    for _ in 0..512 {
        spu.execute_tick(&mut env);
    }
    assert_eq!(spu.capture_position(), 0);
}

#[test]
fn endx_is_zero_before_any_voice_has_looped() {
    let spu = Spu::new();
    assert_eq!(spu.endx(), 0);
}

#[test]
fn zero_debounce_allows_key_off_on_the_same_tick_window() {
    let mut spu = Spu::with_debounce_ticks(0);
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env);
    spu.write_register(voice_reg(0, 0x4), 0x1000, &mut timing, handle, &mut env);
    spu.write_register(0x1F80_1C88, 0x0001, &mut timing, handle, &mut env); // key on voice 0
    spu.write_register(0x1F80_1C8C, 0x0001, &mut timing, handle, &mut env); // key off, same window
    assert!(!spu.voice_on(0), "a zero-length debounce must let the key-off through immediately");
}
