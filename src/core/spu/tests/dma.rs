use super::{test_env, test_timing};
use crate::core::spu::Spu;

const CONTROL_REG: u32 = 0x1F80_1DAA;
const TRANSFER_ADDR_REG: u32 = 0x1F80_1DA6;
const TRANSFER_DATA_REG: u32 = 0x1F80_1DA8;

#[test]
fn manual_transfer_writes_advance_the_cursor_and_wrap_into_ram() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000 | (1 << 4), &mut timing, handle, &mut env); // manual write mode
    spu.write_register(TRANSFER_ADDR_REG, 0, &mut timing, handle, &mut env);
    spu.write_register(TRANSFER_DATA_REG, 0xBEEF, &mut timing, handle, &mut env);
    assert_eq!(spu.read_ram(0), 0xEF);
    assert_eq!(spu.read_ram(1), 0xBE);
}

#[test]
fn dma_write_words_sets_the_request_line_only_while_in_dma_write_mode() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000 | (2 << 4), &mut timing, handle, &mut env); // DMA write mode
    assert!(spu.dma_request_asserted());

    spu.dma_write_words(&[1, 2, 3, 4], &mut env);
    assert_eq!(spu.read_ram(0), 1);
    assert_eq!(spu.read_ram(2), 2);

    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env); // stopped
    assert!(!spu.dma_request_asserted());
}

#[test]
fn dma_block_copy_matches_word_by_word_writes() {
    let mut a = Spu::new();
    let mut b = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    let words = [0x1111u16, 0x2222, 0x3333, 0x4444, 0x5555];

    a.write_register(CONTROL_REG, 0x8000 | (2 << 4), &mut timing, handle, &mut env);
    a.dma_write_words(&words, &mut env);

    b.write_register(CONTROL_REG, 0x8000 | (2 << 4), &mut timing, handle, &mut env);
    for &word in &words {
        b.write_register(TRANSFER_DATA_REG, word, &mut timing, handle, &mut env);
    }

    for addr in 0..(words.len() as u32 * 2) {
        assert_eq!(a.read_ram(addr), b.read_ram(addr));
    }
}

#[test]
fn dma_read_words_pulls_sequentially_from_the_transfer_cursor() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x8000 | (2 << 4), &mut timing, handle, &mut env);
    spu.dma_write_words(&[0xAAAA, 0xBBBB], &mut env);

    spu.write_register(TRANSFER_ADDR_REG, 0, &mut timing, handle, &mut env);
    let mut out = [0u16; 2];
    spu.dma_read_words(&mut out);
    assert_eq!(out, [0xAAAA, 0xBBBB]);
}

#[test]
fn transfer_write_raises_irq_when_address_matches() {
    let mut spu = Spu::new();
    let mut env = test_env();
    let (mut timing, handle) = test_timing();
    spu.write_register(CONTROL_REG, 0x80C0 | (1 << 4), &mut timing, handle, &mut env); // enable + irq9 + manual
    spu.write_register(0x1F80_1DA4, 0, &mut timing, handle, &mut env); // irq address = word 0 -> byte 0
    spu.write_register(TRANSFER_ADDR_REG, 0, &mut timing, handle, &mut env);
    assert!(!spu.irq9_flag());
    spu.write_register(TRANSFER_DATA_REG, 0x1234, &mut timing, handle, &mut env);
    assert!(spu.irq9_flag());
}
