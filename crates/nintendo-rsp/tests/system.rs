//! SP I/O register and DMA engine behavior observed through the status
//! word and the memories.

use nintendo_rsp::Rsp;

#[test]
fn status_write_bit_pairs() {
    let mut rsp = Rsp::new();
    assert_eq!(rsp.io_read(4) & 1, 1, "powers on halted");

    rsp.io_write(4, 1); // clear halt
    assert!(!rsp.status.halted);
    rsp.io_write(4, 1 << 1); // set halt
    assert!(rsp.status.halted);

    rsp.io_write(4, 1 << 8); // set interrupt-on-break
    assert!(rsp.status.interrupt_on_break);
    rsp.io_write(4, 1 << 7);
    assert!(!rsp.status.interrupt_on_break);

    rsp.io_write(4, 1 << 10); // set signal 0
    rsp.io_write(4, 1 << 24); // set signal 7
    assert!(rsp.status.signal[0] && rsp.status.signal[7]);
    assert_eq!(rsp.io_read(4) >> 7 & 0xFF, 0x81);
    rsp.io_write(4, 1 << 9); // clear signal 0
    assert!(!rsp.status.signal[0]);

    rsp.io_write(4, 1 << 4); // force interrupt
    assert!(rsp.status.interrupt);
    rsp.io_write(4, 1 << 3); // acknowledge
    assert!(!rsp.status.interrupt);
}

#[test]
fn dma_read_fills_dmem() {
    let mut rsp = Rsp::new();
    for offset in 0..32 {
        rsp.rdram[0x100 + offset] = offset as u8 + 1;
    }
    rsp.io_write(0, 0x40); // MEM_ADDR: DMEM + 0x40
    rsp.io_write(1, 0x100); // DRAM_ADDR
    rsp.io_write(2, 24); // RD_LEN: one 32-byte row
    assert_eq!(rsp.io_read(6), 1, "busy while in flight");
    assert_eq!(rsp.io_read(4) >> 2 & 1, 1);

    rsp.step(1); // halted slice: 128 clocks, enough to retire
    assert_eq!(rsp.io_read(6), 0);
    for offset in 0..32 {
        assert_eq!(rsp.dmem.read_byte(0x40 + offset), offset as u8 + 1);
    }
}

#[test]
fn dma_write_drains_imem() {
    let mut rsp = Rsp::new();
    for offset in 0..8 {
        rsp.imem.write_byte(0x20 + offset, 0xA0 + offset as u8);
    }
    rsp.io_write(0, 1 << 12 | 0x20); // MEM_ADDR: IMEM + 0x20
    rsp.io_write(1, 0x300);
    rsp.io_write(3, 0); // WR_LEN: one 8-byte row
    rsp.step(1);
    assert_eq!(&rsp.rdram[0x300..0x308], &[0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7]);
}

#[test]
fn dma_row_skip_advances_dram_between_rows() {
    let mut rsp = Rsp::new();
    for offset in 0..0x20 {
        rsp.rdram[0x100 + offset] = offset as u8;
    }
    rsp.io_write(0, 0);
    rsp.io_write(1, 0x100);
    // two 8-byte rows with an 8-byte skip between them
    rsp.io_write(2, 8 << 20 | 1 << 12);
    rsp.step(1);
    let dmem = rsp.dmem.as_bytes();
    assert_eq!(dmem[..8], (0..8).collect::<Vec<u8>>()[..]);
    assert_eq!(dmem[8..16], (0x10..0x18).collect::<Vec<u8>>()[..]);
}

#[test]
fn dma_full_descriptor_is_promoted() {
    let mut rsp = Rsp::new();
    rsp.rdram[0x100] = 0x11;
    rsp.rdram[0x200] = 0x22;

    rsp.io_write(0, 0x00);
    rsp.io_write(1, 0x100);
    rsp.io_write(2, 0);
    assert_eq!(rsp.io_read(6), 1);

    rsp.io_write(0, 0x10);
    rsp.io_write(1, 0x200);
    rsp.io_write(2, 0);
    assert_eq!(rsp.io_read(5), 1, "second descriptor latched as full");

    rsp.step(2); // two halted slices retire both transfers
    assert_eq!(rsp.io_read(5), 0);
    assert_eq!(rsp.io_read(6), 0);
    assert_eq!(rsp.dmem.read_byte(0x00), 0x11);
    assert_eq!(rsp.dmem.read_byte(0x10), 0x22);
}

#[test]
fn rdp_register_bank_is_stubbed() {
    let mut rsp = Rsp::new();
    rsp.imem.write_word(0, 0x4008_4000); // MFC0 $t0, register 8 (RDP bank)
    rsp.imem.write_word(4, 0x4089_4000); // MTC0 $t1, register 8
    rsp.ipu.r[9] = 0xFFFF_FFFF;
    rsp.set_halted(false);
    rsp.step(2);
    assert_eq!(rsp.ipu.r[8], 0, "RDP reads return zero");
    // and the write had no observable effect on SP state
    assert_eq!(rsp.io_read(4) & 1, 0);
}
