mod common;

use common::*;
use mc64k::{
    DisasmError, ImageError, MachineSnapshot, RegisterFile, disassemble, disassemble_one,
    encode_image, render_fault,
};

#[test]
fn disassembles_a_program() {
    let mut b = BytecodeBuilder::new();
    b.inst(Opcode::MoveQ, &[Ea::Gpr(0), Ea::Immediate(0x2A)]);
    b.label("loop");
    b.inst(Opcode::AddL, &[Ea::Disp(15, -8), Ea::Gpr(1)]);
    b.dbnz(Ea::Gpr(2), "loop");
    b.host(host_abi::MODULE_MEM);
    b.stop();
    let code = b.finish().expect("program should assemble");
    let listing = disassemble(&code).expect("listing should decode");
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(
        lines,
        vec![
            "0000: move.q r0, #0x2a",
            "000b: add.l -8(sp), r1",
            "0012: dbnz r2, 0x000b",
            "0018: host #2 (mem)",
            "001a: stop",
        ]
    );
}

#[test]
fn unknown_bytes_and_truncation() {
    assert_eq!(
        disassemble_one(&[0xFE], 0),
        Ok((".byte 0xfe".to_string(), 1))
    );
    assert_eq!(disassemble_one(&[0x00], 1), Err(DisasmError::OutOfRange(1)));
    assert_eq!(
        disassemble_one(&[Opcode::MoveQ.byte(), 0x00], 0),
        Err(DisasmError::Truncated {
            offset: 0,
            opcode: Opcode::MoveQ
        })
    );
}

#[test]
fn image_header_round_trip() {
    let bytes = encode_image(&[Opcode::Stop.byte()]);
    assert_eq!(&bytes[..8], b"MC64000X");
    let image = Image::from_bytes(&bytes).expect("image should parse");
    assert_eq!(image.code(), &[Opcode::Stop.byte()]);
    assert_eq!(image.reserved(), 0);

    assert!(matches!(
        Image::from_bytes(&bytes[..10]),
        Err(ImageError::TooShort(10))
    ));
    let mut bad = bytes.clone();
    bad[0] = b'X';
    assert!(matches!(
        Image::from_bytes(&bad),
        Err(ImageError::BadMagic(_))
    ));
}

#[test]
fn image_loads_from_disk() {
    let mut b = BytecodeBuilder::new();
    b.inst(Opcode::MoveQ, &[Ea::Gpr(0), Ea::Immediate(5)]);
    b.stop();
    let bytes = b.finish_image().expect("program should assemble");
    let path = std::env::temp_dir().join(format!("mc64k-image-{}.bin", std::process::id()));
    std::fs::write(&path, &bytes).expect("image should be written");
    let image = Image::load(&path);
    let _ = std::fs::remove_file(&path);
    let image = image.expect("image should load");

    let mut m = Machine::new(&image);
    unsafe { m.enter(0) }.expect("entry should be valid");
    assert_eq!(m.run(), MachineStatus::Completed);
    assert_eq!(m.gpr(0).u64(), 5);
}

#[test]
fn snapshot_serializes_to_json() {
    let m = run(|b| {
        b.inst(Opcode::MoveQ, &[Ea::Gpr(3), Ea::Immediate(9)]);
        b.inst(Opcode::FmoveD, &[Ea::Fpr(1), Ea::imm_f64(0.5)]);
        b.stop();
    });
    let snapshot = MachineSnapshot::capture(&m);
    assert_eq!(snapshot.gpr[3], 9);
    assert_eq!(snapshot.fpr[1], 0.5f64.to_bits());

    let json = serde_json::to_value(&snapshot).expect("snapshot should serialize");
    assert_eq!(json["status"], "Completed");
    assert_eq!(json["gpr"][3], 9);
    assert!(json.get("fault").is_none());
    let back: MachineSnapshot = serde_json::from_value(json).expect("snapshot should parse");
    assert_eq!(back, snapshot);
}

#[test]
fn fault_report_names_the_instruction() {
    let m = run(|b| {
        b.inst(Opcode::MoveQ, &[Ea::Gpr(0), Ea::Immediate(1)]);
        b.inst(Opcode::DivuQ, &[Ea::Gpr(0), Ea::Gpr(1)]);
        b.stop();
    });
    let report = render_fault(&m).expect("fault should be reported");
    assert_eq!(
        report,
        "machine fault: integer division by zero [zero divide]\n\
         at offset 0x000b (divu.q)\n  | divu.q r0, r1"
    );

    let clean = run(|b| {
        b.stop();
    });
    assert!(render_fault(&clean).is_none());
}

#[test]
fn narrow_views_round_trip_on_every_register() {
    let mut registers = RegisterFile::new();
    for reg in 0..16 {
        registers.gpr_mut(reg).set_u64(u64::MAX);
        registers.gpr_mut(reg).set_u16(0x1234);
        assert_eq!(registers.gpr(reg).u16(), 0x1234);
        assert_eq!(registers.gpr(reg).u64(), 0xFFFF_FFFF_FFFF_1234);
        registers.gpr_mut(reg).set_i8(-1);
        assert_eq!(registers.gpr(reg).u64(), 0xFFFF_FFFF_FFFF_12FF);
        registers.fpr_mut(reg).set_f32(1.0);
        assert_eq!(registers.fpr(reg).u32(), 1.0f32.to_bits());
    }
    registers.clear();
    assert!(registers.gprs().iter().all(|reg| reg.bits() == 0));
}
