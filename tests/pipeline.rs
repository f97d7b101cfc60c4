//! Cross-module integration tests: full source-to-execution pipeline
//! (tokenize -> assemble -> link -> run) and the static-library container,
//! exercised through the public API only rather than any single module's
//! internals.

use emu32::asm::assemble;
use emu32::bus::{Bus, Ram, Rom};
use emu32::cpu::Cpu;
use emu32::lex::tokenize;
use emu32::link::link;
use emu32::object::{Archive, Binding, ObjectFile, SectionKind};
use emu32::vm::Mmu;

fn bare_metal_bus(ram_size: u32) -> Bus {
    let ram = Ram::new(0, ram_size);
    let rom = Rom::new(ram_size, vec![0u8; 0x10]);
    Bus::new(ram, rom, Mmu::new(4, 4)).unwrap()
}

fn assemble_link_run(src: &str, base: u32, ram_size: u32) -> (Cpu, Bus) {
    let tokens = tokenize(src).unwrap();
    let obj = assemble(&tokens).unwrap();
    let mut bus = bare_metal_bus(ram_size);
    let mut cpu = Cpu::new();
    link(&obj, base, &mut bus, &mut cpu).unwrap();
    cpu.run(&mut bus, 10_000, 10_000).unwrap();
    (cpu, bus)
}

#[test]
fn assembles_links_and_runs_arithmetic_to_halt() {
    // spec.md S1, carried all the way through execution rather than just
    // checked at the object-file or load stage.
    let (cpu, _bus) = assemble_link_run(
        ".text\n_start: mov x0, #5\n add x1, x0, #3\n hlt",
        0x1000,
        0x10000,
    );
    assert!(cpu.halted);
    assert_eq!(cpu.regs.read(0), 5);
    assert_eq!(cpu.regs.read(1), 8);
}

#[test]
fn forward_branch_resolved_in_pass_two_actually_skips_the_dead_instruction() {
    let (cpu, _bus) = assemble_link_run(
        ".text\n_start: b skip\n mov x0, #99\n skip: mov x0, #1\n hlt",
        0,
        0x10000,
    );
    assert_eq!(cpu.regs.read(0), 1);
}

#[test]
fn adrp_lo12_pair_materializes_a_pc_relative_data_address() {
    // The ADRP/O_LO12 idiom from the glossary: two instructions that
    // together form a 32-bit address of a `.data` symbol, loaded and used.
    let (cpu, _bus) = assemble_link_run(
        ".text\n\
         _start:\n\
         \tadrp x0, :hi20:value\n\
         \tadd x0, x0, :lo12:value\n\
         \tldr x1, [x0]\n\
         \thlt\n\
         .data\n\
         value: .word 0xCAFEBABE\n",
        0x4000,
        0x10000,
    );
    assert_eq!(cpu.regs.read(1), 0xCAFEBABE);
}

#[test]
fn load_store_round_trips_through_memory() {
    let (cpu, _bus) = assemble_link_run(
        ".text\n\
         _start:\n\
         \tmov x0, #0x40\n\
         \tmov x1, #7\n\
         \tstr x1, [x0]\n\
         \tldr x2, [x0]\n\
         \thlt\n",
        0,
        0x10000,
    );
    assert_eq!(cpu.regs.read(2), 7);
}

#[test]
fn bss_is_zero_initialised_and_occupies_no_file_bytes() {
    let tokens = tokenize(".text\n_start: hlt\n.bss\nbuf: .advance 64\n").unwrap();
    let obj = assemble(&tokens).unwrap();
    let bss_idx = obj.find_section(SectionKind::Bss).unwrap();
    assert_eq!(obj.section(bss_idx).unwrap().data.len(), 64);

    let mut bus = bare_metal_bus(0x10000);
    let mut cpu = Cpu::new();
    link(&obj, 0, &mut bus, &mut cpu).unwrap();
    let text_len = obj.section(obj.find_section(SectionKind::Text).unwrap()).unwrap().size();
    for i in 0..64 {
        assert_eq!(bus.read_byte(text_len + i, false).unwrap(), 0);
    }
}

#[test]
fn swi_assert_register_intrinsic_halts_the_program_on_violation() {
    // emu_assertr(reg, min, max): x9 = 5, checked against [10, 20] via
    // x0 = 9 (the register index), x1 = 10, x2 = 20. 5 is out of range.
    let tokens = tokenize(
        ".text\n_start:\n\
         \tmov x9, #5\n\
         \tmov x0, #9\n\
         \tmov x1, #10\n\
         \tmov x2, #20\n\
         \tmov x8, #1010\n\
         \tswi #0\n\
         \thlt\n",
    )
    .unwrap();
    let obj = assemble(&tokens).unwrap();
    let mut bus = bare_metal_bus(0x10000);
    let mut cpu = Cpu::new();
    link(&obj, 0, &mut bus, &mut cpu).unwrap();
    let err = cpu.run(&mut bus, 1000, 1000).unwrap_err();
    assert!(matches!(err, emu32::Error::Malformed(_)));
}

#[test]
fn undefined_extern_reference_surfaces_as_link_time_error() {
    let tokens = tokenize(".text\n_start: adrp x0, :hi20:missing\n hlt").unwrap();
    let obj = assemble(&tokens).unwrap();
    let mut bus = bare_metal_bus(0x10000);
    let mut cpu = Cpu::new();
    let err = link(&obj, 0, &mut bus, &mut cpu).unwrap_err();
    assert!(matches!(err, emu32::Error::UndefinedSymbol(_)));
}

#[test]
fn multiple_definition_of_the_same_global_label_is_rejected_at_assembly() {
    let tokens = tokenize(".text\n_start: hlt\n_start: hlt\n").unwrap();
    let err = assemble(&tokens).unwrap_err();
    assert!(matches!(err, emu32::Error::MultipleDefinition(_)));
}

#[test]
fn static_library_round_trips_two_distinct_object_files() {
    // spec.md §6 BAR1 format, grounded on the teacher archive container
    // but exercised here at the public-API level (assemble two real
    // units, archive them, recover each one intact).
    let tokens_a = tokenize(".text\n_start: mov x0, #1\n hlt").unwrap();
    let obj_a = assemble(&tokens_a).unwrap();

    let tokens_b = tokenize(".text\nhelper: mov x0, #2\n ret\n").unwrap();
    let mut obj_b = assemble(&tokens_b).unwrap();
    obj_b.add_symbol("helper", 0, Binding::Global, obj_b.find_section(SectionKind::Text))
        .unwrap();

    let mut archive = Archive::new();
    archive.push(obj_a.to_bytes().unwrap());
    archive.push(obj_b.to_bytes().unwrap());
    let bytes = archive.to_bytes().unwrap();

    let recovered = Archive::from_bytes(&bytes).unwrap();
    let back_a = recovered.member_object(0).unwrap();
    let back_b = recovered.member_object(1).unwrap();

    let text_a = back_a.section(back_a.find_section(SectionKind::Text).unwrap()).unwrap();
    let text_b = back_b.section(back_b.find_section(SectionKind::Text).unwrap()).unwrap();
    assert_eq!(text_a.data.len(), 8); // mov + hlt
    assert_eq!(text_b.data.len(), 8); // mov + ret(bx)
}

#[test]
fn object_file_byte_layout_round_trips_through_serialization() {
    let tokens = tokenize(".text\n_start: mov x0, #5\n hlt\n.data\nval: .word 7\n").unwrap();
    let obj = assemble(&tokens).unwrap();
    let bytes = obj.to_bytes().unwrap();
    let back = ObjectFile::from_bytes(&bytes).unwrap();

    let orig_text = obj.section(obj.find_section(SectionKind::Text).unwrap()).unwrap();
    let back_text = back.section(back.find_section(SectionKind::Text).unwrap()).unwrap();
    assert_eq!(orig_text.data, back_text.data);

    let orig_data = obj.section(obj.find_section(SectionKind::Data).unwrap()).unwrap();
    let back_data = back.section(back.find_section(SectionKind::Data).unwrap()).unwrap();
    assert_eq!(orig_data.data, back_data.data);
}
