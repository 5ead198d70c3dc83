use std::collections::BTreeSet;
use std::path::Path;

use pacz80_core::cpu::z80::Z80;
use pacz80_cpu_validation::{TracingBus, Z80TestCase, compare_state, read_vectors};

fn run_test_case(tc: &Z80TestCase) -> Option<String> {
    let mut cpu = Z80::new();
    let mut bus = TracingBus::new();

    tc.initial.apply(&mut cpu, &mut bus);

    // Replay scripted port input in order
    for (_, data, dir) in &tc.ports {
        if dir == "r" {
            bus.port_queue.push_back(*data);
        }
    }

    let cycles = match cpu.step(&mut bus) {
        Ok(cycles) => cycles,
        Err(err) => return Some(format!("{}: {err}", tc.name)),
    };

    if let Err(mismatch) = compare_state(&cpu, &bus, &tc.final_state) {
        return Some(format!("{}: {mismatch}", tc.name));
    }

    let writes: Vec<_> = bus.port_log().into_iter().filter(|(_, _, dir)| dir == "w").collect();
    let expected: Vec<_> = tc.ports.iter().filter(|(_, _, dir)| dir == "w").cloned().collect();
    if writes != expected {
        return Some(format!("{}: port writes (got {writes:?} exp {expected:?})", tc.name));
    }

    if cycles != tc.cycles {
        return Some(format!("{}: cycles (got {} exp {})", tc.name, cycles, tc.cycles));
    }

    None
}

#[test]
#[ignore = "needs vectors from gen_z80_tests"]
fn test_all_z80_vectors() {
    let test_dir = Path::new("test_data/z80");
    if !test_dir.exists() {
        panic!("No Z80 vectors. Run: cargo run -p pacz80-cpu-validation --bin gen_z80_tests all");
    }

    let mut entries: Vec<_> = std::fs::read_dir(test_dir)
        .expect("Failed to read test directory")
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.ends_with(".json") || name.ends_with(".json.gz")
        })
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut total_tests = 0;
    let mut total_files = 0;
    let mut failed_tests = 0;
    let mut failed_files = BTreeSet::new();
    let mut first_failures: Vec<String> = Vec::new();

    for entry in &entries {
        let filename = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        let tests = read_vectors(&path).unwrap_or_else(|e| panic!("Failed to load {path:?}: {e}"));

        assert!(!tests.is_empty(), "Test file {filename} is empty");

        for tc in &tests {
            if let Some(err) = run_test_case(tc) {
                failed_tests += 1;
                if failed_files.insert(filename.clone()) && first_failures.len() < 50 {
                    first_failures.push(err);
                }
            }
        }

        total_tests += tests.len();
        total_files += 1;
    }

    eprintln!(
        "\nZ80 vectors: {} passed, {} failed across {} files",
        total_tests - failed_tests,
        failed_tests,
        total_files
    );

    if !first_failures.is_empty() {
        eprintln!("\nFirst failure per file ({} files):", failed_files.len());
        for err in &first_failures {
            eprintln!("  {err}");
        }
    }

    if failed_tests > 0 {
        panic!(
            "{} tests failed across {} files (out of {} tests in {} files)",
            failed_tests,
            failed_files.len(),
            total_tests,
            total_files
        );
    }
}

#[test]
fn test_tracing_bus_records_instruction_traffic() {
    let mut cpu = Z80::new();
    let mut bus = TracingBus::new();
    cpu.a = 0x12;
    bus.port_queue.push_back(0x5A);
    // OUT (0x00), A; IN A, (0x40)
    bus.load(0x0000, &[0xD3, 0x00, 0xDB, 0x40]);

    assert_eq!(cpu.step(&mut bus).expect("step"), 11);
    assert_eq!(cpu.interrupt_vector, 0x12);
    assert_eq!(cpu.step(&mut bus).expect("step"), 11);
    assert_eq!(cpu.a, 0x5A);

    assert_eq!(
        bus.port_log(),
        vec![(0x1200, 0x12, "w".to_string()), (0x1240, 0x5A, "r".to_string())]
    );
    let touched: Vec<u16> = bus.touched_addresses().into_iter().collect();
    assert_eq!(touched, vec![0x0000, 0x0001, 0x0002, 0x0003]);
}

#[test]
fn test_captured_state_replays() {
    let mut cpu = Z80::new();
    let mut bus = TracingBus::new();
    cpu.set_hl(0x4000);
    cpu.a = 0x99;
    bus.load(0x0000, &[0x77]); // LD (HL), A

    let before: BTreeSet<u16> = [0x0000, 0x4000].into_iter().collect();
    let initial = pacz80_cpu_validation::Z80CpuState::capture(&cpu, &bus.memory, &before);
    let cycles = cpu.step(&mut bus).expect("step");
    let final_state = pacz80_cpu_validation::Z80CpuState::capture(&cpu, &bus.memory, &before);

    let tc = Z80TestCase {
        name: "77".to_string(),
        initial,
        final_state,
        cycles,
        ports: Vec::new(),
    };
    assert_eq!(run_test_case(&tc), None);

    let mut broken = tc.clone();
    broken.final_state.ram[1].1 = 0x00;
    let err = run_test_case(&broken).expect("mismatch");
    assert!(err.contains("RAM[0x4000]"), "{err}");
}
