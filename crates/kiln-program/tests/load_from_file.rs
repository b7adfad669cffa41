//! Integration test: write a program to disk, load it back through a
//! file loader, and size planned memory from its metadata.

use std::path::PathBuf;

use kiln_arena::PlannedBufferSet;
use kiln_core::{BufferId, PlannedMemory};
use kiln_program::{
    BufferDataLoader, FileDataLoader, MethodBuilder, OpKind, Program, ProgramError, ProgramWriter,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────

fn two_buffer_program() -> Vec<u8> {
    let mut m = MethodBuilder::new("forward");
    let a = m.planned_buffer(1024);
    let b = m.planned_buffer(2048);
    let x = m.planned_f32(a, 0, &[16]);
    let y = m.planned_f32(b, 0, &[16]);
    let s = m.double(2.0);
    m.input(x)
        .output(y)
        .instruction(OpKind::Scale, &[x, s, y]);

    let mut w = ProgramWriter::new();
    w.add_method(m.build());
    w.finish().unwrap()
}

fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("kiln-program-{tag}-{}.kiln", std::process::id()))
}

// ── Tests ───────────────────────────────────────────────────────

#[test]
fn file_and_buffer_loaders_agree() {
    let bytes = two_buffer_program();
    let path = temp_path("agree");
    std::fs::write(&path, &bytes).unwrap();

    let from_file = Program::load(&FileDataLoader::from(&path).unwrap()).unwrap();
    let from_buffer = Program::load(&BufferDataLoader::new(&bytes)).unwrap();
    assert_eq!(
        from_file.method("forward").unwrap(),
        from_buffer.method("forward").unwrap()
    );
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn metadata_sizes_the_planned_buffer_set() {
    let bytes = two_buffer_program();
    let program = Program::from_bytes(&bytes).unwrap();
    let meta = program.method_meta("forward").unwrap();

    let planned = PlannedBufferSet::from_meta(&meta).unwrap();
    assert_eq!(planned.len(), 2);
    assert_eq!(planned.size(BufferId(0)), Some(1024));
    assert_eq!(planned.size(BufferId(1)), Some(2048));
    assert_eq!(meta.total_planned_bytes(), Some(3072));
}

#[test]
fn missing_model_file_fails_before_parsing() {
    let err = FileDataLoader::from(temp_path("does-not-exist")).err().unwrap();
    assert!(matches!(err, ProgramError::Io(_)));
}

#[test]
fn truncated_program_is_rejected() {
    let bytes = two_buffer_program();
    for cut in [0, 3, 5, bytes.len() / 2, bytes.len() - 1] {
        assert!(
            Program::from_bytes(&bytes[..cut]).is_err(),
            "prefix of {cut} bytes parsed"
        );
    }
}

proptest! {
    #[test]
    fn corrupted_bytes_never_panic(pos in any::<prop::sample::Index>(), byte in any::<u8>()) {
        let mut bytes = two_buffer_program();
        let i = pos.index(bytes.len());
        bytes[i] = byte;
        // Either parses to a valid program or returns an error.
        let _ = Program::from_bytes(&bytes);
    }
}
