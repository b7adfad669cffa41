//! Profiling data gathered during a load cycle.
//!
//! [`ProfileResult`] combines the metadata arena's allocation statistics
//! with per-instruction timings and encodes both into a compact binary
//! dump. An empty result encodes to zero bytes, so callers can skip
//! writing a file when profiling was off.
//!
//! # Format
//!
//! ```text
//! [MAGIC "KPRF"] [VERSION u8]
//! [allocator_count u32] { name str, capacity u64, allocations u64,
//!                         requested u64, high_water u64, failed u64 }*
//! [method_count u32]    { name str, executions u64, instruction_count u32,
//!                         { opcode u8, calls u64, total_ns u64, max_ns u64 }* }*
//! ```

use std::time::Duration;

use kiln_arena::AllocatorProfile;
use kiln_program::OpKind;

/// Magic bytes at the start of every profile dump.
pub const PROFILE_MAGIC: [u8; 4] = *b"KPRF";

/// Current profile dump version.
pub const PROFILE_VERSION: u8 = 1;

/// Accumulated wall time of one instruction across executions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionTiming {
    /// The operator the instruction runs.
    pub op: OpKind,
    /// Number of times the instruction ran.
    pub calls: u64,
    /// Total wall time in nanoseconds.
    pub total_ns: u64,
    /// Longest single run in nanoseconds.
    pub max_ns: u64,
}

impl InstructionTiming {
    pub(crate) fn new(op: OpKind) -> Self {
        Self {
            op,
            calls: 0,
            total_ns: 0,
            max_ns: 0,
        }
    }

    pub(crate) fn record(&mut self, elapsed: Duration) {
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.calls += 1;
        self.total_ns = self.total_ns.saturating_add(ns);
        self.max_ns = self.max_ns.max(ns);
    }
}

/// Timings of one bound method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodProfile {
    /// Method name.
    pub name: String,
    /// Number of completed executions.
    pub executions: u64,
    /// One entry per instruction, in program order.
    pub instructions: Vec<InstructionTiming>,
}

/// Everything profiled during one load cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileResult {
    /// Arena allocation statistics.
    pub allocators: Vec<AllocatorProfile>,
    /// Method timings.
    pub methods: Vec<MethodProfile>,
}

impl ProfileResult {
    /// `true` when nothing was profiled.
    pub fn is_empty(&self) -> bool {
        self.allocators.is_empty() && self.methods.is_empty()
    }

    /// Encode to the binary dump format. Empty results encode to no bytes.
    pub fn encode(&self) -> Vec<u8> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut buf = Vec::new();
        buf.extend_from_slice(&PROFILE_MAGIC);
        buf.push(PROFILE_VERSION);

        put_u32(&mut buf, self.allocators.len() as u32);
        for a in &self.allocators {
            put_str(&mut buf, &a.name);
            put_u64(&mut buf, a.capacity_bytes as u64);
            put_u64(&mut buf, a.allocations);
            put_u64(&mut buf, a.requested_bytes);
            put_u64(&mut buf, a.high_water_bytes as u64);
            put_u64(&mut buf, a.failed_allocations);
        }

        put_u32(&mut buf, self.methods.len() as u32);
        for m in &self.methods {
            put_str(&mut buf, &m.name);
            put_u64(&mut buf, m.executions);
            put_u32(&mut buf, m.instructions.len() as u32);
            for t in &m.instructions {
                buf.push(t.op.opcode());
                put_u64(&mut buf, t.calls);
                put_u64(&mut buf, t.total_ns);
                put_u64(&mut buf, t.max_ns);
            }
        }
        buf
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_encodes_to_nothing() {
        let p = ProfileResult::default();
        assert!(p.is_empty());
        assert!(p.encode().is_empty());
    }

    #[test]
    fn dump_starts_with_magic_and_version() {
        let p = ProfileResult {
            allocators: vec![AllocatorProfile {
                name: "method allocator".into(),
                capacity_bytes: 64,
                allocations: 3,
                requested_bytes: 40,
                high_water_bytes: 48,
                failed_allocations: 0,
            }],
            methods: vec![],
        };
        let bytes = p.encode();
        assert_eq!(&bytes[..4], b"KPRF");
        assert_eq!(bytes[4], PROFILE_VERSION);
        assert_eq!(&bytes[5..9], &1u32.to_le_bytes());
        // name length + name + five u64 counters + empty method list
        assert_eq!(bytes.len(), 9 + 4 + 16 + 5 * 8 + 4);
    }

    #[test]
    fn timing_accumulates_calls_and_max() {
        let mut t = InstructionTiming::new(OpKind::Add);
        t.record(Duration::from_nanos(30));
        t.record(Duration::from_nanos(10));
        assert_eq!(t.calls, 2);
        assert_eq!(t.total_ns, 40);
        assert_eq!(t.max_ns, 30);
    }
}
