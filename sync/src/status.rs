//! Exit codes and the aggregate result of a run.

/// A watch failed for good.
pub const EXIT_WATCH: i32 = 1;

/// A mapping or its client could not be set up.
pub const EXIT_SETUP: i32 = 2;

/// An on-change command failed.
pub const EXIT_HOOK: i32 = 111;

/// Continuous mode ended without any failure. Never a real exit code.
pub const STILL_RUNNING: i32 = -1;

/// Terminal code of one mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingStatus {
    pub prefix: String,
    pub code: i32,
}

/// Terminal codes of every mapping of a run, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateStatus {
    pub run_once: bool,
    pub mappings: Vec<MappingStatus>,
}

impl AggregateStatus {
    /// An empty status.
    pub fn new(run_once: bool) -> Self {
        Self {
            run_once,
            mappings: Vec::new(),
        }
    }

    /// Record the code of one mapping.
    pub fn push(&mut self, prefix: impl Into<String>, code: i32) {
        self.mappings.push(MappingStatus {
            prefix: prefix.into(),
            code,
        });
    }

    /// Mappings that ended with a non-zero code.
    pub fn failures(&self) -> impl Iterator<Item = &MappingStatus> {
        self.mappings.iter().filter(|m| m.code != 0)
    }

    /// The first failure code, else `0` in run-once mode and
    /// [`STILL_RUNNING`] in continuous mode.
    pub fn code(&self) -> i32 {
        match self.failures().next() {
            Some(failed) => failed.code,
            None if self.run_once => 0,
            None => STILL_RUNNING,
        }
    }

    /// [`Self::code`] as a process exit code.
    pub fn exit_code(&self) -> i32 {
        match self.code() {
            STILL_RUNNING => 0,
            code => code,
        }
    }
}
