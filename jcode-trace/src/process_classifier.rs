use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    Unknown,
    Gcc,
    Clang,
    Gpp,
    Python,
    UserBinary,
}

impl ProcessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Unknown => "unknown",
            ProcessType::Gcc => "gcc",
            ProcessType::Clang => "clang",
            ProcessType::Gpp => "g++",
            ProcessType::Python => "python",
            ProcessType::UserBinary => "binary",
        }
    }

    pub fn is_compilation(&self) -> bool {
        matches!(self, ProcessType::Gcc | ProcessType::Clang | ProcessType::Gpp)
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, ProcessType::UserBinary | ProcessType::Python)
    }

    /// Compilers and the interpreter are only interesting together with the
    /// file they were pointed at.
    pub fn requires_target_file(&self) -> bool {
        self.is_compilation() || *self == ProcessType::Python
    }
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Toolchain path templates. Every pattern is anchored so only the full path
/// classifies.
const TOOLCHAIN_PATTERNS: [(ProcessType, &str); 7] = [
    (ProcessType::Gcc, r"^/usr/bin/gcc-\d+$"),
    (
        ProcessType::Gcc,
        r"^/usr/bin/(?:x86_64|aarch64)-linux-gnu-gcc-\d+$",
    ),
    (ProcessType::Gpp, r"^/usr/bin/g\+\+-\d+$"),
    (
        ProcessType::Gpp,
        r"^/usr/bin/(?:x86_64|aarch64)-linux-gnu-g\+\+-\d+$",
    ),
    (ProcessType::Clang, r"^/usr/lib/llvm-\d+/bin/clang$"),
    (ProcessType::Clang, r"^/usr/lib/llvm-\d+/bin/clang-\d+$"),
    (ProcessType::Python, r"^/usr(?:/local)?/bin/python3\.\d+$"),
];

fn registry() -> &'static [(ProcessType, Regex)] {
    static REGISTRY: OnceLock<Vec<(ProcessType, Regex)>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        TOOLCHAIN_PATTERNS
            .iter()
            .filter_map(|(process_type, pattern)| {
                Regex::new(pattern).ok().map(|regex| (*process_type, regex))
            })
            .collect()
    })
}

/// Maps an executable path to the toolchain it belongs to.
pub struct ProcessClassifier;

impl ProcessClassifier {
    pub fn classify(binary_path: &str) -> ProcessType {
        if binary_path.is_empty() {
            return ProcessType::Unknown;
        }

        registry()
            .iter()
            .find(|(_, regex)| regex.is_match(binary_path))
            .map(|(process_type, _)| *process_type)
            .unwrap_or(ProcessType::Unknown)
    }
}
