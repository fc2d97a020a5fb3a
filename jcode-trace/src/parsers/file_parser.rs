use crate::process_classifier::ProcessType;

/// Compiler options whose value is the next argument.
const VALUE_FLAGS: [&str; 10] = [
    "-o", "-I", "-D", "-U", "-MT", "-MF", "-MQ", "-include", "-isystem", "-x",
];

const C_SOURCE_EXTENSIONS: [&str; 5] = [".c", ".cc", ".cpp", ".cxx", ".c++"];

/// Picks the source file a compiler or interpreter invocation targets.
pub struct FileParser;

impl FileParser {
    pub fn parse(process_type: ProcessType, args: &[String]) -> Option<String> {
        if args.is_empty() {
            return None;
        }

        match process_type {
            ProcessType::Python => Self::parse_python(args),
            ProcessType::Gcc | ProcessType::Clang | ProcessType::Gpp => Self::parse_compiler(args),
            ProcessType::Unknown | ProcessType::UserBinary => None,
        }
    }

    fn parse_python(args: &[String]) -> Option<String> {
        // `python -m pkg` runs a module, there is no file to track.
        if args.iter().any(|arg| arg == "-m") {
            return None;
        }

        args.iter()
            .find(|arg| !arg.starts_with('-') && arg.ends_with(".py"))
            .cloned()
    }

    fn parse_compiler(args: &[String]) -> Option<String> {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if VALUE_FLAGS.contains(&arg.as_str()) {
                iter.next();
                continue;
            }
            if arg.starts_with('-') {
                continue;
            }
            if C_SOURCE_EXTENSIONS.iter().any(|ext| arg.ends_with(ext)) {
                return Some(arg.clone());
            }
        }
        None
    }
}
