//! Process record decoding
//!
//! Reads the fixed kernel layout field by field from the declared offsets
//! instead of casting the buffer, so a short or misaligned sample is an error
//! rather than undefined behaviour.

use crate::errors::{Result, TraceError};
use crate::process::Process;
use jcode_trace_common::{layout, ARGS_LEN, HOSTNAME_LEN, PATH_LEN};

pub struct ProcessRecordParser;

impl ProcessRecordParser {
    pub fn decode(buffer: &[u8]) -> Result<Process> {
        Self::check_buffer_size(buffer)?;

        let pid = read_u32(buffer, layout::PID);
        let error_flags = read_u32(buffer, layout::ERROR_FLAGS);
        let exit_code = read_u32(buffer, layout::EXIT_CODE) as i32;

        let hostname = decode_text(field(buffer, layout::HOSTNAME, HOSTNAME_LEN), 0);
        let binary_path = decode_text(
            field(buffer, layout::BINARY_PATH, PATH_LEN),
            read_u32(buffer, layout::BINARY_PATH_OFFSET) as usize,
        );
        let cwd = decode_text(
            field(buffer, layout::CWD, PATH_LEN),
            read_u32(buffer, layout::CWD_OFFSET) as usize,
        );
        let args = decode_args(
            field(buffer, layout::ARGS, ARGS_LEN),
            read_u32(buffer, layout::ARGS_LEN) as usize,
        );

        Ok(Process {
            pid,
            binary_path,
            cwd,
            args,
            error_flags,
            exit_code,
            hostname,
        })
    }

    fn check_buffer_size(buffer: &[u8]) -> Result<()> {
        if buffer.is_empty() {
            return Err(TraceError::DecodeError {
                message: "Empty buffer provided for record decoding".to_string(),
            });
        }

        if buffer.len() < layout::SIZE {
            return Err(TraceError::DecodeError {
                message: format!(
                    "Buffer size {} is smaller than required size {}",
                    buffer.len(),
                    layout::SIZE
                ),
            });
        }

        Ok(())
    }
}

fn field(buffer: &[u8], offset: usize, len: usize) -> &[u8] {
    &buffer[offset..offset + len]
}

fn read_u32(buffer: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buffer[offset..offset + 4]);
    u32::from_ne_bytes(bytes)
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|pos| pos + 1)
        .unwrap_or(0);
    &bytes[..end]
}

/// Slices from `start` (clamped to the buffer), trims trailing NULs and
/// decodes lossily.
fn decode_text(bytes: &[u8], start: usize) -> String {
    let start = start.min(bytes.len());
    String::from_utf8_lossy(trim_trailing_nuls(&bytes[start..])).into_owned()
}

fn decode_args(bytes: &[u8], declared_len: usize) -> Vec<String> {
    let used = trim_trailing_nuls(&bytes[..declared_len.min(bytes.len())]);
    if used.is_empty() {
        return Vec::new();
    }

    used.split(|&b| b == 0)
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use jcode_trace_common::RawProcessRecord;

    fn decode(record: &RawProcessRecord) -> Process {
        ProcessRecordParser::decode(record.as_bytes()).unwrap()
    }

    mod buffer_validation {
        use super::*;

        #[test]
        fn should_reject_empty_buffer() {
            let result = ProcessRecordParser::decode(&[]);

            assert_matches!(result, Err(TraceError::DecodeError { message }) => {
                assert!(message.contains("Empty buffer"));
            });
        }

        #[test]
        fn should_reject_undersized_buffer() {
            let result = ProcessRecordParser::decode(&[0u8; 100]);

            assert_matches!(result, Err(TraceError::DecodeError { message }) => {
                assert!(message.contains("smaller than required"));
            });
        }

        #[test]
        fn should_accept_oversized_sample() {
            // Perf samples are padded to 8 bytes.
            let mut bytes = RawProcessRecord::new().with_pid(7).as_bytes().to_vec();
            bytes.extend_from_slice(&[0u8; 4]);

            let process = ProcessRecordParser::decode(&bytes).unwrap();
            assert_eq!(process.pid, 7);
        }
    }

    mod field_decoding {
        use super::*;

        #[test]
        fn should_decode_scalar_fields() {
            let record = RawProcessRecord::new()
                .with_pid(4321)
                .with_exit_code(-11)
                .with_error_flags(0b101);

            let process = decode(&record);
            assert_eq!(process.pid, 4321);
            assert_eq!(process.exit_code, -11);
            assert_eq!(process.error_flags, 0b101);
        }

        #[test]
        fn should_decode_right_aligned_paths_from_offset() {
            let record = RawProcessRecord::new()
                .with_binary_path(b"/usr/bin/x86_64-linux-gnu-gcc-11")
                .with_cwd(b"/home/student/hw1");

            let process = decode(&record);
            assert_eq!(process.binary_path, "/usr/bin/x86_64-linux-gnu-gcc-11");
            assert_eq!(process.cwd, "/home/student/hw1");
        }

        #[test]
        fn should_ignore_stale_bytes_before_offset() {
            let mut record = RawProcessRecord::new().with_cwd(b"/home/student/hw2");
            let offset = record.cwd_offset as usize;
            record.cwd[..offset].fill(b'Z');

            assert_eq!(decode(&record).cwd, "/home/student/hw2");
        }

        #[test]
        fn should_clamp_offset_past_capacity() {
            let mut record = RawProcessRecord::new().with_cwd(b"/home/student/hw2");
            record.cwd_offset = 10_000;

            assert_eq!(decode(&record).cwd, "");
        }

        #[test]
        fn should_decode_hostname() {
            let record = RawProcessRecord::new().with_hostname(b"jcode-os-1-202012345");

            assert_eq!(decode(&record).hostname, "jcode-os-1-202012345");
        }

        #[test]
        fn should_replace_invalid_utf8() {
            let record = RawProcessRecord::new().with_binary_path(&[b'/', 0xFF, 0xFE, b'a']);

            assert_eq!(decode(&record).binary_path, "/\u{FFFD}\u{FFFD}a");
        }
    }

    mod args_decoding {
        use super::*;

        #[test]
        fn should_split_args_on_nul() {
            let record = RawProcessRecord::new().with_raw_args(b"gcc\0-o\0main\0main.c\0");

            assert_eq!(decode(&record).args, vec!["gcc", "-o", "main", "main.c"]);
        }

        #[test]
        fn should_respect_declared_length() {
            let mut record = RawProcessRecord::new().with_raw_args(b"python3\0solve.py\0");
            record.args_len = 8;

            assert_eq!(decode(&record).args, vec!["python3"]);
        }

        #[test]
        fn should_keep_empty_argument_in_the_middle() {
            let record = RawProcessRecord::new().with_raw_args(b"echo\0\0x\0");

            assert_eq!(decode(&record).args, vec!["echo", "", "x"]);
        }

        #[test]
        fn should_return_no_args_for_empty_buffer() {
            assert!(decode(&RawProcessRecord::new()).args.is_empty());
        }
    }
}
