use crate::process::{Process, StudentInfo};
use log::debug;
use regex::Regex;
use std::sync::OnceLock;

/// `jcode-{subject}-{class_number}-{student_id}`
const HOSTNAME_PATTERN: &str = r"^jcode-([a-z0-9]+)-(\d+)-(\d+)$";

fn hostname_regex() -> &'static Regex {
    static HOSTNAME: OnceLock<Regex> = OnceLock::new();
    HOSTNAME.get_or_init(|| Regex::new(HOSTNAME_PATTERN).expect("hostname pattern is valid"))
}

/// Derives the student identity from the container hostname.
pub struct StudentParser;

impl StudentParser {
    pub fn parse_from_process(process: &Process) -> Option<StudentInfo> {
        Self::parse_hostname(&process.hostname)
    }

    pub fn parse_hostname(hostname: &str) -> Option<StudentInfo> {
        let captures = hostname_regex().captures(hostname)?;
        let subject = captures.get(1)?.as_str();
        let class_number = captures.get(2)?.as_str();
        let student_id = captures.get(3)?.as_str();

        match StudentInfo::new(student_id, format!("{}-{}", subject, class_number)) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("hostname {} matched but is unusable: {}", hostname, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_on(hostname: &str) -> Process {
        Process {
            pid: 42,
            binary_path: "/usr/bin/gcc-11".to_string(),
            cwd: "/home/student/hw1".to_string(),
            args: vec![],
            error_flags: 0,
            exit_code: 0,
            hostname: hostname.to_string(),
        }
    }

    #[test]
    fn should_parse_student_container_hostname() {
        let info = StudentParser::parse_from_process(&process_on("jcode-os-1-202012345")).unwrap();

        assert_eq!(info.class_div(), "os-1");
        assert_eq!(info.student_id(), "202012345");
    }

    #[test]
    fn should_accept_alphanumeric_subject() {
        let info = StudentParser::parse_hostname("jcode-ds2-3-201911111").unwrap();

        assert_eq!(info.class_div(), "ds2-3");
    }

    #[test]
    fn should_ignore_non_student_hosts() {
        assert!(StudentParser::parse_hostname("buildkitsandbox").is_none());
        assert!(StudentParser::parse_hostname("jcode-os-1").is_none());
        assert!(StudentParser::parse_hostname("jcode-os-a-202012345").is_none());
        assert!(StudentParser::parse_hostname("xjcode-os-1-202012345").is_none());
        assert!(StudentParser::parse_hostname("jcode-os-1-202012345-extra").is_none());
        assert!(StudentParser::parse_hostname("").is_none());
    }
}
