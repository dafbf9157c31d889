// Hosts file rendering from probe surveys

use crate::application::constants::{
    HOSTS_BLOCK_BEGIN, HOSTS_BLOCK_END, NOT_UP_SENTINEL, UNKNOWN_MARKER,
};
use crate::application::probe::{ProbeOutcome, ProbeReport};

/// One hosts line per report
///
/// Machines without an address become comment lines so the block stays
/// loadable by the resolver.
pub fn hosts_line(report: &ProbeReport) -> String {
    match &report.outcome {
        ProbeOutcome::Address(address) => format!("{} {}", address, report.machine),
        ProbeOutcome::Unknown => format!("{} {}", UNKNOWN_MARKER, report.machine),
        ProbeOutcome::NotUp(_) => format!("{} {}", NOT_UP_SENTINEL, report.machine),
    }
}

/// Managed block: begin marker, one line per report, end marker
pub fn render_block(reports: &[ProbeReport]) -> String {
    let mut block = String::new();
    block.push_str(HOSTS_BLOCK_BEGIN);
    block.push('\n');
    for report in reports {
        block.push_str(&hosts_line(report));
        block.push('\n');
    }
    block.push_str(HOSTS_BLOCK_END);
    block.push('\n');
    block
}

/// Replace the managed block inside `existing`, or append it
///
/// Lines outside the markers are left untouched. An unterminated begin marker
/// swallows the rest of the file.
pub fn splice_block(existing: &str, block: &str) -> String {
    let mut result = String::with_capacity(existing.len() + block.len());
    let mut lines = existing.lines();
    let mut replaced = false;

    while let Some(line) = lines.next() {
        if !replaced && line.trim() == HOSTS_BLOCK_BEGIN {
            result.push_str(block);
            replaced = true;
            for inner in lines.by_ref() {
                if inner.trim() == HOSTS_BLOCK_END {
                    break;
                }
            }
            continue;
        }
        result.push_str(line);
        result.push('\n');
    }

    if !replaced {
        if !result.is_empty() && !result.ends_with("\n\n") {
            result.push('\n');
        }
        result.push_str(block);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::ChannelError;

    fn reports() -> Vec<ProbeReport> {
        vec![
            ProbeReport {
                machine: "web".to_string(),
                outcome: ProbeOutcome::Address("172.28.128.3".to_string()),
            },
            ProbeReport {
                machine: "db".to_string(),
                outcome: ProbeOutcome::NotUp(ChannelError::ConnectFailed("refused".to_string())),
            },
            ProbeReport {
                machine: "cache".to_string(),
                outcome: ProbeOutcome::Unknown,
            },
        ]
    }

    #[test]
    fn test_hosts_lines() {
        let lines: Vec<String> = reports().iter().map(hosts_line).collect();
        assert_eq!(
            lines,
            vec!["172.28.128.3 web", "# NOT-UP db", "# UNKNOWN cache"]
        );
    }

    #[test]
    fn test_render_block() {
        let block = render_block(&reports());
        assert_eq!(
            block,
            "# BEGIN guestctl\n172.28.128.3 web\n# NOT-UP db\n# UNKNOWN cache\n# END guestctl\n"
        );
    }

    #[test]
    fn test_splice_appends_when_missing() {
        let block = render_block(&reports()[..1]);
        let result = splice_block("127.0.0.1 localhost\n", &block);
        assert_eq!(
            result,
            "127.0.0.1 localhost\n\n# BEGIN guestctl\n172.28.128.3 web\n# END guestctl\n"
        );
    }

    #[test]
    fn test_splice_replaces_existing_block() {
        let existing = "127.0.0.1 localhost\n# BEGIN guestctl\n10.0.0.9 old\n# END guestctl\n::1 ip6-localhost\n";
        let block = render_block(&reports()[..1]);

        let result = splice_block(existing, &block);
        assert_eq!(
            result,
            "127.0.0.1 localhost\n# BEGIN guestctl\n172.28.128.3 web\n# END guestctl\n::1 ip6-localhost\n"
        );
    }

    #[test]
    fn test_splice_into_empty_file() {
        let block = render_block(&[]);
        assert_eq!(splice_block("", &block), "# BEGIN guestctl\n# END guestctl\n");
    }
}
