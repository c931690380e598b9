//! Objective hygiene scanning.
//!
//! Before an agent is created or updated, its objective text is scanned for
//! phrases suggesting container-escape intent. A match is recorded as a
//! structured warning and logged; the operator is trusted, so nothing here
//! blocks the create/update.

use std::sync::LazyLock;

use regex::RegexSet;

use crate::types::ObjectiveHygieneFlag;

struct Pattern {
    flag: ObjectiveHygieneFlag,
    regex: &'static str,
}

const PATTERNS: &[Pattern] = &[
    Pattern {
        flag: ObjectiveHygieneFlag::PrivilegedRun,
        regex: r"(?i)\b(--privileged|privileged\s+mode|privileged\s+container)\b",
    },
    Pattern {
        flag: ObjectiveHygieneFlag::NamespaceEntry,
        regex: r"(?i)\b(nsenter|setns\(|enter\s+(the\s+)?namespace)\b",
    },
    Pattern {
        flag: ObjectiveHygieneFlag::HostFilesystemMount,
        regex: r"(?i)(mount\s+(the\s+)?host\s+(root|filesystem)|-v\s*/:/.*host|bind[- ]mount\s+/(\s|$))",
    },
    Pattern {
        flag: ObjectiveHygieneFlag::HostPidOrNet,
        regex: r"(?i)(--pid[=\s]*host|--network[=\s]*host|host\s+pid\s+namespace|host\s+network\s+namespace)",
    },
];

static PATTERN_SET: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(PATTERNS.iter().map(|p| p.regex)).expect("static patterns compile"));

/// Scan an objective's text for container-escape intent. Returns the set of
/// flags matched, in declaration order; an empty vec means nothing matched.
#[must_use]
pub fn scan(objective: &str) -> Vec<ObjectiveHygieneFlag> {
    PATTERN_SET
        .matches(objective)
        .into_iter()
        .map(|i| PATTERNS[i].flag)
        .collect()
}

/// Log a warning for each flag raised by [`scan`]. Never returns an error:
/// this is advisory only.
pub fn scan_and_log(agent_name: &str, objective: &str) -> Vec<ObjectiveHygieneFlag> {
    let flags = scan(objective);
    for flag in &flags {
        tracing::warn!(agent = agent_name, ?flag, "objective hygiene scan flagged a pattern");
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_objective_raises_nothing() {
        assert!(scan("summarize today's commits and post a digest").is_empty());
    }

    #[test]
    fn privileged_run_is_detected() {
        let flags = scan("run docker with --privileged to rebuild the image");
        assert_eq!(flags, vec![ObjectiveHygieneFlag::PrivilegedRun]);
    }

    #[test]
    fn namespace_entry_is_detected() {
        let flags = scan("use nsenter to join the target container's namespace");
        assert_eq!(flags, vec![ObjectiveHygieneFlag::NamespaceEntry]);
    }

    #[test]
    fn host_filesystem_mount_is_detected() {
        let flags = scan("mount the host root filesystem into the sandbox for inspection");
        assert_eq!(flags, vec![ObjectiveHygieneFlag::HostFilesystemMount]);
    }

    #[test]
    fn host_pid_or_net_is_detected() {
        let flags = scan("start the container with --network=host so it can reach localhost");
        assert_eq!(flags, vec![ObjectiveHygieneFlag::HostPidOrNet]);
    }

    #[test]
    fn multiple_patterns_can_match_at_once() {
        let flags = scan("run --privileged with --pid=host to debug the kernel");
        assert_eq!(flags.len(), 2);
        assert!(flags.contains(&ObjectiveHygieneFlag::PrivilegedRun));
        assert!(flags.contains(&ObjectiveHygieneFlag::HostPidOrNet));
    }
}
