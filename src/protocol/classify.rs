//! Response cleanup and classification
//!
//! Raw serial reads contain line-ending noise and usually an echo of the
//! command that was just sent. Cleanup normalizes both away; classification
//! then partitions the remainder into exactly one of success, failure or
//! ambiguous. Ambiguous replies are the executor's cue to read again.

use super::Command;

/// Outcome of matching one reply against a command's patterns.
///
/// The three variants are mutually exclusive per invocation. When a reply
/// matches both the success and the failure pattern, success wins: it is
/// checked first, and that precedence is deliberate, not incidental.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedResponse {
    /// The success pattern matched; carries the extracted text.
    Success(String),
    /// The failure pattern matched; carries the text selected by the
    /// failure pattern itself.
    Failure(String),
    /// Neither pattern matched (including an empty reply).
    Ambiguous,
}

/// Normalize line endings and drop echoed command lines.
///
/// Idempotent: cleaning already-cleaned text returns it unchanged.
pub fn clean_response(raw: &str, echoed_command: &str) -> String {
    let without_cr = raw.replace('\r', "");
    without_cr
        .lines()
        .filter(|line| *line != echoed_command)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Classify a raw reply against the command's patterns.
///
/// Both patterns are evaluated against the full cleaned text, so
/// line-anchored patterns see every line, not just the first.
pub fn classify(raw: &str, cmd: &Command) -> ClassifiedResponse {
    let cleaned = clean_response(raw, &cmd.text);

    // An empty remainder is never a silent success.
    if cleaned.trim().is_empty() {
        return ClassifiedResponse::Ambiguous;
    }

    if cmd.success.is_match(&cleaned) {
        let extracted = collect_matches(&cmd.extract, &cleaned);
        return ClassifiedResponse::Success(extracted);
    }

    if cmd.failure.is_match(&cleaned) {
        let extracted = collect_matches(&cmd.failure, &cleaned);
        return ClassifiedResponse::Failure(extracted);
    }

    ClassifiedResponse::Ambiguous
}

/// Join every non-empty match of `pattern`, one per line.
fn collect_matches(pattern: &regex::Regex, text: &str) -> String {
    pattern
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use regex::Regex;

    static CGNSINF_SUCCESS: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\+CGNSINF:").unwrap());
    static CGNSINF_EXTRACT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?m)^\+CGNSINF.*").unwrap());

    #[test]
    fn test_ok_reply_is_success() {
        let cmd = Command::new("AT+CGNSPWR=1");
        let raw = "AT+CGNSPWR=1\r\n\r\nOK\r\n";
        assert!(matches!(classify(raw, &cmd), ClassifiedResponse::Success(_)));
    }

    #[test]
    fn test_error_reply_is_failure() {
        let cmd = Command::new("AT+BOGUS");
        let raw = "AT+BOGUS\r\nERROR\r\n";
        match classify(raw, &cmd) {
            ClassifiedResponse::Failure(text) => assert_eq!(text, "ERROR"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_reply_is_ambiguous() {
        let cmd = Command::new("AT");
        assert_eq!(
            classify("AT\r\n+SOME_URC: 1\r\n", &cmd),
            ClassifiedResponse::Ambiguous
        );
    }

    #[test]
    fn test_empty_after_cleanup_is_ambiguous_not_success() {
        // A reply consisting only of the echo must never classify as
        // success, even with a catch-all success pattern.
        let anything = Regex::new(r"(?s).*").unwrap();
        let cmd = Command::new("AT").success(&anything);
        assert_eq!(classify("AT\r\n", &cmd), ClassifiedResponse::Ambiguous);
        assert_eq!(classify("", &cmd), ClassifiedResponse::Ambiguous);
    }

    #[test]
    fn test_success_takes_precedence_over_failure() {
        // Both patterns match; success is checked first.
        let success = Regex::new(r"(?m)^\+STATUS: ready$").unwrap();
        let cmd = Command::new("AT+STATUS?").success(&success);
        let raw = "AT+STATUS?\r\n+STATUS: ready\r\nERROR\r\n";
        assert!(matches!(classify(raw, &cmd), ClassifiedResponse::Success(_)));
    }

    #[test]
    fn test_outcomes_are_mutually_exclusive() {
        let cmd = Command::new("AT");
        for raw in ["AT\r\nOK\r\n", "AT\r\nERROR\r\n", "AT\r\ngarbage\r\n", "AT\r\n"] {
            let outcomes = [
                matches!(classify(raw, &cmd), ClassifiedResponse::Success(_)),
                matches!(classify(raw, &cmd), ClassifiedResponse::Failure(_)),
                matches!(classify(raw, &cmd), ClassifiedResponse::Ambiguous),
            ];
            assert_eq!(outcomes.iter().filter(|o| **o).count(), 1, "raw: {raw:?}");
        }
    }

    #[test]
    fn test_echo_removal_is_idempotent() {
        let raw = "AT+CGNSINF\r\n+CGNSINF: 1,1\r\nOK\r\n";
        let once = clean_response(raw, "AT+CGNSINF");
        let twice = clean_response(&once, "AT+CGNSINF");
        assert_eq!(once, twice);
        assert_eq!(once, "+CGNSINF: 1,1\nOK");
    }

    #[test]
    fn test_extract_selects_report_line() {
        let cmd = Command::new("AT+CGNSINF")
            .success(&CGNSINF_SUCCESS)
            .extract(&CGNSINF_EXTRACT);
        let raw = "AT+CGNSINF\r\n+CGNSINF: 1,1,,,,\r\nOK\r\n";
        match classify(raw, &cmd) {
            ClassifiedResponse::Success(text) => assert_eq!(text, "+CGNSINF: 1,1,,,,"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_line_matching() {
        // The success pattern may match on any line of the reply.
        let cmd = Command::new("AT+GMR");
        let raw = "AT+GMR\r\nRevision: 1951B08SIM7080\r\nOK\r\n";
        match classify(raw, &cmd) {
            ClassifiedResponse::Success(text) => {
                assert_eq!(text, "Revision: 1951B08SIM7080\nOK");
            }
            other => panic!("expected success, got {other:?}"),
        }
    }
}
