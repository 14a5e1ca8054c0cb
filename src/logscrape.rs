//! Commit-point extraction from lnd log text — one of the three sources
//! SR.commit's caller may supply candidate commit points from (channel DB,
//! log scrape, or direct user input). Pure function: no file I/O here,
//! callers read the log file themselves.

use bitcoin::secp256k1::PublicKey;
use regex::Regex;

/// Matches a 33-byte compressed pubkey in hex, the form lnd's debug log
/// prints commitment/revocation points in (e.g. `RemoteCommitPoint(02ab...)`
/// or a bare 66-hex-char token on its own line).
fn commit_point_regex() -> Regex {
    Regex::new(r"(0[23][0-9a-fA-F]{64})").expect("fixed pattern is valid regex")
}

/// Scans `text` for every 33-byte compressed-pubkey hex token and parses
/// it as a candidate commit point, deduplicating while preserving first-
/// seen order — SR.commit tries candidates in the order supplied.
pub fn extract_commit_points(text: &str) -> Vec<PublicKey> {
    let re = commit_point_regex();
    let mut seen = std::collections::HashSet::new();
    let mut points = Vec::new();

    for capture in re.find_iter(text) {
        let hex_str = capture.as_str();
        if !seen.insert(hex_str.to_string()) {
            continue;
        }
        if let Ok(bytes) = hex::decode(hex_str) {
            if let Ok(pubkey) = PublicKey::from_slice(&bytes) {
                points.push(pubkey);
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_every_distinct_point() {
        let log = "\
2026-01-01 peer_log: RemoteCommitPoint(020101010101010101010101010101010101010101010101010101010101010a)
2026-01-01 peer_log: NextRevocation(030202020202020202020202020202020202020202020202020202020202020a)
2026-01-01 peer_log: RemoteCommitPoint(020101010101010101010101010101010101010101010101010101010101010a)
";
        let points = extract_commit_points(log);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn ignores_non_matching_lines() {
        let log = "nothing of interest here, just prose about channels\n";
        assert!(extract_commit_points(log).is_empty());
    }

    #[test]
    fn rejects_invalid_hex_that_matches_length() {
        // starts with 02 like a real point but is all-zero x-coordinate,
        // which is not a valid curve point.
        let log = "bogus 020000000000000000000000000000000000000000000000000000000000000000";
        assert!(extract_commit_points(log).is_empty());
    }
}
