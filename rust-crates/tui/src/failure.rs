use std::fmt;

/// Why a write failed, recovered from the wallet or node message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxFailure {
    UserCancelled,
    InsufficientFunds,
    RandomnessNotReady,
    NoActiveSession,
    NoPrizeToClaim,
    ChainRevert(String),
    Unknown,
}

const USER_CANCELLED: &[&str] = &[
    "user rejected",
    "user denied",
    "user cancelled",
    "user canceled",
];
const INSUFFICIENT_FUNDS: &[&str] = &["insufficient funds", "insufficient balance"];
const RANDOMNESS_NOT_READY: &[&str] = &[
    "seed not ready",
    "seednotready",
    "randomness not ready",
    "randomnessnotready",
];
const NO_ACTIVE_SESSION: &[&str] = &[
    "no active session",
    "noactivesession",
    "no active game",
];
const NO_PRIZE: &[&str] = &["no prize", "noprize", "nothing to claim"];

const REASON_STRING_MARKER: &str = "reverted with reason string '";
const REVERTED_MARKER: &str = "execution reverted:";

impl TxFailure {
    /// First match wins, in the order the variants are declared.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let mentions = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if mentions(USER_CANCELLED) {
            TxFailure::UserCancelled
        } else if mentions(INSUFFICIENT_FUNDS) {
            TxFailure::InsufficientFunds
        } else if mentions(RANDOMNESS_NOT_READY) {
            TxFailure::RandomnessNotReady
        } else if mentions(NO_ACTIVE_SESSION) {
            TxFailure::NoActiveSession
        } else if mentions(NO_PRIZE) {
            TxFailure::NoPrizeToClaim
        } else if let Some(reason) = revert_reason(message) {
            TxFailure::ChainRevert(reason)
        } else {
            TxFailure::Unknown
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            TxFailure::UserCancelled => "Transaction cancelled".to_string(),
            TxFailure::InsufficientFunds => "Insufficient ETH balance".to_string(),
            TxFailure::RandomnessNotReady => {
                "Randomness not ready yet, please wait".to_string()
            }
            TxFailure::NoActiveSession => "No active game session".to_string(),
            TxFailure::NoPrizeToClaim => "No prize available to claim".to_string(),
            TxFailure::ChainRevert(reason) => reason.clone(),
            TxFailure::Unknown => "Transaction failed".to_string(),
        }
    }
}

impl fmt::Display for TxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

// Markers are ASCII, so byte offsets found in the lowercased copy line up
// with the original message.
fn revert_reason(message: &str) -> Option<String> {
    let lower = message.to_ascii_lowercase();
    if let Some(start) = lower.find(REASON_STRING_MARKER) {
        let rest = &message[start + REASON_STRING_MARKER.len()..];
        let end = rest.find('\'').unwrap_or(rest.len());
        return non_empty(&rest[..end]);
    }
    if let Some(start) = lower.find(REVERTED_MARKER) {
        let rest = &message[start + REVERTED_MARKER.len()..];
        let end = rest.find(['\n', '(']).unwrap_or(rest.len());
        return non_empty(rest[..end].trim_end_matches([',', '.', ';']));
    }
    None
}

fn non_empty(reason: &str) -> Option<String> {
    let reason = reason.trim().trim_matches('"');
    (!reason.is_empty()).then(|| reason.to_string())
}
