//! Anti-abuse gate: rate limiting, trust scoring, content heuristics, and
//! device-bound muting.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::AbuseConfig;
use crate::device::DeviceFingerprint;
use crate::mute_store::MuteStore;

/// Severity of a content heuristic match, driving the trust penalty applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Minor style issue: excessive punctuation, all-caps shouting.
    Low,
    /// Spam-adjacent pattern: repeated characters, link spam.
    Medium,
    /// Clear abuse pattern: known scam phrasing.
    High,
    /// Severe violation: bypasses the warning ladder straight to a mute.
    Critical,
}

static HEURISTICS: Lazy<Vec<(Severity, Regex)>> = Lazy::new(|| {
    vec![
        (Severity::Low, Regex::new(r"[!?]{4,}").unwrap()),
        (Severity::Low, Regex::new(r"^[A-Z\s!?.]{20,}$").unwrap()),
        (Severity::Medium, Regex::new(r"(.)\1{9,}").unwrap()),
        (Severity::Medium, Regex::new(r"https?://\S+").unwrap()),
        (Severity::High, Regex::new(r"(?i)\b(wire transfer|send bitcoin|claim your prize)\b").unwrap()),
        (Severity::Critical, Regex::new(r"(?i)\b(child sexual|csam)\b").unwrap()),
    ]
});

fn trust_penalty(severity: Severity) -> f32 {
    match severity {
        Severity::Low => 0.05,
        Severity::Medium => 0.10,
        Severity::High => 0.20,
        Severity::Critical => 0.40,
    }
}

/// Outcome of submitting a message to the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Message is allowed through.
    Allow,
    /// Message is rejected but the sender is not muted.
    Warn(String),
    /// Sender is muted; message is rejected.
    Muted { reason: String, remaining: Duration },
}

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_rate_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate_per_sec: f64) -> Self {
        Self { tokens: capacity, max_tokens: capacity, refill_rate_per_sec, last_refill: Instant::now() }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate_per_sec).min(self.max_tokens);
        self.last_refill = now;
    }

    fn try_consume(&mut self, amount: f64) -> bool {
        self.refill();
        if self.tokens >= amount {
            self.tokens -= amount;
            true
        } else {
            false
        }
    }
}

struct PeerState {
    bucket: TokenBucket,
    trust: f32,
    recent_sends: VecDeque<Instant>,
    recent_contents: VecDeque<String>,
    warnings: u32,
    mutes: u32,
    muted_until: Option<Instant>,
}

impl PeerState {
    fn new(config: &AbuseConfig, muted_until: Option<Instant>) -> Self {
        Self {
            bucket: TokenBucket::new(
                f64::from(config.new_peer_rate_per_min),
                f64::from(config.new_peer_rate_per_min) / 60.0,
            ),
            trust: config.initial_trust,
            recent_sends: VecDeque::new(),
            recent_contents: VecDeque::new(),
            warnings: 0,
            mutes: 0,
            muted_until,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Rate limiting, trust scoring, and content-heuristic gate applied to every
/// inbound message before it is processed or relayed.
///
/// Keyed by [`DeviceFingerprint`] rather than the sender's cryptographic
/// identity: an `Identity` can be regenerated for free, but a mute needs to
/// stick to the hardware that earned it.
pub struct AntiAbuseGate {
    config: AbuseConfig,
    peers: DashMap<DeviceFingerprint, Mutex<PeerState>>,
    mutes: Option<MuteStore>,
}

impl AntiAbuseGate {
    /// Build an in-memory-only gate: mute state does not survive a restart.
    #[must_use]
    pub fn new(config: AbuseConfig) -> Self {
        Self { config, peers: DashMap::new(), mutes: None }
    }

    /// Build a gate backed by a replicated on-disk mute store, if
    /// `config.mute_store_dir` is set. Falls back to an in-memory gate,
    /// logging a warning, if the directory cannot be opened.
    #[must_use]
    pub fn open(config: AbuseConfig) -> Self {
        let mutes = config.mute_store_dir.as_ref().and_then(|dir| match MuteStore::open(dir) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("mute store at {} unavailable, falling back to in-memory: {e}", dir.display());
                None
            }
        });
        Self { config, peers: DashMap::new(), mutes }
    }

    /// Evaluate `content` sent by `sender`, updating rate and trust state.
    pub fn evaluate(&self, sender: DeviceFingerprint, content: &str) -> Verdict {
        let mutes = &self.mutes;
        let entry = self.peers.entry(sender).or_insert_with(|| {
            let muted_until = mutes
                .as_ref()
                .and_then(|store| store.lookup(&sender))
                .filter(|record| record.muted_until_ms > now_ms())
                .map(|record| Instant::now() + Duration::from_millis(record.muted_until_ms - now_ms()));
            Mutex::new(PeerState::new(&self.config, muted_until))
        });
        let mut state = entry.lock().unwrap();

        if let Some(until) = state.muted_until {
            if Instant::now() < until {
                return Verdict::Muted { reason: "muted".to_string(), remaining: until - Instant::now() };
            }
            state.muted_until = None;
        }

        let rate = if state.trust >= self.config.trust_threshold {
            f64::from(self.config.trusted_rate_per_min)
        } else {
            f64::from(self.config.new_peer_rate_per_min)
        };
        state.bucket.max_tokens = rate;
        state.bucket.refill_rate_per_sec = rate / 60.0;

        if !state.bucket.try_consume(1.0) {
            return self.apply_violation(&sender, &mut state, Severity::Low, "rate limit exceeded");
        }

        let now = Instant::now();
        state.recent_sends.push_back(now);
        while state
            .recent_sends
            .front()
            .is_some_and(|t| now.duration_since(*t) > self.config.rapid_fire_window)
        {
            state.recent_sends.pop_front();
        }
        if state.recent_sends.len() as u32 > self.config.rapid_fire_threshold {
            return self.apply_violation(&sender, &mut state, Severity::Medium, "rapid-fire sending");
        }

        if content.len() > 20 {
            let duplicates = state
                .recent_contents
                .iter()
                .filter(|previous| is_near_duplicate(previous, content))
                .count();
            if duplicates >= 3 {
                return self.apply_violation(&sender, &mut state, Severity::Medium, "duplicate content");
            }
        }
        state.recent_contents.push_back(content.to_string());
        if state.recent_contents.len() > 15 {
            state.recent_contents.pop_front();
        }

        let heuristic_severity = worst_heuristic_match(content);
        let quality_severity = quality_deficiency_severity(content);
        let combined = match (heuristic_severity, quality_severity) {
            (Some(h), Some(q)) => Some(h.max(q)),
            (Some(h), None) => Some(h),
            (None, Some(q)) => Some(q),
            (None, None) => None,
        };
        if let Some(severity) = combined {
            let driven_by_quality = quality_severity == Some(severity) && heuristic_severity != Some(severity);
            let reason = if driven_by_quality {
                "low-quality content pattern"
            } else {
                match severity {
                    Severity::Low => "low-severity content pattern",
                    Severity::Medium => "spam-like content pattern",
                    Severity::High => "abusive content pattern",
                    Severity::Critical => "critical content violation",
                }
            };
            return self.apply_violation(&sender, &mut state, severity, reason);
        }

        state.trust = (state.trust + 0.02).min(1.0);
        Verdict::Allow
    }

    fn apply_violation(
        &self,
        sender: &DeviceFingerprint,
        state: &mut PeerState,
        severity: Severity,
        reason: &str,
    ) -> Verdict {
        state.trust = (state.trust - trust_penalty(severity)).max(0.0);

        if severity == Severity::Critical {
            state.mutes += 1;
            let duration = self.config.escalated_mute_duration;
            self.mute(sender, state, duration, reason);
            return Verdict::Muted { reason: reason.to_string(), remaining: duration };
        }

        state.warnings += 1;
        if state.warnings < self.config.warnings_before_mute {
            return Verdict::Warn(reason.to_string());
        }

        state.warnings = 0;
        state.mutes += 1;
        let duration = if state.mutes > 1 { self.config.escalated_mute_duration } else { self.config.first_mute_duration };
        self.mute(sender, state, duration, reason);
        Verdict::Muted { reason: reason.to_string(), remaining: duration }
    }

    fn mute(&self, sender: &DeviceFingerprint, state: &mut PeerState, duration: Duration, reason: &str) {
        state.muted_until = Some(Instant::now() + duration);
        if let Some(store) = &self.mutes {
            store.record(sender, now_ms() + duration.as_millis() as u64, reason);
        }
    }

    /// Current trust score for a peer, or the configured initial trust if
    /// unseen.
    #[must_use]
    pub fn trust_of(&self, sender: &DeviceFingerprint) -> f32 {
        self.peers
            .get(sender)
            .map(|entry| entry.lock().unwrap().trust)
            .unwrap_or(self.config.initial_trust)
    }

    /// Whether `sender` is currently muted.
    #[must_use]
    pub fn is_muted(&self, sender: &DeviceFingerprint) -> bool {
        self.peers
            .get(sender)
            .map(|entry| entry.lock().unwrap().muted_until.is_some_and(|until| Instant::now() < until))
            .unwrap_or(false)
    }
}

fn worst_heuristic_match(content: &str) -> Option<Severity> {
    HEURISTICS.iter().filter(|(_, re)| re.is_match(content)).map(|(severity, _)| *severity).max()
}

/// Penalizes bot-like filler text: low character/word variety combined with
/// a high proportion of non-alphanumeric characters. Only evaluated for
/// messages long enough that variety is meaningful to measure.
fn quality_deficiency_severity(content: &str) -> Option<Severity> {
    if content.len() <= 20 {
        return None;
    }

    let chars: Vec<char> = content.chars().collect();
    let total = chars.len() as f64;
    let unique_chars = chars.iter().copied().collect::<HashSet<_>>().len() as f64;
    let char_variety = unique_chars / total;

    let words: Vec<&str> = content.split_whitespace().collect();
    let word_variety = if words.is_empty() {
        0.0
    } else {
        words.iter().copied().collect::<HashSet<_>>().len() as f64 / words.len() as f64
    };

    let special_count = chars.iter().filter(|c| !c.is_alphanumeric() && !c.is_whitespace()).count() as f64;
    let special_ratio = special_count / total;

    let quality = (char_variety + word_variety) / 2.0 - special_ratio;
    if quality < 0.12 {
        Some(Severity::Medium)
    } else if quality < 0.25 {
        Some(Severity::Low)
    } else {
        None
    }
}

fn is_near_duplicate(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    jaccard_similarity(a, b) > 0.8
}

fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b.split_whitespace().collect();
    if a_tokens.is_empty() && b_tokens.is_empty() {
        return 1.0;
    }
    let intersection = a_tokens.intersection(&b_tokens).count();
    let union = a_tokens.union(&b_tokens).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AntiAbuseGate {
        AntiAbuseGate::new(AbuseConfig::default())
    }

    #[test]
    fn clean_messages_raise_trust() {
        let gate = gate();
        let sender = [1u8; 32];
        let before = gate.trust_of(&sender);
        assert_eq!(gate.evaluate(sender, "hello there, how is everyone doing today"), Verdict::Allow);
        assert!(gate.trust_of(&sender) > before);
    }

    #[test]
    fn three_warnings_escalate_to_mute() {
        let gate = gate();
        let sender = [2u8; 32];
        for _ in 0..3 {
            gate.evaluate(sender, "AAAAAAAAAAAAAAAAAAAA");
        }
        assert!(gate.is_muted(&sender));
    }

    #[test]
    fn second_mute_is_escalated_duration() {
        let gate = gate();
        let sender = [3u8; 32];
        for _ in 0..3 {
            gate.evaluate(sender, "AAAAAAAAAAAAAAAAAAAA");
        }
        assert!(gate.is_muted(&sender));

        {
            let entry = gate.peers.get(&sender).unwrap();
            entry.lock().unwrap().muted_until = Some(Instant::now() - Duration::from_secs(1));
        }

        let verdict = (0..3)
            .map(|_| gate.evaluate(sender, "AAAAAAAAAAAAAAAAAAAA"))
            .last()
            .unwrap();
        match verdict {
            Verdict::Muted { remaining, .. } => {
                assert!(remaining >= AbuseConfig::default().escalated_mute_duration - Duration::from_secs(1));
            }
            other => panic!("expected escalated mute, got {other:?}"),
        }
    }

    #[test]
    fn critical_content_bypasses_warning_ladder() {
        let gate = gate();
        let sender = [4u8; 32];
        let verdict = gate.evaluate(sender, "this message contains csam material");
        assert!(matches!(verdict, Verdict::Muted { .. }));
    }

    #[test]
    fn duplicate_content_is_flagged() {
        let gate = gate();
        let sender = [5u8; 32];
        for _ in 0..4 {
            gate.evaluate(sender, "this is the exact same message every time");
        }
        assert!(gate.is_muted(&sender) || gate.trust_of(&sender) < AbuseConfig::default().initial_trust);
    }

    #[test]
    fn rate_limit_exceeded_is_warned() {
        let gate = gate();
        let sender = [6u8; 32];
        let mut allowed = 0;
        let mut warned = false;
        for i in 0..15 {
            match gate.evaluate(sender, &format!("message number {i}")) {
                Verdict::Allow => allowed += 1,
                Verdict::Warn(_) | Verdict::Muted { .. } => warned = true,
            }
        }
        assert!(allowed <= 10);
        assert!(warned);
    }

    #[test]
    fn low_variety_filler_text_is_flagged_even_without_a_heuristic_match() {
        let gate = gate();
        let sender = [10u8; 32];
        // Long, repetitive, punctuation-heavy filler that no regex heuristic
        // above matches, but which is obviously not organic conversation.
        let filler = "lol lol lol !! lol lol !! lol lol !! lol lol !!";
        let verdict = gate.evaluate(sender, filler);
        assert!(matches!(verdict, Verdict::Warn(_) | Verdict::Muted { .. }), "expected a violation, got {verdict:?}");
    }

    #[test]
    fn mute_persists_across_a_fresh_gate_backed_by_the_same_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AbuseConfig::default();
        config.mute_store_dir = Some(dir.path().to_path_buf());
        let sender = [11u8; 32];

        {
            let gate = AntiAbuseGate::open(config.clone());
            for _ in 0..3 {
                gate.evaluate(sender, "AAAAAAAAAAAAAAAAAAAA");
            }
            assert!(gate.is_muted(&sender));
        }

        let reopened = AntiAbuseGate::open(config);
        assert!(matches!(reopened.evaluate(sender, "hello again"), Verdict::Muted { .. }));
    }
}
