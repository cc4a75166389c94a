//! Curated name-pattern rule tables for role classification.
//!
//! All matching runs against normalized names (see
//! [`super::normalize::normalize_name`]). Keyword hits are word-bounded so
//! "admin" never fires inside "badminton". When several keywords hit, the
//! highest confidence wins, with the higher tier breaking exact ties, so
//! classification stays deterministic.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use regex::RegexSet;

use crate::level::PermissionLevel;

/// A keyword hit against the authority/member tier tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameMatch {
    pub level: PermissionLevel,
    pub confidence: f32,
    pub keyword: &'static str,
}

/// Tiered keyword table: (keyword, suggested level, confidence).
///
/// Compound keywords ("head admin") carry more confidence than their parts,
/// so they win whenever both hit.
const TIER_TERMS: &[(&str, PermissionLevel, f32)] = &[
    // Owner tier
    ("owner", PermissionLevel::Owner, 0.95),
    ("founder", PermissionLevel::Owner, 0.90),
    ("creator", PermissionLevel::Owner, 0.85),
    // Lead admin tier
    ("head admin", PermissionLevel::LeadAdmin, 0.95),
    ("senior admin", PermissionLevel::LeadAdmin, 0.95),
    ("lead admin", PermissionLevel::LeadAdmin, 0.95),
    ("chief admin", PermissionLevel::LeadAdmin, 0.90),
    ("super admin", PermissionLevel::LeadAdmin, 0.90),
    // Admin tier
    ("administrator", PermissionLevel::Admin, 0.95),
    ("admin", PermissionLevel::Admin, 0.90),
    ("manager", PermissionLevel::Admin, 0.75),
    ("executive", PermissionLevel::Admin, 0.70),
    ("director", PermissionLevel::Admin, 0.70),
    ("leader", PermissionLevel::Admin, 0.65),
    // Lead mod tier
    ("head mod", PermissionLevel::LeadMod, 0.95),
    ("senior mod", PermissionLevel::LeadMod, 0.95),
    ("lead mod", PermissionLevel::LeadMod, 0.95),
    ("chief mod", PermissionLevel::LeadMod, 0.90),
    ("super mod", PermissionLevel::LeadMod, 0.90),
    ("master mod", PermissionLevel::LeadMod, 0.85),
    // Moderator tier
    ("moderator", PermissionLevel::Moderator, 0.90),
    ("mod", PermissionLevel::Moderator, 0.85),
    ("staff", PermissionLevel::Moderator, 0.75),
    ("helper", PermissionLevel::Moderator, 0.70),
    ("assistant", PermissionLevel::Moderator, 0.65),
    ("trainee mod", PermissionLevel::Moderator, 0.60),
    ("junior mod", PermissionLevel::Moderator, 0.60),
    ("trial mod", PermissionLevel::Moderator, 0.55),
    // Member tier (classified Functional, not Authority)
    ("member", PermissionLevel::Member, 0.85),
    ("vip", PermissionLevel::Member, 0.80),
    ("verified", PermissionLevel::Member, 0.75),
    ("trusted", PermissionLevel::Member, 0.75),
    ("supporter", PermissionLevel::Member, 0.70),
    ("donator", PermissionLevel::Member, 0.70),
    ("regular", PermissionLevel::Member, 0.65),
];

static TIER_MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new(TIER_TERMS.iter().map(|(keyword, _, _)| *keyword))
        .expect("static keyword table builds")
});

/// Platform-integration name patterns (premium subscriptions, relays).
static INTEGRATION_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bbooster?\b",
        r"\bnitro\b",
        r"\bpremium\b",
        r"\btwitch\b",
        r"\byoutube\b",
    ])
    .expect("static integration patterns build")
});

/// Event/temporary role name patterns.
static TEMPORARY_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bevent\b",
        r"\bcontest\b",
        r"\bgiveaway\b",
        r"\btemp\b",
        r"\btrial\b",
        r"\bbeta\b",
        r"\btest\b",
    ])
    .expect("static temporary patterns build")
});

/// Demographic/reaction-role patterns: age ranges, timezones, identity and
/// team labels that communities hand out as self-assignable decoration.
static DEMOGRAPHIC_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\b\d{2}\s*\+",
        r"\b\d{2}-\d{2}\b",
        r"\b(?:teen|adult)\b",
        r"\b(?:student|employed|unemployed|retired|working)\b",
        r"\b(?:male|female|single|married|taken)\b",
        r"\b(?:est|pst|cst|mst|utc|gmt|cet|eet|aest|jst|brt)\b",
        r"\b(?:usa|canada|europe|asia)\b",
        r"\b(?:gamer|weeb|normie|artist)\b",
        r"\b(?:team|squad|red|blue|green|yellow|purple|orange|pink)\b",
    ])
    .expect("static demographic patterns build")
});

/// Best tier keyword hit for a normalized name, if any.
#[must_use]
pub fn match_tier_name(normalized: &str) -> Option<NameMatch> {
    let mut best: Option<NameMatch> = None;

    for hit in TIER_MATCHER.find_overlapping_iter(normalized) {
        if !word_bounded(normalized, hit.start(), hit.end()) {
            continue;
        }

        let (keyword, level, confidence) = TIER_TERMS[hit.pattern().as_usize()];
        let candidate = NameMatch {
            level,
            confidence,
            keyword,
        };

        let better = match best {
            None => true,
            Some(current) => {
                candidate.confidence > current.confidence
                    || (candidate.confidence == current.confidence
                        && candidate.level > current.level)
            }
        };
        if better {
            best = Some(candidate);
        }
    }

    best
}

/// Whether the normalized name matches a platform-integration pattern.
#[must_use]
pub fn matches_integration(normalized: &str) -> bool {
    INTEGRATION_PATTERNS.is_match(normalized)
}

/// Whether the normalized name matches an event/temporary pattern.
#[must_use]
pub fn matches_temporary(normalized: &str) -> bool {
    TEMPORARY_PATTERNS.is_match(normalized)
}

/// Whether the normalized name matches a demographic/reaction-role pattern.
#[must_use]
pub fn matches_demographic(normalized: &str) -> bool {
    DEMOGRAPHIC_PATTERNS.is_match(normalized)
}

/// Word-boundary check over the normalized (ASCII) form.
fn word_bounded(haystack: &str, start: usize, end: usize) -> bool {
    let bytes = haystack.as_bytes();
    let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
    let after_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
    before_ok && after_ok
}
