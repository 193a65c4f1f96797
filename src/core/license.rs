//! Purpose: Tier names and the lexical license-key rules attached to them.
//! Exports: `Tier`, `license_matches`.
//! Role: Pure validation helpers used by `LicensedClient`.
//! Invariants: Matching is full-string and case-sensitive.
//! Invariants: Unknown tiers and uncompilable patterns never validate (fail-closed).
use regex::Regex;
use std::sync::LazyLock;

static BASIC_KEY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(Tier::Basic));
static PRO_KEY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(Tier::Pro));
static ENTERPRISE_KEY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(Tier::Enterprise));

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Tier {
    Free,
    Basic,
    Pro,
    Enterprise,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Basic, Tier::Pro, Tier::Enterprise];

    /// Exact, case-sensitive lookup; `"Pro"` is not a tier.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "free" => Some(Tier::Free),
            "basic" => Some(Tier::Basic),
            "pro" => Some(Tier::Pro),
            "enterprise" => Some(Tier::Enterprise),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }

    pub fn key_prefix(self) -> Option<&'static str> {
        match self {
            Tier::Free => None,
            Tier::Basic => Some("bsc_"),
            Tier::Pro => Some("pro_"),
            Tier::Enterprise => Some("ent_"),
        }
    }

    pub fn key_pattern(self) -> Option<&'static str> {
        match self {
            Tier::Free => None,
            Tier::Basic => Some(r"^bsc_[a-f0-9]{16}$"),
            Tier::Pro => Some(r"^pro_[a-f0-9]{16}$"),
            Tier::Enterprise => Some(r"^ent_[a-f0-9]{16}$"),
        }
    }

    pub fn requires_key(self) -> bool {
        self != Tier::Free
    }

    fn key_regex(self) -> Option<&'static Regex> {
        match self {
            Tier::Free => None,
            Tier::Basic => BASIC_KEY_RE.as_ref(),
            Tier::Pro => PRO_KEY_RE.as_ref(),
            Tier::Enterprise => ENTERPRISE_KEY_RE.as_ref(),
        }
    }
}

fn compile(tier: Tier) -> Option<Regex> {
    Regex::new(tier.key_pattern()?).ok()
}

/// Checks `license_key` against the pattern registered for `tier`.
///
/// `free` accepts any key, including the empty one. Tiers outside the
/// known set are rejected whatever the key looks like.
pub fn license_matches(tier: &str, license_key: &str) -> bool {
    match Tier::from_name(tier) {
        Some(Tier::Free) => true,
        Some(tier) => tier
            .key_regex()
            .is_some_and(|pattern| pattern.is_match(license_key)),
        None => false,
    }
}
