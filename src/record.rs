use std::cmp::Ordering;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use rand::Rng;
use seahash::SeaHasher;
use serde::{Deserialize, Serialize};

/// Hasher used for maps and sets keyed by route keys.
pub type RouteKeyHasher = BuildHasherDefault<SeaHasher>;

// ------------- RouteKey -------------
/// The normalised (trimmed, upper-cased) route name used to match tag
/// overrides to live routes. Distinct from a record's opaque `id`: two
/// records spelling the same route differently ("n25", " N25 ") share a key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn new(route: &str) -> Option<Self> {
        let key = route.trim().to_uppercase();
        if key.is_empty() { None } else { Some(Self(key)) }
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ------------- Natural route ordering -------------
/// Compares route names the way the public pages sort them: digit runs
/// numerically, everything else case-insensitively, so "2" precedes "10"
/// precedes "A1" and "n25" ties with "N25" up to the case tiebreak.
pub fn compare_routes(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            // equal ignoring case, so let case decide (stable tiebreak)
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(lc), Some(rc)) => {
                if lc.is_ascii_digit() && rc.is_ascii_digit() {
                    let ln = take_number(&mut left);
                    let rn = take_number(&mut right);
                    match ln.cmp(&rn) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                // digits sort before letters, matching localeCompare("en")
                match (lc.is_ascii_digit(), rc.is_ascii_digit()) {
                    (true, false) => return Ordering::Less,
                    (false, true) => return Ordering::Greater,
                    _ => {}
                }
                let lf = lc.to_lowercase().next().unwrap_or(lc);
                let rf = rc.to_lowercase().next().unwrap_or(rc);
                match lf.cmp(&rf) {
                    Ordering::Equal => {
                        left.next();
                        right.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars>) -> u64 {
    let mut n: u64 = 0;
    while let Some(c) = chars.peek() {
        match c.to_digit(10) {
            Some(d) => {
                n = n.saturating_mul(10).saturating_add(d as u64);
                chars.next();
            }
            None => break,
        }
    }
    n
}

// ------------- IdGenerator -------------
/// Source of fresh, practically unique record identifiers in the
/// `id-<millis base36>-<suffix>` format the site has always used. A process
/// local counter is folded into the random suffix so two ids generated in
/// the same millisecond still differ.
#[derive(Debug)]
pub struct IdGenerator {
    sequence: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { sequence: AtomicU64::new(0) }
    }
    pub fn generate(&self) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let seq = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        let entropy: u64 = rand::thread_rng().r#gen();
        format!(
            "id-{}-{}",
            base36(millis),
            base36(entropy.wrapping_add(seq) & 0xffff_ffff)
        )
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// ------------- WithdrawnRouteEntry -------------
/// A bus route no longer in service, as curated by administrators. All
/// fields other than `route` are free text and may be empty.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct WithdrawnRouteEntry {
    pub id: String,
    pub route: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub launched: String,
    #[serde(default)]
    pub withdrawn: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default, rename = "replacedBy")]
    pub replaced_by: String,
}

// ------------- RouteTagOverride -------------
/// Replaces the service-type tags of one live route. Matched against the
/// live listing by [`RouteKey`], never by `id`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RouteTagOverride {
    pub id: String,
    pub route: String,
    pub tags: Vec<String>,
}

impl RouteTagOverride {
    pub fn route_key(&self) -> Option<RouteKey> {
        RouteKey::new(&self.route)
    }
}

// ------------- BlogPost -------------
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    pub author: String,
    #[serde(rename = "heroImage", default)]
    pub hero_image: String,
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(rename = "readTime")]
    pub read_time: u32,
}
