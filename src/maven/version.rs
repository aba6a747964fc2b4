use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use anyhow::{anyhow, bail};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const LATEST: &str = "LATEST";
pub const RELEASE: &str = "RELEASE";
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

lazy_static! {
    static ref TIMESTAMPED_SNAPSHOT_REGEX: Regex = Regex::new(r"^(.+)-(\d{8}\.\d{6})-(\d+)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    Release,
    Snapshot,
    TimestampedSnapshot,
    Latest,
    ReleaseMarker,
}
impl Quality {
    pub fn is_snapshot(&self) -> bool {
        matches!(self, Quality::Snapshot | Quality::TimestampedSnapshot)
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Quality::Snapshot | Quality::Latest | Quality::ReleaseMarker)
    }
}

/// The qualities a repository admits into the results of a version range query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityRange {
    #[default]
    ReleasesOnly,
    SnapshotsOnly,
    All,
}
impl QualityRange {
    pub fn contains(&self, quality: Quality) -> bool {
        match self {
            QualityRange::ReleasesOnly => quality == Quality::Release,
            QualityRange::SnapshotsOnly => quality.is_snapshot(),
            QualityRange::All => quality == Quality::Release || quality.is_snapshot(),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotBuild {
    pub timestamp: String, // yyyyMMdd.HHmmss
    pub build_number: u32,
}

#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub enum MavenVersion {
    Release(String),
    Snapshot {
        version: String, // ending in '-SNAPSHOT'
        build: Option<SnapshotBuild>,
    },
    Latest,
    ReleaseMarker,
}
impl MavenVersion {
    pub fn parse(s: &str) -> MavenVersion {
        if s == LATEST {
            return MavenVersion::Latest;
        }
        if s == RELEASE {
            return MavenVersion::ReleaseMarker;
        }
        if s.ends_with(SNAPSHOT_SUFFIX) {
            return MavenVersion::Snapshot { version: s.to_string(), build: None };
        }
        if let Some(captures) = TIMESTAMPED_SNAPSHOT_REGEX.captures(s) {
            if let Ok(build_number) = captures[3].parse::<u32>() {
                return MavenVersion::Snapshot {
                    version: format!("{}{}", &captures[1], SNAPSHOT_SUFFIX),
                    build: Some(SnapshotBuild {
                        timestamp: captures[2].to_string(),
                        build_number,
                    }),
                };
            }
        }
        MavenVersion::Release(s.to_string())
    }

    pub fn quality(&self) -> Quality {
        match self {
            MavenVersion::Release(_) => Quality::Release,
            MavenVersion::Snapshot { build: None, .. } => Quality::Snapshot,
            MavenVersion::Snapshot { build: Some(_), .. } => Quality::TimestampedSnapshot,
            MavenVersion::Latest => Quality::Latest,
            MavenVersion::ReleaseMarker => Quality::ReleaseMarker,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.quality().is_virtual()
    }

    /// The directory name a version lives in inside a repository, i.e. `1.0-SNAPSHOT` for
    ///  `1.0-20240101.120000-3`
    pub fn base_version(&self) -> String {
        match self {
            MavenVersion::Release(v) => v.clone(),
            MavenVersion::Snapshot { version, .. } => version.clone(),
            MavenVersion::Latest => LATEST.to_string(),
            MavenVersion::ReleaseMarker => RELEASE.to_string(),
        }
    }
}
impl Display for MavenVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MavenVersion::Release(v) => f.write_str(v),
            MavenVersion::Snapshot { version, build: None } => f.write_str(version),
            MavenVersion::Snapshot { version, build: Some(build) } => {
                let prefix = version.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(version);
                write!(f, "{}-{}-{}", prefix, build.timestamp, build.build_number)
            }
            MavenVersion::Latest => f.write_str(LATEST),
            MavenVersion::ReleaseMarker => f.write_str(RELEASE),
        }
    }
}


/// How a bare `X-SNAPSHOT` ranks against timestamped builds of the same `X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotPolicy {
    /// the newest deployed build beats the bare snapshot
    #[default]
    TimestampedWins,
    /// a bare snapshot (typically a local build) beats every deployed build
    BareWins,
}

/// Total order on version strings, following Maven's comparable version semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionComparator {
    pub snapshot_policy: SnapshotPolicy,
}
impl VersionComparator {
    pub fn new(snapshot_policy: SnapshotPolicy) -> VersionComparator {
        VersionComparator { snapshot_policy }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let version_a = MavenVersion::parse(a);
        let version_b = MavenVersion::parse(b);

        // timestamped snapshots rank as their '-SNAPSHOT' base against everything else
        let primary = compare_items(&parse_items(&version_a.base_version()), &parse_items(&version_b.base_version()));
        if primary != Ordering::Equal {
            return primary;
        }

        match (&version_a, &version_b) {
            (MavenVersion::Snapshot { build: Some(x), .. }, MavenVersion::Snapshot { build: Some(y), .. }) => {
                x.timestamp.cmp(&y.timestamp)
                    .then(x.build_number.cmp(&y.build_number))
            }
            (MavenVersion::Snapshot { build: Some(_), .. }, MavenVersion::Snapshot { build: None, .. }) => {
                self.timestamped_vs_bare()
            }
            (MavenVersion::Snapshot { build: None, .. }, MavenVersion::Snapshot { build: Some(_), .. }) => {
                self.timestamped_vs_bare().reverse()
            }
            _ => Ordering::Equal,
        }
    }

    pub fn max<'a>(&self, versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        versions.into_iter()
            .fold(None, |best, v| match best {
                Some(b) if self.compare(v, b) != Ordering::Greater => Some(b),
                _ => Some(v),
            })
    }

    fn timestamped_vs_bare(&self) -> Ordering {
        match self.snapshot_policy {
            SnapshotPolicy::TimestampedWins => Ordering::Greater,
            SnapshotPolicy::BareWins => Ordering::Less,
        }
    }
}


#[derive(Debug, Clone)]
enum Item {
    Int(String), // digits without leading zeros, "0" for zero
    Str(String), // comparable qualifier
    List(Vec<Item>),
}

const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];
const RELEASE_QUALIFIER_INDEX: &str = "5";

fn comparable_qualifier(qualifier: &str) -> String {
    let qualifier = match qualifier {
        "ga" | "final" | "release" => "",
        "cr" => "rc",
        other => other,
    };
    match QUALIFIERS.iter().position(|q| *q == qualifier) {
        Some(index) => index.to_string(),
        None => format!("{}-{}", QUALIFIERS.len(), qualifier),
    }
}

fn int_item(digits: &str) -> Item {
    let trimmed = digits.trim_start_matches('0');
    Item::Int(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
}

fn string_item(value: &str, followed_by_digit: bool) -> Item {
    let value = if followed_by_digit && value.len() == 1 {
        match value {
            "a" => "alpha",
            "b" => "beta",
            "m" => "milestone",
            other => other,
        }
    }
    else {
        value
    };
    Item::Str(comparable_qualifier(value))
}

fn parse_item(is_digit: bool, token: &str) -> Item {
    if is_digit {
        int_item(token)
    }
    else {
        string_item(token, false)
    }
}

fn is_null(item: &Item) -> bool {
    match item {
        Item::Int(v) => v == "0",
        Item::Str(v) => v == RELEASE_QUALIFIER_INDEX,
        Item::List(items) => items.is_empty(),
    }
}

/// strips trailing "null" items (0, "", "final", ...) but keeps looking past nested lists
fn normalize(items: &mut Vec<Item>) {
    let mut i = items.len();
    while i > 0 {
        i -= 1;
        if is_null(&items[i]) {
            items.remove(i);
        }
        else if !matches!(items[i], Item::List(_)) {
            break;
        }
    }
}

fn parse_items(version: &str) -> Vec<Item> {
    let version = version.to_lowercase();

    // NB: every new sub list becomes the last element of the list on top of the stack, and
    //  all later items go into the new list. So attaching the sub lists when unwinding the
    //  stack at the end gives the same nesting as attaching them eagerly.
    let mut stack: Vec<Vec<Item>> = vec![Vec::new()];
    let mut is_digit = false;
    let mut start = 0;

    for (i, c) in version.char_indices() {
        if c == '.' || c == '-' {
            let item = if i == start { Item::Int("0".to_string()) } else { parse_item(is_digit, &version[start..i]) };
            push_item(&mut stack, item);
            start = i + 1;
            if c == '-' {
                stack.push(Vec::new());
            }
        }
        else if c.is_ascii_digit() {
            if !is_digit && i > start {
                // 1.0.0.X1 < 1.0.0-X2: treat '.X' as '-X'
                if !current_is_empty(&stack) {
                    stack.push(Vec::new());
                }
                push_item(&mut stack, string_item(&version[start..i], true));
                start = i;
                stack.push(Vec::new());
            }
            is_digit = true;
        }
        else {
            if is_digit && i > start {
                push_item(&mut stack, int_item(&version[start..i]));
                start = i;
                stack.push(Vec::new());
            }
            is_digit = false;
        }
    }

    if version.len() > start {
        if !is_digit && !current_is_empty(&stack) {
            stack.push(Vec::new());
        }
        push_item(&mut stack, parse_item(is_digit, &version[start..]));
    }

    while stack.len() > 1 {
        if let Some(mut inner) = stack.pop() {
            normalize(&mut inner);
            push_item(&mut stack, Item::List(inner));
        }
    }
    let mut root = stack.pop().unwrap_or_default();
    normalize(&mut root);
    root
}

fn push_item(stack: &mut [Vec<Item>], item: Item) {
    if let Some(top) = stack.last_mut() {
        top.push(item);
    }
}

fn current_is_empty(stack: &[Vec<Item>]) -> bool {
    stack.last().map(|l| l.is_empty()).unwrap_or(true)
}

fn compare_ints(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// compares an item against a missing item on the other side
fn compare_to_null(item: &Item) -> Ordering {
    match item {
        Item::Int(v) => if v == "0" { Ordering::Equal } else { Ordering::Greater },
        Item::Str(v) => v.as_str().cmp(RELEASE_QUALIFIER_INDEX),
        Item::List(items) => match items.first() {
            None => Ordering::Equal,
            Some(first) => compare_to_null(first),
        },
    }
}

fn compare_item(left: &Item, right: &Item) -> Ordering {
    match (left, right) {
        (Item::Int(a), Item::Int(b)) => compare_ints(a, b),
        (Item::Int(_), _) => Ordering::Greater,
        (Item::Str(_), Item::Int(_)) => Ordering::Less,
        (Item::Str(a), Item::Str(b)) => a.cmp(b),
        (Item::Str(_), Item::List(_)) => Ordering::Less,
        (Item::List(_), Item::Int(_)) => Ordering::Less,
        (Item::List(_), Item::Str(_)) => Ordering::Greater,
        (Item::List(a), Item::List(b)) => compare_items(a, b),
    }
}

fn compare_items(left: &[Item], right: &[Item]) -> Ordering {
    for i in 0..left.len().max(right.len()) {
        let result = match (left.get(i), right.get(i)) {
            (Some(l), Some(r)) => compare_item(l, r),
            (Some(l), None) => compare_to_null(l),
            (None, Some(r)) => compare_to_null(r).reverse(),
            (None, None) => Ordering::Equal,
        };
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restriction {
    pub lower: Option<String>,
    pub lower_inclusive: bool,
    pub upper: Option<String>,
    pub upper_inclusive: bool,
}
impl Restriction {
    pub fn contains(&self, version: &str, comparator: &VersionComparator) -> bool {
        if let Some(lower) = &self.lower {
            match comparator.compare(version, lower) {
                Ordering::Less => return false,
                Ordering::Equal if !self.lower_inclusive => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match comparator.compare(version, upper) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.upper_inclusive => return false,
                _ => {}
            }
        }
        true
    }
}

/// A Maven version range like `[1.0,2.0)`, `(,1.5]`, `[1.2]` or `[1,2),[3,4)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub spec: String,
    pub restrictions: Vec<Restriction>,
}
impl VersionRange {
    pub fn is_range_spec(spec: &str) -> bool {
        let spec = spec.trim_start();
        spec.starts_with('[') || spec.starts_with('(')
    }

    pub fn parse(spec: &str) -> anyhow::Result<VersionRange> {
        let comparator = VersionComparator::default();
        let mut restrictions = Vec::new();
        let mut remaining = spec.trim();

        while remaining.starts_with('[') || remaining.starts_with('(') {
            let end = match (remaining.find(')'), remaining.find(']')) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => bail!("unbounded version range: {:?}", spec),
            };

            restrictions.push(Self::parse_restriction(&remaining[..=end], spec, &comparator)?);

            remaining = remaining[end + 1..].trim();
            if let Some(rest) = remaining.strip_prefix(',') {
                remaining = rest.trim();
            }
        }

        if !remaining.is_empty() || restrictions.is_empty() {
            bail!("not a valid version range: {:?}", spec);
        }

        Ok(VersionRange {
            spec: spec.to_string(),
            restrictions,
        })
    }

    fn parse_restriction(s: &str, spec: &str, comparator: &VersionComparator) -> anyhow::Result<Restriction> {
        let lower_inclusive = s.starts_with('[');
        let upper_inclusive = s.ends_with(']');
        let inner = s[1..s.len() - 1].trim();

        match inner.find(',') {
            None => {
                if !lower_inclusive || !upper_inclusive || inner.is_empty() {
                    bail!("single version must be surrounded by []: {:?}", spec);
                }
                Ok(Restriction {
                    lower: Some(inner.to_string()),
                    lower_inclusive,
                    upper: Some(inner.to_string()),
                    upper_inclusive,
                })
            }
            Some(comma) => {
                let lower = inner[..comma].trim();
                let upper = inner[comma + 1..].trim();
                if upper.contains(',') {
                    bail!("invalid version range restriction {:?} in {:?}", s, spec);
                }
                let lower = if lower.is_empty() { None } else { Some(lower.to_string()) };
                let upper = if upper.is_empty() { None } else { Some(upper.to_string()) };

                if let (Some(l), Some(u)) = (&lower, &upper) {
                    let order = comparator.compare(l, u);
                    if order == Ordering::Greater || (order == Ordering::Equal && !(lower_inclusive && upper_inclusive)) {
                        bail!("lower bound is not below upper bound in {:?}", spec);
                    }
                }

                Ok(Restriction {
                    lower,
                    lower_inclusive,
                    upper,
                    upper_inclusive,
                })
            }
        }
    }

    pub fn contains(&self, version: &str, comparator: &VersionComparator) -> bool {
        self.restrictions.iter()
            .any(|r| r.contains(version, comparator))
    }
}
impl Display for VersionRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.spec)
    }
}


/// What a query's version string asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// a concrete release or timestamped snapshot
    Exact(String),
    Range(VersionRange),
    /// LATEST, RELEASE or a bare `X-SNAPSHOT`
    Virtual(MavenVersion),
}
impl VersionSpec {
    pub fn parse(version: &str) -> anyhow::Result<VersionSpec> {
        let version = version.trim();
        if version.is_empty() {
            return Err(anyhow!("empty version"));
        }
        if VersionRange::is_range_spec(version) {
            return Ok(VersionSpec::Range(VersionRange::parse(version)?));
        }

        let parsed = MavenVersion::parse(version);
        if parsed.is_virtual() {
            Ok(VersionSpec::Virtual(parsed))
        }
        else {
            Ok(VersionSpec::Exact(version.to_string()))
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, VersionSpec::Virtual(_))
    }

    /// a single concrete version, i.e. one whose lookup can stop at the first hit
    pub fn is_singleton(&self) -> bool {
        match self {
            VersionSpec::Exact(_) => true,
            VersionSpec::Range(range) => {
                range.restrictions.len() == 1
                    && range.restrictions[0].lower.is_some()
                    && range.restrictions[0].lower == range.restrictions[0].upper
            }
            VersionSpec::Virtual(_) => false,
        }
    }
}


#[cfg(test)]
mod test {
    use rstest::*;
    use super::*;

    #[rstest]
    #[case::equal("1.0", "1.0", Ordering::Equal)]
    #[case::trailing_zero("1.0", "1.0.0", Ordering::Equal)]
    #[case::ga_qualifier("1.0", "1.0-ga", Ordering::Equal)]
    #[case::final_qualifier("1.0", "1.0.final", Ordering::Equal)]
    #[case::minor("1.0", "1.1", Ordering::Less)]
    #[case::numeric_not_lexical("1.9", "1.10", Ordering::Less)]
    #[case::large_numbers("1.12345678901234567890", "1.12345678901234567891", Ordering::Less)]
    #[case::leading_zeros("1.01", "1.1", Ordering::Equal)]
    #[case::snapshot_before_release("1.0-SNAPSHOT", "1.0", Ordering::Less)]
    #[case::snapshot_after_previous("1.0-SNAPSHOT", "0.9", Ordering::Greater)]
    #[case::alpha_before_beta("1.0-alpha-1", "1.0-beta-1", Ordering::Less)]
    #[case::alias_a("1.0-a1", "1.0-alpha1", Ordering::Equal)]
    #[case::milestone_before_rc("1.0-m1", "1.0-rc1", Ordering::Less)]
    #[case::cr_is_rc("1.0-cr1", "1.0-rc1", Ordering::Equal)]
    #[case::rc_before_release("1.0-rc1", "1.0", Ordering::Less)]
    #[case::sp_after_release("1.0-sp", "1.0", Ordering::Greater)]
    #[case::unknown_after_release("1.0-foo", "1.0", Ordering::Greater)]
    #[case::dash_number_before_dot_number("1.0-1", "1.0.1", Ordering::Less)]
    #[case::dash_number_after_release("1.0-1", "1.0", Ordering::Greater)]
    #[case::case_insensitive("1.0-RC1", "1.0-rc1", Ordering::Equal)]
    #[case::timestamp_vs_release("1.0-20240101.120000-1", "1.0", Ordering::Less)]
    #[case::timestamp_vs_next_patch("1.0-20240101.120000-1", "1.0.1", Ordering::Less)]
    #[case::timestamps("1.0-20240101.120000-1", "1.0-20240102.120000-1", Ordering::Less)]
    #[case::build_numbers("1.0-20240101.120000-1", "1.0-20240101.120000-2", Ordering::Less)]
    #[case::timestamp_vs_bare("1.0-20240101.120000-1", "1.0-SNAPSHOT", Ordering::Greater)]
    fn test_compare(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        let comparator = VersionComparator::default();
        assert_eq!(comparator.compare(a, b), expected);
        assert_eq!(comparator.compare(b, a), expected.reverse());
    }

    #[test]
    fn test_bare_wins_policy() {
        let comparator = VersionComparator::new(SnapshotPolicy::BareWins);
        assert_eq!(comparator.compare("1.0-20240101.120000-1", "1.0-SNAPSHOT"), Ordering::Less);
        assert_eq!(comparator.max(["1.0-20240101.120000-1", "1.0-SNAPSHOT"]), Some("1.0-SNAPSHOT"));

        let comparator = VersionComparator::default();
        assert_eq!(comparator.max(["1.0-20240101.120000-1", "1.0-SNAPSHOT"]), Some("1.0-20240101.120000-1"));
    }

    #[test]
    fn test_sort_is_consistent() {
        let comparator = VersionComparator::default();
        let mut versions = vec!["2.0", "1.0-SNAPSHOT", "1.0", "1.0-alpha-1", "1.10", "1.2", "1.0-rc1", "1.0-sp"];
        versions.sort_by(|a, b| comparator.compare(a, b));
        assert_eq!(versions, vec!["1.0-alpha-1", "1.0-rc1", "1.0-SNAPSHOT", "1.0", "1.0-sp", "1.2", "1.10", "2.0"]);
    }

    #[rstest]
    #[case::release("1.0", Quality::Release)]
    #[case::snapshot("1.0-SNAPSHOT", Quality::Snapshot)]
    #[case::timestamped("1.0-20240101.120000-3", Quality::TimestampedSnapshot)]
    #[case::latest("LATEST", Quality::Latest)]
    #[case::release_marker("RELEASE", Quality::ReleaseMarker)]
    #[case::lowercase_snapshot_is_release("1.0-snapshot", Quality::Release)]
    #[case::not_a_timestamp("1.0-2024010.120000-3", Quality::Release)]
    fn test_quality(#[case] version: &str, #[case] expected: Quality) {
        assert_eq!(MavenVersion::parse(version).quality(), expected);
    }

    #[test]
    fn test_timestamped_snapshot_round_trip() {
        let version = MavenVersion::parse("1.0-20240101.120000-3");
        assert_eq!(version.base_version(), "1.0-SNAPSHOT");
        assert_eq!(version.to_string(), "1.0-20240101.120000-3");
    }

    #[rstest]
    #[case::half_open("[1.0,2.0)", "1.0", true)]
    #[case::half_open_mid("[1.0,2.0)", "1.5", true)]
    #[case::half_open_upper("[1.0,2.0)", "2.0", false)]
    #[case::exclusive_lower("(1.0,2.0]", "1.0", false)]
    #[case::inclusive_upper("(1.0,2.0]", "2.0", true)]
    #[case::open_lower("(,1.0]", "0.1", true)]
    #[case::open_upper("[1.0,)", "99", true)]
    #[case::exact("[1.2]", "1.2.0", true)]
    #[case::exact_miss("[1.2]", "1.3", false)]
    #[case::union_first("[1,2),[3,4)", "1.5", true)]
    #[case::union_gap("[1,2),[3,4)", "2.5", false)]
    #[case::union_second("[1,2),[3,4)", "3.5", true)]
    #[case::snapshot_below_release("[1.0,2.0)", "2.0-SNAPSHOT", true)]
    fn test_range_contains(#[case] spec: &str, #[case] version: &str, #[case] expected: bool) {
        let range = VersionRange::parse(spec).unwrap();
        assert_eq!(range.contains(version, &VersionComparator::default()), expected);
    }

    #[rstest]
    #[case::unbounded("[1.0,2.0")]
    #[case::exclusive_single("(1.0)")]
    #[case::reversed("[2.0,1.0]")]
    #[case::trailing_garbage("[1.0,2.0)x")]
    #[case::too_many_commas("[1,2,3]")]
    fn test_range_invalid(#[case] spec: &str) {
        assert!(VersionRange::parse(spec).is_err());
    }

    #[test]
    fn test_version_spec() {
        assert_eq!(VersionSpec::parse("1.0").unwrap(), VersionSpec::Exact("1.0".to_string()));
        assert!(VersionSpec::parse("LATEST").unwrap().is_virtual());
        assert!(VersionSpec::parse("1.0-SNAPSHOT").unwrap().is_virtual());
        assert!(!VersionSpec::parse("1.0-20240101.120000-3").unwrap().is_virtual());
        assert!(VersionSpec::parse("[1.0]").unwrap().is_singleton());
        assert!(!VersionSpec::parse("[1.0,2.0)").unwrap().is_singleton());
        assert!(VersionSpec::parse("").is_err());
    }
}
