use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Episode,
    Unknown,
}

/// Identity read from a filename. `season` and `episode` are only set for
/// episodes; `year` is always within 1900..=2100 when present.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParsedName {
    pub kind: MediaKind,
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ParsedName {
    fn unknown(stem: &str) -> Self {
        Self {
            kind: MediaKind::Unknown,
            title: stem.to_string(),
            year: None,
            season: None,
            episode: None,
        }
    }
}

// Episode shapes, most specific first. The captures are always
// (title, year?, season, episode); patterns without a year skip group 2.

// Show.Title.2020.S01E02 / Show Title (2020) S01E02
static RE_EP_YEAR_SXXEXX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)[.\s_-]+[(\[]?(\d{4})[)\]]?[.\s_-]+[Ss](\d{1,2})[Ee](\d{1,3})").unwrap()
});

// Show.Title.S01E02
static RE_EP_SXXEXX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)()[.\s_-]+[Ss](\d{1,2})[Ee](\d{1,3})").unwrap()
});

// Show.Title.S01.E02
static RE_EP_SXX_DOT_EXX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)()[.\s_-]+[Ss](\d{1,2})[.\s_-]+[Ee](\d{1,3})").unwrap()
});

// Show.Title.102 (season 1, episode 2). A trailing `-` is a release group
// separator (`H.264-GROUP`), never the end of an episode code.
static RE_EP_COMBINED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)()[.\s_-]+([1-9])(\d{2})(?:[.\s_]|$)").unwrap()
});

// Movie shapes. Captures are (title, year).

// Movie.Title.2023.1080p.BluRay
static RE_MOVIE_QUALITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(.+?)[.\s_-]+[(\[]?(\d{4})[)\]]?[.\s_-]+(?:\d{3,4}p|uhd|hd|blu-?ray|web-?dl|hdrip|brrip|dvdrip|webrip|hdtv|remux)\b",
    )
    .unwrap()
});

// Movie.Title.2023.x264-GROUP
static RE_MOVIE_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)[.\s_-]+[(\[]?(\d{4})[)\]]?[.\s_].*\S-[A-Za-z0-9]+$").unwrap()
});

// Movie Title (2023)
static RE_MOVIE_BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)[.\s_-]*[(\[](\d{4})[)\]]").unwrap()
});

// Movie.Title.2023
static RE_MOVIE_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)[.\s_-]+(\d{4})(?:[.\s_-]|$)").unwrap()
});

static RE_QUALITY_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:\d{3,4}p|uhd|hd|blu-?ray|web-?dl|hdrip|brrip|dvdrip|webrip|hdtv|remux|x26[45]|h\.?26[45]|hevc|xvid|aac|ac3|dts|proper|repack)\b",
    )
    .unwrap()
});

static RE_RELEASE_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s-[A-Za-z0-9]+$").unwrap());

static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2100;

/// Parse a media filename. Total: names that fit no pattern come back as
/// `Unknown` with the extension removed.
pub fn parse_filename(filename: &str) -> ParsedName {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let stem = strip_extension(name);

    for (re, combined) in [
        (&*RE_EP_YEAR_SXXEXX, false),
        (&*RE_EP_SXXEXX, false),
        (&*RE_EP_SXX_DOT_EXX, false),
        (&*RE_EP_COMBINED, true),
    ] {
        if let Some(caps) = re.captures(stem) {
            if combined && !plausible_combined_code(&caps[1]) {
                continue;
            }
            let number = |i: usize| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(1)
            };
            return ParsedName {
                kind: MediaKind::Episode,
                title: clean_title(&caps[1]),
                year: caps.get(2).and_then(|m| accept_year(m.as_str())),
                season: Some(number(3)),
                episode: Some(number(4)),
            };
        }
    }

    for re in [
        &*RE_MOVIE_QUALITY,
        &*RE_MOVIE_GROUP,
        &*RE_MOVIE_BRACKETED,
        &*RE_MOVIE_BARE,
    ] {
        if let Some(caps) = re.captures(stem) {
            let title = clean_title(&caps[1]);
            if title.is_empty() {
                continue;
            }
            return ParsedName {
                kind: MediaKind::Movie,
                title,
                year: accept_year(&caps[2]),
                season: None,
                episode: None,
            };
        }
    }

    ParsedName::unknown(stem)
}

/// Text before a bare three-digit code must not end in a codec letter
/// (`H.264`, `x.265`) or already carry release tokens such as resolution.
fn plausible_combined_code(left: &str) -> bool {
    let last = left.rsplit(['.', ' ', '_', '-']).next().unwrap_or(left);
    if last.eq_ignore_ascii_case("h") || last.eq_ignore_ascii_case("x") {
        return false;
    }
    !RE_QUALITY_TOKENS.is_match(left)
}

fn accept_year(raw: &str) -> Option<i32> {
    raw.parse().ok().filter(|y| YEAR_RANGE.contains(y))
}

/// Drop a trailing `.ext` when it looks like a file extension: short,
/// alphanumeric and containing a letter. `Movie.2023` keeps its year.
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => {
            let ext = &name[pos + 1..];
            let looks_like_ext = (1..=4).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic());
            if looks_like_ext { &name[..pos] } else { name }
        }
        _ => name,
    }
}

/// Normalize the text that preceded a year or episode marker into a
/// display title.
pub fn clean_title(raw: &str) -> String {
    let spaced = raw.replace(['.', '_'], " ");
    let without_quality = RE_QUALITY_TOKENS.replace_all(&spaced, " ");
    let without_group = RE_RELEASE_GROUP.replace(without_quality.trim_end(), "");
    let collapsed = RE_SPACES.replace_all(&without_group, " ");
    let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '(' | '[' | ')' | ']'));
    title_case(trimmed)
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    let mut word = first.to_ascii_uppercase().to_string();
                    word.push_str(&chars.as_str().to_ascii_lowercase());
                    word
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
