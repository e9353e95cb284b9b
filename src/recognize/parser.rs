use regex::Regex;

/// Media kind derived from a filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Single,
    Series,
}

/// Result of the heuristic filename parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub kind: MediaKind,
    pub title: String,
    pub season: u32,
    pub episode: u32,
}

/// Parse a `S<digits>[E|-]<digits>` season/episode marker, case-insensitive
pub fn parse_season_episode(text: &str) -> Option<(u32, u32)> {
    let pattern = Regex::new(r"(?i)s(\d{1,3})\s*[e-](\d{1,3})").unwrap();
    let caps = pattern.captures(text)?;
    let season = caps[1].parse().ok()?;
    let episode = caps[2].parse().ok()?;
    Some((season, episode))
}

/// Derive {kind, cleaned title, season, episode} from a filename.
///
/// Rules are checked in a fixed precedence order, first match wins:
/// 1. `SxxExx` / `Sxx-xx` season-episode marker
/// 2. bare `NN-MM` episode marker
/// 3. ISO-like date fragment (date-stamped content is episodic)
/// 4. spelled-out "season N episode M" phrasing
/// 5. otherwise a single item; year and quality/codec tokens stripped
pub fn parse_filename(filename: &str) -> ParsedFilename {
    let stem = strip_extension(filename);

    let se_pattern = Regex::new(r"(?i)\bs(\d{1,3})\s*[e-](\d{1,3})").unwrap();
    if let Some(caps) = se_pattern.captures(&stem) {
        let span = caps.get(0).unwrap();
        return ParsedFilename {
            kind: MediaKind::Series,
            title: clean_title(&stem[..span.start()]),
            season: caps[1].parse().unwrap_or(1),
            episode: caps[2].parse().unwrap_or(1),
        };
    }

    // Bare NN-MM marker. The surrounding character classes keep this from
    // matching inside date fragments like 2023-04-05.
    let bare_pattern = Regex::new(r"(?:^|[^\d-])(\d{1,2})-(\d{1,2})(?:[^\d-]|$)").unwrap();
    if let Some(caps) = bare_pattern.captures(&stem) {
        let span = caps.get(0).unwrap();
        return ParsedFilename {
            kind: MediaKind::Series,
            title: clean_title(&stem[..span.start()]),
            season: caps[1].parse().unwrap_or(1),
            episode: caps[2].parse().unwrap_or(1),
        };
    }

    let date_pattern = Regex::new(r"\d{4}[.-]\d{1,2}[.-]\d{1,2}").unwrap();
    if let Some(span) = date_pattern.find(&stem) {
        return ParsedFilename {
            kind: MediaKind::Series,
            title: clean_title(&stem[..span.start()]),
            season: 1,
            episode: 1,
        };
    }

    let phrase_pattern = Regex::new(r"(?i)season\s*(\d{1,2})[\s.,_-]*episode\s*(\d{1,3})").unwrap();
    if let Some(caps) = phrase_pattern.captures(&stem) {
        let span = caps.get(0).unwrap();
        return ParsedFilename {
            kind: MediaKind::Series,
            title: clean_title(&stem[..span.start()]),
            season: caps[1].parse().unwrap_or(1),
            episode: caps[2].parse().unwrap_or(1),
        };
    }

    let localized_pattern = Regex::new(r"第\s*(\d{1,2})\s*季.*?第\s*(\d{1,3})\s*集").unwrap();
    if let Some(caps) = localized_pattern.captures(&stem) {
        let span = caps.get(0).unwrap();
        return ParsedFilename {
            kind: MediaKind::Series,
            title: clean_title(&stem[..span.start()]),
            season: caps[1].parse().unwrap_or(1),
            episode: caps[2].parse().unwrap_or(1),
        };
    }

    // Single item: drop everything from the year substring onward
    let year_pattern = Regex::new(r"\d{4}.*$").unwrap();
    let without_year = year_pattern.replace(&stem, "");

    ParsedFilename {
        kind: MediaKind::Single,
        title: clean_title(&without_year),
        season: 1,
        episode: 1,
    }
}

/// Lighter-weight cleanup used as the last resort before giving up on a
/// title entirely
pub fn fallback_clean(filename: &str) -> String {
    let stem = strip_extension(filename);
    let cleaned: String = stem
        .chars()
        .map(|c| if c == '.' || c == '_' || c == '-' { ' ' } else { c })
        .collect();
    collapse_whitespace(&cleaned)
}

fn strip_extension(filename: &str) -> String {
    let pattern = Regex::new(r"\.[^/.]+$").unwrap();
    pattern.replace(filename, "").into_owned()
}

fn clean_title(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();

    let token_pattern = Regex::new(
        r"(?i)\b(2160p|1080p|720p|480p|4k|uhd|bluray|blu-ray|bdrip|web-?dl|webrip|hdtv|dvdrip|x264|x265|h264|h265|hevc|avc|remux|hdr10?|dovi|10bit|8bit|aac|ac3|eac3|dts|truehd|flac|atmos|proper|repack|internal)\b",
    )
    .unwrap();
    let scrubbed = token_pattern.replace_all(&spaced, " ");

    collapse_whitespace(scrubbed.trim_matches(|c: char| c.is_whitespace() || c == '-'))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
