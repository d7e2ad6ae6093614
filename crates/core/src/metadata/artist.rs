//! Artist extraction from free-text catalog descriptions.

/// Returned when no artist can be found.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Labels marking a line as credits for someone other than the performer.
const NON_ARTIST_LABELS: &[&str] = &[
    "作詞", "作词", "作曲", "編曲", "编曲", "lyricist", "lyrics", "composer", "arranger",
];

/// Labels marking a line as naming the performer.
const ARTIST_LABELS: &[&str] = &["artist", "歌手", "演唱", "歌", "唄"];

/// Extract the performing artist of `song_title` from a description.
///
/// The line right after the first line mentioning the title is taken as the
/// artist, unless it is a lyricist/composer/arranger credit. Otherwise the
/// first explicitly labeled artist line wins. Pure and infallible.
pub fn extract_artist(song_title: &str, description: &str) -> String {
    let lines: Vec<&str> = description.lines().map(str::trim).collect();
    let title = song_title.trim();

    let title_idx = if title.is_empty() {
        None
    } else {
        lines.iter().position(|line| line.contains(title))
    };

    if let Some(idx) = title_idx {
        let next = lines[idx + 1..].iter().find(|line| !line.is_empty());
        if let Some(candidate) = next {
            if let Some(artist) = labeled_artist(candidate) {
                return artist;
            }
            if !has_non_artist_label(candidate) {
                return candidate.to_string();
            }
        }
    }

    lines
        .iter()
        .find_map(|line| labeled_artist(line))
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
}

fn has_non_artist_label(line: &str) -> bool {
    let lower = line.to_lowercase();
    NON_ARTIST_LABELS.iter().any(|label| lower.contains(label))
}

/// Value of a `Label: value` line when the label names the artist.
fn labeled_artist(line: &str) -> Option<String> {
    let (label, value) = line.split_once([':', '：'])?;
    let label = label.trim().to_lowercase();
    let value = value.trim();

    if value.is_empty() || !ARTIST_LABELS.contains(&label.as_str()) {
        return None;
    }
    Some(value.to_string())
}
