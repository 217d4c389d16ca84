//! Cleanup of raw model output before it is typed or spoken.

/// Code point ranges removed from generated text. Games render these as
/// boxes or not at all.
const EMOJI_RANGES: [(u32, u32); 7] = [
    (0x1F600, 0x1F64F), // emoticons
    (0x1F300, 0x1F5FF), // symbols and pictographs
    (0x1F680, 0x1F6FF), // transport and map
    (0x1F1E0, 0x1F1FF), // flags
    (0x2700, 0x27BF),   // dingbats
    (0x2600, 0x26FF),   // misc symbols
    (0x1F900, 0x1F9FF), // supplemental symbols and pictographs
];

fn is_emoji(c: char) -> bool {
    let cp = c as u32;
    EMOJI_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&cp))
}

/// Remove quote characters, cut everything from the first `#`, drop emoji,
/// and trim.
pub fn sanitize(raw: &str) -> String {
    let unquoted: String = raw.chars().filter(|c| !matches!(c, '"' | '\'')).collect();
    let before_hashtag = match unquoted.find('#') {
        Some(pos) => &unquoted[..pos],
        None => unquoted.as_str(),
    };
    before_hashtag
        .chars()
        .filter(|c| !is_emoji(*c))
        .collect::<String>()
        .trim()
        .to_string()
}
