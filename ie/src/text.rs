//! Normalization of raw OCR output.

/// Characters the game UI draws around labels that OCR picks up as text.
const DECORATION: &[char] = &[
	'|', '[', ']', '<', '>', '_', '~', '*', '"', '\'', '`', '«', '»', '•', '·', '—', '–', '=', '#',
];

/// Minimum normalized length accepted as a read.
const MIN_LEN: usize = 2;

/// Normalize raw OCR text.
///
/// Trims, collapses internal whitespace, lowercases and strips UI decoration.
/// Empty output and output that is mostly punctuation count as no read.
pub fn normalize(raw: &str) -> Option<String> {
	let text = raw
		.split_whitespace()
		.map(|word| {
			word.chars()
				.filter(|c| !DECORATION.contains(c))
				.flat_map(char::to_lowercase)
				.collect::<String>()
		})
		.filter(|word| !word.is_empty())
		.collect::<Vec<_>>()
		.join(" ");

	if text.chars().count() < MIN_LEN {
		return None;
	}

	let visible = text.chars().filter(|c| !c.is_whitespace()).count();
	let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
	if alnum * 2 < visible {
		return None;
	}

	Some(text)
}

/// Normalize a key from a lookup table. Unlike [`normalize`], never rejects.
pub fn normalize_key(key: &str) -> String {
	normalize(key).unwrap_or_else(|| key.trim().to_lowercase())
}
