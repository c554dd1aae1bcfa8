use std::cmp::Ordering;

/// Compare two strings the way a collating sort would: letters compare by
/// base character first, ignoring case and accents; ties break on accents
/// (unaccented first), then case (lowercase first), then raw code points.
pub fn cmp_locale(a: &str, b: &str) -> Ordering {
    let base = |s: &str| {
        s.chars()
            .flat_map(char::to_lowercase)
            .map(strip_accent)
            .collect::<Vec<char>>()
    };
    let uppercase = |s: &str| s.chars().map(char::is_uppercase).collect::<Vec<bool>>();

    base(a)
        .cmp(&base(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| uppercase(a).cmp(&uppercase(b)))
        .then_with(|| a.cmp(b))
}

/// Map common Latin accented lowercase letters to their base letter
fn strip_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        _ => c,
    }
}

/// Format a size in storage units as rounded kilobytes, e.g. "12 KB".
pub fn format_size(units: usize) -> String {
    let kb = (units as f64 / 1024.0).round() as u64;
    format!("{} KB", kb)
}
