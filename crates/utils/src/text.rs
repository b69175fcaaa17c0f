use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid regex"));

/// Lowercase a label, fold Spanish accents and turn every other run of characters into one dash
/// ("Planos Estructurales" -> "planos-estructurales", "../Diseño" -> "diseno").
/// The result only contains `[a-z0-9-]`, so it is safe as a single path segment.
pub fn slugify(label: &str) -> String {
    let folded: String = label.to_lowercase().chars().map(fold_accent).collect();
    NON_SLUG.replace_all(&folded, "-").trim_matches('-').to_string()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}

/// `#RRGGBB`
pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR.is_match(value)
}

/// True when `text` has at least `min_chars` characters once surrounding whitespace is removed.
pub fn has_min_chars(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() >= min_chars
}

/// File name without its final extension ("acta.final.pdf" -> "acta.final").
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// Final extension of a file name, if any.
pub fn extension(file_name: &str) -> Option<&str> {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < file_name.len() => Some(&file_name[idx + 1..]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_whitespace() {
        assert_eq!(slugify("Planos  Estructurales"), "planos-estructurales");
        assert_eq!(slugify(" general "), "general");
    }

    #[test]
    fn test_slugify_keeps_a_single_path_segment() {
        assert_eq!(slugify("../planos"), "planos");
        assert_eq!(slugify("contratos/2025\\anexos"), "contratos-2025-anexos");
        assert_eq!(slugify("Diseño Eléctrico"), "diseno-electrico");
        assert_eq!(slugify("../.."), "");
    }

    #[test]
    fn test_is_hex_color() {
        assert!(is_hex_color("#3B82F6"));
        assert!(is_hex_color("#ec4899"));
        assert!(!is_hex_color("3B82F6"));
        assert!(!is_hex_color("#3B82F"));
        assert!(!is_hex_color("red"));
    }

    #[test]
    fn test_has_min_chars_ignores_padding() {
        assert!(has_min_chars("  firma corregida ", 10));
        assert!(!has_min_chars("   corto    ", 10));
        // multibyte characters count once
        assert!(has_min_chars("revisión añadida", 10));
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("acta.final.pdf"), "acta.final");
        assert_eq!(strip_extension("README"), "README");
        assert_eq!(strip_extension(".env"), ".env");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("plano.PDF"), Some("PDF"));
        assert_eq!(extension("sin_extension"), None);
        assert_eq!(extension("trailing."), None);
    }
}
