//! Role-name normalization.
//!
//! Guild staff decorate role names with styled Unicode ("Ꮪєяνєя Øωηєr",
//! fullwidth letters, box-drawing dividers, zero-width joiners). Pattern
//! matching runs against a normalized ASCII form so those decorations never
//! hide a role's meaning.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Normalize a role name to a plain, comparable ASCII form.
///
/// Steps: NFKD decomposition (folds fullwidth and mathematical styled
/// letters), combining-mark removal, confusable-glyph mapping, decorative
/// range stripping, whitespace collapse, lowercasing. Only alphanumerics,
/// spaces, `+` and `-` survive (`+`/`-` matter for age-range patterns like
/// "18+").
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for ch in raw.nfkd() {
        if is_combining_mark(ch) || is_decorative(ch) {
            continue;
        }

        if let Some(mapped) = map_confusable(ch) {
            out.push_str(mapped);
            continue;
        }

        if ch.is_ascii_alphanumeric() || ch == '+' || ch == '-' {
            out.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || is_separator(ch) {
            out.push(' ');
        }
        // Anything else (emoji, unmapped symbols) is dropped.
    }

    // Collapse runs of whitespace introduced by stripped decorations.
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fraction of grapheme clusters in the raw name that are neither
/// alphanumeric nor whitespace.
///
/// Names dominated by symbols ("🎀🌸🎀") are cosmetic regardless of what
/// the few remaining letters spell.
#[must_use]
pub fn symbol_ratio(raw: &str) -> f32 {
    let graphemes: Vec<&str> = raw.graphemes(true).collect();
    if graphemes.is_empty() {
        return 0.0;
    }

    let symbols = graphemes
        .iter()
        .filter(|g| {
            !g.chars()
                .all(|c| c.is_alphanumeric() || c.is_whitespace())
        })
        .count();

    symbols as f32 / graphemes.len() as f32
}

/// Decorative ranges commonly used as dividers and frames in role names.
const fn is_decorative(ch: char) -> bool {
    matches!(ch,
        '\u{200B}'..='\u{200F}'   // zero-width and directional marks
        | '\u{FE00}'..='\u{FE0F}' // variation selectors
        | '\u{FEFF}'              // zero-width no-break space
        | '\u{2500}'..='\u{257F}' // box drawing
        | '\u{2580}'..='\u{259F}' // block elements
        | '\u{25A0}'..='\u{25FF}' // geometric shapes
        | '\u{2190}'..='\u{21FF}' // arrows
        | '\u{2600}'..='\u{26FF}' // miscellaneous symbols
        | '\u{2700}'..='\u{27BF}' // dingbats
    )
}

/// Bracket characters popular in decorated names; treated as separators so
/// "【Staff】" normalizes to "staff".
const fn is_separator(ch: char) -> bool {
    matches!(
        ch,
        '[' | ']'
            | '('
            | ')'
            | '{'
            | '}'
            | '|'
            | '/'
            | '\\'
            | '_'
            | '.'
            | ','
            | ':'
            | ';'
            | '~'
            | '*'
            | '='
            | '\u{3008}'..='\u{3011}' // CJK angle/corner brackets
            | '\u{3014}'..='\u{301B}' // CJK lenticular brackets
            | '\u{FF5B}'..='\u{FF65}' // fullwidth brackets not folded by NFKD
    )
}

/// Map lookalike glyphs from other scripts onto the Latin letters they
/// imitate.
///
/// This is a glyph-shape table, not transliteration: Cyrillic `я` reads as
/// "ya" but is used as a stylized `r`, Greek `ν` as `v`, Cherokee `Ꮪ` as
/// `s`. Curated from names observed in the wild; extend as new styles
/// appear.
fn map_confusable(ch: char) -> Option<&'static str> {
    let mapped = match ch {
        // Cyrillic
        'а' | 'А' => "a",
        'в' | 'В' => "b",
        'е' | 'Е' | 'є' | 'Є' | 'ё' | 'Ё' => "e",
        'з' | 'З' => "3",
        'і' | 'І' => "i",
        'к' | 'К' => "k",
        'м' | 'М' => "m",
        'н' | 'Н' => "h",
        'о' | 'О' => "o",
        'р' | 'Р' => "p",
        'с' | 'С' => "c",
        'т' | 'Т' => "t",
        'у' | 'У' => "y",
        'х' | 'Х' => "x",
        'ѕ' | 'Ѕ' => "s",
        'я' | 'Я' => "r",
        'и' | 'И' => "n",
        'п' | 'П' => "n",
        'д' | 'Д' => "d",
        'ш' | 'Ш' => "w",
        // Greek
        'α' | 'Α' => "a",
        'β' | 'Β' => "b",
        'ε' | 'Ε' => "e",
        'η' | 'Η' => "n",
        'ι' | 'Ι' => "i",
        'κ' | 'Κ' => "k",
        'μ' | 'Μ' => "m",
        'ν' => "v",
        'Ν' => "n",
        'ο' | 'Ο' => "o",
        'ρ' | 'Ρ' => "p",
        'σ' | 'ς' | 'Σ' => "s",
        'τ' | 'Τ' => "t",
        'υ' | 'Υ' => "u",
        'ω' | 'Ω' => "w",
        'δ' | 'Δ' => "d",
        'λ' | 'Λ' => "l",
        'π' | 'Π' => "n",
        // Cherokee block, a favorite for "fancy capitals"
        'Ꭺ' => "a",
        'Ᏼ' => "b",
        'Ꮯ' => "c",
        'Ꭰ' => "d",
        'Ꭼ' => "e",
        'Ꮆ' => "g",
        'Ꮋ' => "h",
        'Ꭻ' => "j",
        'Ꮶ' => "k",
        'Ꮮ' => "l",
        'Ꮇ' => "m",
        'Ꮑ' => "n",
        'Ꭴ' => "o",
        'Ꮲ' => "p",
        'Ꭱ' => "r",
        'Ꮪ' => "s",
        'Ꮥ' => "s",
        'Ꮦ' => "t",
        'Ꮴ' => "v",
        'Ꮃ' => "w",
        'Ꮓ' => "z",
        // Latin extensions and standalone lookalikes
        'ø' | 'Ø' => "o",
        'đ' | 'Đ' => "d",
        'ł' | 'Ł' => "l",
        'þ' | 'Þ' => "p",
        'ℓ' => "l",
        '×' => "x",
        _ => return None,
    };
    Some(mapped)
}
