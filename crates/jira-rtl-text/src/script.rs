use once_cell::sync::Lazy;
use regex::Regex;

/// Unicode scripts written right-to-left that trigger a direction hint.
///
/// | Script  | Languages                                          |
/// |---------|----------------------------------------------------|
/// | Hebrew  | Hebrew, Yiddish                                    |
/// | Arabic  | Arabic, Persian, Urdu, Pashto, Kurdish, Sindhi     |
/// | Syriac  | Aramaic, Assyrian, Chaldean                        |
/// | Thaana  | Dhivehi                                            |
/// | Nko     | N'Ko                                               |
/// | Mandaic | Mandaic                                            |
/// | Adlam   | Fulani                                             |
pub const RTL_SCRIPTS: [&str; 7] = [
    "Hebrew", "Arabic", "Syriac", "Thaana", "Nko", "Mandaic", "Adlam",
];

// Matches on the Script property itself rather than block ranges: several
// of these scripts share supplementary-plane neighbourhoods with unrelated
// scripts.
static RTL_REGEX: Lazy<Regex> = Lazy::new(|| {
    let classes: String = RTL_SCRIPTS
        .iter()
        .map(|script| format!(r"\p{{Script={script}}}"))
        .collect();
    Regex::new(&format!("[{classes}]")).expect("RTL script class compiles")
});

/// Returns `true` if `text` contains at least one character from a
/// right-to-left script (see [`RTL_SCRIPTS`]).
pub fn is_right_to_left(text: &str) -> bool {
    !text.is_empty() && RTL_REGEX.is_match(text)
}

/// Coarse direction of a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

impl TextDirection {
    /// `Rtl` as soon as any RTL-script character is present.
    pub fn of(text: &str) -> Self {
        if is_right_to_left(text) {
            TextDirection::Rtl
        } else {
            TextDirection::Ltr
        }
    }

    pub fn is_rtl(self) -> bool {
        matches!(self, TextDirection::Rtl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_rtl_script() {
        let samples = [
            ("Hebrew", "שלום"),
            ("Arabic", "مرحبا"),
            ("Syriac", "ܫܠܡܐ"),
            ("Thaana", "ދިވެހި"),
            ("Nko", "ߒߞߏ"),
            ("Mandaic", "ࡌࡀࡍࡃࡀࡉࡀ"),
            ("Adlam", "𞤀𞤣𞤤𞤢𞤥"),
        ];
        for (script, text) in samples {
            assert!(is_right_to_left(text), "{script} sample not detected");
        }
    }

    #[test]
    fn single_rtl_char_in_latin_is_enough() {
        assert!(is_right_to_left("Fix login bug א"));
        assert!(is_right_to_left("ABC-123 فارسی"));
        assert_eq!(TextDirection::of("release 2.0 - גרסה"), TextDirection::Rtl);
    }

    #[test]
    fn ltr_scripts_are_rejected() {
        for text in [
            "",
            "hello world",
            "ABC-123: fix (urgent)!",
            "0123456789 +-*/",
            "日本語のテキスト",
            "한국어",
            "Ελληνικά",
            "Русский",
        ] {
            assert!(!is_right_to_left(text), "{text:?} detected as RTL");
        }
        assert_eq!(TextDirection::of("plain"), TextDirection::Ltr);
    }

    #[test]
    fn rtl_scripts_outside_the_set_are_rejected() {
        // Samaritan and Mende Kikakui are right-to-left but not in the set.
        assert!(!is_right_to_left("\u{0800}\u{0801}"));
        assert!(!is_right_to_left("\u{1E800}"));
    }

    #[test]
    fn arabic_presentation_forms_and_digits_count() {
        assert!(is_right_to_left("\u{FB50}"));
        assert!(is_right_to_left("\u{0660}"));
        assert!(is_right_to_left("\u{FB1D}"));
    }

    #[test]
    fn direction_defaults_to_ltr() {
        assert_eq!(TextDirection::default(), TextDirection::Ltr);
        assert!(TextDirection::of("عربي").is_rtl());
        assert!(!TextDirection::of("").is_rtl());
    }
}
