//! Font face descriptors derived from file names.
//!
//! Names follow the `Family-<Weight>[Italic]` convention, e.g.
//! `Inter-SemiBoldItalic.ttf`. Anything unrecognized degrades to weight
//! `normal` and upright style instead of failing.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::transcode::TranscodeError;

/// Characters escaped in generated `url(...)` values.
const URL_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'#')
    .add(b'?')
    .add(b'%');

/// CSS `font-weight` of a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Normal,
    Thin,
    ExtraLight,
    Light,
    Regular,
    Medium,
    SemiBold,
    Bold,
    ExtraBold,
    Black,
}

impl FontWeight {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Thin => "100",
            Self::ExtraLight => "200",
            Self::Light => "300",
            Self::Regular => "400",
            Self::Medium => "500",
            Self::SemiBold => "600",
            Self::Bold => "700",
            Self::ExtraBold => "800",
            Self::Black => "900",
        }
    }

    /// Weight named by a lowercase style segment.
    fn from_segment(segment: &str) -> Self {
        KEYWORDS
            .iter()
            .find(|(keyword, _)| segment.contains(keyword))
            .map_or(Self::Normal, |(_, weight)| *weight)
    }
}

/// Weight keywords, longest first so `extrabold` wins over `bold`.
const KEYWORDS: &[(&str, FontWeight)] = &[
    ("extralight", FontWeight::ExtraLight),
    ("ultralight", FontWeight::ExtraLight),
    ("extrabold", FontWeight::ExtraBold),
    ("ultrabold", FontWeight::ExtraBold),
    ("demibold", FontWeight::SemiBold),
    ("semibold", FontWeight::SemiBold),
    ("hairline", FontWeight::Thin),
    ("regular", FontWeight::Regular),
    ("medium", FontWeight::Medium),
    ("normal", FontWeight::Regular),
    ("black", FontWeight::Black),
    ("heavy", FontWeight::Black),
    ("light", FontWeight::Light),
    ("bold", FontWeight::Bold),
    ("book", FontWeight::Regular),
    ("thin", FontWeight::Thin),
];

/// Web font container written next to each source font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    Woff2,
    Woff,
}

impl FontFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Woff2 => "woff2",
            Self::Woff => "woff",
        }
    }
}

/// One `@font-face` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFace {
    pub family: String,
    pub weight: FontWeight,
    pub italic: bool,
    /// File stem shared by the source and converted files.
    pub stem: String,
}

impl FontFace {
    /// Describe a face from its file stem.
    ///
    /// The family is everything before the first `-` or `_`; weight and
    /// style are matched case-insensitively in the rest.
    pub fn from_stem(stem: &str) -> Self {
        let Some((family, style)) = stem.split_once(['-', '_']) else {
            return Self {
                family: stem.to_string(),
                weight: FontWeight::Normal,
                italic: false,
                stem: stem.to_string(),
            };
        };

        let style = style.to_ascii_lowercase();
        Self {
            family: family.to_string(),
            weight: FontWeight::from_segment(&style),
            italic: style.contains("italic"),
            stem: stem.to_string(),
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(Self::from_stem)
    }

    fn write_rule(&self, out: &mut String, url: &str, display: &str, formats: &[FontFormat]) {
        let style = if self.italic { "italic" } else { "normal" };
        let stem = utf8_percent_encode(&self.stem, URL_SEGMENT);

        let src = if formats.is_empty() {
            format!("local(\"{}\")", self.family)
        } else {
            formats
                .iter()
                .map(|f| {
                    let ext = f.extension();
                    format!("url(\"{url}{stem}.{ext}\") format(\"{ext}\")")
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let _ = write!(
            out,
            "@font-face {{\n  font-family: \"{}\";\n  font-style: {style};\n  font-weight: {};\n  font-display: {display};\n  src: {src};\n}}\n",
            self.family,
            self.weight.as_str(),
        );
    }
}

/// Faces collected by one fonts run, keyed by stem.
#[derive(Debug, Default)]
pub struct FontFaceSheet {
    faces: BTreeMap<String, FontFace>,
}

impl FontFaceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a face. Returns `false` if its stem was already present.
    pub fn insert(&mut self, face: FontFace) -> bool {
        if self.faces.contains_key(&face.stem) {
            return false;
        }
        self.faces.insert(face.stem.clone(), face);
        true
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Render all rules, ordered by stem.
    ///
    /// `url` is the prefix of font files as referenced from the stylesheet;
    /// a trailing `/` is added when missing.
    pub fn render(&self, url: &str, display: &str, formats: &[FontFormat]) -> String {
        let url = match url {
            "" => String::new(),
            u if u.ends_with('/') => u.to_string(),
            u => format!("{u}/"),
        };
        let mut out = String::new();
        for (i, face) in self.faces.values().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            face.write_rule(&mut out, &url, display, formats);
        }
        out
    }

    /// Write the rendered sheet to `path` in a single write.
    pub fn write(
        &self,
        path: &Path,
        url: &str,
        display: &str,
        formats: &[FontFormat],
    ) -> Result<(), TranscodeError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TranscodeError::io(parent, e))?;
        }
        fs::write(path, self.render(url, display, formats)).map_err(|e| TranscodeError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_every_weight_keyword() {
        let cases = [
            ("Inter-Thin", "100"),
            ("Inter-Hairline", "100"),
            ("Inter-ExtraLight", "200"),
            ("Inter-UltraLight", "200"),
            ("Inter-Light", "300"),
            ("Inter-Regular", "400"),
            ("Inter-Book", "400"),
            ("Inter-Medium", "500"),
            ("Inter-SemiBold", "600"),
            ("Inter-DemiBold", "600"),
            ("Inter-Bold", "700"),
            ("Inter-ExtraBold", "800"),
            ("Inter-UltraBold", "800"),
            ("Inter-Black", "900"),
            ("Inter-Heavy", "900"),
        ];
        for (stem, weight) in cases {
            let face = FontFace::from_stem(stem);
            assert_eq!(face.weight.as_str(), weight, "{stem}");
            assert_eq!(face.family, "Inter");
            assert!(!face.italic);
        }
    }

    #[test]
    fn test_case_and_italic() {
        let face = FontFace::from_stem("roboto-EXTRABOLDitalic");
        assert_eq!(face.family, "roboto");
        assert_eq!(face.weight, FontWeight::ExtraBold);
        assert!(face.italic);

        let face = FontFace::from_stem("Lora_semiboldItalic");
        assert_eq!(face.weight, FontWeight::SemiBold);
        assert!(face.italic);
    }

    #[test]
    fn test_unrecognized_weight_is_normal() {
        let face = FontFace::from_stem("Inter-Italic");
        assert_eq!(face.weight, FontWeight::Normal);
        assert!(face.italic);

        let face = FontFace::from_stem("Inter-Wide");
        assert_eq!(face.weight.as_str(), "normal");
    }

    #[test]
    fn test_no_separator() {
        let face = FontFace::from_stem("BoldItalicFont");
        assert_eq!(face.family, "BoldItalicFont");
        assert_eq!(face.weight, FontWeight::Normal);
        assert!(!face.italic);
    }

    #[test]
    fn test_sheet_dedups_by_stem() {
        let mut sheet = FontFaceSheet::new();
        assert!(sheet.insert(FontFace::from_stem("Inter-Bold")));
        assert!(!sheet.insert(FontFace::from_stem("Inter-Bold")));
        assert!(sheet.insert(FontFace::from_stem("Inter-Regular")));
        assert_eq!(sheet.len(), 2);

        let css = sheet.render("fonts", "swap", &[FontFormat::Woff2, FontFormat::Woff]);
        assert_eq!(css.matches("@font-face").count(), 2);
        // Ordered by stem
        assert!(css.find("Inter-Bold.woff2").unwrap() < css.find("Inter-Regular.woff2").unwrap());
        assert!(css.contains(
            "src: url(\"fonts/Inter-Bold.woff2\") format(\"woff2\"), url(\"fonts/Inter-Bold.woff\") format(\"woff\");"
        ));
        assert!(css.contains("font-weight: 700;"));
        assert!(css.contains("font-display: swap;"));
    }

    #[test]
    fn test_render_escapes_and_local_fallback() {
        let mut sheet = FontFaceSheet::new();
        sheet.insert(FontFace::from_stem("My Font-Light"));
        let css = sheet.render("", "swap", &[FontFormat::Woff2]);
        assert!(css.contains("url(\"My%20Font-Light.woff2\")"));

        let css = sheet.render("fonts/", "block", &[]);
        assert!(css.contains("src: local(\"My Font\");"));
    }

    #[test]
    fn test_write_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("styles/_fonts.scss");
        let mut sheet = FontFaceSheet::new();
        sheet.insert(FontFace::from_stem("Inter-Bold"));
        sheet.write(&path, "fonts", "swap", &[FontFormat::Woff2]).unwrap();

        let css = fs::read_to_string(&path).unwrap();
        assert_eq!(css.matches("@font-face").count(), 1);
    }
}
