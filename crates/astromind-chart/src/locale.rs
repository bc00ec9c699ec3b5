//! Display names for planets, signs and aspects.
//!
//! Every lookup falls back to the raw identifier so unknown bodies or
//! aspect kinds coming from the backend never break a report.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Zodiac signs in ecliptic order with their glyphs
pub const ZODIAC_SIGNS: &[(&str, &str)] = &[
    ("Aries", "♈"),
    ("Taurus", "♉"),
    ("Gemini", "♊"),
    ("Cancer", "♋"),
    ("Leo", "♌"),
    ("Virgo", "♍"),
    ("Libra", "♎"),
    ("Scorpio", "♏"),
    ("Sagittarius", "♐"),
    ("Capricorn", "♑"),
    ("Aquarius", "♒"),
    ("Pisces", "♓"),
];

const PLANET_GLYPHS: &[(&str, &str)] = &[
    ("Sun", "☉"),
    ("Moon", "☽"),
    ("Mercury", "☿"),
    ("Venus", "♀"),
    ("Mars", "♂"),
    ("Jupiter", "♃"),
    ("Saturn", "♄"),
    ("Uranus", "♅"),
    ("Neptune", "♆"),
    ("Pluto", "♇"),
    ("Node", "☊"),
    ("Chiron", "⚷"),
];

/// Glyph drawn for planets missing from the glyph table
pub const FALLBACK_GLYPH: &str = "•";

const BG_PLANETS: &[(&str, &str)] = &[
    ("Sun", "Слънце"),
    ("Moon", "Луна"),
    ("Mercury", "Меркурий"),
    ("Venus", "Венера"),
    ("Mars", "Марс"),
    ("Jupiter", "Юпитер"),
    ("Saturn", "Сатурн"),
    ("Uranus", "Уран"),
    ("Neptune", "Нептун"),
    ("Pluto", "Плутон"),
    ("Node", "Възходящ Възел"),
    ("Chiron", "Хирон"),
];

const BG_SIGNS: &[(&str, &str)] = &[
    ("Aries", "Овен"),
    ("Taurus", "Телец"),
    ("Gemini", "Близнаци"),
    ("Cancer", "Рак"),
    ("Leo", "Лъв"),
    ("Virgo", "Дева"),
    ("Libra", "Везни"),
    ("Scorpio", "Скорпион"),
    ("Sagittarius", "Стрелец"),
    ("Capricorn", "Козирог"),
    ("Aquarius", "Водолей"),
    ("Pisces", "Риби"),
];

const BG_ASPECTS: &[(&str, &str)] = &[
    ("conjunction", "съвпад"),
    ("sextile", "секстил"),
    ("square", "квадратура"),
    ("trine", "тригон"),
    ("opposition", "опозиция"),
];

const EN_PLANETS: &[(&str, &str)] = &[("Node", "North Node")];

const EN_ASPECTS: &[(&str, &str)] = &[
    ("conjunction", "conjunction"),
    ("sextile", "sextile"),
    ("square", "square"),
    ("trine", "trine"),
    ("opposition", "opposition"),
];

/// Fixed UI wording for one locale
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub summary_title: &'static str,
    pub positions_heading: &'static str,
    pub houses_heading: &'static str,
    pub aspects_heading: &'static str,
    pub empty_house: &'static str,
    pub ascendant: &'static str,
    pub house_word: &'static str,
    pub orb_word: &'static str,
    pub speed_word: &'static str,
    pub per_day_word: &'static str,
    pub unavailable: &'static str,
    pub no_data: &'static str,
    pub unknown_user: &'static str,
    pub static_month: &'static str,
    pub default_report_type: &'static str,
}

const BG_LABELS: Labels = Labels {
    summary_title: "Обобщена информация за картата",
    positions_heading: "1. ПЛАНЕТАРНИ ПОЗИЦИИ",
    houses_heading: "2. ДОМОВЕ",
    aspects_heading: "3. АСПЕКТИ",
    empty_house: "празен",
    ascendant: "Асцендент",
    house_word: "дом",
    orb_word: "орб",
    speed_word: "скорост",
    per_day_word: "ден",
    unavailable: "N/A",
    no_data: "Няма данни за показване",
    unknown_user: "Неизвестен",
    static_month: "Анализ",
    default_report_type: "Астрологичен Анализ",
};

const EN_LABELS: Labels = Labels {
    summary_title: "Chart summary",
    positions_heading: "1. PLANETARY POSITIONS",
    houses_heading: "2. HOUSES",
    aspects_heading: "3. ASPECTS",
    empty_house: "empty",
    ascendant: "Ascendant",
    house_word: "house",
    orb_word: "orb",
    speed_word: "speed",
    per_day_word: "day",
    unavailable: "N/A",
    no_data: "No data to display",
    unknown_user: "Unknown",
    static_month: "Analysis",
    default_report_type: "Astrological Analysis",
};

lazy_static::lazy_static! {
    static ref SIGN_PATTERNS: Vec<Regex> = ZODIAC_SIGNS
        .iter()
        .map(|(name, _)| {
            Regex::new(&format!("(?i){}", regex::escape(name)))
                .expect("sign pattern is a literal")
        })
        .collect();
}

/// Target display language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Bg,
    En,
}

fn lookup<'a>(table: &[(&str, &'static str)], id: &'a str) -> Cow<'a, str> {
    table
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, name)| Cow::Borrowed(*name))
        .unwrap_or(Cow::Borrowed(id))
}

impl Locale {
    /// Parse a locale tag such as "bg", "en" or "en-US".
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        match primary.to_ascii_lowercase().as_str() {
            "bg" => Some(Locale::Bg),
            "en" => Some(Locale::En),
            _ => None,
        }
    }

    pub fn labels(&self) -> &'static Labels {
        match self {
            Locale::Bg => &BG_LABELS,
            Locale::En => &EN_LABELS,
        }
    }

    pub fn planet_name<'a>(&self, id: &'a str) -> Cow<'a, str> {
        match self {
            Locale::Bg => lookup(BG_PLANETS, id),
            Locale::En => lookup(EN_PLANETS, id),
        }
    }

    pub fn sign_name<'a>(&self, id: &'a str) -> Cow<'a, str> {
        match self {
            Locale::Bg => lookup(BG_SIGNS, id),
            Locale::En => Cow::Borrowed(id),
        }
    }

    pub fn aspect_name<'a>(&self, id: &'a str) -> Cow<'a, str> {
        match self {
            Locale::Bg => lookup(BG_ASPECTS, id),
            Locale::En => lookup(EN_ASPECTS, id),
        }
    }

    /// Replace every case-insensitive occurrence of a canonical sign name.
    ///
    /// The whole string is scanned because the upstream format does not fix
    /// where the sign appears. Sign names embedded inside unrelated words are
    /// replaced as well.
    pub fn translate_signs(&self, text: &str) -> String {
        let mut translated = text.to_string();
        for ((canonical, _), pattern) in ZODIAC_SIGNS.iter().zip(SIGN_PATTERNS.iter()) {
            let localized = self.sign_name(canonical);
            let replaced = pattern
                .replace_all(&translated, regex::NoExpand(localized.as_ref()))
                .into_owned();
            translated = replaced;
        }
        translated
    }

    /// Ordinal house label, e.g. "1-ви дом" or "1st house".
    pub fn house_label(&self, house: u8) -> String {
        match self {
            Locale::Bg => {
                let suffix = match house {
                    1 => "ви",
                    2 => "ри",
                    11 => "и",
                    _ => "ти",
                };
                format!("{}-{} {}", house, suffix, self.labels().house_word)
            }
            Locale::En => {
                let suffix = match (house % 10, house % 100) {
                    (_, 11..=13) => "th",
                    (1, _) => "st",
                    (2, _) => "nd",
                    (3, _) => "rd",
                    _ => "th",
                };
                format!("{}{} {}", house, suffix, self.labels().house_word)
            }
        }
    }
}

/// Planet glyph, or a generic bullet for unknown identifiers.
pub fn planet_glyph(id: &str) -> &'static str {
    PLANET_GLYPHS
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, glyph)| *glyph)
        .unwrap_or(FALLBACK_GLYPH)
}
