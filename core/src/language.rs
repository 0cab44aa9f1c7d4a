use crate::error::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static LANGUAGE_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<primary>[a-z]{2})(?:-(?P<region>[a-z]{2}))?$")
        .expect("valid language code regex")
});

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LanguageOption {
    pub code: &'static str,
    pub label: &'static str,
}

/// Target languages offered by the language selector.
pub const SUPPORTED_LANGUAGES: &[LanguageOption] = &[
    LanguageOption { code: "ko", label: "한국어" },
    LanguageOption { code: "en", label: "English" },
    LanguageOption { code: "ja", label: "日本語" },
    LanguageOption { code: "zh", label: "中文" },
    LanguageOption { code: "es", label: "Español" },
    LanguageOption { code: "fr", label: "Français" },
    LanguageOption { code: "de", label: "Deutsch" },
    LanguageOption { code: "pt", label: "Português" },
    LanguageOption { code: "it", label: "Italiano" },
    LanguageOption { code: "ru", label: "Русский" },
    LanguageOption { code: "vi", label: "Tiếng Việt" },
    LanguageOption { code: "th", label: "ไทย" },
    LanguageOption { code: "id", label: "Bahasa Indonesia" },
    LanguageOption { code: "tr", label: "Türkçe" },
    LanguageOption { code: "ar", label: "العربية" },
    LanguageOption { code: "hi", label: "हिन्दी" },
];

/// Normalizes `input` to `xx` or `xx-YY` and checks the primary subtag
/// against the supported table.
pub fn normalize_language_code(input: &str) -> Result<String, EngineError> {
    let unsupported = || EngineError::UnsupportedLanguage(input.trim().to_string());
    let lowered = input.trim().to_ascii_lowercase().replace('_', "-");
    let captures = LANGUAGE_CODE_REGEX
        .captures(&lowered)
        .ok_or_else(unsupported)?;

    let primary = &captures["primary"];
    if find_language(primary).is_none() {
        return Err(unsupported());
    }
    Ok(match captures.name("region") {
        Some(region) => format!("{primary}-{}", region.as_str().to_ascii_uppercase()),
        None => primary.to_string(),
    })
}

pub fn find_language(code: &str) -> Option<&'static LanguageOption> {
    SUPPORTED_LANGUAGES.iter().find(|option| option.code == code)
}
