//! Contact-detail heuristics over extracted resume text.

use std::sync::OnceLock;

use regex::Regex;

const MAX_NAME_CHARS: usize = 50;
const MAX_SECTION_SKILLS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub skills: Vec<String>,
}

pub fn extract_contact_info(text: &str) -> ContactInfo {
    ContactInfo {
        name: extract_name(text),
        email: extract_email(text),
        phone: extract_phone(text),
        linkedin_url: extract_linkedin_url(text),
        skills: extract_skills_section(text),
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
    })
}

fn phone_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"\+?\d{1,3}[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}",
            r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}",
            r"\+?\d{10,15}",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid phone regex"))
        .collect()
    })
}

fn linkedin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:https?://)?(?:www\.)?linkedin\.com/in/[A-Za-z0-9_-]+")
            .expect("valid linkedin regex")
    })
}

fn skills_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(?:technical\s+skills?|skills?|core\s+competencies|expertise)\s*:?\s*(.*)$")
            .expect("valid skills header regex")
    })
}

pub fn extract_email(text: &str) -> Option<String> {
    email_re().find(text).map(|m| m.as_str().to_string())
}

pub fn extract_phone(text: &str) -> Option<String> {
    phone_res()
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().trim().to_string())
}

pub fn extract_linkedin_url(text: &str) -> Option<String> {
    linkedin_re().find(text).map(|m| m.as_str().to_string())
}

/// First non-blank line, if it is short and free of digits and `@#$%`.
pub fn extract_name(text: &str) -> Option<String> {
    let first = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let plausible = first.chars().count() < MAX_NAME_CHARS
        && !first
            .chars()
            .any(|c| c.is_ascii_digit() || matches!(c, '@' | '#' | '$' | '%'));
    plausible.then(|| first.to_string())
}

/// Items listed under a "Skills" style header, up to the next blank line or
/// the next capitalised heading line.
pub fn extract_skills_section(text: &str) -> Vec<String> {
    let Some(caps) = skills_header_re().captures(text) else {
        return Vec::new();
    };
    let (Some(header), Some(inline)) = (caps.get(0), caps.get(1)) else {
        return Vec::new();
    };

    let mut section = inline.as_str().to_string();
    for line in text[header.end()..].lines().skip(1) {
        let trimmed = line.trim();
        if trimmed.is_empty() || line.starts_with(|c: char| c.is_uppercase()) {
            break;
        }
        section.push('\n');
        section.push_str(trimmed);
    }

    section
        .split(|c: char| matches!(c, ',' | ';' | '•' | '\n' | '|'))
        .map(|s| s.trim().trim_start_matches(['-', '*']).trim())
        .filter(|s| s.chars().count() > 2)
        .take(MAX_SECTION_SKILLS)
        .map(str::to_string)
        .collect()
}
