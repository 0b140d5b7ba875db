//! Normalization of free-form trip and passenger values
//!
//! Everything here is stateless and exact: an unrecognized input yields
//! `None`, which callers treat as "field still missing". There is no fuzzy
//! matching.

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// Known city and airport names, already in normalized form
const AIRPORTS: &[(&str, &str)] = &[
    ("hà nội", "HAN"),
    ("ha noi", "HAN"),
    ("hanoi", "HAN"),
    ("nội bài", "HAN"),
    ("noi bai", "HAN"),
    ("hồ chí minh", "SGN"),
    ("ho chi minh", "SGN"),
    ("ho chi minh city", "SGN"),
    ("hcm", "SGN"),
    ("tphcm", "SGN"),
    ("sài gòn", "SGN"),
    ("sai gon", "SGN"),
    ("saigon", "SGN"),
    ("tân sơn nhất", "SGN"),
    ("tan son nhat", "SGN"),
    ("đà nẵng", "DAD"),
    ("da nang", "DAD"),
    ("danang", "DAD"),
    ("hải phòng", "HPH"),
    ("hai phong", "HPH"),
    ("cát bi", "HPH"),
    ("nha trang", "CXR"),
    ("cam ranh", "CXR"),
    ("khánh hòa", "CXR"),
    ("phú quốc", "PQC"),
    ("phu quoc", "PQC"),
    ("huế", "HUI"),
    ("hue", "HUI"),
    ("phú bài", "HUI"),
    ("cần thơ", "VCA"),
    ("can tho", "VCA"),
    ("đà lạt", "DLI"),
    ("da lat", "DLI"),
    ("dalat", "DLI"),
    ("liên khương", "DLI"),
    ("vinh", "VII"),
    ("nghệ an", "VII"),
    ("quy nhơn", "UIH"),
    ("quy nhon", "UIH"),
    ("phù cát", "UIH"),
    ("buôn ma thuột", "BMV"),
    ("buon ma thuot", "BMV"),
    ("thanh hóa", "THD"),
    ("thanh hoa", "THD"),
    ("vân đồn", "VDO"),
    ("quảng ninh", "VDO"),
    ("côn đảo", "VCS"),
    ("con dao", "VCS"),
    ("pleiku", "PXU"),
    ("tuy hòa", "TBB"),
    ("điện biên", "DIN"),
    ("chu lai", "VCL"),
    ("đồng hới", "VDH"),
    ("quảng bình", "VDH"),
    ("rạch giá", "VKG"),
    ("cà mau", "CAH"),
    ("bangkok", "BKK"),
    ("singapore", "SIN"),
    ("seoul", "ICN"),
    ("incheon", "ICN"),
    ("tokyo", "NRT"),
    ("narita", "NRT"),
    ("đài bắc", "TPE"),
    ("taipei", "TPE"),
    ("hồng kông", "HKG"),
    ("hong kong", "HKG"),
    ("kuala lumpur", "KUL"),
];

const NAME_PREFIXES: &[&str] = &[
    "thành phố ",
    "thanh pho ",
    "tp. ",
    "tp.",
    "tp ",
    "sân bay ",
    "san bay ",
    "city of ",
];

fn normalize_name(input: &str) -> String {
    let lowered = input
        .trim()
        .trim_end_matches(&['.', ',', '!', '?'][..])
        .to_lowercase();
    let mut name = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    for prefix in NAME_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim_start().to_string();
            break;
        }
    }
    name
}

/// Map a city or airport name to its IATA code
///
/// A bare three-letter input is accepted only if it is one of the codes
/// in the table.
pub fn airport_code(input: &str) -> Option<&'static str> {
    let name = normalize_name(input);
    if name.is_empty() {
        return None;
    }

    if let Some((_, code)) = AIRPORTS.iter().find(|(known, _)| *known == name) {
        return Some(code);
    }

    if name.len() == 3 && name.chars().all(|c| c.is_ascii_alphabetic()) {
        let upper = name.to_ascii_uppercase();
        return AIRPORTS
            .iter()
            .map(|(_, code)| *code)
            .find(|code| *code == upper);
    }

    None
}

/// Display name for a known IATA code
pub fn city_name(code: &str) -> Option<&'static str> {
    const DISPLAY: &[(&str, &str)] = &[
        ("HAN", "Hà Nội"),
        ("SGN", "TP. Hồ Chí Minh"),
        ("DAD", "Đà Nẵng"),
        ("HPH", "Hải Phòng"),
        ("CXR", "Nha Trang"),
        ("PQC", "Phú Quốc"),
        ("HUI", "Huế"),
        ("VCA", "Cần Thơ"),
        ("DLI", "Đà Lạt"),
        ("VII", "Vinh"),
        ("UIH", "Quy Nhơn"),
        ("BMV", "Buôn Ma Thuột"),
        ("THD", "Thanh Hóa"),
        ("VDO", "Vân Đồn"),
        ("VCS", "Côn Đảo"),
    ];
    DISPLAY
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

static DAY_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})$").expect("valid regex"));
static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})$").expect("valid regex")
});
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"));

/// How many years ahead a `dd/mm` date may roll (covers 29/02)
const MAX_YEAR_ROLL: i32 = 8;

fn clean_date_text(input: &str) -> String {
    let lowered = input
        .trim()
        .trim_end_matches(&['.', ',', '!', '?'][..])
        .to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.strip_prefix("ngày ") {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest.to_string(),
        _ => collapsed,
    }
}

fn captured(caps: &regex::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

/// Resolve a relative or partial date against `today`
///
/// Vocabulary: "hôm nay"/"today", "ngày mai"/"mai"/"tomorrow",
/// "ngày kia"/"ngày mốt"/"day after tomorrow", `dd/mm` (this year unless
/// already passed, then the next year where the date exists), `dd/mm/yyyy`
/// and ISO `yyyy-mm-dd`.
pub fn normalize_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = clean_date_text(input);

    let offset = match text.as_str() {
        "hôm nay" | "hom nay" | "today" => Some(0),
        "ngày mai" | "ngay mai" | "mai" | "tomorrow" => Some(1),
        "ngày kia" | "ngay kia" | "ngày mốt" | "ngay mot" | "mốt" | "day after tomorrow"
        | "the day after tomorrow" => Some(2),
        _ => None,
    };
    if let Some(days) = offset {
        return today.checked_add_days(Days::new(days));
    }

    if let Some(caps) = ISO_DATE.captures(&text) {
        let year = caps.get(1)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, captured(&caps, 2)?, captured(&caps, 3)?);
    }

    if let Some(caps) = DAY_MONTH_YEAR.captures(&text) {
        let year = caps.get(3)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, captured(&caps, 2)?, captured(&caps, 1)?);
    }

    if let Some(caps) = DAY_MONTH.captures(&text) {
        let day = captured(&caps, 1)?;
        let month = captured(&caps, 2)?;
        return (today.year()..=today.year() + MAX_YEAR_ROLL)
            .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
            .find(|date| *date >= today);
    }

    None
}

/// Parse a full date of birth; it must lie before `today`
pub fn parse_birth_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = clean_date_text(input);
    let date = if let Some(caps) = ISO_DATE.captures(&text) {
        let year = caps.get(1)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, captured(&caps, 2)?, captured(&caps, 3)?)
    } else if let Some(caps) = DAY_MONTH_YEAR.captures(&text) {
        let year = caps.get(3)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, captured(&caps, 2)?, captured(&caps, 1)?)
    } else {
        None
    }?;
    (date < today).then_some(date)
}

static VN_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0\d{9,10}$").expect("valid regex"));
static INTL_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d{8,15}$").expect("valid regex"));

/// Canonical phone number: Vietnamese numbers as `0xxxxxxxxx`, others `+…`
pub fn normalize_phone(input: &str) -> Option<String> {
    let compact: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')'))
        .collect();
    let local = if let Some(rest) = compact.strip_prefix("+84") {
        format!("0{rest}")
    } else if let Some(rest) = compact.strip_prefix("84").filter(|r| r.len() == 9) {
        format!("0{rest}")
    } else {
        compact
    };

    if VN_PHONE.is_match(&local) || INTL_PHONE.is_match(&local) {
        Some(local)
    } else {
        None
    }
}

/// First token that looks like a booking reference (PNR)
///
/// Six ASCII letters or digits, either written in capitals or mixing
/// letters and digits, so ordinary words do not qualify.
pub fn booking_reference(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() == 6 && token.chars().all(|c| c.is_ascii_alphanumeric()))
        .find(|token| {
            let capitals = token
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            let mixed = token.chars().any(|c| c.is_ascii_digit())
                && token.chars().any(|c| c.is_ascii_alphabetic());
            capitals || mixed
        })
        .map(str::to_ascii_uppercase)
}
