use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a full merchandise code (subitem level)
pub const CANONICAL_WIDTH: usize = 8;

/// Width of a service nomenclature code. Never part of the merchandise index.
pub const SERVICE_CODE_WIDTH: usize = 9;

/// Prefix widths a merchandise pattern can take once normalized.
pub const MATCH_WIDTHS: [usize; 6] = [2, 4, 5, 6, 7, 8];

/// Three-digit tokens known to be positions that lost their leading zero
/// in spreadsheet exports.
const LOST_ZERO_POSITIONS: &[(&str, &str)] = &[
    ("102", "0102"), // live bovine animals
    ("103", "0103"), // live swine
    ("104", "0104"), // live sheep and goats
    ("811", "0811"), // frozen fruit
    ("901", "0901"), // coffee
    ("903", "0903"), // mate
];

/// Four-digit tokens that are really five-digit subpositions missing a
/// leading zero. None of these is a valid position in its own right.
const LOST_ZERO_SUBPOSITIONS: &[(&str, &str)] = &[
    ("1051", "01051"), // live poultry, up to 185 g
    ("1059", "01059"), // live poultry, other
    ("2071", "02071"), // meat of fowls
    ("2072", "02072"), // meat of turkeys
];

/// Level of the merchandise hierarchy a normalized code sits at
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum HierarchyLevel {
    /// 2 digits
    Chapter,
    /// 4 digits
    Position,
    /// 5 or 6 digits
    Subposition,
    /// 7 digits
    Item,
    /// 8 digits
    Subitem,
    /// 9 digits, service nomenclature
    Service,
}

impl HierarchyLevel {
    pub fn label(self) -> &'static str {
        match self {
            HierarchyLevel::Chapter => "chapter",
            HierarchyLevel::Position => "position",
            HierarchyLevel::Subposition => "subposition",
            HierarchyLevel::Item => "item",
            HierarchyLevel::Subitem => "subitem",
            HierarchyLevel::Service => "service",
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum InvalidCodeError {
    #[error("code '{raw}' contains no digits")]
    Empty { raw: String },
    #[error("code '{raw}' has {digits} digits (merchandise codes have at most 8)")]
    TooLong { raw: String, digits: usize },
}

impl InvalidCodeError {
    /// The offending token as it was supplied
    pub fn raw(&self) -> &str {
        match self {
            InvalidCodeError::Empty { raw } | InvalidCodeError::TooLong { raw, .. } => raw,
        }
    }
}

/// A merchandise (or service) code in canonical hierarchical form.
///
/// The canonical form keeps the granularity of the input: a chapter stays
/// a 2-digit chapter, a position a 4-digit position. Only tokens that
/// cannot be a valid prefix as written are padded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, JsonSchema)]
pub struct NormalizedCode {
    canonical: String,
    level: HierarchyLevel,
}

impl NormalizedCode {
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn level(&self) -> HierarchyLevel {
        self.level
    }

    pub fn width(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_service_code(&self) -> bool {
        self.level == HierarchyLevel::Service
    }

    /// Every prefix of this code a catalog pattern could be indexed under,
    /// coarsest first. Service codes have none.
    pub fn match_prefixes(&self) -> impl Iterator<Item = &str> + '_ {
        let width = if self.is_service_code() { 0 } else { self.width() };
        MATCH_WIDTHS
            .iter()
            .copied()
            .filter(move |w| *w <= width)
            .map(move |w| &self.canonical[..w])
    }

    /// Strict ancestors of this code (chapter, position, subposition, item)
    pub fn ancestors(&self) -> impl Iterator<Item = &str> + '_ {
        self.match_prefixes().filter(move |p| p.len() < self.width())
    }
}

impl fmt::Display for NormalizedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Canonicalize a raw merchandise code token.
///
/// All non-digit characters are stripped. One digit pads to a chapter,
/// three digits to a position and the known four-digit exceptions to a
/// subposition; every other width up to 8 is kept as written. Nine digits
/// is a service code. Re-normalizing a canonical code returns it unchanged.
pub fn normalize(raw: &str) -> Result<NormalizedCode, InvalidCodeError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let (canonical, level) = match digits.len() {
        0 => {
            return Err(InvalidCodeError::Empty {
                raw: raw.to_string(),
            })
        }
        1 => (format!("0{digits}"), HierarchyLevel::Chapter),
        2 => (digits, HierarchyLevel::Chapter),
        3 => {
            let padded = lookup(LOST_ZERO_POSITIONS, &digits)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{digits:0>4}"));
            (padded, HierarchyLevel::Position)
        }
        4 => match lookup(LOST_ZERO_SUBPOSITIONS, &digits) {
            Some(padded) => (padded.to_string(), HierarchyLevel::Subposition),
            None => (digits, HierarchyLevel::Position),
        },
        5 | 6 => (digits, HierarchyLevel::Subposition),
        7 => (digits, HierarchyLevel::Item),
        CANONICAL_WIDTH => (digits, HierarchyLevel::Subitem),
        SERVICE_CODE_WIDTH => (digits, HierarchyLevel::Service),
        n => {
            return Err(InvalidCodeError::TooLong {
                raw: raw.to_string(),
                digits: n,
            })
        }
    };

    Ok(NormalizedCode { canonical, level })
}

/// Canonicalize a code that is being looked up rather than indexed.
///
/// Merchandise codes are left-padded with zeros to the full 8-digit subitem,
/// so a ledger value that lost its leading zero (`1022110`) resolves as
/// `01022110`. Catalog patterns keep their own width through [`normalize`].
pub fn normalize_lookup(raw: &str) -> Result<NormalizedCode, InvalidCodeError> {
    let code = normalize(raw)?;
    if code.is_service_code() || code.width() == CANONICAL_WIDTH {
        return Ok(code);
    }
    Ok(NormalizedCode {
        canonical: format!("{:0>width$}", code.canonical, width = CANONICAL_WIDTH),
        level: HierarchyLevel::Subitem,
    })
}

fn lookup(table: &'static [(&'static str, &'static str)], token: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(from, _)| *from == token)
        .map(|(_, to)| *to)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(raw: &str) -> String {
        normalize(raw).unwrap().canonical().to_string()
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(canonical("0102.21.10"), "01022110");
        assert_eq!(canonical("84.71.90.14"), "84719014");
        assert_eq!(canonical(" 8471 9014 "), "84719014");
        assert_eq!(canonical("8471-90.14"), "84719014");
    }

    #[test]
    fn single_digit_is_a_chapter() {
        let code = normalize("2").unwrap();
        assert_eq!(code.canonical(), "02");
        assert_eq!(code.level(), HierarchyLevel::Chapter);
    }

    #[test]
    fn three_digit_exceptions_pad_to_position() {
        assert_eq!(canonical("102"), "0102");
        assert_eq!(canonical("811"), "0811");
        assert_eq!(canonical("903"), "0903");
        assert_eq!(normalize("102").unwrap().level(), HierarchyLevel::Position);
    }

    #[test]
    fn other_three_digit_tokens_pad_generically() {
        assert_eq!(canonical("201"), "0201");
        assert_eq!(canonical("407"), "0407");
    }

    #[test]
    fn four_digit_exceptions_pad_to_subposition() {
        let code = normalize("1051").unwrap();
        assert_eq!(code.canonical(), "01051");
        assert_eq!(code.level(), HierarchyLevel::Subposition);
    }

    #[test]
    fn ordinary_four_digit_tokens_stay_positions() {
        let code = normalize("1508").unwrap();
        assert_eq!(code.canonical(), "1508");
        assert_eq!(code.level(), HierarchyLevel::Position);
    }

    #[test]
    fn longer_prefixes_keep_their_width() {
        assert_eq!(normalize("85171").unwrap().level(), HierarchyLevel::Subposition);
        assert_eq!(normalize("100620").unwrap().level(), HierarchyLevel::Subposition);
        assert_eq!(normalize("1069000").unwrap().level(), HierarchyLevel::Item);
        assert_eq!(normalize("02068000").unwrap().level(), HierarchyLevel::Subitem);
    }

    #[test]
    fn nine_digits_is_a_service_code() {
        let code = normalize("1.0105.70.00").unwrap();
        assert_eq!(code.canonical(), "101057000");
        assert!(code.is_service_code());
        assert_eq!(code.match_prefixes().count(), 0);
    }

    #[test]
    fn rejects_empty_and_overlong_tokens() {
        assert_eq!(
            normalize("..-"),
            Err(InvalidCodeError::Empty {
                raw: "..-".to_string()
            })
        );
        let err = normalize("1234567890").unwrap_err();
        assert_eq!(err.raw(), "1234567890");
        assert!(matches!(err, InvalidCodeError::TooLong { digits: 10, .. }));
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "2", "31", "102", "201", "1051", "1508", "85171", "100620", "1069000", "0102.21.10",
            "101057000",
        ] {
            let once = normalize(raw).unwrap();
            let twice = normalize(once.canonical()).unwrap();
            assert_eq!(once, twice, "re-normalizing {raw}");
        }
    }

    #[test]
    fn match_prefixes_cover_every_granularity() {
        let code = normalize("01022110").unwrap();
        let prefixes: Vec<_> = code.match_prefixes().collect();
        assert_eq!(
            prefixes,
            vec!["01", "0102", "01022", "010221", "0102211", "01022110"]
        );
        let ancestors: Vec<_> = code.ancestors().collect();
        assert_eq!(ancestors.len(), 5);
        assert!(!ancestors.contains(&"01022110"));
    }

    #[test]
    fn short_codes_only_expose_their_own_prefixes() {
        let code = normalize("8471").unwrap();
        let prefixes: Vec<_> = code.match_prefixes().collect();
        assert_eq!(prefixes, vec!["84", "8471"]);
    }

    #[test]
    fn lookup_codes_are_left_padded_to_a_subitem() {
        let code = normalize_lookup("1022110").unwrap();
        assert_eq!(code.canonical(), "01022110");
        assert_eq!(code.level(), HierarchyLevel::Subitem);
        assert_eq!(normalize_lookup("847190").unwrap().canonical(), "00847190");
        assert_eq!(normalize_lookup("123").unwrap().canonical(), "00000123");
        assert_eq!(normalize_lookup("0102.21.10").unwrap().canonical(), "01022110");
    }

    #[test]
    fn lookup_keeps_service_codes_and_errors() {
        assert!(normalize_lookup("1.0105.70.00").unwrap().is_service_code());
        assert!(matches!(
            normalize_lookup("1234567890"),
            Err(InvalidCodeError::TooLong { digits: 10, .. })
        ));
        assert!(matches!(
            normalize_lookup("n/a"),
            Err(InvalidCodeError::Empty { .. })
        ));
        let once = normalize_lookup("1022110").unwrap();
        assert_eq!(normalize_lookup(once.canonical()).unwrap(), once);
    }
}
