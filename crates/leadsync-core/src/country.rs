//! ============================================================================
//! Country Resolver - Dialing-code prefix lookup for lead phone numbers
//! ============================================================================
//! Longest prefix wins: "1876..." is Jamaica, not the North American "1".
//! ============================================================================

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Country descriptor attached to enriched leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    /// ISO 3166-1 alpha-2 code
    pub code: &'static str,
    pub name: &'static str,
    pub dial_prefix: &'static str,
}

const fn c(dial_prefix: &'static str, code: &'static str, name: &'static str) -> Country {
    Country {
        code,
        name,
        dial_prefix,
    }
}

static COUNTRIES: &[Country] = &[
    // 1-digit
    c("1", "US", "United States"),
    c("7", "RU", "Russia"),
    // 2-digit
    c("20", "EG", "Egypt"),
    c("27", "ZA", "South Africa"),
    c("30", "GR", "Greece"),
    c("31", "NL", "Netherlands"),
    c("32", "BE", "Belgium"),
    c("33", "FR", "France"),
    c("34", "ES", "Spain"),
    c("36", "HU", "Hungary"),
    c("39", "IT", "Italy"),
    c("40", "RO", "Romania"),
    c("41", "CH", "Switzerland"),
    c("43", "AT", "Austria"),
    c("44", "GB", "United Kingdom"),
    c("45", "DK", "Denmark"),
    c("46", "SE", "Sweden"),
    c("47", "NO", "Norway"),
    c("48", "PL", "Poland"),
    c("49", "DE", "Germany"),
    c("51", "PE", "Peru"),
    c("52", "MX", "Mexico"),
    c("54", "AR", "Argentina"),
    c("55", "BR", "Brazil"),
    c("56", "CL", "Chile"),
    c("57", "CO", "Colombia"),
    c("58", "VE", "Venezuela"),
    c("60", "MY", "Malaysia"),
    c("61", "AU", "Australia"),
    c("62", "ID", "Indonesia"),
    c("63", "PH", "Philippines"),
    c("64", "NZ", "New Zealand"),
    c("65", "SG", "Singapore"),
    c("66", "TH", "Thailand"),
    c("81", "JP", "Japan"),
    c("82", "KR", "South Korea"),
    c("84", "VN", "Vietnam"),
    c("86", "CN", "China"),
    c("90", "TR", "Turkey"),
    c("91", "IN", "India"),
    c("92", "PK", "Pakistan"),
    c("94", "LK", "Sri Lanka"),
    c("98", "IR", "Iran"),
    // 3-digit
    c("211", "SS", "South Sudan"),
    c("212", "MA", "Morocco"),
    c("213", "DZ", "Algeria"),
    c("216", "TN", "Tunisia"),
    c("220", "GM", "Gambia"),
    c("221", "SN", "Senegal"),
    c("225", "CI", "Cote d'Ivoire"),
    c("233", "GH", "Ghana"),
    c("234", "NG", "Nigeria"),
    c("237", "CM", "Cameroon"),
    c("243", "CD", "DR Congo"),
    c("250", "RW", "Rwanda"),
    c("251", "ET", "Ethiopia"),
    c("252", "SO", "Somalia"),
    c("254", "KE", "Kenya"),
    c("255", "TZ", "Tanzania"),
    c("256", "UG", "Uganda"),
    c("257", "BI", "Burundi"),
    c("260", "ZM", "Zambia"),
    c("263", "ZW", "Zimbabwe"),
    c("264", "NA", "Namibia"),
    c("265", "MW", "Malawi"),
    c("267", "BW", "Botswana"),
    c("351", "PT", "Portugal"),
    c("353", "IE", "Ireland"),
    c("358", "FI", "Finland"),
    c("380", "UA", "Ukraine"),
    c("420", "CZ", "Czech Republic"),
    c("852", "HK", "Hong Kong"),
    c("880", "BD", "Bangladesh"),
    c("966", "SA", "Saudi Arabia"),
    c("971", "AE", "United Arab Emirates"),
    c("972", "IL", "Israel"),
    c("974", "QA", "Qatar"),
    c("977", "NP", "Nepal"),
    // 4-digit (NANP Caribbean area codes)
    c("1242", "BS", "Bahamas"),
    c("1246", "BB", "Barbados"),
    c("1268", "AG", "Antigua and Barbuda"),
    c("1345", "KY", "Cayman Islands"),
    c("1441", "BM", "Bermuda"),
    c("1473", "GD", "Grenada"),
    c("1758", "LC", "Saint Lucia"),
    c("1767", "DM", "Dominica"),
    c("1787", "PR", "Puerto Rico"),
    c("1809", "DO", "Dominican Republic"),
    c("1868", "TT", "Trinidad and Tobago"),
    c("1876", "JM", "Jamaica"),
];

static BY_PREFIX: Lazy<HashMap<&'static str, &'static Country>> =
    Lazy::new(|| COUNTRIES.iter().map(|c| (c.dial_prefix, c)).collect());

const MAX_PREFIX_LEN: usize = 4;

/// Stateless dialing-code resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct CountryResolver;

impl CountryResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a raw phone string to its country, trying 4- down to 1-digit prefixes
    pub fn resolve(&self, raw_phone: &str) -> Option<&'static Country> {
        let digits: String = raw_phone.chars().filter(|c| c.is_ascii_digit()).collect();
        let digits = digits.trim_start_matches('0');
        if digits.is_empty() {
            return None;
        }

        (1..=MAX_PREFIX_LEN.min(digits.len()))
            .rev()
            .find_map(|len| BY_PREFIX.get(&digits[..len]).copied())
    }

    /// ISO code only, as stored on leads
    pub fn resolve_code(&self, raw_phone: &str) -> Option<String> {
        self.resolve(raw_phone).map(|c| c.code.to_string())
    }
}
