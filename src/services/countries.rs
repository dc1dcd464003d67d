/// Full country names (lowercase) and their ISO 3166 alpha-2 codes.
const COUNTRIES: &[(&str, &str)] = &[
    ("united states", "US"),
    ("united states of america", "US"),
    ("usa", "US"),
    ("u.s.a.", "US"),
    ("u.s.", "US"),
    ("america", "US"),
    ("canada", "CA"),
    ("mexico", "MX"),
    ("puerto rico", "PR"),
    ("united kingdom", "GB"),
    ("great britain", "GB"),
    ("ireland", "IE"),
    ("france", "FR"),
    ("germany", "DE"),
    ("netherlands", "NL"),
    ("belgium", "BE"),
    ("spain", "ES"),
    ("italy", "IT"),
    ("sweden", "SE"),
    ("switzerland", "CH"),
    ("brazil", "BR"),
    ("chile", "CL"),
    ("colombia", "CO"),
    ("australia", "AU"),
    ("new zealand", "NZ"),
    ("japan", "JP"),
    ("china", "CN"),
    ("korea, republic of", "KR"),
    ("south korea", "KR"),
    ("taiwan", "TW"),
    ("hong kong", "HK"),
    ("singapore", "SG"),
    ("india", "IN"),
    ("philippines", "PH"),
    ("thailand", "TH"),
    ("saudi arabia", "SA"),
    ("united arab emirates", "AE"),
    ("israel", "IL"),
    ("south africa", "ZA"),
];

/// Normalize a country given either as a full name or as a two letter code.
pub fn full_to_abbrev(country: &str) -> Option<&'static str> {
    let needle = country.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    COUNTRIES
        .iter()
        .find(|(name, code)| *name == needle || code.eq_ignore_ascii_case(&needle))
        .map(|(_, code)| *code)
}
