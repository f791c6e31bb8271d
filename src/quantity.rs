use num_rational::Ratio;
use num_traits::{CheckedAdd, One, Signed, Zero};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// Bounds keep every ledger sum comfortably inside i128.
const MAX_WHOLE_DIGITS: usize = 12;
const MAX_FRACTION_DIGITS: usize = 9;

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(?:(\d+)\s+(\d+)\s*/\s*(\d+)|(\d+)\s*/\s*(\d+)|(\d*\.\d+|\d+\.?\d*))(.*)$")
        .expect("leading number pattern is valid")
});

/// An exact ingredient amount.
///
/// Amounts are kept as rationals so that subtracting a recipe's contribution
/// reverses its earlier addition exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Ratio<i128>);

impl Amount {
    pub fn zero() -> Self {
        Amount(Ratio::zero())
    }

    pub fn from_integer(value: i64) -> Self {
        Amount(Ratio::from_integer(i128::from(value)))
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    /// Multiplies by an integer factor such as `servings * sign`.
    pub fn scale(self, factor: i64) -> Self {
        Amount(self.0 * Ratio::from_integer(i128::from(factor)))
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_add(&other.0).map(Amount)
    }
}

fn terminates_in_decimal(mut denom: i128) -> bool {
    while denom % 2 == 0 {
        denom /= 2;
    }
    while denom % 5 == 0 {
        denom /= 5;
    }
    denom == 1
}

impl fmt::Display for Amount {
    /// Renders without rounding: terminating values as decimals ("7.5"),
    /// anything else as a mixed fraction ("1 1/3") that `parse_quantity`
    /// reads back exactly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numer = self.0.numer().abs();
        let denom = *self.0.denom();
        let whole = numer / denom;
        let mut rem = numer % denom;

        if self.0.is_negative() {
            f.write_str("-")?;
        }
        if rem == 0 {
            return write!(f, "{}", whole);
        }
        if !terminates_in_decimal(denom) {
            return if whole == 0 {
                write!(f, "{}/{}", rem, denom)
            } else {
                write!(f, "{} {}/{}", whole, rem, denom)
            };
        }

        write!(f, "{}.", whole)?;
        while rem != 0 {
            rem *= 10;
            write!(f, "{}", rem / denom)?;
            rem %= denom;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuantity {
    /// `None` when the text has no leading number ("to taste", "a pinch").
    pub amount: Option<Amount>,
    pub unit: String,
}

fn parse_integer(digits: &str) -> Option<i128> {
    if digits.len() > MAX_WHOLE_DIGITS {
        return None;
    }
    digits.parse().ok()
}

fn parse_fraction(numer: &str, denom: &str) -> Option<Ratio<i128>> {
    let numer = parse_integer(numer)?;
    let denom = parse_integer(denom)?;
    if denom == 0 {
        return None;
    }
    Some(Ratio::new(numer, denom))
}

fn parse_decimal(text: &str) -> Option<Ratio<i128>> {
    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
    if frac.len() > MAX_FRACTION_DIGITS {
        return None;
    }
    let whole = if whole.is_empty() { 0 } else { parse_integer(whole)? };
    let frac_value: i128 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
    let scale = 10i128.pow(frac.len() as u32);
    Some(Ratio::new(whole * scale + frac_value, scale))
}

/// Splits "<number> <unit>" into its parts.
///
/// The number may be a decimal ("2", "2.5", ".5"), a fraction ("1/2") or a
/// mixed number ("1 1/2"). Whatever follows, trimmed, is the unit. Without a
/// usable leading number the whole trimmed text becomes the unit.
pub fn parse_quantity(raw: &str) -> ParsedQuantity {
    let text = raw.trim();
    let Some(caps) = LEADING_NUMBER.captures(text) else {
        return ParsedQuantity { amount: None, unit: text.to_string() };
    };

    let amount = if let (Some(whole), Some(numer), Some(denom)) = (caps.get(1), caps.get(2), caps.get(3)) {
        let whole = parse_integer(whole.as_str()).map(Ratio::from_integer);
        whole
            .zip(parse_fraction(numer.as_str(), denom.as_str()))
            .and_then(|(whole, frac)| whole.checked_add(&frac))
    } else if let (Some(numer), Some(denom)) = (caps.get(4), caps.get(5)) {
        parse_fraction(numer.as_str(), denom.as_str())
    } else {
        caps.get(6).and_then(|m| parse_decimal(m.as_str()))
    };

    match amount {
        Some(value) => ParsedQuantity {
            amount: Some(Amount(value)),
            unit: caps.get(7).map_or("", |m| m.as_str()).trim().to_string(),
        },
        None => ParsedQuantity { amount: None, unit: text.to_string() },
    }
}

const SEASONING_KEYWORDS: &[&str] = &[
    "salt", "black pepper", "white pepper", "ground pepper", "peppercorn", "pepper flake",
    "cumin", "paprika", "oregano", "basil", "thyme", "rosemary", "cinnamon", "nutmeg",
    "turmeric", "chili powder", "chilli powder", "cayenne", "coriander", "parsley", "dill",
    "sage", "bay leaf", "allspice", "cardamom", "ground clove", "whole clove",
    "garam masala", "curry powder", "seasoning", "five spice", "za'atar", "sumac",
    "fennel seed", "mustard seed", "mint", "chive", "tarragon", "marjoram", "saffron",
    "vanilla extract", "garlic powder", "onion powder", "herbes de provence", "spice",
];

// Phrases that contain a keyword without being a seasoning.
const SEASONING_FALSE_FRIENDS: &[&str] = &["unsalted", "sausage", "bell pepper", "sweet pepper"];

/// Keyword match on the normalized name deciding whether an ingredient
/// belongs in the seasonings list. Keywords are singular so that every
/// spelling of one ledger key lands in the same partition.
pub fn is_seasoning(name: &str) -> bool {
    let mut lowered = normalize_name(name);
    for phrase in SEASONING_FALSE_FRIENDS {
        lowered = lowered.replace(phrase, " ");
    }
    SEASONING_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

const WATER_QUALIFIERS: &[&str] = &[
    "cold", "warm", "hot", "boiling", "lukewarm", "ice", "iced", "tap", "filtered", "room",
    "temperature",
];

/// Plain water never reaches the shopping list. "coconut water" and
/// "watercress" are real groceries and are kept.
pub fn is_excluded(name: &str) -> bool {
    let normalized = normalize_name(name);
    if normalized == "water" {
        return true;
    }
    match normalized.strip_suffix(" water") {
        Some(qualifiers) => qualifiers.split_whitespace().all(|word| WATER_QUALIFIERS.contains(&word)),
        None => false,
    }
}

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("leaves", "leaf"),
    ("loaves", "loaf"),
    ("halves", "half"),
    ("cookies", "cookie"),
    ("brownies", "brownie"),
    ("veggies", "veggie"),
    ("smoothies", "smoothie"),
];

const UNCOUNTABLE: &[&str] = &["molasses", "hummus", "couscous", "asparagus", "swiss"];

fn singularize(word: &str) -> String {
    if UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, singular)) = IRREGULAR_PLURALS.iter().find(|(plural, _)| *plural == word) {
        return singular.to_string();
    }
    if word.len() > 4 && word.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    for suffix in ["oes", "ches", "shes", "sses", "xes"] {
        if word.len() > suffix.len() + 1 && word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.len() > 3 && word.ends_with('s') && !["ss", "us", "is"].iter().any(|end| word.ends_with(end)) {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Identity of an ingredient name: lowercased, trimmed, single-spaced, with
/// a plural last word reduced to its singular ("Eggs" and "egg" match).
pub fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    match words.split_last() {
        Some((last, rest)) => {
            let mut normalized = rest.join(" ");
            if !normalized.is_empty() {
                normalized.push(' ');
            }
            normalized.push_str(&singularize(last));
            normalized
        }
        None => String::new(),
    }
}

struct UnitAlias {
    canonical: &'static str,
    singular: &'static str,
    plural: &'static str,
    aliases: &'static [&'static str],
}

const UNIT_ALIASES: &[UnitAlias] = &[
    UnitAlias { canonical: "cup", singular: "cup", plural: "cups", aliases: &["cup", "cups", "c"] },
    UnitAlias { canonical: "tbsp", singular: "tbsp", plural: "tbsp", aliases: &["tbsp", "tbsps", "tbs", "tablespoon", "tablespoons"] },
    UnitAlias { canonical: "tsp", singular: "tsp", plural: "tsp", aliases: &["tsp", "tsps", "teaspoon", "teaspoons"] },
    UnitAlias { canonical: "lb", singular: "lb", plural: "lb", aliases: &["lb", "lbs", "pound", "pounds"] },
    UnitAlias { canonical: "oz", singular: "oz", plural: "oz", aliases: &["oz", "ounce", "ounces"] },
    UnitAlias { canonical: "g", singular: "g", plural: "g", aliases: &["g", "gr", "gram", "grams"] },
    UnitAlias { canonical: "kg", singular: "kg", plural: "kg", aliases: &["kg", "kgs", "kilogram", "kilograms"] },
    UnitAlias { canonical: "ml", singular: "ml", plural: "ml", aliases: &["ml", "milliliter", "milliliters", "millilitre", "millilitres"] },
    UnitAlias { canonical: "l", singular: "l", plural: "l", aliases: &["l", "liter", "liters", "litre", "litres"] },
    UnitAlias { canonical: "clove", singular: "clove", plural: "cloves", aliases: &["clove", "cloves"] },
    UnitAlias { canonical: "can", singular: "can", plural: "cans", aliases: &["can", "cans"] },
    UnitAlias { canonical: "slice", singular: "slice", plural: "slices", aliases: &["slice", "slices"] },
    UnitAlias { canonical: "piece", singular: "piece", plural: "pieces", aliases: &["piece", "pieces", "pc", "pcs"] },
    UnitAlias { canonical: "pinch", singular: "pinch", plural: "pinches", aliases: &["pinch", "pinches"] },
    UnitAlias { canonical: "bunch", singular: "bunch", plural: "bunches", aliases: &["bunch", "bunches"] },
];

/// Maps unit spellings onto one canonical key ("lbs", "pound" -> "lb").
/// Unknown units pass through trimmed.
pub fn canonical_unit(unit: &str) -> String {
    let trimmed = unit.trim();
    let lowered = trimmed.trim_end_matches('.').to_lowercase();
    UNIT_ALIASES
        .iter()
        .find(|alias| alias.aliases.contains(&lowered.as_str()))
        .map(|alias| alias.canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Display form of a canonical unit for the given amount ("1 cup", "4 cups").
pub fn display_unit(canonical: &str, amount: Amount) -> String {
    match UNIT_ALIASES.iter().find(|alias| alias.canonical == canonical) {
        Some(alias) if amount.is_one() => alias.singular.to_string(),
        Some(alias) => alias.plural.to_string(),
        None => canonical.to_string(),
    }
}

/// How ledger keys are built from units.
///
/// `Legacy` compares trimmed unit text exactly, so "lb" and "lbs" stay apart.
/// `Canonical` runs units through the alias table first. Plans persisted
/// before the canonical scheme existed carry no scheme and load as `Legacy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    #[default]
    Legacy,
    Canonical,
}

impl KeyScheme {
    pub fn unit_key(&self, unit: &str) -> String {
        match self {
            KeyScheme::Legacy => unit.trim().to_string(),
            KeyScheme::Canonical => canonical_unit(unit),
        }
    }

    pub fn render_unit(&self, unit_key: &str, amount: Amount) -> String {
        match self {
            KeyScheme::Legacy => unit_key.to_string(),
            KeyScheme::Canonical => display_unit(unit_key, amount),
        }
    }
}
