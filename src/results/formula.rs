//! Elemental formulas as reported by SIRIUS and as displayed by Compound Discoverer.
//!
//! SIRIUS reports compact formulas (`C10H9ClN2O`), Compound Discoverer shows
//! them expanded with one token per element (`C10 H9 Cl N2 O`).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FormulaError {
    #[error("Invalid formula: '{0}'")]
    Invalid(String),

    #[error("No monoisotopic mass known for element '{0}'")]
    UnknownElement(String),
}

/// Monoisotopic mass of the most abundant isotope.
pub fn element_mass(symbol: &str) -> Option<f64> {
    let mass = match symbol {
        "H" => 1.00782503207,
        "B" => 11.0093054,
        "C" => 12.0,
        "N" => 14.0030740048,
        "O" => 15.99491461956,
        "F" => 18.99840322,
        "Na" => 22.9897692809,
        "Mg" => 23.985041700,
        "Si" => 27.9769265325,
        "P" => 30.97376163,
        "S" => 31.97207100,
        "Cl" => 34.96885268,
        "K" => 38.96370668,
        "Ca" => 39.96259098,
        "Fe" => 55.9349375,
        "Cu" => 62.9295975,
        "Zn" => 63.9291422,
        "As" => 74.9215965,
        "Se" => 79.9165213,
        "Br" => 78.9183371,
        "Sn" => 119.9021947,
        "I" => 126.904473,
        "Hg" => 201.970643,
        _ => return None,
    };
    Some(mass)
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([A-Z][a-z]?)(\d*)").expect("static pattern"))
}

/// Element counts in Hill order (C, H, then alphabetical; alphabetical when carbon is absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    elements: Vec<(String, u32)>,
}

impl Formula {
    pub fn parse(text: &str) -> Result<Self, FormulaError> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(FormulaError::Invalid(text.to_string()));
        }

        let mut elements: Vec<(String, u32)> = Vec::new();
        let mut consumed = 0;

        for caps in token_pattern().captures_iter(&compact) {
            let whole = caps.get(0).ok_or_else(|| FormulaError::Invalid(text.to_string()))?;
            if whole.start() != consumed {
                return Err(FormulaError::Invalid(text.to_string()));
            }
            consumed = whole.end();

            let symbol = &caps[1];
            let count = match &caps[2] {
                "" => 1,
                digits => digits
                    .parse::<u32>()
                    .map_err(|_| FormulaError::Invalid(text.to_string()))?,
            };

            match elements.iter_mut().find(|(s, _)| s == symbol) {
                Some((_, n)) => {
                    *n = n
                        .checked_add(count)
                        .ok_or_else(|| FormulaError::Invalid(text.to_string()))?
                }
                None => elements.push((symbol.to_string(), count)),
            }
        }

        if consumed != compact.len() {
            return Err(FormulaError::Invalid(text.to_string()));
        }

        elements.retain(|(_, n)| *n > 0);
        let has_carbon = elements.iter().any(|(s, _)| s == "C");
        elements.sort_by(|(a, _), (b, _)| hill_key(a, has_carbon).cmp(&hill_key(b, has_carbon)));

        Ok(Formula { elements })
    }

    pub fn elements(&self) -> &[(String, u32)] {
        &self.elements
    }

    pub fn count(&self, symbol: &str) -> u32 {
        self.elements
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    /// `C6 H12 O6`; a count of one is written as the bare symbol.
    pub fn expanded(&self) -> String {
        self.elements
            .iter()
            .map(|(symbol, count)| match count {
                1 => symbol.clone(),
                n => format!("{}{}", symbol, n),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn monoisotopic_mass(&self) -> Result<f64, FormulaError> {
        self.elements.iter().try_fold(0.0, |total, (symbol, count)| {
            element_mass(symbol)
                .map(|mass| total + mass * f64::from(*count))
                .ok_or_else(|| FormulaError::UnknownElement(symbol.clone()))
        })
    }
}

fn hill_key(symbol: &str, has_carbon: bool) -> (u8, &str) {
    match (has_carbon, symbol) {
        (true, "C") => (0, symbol),
        (true, "H") => (1, symbol),
        _ => (2, symbol),
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expanded())
    }
}

/// Expands a compact formula, `None` when it cannot be parsed.
pub fn expand_formula(compact: &str) -> Option<String> {
    Formula::parse(compact).ok().map(|f| f.expanded())
}

/// Relative deviation of `measured` from `theoretical` in parts per million.
pub fn mass_error_ppm(measured: f64, theoretical: f64) -> f64 {
    (measured - theoretical) / theoretical * 1e6
}
