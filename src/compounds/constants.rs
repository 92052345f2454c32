// Constants for reading Compound Discoverer results
//
// Proton mass used for the polarity fallback adducts
pub const PROTON_MASS: f64 = 1.00727663;

// Ion description tokens SIRIUS cannot take as a detected adduct
pub const INVALID_ADDUCT_TOKENS: [&str; 9] =
    ["2M", "+2", "+3", "-2", "-3", "MeOH", "ACN", "-e", "+e"];
pub const POSITIVE_FALLBACK_ADDUCT: &str = "[M+H]+";
pub const NEGATIVE_FALLBACK_ADDUCT: &str = "[M-H]-";

// Best hit types
pub const MS1_BEST_HIT: i32 = 1;
pub const MS2_BEST_HIT: i32 = 2;

// Compound flags
pub const NOT_BACKGROUND: i32 = 0;
pub const NOT_EXCLUDED: i32 = -1;
pub const MS2_DEPTH: i32 = 2;
pub const POSITIVE_POLARITY: i32 = 1;

// Mass analyzers kept for submission (FTMS, Astral)
pub const HIGH_RES_ANALYZERS: [i32; 2] = [2, 7];

// Isotope envelope around the ion mass, in m/z
pub const ISOTOPE_WINDOW: (f64, f64) = (1.0, 5.0);

// Peak widths are stored in minutes
pub const SECONDS_PER_MINUTE: f64 = 60.0;
