use crate::error::AnalysisError;

pub const MIN_LOOKBACK_DAYS: u32 = 1;
pub const MAX_LOOKBACK_DAYS: u32 = 365;

/// Symbols are 1-5 uppercase ASCII letters. Callers uppercase user input
/// before validating so "nvda" and "NVDA" land in the same place.
pub fn validate_symbol(symbol: &str) -> Result<(), AnalysisError> {
    let valid = !symbol.is_empty()
        && symbol.len() <= 5
        && symbol.bytes().all(|b| b.is_ascii_uppercase());
    if valid {
        Ok(())
    } else {
        Err(AnalysisError::InvalidInput(format!(
            "Invalid stock symbol '{}'. Use 1-5 uppercase letters, e.g. NVDA",
            symbol
        )))
    }
}

pub fn validate_lookback_days(days: u32) -> Result<(), AnalysisError> {
    if (MIN_LOOKBACK_DAYS..=MAX_LOOKBACK_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(AnalysisError::InvalidInput(format!(
            "lookback_days must be between {} and {}, got {}",
            MIN_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS, days
        )))
    }
}
