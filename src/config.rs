use crate::inventory::Mode;
use crate::money::Rounding;
use crate::transaction::ModificationMode;
use serde::{Deserialize, Serialize};

/// Settings of one `StockManager`.
///
/// Every field has a default, so a partial document is enough:
/// `{"mode": "LIFO"}` gives a LIFO manager with mixed modifications and
/// two decimal banker's rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StockConfig {
    /// lot consumption order
    pub mode: Mode,
    /// redistribution used when an event does not carry its own
    pub modification_mode: ModificationMode,
    /// applied to every prorated amount
    pub rounding: Rounding,
}

impl StockConfig {
    pub fn new(mode: Mode) -> Self {
        StockConfig {
            mode,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_modification_mode(mut self, modification_mode: ModificationMode) -> Self {
        self.modification_mode = modification_mode;
        self
    }

    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::money::RoundingMode;

    #[test]
    fn defaults_are_fifo_mixed_two_decimals() {
        let config = StockConfig::default();
        assert_eq!(config.mode, Mode::Fifo);
        assert_eq!(config.modification_mode, ModificationMode::Mixed);
        assert_eq!(config.rounding, Rounding::new(2, RoundingMode::HalfEven));
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: StockConfig = serde_json::from_str(r#"{"mode": "LIFO"}"#).unwrap();
        assert_eq!(config, StockConfig::new(Mode::Lifo));

        let config: StockConfig = serde_json::from_str(
            r#"{"modification_mode": "QUANTITY_FIRST", "rounding": {"scale": 4}}"#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Fifo);
        assert_eq!(config.modification_mode, ModificationMode::QuantityFirst);
        assert_eq!(config.rounding, Rounding::new(4, RoundingMode::HalfEven));
    }

    #[test]
    fn serializes_back_to_the_same_config() {
        let config = StockConfig::new(Mode::Prmp)
            .with_modification_mode(ModificationMode::Money)
            .with_rounding(Rounding::new(3, RoundingMode::HalfUp));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<StockConfig>(&json).unwrap(), config);
        assert!(json.contains("\"PRMP\""));
        assert!(json.contains("\"HALF_UP\""));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(serde_json::from_str::<StockConfig>(r#"{"mode": "LOT"}"#).is_err());
    }
}
