use thiserror::Error;

/// Failure to resolve the aggregated namespace.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("dependency '{package}' is not available")]
    MissingPackage { package: &'static str },

    #[error("dependency '{package}' does not export '{symbol}'")]
    MissingSymbol {
        package: &'static str,
        symbol: &'static str,
    },

    #[error("'{symbol}' is exported more than once")]
    DuplicateExport { symbol: &'static str },
}

impl StackError {
    /// Package the failure is attributed to, if any.
    pub fn package(&self) -> Option<&'static str> {
        match self {
            Self::MissingPackage { package } | Self::MissingSymbol { package, .. } => Some(*package),
            Self::DuplicateExport { .. } => None,
        }
    }
}
