use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Malformed configuration or reference data; fatal at startup.
    Configuration(String),
    /// A fixed-capacity matrix ran out of rows.
    Capacity { requested: usize, capacity: usize },
    /// Attractor rows are never replaced.
    AttractorReplacement(usize),
    /// A collaborator (distribution draw, scheduler) failed at runtime.
    Upstream(String),
}

impl SimError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Capacity {
                requested,
                capacity,
            } => write!(
                f,
                "capacity error: row {requested} requested but capacity is {capacity}"
            ),
            Self::AttractorReplacement(index) => {
                write!(f, "attractor row {index} cannot be replaced")
            }
            Self::Upstream(message) => write!(f, "upstream error: {message}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<rust_decimal::Error> for SimError {
    fn from(value: rust_decimal::Error) -> Self {
        Self::Upstream(format!("decimal arithmetic: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_error_names_both_sides() {
        let err = SimError::Capacity {
            requested: 11,
            capacity: 10,
        };
        assert_eq!(
            err.to_string(),
            "capacity error: row 11 requested but capacity is 10"
        );
    }
}
