use std::error::Error;
use std::fmt::{Display, Formatter};

/// Possible errors that arise when building or querying a Bregman ball tree.
#[derive(Debug, Clone, PartialEq)]
pub enum BregmanError {
    EmptyDataset,
    NonFiniteCoordinate(String),
    ConfigError(String),
    DomainError(String),
    DegenerateInput(String),
    Io(String),
}

impl Error for BregmanError {}

impl Display for BregmanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            BregmanError::EmptyDataset => String::from("The dataset provided is empty"),
            BregmanError::NonFiniteCoordinate(msg) => format!("Non finite coordinate: {msg}"),
            BregmanError::ConfigError(msg) => format!("Invalid configuration: {msg}"),
            BregmanError::DomainError(msg) => format!("Outside of the divergence domain: {msg}"),
            BregmanError::DegenerateInput(msg) => format!("Degenerate input: {msg}"),
            BregmanError::Io(msg) => format!("Unable to read points: {msg}"),
        };
        write!(f, "{message}")
    }
}
