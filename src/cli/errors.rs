use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("{arg} requires {requires}")]
    Requires { arg: String, requires: String },

    #[error("Invalid value for {arg}: {value}")]
    InvalidValue { arg: String, value: String },

    #[error(transparent)]
    Synthpro(#[from] synthpro::Error),
}
