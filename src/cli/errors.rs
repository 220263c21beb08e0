use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid scale parameter: {scale}. Must be a positive number or 'native'")]
    InvalidScale { scale: String },

    #[error("Invalid region: {region}. Expected 'min_x,min_y,max_x,max_y'")]
    InvalidRegion { region: String },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Arguments {first} and {second} cannot be combined")]
    ConflictingArguments { first: String, second: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fusion error: {0}")]
    Fusion(#[from] hpfsharp::Error),
}
