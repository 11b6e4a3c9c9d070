use thiserror::Error;

#[derive(Error, Debug)]
pub enum FarmError {
    #[error("Unable to locate resource group [r={group}] for [a={activity}]")]
    MissingResourceGroup { activity: String, group: String },

    #[error("Unable to locate resource type [r={resource}] in [r={group}] for [a={activity}]")]
    MissingResourceType {
        activity: String,
        group: String,
        resource: String,
    },

    #[error("Invalid resource name identifier [{name}] for [a={activity}], expecting 'ResourceName.ResourceTypeName' or 'ResourceTypeName'")]
    InvalidResourceName { activity: String, name: String },

    #[error("Insufficient resources [r={resources}] for activity [a={activity}]")]
    InsufficientResources { activity: String, resources: String },

    #[error("Transmutation cycle detected for [a={activity}]: {chain}")]
    TransmutationCycle { activity: String, chain: String },

    #[error("Transmutation chain for [a={activity}] exceeds depth {depth}: {chain}")]
    TransmutationDepthExceeded {
        activity: String,
        depth: usize,
        chain: String,
    },

    #[error("Cannot remove {requested} from [r={pool}] holding {held}")]
    Overdraw {
        pool: String,
        requested: f64,
        held: f64,
    },

    #[error("Cannot move a negative amount {amount} through [r={pool}]")]
    NegativeAmount { pool: String, amount: f64 },

    #[error("Cannot take {requested} days from labour [{member}] with {available} days available")]
    LabourOverdraw {
        member: String,
        requested: f64,
        available: f64,
    },

    #[error("Invalid resource configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FarmError>;
