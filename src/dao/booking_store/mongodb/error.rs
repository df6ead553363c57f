use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to start a client session")]
    Session {
        #[source]
        source: MongoError,
    },
    #[error("transaction `{op}` failed")]
    Transaction {
        op: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("operation `{op}` failed")]
    Query {
        op: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("corrupt timestamp in collection `{collection}`")]
    Corrupt {
        collection: &'static str,
        #[source]
        source: time::error::ComponentRange,
    },
}
