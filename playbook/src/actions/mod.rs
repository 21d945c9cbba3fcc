//! Step actions.
//!
//! This module provides:
//! - The [`Action`] trait and the name-keyed [`ActionRegistry`]
//! - Built-in store, variable and pacing actions
//! - Record-shaping actions (`filter_collection`, `transform_data`)
//! - Integration actions backed by pluggable [`ExternalClients`]

mod builtin;
mod clients;
mod external;
mod params;
mod registry;
#[cfg(feature = "http")]
mod rest;
mod transform;

pub use builtin::{
    BufferCollectionAction, DedupCollectionAction, DelayAction, FlushBufferAction, LogAction,
    ReleaseCollectionAction, SetCollectionAction, SetVariableAction,
};
pub use clients::{
    ActorClient, DatabaseClient, ExternalClients, HttpClient, McpClient, DEFAULT_HTTP_TIMEOUT,
};
pub use external::{
    HttpPostAction, McpToolAction, ReadCsvAction, SupabaseInsertAction, SupabaseQueryAction,
};
pub use params::Params;
pub use registry::{Action, ActionRegistry};
#[cfg(feature = "http")]
pub use rest::{ApifyActorClient, ReqwestHttpClient, RestDatabaseClient};
pub use transform::{FilterCollectionAction, TransformDataAction};

#[cfg(test)]
pub(crate) use clients::MockHttpClient;
