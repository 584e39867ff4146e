// Core library for the Gantry dispatch framework
// Resources, representations, and the handler chain that joins them

pub mod app;
pub mod binder;
pub mod chain;
pub mod context;
pub mod error;
pub mod events;
pub mod handlers;
pub mod http;
pub mod logging;
pub mod mounted;
pub mod negotiation;
pub mod registry;
pub mod representation;
pub mod resource;
pub mod server;
pub mod settings;
pub mod static_files;
pub mod status;

// Re-export commonly used types
pub use app::{Application, MountOptions};
pub use binder::{bind, Args};
pub use chain::{Handler, HandlerChain, Next};
pub use context::{FinishedCallback, RequestContext};
pub use error::Error;
pub use events::{Event, EventKind};
pub use http::{HttpRequest, HttpResponse};
pub use mounted::{Match, MountedResource};
pub use negotiation::{negotiate, Accept, MediaType};
pub use registry::{Resolution, ResourceRegistry};
pub use representation::{
    Representation, RepresentationBody, RepresentationFactory, RepresentationRegistry,
};
pub use resource::{
    DynResource, MethodConfig, MethodDescriptor, ParamKind, ParamSpec, Resource, ResourceFactory,
    ResourceOutcome,
};
pub use server::serve;
pub use settings::Settings;
pub use static_files::{DirectoryApp, StaticApp, StaticMounts, StaticTarget};
pub use status::{default_status, reason_for, HttpStatus};
