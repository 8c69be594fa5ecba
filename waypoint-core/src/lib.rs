pub mod error;
pub mod gate;
pub mod notice;
pub mod path_config;
pub mod properties;
pub mod routing;
pub mod screen;
pub mod session;
pub mod settings;
pub mod stack;

// Re-export the main types so users can just use `waypoint_core::VisitRouter`
pub use error::{FailureKind, LoadError, RuleError};
pub use gate::{Affordances, AuthProbe, CapabilityGate, MetaTagProbe};
pub use notice::ErrorNotice;
pub use path_config::{ConfigFetcher, PathConfigSource, PathConfigurationStore, PathRule};
pub use properties::{PathProperties, PropertyMap, PropertyValue};
pub use routing::{
    ModalPresentation, RouteOutcome, RoutePlan, StackMutation, Target, VisitAction, VisitRequest,
    VisitRouter,
};
pub use screen::{LoadState, Screen, ScreenId};
pub use session::{
    BrowsingContext, ContentLoader, ContentSession, LoadedContent, SessionEvent, VisitOutcome,
};
pub use settings::ShellSettings;
pub use stack::NavigationStack;
