pub mod dispatch;
pub mod domain;
pub mod error;
pub mod messaging;
pub mod ports;
pub mod rescue;
pub mod returns;
pub mod roster;
pub mod selection;
pub mod session;

pub use dispatch::{DispatchBoard, ReturnsReport, RosterEntry, RosterView, SweepReport};
pub use domain::{
    AuthSession, Chat, ChatKind, ChatMessage, Company, DispatchStatus, Driver, DutyStatus,
    Feedback, NewUser, Notice, Post, ProfileUpdate, RescueDispatch, ReturnIncident, Role, User,
    UserCredentials,
};
pub use error::{ServiceError, ServiceResult};
pub use messaging::{MessagingDesk, NewChat};
pub use ports::{
    DutyStore, IdentityService, MessagingStore, PortError, PortResult, ReturnsStore,
    SnapshotStream,
};
pub use rescue::{RescueRequest, RescueState};
pub use selection::{Selection, TapOutcome};
pub use session::Destination;
