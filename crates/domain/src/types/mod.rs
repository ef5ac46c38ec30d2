//! Domain types and models

pub mod http;
pub mod idle;
pub mod mode;
pub mod session;
pub mod sync;

pub use http::{ApiRequest, ApiResponse, AttachmentOutcome, AttachmentRecord, HttpMethod};
pub use idle::{IdlePhase, IdleState};
pub use mode::{AuthMode, StorageStrategy, TokenKind};
pub use session::{
    AuthPhase, AuthState, PkceDebugInfo, PkceExchangeState, Session, TokenRequest, TokenResponse,
};
pub use sync::{TabMessage, TabMessageKind};
