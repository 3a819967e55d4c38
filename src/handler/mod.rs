//! Request handler module
//!
//! `router` turns HTTP requests into action invocations; `context` is the
//! handle those actions use to describe their response.

pub mod context;
pub mod router;

pub use context::{PendingResponse, RequestContext, ResponseBody};
pub use router::{dispatch, handle_request, ActionRequest, Dispatched};
