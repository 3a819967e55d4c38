//! HTTP protocol layer module
//!
//! Response builders and content type detection, independent of action resolution.

pub mod mime;
pub mod response;

pub use response::{
    build_400_response, build_404_response, build_413_response, build_500_response, build_501_response,
    build_action_response, with_server_header,
};
