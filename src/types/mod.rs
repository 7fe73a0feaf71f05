//! Data types for process descriptions, execution requests and responses.
//!
//! Field names follow the JSON documents exchanged with callers
//! (`jobControlOptions`, `minOccurs`, `transmissionMode`, ...).

pub mod description;
pub mod request;
pub mod response;

pub use description::{
    InputDescription, JobControlOption, OutputDescription, ProcessDescriptor, Schema, SchemaType,
    TransmissionMode,
};
pub use request::{
    ExecutionMode, ExecutionRequest, OutputRequest, OutputSelection, ResponseMode, ResultShaping,
};
pub use response::{ExecuteResponse, ProcessSummary};
