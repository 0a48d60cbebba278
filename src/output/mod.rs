//! Command output shared by the binary

pub mod command;

pub use command::{
    generate_execution_id, output_json, CitiesResponse, CityEntry, ComputeResponse, ErrorResponse,
    FetchResponse, JsonResponse, OutputFormat, StatusResponse,
};
