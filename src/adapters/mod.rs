// Adapters layer: the HTTP server facing the frontend and the HTTP clients
// for the inference server and the sports data API.

pub mod balldontlie;
pub mod http;
pub mod ollama;
