pub mod json_response;
pub mod routes;
pub mod upgrade;
pub mod websocket;
