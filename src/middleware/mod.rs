pub mod refresh_gate;
pub mod route_guard;
