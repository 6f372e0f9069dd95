pub mod app;
pub mod base;
pub mod bird;
pub mod config;
pub mod controller;
pub mod evolution;
pub mod genome;
pub mod mask;
pub mod pipe;
pub mod render;
pub mod replay;
pub mod session;
pub mod snapshot;
pub mod sprites;
pub mod trainer;
pub mod trial;
