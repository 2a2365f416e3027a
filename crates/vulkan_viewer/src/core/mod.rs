//! Core viewer types shared by the binary and the renderer

pub mod config;
