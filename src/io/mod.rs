//! Interfaces to external georeferencing services

pub mod reproject;

pub use reproject::{get_latitude, get_latitude_with, GdalReprojector, Reproject};
