//! Core library for tidal-playlist: builds a TIDAL playlist from random
//! tracks of the user's favorite artists.
pub mod api;
pub mod builder;
pub mod config;
pub mod models;
